use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_FRAME_LENGTH: usize = 512;
const MIN_FRAME_LENGTH: usize = 4;

/// Geometry and channel layout shared by a partition store and its engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transform frame length. Divisions and hops are half of this.
    pub frame_length: usize,
    /// Number of engine channels fed from the partition store.
    pub channels: usize,
    /// Extra process ring slots on top of the IR division count.
    pub process_headroom: usize,
    /// Offsets each channel's first frame boundary so that boundary
    /// transforms of different channels land in different host calls.
    pub stagger_channels: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_length: DEFAULT_FRAME_LENGTH,
            channels: 1,
            process_headroom: 0,
            stagger_channels: false,
        }
    }
}

impl EngineConfig {
    /// Frame sized for a host block: one partition holds a whole block.
    pub fn for_block_size(max_block_size: usize) -> Self {
        let block_size = max_block_size.max(MIN_FRAME_LENGTH / 2).next_power_of_two();
        Self {
            frame_length: 2 * block_size,
            ..Self::default()
        }
    }

    pub fn half_length(&self) -> usize {
        self.frame_length / 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_length < MIN_FRAME_LENGTH || !self.frame_length.is_power_of_two() {
            return Err(ConfigError::InvalidFrameLength(self.frame_length));
        }
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
