use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::ConvolutionEngine;
use crate::error::{ConfigError, ProcessFault};
use crate::fft::RealFft;
use crate::partition::PartitionedResponse;
use crate::{Convolution, Sample};

/// One engine per channel sharing a single partitioned impulse response.
///
/// Changing the response restarts every channel from silence; there is no
/// crossfade between the old and the new response.
#[derive(Debug)]
pub struct Convolver {
    config: EngineConfig,
    fft: RealFft,
    response: Arc<PartitionedResponse>,
    engines: Vec<ConvolutionEngine>,
}

impl Convolver {
    /// `responses` holds one impulse response per IR channel. Engine channels
    /// beyond that count reuse the responses round-robin.
    pub fn new(config: EngineConfig, responses: &[&[Sample]]) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut fft = RealFft::new(config.frame_length);
        let response = Arc::new(PartitionedResponse::new(responses, &mut fft, &config)?);
        let engines = (0..config.channels)
            .map(|channel| ConvolutionEngine::new(fft.clone(), response.clone(), channel))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            channels = config.channels,
            frame_length = config.frame_length,
            num_ir_divisions = response.num_ir_divisions(),
            "convolver ready"
        );

        Ok(Self {
            config,
            fft,
            response,
            engines,
        })
    }

    /// Replaces the impulse response. Not real-time safe: the new partitions
    /// and rings are allocated here.
    pub fn set_response(&mut self, responses: &[&[Sample]]) -> Result<(), ConfigError> {
        let response = Arc::new(PartitionedResponse::new(
            responses,
            &mut self.fft,
            &self.config,
        )?);
        for engine in self.engines.iter_mut() {
            engine.reset(response.clone())?;
        }
        self.response = response;
        Ok(())
    }

    pub fn process_channel(
        &mut self,
        channel: usize,
        input: &[Sample],
        output: &mut [Sample],
    ) -> Result<(), ProcessFault> {
        self.engines[channel].process(input, output)
    }

    pub fn channels(&self) -> usize {
        self.engines.len()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn response(&self) -> &Arc<PartitionedResponse> {
        &self.response
    }

    pub fn engine(&self, channel: usize) -> &ConvolutionEngine {
        &self.engines[channel]
    }

    pub fn latency(&self) -> usize {
        self.config.half_length()
    }
}

impl Convolution for Convolver {
    fn init(response: &[Sample], max_block_size: usize) -> Self {
        let config = EngineConfig::for_block_size(max_block_size);
        // for_block_size always yields a valid geometry and one channel
        Self::new(config, &[response]).unwrap_or_else(|err| {
            unreachable!("block-sized configuration rejected: {err}")
        })
    }

    fn update(&mut self, response: &[Sample]) {
        if let Err(err) = self.set_response(&[response]) {
            tracing::warn!(error = %err, "impulse response update rejected");
        }
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        // faults already leave silence in the output
        let _ = self.process_channel(0, input, output);
    }
}

#[test]
fn test_convolver_passthrough() {
    let mut response = [0.0; 1024];
    response[0] = 1.0;
    let mut convolver = Convolver::init(&response, 1024);
    let latency = convolver.latency();
    let input = vec![1.0; 4096];
    let mut output = vec![0.0; 4096];
    convolver.process(&input, &mut output);

    for i in 0..4096 {
        let expected = if i < latency { 0.0 } else { 1.0 };
        assert!((output[i] - expected).abs() < 1e-5);
    }
}

#[test]
fn test_convolver_update_is_reset() {
    let response_a = [0.5; 300];
    let response_b = [-0.25; 500];
    let block_size = 64;
    let mut convolver = Convolver::init(&response_a, block_size);
    let mut fresh = Convolver::init(&response_b, block_size);

    let input: Vec<Sample> = (0..block_size).map(|i| (i as Sample * 0.1).sin()).collect();
    let mut output = vec![0.0; block_size];
    let mut output_fresh = vec![0.0; block_size];
    for _ in 0..8 {
        convolver.process(&input, &mut output);
    }

    convolver.update(&response_b);
    for _ in 0..16 {
        convolver.process(&input, &mut output);
        fresh.process(&input, &mut output_fresh);
        for j in 0..block_size {
            assert!((output[j] - output_fresh[j]).abs() < 1e-6);
        }
    }
}

#[test]
fn test_channels_share_response() {
    let config = EngineConfig {
        frame_length: 64,
        channels: 3,
        ..EngineConfig::default()
    };
    let response = [1.0, 0.5, 0.25];
    let mut convolver = Convolver::new(config, &[&response]).unwrap();
    assert_eq!(convolver.channels(), 3);
    assert_eq!(convolver.config().channels, 3);
    for channel in 0..3 {
        assert_eq!(convolver.engine(channel).channel(), channel);
    }

    let input = [1.0; 32];
    let mut first = [0.0; 32];
    let mut other = [0.0; 32];
    for _ in 0..4 {
        convolver.process_channel(0, &input, &mut first).unwrap();
        convolver.process_channel(2, &input, &mut other).unwrap();
        assert_eq!(first, other);
    }
}
