//! Uniformly partitioned overlap-save convolution for real-time audio.
//!
//! [`ConvolutionEngine`] convolves one channel against a [`PartitionedResponse`],
//! spreading the multiply-accumulate work of the impulse response divisions
//! over the host calls of each frame period so that no single call pays for
//! the whole response. [`Convolver`] bundles one engine per channel.

// todo: use a generic floating point type
pub type Sample = f32;

pub mod config;
pub mod convolver;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod fft;
pub mod partition;
pub mod schedule;
mod tests;

pub use config::EngineConfig;
pub use convolver::Convolver;
pub use engine::{ConvolutionEngine, ConvolutionState};
pub use error::{ConfigError, ProcessFault};
pub use fft::{RealFft, Transform};
pub use partition::{PartitionedResponse, ProcessRing};
pub use schedule::{DivisionBatch, IrCounters, ProcessCounters, ScheduleState, StepPlan};

pub trait Convolution {
    fn init(response: &[Sample], max_block_size: usize) -> Self;
    fn update(&mut self, response: &[Sample]);
    fn process(&mut self, input: &[Sample], output: &mut [Sample]);
}
