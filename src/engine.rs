//! Scheduled overlap-save convolution for one channel.
//!
//! Input is re-framed into windows of one transform frame that overlap by
//! half a frame. Two alternating windows are written side by side, offset by
//! `half_length`; every `half_length` samples one of them holds a complete
//! frame (newest half first) and is transformed into the process ring. The
//! impulse response divisions past the first are multiplied against the ring
//! history during the following period, a few per host call, so that the
//! boundary itself only adds division 0 and runs the inverse transform.
//!
//! Output lags input by exactly `half_length` samples.

use std::sync::Arc;

use realfft::FftError;
use rustfft::num_complex::Complex;

use crate::error::{ConfigError, ProcessFault};
use crate::fft::{accumulate, complex_multiply_accumulate, RealFft, Transform};
use crate::partition::{PartitionedResponse, ProcessRing};
use crate::schedule::ScheduleState;
use crate::Sample;

/// Counters and offsets of one engine channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvolutionState {
    /// Samples left until the next frame boundary.
    pub count_down: usize,
    /// Write offsets into the two alternating windows.
    pub positions: [usize; 2],
    /// Window transformed at the next boundary.
    pub alt_select: usize,
    pub schedule: ScheduleState,
}

impl ConvolutionState {
    fn start(count_down: usize, half_length: usize) -> Self {
        debug_assert!(count_down <= half_length);
        let position0 = half_length - count_down;
        Self {
            count_down,
            positions: [position0, position0 + half_length],
            alt_select: 0,
            schedule: ScheduleState::reset(),
        }
    }
}

pub struct ConvolutionEngine<T: Transform = RealFft> {
    transform: T,
    response: Arc<PartitionedResponse>,
    channel: usize,
    ring: ProcessRing,
    state: ConvolutionState,
    accumulator: Vec<Complex<Sample>>,
    alt_buffers: [Vec<Sample>; 2],
    transform_buffer: Vec<Sample>,
    overlap: Vec<Sample>,
    faults: u64,
}

impl<T: Transform> std::fmt::Debug for ConvolutionEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionEngine")
            .field("channel", &self.channel)
            .field("frame_length", &self.transform.frame_length())
            .field("num_ir_divisions", &self.response.num_ir_divisions())
            .field("state", &self.state)
            .field("faults", &self.faults)
            .finish()
    }
}

impl<T: Transform> ConvolutionEngine<T> {
    /// Allocates all working memory for `channel` of `response`.
    pub fn new(
        transform: T,
        response: Arc<PartitionedResponse>,
        channel: usize,
    ) -> Result<Self, ConfigError> {
        check_geometry(&transform, &response)?;

        let frame_length = transform.frame_length();
        let complex_length = transform.complex_length();
        let ring = response.process_ring(channel);
        let state = ConvolutionState::start(
            response.count_down_start(channel),
            transform.half_length(),
        );

        let mut engine = Self {
            transform,
            response,
            channel,
            ring,
            state,
            accumulator: vec![Complex::new(0.0, 0.0); complex_length],
            alt_buffers: [vec![0.0; frame_length], vec![0.0; frame_length]],
            transform_buffer: vec![0.0; frame_length],
            overlap: vec![0.0; frame_length],
            faults: 0,
        };
        engine.clear();
        Ok(engine)
    }

    /// Rebinds the engine to `response` and restarts it from silence. A
    /// response prepared for another frame length is rejected and the engine
    /// keeps its current one.
    pub fn reset(&mut self, response: Arc<PartitionedResponse>) -> Result<(), ConfigError> {
        check_geometry(&self.transform, &response)?;

        let capacity = response.num_process_divisions(self.channel);
        if capacity != self.ring.capacity() {
            self.ring = response.process_ring(self.channel);
        }
        self.response = response;
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        let half_length = self.transform.half_length();
        self.state =
            ConvolutionState::start(self.response.count_down_start(self.channel), half_length);

        self.accumulator.fill(Complex::new(0.0, 0.0));
        for buffer in self.alt_buffers.iter_mut() {
            buffer.fill(0.0);
        }
        self.transform_buffer.fill(0.0);
        self.overlap.fill(0.0);
        self.ring.clear();

        tracing::debug!(
            channel = self.channel,
            count_down = self.state.count_down,
            num_ir_divisions = self.response.num_ir_divisions(),
            num_process_divisions = self.ring.capacity(),
            "convolution engine reset"
        );
    }

    /// Convolves one host block. `input` and `output` must have the same
    /// length. On a fault the output block is silent.
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> Result<(), ProcessFault> {
        assert_eq!(
            input.len(),
            output.len(),
            "input and output blocks differ in length"
        );

        let num_ir_divisions = self.response.num_ir_divisions();
        if num_ir_divisions == 0 {
            output.fill(0.0);
            self.faults += 1;
            tracing::warn!(
                channel = self.channel,
                "no impulse response divisions, output silenced"
            );
            return Err(ProcessFault::EmptyResponse);
        }

        if output.is_empty() {
            return Ok(());
        }

        let half_length = self.transform.half_length();
        let ratio = ScheduleState::ratio(half_length, output.len());
        let ring_len = self.ring.capacity();
        let mut processed = 0;

        while processed < output.len() {
            let hop = (output.len() - processed).min(self.state.count_down);
            let [position0, position1] = self.state.positions;

            self.alt_buffers[0][position0..position0 + hop]
                .copy_from_slice(&input[processed..processed + hop]);
            self.alt_buffers[1][position1..position1 + hop]
                .copy_from_slice(&input[processed..processed + hop]);
            output[processed..processed + hop]
                .copy_from_slice(&self.overlap[position0..position0 + hop]);

            self.state.positions = [position0 + hop, position1 + hop];
            self.state.count_down -= hop;
            processed += hop;

            let final_step = self.state.count_down == 0;
            let (schedule, plan) = self.state.schedule.advance(ratio, ring_len, final_step);
            self.state.schedule = schedule;

            for batch in plan.batches() {
                for j in 0..batch.len {
                    complex_multiply_accumulate(
                        &mut self.accumulator,
                        self.ring.slot(batch.ring_start + j),
                        self.response.ir_division(self.channel, batch.ir_start + j),
                    );
                }
            }

            if final_step {
                if let Err(err) = self.flush_frame(num_ir_divisions) {
                    output.fill(0.0);
                    self.faults += 1;
                    tracing::warn!(
                        channel = self.channel,
                        error = %err,
                        "frame transform failed, output silenced"
                    );
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }

    /// Frame boundary: transform the full window, fold in division 0 and
    /// rebuild the next half frame of output.
    fn flush_frame(&mut self, num_ir_divisions: usize) -> Result<(), FftError> {
        let half_length = self.transform.half_length();
        let ring_len = self.ring.capacity();
        let flushed = self.state.alt_select;
        let next = 1 - flushed;

        self.state.schedule = self.state.schedule.open_boundary(num_ir_divisions);
        let current = self.state.schedule.process.current;

        // Forward FFT
        self.transform_buffer
            .copy_from_slice(&self.alt_buffers[flushed]);
        self.ring
            .write(current, &mut self.transform, &mut self.transform_buffer)?;
        complex_multiply_accumulate(
            &mut self.accumulator,
            self.ring.slot(current),
            self.response.ir_division(self.channel, 0),
        );

        // Backward FFT
        self.transform
            .inverse(&mut self.accumulator, &mut self.transform_buffer)?;

        // The first half is this period's valid output, the second half is
        // circular wrap-around that lands on samples already played.
        let (valid, wrapped) = self.transform_buffer.split_at(half_length);
        self.overlap[next * half_length..(next + 1) * half_length].copy_from_slice(valid);
        accumulate(
            &mut self.overlap[flushed * half_length..(flushed + 1) * half_length],
            wrapped,
        );

        // the window selected next has just filled its whole frame
        debug_assert_eq!(self.state.positions[next], 2 * half_length);
        self.state.positions[next] = 0;
        self.state.alt_select = next;

        self.state.schedule = self.state.schedule.close_boundary(ring_len);
        self.state.count_down = half_length;
        self.accumulator.fill(Complex::new(0.0, 0.0));

        tracing::trace!(
            channel = self.channel,
            slot = current,
            read = self.state.schedule.ir.read,
            alt_select = self.state.alt_select,
            "frame boundary"
        );

        Ok(())
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn response(&self) -> &Arc<PartitionedResponse> {
        &self.response
    }

    pub fn state(&self) -> &ConvolutionState {
        &self.state
    }

    pub fn schedule(&self) -> ScheduleState {
        self.state.schedule
    }

    /// Reconstructed output waiting to be played.
    pub fn overlap(&self) -> &[Sample] {
        &self.overlap
    }

    /// Delay in samples between an input sample and its first output.
    pub fn latency(&self) -> usize {
        self.transform.half_length()
    }

    /// Number of `process` calls that produced silence because of a fault.
    pub fn fault_count(&self) -> u64 {
        self.faults
    }
}

fn check_geometry<T: Transform>(
    transform: &T,
    response: &PartitionedResponse,
) -> Result<(), ConfigError> {
    if transform.frame_length() != response.frame_length() {
        tracing::warn!(
            transform = transform.frame_length(),
            partitions = response.frame_length(),
            "frame length mismatch"
        );
        return Err(ConfigError::FrameLengthMismatch {
            transform: transform.frame_length(),
            partitions: response.frame_length(),
        });
    }
    Ok(())
}
