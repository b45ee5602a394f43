use realfft::FftError;
use rustfft::num_complex::Complex;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::fft::{copy_and_pad, Transform};
use crate::Sample;

/// Impulse response split into `half_length` sample divisions, each zero
/// padded to one frame and transformed. Shared read-only between channels.
#[derive(Debug, Clone)]
pub struct PartitionedResponse {
    frame_length: usize,
    complex_length: usize,
    num_divisions: usize,
    /// One contiguous block per IR channel, `num_divisions * complex_length` bins.
    divisions: Vec<Vec<Complex<Sample>>>,
    response_lengths: Vec<usize>,
    channels: usize,
    process_headroom: usize,
    stagger_channels: bool,
}

impl PartitionedResponse {
    /// Prepares one division set per response. All sets are padded to the
    /// division count of the longest response.
    pub fn new<T: Transform>(
        responses: &[&[Sample]],
        transform: &mut T,
        config: &EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let frame_length = transform.frame_length();
        if frame_length != config.frame_length {
            return Err(ConfigError::FrameLengthMismatch {
                transform: frame_length,
                partitions: config.frame_length,
            });
        }

        let half_length = transform.half_length();
        let complex_length = transform.complex_length();
        let longest = responses.iter().map(|r| r.len()).max().unwrap_or(0);
        let num_divisions = longest.div_ceil(half_length);

        let mut fft_buffer = vec![0.0; frame_length];
        let mut divisions = Vec::with_capacity(responses.len());

        for response in responses {
            let mut bins = vec![Complex::new(0.0, 0.0); num_divisions * complex_length];
            for (i, division) in bins.chunks_exact_mut(complex_length).enumerate() {
                let offset = i * half_length;
                if offset >= response.len() {
                    break;
                }
                let size_copy = (response.len() - offset).min(half_length);
                copy_and_pad(&mut fft_buffer, &response[offset..], size_copy);
                transform.forward(&mut fft_buffer, division)?;
            }
            divisions.push(bins);
        }

        tracing::debug!(
            frame_length,
            num_divisions,
            ir_channels = responses.len(),
            "partitioned impulse response"
        );

        Ok(Self {
            frame_length,
            complex_length,
            num_divisions,
            divisions,
            response_lengths: responses.iter().map(|r| r.len()).collect(),
            channels: config.channels,
            process_headroom: config.process_headroom,
            stagger_channels: config.stagger_channels,
        })
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn half_length(&self) -> usize {
        self.frame_length / 2
    }

    pub fn complex_length(&self) -> usize {
        self.complex_length
    }

    pub fn num_ir_divisions(&self) -> usize {
        self.num_divisions
    }

    pub fn ir_channels(&self) -> usize {
        self.divisions.len()
    }

    /// Length in samples of the response feeding `channel`.
    pub fn response_length(&self, channel: usize) -> usize {
        match self.response_lengths.len() {
            0 => 0,
            n => self.response_lengths[channel % n],
        }
    }

    /// Ring capacity for `channel`. Never smaller than the division count.
    pub fn num_process_divisions(&self, _channel: usize) -> usize {
        (self.num_divisions + self.process_headroom).max(1)
    }

    /// Division `index` of the response feeding `channel`. Engine channels
    /// beyond the IR channel count wrap around, so a mono response feeds all.
    pub fn ir_division(&self, channel: usize, index: usize) -> &[Complex<Sample>] {
        let bins = &self.divisions[channel % self.divisions.len()];
        let start = index * self.complex_length;
        &bins[start..start + self.complex_length]
    }

    /// Samples from a fresh start until the first frame boundary.
    pub fn count_down_start(&self, channel: usize) -> usize {
        let half_length = self.half_length();
        if !self.stagger_channels || self.channels <= 1 {
            return half_length;
        }
        half_length - (channel % self.channels) * half_length / self.channels
    }

    pub fn process_ring(&self, channel: usize) -> ProcessRing {
        ProcessRing::new(self.num_process_divisions(channel), self.complex_length)
    }
}

/// Fixed ring of transformed input frames, stored as one arena of
/// `capacity` slots. Slots are addressed by index; callers wrap explicitly.
#[derive(Debug, Clone)]
pub struct ProcessRing {
    bins: Vec<Complex<Sample>>,
    stride: usize,
    capacity: usize,
}

impl ProcessRing {
    pub fn new(capacity: usize, stride: usize) -> Self {
        Self {
            bins: vec![Complex::new(0.0, 0.0); capacity * stride],
            stride,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn slot(&self, index: usize) -> &[Complex<Sample>] {
        debug_assert!(index < self.capacity);
        let start = index * self.stride;
        &self.bins[start..start + self.stride]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut [Complex<Sample>] {
        debug_assert!(index < self.capacity);
        let start = index * self.stride;
        &mut self.bins[start..start + self.stride]
    }

    /// Transforms `frame` into slot `index`.
    pub fn write<T: Transform>(
        &mut self,
        index: usize,
        transform: &mut T,
        frame: &mut [Sample],
    ) -> Result<(), FftError> {
        transform.forward(frame, self.slot_mut(index))
    }

    pub fn clear(&mut self) {
        self.bins.fill(Complex::new(0.0, 0.0));
    }
}
