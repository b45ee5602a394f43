use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use crate::Sample;

/// Real-valued transform with a fixed frame length.
///
/// `forward` maps `frame_length` samples onto `half_length + 1` bins, `inverse`
/// maps them back and normalizes. Implementations may use their input as
/// scratch space.
pub trait Transform {
    fn frame_length(&self) -> usize;

    fn half_length(&self) -> usize {
        self.frame_length() / 2
    }

    fn complex_length(&self) -> usize {
        complex_size(self.frame_length())
    }

    fn forward(
        &mut self,
        input: &mut [Sample],
        output: &mut [Complex<Sample>],
    ) -> Result<(), FftError>;

    fn inverse(
        &mut self,
        input: &mut [Complex<Sample>],
        output: &mut [Sample],
    ) -> Result<(), FftError>;
}

/// `realfft` backed transform. Scratch space is allocated up front so that
/// neither direction allocates while processing.
#[derive(Clone)]
pub struct RealFft {
    length: usize,
    fft_forward: Arc<dyn RealToComplex<Sample>>,
    fft_inverse: Arc<dyn ComplexToReal<Sample>>,
    scratch_forward: Vec<Complex<Sample>>,
    scratch_inverse: Vec<Complex<Sample>>,
}

impl std::fmt::Debug for RealFft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealFft")
            .field("length", &self.length)
            .finish()
    }
}

impl RealFft {
    pub fn new(length: usize) -> Self {
        let mut planner = RealFftPlanner::<Sample>::new();
        let fft_forward = planner.plan_fft_forward(length);
        let fft_inverse = planner.plan_fft_inverse(length);
        let scratch_forward = fft_forward.make_scratch_vec();
        let scratch_inverse = fft_inverse.make_scratch_vec();
        Self {
            length,
            fft_forward,
            fft_inverse,
            scratch_forward,
            scratch_inverse,
        }
    }
}

impl Transform for RealFft {
    fn frame_length(&self) -> usize {
        self.length
    }

    fn forward(
        &mut self,
        input: &mut [Sample],
        output: &mut [Complex<Sample>],
    ) -> Result<(), FftError> {
        self.fft_forward
            .process_with_scratch(input, output, &mut self.scratch_forward)
    }

    fn inverse(
        &mut self,
        input: &mut [Complex<Sample>],
        output: &mut [Sample],
    ) -> Result<(), FftError> {
        // DC and Nyquist bins of a real signal carry no imaginary part
        if let Some(first) = input.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = input.last_mut() {
            last.im = 0.0;
        }

        self.fft_inverse
            .process_with_scratch(input, output, &mut self.scratch_inverse)?;

        // FFT Normalization
        let scale = 1.0 / output.len() as Sample;
        output.iter_mut().for_each(|sample| *sample *= scale);

        Ok(())
    }
}

pub fn complex_size(size: usize) -> usize {
    (size / 2) + 1
}

pub fn copy_and_pad(dst: &mut [Sample], src: &[Sample], src_size: usize) {
    assert!(dst.len() >= src_size);
    dst[0..src_size].copy_from_slice(&src[0..src_size]);
    dst[src_size..].iter_mut().for_each(|value| *value = 0.);
}

pub fn complex_multiply_accumulate(
    result: &mut [Complex<Sample>],
    a: &[Complex<Sample>],
    b: &[Complex<Sample>],
) {
    assert_eq!(result.len(), a.len());
    assert_eq!(result.len(), b.len());
    let len = result.len();
    let end4 = 4 * (len / 4);
    for i in (0..end4).step_by(4) {
        result[i].re += a[i].re * b[i].re - a[i].im * b[i].im;
        result[i + 1].re += a[i + 1].re * b[i + 1].re - a[i + 1].im * b[i + 1].im;
        result[i + 2].re += a[i + 2].re * b[i + 2].re - a[i + 2].im * b[i + 2].im;
        result[i + 3].re += a[i + 3].re * b[i + 3].re - a[i + 3].im * b[i + 3].im;
        result[i].im += a[i].re * b[i].im + a[i].im * b[i].re;
        result[i + 1].im += a[i + 1].re * b[i + 1].im + a[i + 1].im * b[i + 1].re;
        result[i + 2].im += a[i + 2].re * b[i + 2].im + a[i + 2].im * b[i + 2].re;
        result[i + 3].im += a[i + 3].re * b[i + 3].im + a[i + 3].im * b[i + 3].re;
    }
    for i in end4..len {
        result[i].re += a[i].re * b[i].re - a[i].im * b[i].im;
        result[i].im += a[i].re * b[i].im + a[i].im * b[i].re;
    }
}

pub fn accumulate(dst: &mut [Sample], src: &[Sample]) {
    assert_eq!(dst.len(), src.len());
    dst.iter_mut().zip(src).for_each(|(d, s)| *d += s);
}

#[test]
fn test_forward_inverse_is_identity() {
    let mut fft = RealFft::new(64);
    let signal: Vec<Sample> = (0..64).map(|i| (i as Sample * 0.3).sin()).collect();
    let mut buffer = signal.clone();
    let mut spectrum = vec![Complex::new(0.0, 0.0); fft.complex_length()];
    fft.forward(&mut buffer, &mut spectrum).unwrap();
    fft.inverse(&mut spectrum, &mut buffer).unwrap();

    for (a, b) in signal.iter().zip(buffer.iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn test_complex_multiply_accumulate_adds_products() {
    let a = vec![Complex::new(1.0, 2.0); 5];
    let b = vec![Complex::new(3.0, -1.0); 5];
    let mut result = vec![Complex::new(1.0, 1.0); 5];
    complex_multiply_accumulate(&mut result, &a, &b);

    // (1 + 2i)(3 - i) = 5 + 5i
    for bin in result {
        assert_eq!(bin, Complex::new(6.0, 6.0));
    }
}

#[test]
fn test_rejects_wrong_lengths() {
    let mut fft = RealFft::new(32);
    let mut buffer = vec![0.0; 16];
    let mut spectrum = vec![Complex::new(0.0, 0.0); fft.complex_length()];
    assert!(fft.forward(&mut buffer, &mut spectrum).is_err());
}
