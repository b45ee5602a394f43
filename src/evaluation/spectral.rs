use rustfft::num_complex::Complex;

use crate::fft::{RealFft, Transform};
use crate::Sample;

fn hann_window(size: usize) -> Vec<Sample> {
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f64::consts::PI as Sample * i as Sample / (size - 1) as Sample;
            0.5 * (1.0 - x.cos())
        })
        .collect()
}

/// RMS magnitude of everything outside one ERB around `frequency`.
///
/// A clean tone scores close to zero. Discontinuities introduced at block or
/// frame boundaries spread energy over the spectrum and raise the score.
pub fn sideband_energy(input: &[Sample], frequency: Sample, sample_rate: Sample) -> Sample {
    let buffer_size = input.len();
    let mut fft = RealFft::new(buffer_size);

    let window = hann_window(buffer_size);
    let mut fft_buffer = input
        .iter()
        .zip(&window)
        .map(|(s, w)| s * w)
        .collect::<Vec<Sample>>();
    let coherent_gain: Sample = window.iter().sum::<Sample>() / window.len() as Sample;

    let mut spectrum = vec![Complex::new(0., 0.); fft.complex_length()];
    if fft.forward(&mut fft_buffer, &mut spectrum).is_err() {
        return Sample::INFINITY;
    }

    let frequency_bin = |frequency: Sample| -> usize {
        (frequency * buffer_size as Sample / sample_rate).round() as usize
    };

    let khz = frequency / 1000.0;
    let erb = 6.23 * khz * khz + 93.39 * khz + 28.52;

    let upper_bound = frequency_bin(frequency + erb / 2.);
    let lower_bound = frequency_bin((frequency - erb / 2.).max(0.0));

    let sum: Sample = spectrum
        .iter()
        .enumerate()
        .filter(|&(i, _)| i < lower_bound || i > upper_bound)
        .map(|(_, c)| 2.0 * c.norm() / (coherent_gain * buffer_size as Sample))
        .sum();

    (sum / spectrum.len() as Sample).sqrt()
}

#[test]
fn test_sideband_energy() {
    use super::generate_sinusoid;

    let num_samples = 4080;
    let sample_rate = 48000.0;
    let frequency = 100.0;
    let clean_signal = generate_sinusoid(num_samples, frequency, sample_rate, 1.0);

    assert!(sideband_energy(&clean_signal, frequency, sample_rate) < 0.01);

    let dirty_signal = clean_signal
        .iter()
        .zip(generate_sinusoid(num_samples, frequency * 8.0, sample_rate, 1.0).iter())
        .map(|(a, b)| a + b)
        .collect::<Vec<Sample>>();

    assert!(sideband_energy(&dirty_signal, frequency, sample_rate) > 0.01);
}
