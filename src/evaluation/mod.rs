//! Reference signals and measurements used to check the engine's output.

pub mod reference;
pub mod spectral;

pub use reference::{direct_convolution, max_abs_difference, onset};
pub use spectral::sideband_energy;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::Sample;

pub fn generate_sinusoid(
    length: usize,
    frequency: Sample,
    sample_rate: Sample,
    gain: Sample,
) -> Vec<Sample> {
    (0..length)
        .map(|i| {
            gain * (2.0 * std::f32::consts::PI * frequency * i as Sample / sample_rate).sin()
        })
        .collect()
}

/// Uniform white noise in `[-gain, gain)`, repeatable for a given seed.
pub fn generate_noise(length: usize, seed: u64, gain: Sample) -> Vec<Sample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..length).map(|_| rng.random_range(-gain..gain)).collect()
}

/// Unit impulse at `position`, zero elsewhere.
pub fn impulse(length: usize, position: usize) -> Vec<Sample> {
    let mut signal = vec![0.0; length];
    if position < length {
        signal[position] = 1.0;
    }
    signal
}

#[test]
fn noise_is_repeatable_and_bounded() {
    let a = generate_noise(1000, 7, 0.5);
    let b = generate_noise(1000, 7, 0.5);
    assert_eq!(a, b);
    assert!(a.iter().all(|s| s.abs() <= 0.5));
    assert_ne!(a, generate_noise(1000, 8, 0.5));

    let long = generate_noise(48000, 7, 1.0);
    let mean = long.iter().sum::<Sample>() / long.len() as Sample;
    assert!(mean.abs() < 0.02);
    assert!(long.iter().any(|&s| s > 0.9) && long.iter().any(|&s| s < -0.9));
}
