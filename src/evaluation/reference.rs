use crate::Sample;

/// Time-domain linear convolution truncated to the input length, accumulated
/// in double precision.
pub fn direct_convolution(input: &[Sample], response: &[Sample]) -> Vec<Sample> {
    (0..input.len())
        .map(|n| {
            let taps = response.len().min(n + 1);
            (0..taps)
                .map(|k| input[n - k] as f64 * response[k] as f64)
                .sum::<f64>() as Sample
        })
        .collect()
}

/// Index of the first sample whose magnitude exceeds `threshold`.
pub fn onset(signal: &[Sample], threshold: Sample) -> Option<usize> {
    signal.iter().position(|s| s.abs() > threshold)
}

pub fn max_abs_difference(lhs: &[Sample], rhs: &[Sample]) -> Sample {
    assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, Sample::max)
}
