#[cfg(not(feature = "std"))]
#[allow(unused_imports)]
use micromath::F32Ext;

/// mean and population standard deviation; `(0, 0)` when empty
pub fn mean_std(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let (sum, count) = values
        .clone()
        .fold((0f64, 0usize), |(sum, count), v| (sum + v as f64, count + 1));
    if count == 0 {
        return (0., 0.);
    }
    let mean = sum / count as f64;
    let variance = values
        .map(|v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64;
    (mean as f32, (variance as f32).sqrt())
}

/// `Σ (x[t] - x[t+1])` over even `t < T - 2`, divided by `T - 2`; zero when `T <= 2`
pub fn alternating_difference(values: &[f32]) -> f32 {
    let t = values.len();
    if t <= 2 {
        return 0.;
    }
    let sum: f64 = (0..t - 2)
        .step_by(2)
        .map(|i| (values[i] - values[i + 1]) as f64)
        .sum();
    (sum / (t - 2) as f64) as f32
}

/// Per-band summary of a cepstral sequence: `BANDS` means, then `BANDS`
/// standard deviations, then `BANDS` alternating differences.
pub fn summarize<const BANDS: usize>(frames: &[[f32; BANDS]], features: &mut [f32]) {
    debug_assert_eq!(features.len(), 3 * BANDS);
    let mut band = alloc::vec::Vec::with_capacity(frames.len());
    for m in 0..BANDS {
        band.clear();
        band.extend(frames.iter().map(|frame| frame[m]));
        let (mean, std) = mean_std(band.iter().copied());
        features[m] = mean;
        features[BANDS + m] = std;
        features[2 * BANDS + m] = alternating_difference(&band);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std() {
        let (mean, std) = mean_std([2., 4., 4., 4., 5., 5., 7., 9.].into_iter());
        assert_eq!(mean, 5.);
        assert_eq!(std, 2.);
        assert_eq!(mean_std(core::iter::empty()), (0., 0.));
    }

    #[test]
    fn alternating_difference_normalization() {
        assert_eq!(alternating_difference(&[]), 0.);
        assert_eq!(alternating_difference(&[1., 5.]), 0.);
        // t = 0 only: (1 - 3) / 1
        assert_eq!(alternating_difference(&[1., 3., 8.]), -2.);
        // t = 0, 2: ((4 - 1) + (6 - 2)) / 4
        assert_eq!(alternating_difference(&[4., 1., 6., 2., 9., 9.]), 1.75);
    }

    #[test]
    fn summary_layout() {
        let frames = [[1., 10.], [3., 10.], [2., 10.]];
        let mut features = [0.; 6];
        summarize(&frames, &mut features);
        assert_eq!(features[0], 2.);
        assert_eq!(features[1], 10.);
        assert!((features[2] - (2f32 / 3.).sqrt()).abs() < 1e-6);
        assert_eq!(features[3], 0.);
        assert_eq!(features[4], -2.);
        assert_eq!(features[5], 0.);
    }
}
