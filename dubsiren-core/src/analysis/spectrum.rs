use core::f32::consts::PI;

#[cfg(not(feature = "std"))]
#[allow(unused_imports)]
use micromath::F32Ext;

/// Hann-windowed one-sided power spectrum of `N` real samples.
///
/// `N` must be a power of two; the output has `N / 2 + 1` bins.
pub struct PowerSpectrum<const N: usize> {
    hann: [f32; N],
    /// `e^{-2πik/N}` for `k < N / 2`, stored in the low half
    twiddle_re: [f32; N],
    twiddle_im: [f32; N],
    re: [f32; N],
    im: [f32; N],
}

impl<const N: usize> Default for PowerSpectrum<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PowerSpectrum<N> {
    pub const BINS: usize = N / 2 + 1;

    pub fn new() -> Self {
        const { assert!(N >= 2 && N.is_power_of_two()) };
        let mut hann = [0.; N];
        for (i, w) in hann.iter_mut().enumerate() {
            *w = 0.5 * (1. - (2. * PI * i as f32 / (N - 1) as f32).cos());
        }
        let mut twiddle_re = [0.; N];
        let mut twiddle_im = [0.; N];
        for k in 0..N / 2 {
            let phase = -2. * PI * k as f32 / N as f32;
            twiddle_re[k] = phase.cos();
            twiddle_im[k] = phase.sin();
        }
        Self {
            hann,
            twiddle_re,
            twiddle_im,
            re: [0.; N],
            im: [0.; N],
        }
    }

    /// `|X[k]|²` for `k` in `0..=N/2` into `power`
    pub fn compute(&mut self, frame: &[f32; N], power: &mut [f32]) {
        debug_assert_eq!(power.len(), Self::BINS);
        for i in 0..N {
            self.re[i] = frame[i] * self.hann[i];
            self.im[i] = 0.;
        }
        self.fft();
        for (k, p) in power.iter_mut().enumerate().take(Self::BINS) {
            *p = self.re[k] * self.re[k] + self.im[k] * self.im[k];
        }
    }

    /// in-place iterative radix-2 decimation in time
    fn fft(&mut self) {
        let bits = N.trailing_zeros();
        for i in 0..N {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if i < j {
                self.re.swap(i, j);
                self.im.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= N {
            let half = len / 2;
            let stride = N / len;
            for start in (0..N).step_by(len) {
                for k in 0..half {
                    let wr = self.twiddle_re[k * stride];
                    let wi = self.twiddle_im[k * stride];
                    let (a, b) = (start + k, start + k + half);
                    let tr = self.re[b] * wr - self.im[b] * wi;
                    let ti = self.re[b] * wi + self.im[b] * wr;
                    self.re[b] = self.re[a] - tr;
                    self.im[b] = self.im[a] - ti;
                    self.re[a] += tr;
                    self.im[a] += ti;
                }
            }
            len *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_no_power() {
        let mut spectrum = PowerSpectrum::<64>::new();
        let mut power = [1.; 33];
        spectrum.compute(&[0.; 64], &mut power);
        assert!(power.iter().all(|&p| p == 0.));
    }

    #[test]
    fn tone_lands_in_its_bin() {
        const N: usize = 256;
        let mut spectrum = PowerSpectrum::<N>::new();
        let mut frame = [0.; N];
        for (i, v) in frame.iter_mut().enumerate() {
            *v = (2. * PI * 16. * i as f32 / N as f32).sin();
        }
        let mut power = [0.; N / 2 + 1];
        spectrum.compute(&frame, &mut power);
        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(16));
        // hann leaks into the neighbours only
        assert!(power[16] > 100. * power[20]);
    }

    #[test]
    fn dc_and_nyquist_are_real() {
        const N: usize = 16;
        let mut spectrum = PowerSpectrum::<N>::new();
        let frame: [f32; N] = core::array::from_fn(|i| (i % 3) as f32 - 0.7);
        let mut power = [0.; N / 2 + 1];
        spectrum.compute(&frame, &mut power);
        assert!(spectrum.im[0].abs() < 1e-4);
        assert!(spectrum.im[N / 2].abs() < 1e-4);
        let dc: f32 = (0..N).map(|i| frame[i] * spectrum.hann[i]).sum();
        assert!((power[0] - dc * dc).abs() < 1e-3);
    }

    #[test]
    fn matches_direct_dft() {
        const N: usize = 32;
        let mut spectrum = PowerSpectrum::<N>::new();
        let frame: [f32; N] = core::array::from_fn(|i| ((i * 7) % 11) as f32 / 11. - 0.5);
        let mut power = [0.; N / 2 + 1];
        spectrum.compute(&frame, &mut power);
        for k in 0..=N / 2 {
            let (mut re, mut im) = (0f64, 0f64);
            for (i, v) in frame.iter().enumerate() {
                let x = (*v * spectrum.hann[i]) as f64;
                let phase = -2. * core::f64::consts::PI * (k * i) as f64 / N as f64;
                re += x * phase.cos();
                im += x * phase.sin();
            }
            let expected = (re * re + im * im) as f32;
            assert!((power[k] - expected).abs() < 1e-2 * (1. + expected), "bin {k}");
        }
    }
}
