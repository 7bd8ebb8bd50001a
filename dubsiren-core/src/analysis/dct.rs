use core::f32::consts::PI;

#[cfg(not(feature = "std"))]
#[allow(unused_imports)]
use micromath::F32Ext;

/// orthonormal DCT-II, table driven
pub struct Dct2<const N: usize> {
    basis: [[f32; N]; N],
}

impl<const N: usize> Default for Dct2<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Dct2<N> {
    pub fn new() -> Self {
        let mut basis = [[0.; N]; N];
        for (k, row) in basis.iter_mut().enumerate() {
            let scale = if k == 0 {
                (1. / N as f32).sqrt()
            } else {
                (2. / N as f32).sqrt()
            };
            for (n, v) in row.iter_mut().enumerate() {
                *v = scale * (PI * (2 * n + 1) as f32 * k as f32 / (2 * N) as f32).cos();
            }
        }
        Self { basis }
    }

    pub fn transform(&self, input: &[f32; N], out: &mut [f32; N]) {
        for (row, y) in self.basis.iter().zip(out.iter_mut()) {
            *y = row.iter().zip(input).map(|(b, x)| b * x).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_input_is_all_dc() {
        let dct = Dct2::<32>::new();
        let mut out = [0.; 32];
        dct.transform(&[2.; 32], &mut out);
        // sqrt(32) * 2
        assert!((out[0] - 11.313_708).abs() < 1e-3);
        assert!(out[1..].iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn preserves_energy() {
        let dct = Dct2::<8>::new();
        let input = [1., -2., 0.5, 3., 0., -1., 4., 0.25];
        let mut out = [0.; 8];
        dct.transform(&input, &mut out);
        let energy = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>();
        assert!((energy(&input) - energy(&out)).abs() < 1e-3);
    }
}
