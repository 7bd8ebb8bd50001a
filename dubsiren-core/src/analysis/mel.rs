use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
#[allow(unused_imports)]
use micromath::F32Ext;

// slaney mel scale: linear below 1khz, logarithmic above
const F_SP: f32 = 200. / 3.;
const MIN_LOG_HZ: f32 = 1000.;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
/// ln(6.4) / 27
const LOG_STEP: f32 = 0.068_751_78;

/// floor before conversion to db
const AMIN: f32 = 1e-10;

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / LOG_STEP
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOG_STEP * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

pub fn power_to_db(power: f32) -> f32 {
    10. * power.max(AMIN).log10()
}

/// triangular filter, stored as its non-zero run
struct MelFilter {
    start_bin: usize,
    coefs: Vec<f32>,
}

impl MelFilter {
    fn energy(&self, power: &[f32]) -> f32 {
        power[self.start_bin..]
            .iter()
            .zip(&self.coefs)
            .map(|(p, c)| p * c)
            .sum()
    }
}

/// `BANDS` area-normalized triangles spanning 0 hz to nyquist
pub struct MelFilterbank<const BANDS: usize> {
    filters: Vec<MelFilter>,
}

impl<const BANDS: usize> MelFilterbank<BANDS> {
    /// filters over a one-sided spectrum of `bins` bins at `sample_rate`
    pub fn new(sample_rate: u32, bins: usize) -> Self {
        let nyquist = sample_rate as f32 / 2.;
        let low = hz_to_mel(0.);
        let step = (hz_to_mel(nyquist) - low) / (BANDS + 1) as f32;
        let edges: Vec<f32> = (0..BANDS + 2)
            .map(|i| mel_to_hz(low + i as f32 * step))
            .collect();
        let bin_hz = nyquist / (bins - 1) as f32;

        let filters = edges
            .windows(3)
            .map(|edge| {
                let (lower, center, upper) = (edge[0], edge[1], edge[2]);
                // constant energy per channel
                let enorm = 2. / (upper - lower);
                let weight = |bin: usize| {
                    let hz = bin as f32 * bin_hz;
                    let rising = (hz - lower) / (center - lower);
                    let falling = (upper - hz) / (upper - center);
                    rising.min(falling).max(0.) * enorm
                };
                let Some(start_bin) = (0..bins).find(|&bin| weight(bin) > 0.) else {
                    return MelFilter {
                        start_bin: 0,
                        coefs: Vec::new(),
                    };
                };
                let coefs = (start_bin..bins)
                    .map(weight)
                    .take_while(|&w| w > 0.)
                    .collect();
                MelFilter { start_bin, coefs }
            })
            .collect();
        Self { filters }
    }

    /// Log mel energies of `power`, clamped to `top_db` below the loudest band.
    pub fn log_energies(&self, power: &[f32], top_db: f32, out: &mut [f32; BANDS]) {
        let mut max_db = f32::NEG_INFINITY;
        for (filter, db) in self.filters.iter().zip(out.iter_mut()) {
            *db = power_to_db(filter.energy(power).max(f32::EPSILON));
            max_db = max_db.max(*db);
        }
        let min_db = max_db - top_db;
        for db in out.iter_mut() {
            *db = db.max(min_db);
        }
    }

    pub fn start_bin(&self, band: usize) -> usize {
        self.filters[band].start_bin
    }

    pub fn coefficients(&self, band: usize) -> &[f32] {
        &self.filters[band].coefs
    }
}
