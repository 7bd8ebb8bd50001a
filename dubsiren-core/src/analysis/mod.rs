//! perceptual fingerprinting of samples
//!
//! pcm -> windows -> power spectrum -> log mel energies -> cepstra -> per band
//! statistics -> 2d coordinate

pub mod dct;
pub mod mel;
pub mod pca;
pub mod spectrum;
pub mod stats;
pub mod window;

use crate::{
    Coordinate, ANALYSIS_LEN, FEATURE_LEN, MEL_BANDS, OVERLAP, POWER_LEN, SAMPLE_RATE, TOP_DB,
};
use alloc::vec::Vec;
use dct::Dct2;
use mel::MelFilterbank;
use spectrum::PowerSpectrum;
use window::Windower;

pub type FeatureVector = [f32; FEATURE_LEN];

/// Streams samples in, hands a coordinate out.
///
/// One extractor can serve a whole scan; [`FeatureExtractor::finish`] leaves it
/// ready for the next sample.
pub struct FeatureExtractor {
    windower: Windower<ANALYSIS_LEN, OVERLAP>,
    spectrum: PowerSpectrum<ANALYSIS_LEN>,
    filterbank: MelFilterbank<MEL_BANDS>,
    dct: Dct2<MEL_BANDS>,
    frame: [f32; ANALYSIS_LEN],
    power: [f32; POWER_LEN],
    mel: [f32; MEL_BANDS],
    cepstra: Vec<[f32; MEL_BANDS]>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            windower: Windower::default(),
            spectrum: PowerSpectrum::new(),
            filterbank: MelFilterbank::new(SAMPLE_RATE, POWER_LEN),
            dct: Dct2::new(),
            frame: [0.; ANALYSIS_LEN],
            power: [0.; POWER_LEN],
            mel: [0.; MEL_BANDS],
            cepstra: Vec::new(),
        }
    }

    /// one sample in `[-1, 1)`
    pub fn push(&mut self, sample: f32) {
        if self.windower.push(sample) {
            self.analyze_window();
        }
    }

    pub fn push_pcm(&mut self, samples: &[i16]) {
        for &sample in samples {
            self.push(sample as f32 / 32768.);
        }
    }

    /// cepstral frames so far
    pub fn frames(&self) -> usize {
        self.cepstra.len()
    }

    fn analyze_window(&mut self) {
        self.windower.window(&mut self.frame);
        self.spectrum.compute(&self.frame, &mut self.power);
        self.filterbank
            .log_energies(&self.power, TOP_DB, &mut self.mel);
        let mut cepstrum = [0.; MEL_BANDS];
        self.dct.transform(&self.mel, &mut cepstrum);
        self.cepstra.push(cepstrum);
    }

    /// flush the tail and summarize; `None` if no frame was ever produced
    pub fn features(&mut self) -> Option<FeatureVector> {
        if self.windower.flush() {
            self.analyze_window();
        }
        if self.cepstra.is_empty() {
            return None;
        }
        let mut features = [0.; FEATURE_LEN];
        stats::summarize(&self.cepstra, &mut features);
        Some(features)
    }

    /// unnormalized cloud coordinate of everything pushed since the last reset
    pub fn finish(&mut self) -> Coordinate {
        let coordinate = match self.features() {
            Some(features) => pca::project(&features),
            None => {
                tracing::warn!("no analysis frames, placing sample at origin");
                Coordinate::default()
            }
        };
        self.reset();
        coordinate
    }

    pub fn analyze(&mut self, samples: &[i16]) -> Coordinate {
        self.reset();
        self.push_pcm(samples);
        self.finish()
    }

    pub fn reset(&mut self) {
        self.windower.reset();
        self.cepstra.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ramp;

    fn noise(len: usize, seed: u32) -> Vec<i16> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 16) as i16
            })
            .collect()
    }

    #[test]
    fn deterministic() {
        let samples = noise(20_000, 1);
        let mut extractor = FeatureExtractor::new();
        let a = extractor.analyze(&samples);
        let b = extractor.analyze(&samples);
        let c = FeatureExtractor::new().analyze(&samples);
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(a.x.is_finite() && a.y.is_finite());
    }

    #[test]
    fn sub_window_sample_yields_one_frame() {
        let mut extractor = FeatureExtractor::new();
        extractor.push_pcm(&ramp(100));
        assert_eq!(extractor.frames(), 0);
        assert!(extractor.features().is_some());
        assert_eq!(extractor.frames(), 1);
    }

    #[test]
    fn frame_count_for_one_second() {
        let mut extractor = FeatureExtractor::new();
        extractor.push_pcm(&[0; 48000]);
        assert_eq!(extractor.frames(), 48000 / (ANALYSIS_LEN / OVERLAP));
        extractor.features();
        assert_eq!(extractor.frames(), 48000 / (ANALYSIS_LEN / OVERLAP) + 1);
    }

    #[test]
    fn silence_has_flat_mel_energies_and_stable_coordinate() {
        let mut extractor = FeatureExtractor::new();
        extractor.push_pcm(&[0; 48000]);
        let features = extractor.features().unwrap();
        assert!(extractor.mel.iter().all(|&v| v == extractor.mel[0]));
        // flat bands only excite the first cepstral coefficient, and never vary
        assert!(features[MEL_BANDS..].iter().all(|v| v.abs() < 1e-3));

        let a = FeatureExtractor::new().analyze(&[0; 48000]);
        let b = FeatureExtractor::new().analyze(&[0; 48000]);
        assert_eq!(a, b);
    }

    #[test]
    fn no_samples_is_origin() {
        let mut extractor = FeatureExtractor::new();
        assert_eq!(extractor.analyze(&[]), Coordinate::default());
        assert!(extractor.features().is_none());
    }

    #[test]
    fn different_material_lands_apart() {
        let mut extractor = FeatureExtractor::new();
        let hiss = extractor.analyze(&noise(24_000, 7));
        let hum: Vec<i16> = (0..24_000)
            .map(|i| ((i as f32 * 0.01).sin() * 12_000.) as i16)
            .collect();
        let hum = extractor.analyze(&hum);
        assert!(hiss.distance2(&hum) > 1e-6);
    }
}
