//! scanned samples and their place in the cloud

use crate::{parse_header, AudioBuffer, Error, FileHandler, BUFFER_LEN, MAX_SAMPLES};
use alloc::{string::String, vec::Vec};

/// djb2 over the path bytes, widened to 64 bits
pub fn hash_path(path: &str) -> u64 {
    path.bytes()
        .fold(5381u64, |h, c| h.wrapping_mul(33).wrapping_add(c as u64))
}

/// position in the normalized `[0, 1]²` feature plane
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
}

impl Coordinate {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance2(&self, other: &Coordinate) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// A validated sample, ready to be voiced.
///
/// Holds no open file; each voice opens `path` for itself, so a large library
/// costs no file handles.
#[derive(Clone, Debug)]
pub struct SampleIdentity {
    pub hash: u64,
    pub path: String,
    pub pcm_start: u64,
    pub num_samples: u32,
    /// so a trigger sounds before the first refill lands
    pub first_buffer: AudioBuffer,
}

impl SampleIdentity {
    /// open, validate and preload the sample at `path`, then close it again
    pub fn open<F: FileHandler>(path: &str, fs: &mut F) -> Result<Self, Error<F::Error>> {
        let mut file = fs.open(path).map_err(Error::Io)?;
        let preloaded = Self::preload(&mut file, fs);
        fs.close(&file).map_err(Error::Io)?;
        let (header, first_buffer) = preloaded?;
        Ok(Self {
            hash: hash_path(path),
            path: path.into(),
            pcm_start: header.pcm_start,
            num_samples: header.num_samples,
            first_buffer,
        })
    }

    fn preload<F: FileHandler>(
        file: &mut F::File,
        fs: &mut F,
    ) -> Result<(crate::WavHeader, AudioBuffer), Error<F::Error>> {
        let header = parse_header(fs, file)?;
        let mut buffer = AudioBuffer::default();
        let want = (header.num_samples as usize).min(BUFFER_LEN);
        let bytes = fs
            .read_full(file, bytemuck::cast_slice_mut(&mut buffer.data[..want]))
            .map_err(Error::Io)?;
        buffer.len = bytes / 2;
        for sample in &mut buffer.data[..buffer.len] {
            *sample = i16::from_le(*sample);
        }
        buffer.end_of_stream = want < BUFFER_LEN
            || buffer.len < want
            || buffer.len >= header.num_samples as usize
            || fs.is_eof(file).map_err(Error::Io)?;
        Ok((header, buffer))
    }
}

/// every playable sample, addressed by index
#[derive(Clone, Debug, Default)]
pub struct Library {
    samples: Vec<SampleIdentity>,
    coordinates: Vec<Coordinate>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= MAX_SAMPLES
    }

    /// append at the next index; hands the sample back once full
    pub fn push(
        &mut self,
        sample: SampleIdentity,
        coordinate: Coordinate,
    ) -> Result<usize, SampleIdentity> {
        if self.is_full() {
            return Err(sample);
        }
        self.samples.push(sample);
        self.coordinates.push(coordinate);
        Ok(self.samples.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&SampleIdentity> {
        self.samples.get(index)
    }

    pub fn coordinate(&self, index: usize) -> Option<Coordinate> {
        self.coordinates.get(index).copied()
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SampleIdentity, Coordinate)> {
        self.samples.iter().zip(self.coordinates.iter().copied())
    }
}
