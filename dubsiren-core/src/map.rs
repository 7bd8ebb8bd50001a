//! persisted hash -> coordinate table, so a scan can skip feature extraction

use crate::{analysis::pca::PCA_VERSION, Coordinate, Error, FileHandler, MapError, MAX_SAMPLES};
use alloc::{vec, vec::Vec};
use bytemuck::Zeroable;

const MAGIC: [u8; 4] = *b"DSCM";
const FORMAT_VERSION: u16 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct MapHeader {
    magic: [u8; 4],
    format_version: u16,
    pca_version: u16,
    count: u32,
    /// djb2 over the record bytes
    checksum: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CoordinateRecord {
    pub hash: u64,
    pub x: f32,
    pub y: f32,
}

impl CoordinateRecord {
    pub fn new(hash: u64, coordinate: Coordinate) -> Self {
        Self {
            hash,
            x: coordinate.x,
            y: coordinate.y,
        }
    }

    /// Marks a file that failed analysis, so an unchanged library still
    /// matches the map on the next scan.
    pub fn rejected(hash: u64) -> Self {
        Self {
            hash,
            x: f32::NAN,
            y: f32::NAN,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.x.is_nan() || self.y.is_nan()
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }

    /// swap between native and on-disk (little-endian) order; an involution
    fn le(self) -> Self {
        Self {
            hash: self.hash.to_le(),
            x: f32::from_bits(self.x.to_bits().to_le()),
            y: f32::from_bits(self.y.to_bits().to_le()),
        }
    }
}

impl MapHeader {
    fn le(self) -> Self {
        Self {
            magic: self.magic,
            format_version: self.format_version.to_le(),
            pca_version: self.pca_version.to_le(),
            count: self.count.to_le(),
            checksum: self.checksum.to_le(),
        }
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(5381u32, |h, &c| h.wrapping_mul(33).wrapping_add(c as u32))
}

/// records sorted by hash, as the scanner writes them
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoordinateMap {
    pub records: Vec<CoordinateRecord>,
}

impl CoordinateMap {
    pub fn new(records: Vec<CoordinateRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// read and verify the map at `path`
    pub fn load<F: FileHandler>(path: &str, fs: &mut F) -> Result<Self, Error<F::Error>> {
        let mut file = fs.open(path).map_err(Error::Io)?;
        let result = Self::read(&mut file, fs);
        fs.close(&file).map_err(Error::Io)?;
        result
    }

    fn read<F: FileHandler>(file: &mut F::File, fs: &mut F) -> Result<Self, Error<F::Error>> {
        let mut header = MapHeader::zeroed();
        let n = fs
            .read_full(file, bytemuck::bytes_of_mut(&mut header))
            .map_err(Error::Io)?;
        if n < core::mem::size_of::<MapHeader>() {
            return Err(MapError::Truncated.into());
        }
        let header = header.le();
        if header.magic != MAGIC {
            return Err(MapError::BadMagic.into());
        }
        if header.format_version != FORMAT_VERSION || header.pca_version != PCA_VERSION {
            return Err(MapError::UnsupportedVersion {
                format: header.format_version,
                pca: header.pca_version,
            }
            .into());
        }
        if header.count as usize > MAX_SAMPLES {
            return Err(MapError::TooManyRecords(header.count).into());
        }

        let mut records = vec![CoordinateRecord::zeroed(); header.count as usize];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut records);
        let want = bytes.len();
        if fs.read_full(file, bytes).map_err(Error::Io)? < want {
            return Err(MapError::Truncated.into());
        }
        if checksum(bytemuck::cast_slice(&records)) != header.checksum {
            return Err(MapError::ChecksumMismatch.into());
        }
        for record in &mut records {
            *record = record.le();
        }
        Ok(Self { records })
    }

    /// replace whatever is at `path`
    pub fn save<F: FileHandler>(&self, path: &str, fs: &mut F) -> Result<(), F::Error> {
        let records: Vec<CoordinateRecord> = self.records.iter().map(|v| v.le()).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&records);
        let header = MapHeader {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            pca_version: PCA_VERSION,
            count: records.len() as u32,
            checksum: checksum(bytes),
        }
        .le();

        let mut file = fs.create(path)?;
        let result = fs
            .write_all(&mut file, bytemuck::bytes_of(&header))
            .and_then(|_| fs.write_all(&mut file, bytes));
        fs.close(&file)?;
        result
    }

    /// coordinate stored for `hash`; none for unknown or rejected files
    pub fn get(&self, hash: u64) -> Option<Coordinate> {
        self.records
            .binary_search_by_key(&hash, |v| v.hash)
            .ok()
            .map(|i| self.records[i])
            .filter(|record| !record.is_rejected())
            .map(|record| record.coordinate())
    }
}
