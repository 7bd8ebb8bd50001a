#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

use embedded_io::{ErrorType, SeekFrom};

pub mod analysis;
mod error;
mod library;
mod map;
mod pool;
mod scan;
mod search;
mod snapshot;
mod voice;
mod wav;

#[cfg(test)]
mod test_utils;

pub use error::{Error, FormatError, MapError};
pub use library::{hash_path, Coordinate, Library, SampleIdentity};
pub use map::{CoordinateMap, CoordinateRecord};
pub use pool::{Mixer, VoicePool};
pub use scan::{scan, ScanConfig, ScanReport};
pub use search::SampleSearch;
pub use voice::{AudioBuffer, VoiceState};
pub use wav::{parse_header, WavHeader};

/// in hz; the only rate the library accepts
pub const SAMPLE_RATE: u32 = 48000;
/// i16 samples per streaming buffer
pub const BUFFER_LEN: usize = 512;
/// simultaneously sounding voices
pub const MAX_VOICES: usize = 4;
/// upper bound on library entries
pub const MAX_SAMPLES: usize = 4096;

pub const ANALYSIS_LEN: usize = 1024;
pub const OVERLAP: usize = 2;
pub const POWER_LEN: usize = ANALYSIS_LEN / 2 + 1;
pub const MEL_BANDS: usize = 32;
/// dynamic range kept below the loudest mel band
pub const TOP_DB: f32 = 80.;
pub const FEATURE_LEN: usize = 3 * MEL_BANDS;

pub const WAV_EXTENSIONS: &[&str] = &["wav"];
pub const MAP_PATH: &str = "/cloud.data";

pub trait FileHandler: ErrorType {
    type File;

    /// open file handle for reading
    fn open(&mut self, path: &str) -> Result<Self::File, Self::Error>;

    /// create (or truncate) file for writing
    fn create(&mut self, path: &str) -> Result<Self::File, Self::Error>;

    /// close file
    fn close(&mut self, file: &Self::File) -> Result<(), Self::Error>;

    /// Read some bytes from this source into the specified buffer, returning how many bytes were read.
    ///
    /// If the reader is at end-of-file (EOF), `Ok(0)` is returned. A short read does not imply EOF;
    /// use [`FileHandler::is_eof`] to ask the medium.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write a buffer into this writer, returning how many bytes were written.
    ///
    /// Implementations must not return `Ok(0)` unless `buf` is empty.
    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Seek to an offset, in bytes, in a stream.
    fn seek(&mut self, file: &mut Self::File, pos: SeekFrom) -> Result<u64, Self::Error>;

    /// Returns the current seek position from the start of the stream.
    fn stream_position(&mut self, file: &mut Self::File) -> Result<u64, Self::Error> {
        self.seek(file, SeekFrom::Current(0))
    }

    /// true if the cursor sits at (or past) the end of the file
    fn is_eof(&mut self, file: &mut Self::File) -> Result<bool, Self::Error>;

    /// Call `f` with the path of every file under `root` whose extension matches one of
    /// `extensions` (ascii case-insensitive), descending into subdirectories if `recursive`.
    /// Enumeration stops early once `f` returns false.
    fn for_each_file(
        &mut self,
        root: &str,
        extensions: &[&str],
        recursive: bool,
        f: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), Self::Error>;

    /// fill `buf` completely unless EOF is hit first; returns bytes read
    fn read_full(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(file, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// write all of `buf`
    fn write_all(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<(), Self::Error> {
        let mut slice = buf;
        while !slice.is_empty() {
            let n = self.write(file, slice)?;
            slice = &slice[n..];
        }
        Ok(())
    }
}
