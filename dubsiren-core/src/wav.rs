//! RIFF/WAVE header parsing

use crate::{Error, FileHandler, FormatError, SAMPLE_RATE};
use embedded_io::SeekFrom;

/// unrelated chunks skipped per search before giving up
const MAX_SKIPPED_CHUNKS: usize = 10;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    /// byte offset of the first sample
    pub pcm_start: u64,
    pub num_samples: u32,
}

/// Validate `file` as 48khz mono 16-bit pcm and locate its samples.
///
/// Leaves the cursor on the first sample.
pub fn parse_header<F: FileHandler>(
    fs: &mut F,
    file: &mut F::File,
) -> Result<WavHeader, Error<F::Error>> {
    fs.seek(file, SeekFrom::Start(0)).map_err(Error::Io)?;

    let mut riff = [0u8; 12];
    read_exact(fs, file, &mut riff)?;
    if &riff[..4] != b"RIFF" {
        return Err(FormatError::NotRiff.into());
    }
    if &riff[8..] != b"WAVE" {
        return Err(FormatError::NotWave.into());
    }

    let fmt_len = find_chunk(fs, file, b"fmt ")?;
    if fmt_len < 16 {
        return Err(FormatError::Truncated.into());
    }
    let mut fmt = [0u8; 16];
    read_exact(fs, file, &mut fmt)?;
    let encoding = u16::from_le_bytes([fmt[0], fmt[1]]);
    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
    let bits = u16::from_le_bytes([fmt[14], fmt[15]]);
    if encoding != WAVE_FORMAT_PCM && encoding != WAVE_FORMAT_EXTENSIBLE {
        return Err(FormatError::UnsupportedEncoding(encoding).into());
    }
    if channels != 1 {
        return Err(FormatError::UnsupportedChannels(channels).into());
    }
    if bits != 16 {
        return Err(FormatError::UnsupportedBitDepth(bits).into());
    }
    if sample_rate != SAMPLE_RATE {
        return Err(FormatError::UnsupportedSampleRate(sample_rate).into());
    }
    // rest of `fmt ` (extensible block) plus pad byte
    let rest = padded(fmt_len) - 16;
    if rest > 0 {
        fs.seek(file, SeekFrom::Current(rest as i64))
            .map_err(Error::Io)?;
    }

    let data_len = find_chunk(fs, file, b"data")?;
    let pcm_start = fs.stream_position(file).map_err(Error::Io)?;
    let num_samples = if data_len == 0 {
        // size never patched by the writer; take whatever follows
        let end = fs.seek(file, SeekFrom::End(0)).map_err(Error::Io)?;
        fs.seek(file, SeekFrom::Start(pcm_start))
            .map_err(Error::Io)?;
        (end.saturating_sub(pcm_start) / 2) as u32
    } else {
        data_len / 2
    };

    Ok(WavHeader {
        pcm_start,
        num_samples,
    })
}

/// advance to the body of chunk `id`, returning its size
fn find_chunk<F: FileHandler>(
    fs: &mut F,
    file: &mut F::File,
    id: &'static [u8; 4],
) -> Result<u32, Error<F::Error>> {
    for _ in 0..=MAX_SKIPPED_CHUNKS {
        let mut header = [0u8; 8];
        if fs.read_full(file, &mut header).map_err(Error::Io)? < header.len() {
            break;
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if &header[..4] == id {
            return Ok(len);
        }
        fs.seek(file, SeekFrom::Current(padded(len) as i64))
            .map_err(Error::Io)?;
    }
    // ids are ascii by construction
    Err(FormatError::MissingChunk(core::str::from_utf8(id).unwrap_or("????")).into())
}

/// chunk bodies are word aligned
fn padded(len: u32) -> u64 {
    len as u64 + (len & 1) as u64
}

fn read_exact<F: FileHandler>(
    fs: &mut F,
    file: &mut F::File,
    buf: &mut [u8],
) -> Result<(), Error<F::Error>> {
    if fs.read_full(file, buf).map_err(Error::Io)? < buf.len() {
        return Err(FormatError::Truncated.into());
    }
    Ok(())
}
