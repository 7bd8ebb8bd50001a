//! in-memory storage and wav fixtures for unit tests

use crate::FileHandler;
use alloc::{collections::BTreeMap, string::String, vec::Vec};
use embedded_io::SeekFrom;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    NotFound,
    Injected,
    TooManyOpen,
}

impl embedded_io::Error for MemError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MemError::NotFound => embedded_io::ErrorKind::NotFound,
            MemError::Injected | MemError::TooManyOpen => embedded_io::ErrorKind::Other,
        }
    }
}

#[derive(Debug)]
pub struct MemFile {
    path: String,
    pos: u64,
}

/// flat path -> bytes map standing in for the sd card
#[derive(Default)]
pub struct MemFs {
    pub files: BTreeMap<String, Vec<u8>>,
    pub open_handles: usize,
    /// refuse opens past this many live handles, like a process fd limit
    pub max_handles: Option<usize>,
    /// calls to `open` so far
    pub opens: usize,
    /// fail the `open` call with this (zero-based) number
    pub fail_open_at: Option<usize>,
    /// fail every read once set
    pub fail_reads: bool,
    pub reads: usize,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    fn take_handle(&mut self) -> Result<(), MemError> {
        if self.max_handles.is_some_and(|max| self.open_handles >= max) {
            return Err(MemError::TooManyOpen);
        }
        self.open_handles += 1;
        Ok(())
    }
}

impl embedded_io::ErrorType for MemFs {
    type Error = MemError;
}

impl FileHandler for MemFs {
    type File = MemFile;

    fn open(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.opens += 1;
        if self.fail_open_at == Some(self.opens - 1) {
            return Err(MemError::Injected);
        }
        if !self.files.contains_key(path) {
            return Err(MemError::NotFound);
        }
        self.take_handle()?;
        Ok(MemFile {
            path: path.into(),
            pos: 0,
        })
    }

    fn create(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.take_handle()?;
        self.files.insert(path.into(), Vec::new());
        Ok(MemFile {
            path: path.into(),
            pos: 0,
        })
    }

    fn close(&mut self, _file: &Self::File) -> Result<(), Self::Error> {
        self.open_handles -= 1;
        Ok(())
    }

    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fail_reads {
            return Err(MemError::Injected);
        }
        self.reads += 1;
        let bytes = self.files.get(&file.path).ok_or(MemError::NotFound)?;
        let start = (file.pos as usize).min(bytes.len());
        // short reads on purpose, like a block device handing back one sector at a time
        let n = buf.len().min(bytes.len() - start).min(300);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        file.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<usize, Self::Error> {
        let bytes = self.files.get_mut(&file.path).ok_or(MemError::NotFound)?;
        let start = file.pos as usize;
        if bytes.len() < start + buf.len() {
            bytes.resize(start + buf.len(), 0);
        }
        bytes[start..start + buf.len()].copy_from_slice(buf);
        file.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn seek(&mut self, file: &mut Self::File, pos: SeekFrom) -> Result<u64, Self::Error> {
        let len = self.files.get(&file.path).ok_or(MemError::NotFound)?.len() as i64;
        file.pos = match pos {
            SeekFrom::Start(v) => v as i64,
            SeekFrom::End(v) => len + v,
            SeekFrom::Current(v) => file.pos as i64 + v,
        }
        .max(0) as u64;
        Ok(file.pos)
    }

    fn is_eof(&mut self, file: &mut Self::File) -> Result<bool, Self::Error> {
        let len = self.files.get(&file.path).ok_or(MemError::NotFound)?.len() as u64;
        Ok(file.pos >= len)
    }

    fn for_each_file(
        &mut self,
        root: &str,
        extensions: &[&str],
        recursive: bool,
        f: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), Self::Error> {
        let root = root.trim_end_matches('/');
        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(root).and_then(|v| v.strip_prefix('/')) else {
                continue;
            };
            if !recursive && rest.contains('/') {
                continue;
            }
            let matches = rest
                .rsplit_once('.')
                .is_some_and(|(_, ext)| extensions.iter().any(|v| v.eq_ignore_ascii_case(ext)));
            if matches && !f(path) {
                break;
            }
        }
        Ok(())
    }
}

/// mono 16-bit wav as written by hound
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// hand-assembled RIFF/WAVE from raw chunks, for layouts hound won't write
pub fn riff(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut body = Vec::from(&b"WAVE"[..]);
    for (id, data) in chunks {
        body.extend_from_slice(&id[..]);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }
    let mut bytes = Vec::from(&b"RIFF"[..]);
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

/// 16-byte `fmt ` payload
pub fn fmt_chunk(encoding: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&encoding.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());
    fmt
}

pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// deterministic non-silent test signal
pub fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| ((i * 37) % 2000) as i16 - 1000).collect()
}
