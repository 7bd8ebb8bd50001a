use core::fmt::Debug;

/// why a stream was rejected as a sample; permanent for that file
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("missing RIFF header")]
    NotRiff,
    #[error("RIFF form is not WAVE")]
    NotWave,
    #[error("`{0}` chunk not found")]
    MissingChunk(&'static str),
    #[error("unsupported encoding {0:#06x}")]
    UnsupportedEncoding(u16),
    #[error("{0} channels, expected mono")]
    UnsupportedChannels(u16),
    #[error("{0} bits per sample, expected 16")]
    UnsupportedBitDepth(u16),
    #[error("{0} hz, expected {rate}", rate = crate::SAMPLE_RATE)]
    UnsupportedSampleRate(u32),
    #[error("stream ended inside the header")]
    Truncated,
}

/// why a persisted coordinate map can't be trusted; forces a rescan
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("bad magic")]
    BadMagic,
    #[error("format version {format}/pca version {pca} not supported")]
    UnsupportedVersion { format: u16, pca: u16 },
    #[error("{0} records exceed library capacity")]
    TooManyRecords(u32),
    #[error("map ends before its last record")]
    Truncated,
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E: Debug> {
    #[error("storage: {0:?}")]
    Io(E),
    #[error("bad wav: {0}")]
    Format(#[from] FormatError),
    #[error("bad coordinate map: {0}")]
    Map(#[from] MapError),
    #[error("sample index {index} out of range for {len} samples")]
    InvalidIndex { index: usize, len: usize },
    #[error("spatial index holds no samples")]
    IndexUnavailable,
}
