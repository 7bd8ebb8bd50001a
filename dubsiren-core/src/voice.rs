//! double-buffered streaming playback of one sample

use crate::{FileHandler, SampleIdentity, BUFFER_LEN};
use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering},
};
use embedded_io::SeekFrom;

/// no refill requested; otherwise `pending - 1` is the slot to fill
const NONE: u8 = 0;

#[derive(Clone, Copy, Debug)]
pub struct AudioBuffer {
    pub data: [i16; BUFFER_LEN],
    /// valid samples in `data`
    pub len: usize,
    /// last buffer before the stream loops back to the start
    pub end_of_stream: bool,
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self {
            data: [0; BUFFER_LEN],
            len: 0,
            end_of_stream: false,
        }
    }
}

impl AudioBuffer {
    pub fn samples(&self) -> &[i16] {
        &self.data[..self.len]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    Active,
    /// playing its final buffer
    Draining,
    Finished,
}

/// render-facing half of a playing sample
///
/// `pull_sample` only ever reads the buffer at `current`, and only moves onto
/// the other one after the background has published it by clearing `pending`.
/// the background only writes the slot named by `pending`. no buffer is read
/// and written at once.
pub(crate) struct Voice {
    /// library index
    pub sample: usize,
    buffers: [UnsafeCell<AudioBuffer>; 2],
    // render-owned cursor
    current: AtomicU8,
    index: AtomicUsize,
    stalled: AtomicBool,

    playing: AtomicBool,
    pending: AtomicU8,
    underruns: AtomicU32,
}

// SAFETY: buffer access is serialized by the `pending` hand-off above
unsafe impl Sync for Voice {}

/// background-facing half: where the next refill reads from
pub(crate) struct Stream<F: FileHandler> {
    pub file: F::File,
    pcm_start: u64,
    num_samples: u32,
    /// samples already handed to buffers
    read_pos: u32,
}

impl Voice {
    /// start playback of `identity` from its preloaded first buffer
    pub fn new<F: FileHandler>(
        sample: usize,
        identity: &SampleIdentity,
        fs: &mut F,
    ) -> Result<(Self, Stream<F>), F::Error> {
        let file = fs.open(&identity.path)?;
        let first = identity.first_buffer;
        let stream = Stream {
            file,
            pcm_start: identity.pcm_start,
            num_samples: identity.num_samples,
            read_pos: if first.end_of_stream {
                0
            } else {
                first.len as u32
            },
        };
        let voice = Self {
            sample,
            buffers: [UnsafeCell::new(first), UnsafeCell::new(AudioBuffer::default())],
            current: AtomicU8::new(0),
            index: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
            playing: AtomicBool::new(true),
            pending: AtomicU8::new(NONE),
            underruns: AtomicU32::new(0),
        };
        Ok((voice, stream))
    }

    /// next sample, or silence; render context only
    pub fn pull_sample(&self) -> i16 {
        if !self.playing.load(Ordering::Relaxed) {
            return 0;
        }
        let mut cur = self.current.load(Ordering::Relaxed) as usize;
        if self.stalled.load(Ordering::Relaxed) {
            if self.pending.load(Ordering::Acquire) != NONE {
                return 0;
            }
            cur = 1 - cur;
            self.current.store(cur as u8, Ordering::Relaxed);
            self.index.store(0, Ordering::Relaxed);
            self.stalled.store(false, Ordering::Relaxed);
        }
        // SAFETY: `cur` is never the slot named by `pending`
        let buffer = unsafe { &*self.buffers[cur].get() };
        if buffer.len == 0 {
            self.playing.store(false, Ordering::Relaxed);
            return 0;
        }

        let idx = self.index.load(Ordering::Relaxed);
        if idx == 0 && !buffer.end_of_stream {
            // starting on a fresh buffer, the other one is free to refill
            self.pending.store((1 - cur) as u8 + 1, Ordering::Release);
        }
        let sample = buffer.data[idx];

        if idx + 1 < buffer.len {
            self.index.store(idx + 1, Ordering::Relaxed);
        } else if buffer.end_of_stream {
            self.playing.store(false, Ordering::Relaxed);
        } else if self.pending.load(Ordering::Acquire) == NONE {
            self.current.store((1 - cur) as u8, Ordering::Relaxed);
            self.index.store(0, Ordering::Relaxed);
        } else {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            self.stalled.store(true, Ordering::Relaxed);
        }
        sample
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    pub fn underruns(&self) -> u32 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// background context only
    pub fn state(&self) -> VoiceState {
        if !self.is_playing() {
            return VoiceState::Finished;
        }
        if self.stalled.load(Ordering::Relaxed) {
            return VoiceState::Active;
        }
        let cur = self.current.load(Ordering::Relaxed) as usize;
        // SAFETY: the only writer of either buffer is `Stream::refill`, which
        // runs on this same context
        if unsafe { &*self.buffers[cur].get() }.end_of_stream {
            VoiceState::Draining
        } else {
            VoiceState::Active
        }
    }
}

impl<F: FileHandler> Stream<F> {
    /// fill the buffer `voice` asked for, if any; returns whether it did
    pub fn refill(&mut self, voice: &Voice, fs: &mut F) -> Result<bool, F::Error> {
        let pending = voice.pending.load(Ordering::Acquire);
        if pending == NONE {
            return Ok(false);
        }
        // SAFETY: the render side won't touch this slot until `pending` clears,
        // and each voice has exactly one stream
        let buffer = unsafe { &mut *voice.buffers[(pending - 1) as usize].get() };

        fs.seek(
            &mut self.file,
            SeekFrom::Start(self.pcm_start + 2 * self.read_pos as u64),
        )?;
        let want = (self.num_samples.saturating_sub(self.read_pos) as usize).min(BUFFER_LEN);
        let bytes = fs.read_full(
            &mut self.file,
            bytemuck::cast_slice_mut(&mut buffer.data[..want]),
        )?;
        let len = bytes / 2;
        for sample in &mut buffer.data[..len] {
            *sample = i16::from_le(*sample);
        }
        buffer.len = len;
        self.read_pos += len as u32;
        buffer.end_of_stream =
            len < want || self.read_pos >= self.num_samples || fs.is_eof(&mut self.file)?;
        if buffer.end_of_stream {
            // next refill starts over
            self.read_pos = 0;
        }

        voice.pending.store(NONE, Ordering::Release);
        Ok(true)
    }
}
