//! the set of sounding voices, shared between the render and background contexts

use crate::{
    snapshot::{self, Reader, Writer},
    voice::{Stream, Voice},
    Error, FileHandler, Library, SampleSearch, VoiceState, MAX_VOICES,
};
use alloc::sync::Arc;

type Snapshot<const VOICES: usize> = heapless::Vec<Arc<Voice>, VOICES>;

/// Background half of the pool: triggers voices, feeds them, retires them.
///
/// Every change to the voice list is published as a fresh snapshot that the
/// [`Mixer`] picks up on its next frame.
pub struct VoicePool<F: FileHandler, const VOICES: usize = MAX_VOICES> {
    library: Library,
    voices: Writer<Snapshot<VOICES>>,
    /// `streams[i]` feeds `voices.current()[i]`
    streams: heapless::Vec<Stream<F>, VOICES>,
}

/// Render half of the pool; never blocks, allocates or touches storage.
pub struct Mixer<const VOICES: usize = MAX_VOICES> {
    voices: Reader<Snapshot<VOICES>>,
}

impl<const VOICES: usize> Mixer<VOICES> {
    /// sum of every voice's next sample
    pub fn mix_frame(&mut self) -> f32 {
        self.voices.read(|voices| {
            voices
                .iter()
                .map(|voice| voice.pull_sample() as f32 / 32768.)
                .sum()
        })
    }
}

impl<F: FileHandler, const VOICES: usize> VoicePool<F, VOICES> {
    pub fn new(library: Library) -> (Self, Mixer<VOICES>) {
        const { assert!(VOICES > 0) };
        let (writer, reader) = snapshot::channel(Snapshot::new());
        (
            Self {
                library,
                voices: writer,
                streams: heapless::Vec::new(),
            },
            Mixer { voices: reader },
        )
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// library indices of the published voices, oldest first
    pub fn voices(&self) -> impl Iterator<Item = usize> + '_ {
        self.voices.current().iter().map(|voice| voice.sample)
    }

    pub fn states(&self) -> impl Iterator<Item = (usize, VoiceState)> + '_ {
        self.voices
            .current()
            .iter()
            .map(|voice| (voice.sample, voice.state()))
    }

    /// underruns summed over the published voices
    pub fn underruns(&self) -> u32 {
        self.voices
            .current()
            .iter()
            .map(|voice| voice.underruns())
            .sum()
    }

    /// Start library entry `index`, evicting the oldest voice if the pool is full.
    ///
    /// With `retrigger`, voices already playing `index` are dropped first.
    pub fn trigger(
        &mut self,
        index: usize,
        retrigger: bool,
        fs: &mut F,
    ) -> Result<(), Error<F::Error>> {
        let identity = self.library.get(index).ok_or(Error::InvalidIndex {
            index,
            len: self.library.len(),
        })?;
        let (voice, stream) = Voice::new(index, identity, fs).map_err(Error::Io)?;

        let mut voices = Snapshot::<VOICES>::new();
        let mut streams = heapless::Vec::new();
        let old_streams = core::mem::take(&mut self.streams);
        for (old, old_stream) in self.voices.current().iter().zip(old_streams) {
            if retrigger && old.sample == index {
                close(fs, &old_stream, old.sample);
                continue;
            }
            // same length as the snapshot they were taken from
            let _ = voices.push(old.clone());
            let _ = streams.push(old_stream);
        }
        if voices.is_full() {
            let evicted = voices.remove(0);
            close(fs, &streams.remove(0), evicted.sample);
            tracing::debug!(sample = evicted.sample, "evicted");
        }
        // room was made above
        let _ = voices.push(Arc::new(voice));
        let _ = streams.push(stream);

        self.voices.publish(voices);
        self.streams = streams;
        Ok(())
    }

    /// trigger whichever sample sits closest to `(x, y)`, returning its index
    pub fn trigger_at(
        &mut self,
        search: &SampleSearch,
        x: f32,
        y: f32,
        retrigger: bool,
        fs: &mut F,
    ) -> Result<usize, Error<F::Error>> {
        let index = search.lookup(x, y)?;
        self.trigger(index, retrigger, fs)?;
        Ok(index)
    }

    /// Refill every voice that asked for data, then drop finished voices.
    ///
    /// A voice whose refill fails is silenced and retired while the others keep
    /// being serviced; the first such error is returned afterwards.
    pub fn service_loading(&mut self, fs: &mut F) -> Result<(), Error<F::Error>> {
        let mut failure = None;
        for (voice, stream) in self.voices.current().iter().zip(self.streams.iter_mut()) {
            if !voice.is_playing() {
                continue;
            }
            if let Err(e) = stream.refill(voice, fs) {
                tracing::warn!(sample = voice.sample, "refill failed, stopping voice: {e:?}");
                voice.stop();
                failure.get_or_insert(e);
            }
        }

        if self.voices.current().iter().any(|voice| !voice.is_playing()) {
            self.retain_playing(fs);
        }
        self.voices.reclaim();
        failure.map_or(Ok(()), |e| Err(Error::Io(e)))
    }

    fn retain_playing(&mut self, fs: &mut F) {
        let mut voices = Snapshot::<VOICES>::new();
        let mut streams = heapless::Vec::new();
        let old_streams = core::mem::take(&mut self.streams);
        for (voice, stream) in self.voices.current().iter().zip(old_streams) {
            if voice.is_playing() {
                let _ = voices.push(voice.clone());
                let _ = streams.push(stream);
            } else {
                if voice.underruns() > 0 {
                    tracing::debug!(
                        sample = voice.sample,
                        underruns = voice.underruns(),
                        "finished"
                    );
                }
                close(fs, &stream, voice.sample);
            }
        }
        self.voices.publish(voices);
        self.streams = streams;
    }

    /// silence everything at once
    pub fn stop_all(&mut self, fs: &mut F) {
        for (voice, stream) in self.voices.current().iter().zip(&self.streams) {
            close(fs, stream, voice.sample);
        }
        self.streams.clear();
        self.voices.publish(Snapshot::new());
    }

    /// stop all voices and hand the library back
    pub fn into_library(mut self, fs: &mut F) -> Library {
        self.stop_all(fs);
        self.library
    }
}

fn close<F: FileHandler>(fs: &mut F, stream: &Stream<F>, sample: usize) {
    if let Err(e) = fs.close(&stream.file) {
        tracing::warn!(sample, "failed to close voice file: {e:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{ramp, wav_bytes, MemFs},
        Coordinate, SampleIdentity, BUFFER_LEN, SAMPLE_RATE,
    };
    use alloc::{format, vec::Vec};

    const LEN: usize = BUFFER_LEN * 3 + 7;

    fn library(fs: &mut MemFs, count: usize) -> Library {
        let mut library = Library::new();
        for i in 0..count {
            let path = format!("/{i}.wav");
            let samples: Vec<i16> = ramp(LEN).iter().map(|v| v + i as i16).collect();
            fs.insert(&path, wav_bytes(&samples, SAMPLE_RATE));
            let identity = SampleIdentity::open(&path, fs).unwrap();
            let _ = library.push(identity, Coordinate::new(i as f32 / count as f32, 0.));
        }
        library
    }

    fn pool(count: usize) -> (MemFs, VoicePool<MemFs, 4>, Mixer<4>) {
        let mut fs = MemFs::new();
        let library = library(&mut fs, count);
        let (pool, mixer) = VoicePool::new(library);
        (fs, pool, mixer)
    }

    fn voices(pool: &VoicePool<MemFs, 4>) -> Vec<usize> {
        pool.voices().collect()
    }

    #[test]
    fn empty_pool_is_silent() {
        let (_, _pool, mut mixer) = pool(1);
        assert_eq!(mixer.mix_frame(), 0.);
    }

    #[test]
    fn full_pool_evicts_oldest() {
        let (mut fs, mut pool, _mixer) = pool(6);
        // the incoming voice opens before the oldest one closes
        fs.max_handles = Some(4 + 1);
        for i in 0..4 {
            pool.trigger(i, false, &mut fs).unwrap();
        }
        assert_eq!(voices(&pool), [0, 1, 2, 3]);
        pool.trigger(5, false, &mut fs).unwrap();
        assert_eq!(voices(&pool), [1, 2, 3, 5]);
        // one handle per voice, none for the library
        assert_eq!(fs.open_handles, 4);
        for i in 0..20 {
            pool.trigger(i % 6, false, &mut fs).unwrap();
        }
        assert_eq!(fs.open_handles, 4);
    }

    #[test]
    fn retrigger_keeps_one_voice_per_sample() {
        let (mut fs, mut pool, _mixer) = pool(3);
        pool.trigger(1, false, &mut fs).unwrap();
        pool.trigger(1, false, &mut fs).unwrap();
        assert_eq!(voices(&pool), [1, 1]);
        pool.trigger(0, false, &mut fs).unwrap();
        pool.trigger(1, true, &mut fs).unwrap();
        assert_eq!(voices(&pool), [0, 1]);
        assert_eq!(fs.open_handles, 2);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let (mut fs, mut pool, _mixer) = pool(3);
        for i in 0..20 {
            pool.trigger(i % 3, i % 2 == 0, &mut fs).unwrap();
            assert!(pool.voices().count() <= 4);
        }
    }

    #[test]
    fn invalid_index_changes_nothing() {
        let (mut fs, mut pool, _mixer) = pool(2);
        pool.trigger(0, false, &mut fs).unwrap();
        assert!(matches!(
            pool.trigger(2, false, &mut fs),
            Err(Error::InvalidIndex { index: 2, len: 2 })
        ));
        assert_eq!(voices(&pool), [0]);
    }

    #[test]
    fn mixes_and_collects_finished_voices() {
        let (mut fs, mut pool, mut mixer) = pool(2);
        pool.trigger(0, false, &mut fs).unwrap();
        pool.trigger(1, false, &mut fs).unwrap();
        let expected: Vec<f32> = ramp(LEN)
            .iter()
            .map(|&v| v as f32 / 32768. + (v + 1) as f32 / 32768.)
            .collect();

        for (i, expected) in expected.iter().enumerate() {
            let frame = mixer.mix_frame();
            assert!((frame - expected).abs() < 1e-6, "frame {i}");
            pool.service_loading(&mut fs).unwrap();
        }
        assert_eq!(pool.underruns(), 0);
        assert_eq!(pool.voices().count(), 0);
        assert_eq!(fs.open_handles, 0);
        assert_eq!(mixer.mix_frame(), 0.);
    }

    #[test]
    fn refill_failure_stops_only_that_voice() {
        let (mut fs, mut pool, mut mixer) = pool(2);
        pool.trigger(0, false, &mut fs).unwrap();
        mixer.mix_frame();
        fs.fail_reads = true;
        assert!(matches!(pool.service_loading(&mut fs), Err(Error::Io(_))));
        assert_eq!(pool.voices().count(), 0);

        fs.fail_reads = false;
        pool.trigger(1, false, &mut fs).unwrap();
        assert_eq!(voices(&pool), [1]);
        assert_eq!(pool.states().next(), Some((1, VoiceState::Active)));
    }

    #[test]
    fn trigger_by_coordinate() {
        let (mut fs, mut pool, _mixer) = pool(4);
        let search = SampleSearch::from_coordinates(pool.library().coordinates());
        let index = pool.trigger_at(&search, 0.7, 0., false, &mut fs).unwrap();
        assert_eq!(index, 3);
        assert_eq!(voices(&pool), [3]);

        let empty = SampleSearch::default();
        assert!(matches!(
            pool.trigger_at(&empty, 0., 0., false, &mut fs),
            Err(Error::IndexUnavailable)
        ));
    }

    #[test]
    fn stop_all_closes_everything() {
        let (mut fs, mut pool, mut mixer) = pool(3);
        for i in 0..3 {
            pool.trigger(i, false, &mut fs).unwrap();
        }
        mixer.mix_frame();
        pool.stop_all(&mut fs);
        assert_eq!(mixer.mix_frame(), 0.);
        assert_eq!(fs.open_handles, 0);
        let library = pool.into_library(&mut fs);
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn render_thread_while_triggering() {
        let (mut fs, mut pool, mut mixer) = pool(4);
        let done = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let render = {
            let done = done.clone();
            std::thread::spawn(move || {
                let mut frames = 0usize;
                while !done.load(core::sync::atomic::Ordering::Relaxed) {
                    assert!(mixer.mix_frame().abs() <= 4.);
                    frames += 1;
                }
                frames
            })
        };
        for i in 0..200 {
            pool.trigger(i % 4, i % 3 == 0, &mut fs).unwrap();
            for _ in 0..10 {
                pool.service_loading(&mut fs).unwrap();
            }
        }
        done.store(true, core::sync::atomic::Ordering::Relaxed);
        assert!(render.join().unwrap() > 0);
        pool.stop_all(&mut fs);
        assert_eq!(fs.open_handles, 0);
    }
}
