use crate::fs::LinuxFileHandler;
use color_eyre::{eyre::eyre, Result};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use dubsiren_core::{Error, Mixer, SampleSearch, VoicePool, SAMPLE_RATE};
use std::{
    sync::mpsc::{Receiver, TryRecvError},
    thread::JoinHandle,
    time::Duration,
};

/// how often the loader wakes to refill voices
const SERVICE_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub enum Cmd {
    Trigger { index: usize, retrigger: bool },
    TriggerAt { x: f32, y: f32, retrigger: bool },
    StopAll,
    Quit,
}

/// Background context: owns the pool's writer half and every file handle.
pub struct Loader {
    pool: VoicePool<LinuxFileHandler>,
    search: SampleSearch,
    fs: LinuxFileHandler,
    cmd_rx: Receiver<Cmd>,
}

impl Loader {
    pub fn new(
        pool: VoicePool<LinuxFileHandler>,
        search: SampleSearch,
        fs: LinuxFileHandler,
        cmd_rx: Receiver<Cmd>,
    ) -> Self {
        Self {
            pool,
            search,
            fs,
            cmd_rx,
        }
    }

    /// false once asked to quit
    fn handle(&mut self, cmd: Cmd) -> bool {
        let result = match cmd {
            Cmd::Trigger { index, retrigger } => self.pool.trigger(index, retrigger, &mut self.fs),
            Cmd::TriggerAt { x, y, retrigger } => self
                .pool
                .trigger_at(&self.search, x, y, retrigger, &mut self.fs)
                .map(|index| tracing::debug!(index, x, y, "triggered")),
            Cmd::StopAll => {
                self.pool.stop_all(&mut self.fs);
                Ok(())
            }
            Cmd::Quit => return false,
        };
        match result {
            Ok(()) => (),
            Err(Error::IndexUnavailable) => tracing::warn!("no samples to trigger"),
            Err(e) => tracing::warn!("trigger failed: {e}"),
        }
        true
    }

    /// Drain pending commands, then refill; returns false once the loader should exit.
    pub fn tick(&mut self) -> bool {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => {
                    if !self.handle(cmd) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
        if let Err(e) = self.pool.service_loading(&mut self.fs) {
            tracing::warn!("{e}");
        }
        true
    }

    pub fn spawn(mut self) -> JoinHandle<Self> {
        std::thread::spawn(move || {
            while self.tick() {
                std::thread::sleep(SERVICE_PERIOD);
            }
            self
        })
    }

    /// stop every voice and release its file
    pub fn shutdown(self) {
        let Self { pool, mut fs, .. } = self;
        let library = pool.into_library(&mut fs);
        tracing::debug!(samples = library.len(), "loader stopped");
    }

    #[cfg(test)]
    fn pool(&self) -> &VoicePool<LinuxFileHandler> {
        &self.pool
    }
}

fn write_frames<T>(mixer: &mut Mixer, buffer: &mut [T], channels: usize)
where
    T: SizedSample + FromSample<f32>,
{
    for frame in buffer.chunks_mut(channels) {
        frame.fill(T::from_sample(mixer.mix_frame()));
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut mixer: Mixer,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _| write_frames(&mut mixer, data, channels),
        |err| tracing::error!("output stream: {err}"),
        None,
    )?)
}

/// open the default output at the library rate and start rendering `mixer`
pub fn start_output(mixer: Mixer) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no output device"))?;
    let rate = cpal::SampleRate(SAMPLE_RATE);
    let supported = device
        .supported_output_configs()?
        .find(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .map(|range| range.with_sample_rate(rate));
    let supported = match supported {
        Some(supported) => supported,
        None => {
            let fallback = device.default_output_config()?;
            tracing::warn!(
                rate = fallback.sample_rate().0,
                "device cannot run at {SAMPLE_RATE} hz, samples will play off pitch"
            );
            fallback
        }
    };
    tracing::info!(
        device = %device.name().unwrap_or_default(),
        format = ?supported.sample_format(),
        channels = supported.channels(),
        "opening output"
    );

    let config = supported.config();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, mixer)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
        format => return Err(eyre!("unsupported sample format {format}")),
    };
    stream.play()?;
    Ok(stream)
}
