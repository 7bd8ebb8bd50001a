mod audio;
mod fs;
mod input;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use dubsiren_core::{Coordinate, Library, SampleSearch, ScanConfig, VoicePool, SAMPLE_RATE};
use std::{io::BufRead, path::PathBuf, sync::mpsc};
use tracing_subscriber::EnvFilter;

use audio::{Cmd, Loader};
use fs::LinuxFileHandler;

/// Trigger samples from a folder of wavs, laid out by timbre on a 2d plane.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// directory holding the sample library
    root: PathBuf,
    /// where the coordinate map is kept [default: <ROOT>/cloud.data]
    #[arg(long)]
    map: Option<PathBuf>,
    /// analyze every sample even if the stored map still matches
    #[arg(long)]
    rescan: bool,
    /// only look at wavs directly under ROOT
    #[arg(long)]
    no_recursive: bool,
    /// substring of the midi input to listen on; first port if omitted
    #[arg(long)]
    midi_port: Option<String>,
    /// print the library as json and exit
    #[arg(long)]
    list: bool,
}

#[derive(serde::Serialize)]
struct Entry<'a> {
    index: usize,
    path: &'a str,
    seconds: f32,
    #[serde(flatten)]
    coordinate: Coordinate,
}

fn path_str(path: PathBuf) -> Result<String> {
    path.into_os_string()
        .into_string()
        .map_err(|path| eyre!("{} is not valid utf-8", path.to_string_lossy()))
}

fn print_library(library: &Library) -> Result<()> {
    let entries: Vec<_> = library
        .iter()
        .enumerate()
        .map(|(index, (identity, coordinate))| Entry {
            index,
            path: &identity.path,
            seconds: identity.num_samples as f32 / SAMPLE_RATE as f32,
            coordinate,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let map = args.map.unwrap_or_else(|| args.root.join("cloud.data"));
    let config = ScanConfig {
        root: path_str(args.root)?,
        map_path: path_str(map)?,
        recursive: !args.no_recursive,
        force_rescan: args.rescan,
    };

    let mut fs = LinuxFileHandler {};
    let (library, report) = dubsiren_core::scan(&config, &mut fs)?;
    tracing::info!(
        samples = library.len(),
        found = report.found,
        analyzed = report.analyzed,
        map_reused = report.map_reused,
        "library ready"
    );
    if args.list {
        print_library(&library)?;
        return Ok(());
    }

    let search = SampleSearch::from_coordinates(library.coordinates());
    let (pool, mixer) = VoicePool::new(library);
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let loader = Loader::new(pool, search, fs, cmd_rx).spawn();

    let _stream = audio::start_output(mixer)?;
    let _midi = input::connect(args.midi_port.as_deref(), cmd_tx.clone())?;

    for line in std::io::stdin().lock().lines() {
        match input::parse_line(&line?) {
            Some(Cmd::Quit) => break,
            Some(cmd) => cmd_tx.send(cmd)?,
            None => tracing::warn!("expected `<index>[!]`, `<x> <y>`, `s` or `q`"),
        }
    }
    cmd_tx.send(Cmd::Quit)?;
    loader
        .join()
        .map_err(|_| eyre!("loader thread panicked"))?
        .shutdown();
    Ok(())
}
