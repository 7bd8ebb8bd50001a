//! library discovery, fingerprinting and coordinate map upkeep

use crate::{
    analysis::FeatureExtractor, hash_path, parse_header, Coordinate, CoordinateMap,
    CoordinateRecord, Error, FileHandler, Library, SampleIdentity, BUFFER_LEN, MAP_PATH,
    MAX_SAMPLES, WAV_EXTENSIONS,
};
use alloc::{boxed::Box, string::String, vec::Vec};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// directory searched for samples
    pub root: String,
    /// where the coordinate map lives
    pub map_path: String,
    pub recursive: bool,
    /// ignore any stored map and analyze everything
    pub force_rescan: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: "/".into(),
            map_path: MAP_PATH.into(),
            recursive: true,
            force_rescan: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// distinct sample files found
    pub found: usize,
    /// files dropped for sharing a path hash with another
    pub collisions: usize,
    /// files run through feature extraction
    pub analyzed: usize,
    /// files left out of the library: failed analysis (now or in the stored
    /// map) or failed to open
    pub rejected: usize,
    /// whether the stored map was trusted as-is
    pub map_reused: bool,
}

/// Find every sample under `config.root`, place it in the cloud and open it.
///
/// The stored map is reused when its records match the files found one to one;
/// otherwise every file is analyzed and the map rewritten. Unreadable files are
/// logged and left out.
#[tracing::instrument(skip_all, fields(root = %config.root))]
pub fn scan<F: FileHandler>(
    config: &ScanConfig,
    fs: &mut F,
) -> Result<(Library, ScanReport), Error<F::Error>> {
    let mut report = ScanReport::default();

    let mut files: Vec<(u64, String)> = Vec::new();
    fs.for_each_file(&config.root, WAV_EXTENSIONS, config.recursive, &mut |path: &str| {
        if files.len() >= MAX_SAMPLES {
            return false;
        }
        files.push((hash_path(path), path.into()));
        true
    })
    .map_err(Error::Io)?;
    if files.len() >= MAX_SAMPLES {
        tracing::warn!("library full, ignoring files past {MAX_SAMPLES}");
    }
    files.sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let before = files.len();
    files.dedup_by(|later, kept| {
        let collides = later.0 == kept.0;
        if collides {
            tracing::warn!(kept = %kept.1, dropped = %later.1, "path hash collision");
        }
        collides
    });
    report.collisions = before - files.len();
    report.found = files.len();
    tracing::info!("found {} samples", files.len());

    let map = match stored_map(config, &files, fs) {
        Some(map) => {
            report.map_reused = true;
            map
        }
        None => {
            let map = analyze_all(&files, fs, &mut report);
            if let Err(e) = map.save(&config.map_path, fs) {
                tracing::warn!(path = %config.map_path, "failed to write coordinate map: {e:?}");
            }
            map
        }
    };

    let mut library = Library::new();
    for record in &map.records {
        let Ok(i) = files.binary_search_by_key(&record.hash, |file| file.0) else {
            tracing::warn!(hash = record.hash, "no file for map record");
            continue;
        };
        let path = &files[i].1;
        if record.is_rejected() {
            // counted by `analyze_all` on a fresh scan
            if report.map_reused {
                tracing::debug!(%path, "skipping sample rejected by an earlier scan");
                report.rejected += 1;
            }
            continue;
        }
        let identity = match SampleIdentity::open(path, fs) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(%path, "skipping sample: {e}");
                report.rejected += 1;
                continue;
            }
        };
        if library.push(identity, record.coordinate()).is_err() {
            break;
        }
    }

    tracing::info!(
        samples = library.len(),
        analyzed = report.analyzed,
        rejected = report.rejected,
        reused = report.map_reused,
        "scan complete"
    );
    Ok((library, report))
}

/// the stored map, if it still describes exactly `files`
fn stored_map<F: FileHandler>(
    config: &ScanConfig,
    files: &[(u64, String)],
    fs: &mut F,
) -> Option<CoordinateMap> {
    if config.force_rescan {
        tracing::info!("rescan forced");
        return None;
    }
    let mut map = match CoordinateMap::load(&config.map_path, fs) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %config.map_path, "rebuilding coordinate map: {e}");
            return None;
        }
    };
    map.records.sort_unstable_by_key(|record| record.hash);
    let same = map
        .records
        .iter()
        .map(|record| record.hash)
        .eq(files.iter().map(|file| file.0));
    if !same {
        tracing::info!(
            stored = map.len(),
            found = files.len(),
            "library changed, rebuilding coordinate map"
        );
        return None;
    }
    tracing::info!("reusing {} stored coordinates", map.len());
    Some(map)
}

fn analyze_all<F: FileHandler>(
    files: &[(u64, String)],
    fs: &mut F,
    report: &mut ScanReport,
) -> CoordinateMap {
    let mut extractor = Box::new(FeatureExtractor::new());
    let mut records = Vec::with_capacity(files.len());
    for (i, (hash, path)) in files.iter().enumerate() {
        tracing::info!("analyzing {}/{}: {path}", i + 1, files.len());
        match analyze_file(path, fs, &mut extractor) {
            Ok(coordinate) => {
                tracing::debug!(%path, x = coordinate.x, y = coordinate.y, "analyzed");
                report.analyzed += 1;
                records.push(CoordinateRecord::new(*hash, coordinate));
            }
            Err(Error::Format(e)) => {
                tracing::warn!(%path, "skipping sample: {e}");
                report.rejected += 1;
                // permanent for this file; remembered so the map stays valid
                records.push(CoordinateRecord::rejected(*hash));
            }
            Err(e) => {
                // may be transient, so it is not remembered and the next scan retries
                tracing::warn!(%path, "skipping sample: {e}");
                report.rejected += 1;
            }
        }
    }
    normalize(&mut records);
    CoordinateMap::new(records)
}

/// stream the pcm of `path` through `extractor`
pub(crate) fn analyze_file<F: FileHandler>(
    path: &str,
    fs: &mut F,
    extractor: &mut FeatureExtractor,
) -> Result<Coordinate, Error<F::Error>> {
    let mut file = fs.open(path).map_err(Error::Io)?;
    let result = feed(&mut file, fs, extractor);
    fs.close(&file).map_err(Error::Io)?;
    result
}

fn feed<F: FileHandler>(
    file: &mut F::File,
    fs: &mut F,
    extractor: &mut FeatureExtractor,
) -> Result<Coordinate, Error<F::Error>> {
    let header = parse_header(fs, file)?;
    extractor.reset();
    let mut buffer = [0i16; BUFFER_LEN];
    let mut remaining = header.num_samples as usize;
    while remaining > 0 {
        let want = remaining.min(BUFFER_LEN);
        let bytes = fs
            .read_full(file, bytemuck::cast_slice_mut(&mut buffer[..want]))
            .map_err(Error::Io)?;
        let len = bytes / 2;
        for sample in &mut buffer[..len] {
            *sample = i16::from_le(*sample);
        }
        extractor.push_pcm(&buffer[..len]);
        if len < want {
            // data chunk claims more than the file holds
            break;
        }
        remaining -= len;
    }
    Ok(extractor.finish())
}

/// Stretch each axis onto `[0, 1]`; an axis with no spread collapses to 0.5.
/// Rejected records are left as they are.
fn normalize(records: &mut [CoordinateRecord]) {
    fn axis(records: &mut [CoordinateRecord], get: fn(&mut CoordinateRecord) -> &mut f32) {
        let (min, max) = records
            .iter_mut()
            .filter(|record| !record.is_rejected())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), record| {
                let v = *get(record);
                (min.min(v), max.max(v))
            });
        let range = max - min;
        for record in records.iter_mut().filter(|record| !record.is_rejected()) {
            let v = get(record);
            *v = if range > 0. && range.is_finite() {
                (*v - min) / range
            } else {
                0.5
            };
        }
    }
    axis(records, |record| &mut record.x);
    axis(records, |record| &mut record.y);
}
