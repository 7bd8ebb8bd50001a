use embedded_io::{Read, Seek, Write};
use embedded_io_adapters::std::FromStd;
use std::{io, path::Path};

pub struct LinuxFileHandler {}

impl embedded_io::ErrorType for LinuxFileHandler {
    type Error = <FromStd<std::fs::File> as embedded_io::ErrorType>::Error;
}

impl dubsiren_core::FileHandler for LinuxFileHandler {
    type File = FromStd<std::fs::File>;

    fn open(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        Ok(FromStd::new(std::fs::File::open(path)?))
    }

    fn create(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        Ok(FromStd::new(std::fs::File::create(path)?))
    }

    /// std::fs::File automatically closed when dropped, so impl not needed
    fn close(&mut self, _file: &Self::File) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, Self::Error> {
        file.read(buf)
    }

    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<usize, Self::Error> {
        file.write(buf)
    }

    fn seek(
        &mut self,
        file: &mut Self::File,
        pos: embedded_io::SeekFrom,
    ) -> Result<u64, Self::Error> {
        file.seek(pos)
    }

    fn is_eof(&mut self, file: &mut Self::File) -> Result<bool, Self::Error> {
        let pos = io::Seek::stream_position(file.inner_mut())?;
        Ok(pos >= file.inner().metadata()?.len())
    }

    fn for_each_file(
        &mut self,
        root: &str,
        extensions: &[&str],
        recursive: bool,
        f: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), Self::Error> {
        walk(Path::new(root), extensions, recursive, f).map(|_| ())
    }
}

/// false once `f` asked to stop
fn walk(
    dir: &Path,
    extensions: &[&str],
    recursive: bool,
    f: &mut dyn FnMut(&str) -> bool,
) -> io::Result<bool> {
    let mut entries = std::fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let path = entry.path();
        // dotfiles, trash folders and resource forks
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            if recursive && !walk(&path, extensions, recursive, f)? {
                return Ok(false);
            }
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|v| v.eq_ignore_ascii_case(ext)));
        if !matches {
            continue;
        }
        let Some(path) = path.to_str() else {
            tracing::warn!(path = %path.display(), "skipping non utf-8 path");
            continue;
        };
        if !f(path) {
            return Ok(false);
        }
    }
    Ok(true)
}
