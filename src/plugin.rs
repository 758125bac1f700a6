//! Packs the WordPress plugin directory into a ZIP archive on request.

use std::{
    fs,
    io::{self, Cursor, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, trace};
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// Top-level folder inside the archive; WordPress installs the plugin
/// under this name.
pub const ARCHIVE_ROOT: &str = "seoflow";

pub const ARCHIVE_FILENAME: &str = "seoflow-wordpress.zip";

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("failed to read plugin files: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write archive: {0}")]
    Zip(#[from] ZipError),
}

/// Zips every file below `dir`, in sorted order, under [`ARCHIVE_ROOT`].
pub fn build_plugin_archive(dir: &Path) -> Result<Vec<u8>, PluginError> {
    if !dir.is_dir() {
        return Err(PluginError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    debug!("Packing {} plugin files from {}", files.len(), dir.display());

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for path in files {
        let relative = path.strip_prefix(dir).map_err(|e| io::Error::other(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        trace!("Adding {}", name);

        writer.start_file(format!("{}/{}", ARCHIVE_ROOT, name), options)?;
        writer.write_all(&fs::read(&path)?)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
