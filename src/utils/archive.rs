use crate::{AssemblyError, Result};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// macOS adds this folder to archives made in Finder.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Extract `zip_path` into `dest` and return the image root: `dest` itself,
/// or its only sub-directory when the archive wraps everything in one folder.
pub fn extract_images(zip_path: &Path, dest: &Path) -> Result<PathBuf> {
    let archive_err = |source: zip::result::ZipError| AssemblyError::Archive {
        path: zip_path.to_path_buf(),
        source,
    };

    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file).map_err(archive_err)?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_err)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!("Skipping archive entry outside the extraction root: {}", entry.name());
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut entry, &mut outfile)?;
        }
    }

    info!("Extracted {} archive entries into {}", archive.len(), dest.display());
    collapse_wrapper(dest)
}

/// Return the single top-level directory of `dir` if that is all it holds.
pub fn collapse_wrapper(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    let top: Vec<PathBuf> = entries
        .into_iter()
        .filter(|e| e.file_name() != MACOS_METADATA_DIR)
        .map(|e| e.path())
        .collect();

    match top.as_slice() {
        [only] if only.is_dir() => {
            debug!("Using wrapper directory {}", only.display());
            Ok(only.clone())
        }
        _ => Ok(dir.to_path_buf()),
    }
}
