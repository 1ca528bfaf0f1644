//! Project archive handling.
//!
//! The storage collaborator serves projects as standard ZIP archives; this
//! module unpacks them into the work item's scratch directory.

use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive")]
    Io(#[from] std::io::Error),

    #[error("not a valid ZIP archive")]
    Zip(#[from] zip::result::ZipError),
}

/// Extract `archive_path` into `dest_dir`. The destination is created if
/// missing.
pub fn unpack_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    std::fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let entries = archive.len();
    archive.extract(dest_dir)?;

    info!(
        "archive: extracted {entries} entries -> {}",
        dest_dir.display()
    );
    Ok(())
}
