//! Archive extraction
//!
//! The downloaded archive is unpacked into the run's workspace, next to the
//! archive file itself. Only ZIP is supported.

mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use zip::ZipExtractor;

use crate::error::{Error, Result};
use crate::types::SourceFile;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info};

/// Unpack `archive_path` into `dest_path` on the blocking pool
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - Extracted files
/// * `Err(Error::Extraction)` - Missing or corrupt archive, or unwritable target
pub async fn extract_archive(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();

    let files = spawn_blocking(move || ZipExtractor::extract(&archive_owned, &dest_owned))
        .await
        .map_err(|e| Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("extraction task panicked: {e}"),
        })??;

    info!(
        ?archive_path,
        extracted_count = files.len(),
        "archive extracted"
    );
    Ok(files)
}

/// Check the extracted members against the files a run needs
///
/// Both source files must be present at the top of `dest_path`. Other members
/// are ignored unless `strict` is set.
pub fn check_members(
    archive_path: &Path,
    dest_path: &Path,
    extracted: &[PathBuf],
    strict: bool,
) -> Result<()> {
    for required in SourceFile::ALL {
        let expected = dest_path.join(required.file_name());
        if !extracted.contains(&expected) {
            return Err(Error::Extraction {
                archive: archive_path.to_path_buf(),
                reason: format!("archive does not contain {required}"),
            });
        }
    }

    let extras: Vec<&PathBuf> = extracted
        .iter()
        .filter(|path| {
            !SourceFile::ALL
                .iter()
                .any(|f| **path == dest_path.join(f.file_name()))
        })
        .collect();

    if extras.is_empty() {
        return Ok(());
    }

    if strict {
        let names: Vec<String> = extras
            .iter()
            .map(|p| {
                p.strip_prefix(dest_path)
                    .unwrap_or(p)
                    .display()
                    .to_string()
            })
            .collect();
        return Err(Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("unexpected archive members: {}", names.join(", ")),
        });
    }

    debug!(
        ?archive_path,
        ignored = extras.len(),
        "ignoring unknown archive members"
    );
    Ok(())
}
