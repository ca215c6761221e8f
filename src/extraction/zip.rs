use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    fn failed(archive_path: &Path, reason: String) -> Error {
        Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason,
        }
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    fn extract_zip_entry(
        mut file: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(entry = file.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        // The archive itself sits in the destination directory
        if file_path == archive_path {
            warn!(entry = file.name(), "skipping entry that would overwrite the archive");
            return Ok(None);
        }

        if file.is_dir() {
            std::fs::create_dir_all(&file_path).map_err(|e| {
                Self::failed(archive_path, format!("failed to create directory: {e}"))
            })?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Self::failed(
                    archive_path,
                    format!("failed to create parent directories: {e}"),
                )
            })?;
        }

        let mut outfile = std::fs::File::create(&file_path).map_err(|e| {
            Self::failed(
                archive_path,
                format!("failed to create {}: {e}", file_path.display()),
            )
        })?;

        std::io::copy(&mut file, &mut outfile).map_err(|e| {
            Self::failed(
                archive_path,
                format!("failed to extract {}: {e}", file.name()),
            )
        })?;

        Ok(Some(file_path))
    }

    /// Extract every entry of a ZIP archive into `dest_path`
    ///
    /// Blocking; callers on the async runtime go through
    /// [`super::extract_archive`].
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Self::failed(archive_path, format!("failed to create destination: {e}"))
        })?;

        let file = std::fs::File::open(archive_path)
            .map_err(|e| Self::failed(archive_path, format!("failed to open ZIP archive: {e}")))?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| Self::failed(archive_path, format!("failed to read ZIP archive: {e}")))?;

        let mut extracted_files = Vec::new();

        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| {
                Self::failed(archive_path, format!("failed to read ZIP entry {i}: {e}"))
            })?;

            if let Some(file_path) = Self::extract_zip_entry(file, dest_path, archive_path)? {
                extracted_files.push(file_path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }
}
