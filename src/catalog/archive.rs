//! One-time extraction of packed frame archives

use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::{Result, ServeError};

/// Unpacks a frame archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<()>;
}

/// Extracts `.tar.gz` archives with the system `tar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

impl ArchiveExtractor for TarExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<()> {
        if !archive.is_file() {
            return Err(ServeError::catalog_unavailable(
                destination,
                format!("no frames and no archive at {}", archive.display()),
            ));
        }

        info!("Extracting frame archive {}", archive.display());
        let output = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(destination)
            .output()
            .map_err(|e| {
                ServeError::catalog_unavailable(destination, format!("failed to run tar: {}", e))
            })?;

        if !output.status.success() {
            return Err(ServeError::catalog_unavailable(
                destination,
                format!(
                    "extraction of {} failed ({}): {}",
                    archive.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        debug!("Archive extracted into {}", destination.display());
        Ok(())
    }
}
