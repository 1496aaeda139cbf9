//! Staging directory for downloaded installers.
//!
//! Each download lands in its own file named after the percent-encoded path
//! of the download URL. A file's existence is the only dedup key: there is no
//! checksum, so a partially written file from an interrupted attempt is
//! indistinguishable from a complete one.

use crate::error::{LanternError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

/// Directory holding staged installer artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Staging path for the artifact served at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL path has no usable file component.
    pub fn artifact_path(&self, url: &Url) -> Result<PathBuf> {
        let name = escape_path_component(url.path());
        if name.is_empty() || name == "." || name == ".." {
            return Err(LanternError::Download(format!(
                "download URL {url} has no file path"
            )));
        }
        Ok(self.dir.join(name))
    }

    /// Path of a well-known file (such as the installer) in the staging directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the staging directory (owner rwx, group/other r-x) if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder.create(&self.dir).map_err(|e| {
            LanternError::Download(format!(
                "cannot create staging directory {}: {e}",
                self.dir.display()
            ))
        })
    }

    /// Write `payload` to `path`, truncating any previous content, with
    /// executable permission bits on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or fully written.
    pub fn write_artifact(&self, path: &Path, payload: &[u8]) -> Result<()> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o755);
        }

        let mut file = options.open(path).map_err(|e| {
            LanternError::Download(format!("write payload {}: {e}", path.display()))
        })?;
        file.write_all(payload).map_err(|e| {
            LanternError::Download(format!(
                "write payload {} ({} bytes): {e}",
                path.display(),
                payload.len()
            ))
        })?;
        file.flush()?;
        Ok(())
    }
}

/// Encode a URL path as a single filesystem-safe name.
///
/// The leading `/` is dropped and every remaining reserved character,
/// including `/`, is percent-encoded: `/v2/installer.exe` becomes
/// `v2%2Finstaller.exe`.
pub fn escape_path_component(path: &str) -> String {
    let decoded = urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_owned());
    urlencoding::encode(decoded.trim_start_matches('/')).into_owned()
}
