//! Update endpoint client.
//!
//! Polls the update endpoint with the platform, architecture, running version
//! and installation id, and downloads announced installers into the staging
//! directory. Check failures never surface as errors: every problem degrades
//! to "no update available" and is only logged.

use crate::config::UpdateConfig;
use crate::error::{LanternError, Result};
use crate::update::staging::StagingArea;
use crate::update::state::DownloadedFlag;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of a single update check. The default value means "no update".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCheckResult {
    /// Whether the endpoint announced a release.
    pub available: bool,
    /// Installer download URL.
    pub download_url: String,
    /// Announced release version.
    pub version: String,
}

/// Body of a `200` update-check response.
#[derive(Debug, Deserialize)]
struct UpdateResponse {
    url: String,
    #[serde(default)]
    version: String,
}

/// Blocking client for the update endpoint.
#[derive(Clone)]
pub struct UpdateClient {
    agent: ureq::Agent,
    check_url_base: String,
    version: String,
    staging: StagingArea,
    downloaded: DownloadedFlag,
}

impl UpdateClient {
    /// Build a client from configuration.
    pub fn new(config: &UpdateConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.download_timeout_secs))
            .user_agent(concat!("lantern/", env!("CARGO_PKG_VERSION"), " (updater)"))
            .build();

        Self {
            agent,
            check_url_base: config.check_url.clone(),
            version: config.running_version(),
            staging: StagingArea::new(config.resolved_stage_dir()),
            downloaded: DownloadedFlag::new(),
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Handle onto the "release staged" flag set by [`download_release`](Self::download_release).
    pub fn downloaded_flag(&self) -> DownloadedFlag {
        self.downloaded.clone()
    }

    /// Update-check URL for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub fn check_url(&self, client_id: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.check_url_base,
            [
                ("os", std::env::consts::OS),
                ("arch", endpoint_arch()),
                ("version", self.version.as_str()),
                ("id", client_id),
            ],
        )
        .map_err(|e| {
            LanternError::Update(format!(
                "invalid update check URL {}: {e}",
                self.check_url_base
            ))
        })
    }

    /// Ask the endpoint whether a newer release exists.
    ///
    /// Issues a single GET with no retry. Transport errors, `204 No Content`,
    /// unexpected statuses and malformed bodies all return the default
    /// (unavailable) result.
    pub fn check_for_update(&self, client_id: &str) -> UpdateCheckResult {
        let url = match self.check_url(client_id) {
            Ok(url) => url,
            Err(e) => {
                warn!("{e}");
                return UpdateCheckResult::default();
            }
        };
        debug!(%url, "checking for update");

        let resp = match self.agent.get(url.as_str()).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, _)) => {
                debug!(status, "update check returned unexpected status");
                return UpdateCheckResult::default();
            }
            Err(e) => {
                debug!("error checking for update: {e}");
                return UpdateCheckResult::default();
            }
        };

        match resp.status() {
            204 => {
                debug!("got 204 when checking for update");
                return UpdateCheckResult::default();
            }
            200 => {}
            status => {
                debug!(status, "update check returned unexpected status");
                return UpdateCheckResult::default();
            }
        }

        let body = match resp.into_string() {
            Ok(body) => body,
            Err(e) => {
                debug!("failed to read update check response: {e}");
                return UpdateCheckResult::default();
            }
        };

        let parsed: UpdateResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("malformed response checking for update: {e}");
                return UpdateCheckResult::default();
            }
        };
        if parsed.url.trim().is_empty() {
            warn!("malformed response checking for update: empty download url");
            return UpdateCheckResult::default();
        }

        info!(version = %parsed.version, "new update available at {}", parsed.url);
        UpdateCheckResult {
            available: true,
            download_url: parsed.url,
            version: parsed.version,
        }
    }

    /// Download the announced installer into the staging directory.
    ///
    /// Idempotent: if the staged file already exists no request is made. The
    /// whole body is buffered in memory and then written in one go. Sets the
    /// downloaded flag on success and returns the staged path.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the request fails or returns a
    /// non-success status, or the payload cannot be written.
    pub fn download_release(&self, result: &UpdateCheckResult) -> Result<PathBuf> {
        let url = Url::parse(&result.download_url).map_err(|e| {
            LanternError::Download(format!(
                "failed to parse update URL {}: {e}",
                result.download_url
            ))
        })?;
        let target = self.staging.artifact_path(&url)?;
        self.staging.ensure_dir()?;

        match std::fs::metadata(&target) {
            Ok(_) => {
                debug!("update already downloaded at {}", target.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%url, "downloading update");
                let payload = self.fetch(&url)?;
                self.staging.write_artifact(&target, &payload)?;
                debug!(
                    bytes = payload.len(),
                    "completed writing update payload to {}",
                    target.display()
                );
            }
            Err(e) => {
                return Err(LanternError::Download(format!(
                    "unexpected stat error on {}: {e}",
                    target.display()
                )));
            }
        }

        if self.downloaded.mark_downloaded() {
            info!("update staged at {}", target.display());
        }
        Ok(target)
    }

    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| LanternError::Download(format!("error downloading update: {e}")))?;

        let mut payload = Vec::new();
        resp.into_reader()
            .read_to_end(&mut payload)
            .map_err(|e| LanternError::Download(format!("failed to read update body: {e}")))?;
        Ok(payload)
    }
}

/// Architecture name in the update endpoint's vocabulary.
fn endpoint_arch() -> &'static str {
    map_arch(std::env::consts::ARCH)
}

fn map_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
