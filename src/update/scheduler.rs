//! Background update checker.
//!
//! Runs on its own OS thread: after a short warm-up it checks for a release,
//! downloads it, and notifies the embedder, then waits about an hour and
//! repeats. Every failure is logged and absorbed; the loop only ends when its
//! [`CancellationToken`] is cancelled, and cancellation is only observed
//! between iterations, never in the middle of a check or download.

use crate::error::{LanternError, Result};
use crate::update::checker::{UpdateCheckResult, UpdateClient};
use crate::update::state::DownloadedFlag;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay before the first check after startup.
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(5);

/// Delay between checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Embedder callback invoked with the release version after a staged update.
pub type NotifyFn = Box<dyn FnMut(&str) -> anyhow::Result<()> + Send>;

/// Wrap `on_staged` so it only runs once `flag` reports a staged release.
///
/// The scheduler notifies even when a download fails; an embedder that
/// offers an upgrade should not do so for an installer it does not have.
pub fn notify_when_staged<F>(flag: DownloadedFlag, mut on_staged: F) -> NotifyFn
where
    F: FnMut(&str) -> anyhow::Result<()> + Send + 'static,
{
    Box::new(move |version: &str| {
        if !flag.is_downloaded() {
            debug!(version, "release announced but nothing staged yet");
            return Ok(());
        }
        on_staged(version)
    })
}

/// Where releases come from. Implemented by [`UpdateClient`].
pub trait ReleaseSource: Send + 'static {
    /// Check for a newer release. Never fails; problems yield the default result.
    fn check(&self, client_id: &str) -> UpdateCheckResult;

    /// Stage the release described by `result`.
    fn download(&self, result: &UpdateCheckResult) -> Result<PathBuf>;
}

impl ReleaseSource for UpdateClient {
    fn check(&self, client_id: &str) -> UpdateCheckResult {
        self.check_for_update(client_id)
    }

    fn download(&self, result: &UpdateCheckResult) -> Result<PathBuf> {
        self.download_release(result)
    }
}

/// Paces the scheduler loop.
pub trait Ticker: Send + 'static {
    /// Block for roughly `period`. Implementations may return early once
    /// `cancel` is cancelled.
    fn wait(&mut self, period: Duration, cancel: &CancellationToken);
}

/// Wall-clock ticker that sleeps in short slices so cancellation is noticed
/// promptly while idle.
#[derive(Debug, Clone)]
pub struct SleepTicker {
    slice: Duration,
}

impl Default for SleepTicker {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(250),
        }
    }
}

impl Ticker for SleepTicker {
    fn wait(&mut self, period: Duration, cancel: &CancellationToken) {
        let deadline = Instant::now() + period;
        while !cancel.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(self.slice));
        }
    }
}

/// What one iteration of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The endpoint announced nothing.
    NoUpdate,
    /// A release was announced; the download and notify results are recorded.
    Announced {
        version: String,
        staged: bool,
        notified: bool,
    },
}

/// Periodic update checker. Start it once per process with [`start`](Self::start).
pub struct UpdateScheduler<S: ReleaseSource, T: Ticker = SleepTicker> {
    source: S,
    ticker: T,
    client_id: String,
    warmup: Duration,
    interval: Duration,
    expected_installer: Option<PathBuf>,
}

impl<S: ReleaseSource> UpdateScheduler<S, SleepTicker> {
    pub fn new(source: S, client_id: impl Into<String>) -> Self {
        Self {
            source,
            ticker: SleepTicker::default(),
            client_id: client_id.into(),
            warmup: DEFAULT_WARMUP,
            interval: DEFAULT_INTERVAL,
            expected_installer: None,
        }
    }
}

impl<S: ReleaseSource, T: Ticker> UpdateScheduler<S, T> {
    /// Replace the pacing strategy.
    pub fn with_ticker<U: Ticker>(self, ticker: U) -> UpdateScheduler<S, U> {
        UpdateScheduler {
            source: self.source,
            ticker,
            client_id: self.client_id,
            warmup: self.warmup,
            interval: self.interval,
            expected_installer: self.expected_installer,
        }
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Path the installer launcher will run. Staged releases landing
    /// anywhere else are logged next to it.
    pub fn with_expected_installer(mut self, path: impl Into<PathBuf>) -> Self {
        self.expected_installer = Some(path.into());
        self
    }

    /// Run one check → download → notify pass.
    pub fn run_once(&self, notify: &mut NotifyFn) -> IterationOutcome {
        let result = self.source.check(&self.client_id);
        if !result.available {
            return IterationOutcome::NoUpdate;
        }

        let staged = match self.source.download(&result) {
            Ok(path) => {
                debug!("release {} staged at {}", result.version, path.display());
                let expected = self.expected_installer.as_deref();
                if let Some(expected) = launcher_mismatch(&path, expected) {
                    warn!(
                        staged = %path.display(),
                        expected = %expected.display(),
                        "staged release is not where the installer launcher looks"
                    );
                }
                true
            }
            Err(e) => {
                error!("failed to download new release: {e}");
                false
            }
        };

        let notified = match notify(&result.version) {
            Ok(()) => true,
            Err(e) => {
                debug!("failed to register update available with embedder: {e}");
                false
            }
        };

        IterationOutcome::Announced {
            version: result.version,
            staged,
            notified,
        }
    }

    /// Spawn the background thread. Returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn start(self, cancel: CancellationToken, notify: NotifyFn) -> Result<SchedulerHandle> {
        let thread_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("lantern-update-checker".to_owned())
            .spawn(move || self.run(thread_cancel, notify))
            .map_err(|e| LanternError::Update(format!("cannot spawn update checker: {e}")))?;

        Ok(SchedulerHandle {
            cancel,
            thread: Some(thread),
        })
    }

    fn run(mut self, cancel: CancellationToken, mut notify: NotifyFn) {
        info!(
            interval_secs = self.interval.as_secs(),
            "background update checker started"
        );
        self.ticker.wait(self.warmup, &cancel);

        while !cancel.is_cancelled() {
            let outcome = self.run_once(&mut notify);
            debug!(?outcome, "update check iteration finished");

            if cancel.is_cancelled() {
                break;
            }
            self.ticker.wait(self.interval, &cancel);
        }
        debug!("stopping background update checker");
    }
}

/// The launcher's path, when a release was staged somewhere else.
fn launcher_mismatch<'a>(staged: &Path, expected: Option<&'a Path>) -> Option<&'a Path> {
    expected.filter(|expected| *expected != staged)
}

/// Handle onto a running [`UpdateScheduler`].
pub struct SchedulerHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request the loop to stop after its current iteration.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the loop thread to exit. Does not cancel by itself.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("update checker thread panicked");
            }
        }
    }
}
