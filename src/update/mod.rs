//! Self-update lifecycle.
//!
//! Polls the update endpoint on a background thread, stages announced
//! installers in a local directory, and hands the process over to the staged
//! installer when the user asks to upgrade.

pub mod checker;
pub mod installer;
pub mod scheduler;
pub mod staging;
pub mod state;

pub use checker::{UpdateCheckResult, UpdateClient};
pub use installer::{InstallerLauncher, ProcessSpawner, Terminator};
pub use scheduler::{SchedulerHandle, Ticker, UpdateScheduler, notify_when_staged};
pub use staging::StagingArea;
pub use state::DownloadedFlag;
