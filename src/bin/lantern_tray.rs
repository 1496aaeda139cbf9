//! Lantern desktop tray.
//!
//! Owns the process lifecycle: the tray icon runs on its own pump thread,
//! the update checker on another, and this thread reacts to menu actions.

use anyhow::Context;
use crossbeam_channel::select;
use lantern::config::LanternConfig;
use lantern::identity::Identity;
use lantern::lantern_dirs;
use lantern::tray::{SessionState, TrayOptions, spawn_tray, tray_channels};
use lantern::update::{InstallerLauncher, UpdateClient, UpdateScheduler, notify_when_staged};
use std::ffi::OsStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How often the main loop checks that the tray is still alive.
const TRAY_LIVENESS_POLL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let logs_dir = lantern_dirs::logs_dir();
    let _log_guard = lantern::logging::init(&logs_dir).context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "lantern starting");

    let config = LanternConfig::load_or_default(&LanternConfig::default_config_path());
    let identity = Identity::load_or_create(&lantern_dirs::identity_file())
        .context("failed to load client identity")?;

    let client = UpdateClient::new(&config.update);
    let launcher = InstallerLauncher::new(client.staging(), &config.update.installer_name);

    let (callbacks, receivers) = tray_channels();
    let tray = spawn_tray(
        callbacks,
        TrayOptions {
            tooltip: config.tray.tooltip.clone(),
        },
    )
    .context("failed to start system tray")?;

    if launcher.is_staged() {
        info!(
            path = %launcher.installer_path().display(),
            "installer already staged from a previous run"
        );
        tray.mark_update_pending("");
    }

    let control = tray.control();
    let staged = client.downloaded_flag();
    let scheduler = UpdateScheduler::new(client, identity.client_id())
        .with_warmup(config.update.warmup())
        .with_interval(config.update.interval())
        .with_expected_installer(launcher.installer_path())
        .start(
            CancellationToken::new(),
            notify_when_staged(staged, move |version: &str| {
                control.mark_update_pending(version);
                Ok(())
            }),
        )
        .context("failed to start update checker")?;

    loop {
        select! {
            recv(receivers.quit) -> msg => {
                if msg.is_ok() {
                    info!("quit requested from tray");
                }
                break;
            }
            recv(receivers.update) -> msg => {
                if msg.is_err() {
                    break;
                }
                info!("upgrade requested from tray");
                if let Err(e) = launcher.launch() {
                    error!("unable to launch upgrade: {e}");
                }
            }
            recv(receivers.show_logs) -> msg => {
                if msg.is_err() {
                    break;
                }
                open_with_shell(logs_dir.as_os_str());
            }
            recv(receivers.do_first_use) -> msg => {
                if msg.is_err() {
                    break;
                }
                open_with_shell(OsStr::new(&config.tray.getting_started_url));
            }
            default(TRAY_LIVENESS_POLL) => {
                if tray.state() == SessionState::Destroyed {
                    warn!("tray exited unexpectedly, shutting down");
                    break;
                }
            }
        }
    }

    scheduler.stop();
    tray.quit();
    tray.join();
    scheduler.join();

    info!("lantern shut down cleanly");
    Ok(())
}

/// Hand a path or URL to the desktop's default handler.
fn open_with_shell(target: &OsStr) {
    #[cfg(target_os = "windows")]
    let program = "explorer";
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let program = "xdg-open";

    if let Err(e) = std::process::Command::new(program).arg(target).spawn() {
        error!("failed to open {}: {e}", target.to_string_lossy());
    }
}
