//! Native tray backends.
//!
//! The window, icon and message pump are thread-affine, so everything native
//! is created on a dedicated pump thread. The caller gets a [`TrayHandle`]
//! back once the window exists. Windows has a real backend; every other
//! platform reports that the tray is unsupported.

use crate::error::{LanternError, Result};
use crate::tray::callbacks::TrayCallbacks;
use crate::tray::pump::{MessageSource, run_pump};
use crate::tray::session::{SessionState, TrayPlatform, TraySession};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::error;

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(target_os = "windows")]
mod windows;

/// Options for the native tray.
#[derive(Debug, Clone)]
pub struct TrayOptions {
    /// Hover tooltip for the notification icon.
    pub tooltip: String,
}

impl Default for TrayOptions {
    fn default() -> Self {
        Self {
            tooltip: "Lantern".to_owned(),
        }
    }
}

/// Operations callable on a running session from any thread.
pub trait TrayControl: Send + Sync {
    fn quit(&self);
    fn mark_update_pending(&self, version: &str);
    fn is_update_pending(&self) -> bool;
    fn state(&self) -> SessionState;
}

impl<P: TrayPlatform> TrayControl for TraySession<P> {
    fn quit(&self) {
        TraySession::quit(self);
    }

    fn mark_update_pending(&self, version: &str) {
        TraySession::mark_update_pending(self, version);
    }

    fn is_update_pending(&self) -> bool {
        TraySession::is_update_pending(self)
    }

    fn state(&self) -> SessionState {
        TraySession::state(self)
    }
}

/// Handle onto a tray session running on its pump thread.
pub struct TrayHandle {
    session: Arc<dyn TrayControl>,
    thread: Option<JoinHandle<()>>,
}

impl TrayHandle {
    /// Ask the tray to close. Idempotent.
    pub fn quit(&self) {
        self.session.quit();
    }

    pub fn mark_update_pending(&self, version: &str) {
        self.session.mark_update_pending(version);
    }

    pub fn is_update_pending(&self) -> bool {
        self.session.is_update_pending()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Shared control handle, e.g. for the update scheduler's callback.
    pub fn control(&self) -> Arc<dyn TrayControl> {
        Arc::clone(&self.session)
    }

    /// Wait for the pump thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("tray pump thread panicked");
            }
        }
    }
}

/// Start the native tray for this platform.
///
/// # Errors
///
/// Returns an error if the platform has no tray backend or the window, class
/// or icon cannot be created.
pub fn spawn_tray(callbacks: TrayCallbacks, options: TrayOptions) -> Result<TrayHandle> {
    #[cfg(target_os = "windows")]
    {
        windows::spawn(callbacks, options)
    }
    #[cfg(not(target_os = "windows"))]
    {
        stub::spawn(callbacks, options)
    }
}

/// Spawn a pump thread that builds its session with `build`, reports it
/// back, and then pumps until the session is destroyed.
///
/// # Errors
///
/// Returns the build error, or an error if the thread cannot be spawned.
pub fn spawn_session_thread<P, M, F>(name: &str, build: F) -> Result<TrayHandle>
where
    P: TrayPlatform + 'static,
    M: MessageSource,
    F: FnOnce() -> Result<(Arc<TraySession<P>>, M)> + Send + 'static,
{
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<Arc<TraySession<P>>>>(1);

    let thread = std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let (session, mut source) = match build() {
                Ok(built) => built,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if ready_tx.send(Ok(Arc::clone(&session))).is_err() {
                return;
            }
            run_pump(&session, &mut source);
        })
        .map_err(|e| LanternError::Tray(format!("cannot spawn tray thread: {e}")))?;

    let session = ready_rx
        .recv()
        .map_err(|_| LanternError::Tray("tray thread exited before reporting".to_owned()))??;

    Ok(TrayHandle {
        session,
        thread: Some(thread),
    })
}
