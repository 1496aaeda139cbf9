//! Message pump driver.
//!
//! The pump retrieves and dispatches one message at a time on the thread that
//! owns the window. Retrieval is behind [`MessageSource`] so the loop can be
//! exercised with scripted messages.

use crate::tray::session::{SessionState, TrayPlatform, TraySession};
use tracing::{debug, error};

/// Result of retrieving and dispatching one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpStep {
    /// A message was dispatched; keep pumping.
    Continue,
    /// The quit signal was retrieved.
    Quit,
    /// Message retrieval itself failed.
    Failed(String),
}

/// Retrieves the next message and dispatches it to the window procedure.
pub trait MessageSource {
    fn pump_one(&mut self) -> PumpStep;
}

/// Run the pump until quit or failure, moving the session through
/// `Running` and finally `Destroyed`.
///
/// A retrieval failure is logged and ends the pump; the tray is not restarted.
pub fn run_pump<P: TrayPlatform, M: MessageSource>(session: &TraySession<P>, source: &mut M) {
    debug!("starting tray message pump");
    session.set_state(SessionState::Running);
    loop {
        match source.pump_one() {
            PumpStep::Continue => {}
            PumpStep::Quit => {
                debug!("tray message pump received quit");
                break;
            }
            PumpStep::Failed(reason) => {
                error!("get message failure: {reason}");
                break;
            }
        }
    }
    session.set_state(SessionState::Destroyed);
}
