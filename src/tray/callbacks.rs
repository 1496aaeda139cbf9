//! Notification channels from the tray to the embedding application.
//!
//! Each user intent has its own single-slot channel carrying `()`. Sends are
//! best-effort: when the slot is still occupied (the embedder has not picked
//! up the previous event) or the receiver is gone, the event is dropped and
//! an error is logged. Nothing is queued beyond one pending event and nothing
//! is retried.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::error;

/// User intents the tray can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrayAction {
    /// Quit the application.
    Quit,
    /// Apply the staged update.
    Update,
    /// Open the log directory.
    ShowLogs,
    /// Show the first-run / getting-started experience.
    DoFirstUse,
}

impl TrayAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::Update => "Update",
            Self::ShowLogs => "ShowLogs",
            Self::DoFirstUse => "DoFirstUse",
        }
    }
}

impl std::fmt::Display for TrayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sending half, owned by the tray session.
#[derive(Debug, Clone)]
pub struct TrayCallbacks {
    quit: Sender<()>,
    update: Sender<()>,
    show_logs: Sender<()>,
    do_first_use: Sender<()>,
}

/// Receiving half, owned by the embedder.
#[derive(Debug, Clone)]
pub struct TrayReceivers {
    pub quit: Receiver<()>,
    pub update: Receiver<()>,
    pub show_logs: Receiver<()>,
    pub do_first_use: Receiver<()>,
}

/// Create the four single-slot channels.
pub fn tray_channels() -> (TrayCallbacks, TrayReceivers) {
    let (quit_tx, quit_rx) = bounded(1);
    let (update_tx, update_rx) = bounded(1);
    let (logs_tx, logs_rx) = bounded(1);
    let (first_tx, first_rx) = bounded(1);
    (
        TrayCallbacks {
            quit: quit_tx,
            update: update_tx,
            show_logs: logs_tx,
            do_first_use: first_tx,
        },
        TrayReceivers {
            quit: quit_rx,
            update: update_rx,
            show_logs: logs_rx,
            do_first_use: first_rx,
        },
    )
}

impl TrayCallbacks {
    fn sender(&self, action: TrayAction) -> &Sender<()> {
        match action {
            TrayAction::Quit => &self.quit,
            TrayAction::Update => &self.update,
            TrayAction::ShowLogs => &self.show_logs,
            TrayAction::DoFirstUse => &self.do_first_use,
        }
    }

    /// Deliver `action` if its slot is free and a receiver exists.
    ///
    /// Returns `true` if the event was delivered, `false` if it was dropped.
    pub fn notify(&self, action: TrayAction) -> bool {
        match self.sender(action).try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                error!("no listener on {action}: previous event not consumed, dropping");
                false
            }
            Err(TrySendError::Disconnected(())) => {
                error!("no listener on {action}");
                false
            }
        }
    }
}

impl TrayReceivers {
    pub fn receiver(&self, action: TrayAction) -> &Receiver<()> {
        match action {
            TrayAction::Quit => &self.quit,
            TrayAction::Update => &self.update,
            TrayAction::ShowLogs => &self.show_logs,
            TrayAction::DoFirstUse => &self.do_first_use,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const ALL: [TrayAction; 4] = [
        TrayAction::Quit,
        TrayAction::Update,
        TrayAction::ShowLogs,
        TrayAction::DoFirstUse,
    ];

    #[test]
    fn each_action_reaches_only_its_own_channel() {
        for action in ALL {
            let (callbacks, receivers) = tray_channels();
            assert!(callbacks.notify(action));
            for other in ALL {
                let expected = usize::from(other == action);
                assert_eq!(receivers.receiver(other).len(), expected, "{action} → {other}");
            }
        }
    }

    #[test]
    fn second_event_is_dropped_while_slot_is_full() {
        let (callbacks, receivers) = tray_channels();
        assert!(callbacks.notify(TrayAction::Update));
        assert!(!callbacks.notify(TrayAction::Update));
        assert_eq!(receivers.update.len(), 1);

        receivers.update.try_recv().unwrap();
        assert!(callbacks.notify(TrayAction::Update));
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (callbacks, receivers) = tray_channels();
        drop(receivers);
        for action in ALL {
            assert!(!callbacks.notify(action));
        }
    }

    #[test]
    fn display_uses_channel_names() {
        assert_eq!(TrayAction::DoFirstUse.to_string(), "DoFirstUse");
        assert_eq!(TrayAction::ShowLogs.to_string(), "ShowLogs");
    }
}
