//! System tray integration.
//!
//! The tray runs a message pump on its own thread and reports user
//! interactions over four best-effort channels (see [`callbacks`]). The
//! dispatch state machine in [`session`] is platform-neutral; [`native`]
//! supplies the windowing backend.

pub mod callbacks;
pub mod message;
pub mod native;
pub mod pump;
pub mod session;

pub use callbacks::{TrayAction, TrayCallbacks, TrayReceivers, tray_channels};
pub use native::{TrayControl, TrayHandle, TrayOptions, spawn_tray};
pub use session::{SessionState, TrayPlatform, TraySession};
