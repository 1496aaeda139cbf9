//! Lantern: desktop companion runtime.
//!
//! This crate provides the pieces the desktop shell is assembled from:
//!
//! - **Update lifecycle**: periodic release checks, installer staging and
//!   the hand-off to the staged installer ([`update`])
//! - **System tray**: notification icon, context menu and the message pump
//!   that reports user actions over channels ([`tray`])
//! - **Ambient plumbing**: configuration, directories, client identity and
//!   logging

pub mod config;
pub mod error;
pub mod identity;
pub mod lantern_dirs;
pub mod logging;
pub mod tray;
pub mod update;

pub use config::LanternConfig;
pub use error::{LanternError, Result};
pub use identity::Identity;
