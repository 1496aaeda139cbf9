//! Tray backend for platforms without a native implementation.

use crate::error::{LanternError, Result};
use crate::tray::callbacks::TrayCallbacks;

use super::{TrayHandle, TrayOptions};

pub(super) fn spawn(_callbacks: TrayCallbacks, _options: TrayOptions) -> Result<TrayHandle> {
    Err(LanternError::Tray(format!(
        "system tray is not supported on {}",
        std::env::consts::OS
    )))
}
