//! Error types for the update lifecycle and tray session.

/// Top-level error type for Lantern.
#[derive(Debug, thiserror::Error)]
pub enum LanternError {
    /// Update check or release metadata error.
    #[error("update error: {0}")]
    Update(String),

    /// Installer download or staging error.
    #[error("download error: {0}")]
    Download(String),

    /// Installer launch error (missing artifact, spawn failure).
    #[error("installer error: {0}")]
    Installer(String),

    /// System tray / native window error.
    #[error("tray error: {0}")]
    Tray(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Installation identity storage error.
    #[error("identity error: {0}")]
    Identity(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LanternError>;
