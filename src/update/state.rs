//! In-process update state.
//!
//! [`DownloadedFlag`] records that a release has been staged. It starts out
//! `false`, flips to `true` once a download lands in the staging directory,
//! and is never reset for the lifetime of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "a release is staged" flag.
///
/// Cloning yields another handle onto the same flag, so the update client and
/// the embedder observe the same value. Readers may briefly see a stale
/// `false`; the flag only ever moves from `false` to `true`.
#[derive(Debug, Clone, Default)]
pub struct DownloadedFlag {
    inner: Arc<AtomicBool>,
}

impl DownloadedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a release as staged. Returns `true` if this call flipped the flag.
    pub fn mark_downloaded(&self) -> bool {
        !self.inner.swap(true, Ordering::AcqRel)
    }

    pub fn is_downloaded(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}
