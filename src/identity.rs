//! Installation identity.
//!
//! Every installation carries an opaque client id that is sent with update
//! checks. It is created once and persisted to `identity.json`.

use crate::error::{LanternError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted installation identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: String,
}

impl Identity {
    /// Load the identity at `path`, creating and persisting a new one if the
    /// file is missing, unreadable, or holds an empty id.
    ///
    /// # Errors
    ///
    /// Returns an error only if a fresh identity cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if let Ok(bytes) = std::fs::read(path) {
            match serde_json::from_slice::<Identity>(&bytes) {
                Ok(identity) if !identity.id.trim().is_empty() => return Ok(identity),
                Ok(_) => tracing::warn!("identity at {} is empty, regenerating", path.display()),
                Err(e) => tracing::warn!(
                    "identity at {} is malformed, regenerating: {e}",
                    path.display()
                ),
            }
        }

        let identity = Identity {
            id: uuid::Uuid::new_v4().to_string(),
        };
        identity.save(path)?;
        tracing::info!("created installation identity at {}", path.display());
        Ok(identity)
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LanternError::Identity(format!(
                    "cannot create identity directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LanternError::Identity(format!("cannot serialize identity: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            LanternError::Identity(format!(
                "cannot write identity to {}: {e}",
                path.display()
            ))
        })
    }

    /// Opaque client id sent with update checks.
    pub fn client_id(&self) -> &str {
        &self.id
    }
}
