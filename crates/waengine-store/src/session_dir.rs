// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Session Store (§4.1): the per-instance directory of WhatsApp protocol
//! credentials on local disk. The dashboard tier's database never holds
//! these — they live under `WAE_SESSIONS_DIR/auth-<instanceId>/` and are
//! handed to the [`Socket`](waengine_adapters) layer wholesale.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CREDENTIAL_FILE: &str = "creds.json";
const LEGACY_PREFIX: &str = "auth-";

#[derive(Debug, Error)]
pub enum SessionDirError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> SessionDirError {
    SessionDirError::Io { path: path.to_path_buf(), source }
}

/// Whether an instance's on-disk credentials can be handed to the protocol
/// library as-is, or whether the directory was reset to a fresh start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionValidity {
    /// No directory existed, or it did and was usable as found.
    Fresh,
    Existing,
}

/// Manages the `auth-<instanceId>` directories under one root.
pub struct SessionDirs {
    root: PathBuf,
}

impl SessionDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir_for(&self, instance_id: &str) -> PathBuf {
        self.root.join(format!("{LEGACY_PREFIX}{instance_id}"))
    }

    /// Creates the directory if absent, validates any credential file found
    /// inside it, and reports whether the caller is starting fresh (§4.1:
    /// "malformed or empty credential file -> delete and report a fresh
    /// start, non-fatally").
    pub async fn prepare(&self, instance_id: &str) -> Result<SessionValidity, SessionDirError> {
        let dir = self.dir_for(instance_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| io_err(&dir, e))?;

        let creds_path = dir.join(CREDENTIAL_FILE);
        match tokio::fs::read(&creds_path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionValidity::Fresh),
            Err(e) => Err(io_err(&creds_path, e)),
            Ok(bytes) => {
                if bytes.is_empty() || serde_json::from_slice::<serde_json::Value>(&bytes).is_err() {
                    warn!(instance_id, path = %creds_path.display(), "malformed session credentials, starting fresh");
                    tokio::fs::remove_file(&creds_path)
                        .await
                        .map_err(|e| io_err(&creds_path, e))?;
                    Ok(SessionValidity::Fresh)
                } else {
                    Ok(SessionValidity::Existing)
                }
            }
        }
    }

    /// Deletes the whole directory (logout, or a bad-session close code).
    /// Missing-directory is not an error — the end state is what matters.
    pub async fn delete(&self, instance_id: &str) -> Result<(), SessionDirError> {
        let dir = self.dir_for(instance_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&dir, e)),
        }
    }

    /// Startup sweep: any entry directly under the root that isn't an
    /// `auth-<id>` directory is a leftover from an earlier layout and is
    /// removed (§4.1 "legacy non-auth-<id> directories removed on startup").
    pub async fn remove_legacy_entries(&self) -> Result<usize, SessionDirError> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(&self.root, e)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&self.root, e))? {
            let name = entry.file_name();
            let keep = name.to_str().is_some_and(|n| n.starts_with(LEGACY_PREFIX));
            if keep {
                continue;
            }
            let path = entry.path();
            info!(path = %path.display(), "removing legacy session artefact");
            if entry.file_type().await.map_err(|e| io_err(&path, e))?.is_dir() {
                tokio::fs::remove_dir_all(&path).await.map_err(|e| io_err(&path, e))?;
            } else {
                tokio::fs::remove_file(&path).await.map_err(|e| io_err(&path, e))?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "session_dir_tests.rs"]
mod tests;
