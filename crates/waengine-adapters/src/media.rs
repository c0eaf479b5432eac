// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Media fetch (§6): resolves a campaign's `imageUrl` to raw bytes, either
//! over HTTP(S) or from the local `public/` directories, and caches the
//! result per `(broadcastId, url)` until the broadcast completes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use waengine_core::BroadcastId;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("http fetch failed: {0}")]
    Http(String),
    #[error("local file not found under public/: {0}")]
    NotFound(String),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fetches and caches media for the Broadcast Processor's per-message send
/// step. One instance is shared across all broadcasts of a process.
pub struct MediaFetcher {
    client: reqwest::Client,
    /// `<cwd>/public/` — the primary local resolution root.
    public_dir: PathBuf,
    cache: Mutex<HashMap<(BroadcastId, String), Vec<u8>>>,
}

impl MediaFetcher {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            public_dir: public_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or load) the media for `url` within `broadcast_id`, returning
    /// the cached bytes on every call after the first successful one.
    pub async fn fetch(&self, broadcast_id: &BroadcastId, url: &str) -> Result<Vec<u8>, MediaError> {
        let key = (broadcast_id.clone(), url.to_string());
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.clone());
        }

        let bytes = if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url).await?
        } else {
            self.read_local(url).await?
        };

        self.cache.lock().insert(key, bytes.clone());
        Ok(bytes)
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| MediaError::Http(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| MediaError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Local paths beginning with `/`, resolved against `public/` and then
    /// `../public/` relative to the configured root (§6).
    async fn read_local(&self, path: &str) -> Result<Vec<u8>, MediaError> {
        let relative = path.trim_start_matches('/');
        let primary = self.public_dir.join(relative);
        if let Some(bytes) = try_read(&primary).await? {
            return Ok(bytes);
        }

        // `public_dir` is `<cwd>/public`; its own parent is `<cwd>`, so the
        // second resolution root (§6 "`<cwd>/../public/`") needs one more
        // `parent()` step, not a second join of the same directory.
        if let Some(fallback_root) = self.public_dir.parent().and_then(Path::parent).map(Path::to_path_buf) {
            let fallback = fallback_root.join("public").join(relative);
            if let Some(bytes) = try_read(&fallback).await? {
                return Ok(bytes);
            }
        }

        Err(MediaError::NotFound(path.to_string()))
    }

    /// Drop every cached entry for a broadcast (§4.10 step j: "clear the
    /// per-instance cached media" on COMPLETED).
    pub fn clear_broadcast(&self, broadcast_id: &BroadcastId) {
        self.cache.lock().retain(|(id, _), _| id != broadcast_id);
    }
}

async fn try_read(path: &Path) -> Result<Option<Vec<u8>>, MediaError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MediaError::Io { path: path.to_path_buf(), source: e }),
    }
}

#[cfg(test)]
#[path = "media_tests.rs"]
mod tests;
