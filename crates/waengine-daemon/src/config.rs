// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! Process configuration (§6 "Environment: a runtime-memory ceiling
//! (default 2048 MB). No CLI flags, no persisted configuration file").
//! Every knob is an environment variable; there is nothing else to parse.

use std::path::PathBuf;

use waengine_adapters::DEFAULT_CEILING_MB;

const SESSIONS_DIR_VAR: &str = "WAE_SESSIONS_DIR";
const PUBLIC_DIR_VAR: &str = "WAE_PUBLIC_DIR";
const MEMORY_CEILING_VAR: &str = "WAE_MEMORY_CEILING_MB";

/// Resolved daemon configuration for one process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root the session-credential directories live under (§4.1, §6).
    pub sessions_dir: PathBuf,
    /// Primary local resolution root for `imageUrl`s that aren't absolute
    /// URLs (§6 "Media fetch").
    pub public_dir: PathBuf,
    /// Soft/hard memory thresholds are a ratio of this (§4.6).
    pub memory_ceiling_mb: u64,
    /// The working directory legacy artefacts are cleaned up relative to
    /// (§4.12 "`auth_info*` at repo root").
    pub cwd: PathBuf,
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// paths under the current working directory.
    pub fn load() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            sessions_dir: std::env::var(SESSIONS_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join("sessions")),
            public_dir: std::env::var(PUBLIC_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| cwd.join("public")),
            memory_ceiling_mb: std::env::var(MEMORY_CEILING_VAR)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CEILING_MB),
            cwd,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
