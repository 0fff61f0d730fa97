// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Process-wide cache of prepared module sources.
//!
//! Entries hold the file text already wrapped in the CommonJS function
//! header, never exported objects. An entry is reused until the file's
//! [`StalenessToken`] changes; then it is read again and its revision bumped.

use crate::error::Result;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Parameters of the function every script module is wrapped in
pub const WRAPPER_HEADER: &str =
    "(function (exports, module, require, include, __filename, __dirname) {";

/// Closes [`WRAPPER_HEADER`]
pub const WRAPPER_FOOTER: &str = "\n})";

/// What a file looked like when it was read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessToken {
    /// Last modification time, if the platform reports one
    pub modified: Option<SystemTime>,
    /// Size in bytes
    pub len: u64,
}

impl StalenessToken {
    /// Stat `path`
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// A prepared module source
#[derive(Debug)]
pub struct CachedScript {
    /// Absolute file path
    pub path: PathBuf,
    /// Wrapped source text
    pub source: String,
    /// Token the source was read under
    pub token: StalenessToken,
    /// Bumped each time the path is read again
    pub revision: u64,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served without touching file contents
    pub hits: u64,
    /// Files read, first loads and reloads together
    pub loads: u64,
    /// Entries replaced because their file changed
    pub reloads: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Thread-safe script cache keyed by absolute path.
///
/// Holds prepared source text, not compiled scripts: engine scripts are
/// bound to the realm they were compiled in, and every request runs in a
/// fresh realm. An unchanged file is therefore read once per process but
/// parsed once per request that loads it; the request keeps the compiled
/// form keyed by [`CachedScript::revision`].
#[derive(Debug, Default)]
pub struct ScriptCache {
    entries: DashMap<PathBuf, Arc<CachedScript>>,
    next_revision: AtomicU64,
    hits: AtomicU64,
    loads: AtomicU64,
    reloads: AtomicU64,
}

impl ScriptCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepared source for `path`, reading the file only when needed
    pub fn get(&self, path: &Path) -> Result<Arc<CachedScript>> {
        let token = StalenessToken::of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if entry.token == token {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Script cache hit: {}", path.display());
                return Ok(Arc::clone(entry.value()));
            }
        }

        let text = fs::read_to_string(path)?;
        let replaced = self.entries.contains_key(path);
        let script = Arc::new(CachedScript {
            path: path.to_path_buf(),
            source: wrap_module(&text),
            token,
            revision: self.next_revision.fetch_add(1, Ordering::Relaxed),
        });

        self.loads.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.reloads.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Reloading changed script {}", path.display());
        } else {
            tracing::debug!("Loaded script {}", path.display());
        }

        self.entries.insert(path.to_path_buf(), Arc::clone(&script));
        Ok(script)
    }

    /// Whether `path` has an entry, fresh or not
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Drop the entry for `path`
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// Wrap module text in the CommonJS function.
///
/// The header shares the first source line so reported line numbers match
/// the file. A leading `#!` line is commented out.
pub fn wrap_module(source: &str) -> String {
    let body = match source.strip_prefix("#!") {
        Some(rest) => format!("//{}", rest),
        None => source.to_string(),
    };
    let mut wrapped = String::with_capacity(WRAPPER_HEADER.len() + body.len() + WRAPPER_FOOTER.len());
    wrapped.push_str(WRAPPER_HEADER);
    wrapped.push_str(&body);
    wrapped.push_str(WRAPPER_FOOTER);
    wrapped
}
