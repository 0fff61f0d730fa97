// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Collector pacing for a long-lived engine.
//!
//! The engine only sees its own heap. Memory held outside it on behalf of
//! scripts (request bodies, buffers owned by native modules) is reported
//! here, and the notifier forces a collection when enough has piled up or
//! when the request cadence says so.

use crate::config::GcConfig;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// External bytes reported since the last collection
    pub pending_bytes: usize,
    /// External bytes reported over the process lifetime
    pub total_external_bytes: u64,
    /// Completed requests
    pub requests: u64,
    /// Collections forced by the host
    pub collections: u64,
}

/// Tracks external memory pressure and forces collections
#[derive(Debug, Default)]
pub struct GcNotifier {
    threshold: usize,
    collect_every: u64,
    pending: AtomicUsize,
    total: AtomicU64,
    requests: AtomicU64,
    collections: AtomicU64,
}

impl GcNotifier {
    /// Create a notifier from configuration
    pub fn new(config: &GcConfig) -> Self {
        Self {
            threshold: config.threshold,
            collect_every: config.collect_every,
            ..Self::default()
        }
    }

    /// Report `bytes` of external memory held for scripts.
    ///
    /// Forces a collection as soon as the pending amount reaches the
    /// threshold.
    pub fn allocated(&self, bytes: usize) {
        self.total.fetch_add(bytes as u64, Ordering::Relaxed);
        let pending = self.pending.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if self.over_threshold(pending) {
            tracing::debug!("External memory at {} bytes, collecting", pending);
            self.collect();
        }
    }

    /// Report that `bytes` of external memory were given back
    pub fn released(&self, bytes: usize) {
        let _ = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |pending| {
                Some(pending.saturating_sub(bytes))
            });
    }

    /// Account for a finished request; collects when due
    pub fn after_request(&self) {
        let requests = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = self.pending.load(Ordering::Relaxed);

        if self.over_threshold(pending) {
            tracing::debug!("Collecting after request {}: {} bytes pending", requests, pending);
            self.collect();
        } else if self.collect_every > 0 && requests % self.collect_every == 0 {
            tracing::debug!("Collecting after request {}", requests);
            self.collect();
        }

        self.pending.store(0, Ordering::Relaxed);
    }

    /// Run the collector now
    pub fn collect(&self) {
        boa_gc::force_collect();
        self.collections.fetch_add(1, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
    }

    /// Current counters
    pub fn stats(&self) -> GcStats {
        GcStats {
            pending_bytes: self.pending.load(Ordering::Relaxed),
            total_external_bytes: self.total.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
        }
    }

    fn over_threshold(&self, pending: usize) -> bool {
        self.threshold > 0 && pending >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(threshold: usize, collect_every: u64) -> GcNotifier {
        GcNotifier::new(&GcConfig {
            threshold,
            collect_every,
        })
    }

    #[test]
    fn test_threshold_forces_collection() {
        let gc = notifier(100, 0);
        gc.allocated(60);
        assert_eq!(gc.stats().collections, 0);
        gc.allocated(60);
        let stats = gc.stats();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.pending_bytes, 0);
        assert_eq!(stats.total_external_bytes, 120);
    }

    #[test]
    fn test_released_lowers_pressure() {
        let gc = notifier(100, 0);
        gc.allocated(90);
        gc.released(50);
        gc.allocated(50);
        assert_eq!(gc.stats().collections, 0);
        gc.released(1000);
        assert_eq!(gc.stats().pending_bytes, 0);
    }

    #[test]
    fn test_request_cadence() {
        let gc = notifier(0, 3);
        for _ in 0..7 {
            gc.after_request();
        }
        let stats = gc.stats();
        assert_eq!(stats.requests, 7);
        assert_eq!(stats.collections, 2);
    }

    #[test]
    fn test_after_request_resets_pending() {
        let gc = notifier(0, 0);
        gc.allocated(4096);
        gc.after_request();
        let stats = gc.stats();
        assert_eq!(stats.pending_bytes, 0);
        assert_eq!(stats.collections, 0);
    }
}
