//! Fetch metrics
//!
//! Counters are plain atomics updated on the hot path with relaxed ordering;
//! readers take a [`MetricsSnapshot`], which is serializable for the proxy's
//! stats endpoint.

#![allow(clippy::cast_precision_loss)] // Ratios accept precision loss

use crate::fallback::FallbackKind;
use serde::Serialize;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

// Cache-line aligned so concurrent strategies do not contend on one line
#[repr(align(64))]
#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    #[inline]
    fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters shared by the controller and its background tasks
#[derive(Debug)]
pub struct FetchMetrics {
    requests: Counter,
    cache_hits: Counter,
    cache_misses: Counter,
    network_fetches: Counter,
    network_failures: Counter,
    passthroughs: Counter,
    page_fallbacks: Counter,
    image_fallbacks: Counter,
    resource_fallbacks: Counter,
    stylesheet_fallbacks: Counter,
    revalidations: Counter,
    revalidation_failures: Counter,
    trims: Counter,
    trimmed_entries: Counter,
    started_at: Instant,
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self {
            requests: Counter::default(),
            cache_hits: Counter::default(),
            cache_misses: Counter::default(),
            network_fetches: Counter::default(),
            network_failures: Counter::default(),
            passthroughs: Counter::default(),
            page_fallbacks: Counter::default(),
            image_fallbacks: Counter::default(),
            resource_fallbacks: Counter::default(),
            stylesheet_fallbacks: Counter::default(),
            revalidations: Counter::default(),
            revalidation_failures: Counter::default(),
            trims: Counter::default(),
            trimmed_entries: Counter::default(),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.incr();
    }

    pub fn record_hit(&self) {
        self.cache_hits.incr();
    }

    pub fn record_miss(&self) {
        self.cache_misses.incr();
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.incr();
    }

    pub fn record_network_failure(&self) {
        self.network_failures.incr();
    }

    pub fn record_passthrough(&self) {
        self.passthroughs.incr();
    }

    pub fn record_fallback(&self, kind: FallbackKind) {
        match kind {
            FallbackKind::Page => self.page_fallbacks.incr(),
            FallbackKind::Image => self.image_fallbacks.incr(),
            FallbackKind::Resource => self.resource_fallbacks.incr(),
            FallbackKind::Stylesheet => self.stylesheet_fallbacks.incr(),
        }
    }

    pub fn record_revalidation(&self, succeeded: bool) {
        self.revalidations.incr();
        if !succeeded {
            self.revalidation_failures.incr();
        }
    }

    pub fn record_trim(&self, removed: usize) {
        self.trims.incr();
        self.trimmed_entries.add(removed as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
            network_fetches: self.network_fetches.get(),
            network_failures: self.network_failures.get(),
            passthroughs: self.passthroughs.get(),
            fallbacks: FallbackCounts {
                page: self.page_fallbacks.get(),
                image: self.image_fallbacks.get(),
                resource: self.resource_fallbacks.get(),
                stylesheet: self.stylesheet_fallbacks.get(),
            },
            revalidations: self.revalidations.get(),
            revalidation_failures: self.revalidation_failures.get(),
            trims: self.trims.get(),
            trimmed_entries: self.trimmed_entries.get(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FallbackCounts {
    pub page: u64,
    pub image: u64,
    pub resource: u64,
    pub stylesheet: u64,
}

impl FallbackCounts {
    pub fn total(&self) -> u64 {
        self.page + self.image + self.resource + self.stylesheet
    }
}

/// Point-in-time copy of [`FetchMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    pub passthroughs: u64,
    pub fallbacks: FallbackCounts,
    pub revalidations: u64,
    pub revalidation_failures: u64,
    pub trims: u64,
    pub trimmed_entries: u64,
    pub uptime_secs: u64,
}

impl MetricsSnapshot {
    /// Hits over cache lookups
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}
