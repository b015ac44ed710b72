//! In-memory cache of per-image analyses.
//!
//! Keyed by the SHA-256 of the image bytes plus the analysis strategy, so
//! the same photo submitted again within the TTL skips the provider call.
//! Placeholder and failed results are never cached.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::Strategy;
use crate::models::{ImageInput, PerImageAnalysis};

/// Default TTL for cached analyses (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Entry count above which expired entries are pruned on insert.
const PRUNE_THRESHOLD: usize = 100;

/// A cached value with expiration time.
struct CacheEntry<T> {
    value: T,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl<T: Clone> CacheEntry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    fn get(&self) -> Option<T> {
        if self.is_expired() {
            None
        } else {
            Some(self.value.clone())
        }
    }
}

/// TTL cache of [`PerImageAnalysis`] results.
pub struct AnalysisCache {
    entries: RwLock<HashMap<String, CacheEntry<PerImageAnalysis>>>,
    ttl: Duration,
}

impl AnalysisCache {
    /// Create a new cache with default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a new cache with custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cache key for an image under a strategy.
    pub fn key(image: &ImageInput, strategy: Strategy) -> String {
        format!("{}:{}", strategy.as_str(), image.content_hash())
    }

    /// Cached analysis for `image`, renamed to the requesting filename.
    pub fn get(&self, image: &ImageInput, strategy: Strategy) -> Option<PerImageAnalysis> {
        let key = Self::key(image, strategy);
        self.entries
            .read()
            .ok()
            .and_then(|guard| guard.get(&key).and_then(|e| e.get()))
            .map(|mut analysis| {
                analysis.filename = image.filename.clone();
                analysis
            })
    }

    /// Store `analysis` for `image`. Placeholders are ignored.
    pub fn insert(&self, image: &ImageInput, strategy: Strategy, analysis: &PerImageAnalysis) {
        if analysis.is_placeholder() {
            return;
        }
        let key = Self::key(image, strategy);
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(key, CacheEntry::new(analysis.clone(), self.ttl));
            // Prune expired entries occasionally (when cache grows large)
            if guard.len() > PRUNE_THRESHOLD {
                guard.retain(|_, entry| !entry.is_expired());
            }
        }
    }

    /// Number of entries, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.write() {
            guard.clear();
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}
