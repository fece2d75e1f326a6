use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::models::recognition::{RecognitionCandidate, RecognitionResult, ResultSource};

/// Default expiry horizon (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached winning candidate for one digest.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub plate: String,
    pub confidence: f64,
    pub region: Option<String>,
    pub processing_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }

    fn to_result(&self) -> RecognitionResult {
        RecognitionResult {
            candidates: vec![RecognitionCandidate {
                plate: self.plate.clone(),
                confidence: self.confidence,
                region: self.region.clone(),
                vehicle_type: None,
                bounding_box: None,
            }],
            processing_time_ms: self.processing_time_ms,
            filename: String::new(),
            timestamp: self.created_at,
            source: ResultSource::Cache,
            from_cache: true,
        }
    }
}

/// Recognition result cache shared across independent operations.
///
/// Backed by a sharded concurrent map: each digest is an independent entry,
/// concurrent stores to the same digest resolve last-write-wins.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: chrono::Duration,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Lowercase hex SHA-256 of the image bytes.
    pub fn digest(image: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image);
        format!("{:x}", hasher.finalize())
    }

    /// Return the cached result for these bytes, if present and not expired.
    ///
    /// An expired entry is removed on the spot.
    pub fn lookup(&self, image: &[u8]) -> Option<RecognitionResult> {
        let key = Self::digest(image);
        let now = Utc::now();

        match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                tracing::debug!(digest = %key, plate = %entry.plate, "Cache hit");
                return Some(entry.to_result());
            }
            Some(_) => {}
            None => return None,
        }

        // Only drop it if a concurrent store has not refreshed it meanwhile.
        if self
            .entries
            .remove_if(&key, |_, entry| entry.is_expired(now, self.ttl))
            .is_some()
        {
            tracing::debug!(digest = %key, "Cache entry expired, evicted");
        }
        None
    }

    /// Persist the top candidate of `result` under the digest of `image`.
    ///
    /// Results without candidates are not cached.
    pub fn store(&self, image: &[u8], result: &RecognitionResult) {
        let Some(best) = result.best() else {
            return;
        };

        let key = Self::digest(image);
        tracing::debug!(digest = %key, plate = %best.plate, "Caching recognition result");
        self.entries.insert(
            key,
            CacheEntry {
                plate: best.plate.clone(),
                confidence: best.confidence,
                region: best.region.clone(),
                processing_time_ms: result.processing_time_ms,
                created_at: Utc::now(),
            },
        );
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::info!(removed, "Swept expired cache entries");
        }
        removed
    }

    pub fn entry(&self, image: &[u8]) -> Option<CacheEntry> {
        self.entries.get(&Self::digest(image)).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
