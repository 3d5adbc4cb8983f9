//! Semantic cache: a similarity-indexed store of prior responses, partitioned by model.

pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::CacheError;
pub use types::{CacheEntry, EntryState};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::embedding::{EmbeddingClient, cosine_similarity};

/// Tunable behavior for [`SemanticCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub enabled: bool,
    pub similarity_threshold: f32,
    pub max_entries: usize,
    pub ttl: Option<Duration>,
}

struct Index {
    entries: HashMap<u64, CacheEntry>,
}

impl Index {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

/// Thread-safe similarity cache. The embedding client passed to [`SemanticCache::find_similar`]
/// and [`SemanticCache::add_pending`] is invoked *outside* the internal lock, so a slow
/// inference call never blocks concurrent cache readers.
pub struct SemanticCache {
    options: CacheOptions,
    index: Mutex<Index>,
    next_id: AtomicU64,
}

impl SemanticCache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            index: Mutex::new(Index::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    /// Looks up the best match for `query` within entries stored under `model`. Returns `None`
    /// on a miss (including when the cache is disabled or `query` is empty).
    pub fn find_similar(
        &self,
        embedder: &EmbeddingClient,
        model: &str,
        query: &str,
    ) -> Result<Option<Vec<u8>>, CacheError> {
        if !self.options.enabled || query.is_empty() {
            return Ok(None);
        }

        let query_vec = embedder
            .embed(query)
            .map_err(|err| CacheError::EmbeddingFailed {
                reason: err.to_string(),
            })?;

        let index = self.index.lock();
        let now = Instant::now();
        let mut best: Option<(&CacheEntry, f32)> = None;
        for entry in index.entries.values() {
            if entry.model != model || !entry.is_complete() {
                continue;
            }
            if self.is_expired(entry, now) {
                continue;
            }
            let score = cosine_similarity(&query_vec, &entry.embedding);
            let better = match best {
                None => true,
                Some((best_entry, best_score)) => {
                    score > best_score
                        || (score == best_score && entry.created_at > best_entry.created_at)
                }
            };
            if better {
                best = Some((entry, score));
            }
        }

        match best {
            Some((entry, score)) if score >= self.options.similarity_threshold => {
                debug!(model, score, "semantic cache hit");
                Ok(entry.response_body().map(|b| b.to_vec()))
            }
            _ => Ok(None),
        }
    }

    /// Reserves a pending slot for `query` under `model`, computing and storing its embedding so
    /// later lookups can match against it once it is completed. Returns the new entry's id.
    pub fn add_pending(
        &self,
        embedder: &EmbeddingClient,
        model: &str,
        query: &str,
        request_body: Vec<u8>,
    ) -> Result<u64, CacheError> {
        let embedding = embedder
            .embed(query)
            .map_err(|err| CacheError::EmbeddingFailed {
                reason: err.to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry {
            id,
            model: model.to_string(),
            query: query.to_string(),
            embedding,
            request_body,
            created_at: Instant::now(),
            state: EntryState::Pending,
        };

        let mut index = self.index.lock();
        self.evict_to_capacity(&mut index);
        index.entries.insert(id, entry);
        Ok(id)
    }

    /// Promotes a pending entry to `Complete`, attaching the response body.
    pub fn update_with_response(
        &self,
        cache_id: u64,
        response_body: Vec<u8>,
    ) -> Result<(), CacheError> {
        let mut index = self.index.lock();
        match index.entries.get_mut(&cache_id) {
            None => Err(CacheError::PendingEntryNotFound { id: cache_id }),
            Some(entry) if entry.is_complete() => {
                Err(CacheError::AlreadyComplete { id: cache_id })
            }
            Some(entry) => {
                entry.state = EntryState::Complete { response_body };
                Ok(())
            }
        }
    }

    /// Removes every expired entry. Intended to be driven by a periodic background task; has no
    /// effect on correctness (expired entries are already ignored by `find_similar`).
    pub fn sweep_expired(&self) -> usize {
        let mut index = self.index.lock();
        let now = Instant::now();
        let before = index.entries.len();
        index.entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - index.entries.len();
        if removed > 0 {
            debug!(removed, "semantic cache sweep removed expired entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        match self.options.ttl {
            Some(ttl) => now.duration_since(entry.created_at) > ttl,
            None => false,
        }
    }

    /// Two-tier eviction: expired entries first, then the oldest `Complete` entry, and only as a
    /// last resort a `Pending` entry. Called with the index already locked, before inserting a
    /// new entry.
    fn evict_to_capacity(&self, index: &mut Index) {
        if self.options.max_entries == 0 {
            return;
        }
        while index.entries.len() >= self.options.max_entries {
            let now = Instant::now();
            if let Some(id) = index
                .entries
                .iter()
                .find(|(_, e)| self.is_expired(e, now))
                .map(|(id, _)| *id)
            {
                index.entries.remove(&id);
                continue;
            }

            if let Some(id) = index
                .entries
                .iter()
                .filter(|(_, e)| e.is_complete())
                .min_by_key(|(_, e)| e.created_at)
                .map(|(id, _)| *id)
            {
                index.entries.remove(&id);
                continue;
            }

            if let Some(id) = index
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(id, _)| *id)
            {
                warn!(id, "evicting pending cache entry to stay within capacity");
                index.entries.remove(&id);
                continue;
            }

            break;
        }
    }
}
