//! Cache entry data model.

use std::time::Instant;

/// Lifecycle state of a [`CacheEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// Reserved at request time; no response recorded yet.
    Pending,
    /// Populated with a response body and eligible for matching.
    Complete { response_body: Vec<u8> },
}

/// A single semantic cache slot. Entries are partitioned by `model` and matched by cosine
/// similarity between `embedding` and a query vector.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: u64,
    pub model: String,
    pub query: String,
    pub embedding: Vec<f32>,
    pub request_body: Vec<u8>,
    pub created_at: Instant,
    pub state: EntryState,
}

impl CacheEntry {
    pub fn is_complete(&self) -> bool {
        matches!(self.state, EntryState::Complete { .. })
    }

    pub fn response_body(&self) -> Option<&[u8]> {
        match &self.state {
            EntryState::Complete { response_body } => Some(response_body.as_slice()),
            EntryState::Pending => None,
        }
    }
}
