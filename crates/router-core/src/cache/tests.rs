use super::*;
use crate::embedding::{EmbeddingClient, STUB_MODEL_ID};
use std::thread::sleep;

fn embedder() -> EmbeddingClient {
    EmbeddingClient::init(STUB_MODEL_ID, true).expect("stub embedder")
}

fn cache(threshold: f32, max_entries: usize, ttl: Option<Duration>) -> SemanticCache {
    SemanticCache::new(CacheOptions {
        enabled: true,
        similarity_threshold: threshold,
        max_entries,
        ttl,
    })
}

#[test]
fn miss_on_empty_cache() {
    let embedder = embedder();
    let cache = cache(0.8, 100, None);
    let result = cache.find_similar(&embedder, "gpt-default", "hello").unwrap();
    assert!(result.is_none());
}

#[test]
fn disabled_cache_always_misses() {
    let embedder = embedder();
    let cache = SemanticCache::new(CacheOptions {
        enabled: false,
        similarity_threshold: 0.0,
        max_entries: 100,
        ttl: None,
    });
    let id = cache
        .add_pending(&embedder, "m", "hello", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(id, b"resp".to_vec()).unwrap();
    let result = cache.find_similar(&embedder, "m", "hello").unwrap();
    assert!(result.is_none());
}

#[test]
fn pending_then_complete_is_retrievable() {
    let embedder = embedder();
    let cache = cache(0.99, 100, None);
    let id = cache
        .add_pending(&embedder, "gpt-default", "hello there", b"{}".to_vec())
        .unwrap();

    assert!(
        cache
            .find_similar(&embedder, "gpt-default", "hello there")
            .unwrap()
            .is_none(),
        "pending entries must not be matched"
    );

    cache
        .update_with_response(id, b"cached response".to_vec())
        .unwrap();

    let hit = cache
        .find_similar(&embedder, "gpt-default", "hello there")
        .unwrap();
    assert_eq!(hit, Some(b"cached response".to_vec()));
}

#[test]
fn match_is_partitioned_by_model() {
    let embedder = embedder();
    let cache = cache(0.99, 100, None);
    let id = cache
        .add_pending(&embedder, "model-a", "hello there", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(id, b"resp".to_vec()).unwrap();

    let miss = cache
        .find_similar(&embedder, "model-b", "hello there")
        .unwrap();
    assert!(miss.is_none());
}

#[test]
fn below_threshold_is_a_miss() {
    let embedder = embedder();
    let cache = cache(0.999_999, 100, None);
    let id = cache
        .add_pending(&embedder, "m", "hello there", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(id, b"resp".to_vec()).unwrap();

    let result = cache.find_similar(&embedder, "m", "a completely different query").unwrap();
    assert!(result.is_none());
}

#[test]
fn update_unknown_id_is_an_error() {
    let cache = cache(0.8, 100, None);
    let err = cache.update_with_response(999, b"x".to_vec()).unwrap_err();
    assert!(matches!(err, CacheError::PendingEntryNotFound { id: 999 }));
}

#[test]
fn update_already_complete_is_an_error() {
    let embedder = embedder();
    let cache = cache(0.8, 100, None);
    let id = cache
        .add_pending(&embedder, "m", "hello", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(id, b"first".to_vec()).unwrap();
    let err = cache.update_with_response(id, b"second".to_vec()).unwrap_err();
    assert!(matches!(err, CacheError::AlreadyComplete { id: got } if got == id));
}

#[test]
fn expired_entries_are_ignored_and_swept() {
    let embedder = embedder();
    let cache = cache(0.99, 100, Some(Duration::from_millis(20)));
    let id = cache
        .add_pending(&embedder, "m", "hello there", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(id, b"resp".to_vec()).unwrap();

    sleep(Duration::from_millis(40));

    let result = cache.find_similar(&embedder, "m", "hello there").unwrap();
    assert!(result.is_none());

    let removed = cache.sweep_expired();
    assert_eq!(removed, 1);
    assert!(cache.is_empty());
}

#[test]
fn eviction_prefers_expired_then_oldest_complete_then_pending() {
    let embedder = embedder();
    let cache = cache(0.99, 2, None);

    let a = cache
        .add_pending(&embedder, "m", "alpha query", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(a, b"alpha".to_vec()).unwrap();

    sleep(Duration::from_millis(5));
    let b = cache
        .add_pending(&embedder, "m", "beta query", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(b, b"beta".to_vec()).unwrap();

    // Inserting a third entry exceeds capacity 2; the oldest complete entry (`a`) is evicted.
    sleep(Duration::from_millis(5));
    let c = cache
        .add_pending(&embedder, "m", "gamma query", b"{}".to_vec())
        .unwrap();
    cache.update_with_response(c, b"gamma".to_vec()).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(
        cache
            .find_similar(&embedder, "m", "alpha query")
            .unwrap()
            .is_none()
    );
    assert!(
        cache
            .find_similar(&embedder, "m", "beta query")
            .unwrap()
            .is_some()
    );
    assert!(
        cache
            .find_similar(&embedder, "m", "gamma query")
            .unwrap()
            .is_some()
    );
}
