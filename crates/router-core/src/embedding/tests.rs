use super::*;

#[test]
fn cosine_similarity_identical_vectors_is_one() {
    let a = vec![0.6, 0.8];
    assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_similarity_orthogonal_is_zero() {
    let a = vec![1.0, 0.0];
    let b = vec![0.0, 1.0];
    assert!(cosine_similarity(&a, &b).abs() < 1e-6);
}

#[test]
fn cosine_similarity_zero_norm_defends_to_zero() {
    let a = vec![0.0, 0.0];
    let b = vec![1.0, 0.0];
    assert_eq!(cosine_similarity(&a, &b), 0.0);
}

#[test]
fn cosine_similarity_mismatched_length_is_zero() {
    let a = vec![1.0, 0.0];
    let b = vec![1.0, 0.0, 0.0];
    assert_eq!(cosine_similarity(&a, &b), 0.0);
}

#[test]
fn stub_client_is_deterministic() {
    let client = EmbeddingClient::init(STUB_MODEL_ID, true).expect("stub init");
    let a = client.embed("hello world").unwrap();
    let b = client.embed("hello world").unwrap();
    assert_eq!(a, b);
}

#[test]
fn stub_client_distinguishes_different_text() {
    let client = EmbeddingClient::init(STUB_MODEL_ID, true).expect("stub init");
    let a = client.embed("hello world").unwrap();
    let b = client.embed("goodbye world").unwrap();
    assert_ne!(a, b);
}

#[test]
fn most_similar_on_empty_candidates_returns_sentinel() {
    let client = EmbeddingClient::init(STUB_MODEL_ID, true).expect("stub init");
    let (index, score) = client.most_similar("hello", &[]).unwrap();
    assert_eq!(index, -1);
    assert_eq!(score, 0.0);
}

#[test]
fn most_similar_picks_the_closest_candidate() {
    let client = EmbeddingClient::init(STUB_MODEL_ID, true).expect("stub init");
    let (index, score) = client
        .most_similar("explain quantum physics", &["explain quantum physics", "bake a cake"])
        .unwrap();
    assert_eq!(index, 0);
    assert!(score > 0.99);
}

#[test]
fn missing_model_file_is_reported() {
    let err = EmbeddingClient::init("/nonexistent/model.gguf", true).unwrap_err();
    assert!(matches!(err, EmbeddingError::ModelNotFound { .. }));
}
