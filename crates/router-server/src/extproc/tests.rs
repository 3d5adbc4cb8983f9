use std::sync::{Arc, Mutex};

use router_core::{CacheOptions, Config, EmbeddingClient, MetricsSink, SemanticCache};
use serde_json::json;

use super::stream::StreamHandler;
use crate::pb::processing_request::Request as ReqVariant;
use crate::pb::processing_response::Response as RespVariant;
use crate::pb::{HttpBody, HttpHeaders, ProcessingRequest};
use crate::state::AppState;

const DOC: &str = r#"
embed_model:
  model_id: stub
  threshold: 0.6
  use_cpu: true
default_model: gpt-default
semantic_cache:
  enabled: true
  similarity_threshold: 0.85
  max_entries: 100
  ttl_seconds: 0
categories:
  - name: physics
    description: physics
    model: physics-model
    tasks:
      - name: explain
        description: explain physics
        typical_prompt: "Answer like a physicist explaining concepts clearly"
"#;

#[derive(Default)]
struct RecordingMetrics {
    routed: Mutex<Vec<(String, String)>>,
    requested: Mutex<Vec<String>>,
    tokens: Mutex<Vec<(String, u64, u64)>>,
}

impl MetricsSink for RecordingMetrics {
    fn record_model_request(&self, model: &str) {
        self.requested.lock().unwrap().push(model.to_string());
    }
    fn record_model_routing(&self, from_model: &str, to_model: &str) {
        self.routed
            .lock()
            .unwrap()
            .push((from_model.to_string(), to_model.to_string()));
    }
    fn record_model_routing_latency(&self, _seconds: f64) {}
    fn record_model_completion_latency(&self, _model: &str, _seconds: f64) {}
    fn record_model_tokens(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) {
        self.tokens
            .lock()
            .unwrap()
            .push((model.to_string(), prompt_tokens, completion_tokens));
    }
}

fn app_with_metrics(cache_enabled: bool) -> (AppState, Arc<RecordingMetrics>) {
    let mut config = Config::from_yaml_str(DOC).expect("valid config");
    config.semantic_cache.enabled = cache_enabled;
    let embedder = Arc::new(EmbeddingClient::init("stub", true).expect("stub embedder"));
    let cache = Arc::new(SemanticCache::new(CacheOptions {
        enabled: cache_enabled,
        similarity_threshold: config.semantic_cache.similarity_threshold,
        max_entries: config.semantic_cache.max_entries,
        ttl: config.semantic_cache.ttl(),
    }));
    let metrics = Arc::new(RecordingMetrics::default());
    let app = AppState::new(Arc::new(config), embedder, cache, metrics.clone());
    (app, metrics)
}

fn request_headers() -> ProcessingRequest {
    ProcessingRequest {
        request: Some(ReqVariant::RequestHeaders(HttpHeaders {
            headers: None,
            end_of_stream: false,
        })),
    }
}

fn request_body(body: serde_json::Value) -> ProcessingRequest {
    ProcessingRequest {
        request: Some(ReqVariant::RequestBody(HttpBody {
            body: serde_json::to_vec(&body).unwrap(),
            end_of_stream: true,
        })),
    }
}

fn response_headers() -> ProcessingRequest {
    ProcessingRequest {
        request: Some(ReqVariant::ResponseHeaders(HttpHeaders {
            headers: None,
            end_of_stream: false,
        })),
    }
}

fn response_body(body: serde_json::Value) -> ProcessingRequest {
    ProcessingRequest {
        request: Some(ReqVariant::ResponseBody(HttpBody {
            body: serde_json::to_vec(&body).unwrap(),
            end_of_stream: true,
        })),
    }
}

#[tokio::test]
async fn simple_routing_mutates_body_and_records_metric() {
    let (app, metrics) = app_with_metrics(false);
    let mut handler = StreamHandler::new(app);

    handler.handle(request_headers()).await.unwrap();
    let resp = handler
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [
                {"role": "system", "content": "Answer like a physicist explaining concepts clearly"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .await
        .unwrap();

    match resp.response.unwrap() {
        RespVariant::RequestBody(body_resp) => {
            let mutation = body_resp.response.unwrap().body_mutation.unwrap();
            let new_body = match mutation.mutation.unwrap() {
                crate::pb::body_mutation::Mutation::Body(bytes) => bytes,
                _ => panic!("expected body mutation"),
            };
            let value: serde_json::Value = serde_json::from_slice(&new_body).unwrap();
            assert_eq!(value["model"], "physics-model");
        }
        other => panic!("expected RequestBody directive, got {other:?}"),
    }

    assert_eq!(
        metrics.routed.lock().unwrap().as_slice(),
        &[("gpt-default".to_string(), "physics-model".to_string())]
    );
}

#[tokio::test]
async fn no_user_content_leaves_body_unmutated() {
    let (app, metrics) = app_with_metrics(false);
    let mut handler = StreamHandler::new(app);

    handler.handle(request_headers()).await.unwrap();
    let resp = handler
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [
                {"role": "system", "content": "Answer like a physicist explaining concepts clearly"}
            ]
        })))
        .await
        .unwrap();

    match resp.response.unwrap() {
        RespVariant::RequestBody(body_resp) => {
            assert!(body_resp.response.unwrap().body_mutation.is_none());
        }
        other => panic!("expected RequestBody directive, got {other:?}"),
    }
    assert!(metrics.routed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn below_threshold_falls_back_without_routing_metric() {
    let (app, metrics) = app_with_metrics(false);
    let mut handler = StreamHandler::new(app);

    handler.handle(request_headers()).await.unwrap();
    let resp = handler
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [
                {"role": "system", "content": "totally unrelated gardening chit chat"},
                {"role": "user", "content": "hi"}
            ]
        })))
        .await
        .unwrap();

    match resp.response.unwrap() {
        RespVariant::RequestBody(body_resp) => {
            assert!(body_resp.response.unwrap().body_mutation.is_none());
        }
        other => panic!("expected RequestBody directive, got {other:?}"),
    }
    assert_eq!(metrics.requested.lock().unwrap().as_slice(), &["gpt-default".to_string()]);
    assert!(metrics.routed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cache_hit_short_circuits_with_immediate_response() {
    let (app, _metrics) = app_with_metrics(true);

    // Prime the cache directly, the way a prior completed transaction would have.
    let id = app
        .cache
        .add_pending(&app.embedder, "gpt-default", "hi", b"{}".to_vec())
        .unwrap();
    app.cache
        .update_with_response(id, br#"{"choices":[{"message":{"content":"cached"}}]}"#.to_vec())
        .unwrap();

    let mut handler = StreamHandler::new(app);
    handler.handle(request_headers()).await.unwrap();
    let resp = handler
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();

    match resp.response.unwrap() {
        RespVariant::ImmediateResponse(immediate) => {
            assert_eq!(immediate.status_code, 200);
            let headers = immediate.headers.unwrap().set_headers;
            assert!(headers.iter().any(|h| h.key == "x-cache-hit" && h.value == "true"));
        }
        other => panic!("expected ImmediateResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn cache_miss_then_response_populates_cache_for_next_request() {
    let (app, metrics) = app_with_metrics(true);
    let mut handler = StreamHandler::new(app.clone());

    handler.handle(request_headers()).await.unwrap();
    let resp = handler
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();
    assert!(matches!(resp.response.unwrap(), RespVariant::RequestBody(_)));

    handler.handle(response_headers()).await.unwrap();
    handler
        .handle(response_body(json!({
            "usage": {"prompt_tokens": 3, "completion_tokens": 7, "total_tokens": 10}
        })))
        .await
        .unwrap();

    assert_eq!(metrics.tokens.lock().unwrap().as_slice(), &[("gpt-default".to_string(), 3, 7)]);

    // A subsequent identical request should now hit the cache.
    let mut second = StreamHandler::new(app);
    second.handle(request_headers()).await.unwrap();
    let resp = second
        .handle(request_body(json!({
            "model": "gpt-default",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .await
        .unwrap();
    assert!(matches!(resp.response.unwrap(), RespVariant::ImmediateResponse(_)));
}

#[tokio::test]
async fn malformed_request_body_is_reported_as_an_error() {
    let (app, _metrics) = app_with_metrics(false);
    let mut handler = StreamHandler::new(app);
    handler.handle(request_headers()).await.unwrap();

    let bad = ProcessingRequest {
        request: Some(ReqVariant::RequestBody(HttpBody {
            body: b"not json".to_vec(),
            end_of_stream: true,
        })),
    };
    let err = handler.handle(bad).await.unwrap_err();
    assert!(matches!(
        err,
        super::error::ExtProcError::MalformedRequestBody { .. }
    ));
}
