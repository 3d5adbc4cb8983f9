//! Per-stream state machine. One [`StreamHandler`] is constructed per gRPC stream and owns all
//! correlation state for that stream exclusively; nothing here is shared across streams.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::model::{extract_messages, extract_model, extract_usage, set_model};
use crate::pb::ProcessingRequest;
use crate::pb::processing_request::Request;
use crate::state::AppState;
use router_core::choose_model;

use super::directives;
use super::error::ExtProcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Headered,
    Routed,
    AwaitingBody,
    Done,
}

/// Drives one external-processor stream through `Init → Headered → Routed → AwaitingBody →
/// Done`, short-circuiting to `Done` immediately on a cache hit.
pub struct StreamHandler {
    app: AppState,
    phase: Phase,
    t_stream_start: Option<Instant>,
    t_route_start: Option<Instant>,
    original_model: String,
    selected_model: String,
    pending_cache_id: Option<u64>,
}

impl StreamHandler {
    pub fn new(app: AppState) -> Self {
        Self {
            app,
            phase: Phase::Init,
            t_stream_start: None,
            t_route_start: None,
            original_model: String::new(),
            selected_model: String::new(),
            pending_cache_id: None,
        }
    }

    /// Whether this stream has reached its terminal phase (response body processed, or an
    /// `ImmediateResponse` already emitted on a cache hit). Callers must stop invoking `handle`
    /// and close the stream once this is true, per the single-outstanding-directive contract.
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Consumes one inbound message and produces the matching directive. Returns `Err` only for
    /// the single user-visible failure mode: a malformed request body, which terminates the
    /// stream.
    ///
    /// Must not be called once [`StreamHandler::is_done`] is true.
    #[instrument(skip(self, message), fields(phase = ?self.phase))]
    pub async fn handle(
        &mut self,
        message: ProcessingRequest,
    ) -> Result<crate::pb::ProcessingResponse, ExtProcError> {
        match message.request {
            Some(Request::RequestHeaders(_)) => self.on_request_headers(),
            Some(Request::RequestBody(body)) => self.on_request_body(body.body).await,
            Some(Request::ResponseHeaders(_)) => self.on_response_headers(),
            Some(Request::ResponseBody(body)) => self.on_response_body(body.body).await,
            Some(Request::RequestTrailers(_)) | Some(Request::ResponseTrailers(_)) | None => {
                Ok(directives::response_body_continue())
            }
        }
    }

    fn on_request_headers(&mut self) -> Result<crate::pb::ProcessingResponse, ExtProcError> {
        self.t_stream_start = Some(Instant::now());
        self.phase = Phase::Headered;
        Ok(directives::request_headers_continue())
    }

    async fn on_request_body(
        &mut self,
        raw_body: Vec<u8>,
    ) -> Result<crate::pb::ProcessingResponse, ExtProcError> {
        self.t_route_start = Some(Instant::now());

        let body: Value = serde_json::from_slice(&raw_body).map_err(|err| {
            ExtProcError::MalformedRequestBody {
                reason: err.to_string(),
            }
        })?;

        self.original_model = extract_model(&body);
        self.app.metrics.record_model_request(&self.original_model);

        let messages = extract_messages(&body);
        let query = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let app = self.app.clone();
        let model_for_lookup = self.original_model.clone();
        let query_for_lookup = query.clone();
        let cache_result = tokio::task::spawn_blocking(move || {
            app.cache
                .find_similar(&app.embedder, &model_for_lookup, &query_for_lookup)
        })
        .await;

        let cache_hit = match cache_result {
            Ok(Ok(hit)) => hit,
            Ok(Err(err)) => {
                warn!(error = %err, "semantic cache lookup failed, treating as miss");
                None
            }
            Err(err) => {
                warn!(error = %err, "semantic cache lookup task panicked, treating as miss");
                None
            }
        };

        if let Some(response_body) = cache_hit {
            self.phase = Phase::Done;
            return Ok(directives::immediate_cache_hit(response_body));
        }

        let app = self.app.clone();
        let model_for_pending = self.original_model.clone();
        let query_for_pending = query.clone();
        let request_body_for_pending = raw_body.clone();
        if !query.is_empty() && self.app.cache.is_enabled() {
            let pending = tokio::task::spawn_blocking(move || {
                app.cache.add_pending(
                    &app.embedder,
                    &model_for_pending,
                    &query_for_pending,
                    request_body_for_pending,
                )
            })
            .await;
            self.pending_cache_id = match pending {
                Ok(Ok(id)) => Some(id),
                Ok(Err(err)) => {
                    warn!(error = %err, "failed to register pending cache entry");
                    None
                }
                Err(err) => {
                    warn!(error = %err, "pending cache registration task panicked");
                    None
                }
            };
        }

        let app = self.app.clone();
        let original_model = self.original_model.clone();
        let (chosen_model, routed, mut body) = tokio::task::spawn_blocking(move || {
            let (chosen_model, routed) =
                choose_model(&app.embedder, &app.config, &original_model, &messages);
            (chosen_model, routed, body)
        })
        .await
        .map_err(|err| ExtProcError::Transport {
            reason: err.to_string(),
        })?;

        if let Some(elapsed) = self.t_route_start.map(|t| t.elapsed().as_secs_f64()) {
            self.app.metrics.record_model_routing_latency(elapsed);
        }

        self.selected_model = chosen_model.clone();
        self.phase = Phase::Routed;

        if routed {
            self.app
                .metrics
                .record_model_routing(&self.original_model, &chosen_model);
            set_model(&mut body, &chosen_model);
            let new_body = serde_json::to_vec(&body).unwrap_or(raw_body);
            return Ok(directives::request_body_mutated(new_body));
        }

        Ok(directives::request_body_continue())
    }

    fn on_response_headers(&mut self) -> Result<crate::pb::ProcessingResponse, ExtProcError> {
        self.phase = Phase::AwaitingBody;
        Ok(directives::response_headers_continue())
    }

    async fn on_response_body(
        &mut self,
        raw_body: Vec<u8>,
    ) -> Result<crate::pb::ProcessingResponse, ExtProcError> {
        let completion_latency = self
            .t_stream_start
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let usage = match serde_json::from_slice::<Value>(&raw_body) {
            Ok(body) => extract_usage(&body),
            Err(err) => {
                debug!(error = %err, "failed to parse upstream response body, recording zero usage");
                Default::default()
            }
        };

        if !self.selected_model.is_empty() {
            self.app
                .metrics
                .record_model_completion_latency(&self.selected_model, completion_latency);
            self.app.metrics.record_model_tokens(
                &self.selected_model,
                usage.prompt_tokens,
                usage.completion_tokens,
            );
        }

        if let Some(cache_id) = self.pending_cache_id {
            if !raw_body.is_empty() {
                let app = self.app.clone();
                let body_for_cache = raw_body.clone();
                let updated = tokio::task::spawn_blocking(move || {
                    app.cache.update_with_response(cache_id, body_for_cache)
                })
                .await;
                if let Ok(Err(err)) = updated {
                    warn!(error = %err, cache_id, "failed to complete pending cache entry");
                }
            }
        }

        self.phase = Phase::Done;
        Ok(directives::response_body_continue())
    }
}
