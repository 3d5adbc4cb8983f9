//! gRPC service implementing the external-processor protocol.

pub mod directives;
pub mod error;
pub mod stream;

#[cfg(test)]
mod tests;

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, warn};

use crate::pb::external_processor_server::ExternalProcessor;
use crate::pb::{ProcessingRequest, ProcessingResponse};
use crate::state::AppState;
use error::ExtProcError;
use stream::StreamHandler;

pub type ProcessingResponseStream =
    Pin<Box<dyn Stream<Item = Result<ProcessingResponse, Status>> + Send + 'static>>;

/// The external-processor gRPC service. One [`StreamHandler`] is spawned per call to `process`.
pub struct RouterExtProcService {
    app: AppState,
}

impl RouterExtProcService {
    pub fn new(app: AppState) -> Self {
        Self { app }
    }
}

#[tonic::async_trait]
impl ExternalProcessor for RouterExtProcService {
    type ProcessStream = ProcessingResponseStream;

    async fn process(
        &self,
        request: Request<Streaming<ProcessingRequest>>,
    ) -> Result<Response<Self::ProcessStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(16);
        let mut handler = StreamHandler::new(self.app.clone());

        tokio::spawn(async move {
            loop {
                let message = match inbound.next().await {
                    Some(Ok(message)) => message,
                    Some(Err(status)) => {
                        warn!(%status, "ext_proc stream transport error, terminating");
                        break;
                    }
                    None => break,
                };

                match handler.handle(message).await {
                    Ok(directive) => {
                        if tx.send(Ok(directive)).await.is_err() {
                            break;
                        }
                        if handler.is_done() {
                            // An ImmediateResponse (or a completed response body) means no
                            // further messages are expected for this stream; stop polling
                            // `inbound` rather than keep consuming/responding past it.
                            break;
                        }
                    }
                    Err(ExtProcError::MalformedRequestBody { reason }) => {
                        let _ = tx
                            .send(Err(Status::invalid_argument(format!(
                                "malformed request body: {reason}"
                            ))))
                            .await;
                        break;
                    }
                    Err(ExtProcError::Transport { reason }) => {
                        error!(reason, "ext_proc internal transport failure, terminating stream");
                        let _ = tx.send(Err(Status::internal(reason))).await;
                        break;
                    }
                }
            }
        });

        let output = tokio_stream::wrappers::ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(output)))
    }
}
