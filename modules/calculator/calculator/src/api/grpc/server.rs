//! gRPC Server implementation for calculator
//!
//! The server implementation handles gRPC requests and delegates
//! to the domain Service for business logic.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use calculator_sdk::{
    CalculationRequest, CalculationResponse, CalculatorService, HealthCheckRequest,
    HealthCheckResponse,
};

use crate::domain::Service;

/// Responses buffered per stream before the reader waits for the client.
const STREAM_BUFFER: usize = 32;

/// gRPC service implementation that wraps the domain Service.
#[derive(Clone)]
pub struct CalculatorServiceImpl {
    service: Arc<Service>,
}

impl CalculatorServiceImpl {
    /// Create a new `CalculatorService` implementation with the given `Service`.
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl CalculatorService for CalculatorServiceImpl {
    async fn calculate(
        &self,
        request: Request<CalculationRequest>,
    ) -> Result<Response<CalculationResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(self.service.calculate(&req)))
    }

    type StreamCalculateStream = ReceiverStream<Result<CalculationResponse, Status>>;

    async fn stream_calculate(
        &self,
        request: Request<Streaming<CalculationRequest>>,
    ) -> Result<Response<Self::StreamCalculateStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let service = Arc::clone(&self.service);

        tokio::spawn(async move {
            let mut handled: u64 = 0;
            loop {
                match inbound.message().await {
                    Ok(Some(req)) => {
                        let resp = service.calculate(&req);
                        handled += 1;
                        if tx.send(Ok(resp)).await.is_err() {
                            tracing::debug!(handled, "stream receiver dropped");
                            return;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(handled, "calculation stream completed");
                        return;
                    }
                    Err(status) => {
                        tracing::warn!(handled, code = ?status.code(), error = %status.message(), "calculation stream failed");
                        // the receiver may already be gone
                        _ = tx.send(Err(status)).await;
                        return;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn health_check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        tracing::debug!(service = %request.get_ref().service, "health check");
        Ok(Response::new(self.service.health()))
    }
}
