//! gRPC dispatch client for the calculator service.
//!
//! Requests are validated locally before anything goes on the wire. Calls run
//! through [`call_with_retry`] with a per-attempt deadline; transient failures
//! are retried with linear backoff and terminal ones are mapped to a
//! user-facing message. Every outcome ends up in a [`CalculationResult`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calc_transport_grpc::{RetryError, RpcRetryConfig, call_with_retry, connect_lazy, connect_with_retry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, error, info, warn};

use crate::api::{CalculationResult, CalculatorClientV1, CalculatorError};
use crate::config::{ClientConfig, ValidationLimits};
use crate::proto::calculator_service_client::CalculatorServiceClient;
use crate::proto::health_check_response::ServingStatus;
use crate::proto::{CalculationRequest, HealthCheckRequest};
use crate::validation::InputValidator;

/// Category of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Timeout,
    InvalidArgument,
    Internal,
    Unimplemented,
    Other,
}

impl FailureKind {
    #[must_use]
    pub fn of(status: &Status) -> Self {
        match status.code() {
            Code::Unavailable => Self::Unavailable,
            Code::DeadlineExceeded => Self::Timeout,
            Code::InvalidArgument => Self::InvalidArgument,
            Code::Internal => Self::Internal,
            Code::Unimplemented => Self::Unimplemented,
            _ => Self::Other,
        }
    }

    /// Message shown to the user for a call that failed with `status`.
    #[must_use]
    pub fn user_message(self, status: &Status) -> String {
        match self {
            Self::Unavailable => "Server unavailable: it may not be running or the connection was lost".to_owned(),
            Self::Timeout => "Request timed out: the server did not respond in time".to_owned(),
            Self::InvalidArgument => format!("Invalid request: {}", status.message()),
            Self::Internal => format!("Server internal error: {}", status.message()),
            Self::Unimplemented => "Operation not supported by the server".to_owned(),
            Self::Other => format!("gRPC error ({:?}): {}", status.code(), status.message()),
        }
    }
}

/// Remote dispatch client.
///
/// Cheap to share behind an [`Arc`]: the channel is multiplexed and the
/// validator is stateless. Cloning the tonic client per call is the intended
/// way to use a shared channel.
pub struct CalculatorGrpcClient {
    inner: CalculatorServiceClient<Channel>,
    validator: InputValidator,
    retry: RpcRetryConfig,
    request_timeout: Duration,
    connection_timeout: Duration,
    client_id: String,
    shutdown: CancellationToken,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_owned()
}

impl CalculatorGrpcClient {
    /// Create a client over a lazily connected channel. Never blocks.
    ///
    /// # Errors
    /// Returns [`CalculatorError::InvalidEndpoint`] if host and port do not
    /// form a valid URI.
    pub fn new(cfg: &ClientConfig, limits: ValidationLimits) -> Result<Self, CalculatorError> {
        let uri = cfg.endpoint_uri();
        let channel = connect_lazy::<Channel>(uri.clone(), &cfg.grpc_config()).map_err(|e| {
            CalculatorError::InvalidEndpoint {
                uri,
                reason: format!("{e:#}"),
            }
        })?;
        Ok(Self::from_parts(CalculatorServiceClient::new(channel), cfg, limits))
    }

    /// Create a client and verify that the server accepts connections,
    /// retrying with backoff.
    ///
    /// # Errors
    /// Returns [`CalculatorError::Transport`] when no connection could be made.
    pub async fn connect(cfg: &ClientConfig, limits: ValidationLimits) -> Result<Self, CalculatorError> {
        let channel = connect_with_retry::<Channel>(cfg.endpoint_uri(), &cfg.grpc_config())
            .await
            .map_err(|e| CalculatorError::Transport(format!("{e:#}")))?;
        Ok(Self::from_parts(CalculatorServiceClient::new(channel), cfg, limits))
    }

    fn from_parts(
        inner: CalculatorServiceClient<Channel>,
        cfg: &ClientConfig,
        limits: ValidationLimits,
    ) -> Self {
        let client_id = short_id();
        info!(
            client_id = %client_id,
            endpoint = %cfg.endpoint_uri(),
            max_attempts = cfg.max_retry_attempts,
            "calculator client created"
        );
        Self {
            inner,
            validator: InputValidator::new(limits),
            retry: cfg.retry_config(),
            request_timeout: cfg.request_timeout(),
            connection_timeout: cfg.connection_timeout(),
            client_id,
            shutdown: CancellationToken::new(),
        }
    }

    /// Short correlation prefix attached to this client's log lines.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Validate, dispatch with retries and wait for the outcome.
    pub async fn perform(&self, operand1: f64, operand2: f64, operator: &str) -> CalculationResult {
        if self.shutdown.is_cancelled() {
            warn!(client_id = %self.client_id, "calculation requested after shutdown");
            return CalculationResult::failure("client has been shut down");
        }

        let verdict = self.validator.validate_request(operand1, operand2, operator);
        if let Some(message) = verdict.error_message() {
            debug!(
                client_id = %self.client_id,
                operand1,
                operand2,
                operator,
                error = %message,
                "request rejected by local validation"
            );
            return CalculationResult::failure(message);
        }

        let request = CalculationRequest::new(operand1, operand2, operator.trim());
        let request_id = request.request_id.clone();
        let timeout = self.request_timeout;

        debug!(
            client_id = %self.client_id,
            request_id = %request_id,
            operand1,
            operand2,
            operator,
            "dispatching calculation"
        );

        let mut client = self.inner.clone();
        let outcome = call_with_retry(
            &mut client,
            &self.retry,
            request,
            |c: &mut CalculatorServiceClient<Channel>, req: CalculationRequest| {
                let mut c = c.clone();
                async move {
                    let mut req = tonic::Request::new(req);
                    req.set_timeout(timeout);
                    c.calculate(req).await.map(tonic::Response::into_inner)
                }
            },
            "calculator.calculate",
            &self.shutdown,
        )
        .await;

        match outcome {
            Ok(response) if response.request_id != request_id => {
                error!(
                    client_id = %self.client_id,
                    request_id = %request_id,
                    response_id = %response.request_id,
                    "response does not match request"
                );
                CalculationResult::failure("Server returned a response for a different request")
            }
            Ok(response) if response.success => {
                debug!(client_id = %self.client_id, request_id = %request_id, result = response.result, "calculation succeeded");
                CalculationResult::ok(response.result)
            }
            Ok(response) => {
                warn!(
                    client_id = %self.client_id,
                    request_id = %request_id,
                    error = %response.error_message,
                    "calculation failed on server"
                );
                if response.error_message.is_empty() {
                    CalculationResult::failure("Server reported a failure without a message")
                } else {
                    CalculationResult::failure(response.error_message)
                }
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(
                    client_id = %self.client_id,
                    request_id = %request_id,
                    attempts,
                    code = ?last.code(),
                    "giving up on calculation"
                );
                CalculationResult::failure(format!("Could not reach server after {attempts} attempts."))
            }
            Err(RetryError::Fatal { status, .. }) => {
                let kind = FailureKind::of(&status);
                error!(
                    client_id = %self.client_id,
                    request_id = %request_id,
                    kind = ?kind,
                    code = ?status.code(),
                    message = %status.message(),
                    "calculation call failed"
                );
                CalculationResult::failure(kind.user_message(&status))
            }
            Err(RetryError::Interrupted { attempts }) => {
                warn!(client_id = %self.client_id, request_id = %request_id, attempts, "calculation interrupted");
                CalculationResult::failure("request interrupted")
            }
        }
    }

    /// Run [`Self::perform`] on the runtime and hand back its join handle.
    #[must_use = "the handle yields the calculation result"]
    pub fn submit(self: &Arc<Self>, operand1: f64, operand2: f64, operator: impl Into<String>) -> JoinHandle<CalculationResult> {
        let client = Arc::clone(self);
        let operator = operator.into();
        tokio::spawn(async move { client.perform(operand1, operand2, &operator).await })
    }

    /// Probe the server's health endpoint under the connection timeout.
    ///
    /// # Errors
    /// Returns [`CalculatorError::Transport`] when the probe fails or times out
    /// and [`CalculatorError::Internal`] when the reply carries an unknown status.
    pub async fn health(&self) -> Result<(ServingStatus, String), CalculatorError> {
        if self.shutdown.is_cancelled() {
            return Err(CalculatorError::Transport("client has been shut down".to_owned()));
        }

        let mut client = self.inner.clone();
        let mut request = tonic::Request::new(HealthCheckRequest {
            service: crate::SERVICE_NAME.to_owned(),
        });
        request.set_timeout(self.connection_timeout);

        let response = tokio::time::timeout(self.connection_timeout, client.health_check(request))
            .await
            .map_err(|_| CalculatorError::Transport("health check timed out".to_owned()))?
            .map_err(|status| CalculatorError::Transport(FailureKind::of(&status).user_message(&status)))?
            .into_inner();

        let status = ServingStatus::try_from(response.status)
            .map_err(|_| CalculatorError::Internal(format!("unknown serving status {}", response.status)))?;
        Ok((status, response.message))
    }

    /// True only when the server answers `SERVING`.
    pub async fn is_server_healthy(&self) -> bool {
        match self.health().await {
            Ok((status, message)) => {
                let healthy = status == ServingStatus::Serving;
                if healthy {
                    info!(client_id = %self.client_id, message = %message, "server is healthy");
                } else {
                    warn!(client_id = %self.client_id, status = ?status, message = %message, "server is not healthy");
                }
                healthy
            }
            Err(e) => {
                error!(client_id = %self.client_id, error = %e, "health check failed");
                false
            }
        }
    }

    /// Stop accepting work. Pending backoff sleeps are interrupted and later
    /// calls fail immediately.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(client_id = %self.client_id, "shutting down calculator client");
            self.shutdown.cancel();
        }
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[async_trait]
impl CalculatorClientV1 for CalculatorGrpcClient {
    async fn calculate(&self, operand1: f64, operand2: f64, operator: &str) -> CalculationResult {
        self.perform(operand1, operand2, operator).await
    }

    async fn is_server_healthy(&self) -> bool {
        CalculatorGrpcClient::is_server_healthy(self).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn unreachable_config() -> ClientConfig {
        ClientConfig {
            host: "127.0.0.1".to_owned(),
            port: 1,
            request_timeout_secs: 1,
            connection_timeout_secs: 1,
            max_retry_attempts: 2,
            retry_delay_ms: 10,
            max_backoff_ms: 10,
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(FailureKind::of(&Status::unavailable("x")), FailureKind::Unavailable);
        assert_eq!(FailureKind::of(&Status::deadline_exceeded("x")), FailureKind::Timeout);
        assert_eq!(FailureKind::of(&Status::invalid_argument("x")), FailureKind::InvalidArgument);
        assert_eq!(FailureKind::of(&Status::internal("x")), FailureKind::Internal);
        assert_eq!(FailureKind::of(&Status::unimplemented("x")), FailureKind::Unimplemented);
        assert_eq!(FailureKind::of(&Status::not_found("x")), FailureKind::Other);
    }

    #[test]
    fn test_failure_messages_carry_server_detail() {
        let status = Status::invalid_argument("bad operand");
        let msg = FailureKind::of(&status).user_message(&status);
        assert_eq!(msg, "Invalid request: bad operand");
    }

    #[test]
    fn test_short_id_length() {
        assert_eq!(short_id().len(), 8);
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_endpoint() {
        let cfg = ClientConfig {
            host: "bad host".to_owned(),
            ..ClientConfig::default()
        };
        let err = CalculatorGrpcClient::new(&cfg, ValidationLimits::default()).err();
        assert!(matches!(err, Some(CalculatorError::InvalidEndpoint { .. })));
    }

    #[tokio::test]
    async fn test_local_validation_short_circuits() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default()).unwrap();
        let outcome = client.perform(7.0, 0.0, "/").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_message.as_deref(), Some("cannot divide by zero"));
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_attempts() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default()).unwrap();
        let outcome = client.perform(1.0, 2.0, "+").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("Could not reach server after 2 attempts.")
        );
    }

    #[tokio::test]
    async fn test_shutdown_fails_fast() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default()).unwrap();
        client.shutdown();
        assert!(client.is_shutdown());
        let outcome = client.perform(1.0, 2.0, "+").await;
        assert_eq!(outcome.error_message.as_deref(), Some("client has been shut down"));
        assert!(!client.is_server_healthy().await);
    }

    #[tokio::test]
    async fn test_connect_to_dead_port_fails_with_transport_error() {
        let err = CalculatorGrpcClient::connect(&unreachable_config(), ValidationLimits::default())
            .await
            .err();
        assert!(matches!(err, Some(CalculatorError::Transport(_))));
    }

    #[tokio::test]
    async fn test_lazy_client_wraps_generated_stub() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default()).unwrap();
        let mut stub: CalculatorServiceClient<Channel> = client.inner.clone();
        let status = stub
            .calculate(CalculationRequest::new(1.0, 2.0, "+"))
            .await
            .unwrap_err();
        assert_eq!(FailureKind::of(&status), FailureKind::Unavailable);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let client = CalculatorGrpcClient::new(&unreachable_config(), ValidationLimits::default()).unwrap();
        assert!(!client.is_server_healthy().await);
    }
}
