//! Retry and failure classification of the dispatch client against scripted servers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use calculator::Service;
use calculator_sdk::{
    CalculationRequest, CalculationResponse, CalculatorGrpcClient, CalculatorService,
    CalculatorServiceServer, ClientConfig, HealthCheckRequest, HealthCheckResponse,
    ValidationLimits,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status, Streaming};

/// Fails the first `failures` calls with `code`, then answers normally.
struct ScriptedCalculator {
    failures: u32,
    code: Code,
    tamper_request_id: bool,
    calls: Arc<AtomicU32>,
    service: Service,
}

#[tonic::async_trait]
impl CalculatorService for ScriptedCalculator {
    async fn calculate(
        &self,
        request: Request<CalculationRequest>,
    ) -> Result<Response<CalculationResponse>, Status> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(Status::new(self.code, format!("scripted failure {call}")));
        }
        let mut resp = self.service.calculate(request.get_ref());
        if self.tamper_request_id {
            resp.request_id = "someone-else".to_owned();
        }
        Ok(Response::new(resp))
    }

    type StreamCalculateStream = ReceiverStream<Result<CalculationResponse, Status>>;

    async fn stream_calculate(
        &self,
        _request: Request<Streaming<CalculationRequest>>,
    ) -> Result<Response<Self::StreamCalculateStream>, Status> {
        Err(Status::unimplemented("not scripted"))
    }

    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(self.service.health()))
    }
}

struct Harness {
    calls: Arc<AtomicU32>,
    config: ClientConfig,
    cancel: CancellationToken,
}

impl Harness {
    async fn start(failures: u32, code: Code, tamper_request_id: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let svc = ScriptedCalculator {
            failures,
            code,
            tamper_request_id,
            calls: Arc::clone(&calls),
            service: Service::default(),
        };
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            Server::builder()
                .add_service(CalculatorServiceServer::new(svc))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    shutdown.cancelled().await;
                })
                .await
        });

        let config = ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            request_timeout_secs: 2,
            connection_timeout_secs: 2,
            max_retry_attempts: 3,
            retry_delay_ms: 20,
            max_backoff_ms: 100,
            ..ClientConfig::default()
        };

        Self {
            calls,
            config,
            cancel,
        }
    }

    fn client(&self) -> CalculatorGrpcClient {
        CalculatorGrpcClient::new(&self.config, ValidationLimits::default()).unwrap()
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn succeeds_on_third_attempt_after_two_unavailable() {
    let harness = Harness::start(2, Code::Unavailable, false).await;
    let outcome = harness.client().perform(12.0, 8.0, "+").await;

    assert!(outcome.success, "{outcome}");
    assert!((outcome.result - 20.0).abs() < f64::EPSILON);
    assert_eq!(harness.calls(), 3);
}

#[tokio::test]
async fn unknown_status_without_transient_message_is_terminal() {
    let harness = Harness::start(1, Code::Unknown, false).await;
    let outcome = harness.client().perform(1.0, 1.0, "+").await;
    assert!(!outcome.success);
    assert_eq!(harness.calls(), 1);
    assert!(outcome.error_message.unwrap().contains("scripted failure 1"));
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let harness = Harness::start(u32::MAX, Code::Unavailable, false).await;
    let outcome = harness.client().perform(1.0, 2.0, "+").await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error_message.as_deref(),
        Some("Could not reach server after 3 attempts.")
    );
    assert_eq!(harness.calls(), 3);
}

#[tokio::test]
async fn deadline_exceeded_is_retried() {
    let harness = Harness::start(1, Code::DeadlineExceeded, false).await;
    let outcome = harness.client().perform(6.0, 7.0, "*").await;
    assert!(outcome.success, "{outcome}");
    assert_eq!(harness.calls(), 2);
}

#[tokio::test]
async fn terminal_status_is_not_retried() {
    for (code, expected) in [
        (Code::InvalidArgument, "Invalid request: scripted failure 1"),
        (Code::Internal, "Server internal error: scripted failure 1"),
        (Code::Unimplemented, "Operation not supported by the server"),
    ] {
        let harness = Harness::start(u32::MAX, code, false).await;
        let outcome = harness.client().perform(1.0, 2.0, "+").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error_message.as_deref(), Some(expected), "{code:?}");
        assert_eq!(harness.calls(), 1, "{code:?}");
    }
}

#[tokio::test]
async fn invalid_input_never_reaches_the_server() {
    let harness = Harness::start(0, Code::Ok, false).await;
    let client = harness.client();

    let outcome = client.perform(10.0, 5.0, "#").await;
    assert!(outcome.error_message.unwrap().contains("invalid operator"));

    let outcome = client.perform(1e20, 5.0, "+").await;
    assert!(outcome.error_message.unwrap().contains("operand too large"));

    let outcome = client.perform(-4.0, 0.5, "^").await;
    assert!(!outcome.success);

    assert_eq!(harness.calls(), 0);
}

#[tokio::test]
async fn mismatched_request_id_is_a_failure() {
    let harness = Harness::start(0, Code::Ok, true).await;
    let outcome = harness.client().perform(1.0, 2.0, "+").await;
    assert!(!outcome.success);
    assert_eq!(harness.calls(), 1);
}

#[tokio::test]
async fn shutdown_interrupts_backoff() {
    let mut harness = Harness::start(u32::MAX, Code::Unavailable, false).await;
    harness.config.retry_delay_ms = 10_000;
    harness.config.max_backoff_ms = 10_000;
    let client = Arc::new(harness.client());

    let started = Instant::now();
    let pending = client.submit(1.0, 2.0, "+");
    tokio::time::sleep(Duration::from_millis(300)).await;
    client.shutdown();

    let outcome = pending.await.unwrap();
    assert_eq!(outcome.error_message.as_deref(), Some("request interrupted"));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(harness.calls(), 1);

    let after = client.perform(1.0, 2.0, "+").await;
    assert_eq!(after.error_message.as_deref(), Some("client has been shut down"));
}
