//! RPC-level retry helper for unary gRPC calls.
//!
//! [`call_with_retry`] runs a unary call up to `max_attempts` times, sleeping
//! `base_backoff * attempt` (capped at `max_backoff`) between attempts.
//!
//! ## Retry Policy
//!
//! A failure is retried only when [`is_retryable`] classifies it as transient:
//! - [`tonic::Code::Unavailable`] - server is not running or the connection dropped
//! - [`tonic::Code::DeadlineExceeded`] - the attempt ran out of time
//! - any other non-terminal status whose message looks like a connectivity
//!   problem ("cannot connect", "timeout", "not responding", ...)
//!
//! `InvalidArgument`, `Internal` and `Unimplemented` are always terminal.
//!
//! ## Idempotency Warning
//!
//! **This helper assumes the operation is idempotent.** Calculations are pure,
//! so replaying a request is always safe here.
//!
//! ## Example
//!
//! ```ignore
//! use calc_transport_grpc::rpc_retry::{call_with_retry, RpcRetryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let retry_cfg = RpcRetryConfig::from(&grpc_cfg);
//! let cancel = CancellationToken::new();
//! let resp = call_with_retry(
//!     &mut client,
//!     &retry_cfg,
//!     req,
//!     |c, r| async move { c.calculate(r).await.map(|resp| resp.into_inner()) },
//!     "calculator.calculate",
//!     &cancel,
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};
use tracing::Instrument;

use crate::client::GrpcClientConfig;

/// Message fragments that mark a failure as transient regardless of its code.
const TRANSIENT_PATTERNS: &[&str] = &[
    "cannot connect",
    "connection refused",
    "error trying to connect",
    "timeout",
    "timed out",
    "not responding",
];

fn duration_to_i64_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Configuration for RPC-level retry policy.
#[derive(Debug, Clone)]
#[must_use]
pub struct RpcRetryConfig {
    /// Total number of attempts, including the first call. Zero is treated as one.
    pub max_attempts: u32,

    /// Base delay. The delay after attempt `n` is `base_backoff * n`.
    pub base_backoff: Duration,

    /// Upper bound for a single delay.
    pub max_backoff: Duration,

    /// Local deadline for each attempt. An attempt exceeding it fails with
    /// `DEADLINE_EXCEEDED` and is eligible for retry.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RpcRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            attempt_timeout: None,
        }
    }
}

impl From<&GrpcClientConfig> for RpcRetryConfig {
    fn from(cfg: &GrpcClientConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_backoff: cfg.base_backoff,
            max_backoff: cfg.max_backoff,
            attempt_timeout: Some(cfg.rpc_timeout),
        }
    }
}

impl RpcRetryConfig {
    /// Create a new retry configuration with the given attempt cap.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the base backoff duration.
    pub fn with_base_backoff(mut self, duration: Duration) -> Self {
        self.base_backoff = duration;
        self
    }

    /// Set the maximum backoff duration.
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Set the per-attempt deadline.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        (self.base_backoff * attempt).min(self.max_backoff)
    }
}

/// Why [`call_with_retry`] gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// The call failed with a status that must not be retried.
    #[error("non-retryable failure on attempt {attempt}: {status}")]
    Fatal { attempt: u32, status: Status },

    /// Every attempt failed with a transient status.
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Status },

    /// The cancellation token fired before a result was obtained.
    #[error("interrupted after {attempts} attempts")]
    Interrupted { attempts: u32 },
}

impl RetryError {
    /// Number of attempts that were actually made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fatal { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } | Self::Interrupted { attempts } => *attempts,
        }
    }

    /// The last status received, if any.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Fatal { status, .. } => Some(status),
            Self::Exhausted { last, .. } => Some(last),
            Self::Interrupted { .. } => None,
        }
    }
}

/// Classify a failed call as transient (worth retrying) or terminal.
#[must_use]
pub fn is_retryable(status: &Status) -> bool {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded => true,
        Code::Ok | Code::InvalidArgument | Code::Internal | Code::Unimplemented => false,
        _ => {
            let message = status.message().to_ascii_lowercase();
            TRANSIENT_PATTERNS.iter().any(|p| message.contains(p))
        }
    }
}

/// Generic helper for unary gRPC calls with retries.
///
/// * `client` - the tonic client (or any handle the closure needs)
/// * `cfg` - retry policy
/// * `req` - request payload, cloned for every attempt
/// * `call` - closure performing one attempt
/// * `op_name` - static operation name for tracing (e.g. `"calculator.calculate"`)
/// * `cancel` - cancelling it interrupts a pending backoff sleep
///
/// # Errors
/// Returns [`RetryError::Fatal`] on the first terminal status,
/// [`RetryError::Exhausted`] once `max_attempts` transient failures happened, and
/// [`RetryError::Interrupted`] if `cancel` fires before a result is obtained.
pub async fn call_with_retry<TClient, F, Fut, Req, Res>(
    client: &mut TClient,
    cfg: &RpcRetryConfig,
    req: Req,
    call: F,
    op_name: &'static str,
    cancel: &CancellationToken,
) -> Result<Res, RetryError>
where
    F: Fn(&mut TClient, Req) -> Fut,
    Fut: Future<Output = Result<Res, Status>>,
    Req: Clone,
{
    let max_attempts = cfg.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Interrupted { attempts: attempt });
        }
        attempt += 1;

        let span = tracing::debug_span!("grpc_call", op = op_name, attempt);

        let result = async {
            let pending = call(client, req.clone());
            let res = match cfg.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .unwrap_or_else(|_| {
                        Err(Status::deadline_exceeded(format!(
                            "no response within {} ms",
                            duration_to_i64_ms(limit)
                        )))
                    }),
                None => pending.await,
            };
            if let Err(ref status) = res {
                tracing::warn!(
                    code = ?status.code(),
                    message = %status.message(),
                    attempt,
                    op = op_name,
                    "gRPC call failed",
                );
            }
            res
        }
        .instrument(span)
        .await;

        let status = match result {
            Ok(res) => {
                if attempt > 1 {
                    tracing::info!(op = op_name, attempt, "gRPC call succeeded after retries");
                }
                return Ok(res);
            }
            Err(status) => status,
        };

        if !is_retryable(&status) {
            tracing::error!(op = op_name, attempt, code = ?status.code(), "gRPC call failed with terminal status");
            return Err(RetryError::Fatal { attempt, status });
        }

        if attempt >= max_attempts {
            tracing::error!(op = op_name, attempt, code = ?status.code(), "gRPC call giving up");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: status,
            });
        }

        let backoff = cfg.backoff_for(attempt);
        tracing::debug!(
            op = op_name,
            attempt,
            backoff_ms = duration_to_i64_ms(backoff),
            "Retrying gRPC call after backoff"
        );

        tokio::select! {
            () = sleep(backoff) => {}
            () = cancel.cancelled() => {
                tracing::warn!(op = op_name, attempt, "gRPC retry interrupted");
                return Err(RetryError::Interrupted { attempts: attempt });
            }
        }
    }
}
