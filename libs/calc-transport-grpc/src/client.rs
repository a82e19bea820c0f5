//! gRPC client transport configuration and connection utilities.
//!
//! This module provides gRPC client configuration with:
//! - Configurable connect and per-call timeouts
//! - HTTP/2 keepalive settings for connection health
//! - Tracing spans around connection establishment
//!
//! **Note:** This module is responsible only for transport-level configuration.
//! For RPC-level retry logic with backoff, see the [`crate::rpc_retry`] module.

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tracing::Instrument;

fn duration_to_i64_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn duration_to_u64_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration for gRPC client transport stack.
///
/// Retry-related fields (`max_attempts`, `base_backoff`, `max_backoff`) are stored here
/// for convenience but are used by [`crate::rpc_retry`] and [`connect_with_retry`],
/// not by the channel itself.
#[derive(Debug, Clone)]
pub struct GrpcClientConfig {
    /// Timeout for establishing the initial connection.
    pub connect_timeout: Duration,

    /// Timeout for individual RPC calls (applied at transport level).
    pub rpc_timeout: Duration,

    /// Interval between HTTP/2 keepalive pings.
    pub keepalive_time: Duration,

    /// How long to wait for a keepalive ping acknowledgement.
    pub keepalive_timeout: Duration,

    /// Total number of attempts for a call, including the first one.
    pub max_attempts: u32,

    /// Base delay for linear backoff between attempts.
    pub base_backoff: Duration,

    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,

    /// Service name for tracing.
    pub service_name: &'static str,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            rpc_timeout: Duration::from_secs(10),
            keepalive_time: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            service_name: "grpc_client",
        }
    }
}

impl GrpcClientConfig {
    /// Create a new configuration with the given service name.
    #[must_use]
    pub fn new(service_name: &'static str) -> Self {
        Self {
            service_name,
            ..Default::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the RPC timeout.
    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set HTTP/2 keepalive interval and acknowledgement timeout.
    #[must_use]
    pub fn with_keepalive(mut self, interval: Duration, timeout: Duration) -> Self {
        self.keepalive_time = interval;
        self.keepalive_timeout = timeout;
        self
    }

    /// Set the total number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base backoff delay.
    #[must_use]
    pub fn with_base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff = delay;
        self
    }

    /// Set the backoff cap.
    #[must_use]
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Backoff to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        (self.base_backoff * attempt).min(self.max_backoff)
    }
}

/// Build a tonic `Endpoint` with timeouts and keepalive settings.
fn build_endpoint(
    uri: String,
    cfg: &GrpcClientConfig,
) -> Result<Endpoint, tonic::transport::Error> {
    let endpoint = Endpoint::from_shared(uri)?
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.rpc_timeout)
        .tcp_keepalive(Some(cfg.keepalive_time))
        .http2_keep_alive_interval(cfg.keepalive_time)
        .keep_alive_timeout(cfg.keepalive_timeout)
        .keep_alive_while_idle(true);

    Ok(endpoint)
}

/// Create a client over a lazily connected channel.
///
/// No network I/O happens here: the channel connects on the first call and
/// reconnects transparently after failures. The returned client can be cloned
/// cheaply and shared between tasks.
///
/// # Errors
/// Returns an error if `uri` is not a valid endpoint URI.
pub fn connect_lazy<TClient>(uri: impl Into<String>, cfg: &GrpcClientConfig) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    let uri_string = uri.into();
    let endpoint = build_endpoint(uri_string.clone(), cfg)?;
    tracing::debug!(
        service = cfg.service_name,
        uri = %uri_string,
        "gRPC client created with lazy channel"
    );
    Ok(TClient::from(endpoint.connect_lazy()))
}

/// Connect to a gRPC service with the configured transport stack.
///
/// This function does **not** retry. For call-level retries use
/// [`crate::rpc_retry::call_with_retry`].
///
/// # Errors
/// Returns an error if the URI is invalid or the connection cannot be established.
pub async fn connect_with_stack<TClient>(
    uri: impl Into<String>,
    cfg: &GrpcClientConfig,
) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    let uri_string = uri.into();
    let span = tracing::debug_span!(
        "grpc_connect",
        service = cfg.service_name,
        uri = %uri_string
    );

    async move {
        let endpoint = build_endpoint(uri_string, cfg)?;
        let channel = endpoint.connect().await?;

        tracing::info!(
            service_name = cfg.service_name,
            connect_timeout_ms = duration_to_i64_ms(cfg.connect_timeout),
            rpc_timeout_ms = duration_to_i64_ms(cfg.rpc_timeout),
            "gRPC client connected"
        );

        Ok(TClient::from(channel))
    }
    .instrument(span)
    .await
}

/// Connect to a gRPC service, retrying failed connection attempts.
///
/// Makes at most `max_attempts` attempts, sleeping `base_backoff * attempt`
/// (capped at `max_backoff`) between them.
///
/// # Errors
/// Returns the last connection error once all attempts are used up.
pub async fn connect_with_retry<TClient>(
    uri: impl Into<String>,
    cfg: &GrpcClientConfig,
) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    use anyhow::Context;

    let uri_string = uri.into();
    let max_attempts = cfg.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match connect_with_stack::<TClient>(&uri_string, cfg).await {
            Ok(client) => {
                if attempt > 1 {
                    tracing::info!(
                        service = cfg.service_name,
                        attempt,
                        "gRPC connection established after retries"
                    );
                }
                return Ok(client);
            }
            Err(e) if attempt < max_attempts => {
                let backoff = cfg.backoff_for(attempt);
                tracing::warn!(
                    service = cfg.service_name,
                    attempt,
                    max_attempts,
                    error = %e,
                    backoff_ms = duration_to_u64_ms(backoff),
                    "gRPC connection failed, retrying..."
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                tracing::error!(
                    service = cfg.service_name,
                    attempt,
                    error = %e,
                    "gRPC connection failed after all attempts"
                );
                return Err(e).context(format!(
                    "failed to connect to {} after {} attempts",
                    cfg.service_name, attempt
                ));
            }
        }
    }
}
