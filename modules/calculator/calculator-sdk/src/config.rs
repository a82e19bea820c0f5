//! Configuration values consumed by the dispatch client and the validator.
//!
//! These are plain data: the service binary layers them from defaults, a YAML
//! file and the environment, then passes them into constructors explicitly.

use std::time::Duration;

use calc_transport_grpc::{GrpcClientConfig, RpcRetryConfig};
use serde::{Deserialize, Serialize};

/// Connection and retry settings for [`crate::CalculatorGrpcClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for one attempt of a calculation call.
    pub request_timeout_secs: u64,
    /// Deadline for establishing the connection and for health probes.
    pub connection_timeout_secs: u64,
    /// Total attempts per call, including the first.
    pub max_retry_attempts: u32,
    /// Base delay; the wait after attempt `n` is `retry_delay_ms * n`.
    pub retry_delay_ms: u64,
    pub max_backoff_ms: u64,
    pub keepalive_time_secs: u64,
    pub keepalive_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 9090,
            request_timeout_secs: 10,
            connection_timeout_secs: 5,
            max_retry_attempts: 3,
            retry_delay_ms: 500,
            max_backoff_ms: 5000,
            keepalive_time_secs: 30,
            keepalive_timeout_secs: 5,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn endpoint_uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Transport settings for the underlying channel.
    #[must_use]
    pub fn grpc_config(&self) -> GrpcClientConfig {
        GrpcClientConfig::new(crate::SERVICE_NAME)
            .with_connect_timeout(self.connection_timeout())
            .with_rpc_timeout(self.request_timeout())
            .with_keepalive(
                Duration::from_secs(self.keepalive_time_secs),
                Duration::from_secs(self.keepalive_timeout_secs),
            )
            .with_max_attempts(self.max_retry_attempts)
            .with_base_backoff(Duration::from_millis(self.retry_delay_ms))
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
    }

    /// Call-level retry policy.
    pub fn retry_config(&self) -> RpcRetryConfig {
        RpcRetryConfig::from(&self.grpc_config())
    }
}

/// Numeric limits enforced by [`crate::InputValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationLimits {
    pub max_safe_value: f64,
    pub min_safe_value: f64,
    pub max_exponent: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_safe_value: 1e15,
            min_safe_value: -1e15,
            max_exponent: 1000.0,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.endpoint_uri(), "http://localhost:9090");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.connection_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.max_retry_attempts, 3);
    }

    #[test]
    fn test_grpc_config_conversion() {
        let cfg = ClientConfig {
            request_timeout_secs: 2,
            retry_delay_ms: 100,
            max_backoff_ms: 250,
            max_retry_attempts: 4,
            ..ClientConfig::default()
        };
        let grpc = cfg.grpc_config();
        assert_eq!(grpc.service_name, crate::SERVICE_NAME);
        assert_eq!(grpc.rpc_timeout, Duration::from_secs(2));
        assert_eq!(grpc.max_attempts, 4);
        assert_eq!(grpc.backoff_for(3), Duration::from_millis(250));

        let retry = cfg.retry_config();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.base_backoff, Duration::from_millis(100));
        assert_eq!(retry.attempt_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_validation_defaults() {
        let limits = ValidationLimits::default();
        assert!((limits.max_safe_value - 1e15).abs() < f64::EPSILON);
        assert!((limits.min_safe_value + 1e15).abs() < f64::EPSILON);
        assert!((limits.max_exponent - 1000.0).abs() < f64::EPSILON);
    }
}
