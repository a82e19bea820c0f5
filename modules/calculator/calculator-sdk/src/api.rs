use std::fmt;

use async_trait::async_trait;

/// Outcome of one dispatched calculation, as shown to the presentation layer.
///
/// `result` is meaningful only when `success` is true; `error_message` is
/// always set when `success` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult {
    pub success: bool,
    pub result: f64,
    pub error_message: Option<String>,
}

impl CalculationResult {
    #[must_use]
    pub fn ok(result: f64) -> Self {
        Self {
            success: true,
            result,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: 0.0,
            error_message: Some(message.into()),
        }
    }

    /// Convert into a `Result`, surfacing the error message on failure.
    ///
    /// # Errors
    /// Returns the error message when the calculation did not succeed.
    pub fn into_result(self) -> Result<f64, String> {
        if self.success {
            Ok(self.result)
        } else {
            Err(self.error_message.unwrap_or_else(|| "unknown error".to_owned()))
        }
    }
}

impl fmt::Display for CalculationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{}", self.result)
        } else {
            write!(
                f,
                "Error: {}",
                self.error_message.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Errors raised while setting up or probing a client.
///
/// Calculation failures are never errors: they come back as a failed
/// [`CalculationResult`].
#[derive(Debug, thiserror::Error)]
pub enum CalculatorError {
    #[error("invalid endpoint '{uri}': {reason}")]
    InvalidEndpoint { uri: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Public API for calculator clients.
///
/// Implemented by [`crate::CalculatorGrpcClient`]; other implementations can
/// be substituted in tests of the presentation layer.
#[async_trait]
pub trait CalculatorClientV1: Send + Sync {
    /// Validate locally, dispatch and wait for the outcome. Never fails.
    async fn calculate(&self, operand1: f64, operand2: f64, operator: &str) -> CalculationResult;

    /// Whether the remote service answers its health probe with `SERVING`.
    async fn is_server_healthy(&self) -> bool;
}
