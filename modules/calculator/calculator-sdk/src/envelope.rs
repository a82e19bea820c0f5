//! Constructors for the wire messages.

use crate::proto::{CalculationRequest, CalculationResponse};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CalculationRequest {
    /// New request with a fresh v4 correlation id.
    #[must_use]
    pub fn new(operand1: f64, operand2: f64, operator: impl Into<String>) -> Self {
        Self {
            operand1,
            operand2,
            operator: operator.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl CalculationResponse {
    /// Successful response stamped with the current time.
    #[must_use]
    pub fn success(request_id: impl Into<String>, result: f64) -> Self {
        Self {
            result,
            success: true,
            error_message: String::new(),
            request_id: request_id.into(),
            timestamp: now_millis(),
        }
    }

    /// Failed response stamped with the current time.
    #[must_use]
    pub fn failure(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result: 0.0,
            success: false,
            error_message: message.into(),
            request_id: request_id.into(),
            timestamp: now_millis(),
        }
    }
}
