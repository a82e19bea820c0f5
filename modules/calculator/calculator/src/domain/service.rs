//! Domain service for calculator
//!
//! Re-validates every request, evaluates it and wraps the outcome in a
//! response envelope. Nothing escapes as an error: every path produces
//! exactly one [`CalculationResponse`].

use calculator_sdk::{
    CalculationRequest, CalculationResponse, HealthCheckResponse, InputValidator, ServingStatus,
    ValidationLimits,
};
use tracing::{debug, error, warn};

use super::evaluator::{EvalError, evaluate};

pub const HEALTH_MESSAGE: &str = "Calculator service is running";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Stateless calculation service shared by the unary and streaming handlers.
#[derive(Debug, Clone, Default)]
pub struct Service {
    validator: InputValidator,
}

impl Service {
    #[must_use]
    pub fn new(limits: ValidationLimits) -> Self {
        Self {
            validator: InputValidator::new(limits),
        }
    }

    /// Evaluate one request.
    #[must_use]
    pub fn calculate(&self, request: &CalculationRequest) -> CalculationResponse {
        let CalculationRequest {
            operand1,
            operand2,
            operator,
            request_id,
        } = request;

        let verdict = self.validator.validate_request(*operand1, *operand2, operator);
        if let Some(message) = verdict.error_message() {
            warn!(
                request_id = %request_id,
                operand1,
                operand2,
                operator = %operator,
                error = %message,
                "request rejected by validation"
            );
            return CalculationResponse::failure(request_id.as_str(), message);
        }

        match evaluate(*operand1, *operand2, operator) {
            Ok(result) => {
                debug!(request_id = %request_id, operator = %operator, result, "calculation succeeded");
                CalculationResponse::success(request_id.as_str(), result)
            }
            Err(EvalError::Arithmetic(e)) => {
                warn!(request_id = %request_id, operator = %operator, error = %e, "arithmetic error");
                CalculationResponse::failure(request_id.as_str(), format!("Arithmetic error: {e}"))
            }
            Err(e @ EvalError::UnsupportedOperator(_)) => {
                error!(request_id = %request_id, error = %e, "operator passed validation but has no evaluation");
                CalculationResponse::failure(request_id.as_str(), INTERNAL_ERROR_MESSAGE)
            }
        }
    }

    #[must_use]
    pub fn health(&self) -> HealthCheckResponse {
        HealthCheckResponse {
            status: ServingStatus::Serving.into(),
            message: HEALTH_MESSAGE.to_owned(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn request(a: f64, b: f64, op: &str) -> CalculationRequest {
        CalculationRequest::new(a, b, op)
    }

    #[test]
    fn test_success_echoes_request_id() {
        let service = Service::default();
        let req = request(12.0, 8.0, "+");
        let resp = service.calculate(&req);
        assert!(resp.success);
        assert!((resp.result - 20.0).abs() < f64::EPSILON);
        assert_eq!(resp.request_id, req.request_id);
        assert!(resp.error_message.is_empty());
    }

    #[test]
    fn test_validation_failure_is_a_response() {
        let service = Service::default();
        let req = request(12.0, 0.0, "/");
        let resp = service.calculate(&req);
        assert!(!resp.success);
        assert_eq!(resp.error_message, "cannot divide by zero");
        assert_eq!(resp.request_id, req.request_id);
    }

    #[test]
    fn test_unknown_operator() {
        let resp = Service::default().calculate(&request(10.0, 5.0, "#"));
        assert!(!resp.success);
        assert!(resp.error_message.contains("invalid operator"));
    }

    #[test]
    fn test_arithmetic_failure_after_validation() {
        // passes validation in extended mode, overflows during evaluation
        let resp = Service::default().calculate(&request(1e15, 0.0, "exp"));
        assert!(!resp.success);
        assert!(resp.error_message.starts_with("Arithmetic error:"), "{}", resp.error_message);
    }

    #[test]
    fn test_limits_are_applied() {
        let service = Service::new(ValidationLimits {
            max_safe_value: 100.0,
            ..ValidationLimits::default()
        });
        let resp = service.calculate(&request(101.0, 1.0, "+"));
        assert!(!resp.success);
        assert!(resp.error_message.contains("too large"));
    }

    #[test]
    fn test_extended_operators() {
        let service = Service::default();
        let resp = service.calculate(&request(-8.0, 3.0, "nthroot"));
        assert!(resp.success);
        assert!((resp.result + 2.0).abs() < 1e-9);

        let rejected = service.calculate(&request(-4.0, 2.0, "nthroot"));
        assert!(!rejected.success);
    }

    #[test]
    fn test_health() {
        let health = Service::default().health();
        assert_eq!(health.status, i32::from(ServingStatus::Serving));
        assert_eq!(health.message, HEALTH_MESSAGE);
    }
}
