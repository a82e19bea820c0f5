//! Calculator SDK
//!
//! This crate provides everything needed to talk to the calculator service:
//! - Operator registry (`Operator`, `classify`)
//! - Input validation shared by client and server (`InputValidator`)
//! - API trait and result types (`CalculatorClientV1`, `CalculationResult`)
//! - gRPC dispatch client with retries (`CalculatorGrpcClient`)
//! - Proto stubs for the server implementation
//!
//! ## Usage
//!
//! ```ignore
//! use calculator_sdk::{CalculatorGrpcClient, ClientConfig, ValidationLimits};
//!
//! let client = CalculatorGrpcClient::new(&ClientConfig::default(), ValidationLimits::default())?;
//! let outcome = client.perform(12.0, 8.0, "+").await;
//! assert_eq!(outcome.result, 20.0);
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === API TRAIT AND TYPES ===
mod api;
pub use api::{CalculationResult, CalculatorClientV1, CalculatorError};

// === OPERATORS AND VALIDATION ===
pub mod operator;
pub mod validation;
pub use operator::{Arity, Operator, OperatorClass, classify};
pub use validation::{InputValidator, Operand, ValidationResult, Violation};

// === CONFIGURATION ===
pub mod config;
pub use config::{ClientConfig, ValidationLimits};

// === CLIENT ===
mod client;
mod envelope;
pub use client::{CalculatorGrpcClient, FailureKind};

// === GRPC PROTO STUBS (for server implementation) ===
/// Generated protobuf types for `CalculatorService`
#[allow(clippy::pedantic, clippy::doc_markdown)]
pub mod proto {
    tonic::include_proto!("calculator.v1");
}

// Re-export proto types needed by server
pub use proto::calculator_service_client::CalculatorServiceClient;
pub use proto::calculator_service_server::{CalculatorService, CalculatorServiceServer};
pub use proto::health_check_response::ServingStatus;
pub use proto::{CalculationRequest, CalculationResponse, HealthCheckRequest, HealthCheckResponse};

/// Service name constant for `CalculatorService` (used for service discovery)
pub const SERVICE_NAME: &str = "calculator.v1.CalculatorService";
