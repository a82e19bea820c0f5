#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Calculator Module
//!
//! gRPC service that evaluates arithmetic, scientific and bitwise operations.
//!
//! ## Architecture
//!
//! - `domain/evaluator.rs` - numeric evaluation of one operation
//! - `domain/service.rs` - validation, evaluation and response envelopes
//! - `api/grpc/server.rs` - gRPC server implementation
//! - `server.rs` - listener, tracing layer and graceful shutdown
//! - `config.rs`, `logging.rs` - process bootstrap
//!
//! External consumers should use the `calculator-sdk` crate, which provides
//! the wire contract and the dispatch client.

pub mod api;
pub mod config;
pub mod domain;
pub mod logging;
pub mod server;
mod signals;

pub use api::grpc::CalculatorServiceImpl;
pub use config::AppConfig;
pub use domain::Service;
