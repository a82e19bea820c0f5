#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
//! gRPC transport helpers shared by calculator clients.
//!
//! - [`client`] builds tonic channels with timeouts and keepalive settings.
//! - [`rpc_retry`] wraps unary calls in a bounded retry loop with linear backoff.

pub mod client;
pub mod rpc_retry;

pub use client::{GrpcClientConfig, connect_lazy, connect_with_retry, connect_with_stack};
pub use rpc_retry::{RetryError, RpcRetryConfig, call_with_retry, is_retryable};
