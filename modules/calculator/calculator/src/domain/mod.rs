//! Domain layer for calculator module
//!
//! Pure evaluation plus the request/response service built on top of it.

pub mod evaluator;
pub mod service;

pub use evaluator::{ArithmeticError, EvalError, apply, evaluate};
pub use service::Service;
