//! gRPC API layer for calculator module

pub mod server;

pub use server::CalculatorServiceImpl;
