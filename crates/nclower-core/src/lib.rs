//! Core graph model and rewrite-pass contract for nclower.
//!
//! This crate provides the abstractions the other nclower crates build on:
//! - Graph model (`Graph`, `Node`, `Tensor`)
//! - Closed parameter variant (`Parameter`) and captured placeholder values (`Captures`)
//! - The `RewritePass` trait and `PassRegistry`
//! - Diagnostics emitted when a rewrite cannot be expressed by the backend
//! - Lowering options shared by all passes

pub mod diagnostic;
pub mod ir;
pub mod options;
pub mod param;
pub mod pass;
pub mod registry;

pub use diagnostic::Diagnostic;
pub use ir::{Graph, Node, NodeId, Tensor, TensorId};
pub use options::{AxisEncoding, LowerOptions};
pub use param::{Captures, Parameter};
pub use pass::{NOOP_TYPE, Rewrite, RewritePass};
pub use registry::PassRegistry;

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for nclower-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter {key} has type {actual}, expected {expected}")]
    ParameterType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),
}
