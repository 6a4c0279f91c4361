//! Permute lowering for nclower.
//!
//! This crate lowers the source-framework axis permutation operators
//! `Tensor.permute` and `torch.transpose` to the backend `Permute` layer.
//!
//! The backend keeps the batch axis implicit and only understands a fixed
//! enumeration of axis orders, so every matched node goes through
//! normalization (batch-axis removal, bijection checks, identity detection)
//! before its backend code is written. Nodes the backend cannot express are
//! left as they were and reported as [`Diagnostic`]s.
//!
//! # Example
//!
//! ```
//! use nclower_core::{LowerOptions, Parameter};
//! use nclower_passes::LoweringPipeline;
//!
//! let mut graph = nclower_pattern::parse_graph(
//!     "7767517
//! 3 2
//! pnnx.Input in0 0 1 x #x=(1,2,3,4)
//! torch.transpose t0 1 1 x y dim0=1 dim1=3
//! pnnx.Output out0 1 0 y
//! ",
//! )
//! .unwrap();
//!
//! let report = LoweringPipeline::new(LowerOptions::new()).run(&mut graph).unwrap();
//! assert_eq!(report.lowered, 1);
//!
//! let node = graph.node(graph.find_node_by_name("transpose_0").unwrap()).unwrap();
//! assert_eq!(node.op_type, "Permute");
//! assert_eq!(node.param("0").unwrap(), &Parameter::Int(5));
//! ```

pub mod passes;
pub mod permute;
pub mod pipeline;

pub use passes::{TensorPermutePass, TorchTransposePass};
pub use permute::{PermuteEncoding, PermuteError, PermuteSource, permute_code};
pub use pipeline::{LowerReport, LoweringPipeline};

use nclower_core::PassRegistry;
use nclower_pattern::PatternError;
use thiserror::Error;

// Re-export commonly used types from nclower-core
pub use nclower_core::{AxisEncoding, Diagnostic, LowerOptions};

/// Result type for pipeline runs.
pub type Result<T> = std::result::Result<T, LowerError>;

/// Errors that abort a pipeline run.
///
/// Rejected rewrites are not errors; they end up in
/// [`LowerReport::diagnostics`].
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("Invalid template for pass '{pass}': {source}")]
    Template {
        pass: String,
        #[source]
        source: PatternError,
    },

    #[error(transparent)]
    Graph(#[from] nclower_core::Error),
}

/// Registry with the permute passes registered.
pub fn default_registry() -> PassRegistry {
    let mut registry = PassRegistry::new();
    registry
        .register(TensorPermutePass)
        .register(TorchTransposePass);
    registry
}
