//! Template and graph text format for nclower.
//!
//! Templates and graphs share one line-oriented text format:
//!
//! ```text
//! 7767517
//! 3 2
//! pnnx.Input              input       0 1 input
//! Tensor.permute          op_0        1 1 input out dims=%dims
//! pnnx.Output             output      1 0 out
//! ```
//!
//! The first line is the format magic, the second the node and tensor
//! counts, and every further line one node:
//! `<op_type> <name> <n_in> <n_out> <inputs…> <outputs…> key=value…`.
//! A value `%name` is a placeholder bound by the matcher.
//!
//! # Example
//!
//! ```
//! use nclower_pattern::{find_matches, parse_graph, parse_template};
//!
//! let template = parse_template(
//!     "7767517\n3 2\n\
//!      pnnx.Input input 0 1 input\n\
//!      torch.transpose op_0 1 1 input out dim0=%dim0 dim1=%dim1\n\
//!      pnnx.Output output 1 0 out\n",
//! )
//! .unwrap();
//!
//! let graph = parse_graph(
//!     "7767517\n3 2\n\
//!      pnnx.Input in0 0 1 x #x=(2,3,4)\n\
//!      torch.transpose t0 1 1 x y dim0=1 dim1=2\n\
//!      pnnx.Output out0 1 0 y\n",
//! )
//! .unwrap();
//!
//! let matches = find_matches(&graph, &template);
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].captures.int("dim1").unwrap(), 2);
//! ```

pub mod matcher;
pub mod parser;
pub mod template;
pub mod writer;

pub use matcher::{Match, find_matches};
pub use parser::{MAGIC, parse_graph, parse_template, parse_value};
pub use template::{INPUT_TYPE, OUTPUT_TYPE, Template, TemplateNode, TemplateValue};
pub use writer::write_graph;

use thiserror::Error;

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur when reading or writing the text format.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid header: expected magic {expected}, got '{actual}'")]
    Header { expected: u32, actual: String },

    #[error("Count mismatch: header declares {declared} {what}, body has {actual}")]
    Counts {
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Parameter {key}={value} of node '{node}' does not survive the text format")]
    Unwritable {
        node: String,
        key: String,
        value: String,
    },

    #[error(transparent)]
    Graph(#[from] nclower_core::Error),
}
