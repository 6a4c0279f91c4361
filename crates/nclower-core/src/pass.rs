//! Rewrite pass contract.

use crate::ir::{Node, Tensor};
use crate::options::LowerOptions;
use crate::param::Captures;

/// Operator type given to nodes recognized as a semantic identity.
///
/// Nodes of this type are removed later by identity elimination.
pub const NOOP_TYPE: &str = "Noop";

/// Outcome of a single rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// The node now carries backend parameters and is relabeled to the
    /// pass's target type.
    Lowered,

    /// The node is an identity and is relabeled to [`NOOP_TYPE`] without
    /// parameters.
    Noop,

    /// The backend cannot express the node. The driver restores the node
    /// exactly as it was matched and records a diagnostic.
    Rejected {
        kind: &'static str,
        message: String,
    },
}

/// Trait for implementing template-driven lowering passes.
///
/// A pass declares a template (one interior operator between `pnnx.Input`
/// and `pnnx.Output` boundary nodes, with `%name` placeholders for the
/// parameters it reads), the backend type and name stem matched nodes are
/// relabeled to, and a rewrite invoked once per match.
///
/// The driver hands the rewrite the matched node with its parameters cleared
/// and the node's input tensors read-only. The rewrite writes the backend
/// parameters and reports the outcome; it never fails with an error.
///
/// # Example
///
/// ```ignore
/// struct ReluPass;
///
/// impl RewritePass for ReluPass {
///     fn match_pattern(&self) -> &str {
///         "7767517\n3 2\n\
///          pnnx.Input input 0 1 input\n\
///          nn.ReLU op_0 1 1 input out\n\
///          pnnx.Output output 1 0 out\n"
///     }
///     fn type_str(&self) -> &str { "ReLU" }
///     fn name_str(&self) -> &str { "relu" }
///     fn priority(&self) -> i32 { 20 }
///     fn rewrite(&self, _: &mut Node, _: &[&Tensor], _: &Captures, _: &LowerOptions) -> Rewrite {
///         Rewrite::Lowered
///     }
/// }
/// ```
pub trait RewritePass: Send + Sync {
    /// Template text the matcher searches for.
    fn match_pattern(&self) -> &str;

    /// Backend operator type assigned to lowered nodes.
    fn type_str(&self) -> &str;

    /// Backend name stem; lowered nodes are renamed `<name_str>_<n>`.
    fn name_str(&self) -> &str;

    /// Registration priority. Lower values run first.
    fn priority(&self) -> i32;

    /// Rewrite one matched node.
    ///
    /// # Arguments
    ///
    /// * `node` - The matched node, still attached to the graph.
    /// * `inputs` - The node's input tensors, in operand order.
    /// * `captures` - Placeholder values bound by the matcher.
    /// * `options` - Lowering options for this run.
    fn rewrite(
        &self,
        node: &mut Node,
        inputs: &[&Tensor],
        captures: &Captures,
        options: &LowerOptions,
    ) -> Rewrite;
}
