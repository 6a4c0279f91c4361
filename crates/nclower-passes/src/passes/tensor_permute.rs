//! `Tensor.permute` → backend `Permute`.

use super::{PERMUTE_PRIORITY, PERMUTE_TYPE, reject, rewrite_permute};
use crate::permute::PermuteSource;
use nclower_core::{Captures, LowerOptions, Node, Rewrite, RewritePass, Tensor};

const PATTERN: &str = r#"7767517
3 2
pnnx.Input              input       0 1 input
Tensor.permute          op_0        1 1 input out dims=%dims
pnnx.Output             output      1 0 out
"#;

/// Lowers an explicit axis order.
///
/// Writes the enumeration code, or the per-axis mapping when
/// [`LowerOptions::axis_encoding`] is [`Explicit`](nclower_core::AxisEncoding::Explicit).
pub struct TensorPermutePass;

impl RewritePass for TensorPermutePass {
    fn match_pattern(&self) -> &str {
        PATTERN
    }

    fn type_str(&self) -> &str {
        PERMUTE_TYPE
    }

    fn name_str(&self) -> &str {
        "permute"
    }

    fn priority(&self) -> i32 {
        PERMUTE_PRIORITY
    }

    fn rewrite(
        &self,
        node: &mut Node,
        inputs: &[&Tensor],
        captures: &Captures,
        options: &LowerOptions,
    ) -> Rewrite {
        let dims = match captures.ints("dims") {
            Ok(dims) => dims.to_vec(),
            Err(err) => return reject(err.into()),
        };

        rewrite_permute(
            node,
            inputs,
            &PermuteSource::Dims(dims),
            options.axis_encoding,
        )
    }
}
