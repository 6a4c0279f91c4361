//! `torch.transpose` → backend `Permute`.

use super::{PERMUTE_PRIORITY, PERMUTE_TYPE, reject, rewrite_permute};
use crate::permute::PermuteSource;
use nclower_core::{AxisEncoding, Captures, LowerOptions, Node, Rewrite, RewritePass, Tensor};

const PATTERN: &str = r#"7767517
3 2
pnnx.Input              input       0 1 input
torch.transpose         op_0        1 1 input out dim0=%dim0 dim1=%dim1
pnnx.Output             output      1 0 out
"#;

/// Lowers a two-axis swap. Always writes the enumeration code.
pub struct TorchTransposePass;

impl RewritePass for TorchTransposePass {
    fn match_pattern(&self) -> &str {
        PATTERN
    }

    fn type_str(&self) -> &str {
        PERMUTE_TYPE
    }

    fn name_str(&self) -> &str {
        "transpose"
    }

    fn priority(&self) -> i32 {
        PERMUTE_PRIORITY
    }

    fn rewrite(
        &self,
        node: &mut Node,
        inputs: &[&Tensor],
        captures: &Captures,
        _options: &LowerOptions,
    ) -> Rewrite {
        let swap = captures.int("dim0").and_then(|dim0| {
            let dim1 = captures.int("dim1")?;
            Ok(PermuteSource::Swap { dim0, dim1 })
        });

        match swap {
            Ok(source) => rewrite_permute(node, inputs, &source, AxisEncoding::Enumerated),
            Err(err) => reject(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nclower_core::Parameter;

    fn captures(dim0: i64, dim1: i64) -> Captures {
        [("dim0", Parameter::Int(dim0)), ("dim1", Parameter::Int(dim1))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_swap_code() {
        let mut node = Node::new("torch.transpose", "op_0");
        let input = Tensor::new("x").with_shape(vec![1, 2, 3, 4]);
        let outcome = TorchTransposePass.rewrite(
            &mut node,
            &[&input],
            &captures(1, 3),
            &LowerOptions::new(),
        );

        assert_eq!(outcome, Rewrite::Lowered);
        assert_eq!(node.param("0").unwrap(), &Parameter::Int(5));
    }

    #[test]
    fn test_explicit_option_is_ignored() {
        let mut node = Node::new("torch.transpose", "op_0");
        let input = Tensor::new("x").with_shape(vec![3, 4]);
        let options = LowerOptions::new().with_axis_encoding(AxisEncoding::Explicit);
        let outcome = TorchTransposePass.rewrite(&mut node, &[&input], &captures(0, 1), &options);

        assert_eq!(outcome, Rewrite::Lowered);
        assert_eq!(node.params.len(), 1);
        assert_eq!(node.param("0").unwrap(), &Parameter::Int(1));
    }

    #[test]
    fn test_float_axis_is_rejected() {
        let mut node = Node::new("torch.transpose", "op_0");
        let input = Tensor::new("x").with_shape(vec![3, 4]);
        let captures: Captures = [
            ("dim0", Parameter::Float(0.0)),
            ("dim1", Parameter::Int(1)),
        ]
        .into_iter()
        .collect();
        let outcome =
            TorchTransposePass.rewrite(&mut node, &[&input], &captures, &LowerOptions::new());

        assert!(matches!(
            outcome,
            Rewrite::Rejected {
                kind: "InvalidCapture",
                ..
            }
        ));
    }
}
