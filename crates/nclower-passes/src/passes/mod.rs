//! Permute lowering passes.

mod tensor_permute;
mod torch_transpose;

pub use tensor_permute::TensorPermutePass;
pub use torch_transpose::TorchTransposePass;

use crate::permute::{self, InputLayout, Lowering, PermuteError, PermuteSource};
use nclower_core::{AxisEncoding, Node, Rewrite, Tensor};

/// Backend operator type shared by both permute passes.
pub const PERMUTE_TYPE: &str = "Permute";

/// Priority both permute passes register with.
pub const PERMUTE_PRIORITY: i32 = 20;

/// Lower `source` onto `node`, reading the layout of the first input.
fn rewrite_permute(
    node: &mut Node,
    inputs: &[&Tensor],
    source: &PermuteSource,
    encoding: AxisEncoding,
) -> Rewrite {
    let layout = inputs
        .first()
        .map(|tensor| InputLayout::of(tensor))
        .unwrap_or_default();

    match permute::lower(source, layout, encoding) {
        Ok(Lowering::Noop) => Rewrite::Noop,
        Ok(Lowering::Permute { encoding, .. }) => {
            encoding.write(node);
            Rewrite::Lowered
        }
        Err(err) => reject(err),
    }
}

fn reject(err: PermuteError) -> Rewrite {
    Rewrite::Rejected {
        kind: err.kind(),
        message: err.to_string(),
    }
}
