//! Common test utilities for permute lowering tests.
//!
//! Graphs are built from the text format so the tests exercise the same
//! parser and matcher the pipeline uses.

#![allow(dead_code)]

use nclower_core::{Graph, Node};
use nclower_passes::{LowerOptions, LowerReport, LoweringPipeline};

/// Name of the operator node in every graph built here.
pub const OP_NAME: &str = "op0";

/// Initialize a tracing subscriber that writes through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// Layout annotations for the input tensor `x`.
///
/// `shape = None` leaves the rank unknown.
pub fn input_annotations(shape: Option<&[i64]>, batch_axis: Option<usize>) -> String {
    let mut out = String::new();
    if let Some(shape) = shape {
        let extents: Vec<String> = shape.iter().map(i64::to_string).collect();
        out.push_str(&format!(" #x=({})", extents.join(",")));
    }
    if let Some(axis) = batch_axis {
        out.push_str(&format!(" #x.batch={axis}"));
    }
    out
}

fn single_op_graph(op_line: &str, shape: Option<&[i64]>, batch_axis: Option<usize>) -> Graph {
    let text = format!(
        "7767517\n3 2\npnnx.Input in0 0 1 x{}\n{op_line}\npnnx.Output out0 1 0 y\n",
        input_annotations(shape, batch_axis)
    );
    nclower_pattern::parse_graph(&text).expect("test graph should parse")
}

/// `x -> Tensor.permute(dims) -> y`.
pub fn permute_graph(dims: &[i64], shape: Option<&[i64]>, batch_axis: Option<usize>) -> Graph {
    let items: Vec<String> = dims.iter().map(i64::to_string).collect();
    let op_line = format!("Tensor.permute {OP_NAME} 1 1 x y dims=({})", items.join(","));
    single_op_graph(&op_line, shape, batch_axis)
}

/// `x -> torch.transpose(dim0, dim1) -> y`.
pub fn transpose_graph(
    dim0: i64,
    dim1: i64,
    shape: Option<&[i64]>,
    batch_axis: Option<usize>,
) -> Graph {
    let op_line = format!("torch.transpose {OP_NAME} 1 1 x y dim0={dim0} dim1={dim1}");
    single_op_graph(&op_line, shape, batch_axis)
}

/// Run the default pipeline.
pub fn lower(graph: &mut Graph, options: LowerOptions) -> LowerReport {
    LoweringPipeline::new(options)
        .run(graph)
        .expect("lowering should not fail")
}

/// The single node between the input and output boundaries.
pub fn op_node(graph: &Graph) -> &Node {
    graph
        .nodes()
        .map(|(_, node)| node)
        .find(|node| !node.op_type.starts_with("pnnx."))
        .expect("graph should have an operator node")
}

/// Shape `[2, 3, ...]` of the given rank.
pub fn shape_of_rank(rank: usize) -> Vec<i64> {
    (0..rank as i64).map(|axis| axis + 2).collect()
}

/// Every permutation of `0..n` in lexicographic order.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn build(prefix: &mut Vec<usize>, n: usize, out: &mut Vec<Vec<usize>>) {
        if prefix.len() == n {
            out.push(prefix.clone());
            return;
        }
        for axis in 0..n {
            if !prefix.contains(&axis) {
                prefix.push(axis);
                build(prefix, n, out);
                prefix.pop();
            }
        }
    }

    let mut out = Vec::new();
    build(&mut Vec::new(), n, &mut out);
    out
}

pub fn as_dims(perm: &[usize]) -> Vec<i64> {
    perm.iter().map(|&axis| axis as i64).collect()
}
