//! Serialize a graph back into the text format.

use crate::parser::{MAGIC, parse_value};
use crate::template::TemplateValue;
use crate::{PatternError, Result};
use nclower_core::{Graph, Node, Parameter, Tensor, TensorId};
use std::collections::HashSet;

/// Render `graph` in the text format read by [`parse_graph`](crate::parse_graph).
///
/// Nodes are written in insertion order. Each tensor's shape and batch
/// annotations are written once, on its producer's line when it has one.
///
/// # Errors
///
/// The format has no quoting, so a parameter whose text would read back as
/// something else (a string containing whitespace, a string that looks like a
/// number, a non-finite float, an empty float list) is rejected with
/// [`PatternError::Unwritable`].
pub fn write_graph(graph: &Graph) -> Result<String> {
    let mut referenced: HashSet<TensorId> = HashSet::new();
    for (_, node) in graph.nodes() {
        referenced.extend(node.inputs.iter().chain(&node.outputs).copied());
    }

    let mut out = String::new();
    out.push_str(&format!("{MAGIC}\n"));
    out.push_str(&format!("{} {}\n", graph.node_count(), referenced.len()));

    let mut annotated: HashSet<TensorId> = HashSet::new();

    for (_, node) in graph.nodes() {
        out.push_str(&format!(
            "{:<24} {:<24} {} {}",
            node.op_type,
            node.name,
            node.inputs.len(),
            node.outputs.len()
        ));
        for &id in node.inputs.iter().chain(&node.outputs) {
            out.push(' ');
            out.push_str(&graph.tensor(id)?.name);
        }
        for (key, value) in &node.params {
            out.push_str(&format!(" {key}={}", param_text(node, key, value)?));
        }

        for &id in node.outputs.iter().chain(&node.inputs) {
            let tensor = graph.tensor(id)?;
            let is_owner = graph.producer(id).is_none() || node.outputs.contains(&id);
            if is_owner && annotated.insert(id) {
                write_annotations(&mut out, tensor);
            }
        }

        out.push('\n');
    }

    Ok(out)
}

/// Text of `value`, checked to parse back to the same value.
fn param_text(node: &Node, key: &str, value: &Parameter) -> Result<String> {
    let text = value.to_string();
    let reads_back = !text.contains(char::is_whitespace)
        && parse_value(&text) == TemplateValue::Literal(value.clone());

    if !reads_back {
        return Err(PatternError::Unwritable {
            node: node.name.clone(),
            key: key.to_string(),
            value: format!("{value:?}"),
        });
    }
    Ok(text)
}

fn write_annotations(out: &mut String, tensor: &Tensor) {
    if let Some(shape) = &tensor.shape {
        let extents: Vec<String> = shape
            .iter()
            .map(|&d| if d < 0 { "?".to_string() } else { d.to_string() })
            .collect();
        out.push_str(&format!(" #{}=({})", tensor.name, extents.join(",")));
    }
    if let Some(axis) = tensor.batch_axis {
        out.push_str(&format!(" #{}.batch={}", tensor.name, axis));
    }
}
