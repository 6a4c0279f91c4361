//! Template matcher.
//!
//! Finds subgraphs of a [`Graph`] isomorphic to the interior of a
//! [`Template`]. Matching is anchored on the first interior template node and
//! grows along shared tensors with backtracking:
//! - node types and input/output arities must be equal
//! - a graph node must carry exactly the template's parameter keys
//! - literal values must be equal; `%name` binds, and a repeated placeholder
//!   must bind equal values
//! - template tensors map one-to-one onto graph tensors
//! - tensors internal to the template may not be consumed outside the match
//!
//! A graph node takes part in at most one returned match.

use crate::template::{Template, TemplateNode, TemplateValue};
use nclower_core::{Captures, Graph, NodeId, TensorId};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// One matched subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Graph nodes matched to the template's interior nodes, in template
    /// order. Never empty.
    pub nodes: Vec<NodeId>,

    /// Placeholder values bound by this match.
    pub captures: Captures,
}

impl Match {
    /// The node matched to the template's first interior node.
    pub fn anchor(&self) -> NodeId {
        self.nodes[0]
    }
}

#[derive(Debug, Clone, Default)]
struct State<'t> {
    nodes: Vec<NodeId>,
    tensors: HashMap<&'t str, TensorId>,
    captures: Captures,
}

/// Find all non-overlapping matches of `template` in `graph`.
///
/// Anchors are tried in topological order, so matches come back in
/// producer-before-consumer order.
pub fn find_matches(graph: &Graph, template: &Template) -> Vec<Match> {
    let interior: Vec<&TemplateNode> = template.interior().collect();
    let Some(&anchor) = interior.first() else {
        return Vec::new();
    };
    let exported: HashSet<&str> = template.exported_tensors().collect();

    let mut used: HashSet<NodeId> = HashSet::new();
    let mut matches = Vec::new();

    for node_id in graph.topological_order() {
        if used.contains(&node_id) {
            continue;
        }

        let mut state = State::default();
        if !bind_node(graph, anchor, node_id, &mut state) {
            continue;
        }

        let Some(state) = extend(graph, &interior, &exported, state, &used) else {
            continue;
        };

        trace!(anchor = ?node_id, nodes = state.nodes.len(), "template matched");
        used.extend(state.nodes.iter().copied());
        matches.push(Match {
            nodes: state.nodes,
            captures: state.captures,
        });
    }

    matches
}

fn extend<'t>(
    graph: &Graph,
    interior: &[&'t TemplateNode],
    exported: &HashSet<&str>,
    state: State<'t>,
    used: &HashSet<NodeId>,
) -> Option<State<'t>> {
    let Some(&pattern) = interior.get(state.nodes.len()) else {
        return is_closed(graph, interior, exported, &state).then_some(state);
    };

    for candidate in candidates(graph, pattern, &state) {
        if used.contains(&candidate) || state.nodes.contains(&candidate) {
            continue;
        }

        let mut next = state.clone();
        if !bind_node(graph, pattern, candidate, &mut next) {
            continue;
        }
        if let Some(done) = extend(graph, interior, exported, next, used) {
            return Some(done);
        }
    }

    None
}

/// Graph nodes that could match `pattern` given the tensors bound so far.
fn candidates(graph: &Graph, pattern: &TemplateNode, state: &State<'_>) -> Vec<NodeId> {
    for name in &pattern.inputs {
        if let Some(&tensor_id) = state.tensors.get(name.as_str()) {
            return graph.consumers(tensor_id).to_vec();
        }
    }

    for name in &pattern.outputs {
        if let Some(&tensor_id) = state.tensors.get(name.as_str()) {
            return graph.producer(tensor_id).into_iter().collect();
        }
    }

    // Not connected to anything bound yet
    graph.topological_order()
}

/// Try to map `pattern` onto `node_id`, extending `state` on success.
///
/// On failure `state` may be partially updated and must be discarded.
fn bind_node<'t>(
    graph: &Graph,
    pattern: &'t TemplateNode,
    node_id: NodeId,
    state: &mut State<'t>,
) -> bool {
    let Ok(node) = graph.node(node_id) else {
        return false;
    };

    if node.op_type != pattern.op_type
        || node.inputs.len() != pattern.inputs.len()
        || node.outputs.len() != pattern.outputs.len()
        || node.params.len() != pattern.params.len()
    {
        return false;
    }

    for (key, expected) in &pattern.params {
        let Some(actual) = node.params.get(key) else {
            return false;
        };
        let bound = match expected {
            TemplateValue::Literal(literal) => literal == actual,
            TemplateValue::Placeholder(name) => state.captures.bind(name, actual),
        };
        if !bound {
            return false;
        }
    }

    let operands = pattern
        .inputs
        .iter()
        .zip(&node.inputs)
        .chain(pattern.outputs.iter().zip(&node.outputs));

    for (name, &tensor_id) in operands {
        match state.tensors.get(name.as_str()) {
            Some(&bound) if bound != tensor_id => return false,
            Some(_) => {}
            None => {
                if state.tensors.values().any(|&t| t == tensor_id) {
                    return false;
                }
                state.tensors.insert(name.as_str(), tensor_id);
            }
        }
    }

    state.nodes.push(node_id);
    true
}

/// Check that no tensor produced inside the match leaks to outside consumers,
/// unless the template exports it through its output boundary.
fn is_closed(
    graph: &Graph,
    interior: &[&TemplateNode],
    exported: &HashSet<&str>,
    state: &State<'_>,
) -> bool {
    interior
        .iter()
        .flat_map(|pattern| pattern.outputs.iter())
        .filter(|name| !exported.contains(name.as_str()))
        .filter_map(|name| state.tensors.get(name.as_str()))
        .all(|&tensor_id| {
            graph
                .consumers(tensor_id)
                .iter()
                .all(|consumer| state.nodes.contains(consumer))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_graph, parse_template};
    use nclower_core::Parameter;

    const TRANSPOSE_TEMPLATE: &str = "7767517
3 2
pnnx.Input              input       0 1 input
torch.transpose         op_0        1 1 input out dim0=%dim0 dim1=%dim1
pnnx.Output             output      1 0 out
";

    const DOUBLE_PERMUTE_TEMPLATE: &str = "7767517
4 3
pnnx.Input              input       0 1 input
Tensor.permute          op_0        1 1 input mid dims=%dims
Tensor.permute          op_1        1 1 mid out dims=%dims
pnnx.Output             output      1 0 out
";

    #[test]
    fn test_single_node_match() {
        let template = parse_template(TRANSPOSE_TEMPLATE).unwrap();
        let graph = parse_graph(
            "7767517
5 3
pnnx.Input in0 0 1 x
torch.transpose t0 1 1 x y dim0=1 dim1=-1
nn.ReLU r0 1 1 y z
torch.transpose t1 0 0 dim0=0 dim1=1
pnnx.Output out0 1 0 z
",
        )
        .unwrap();

        let matches = find_matches(&graph, &template);
        assert_eq!(matches.len(), 1);

        let m = &matches[0];
        assert_eq!(m.anchor(), graph.find_node_by_name("t0").unwrap());
        assert_eq!(m.captures.int("dim0").unwrap(), 1);
        assert_eq!(m.captures.int("dim1").unwrap(), -1);
    }

    #[test]
    fn test_every_instance_matches() {
        let template = parse_template(TRANSPOSE_TEMPLATE).unwrap();
        let graph = parse_graph(
            "7767517
4 3
pnnx.Input in0 0 1 x
torch.transpose t0 1 1 x y dim0=0 dim1=1
torch.transpose t1 1 1 y z dim0=1 dim1=2
pnnx.Output out0 1 0 z
",
        )
        .unwrap();

        let matches = find_matches(&graph, &template);
        let anchors: Vec<_> = matches.iter().map(Match::anchor).collect();
        assert_eq!(
            anchors,
            vec![
                graph.find_node_by_name("t0").unwrap(),
                graph.find_node_by_name("t1").unwrap()
            ]
        );
    }

    #[test]
    fn test_extra_param_key_prevents_match() {
        let template = parse_template(TRANSPOSE_TEMPLATE).unwrap();
        let graph = parse_graph(
            "7767517
3 2
pnnx.Input in0 0 1 x
torch.transpose t0 1 1 x y dim0=0 dim1=1 memory_format=contiguous
pnnx.Output out0 1 0 y
",
        )
        .unwrap();

        assert!(find_matches(&graph, &template).is_empty());
    }

    #[test]
    fn test_literal_must_match() {
        let template = parse_template(
            "7767517
3 2
pnnx.Input input 0 1 input
torch.transpose op_0 1 1 input out dim0=0 dim1=%dim1
pnnx.Output output 1 0 out
",
        )
        .unwrap();
        let graph = parse_graph(
            "7767517
4 3
pnnx.Input in0 0 1 x
torch.transpose t0 1 1 x y dim0=1 dim1=2
torch.transpose t1 1 1 y z dim0=0 dim1=2
pnnx.Output out0 1 0 z
",
        )
        .unwrap();

        let matches = find_matches(&graph, &template);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].anchor(), graph.find_node_by_name("t1").unwrap());
    }

    #[test]
    fn test_repeated_placeholder_binds_equal_values() {
        let template = parse_template(DOUBLE_PERMUTE_TEMPLATE).unwrap();

        let same = parse_graph(
            "7767517
4 3
pnnx.Input in0 0 1 x
Tensor.permute p0 1 1 x y dims=(1,0)
Tensor.permute p1 1 1 y z dims=(1,0)
pnnx.Output out0 1 0 z
",
        )
        .unwrap();
        let matches = find_matches(&same, &template);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].nodes.len(), 2);
        assert_eq!(
            matches[0].captures.get("dims").unwrap(),
            &Parameter::Ints(vec![1, 0])
        );

        let different = parse_graph(
            "7767517
4 3
pnnx.Input in0 0 1 x
Tensor.permute p0 1 1 x y dims=(1,0)
Tensor.permute p1 1 1 y z dims=(0,1)
pnnx.Output out0 1 0 z
",
        )
        .unwrap();
        assert!(find_matches(&different, &template).is_empty());
    }

    #[test]
    fn test_internal_tensor_may_not_escape() {
        let template = parse_template(DOUBLE_PERMUTE_TEMPLATE).unwrap();
        let graph = parse_graph(
            "7767517
5 4
pnnx.Input in0 0 1 x
Tensor.permute p0 1 1 x y dims=(1,0)
Tensor.permute p1 1 1 y z dims=(1,0)
nn.ReLU r0 1 1 y w
pnnx.Output out0 2 0 z w
",
        )
        .unwrap();

        assert!(find_matches(&graph, &template).is_empty());
    }

    #[test]
    fn test_template_without_interior_matches_nothing() {
        let template = parse_template(
            "7767517
2 1
pnnx.Input input 0 1 x
pnnx.Output output 1 0 x
",
        )
        .unwrap();
        let graph = parse_graph(
            "7767517
2 1
pnnx.Input in0 0 1 x
pnnx.Output out0 1 0 x
",
        )
        .unwrap();

        assert!(find_matches(&graph, &template).is_empty());
    }
}
