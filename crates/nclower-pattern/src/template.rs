//! Parsed template representation.

use nclower_core::Parameter;
use std::collections::BTreeMap;

/// Boundary node type feeding external tensors into a template or graph.
pub const INPUT_TYPE: &str = "pnnx.Input";

/// Boundary node type consuming external tensors of a template or graph.
pub const OUTPUT_TYPE: &str = "pnnx.Output";

/// A parameter value in a template: a literal or a capture placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Literal(Parameter),
    Placeholder(String),
}

/// One node line of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub op_type: String,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub params: BTreeMap<String, TemplateValue>,
}

impl TemplateNode {
    /// Whether this node is an input or output boundary.
    pub fn is_boundary(&self) -> bool {
        self.op_type == INPUT_TYPE || self.op_type == OUTPUT_TYPE
    }
}

/// A parsed template: boundary nodes plus the interior nodes to match.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub nodes: Vec<TemplateNode>,
}

impl Template {
    /// Interior (non-boundary) nodes in declaration order.
    pub fn interior(&self) -> impl Iterator<Item = &TemplateNode> {
        self.nodes.iter().filter(|node| !node.is_boundary())
    }

    /// The first interior node. Matches are anchored on it.
    pub fn anchor(&self) -> Option<&TemplateNode> {
        self.interior().next()
    }

    /// Tensors consumed by the output boundary, i.e. visible outside a match.
    pub fn exported_tensors(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|node| node.op_type == OUTPUT_TYPE)
            .flat_map(|node| node.inputs.iter().map(String::as_str))
    }
}
