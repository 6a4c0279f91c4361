//! Parser for the template and graph text format.
//!
//! # Grammar
//!
//! ```text
//! document   = magic '\n' counts '\n' node*
//! counts     = node_count ' ' tensor_count
//! node       = op_type name n_in n_out input{n_in} output{n_out} (param | annotation)*
//! param      = key '=' value
//! value      = '%' ident | int | float | '(' [value (',' value)*] ')' | string
//! annotation = '#' tensor '=' '(' [extent (',' extent)*] ')' [dtype]
//!            | '#' tensor '.batch=' int
//! extent     = int | '?'
//! ```
//!
//! Annotations only carry meaning in graphs; templates accept and ignore them.

use crate::template::{Template, TemplateNode, TemplateValue};
use crate::{PatternError, Result};
use nclower_core::{Graph, Node, Parameter};
use std::collections::{BTreeMap, HashSet};

/// Magic number on the first line of every document.
pub const MAGIC: u32 = 7767517;

/// Parse template text.
pub fn parse_template(text: &str) -> Result<Template> {
    let lines = parse_document(text)?;

    let nodes = lines
        .into_iter()
        .map(|line| TemplateNode {
            op_type: line.op_type,
            name: line.name,
            inputs: line.inputs,
            outputs: line.outputs,
            params: line.params,
        })
        .collect();

    Ok(Template { nodes })
}

/// Parse graph text into a [`Graph`].
///
/// Tensors are created on first mention. Shape and batch annotations are
/// applied once all nodes are in place, so they may appear on any line.
pub fn parse_graph(text: &str) -> Result<Graph> {
    let lines = parse_document(text)?;
    let mut graph = Graph::new();

    for line in &lines {
        let mut node = Node::new(line.op_type.as_str(), line.name.as_str());

        for name in &line.inputs {
            node.inputs.push(graph.ensure_tensor(name));
        }
        for name in &line.outputs {
            node.outputs.push(graph.ensure_tensor(name));
        }

        for (key, value) in &line.params {
            match value {
                TemplateValue::Literal(param) => node.set_param(key.as_str(), param.clone()),
                TemplateValue::Placeholder(placeholder) => {
                    return Err(syntax(
                        line.number,
                        format!("placeholder %{placeholder} is only allowed in templates"),
                    ));
                }
            }
        }

        graph
            .add_node(node)
            .map_err(|e| syntax(line.number, e.to_string()))?;
    }

    for line in &lines {
        for annotation in &line.annotations {
            let tensor_id = graph.tensor_by_name(annotation.tensor()).ok_or_else(|| {
                syntax(
                    line.number,
                    format!("annotation for unknown tensor '{}'", annotation.tensor()),
                )
            })?;
            let tensor = graph.tensor_mut(tensor_id)?;

            match annotation {
                Annotation::Shape { shape, .. } => tensor.shape = Some(shape.clone()),
                Annotation::Batch { axis, .. } => tensor.batch_axis = Some(*axis),
            }
        }
    }

    Ok(graph)
}

/// Parse a single parameter value.
pub fn parse_value(text: &str) -> TemplateValue {
    if let Some(name) = text.strip_prefix('%') {
        if !name.is_empty() {
            return TemplateValue::Placeholder(name.to_string());
        }
    }

    TemplateValue::Literal(parse_literal(text))
}

// ============================================================================
// Document structure
// ============================================================================

#[derive(Debug)]
struct NodeLine {
    number: usize,
    op_type: String,
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    params: BTreeMap<String, TemplateValue>,
    annotations: Vec<Annotation>,
}

#[derive(Debug)]
enum Annotation {
    Shape { tensor: String, shape: Vec<i64> },
    Batch { tensor: String, axis: usize },
}

impl Annotation {
    fn tensor(&self) -> &str {
        match self {
            Annotation::Shape { tensor, .. } | Annotation::Batch { tensor, .. } => tensor,
        }
    }
}

fn syntax(line: usize, message: impl Into<String>) -> PatternError {
    PatternError::Syntax {
        line,
        message: message.into(),
    }
}

fn parse_document(text: &str) -> Result<Vec<NodeLine>> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, magic) = lines.next().ok_or_else(|| PatternError::Header {
        expected: MAGIC,
        actual: String::new(),
    })?;
    if magic.parse::<u32>().ok() != Some(MAGIC) {
        return Err(PatternError::Header {
            expected: MAGIC,
            actual: magic.to_string(),
        });
    }

    let (counts_line, counts) = lines
        .next()
        .ok_or_else(|| syntax(2, "missing node and tensor counts"))?;
    let (node_count, tensor_count) = parse_counts(counts_line, counts)?;

    let nodes = lines
        .map(|(number, line)| parse_node_line(number, line))
        .collect::<Result<Vec<_>>>()?;

    if nodes.len() != node_count {
        return Err(PatternError::Counts {
            what: "nodes",
            declared: node_count,
            actual: nodes.len(),
        });
    }

    let tensors: HashSet<&str> = nodes
        .iter()
        .flat_map(|node| node.inputs.iter().chain(&node.outputs))
        .map(String::as_str)
        .collect();
    if tensors.len() != tensor_count {
        return Err(PatternError::Counts {
            what: "tensors",
            declared: tensor_count,
            actual: tensors.len(),
        });
    }

    Ok(nodes)
}

fn parse_counts(number: usize, line: &str) -> Result<(usize, usize)> {
    let mut fields = line.split_whitespace().map(str::parse::<usize>);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(nodes)), Some(Ok(tensors)), None) => Ok((nodes, tensors)),
        _ => Err(syntax(
            number,
            format!("expected '<node_count> <tensor_count>', got '{line}'"),
        )),
    }
}

fn parse_node_line(number: usize, line: &str) -> Result<NodeLine> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(syntax(
            number,
            "expected '<op_type> <name> <n_in> <n_out> ...'",
        ));
    }

    let parse_arity = |token: &str, what: &str| {
        token
            .parse::<usize>()
            .map_err(|_| syntax(number, format!("invalid {what} count '{token}'")))
    };
    let n_in = parse_arity(tokens[2], "input")?;
    let n_out = parse_arity(tokens[3], "output")?;

    let operands_end = 4 + n_in + n_out;
    if tokens.len() < operands_end {
        return Err(syntax(
            number,
            format!(
                "node '{}' declares {} inputs and {} outputs but lists {} operands",
                tokens[1],
                n_in,
                n_out,
                tokens.len() - 4
            ),
        ));
    }

    let mut node = NodeLine {
        number,
        op_type: tokens[0].to_string(),
        name: tokens[1].to_string(),
        inputs: tokens[4..4 + n_in].iter().map(|s| s.to_string()).collect(),
        outputs: tokens[4 + n_in..operands_end]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        params: BTreeMap::new(),
        annotations: Vec::new(),
    };

    for token in &tokens[operands_end..] {
        if let Some(annotation) = token.strip_prefix('#') {
            node.annotations.push(parse_annotation(number, annotation)?);
            continue;
        }

        let (key, value) = token
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| syntax(number, format!("expected key=value, got '{token}'")))?;

        if node
            .params
            .insert(key.to_string(), parse_value(value))
            .is_some()
        {
            return Err(syntax(number, format!("duplicate parameter '{key}'")));
        }
    }

    Ok(node)
}

fn parse_annotation(number: usize, text: &str) -> Result<Annotation> {
    let (target, value) = text
        .split_once('=')
        .ok_or_else(|| syntax(number, format!("malformed annotation '#{text}'")))?;

    if let Some(tensor) = target.strip_suffix(".batch") {
        let axis = value
            .parse::<usize>()
            .map_err(|_| syntax(number, format!("invalid batch axis '{value}'")))?;
        return Ok(Annotation::Batch {
            tensor: tensor.to_string(),
            axis,
        });
    }

    // Trailing dtype (e.g. "f32") after the closing paren is ignored
    let inner = value
        .strip_prefix('(')
        .and_then(|rest| rest.rsplit_once(')'))
        .map(|(inner, _dtype)| inner)
        .ok_or_else(|| syntax(number, format!("malformed shape '{value}'")))?;

    let shape = split_items(inner)
        .map(|extent| match extent {
            "?" => Ok(-1),
            _ => extent
                .parse::<i64>()
                .map_err(|_| syntax(number, format!("invalid extent '{extent}'"))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Annotation::Shape {
        tensor: target.to_string(),
        shape,
    })
}

// ============================================================================
// Values
// ============================================================================

fn split_items(inner: &str) -> impl Iterator<Item = &str> {
    inner.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_literal(text: &str) -> Parameter {
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let items: Vec<&str> = split_items(inner).collect();

        let ints = items
            .iter()
            .map(|s| s.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>();
        if let Ok(ints) = ints {
            return Parameter::Ints(ints);
        }

        // Integer items are accepted in a float list
        let floats = items
            .iter()
            .map(|s| s.parse::<f32>().ok())
            .collect::<Option<Vec<_>>>();
        if let Some(floats) = floats {
            return Parameter::Floats(floats);
        }
        return Parameter::Str(text.to_string());
    }

    if let Ok(v) = text.parse::<i64>() {
        return Parameter::Int(v);
    }
    if let Some(v) = parse_float(text) {
        return Parameter::Float(v);
    }

    Parameter::Str(text.to_string())
}

fn parse_float(text: &str) -> Option<f32> {
    if !text.contains(['.', 'e', 'E']) {
        return None;
    }
    text.parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMUTE_TEMPLATE: &str = "7767517
3 2
pnnx.Input              input       0 1 input
Tensor.permute          op_0        1 1 input out dims=%dims
pnnx.Output             output      1 0 out
";

    #[test]
    fn test_parse_template() {
        let template = parse_template(PERMUTE_TEMPLATE).unwrap();

        assert_eq!(template.nodes.len(), 3);
        let anchor = template.anchor().unwrap();
        assert_eq!(anchor.op_type, "Tensor.permute");
        assert_eq!(anchor.inputs, vec!["input"]);
        assert_eq!(anchor.outputs, vec!["out"]);
        assert_eq!(
            anchor.params.get("dims"),
            Some(&TemplateValue::Placeholder("dims".to_string()))
        );
        assert_eq!(template.exported_tensors().collect::<Vec<_>>(), vec!["out"]);
    }

    #[test]
    fn test_parse_values() {
        let literal = |text| match parse_value(text) {
            TemplateValue::Literal(p) => p,
            other => panic!("expected literal, got {other:?}"),
        };

        assert_eq!(literal("3"), Parameter::Int(3));
        assert_eq!(literal("-2"), Parameter::Int(-2));
        assert_eq!(literal("0.5"), Parameter::Float(0.5));
        assert_eq!(literal("1e-5"), Parameter::Float(1e-5));
        assert_eq!(literal("(0,2,1)"), Parameter::Ints(vec![0, 2, 1]));
        assert_eq!(literal("()"), Parameter::Ints(vec![]));
        assert_eq!(literal("(1.0,2.5)"), Parameter::Floats(vec![1.0, 2.5]));
        assert_eq!(literal("(1,2.5)"), Parameter::Floats(vec![1.0, 2.5]));
        assert_eq!(literal("nearest"), Parameter::from("nearest"));
        assert_eq!(literal("%"), Parameter::from("%"));
        assert_eq!(
            parse_value("%dim0"),
            TemplateValue::Placeholder("dim0".to_string())
        );
    }

    #[test]
    fn test_bad_magic() {
        let err = parse_template("1234\n0 0\n").unwrap_err();
        assert!(matches!(err, PatternError::Header { .. }));
    }

    #[test]
    fn test_count_mismatch() {
        let text = "7767517\n2 2\npnnx.Input input 0 1 input\n";
        let err = parse_template(text).unwrap_err();
        assert!(matches!(
            err,
            PatternError::Counts {
                what: "nodes",
                declared: 2,
                actual: 1
            }
        ));

        let text = "7767517\n1 2\npnnx.Input input 0 1 input\n";
        let err = parse_template(text).unwrap_err();
        assert!(matches!(err, PatternError::Counts { what: "tensors", .. }));
    }

    #[test]
    fn test_truncated_operands() {
        let text = "7767517\n1 1\nTensor.permute op_0 1 1 input\n";
        let err = parse_template(text).unwrap_err();
        assert!(matches!(err, PatternError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_duplicate_param() {
        let text = "7767517\n1 2\nTensor.permute op_0 1 1 a b dims=(0) dims=(1)\n";
        let err = parse_template(text).unwrap_err();
        assert!(matches!(err, PatternError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_parse_graph_with_annotations() {
        let text = "7767517
3 2
pnnx.Input in0 0 1 x #x=(1,3,?,8)f32 #x.batch=0
Tensor.permute p0 1 1 x y dims=(0,1,3,2)
pnnx.Output out0 1 0 y
";
        let graph = parse_graph(text).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.tensor_count(), 2);

        let x = graph.tensor(graph.tensor_by_name("x").unwrap()).unwrap();
        assert_eq!(x.shape, Some(vec![1, 3, -1, 8]));
        assert_eq!(x.batch_axis, Some(0));

        let y = graph.tensor(graph.tensor_by_name("y").unwrap()).unwrap();
        assert_eq!(y.rank(), None);

        let permute = graph.node(graph.find_node_by_name("p0").unwrap()).unwrap();
        assert_eq!(
            permute.param("dims").unwrap(),
            &Parameter::Ints(vec![0, 1, 3, 2])
        );
    }

    #[test]
    fn test_graph_rejects_placeholders() {
        let text = "7767517\n1 2\nTensor.permute p0 1 1 x y dims=%dims\n";
        let err = parse_graph(text).unwrap_err();
        assert!(matches!(err, PatternError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_graph_rejects_second_producer() {
        let text = "7767517\n2 2\nA a 1 1 x y\nB b 1 1 x y\n";
        let err = parse_graph(text).unwrap_err();
        assert!(matches!(err, PatternError::Syntax { line: 4, .. }));
    }

    #[test]
    fn test_annotation_for_unknown_tensor() {
        let text = "7767517\n1 1\npnnx.Input in0 0 1 x #z=(1,2)\n";
        let err = parse_graph(text).unwrap_err();
        assert!(matches!(err, PatternError::Syntax { line: 3, .. }));
    }
}
