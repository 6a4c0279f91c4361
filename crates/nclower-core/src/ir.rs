//! Graph model for imported computation graphs.
//!
//! The graph is a directed graph where:
//! - **Nodes** (`Node`) are operators with a type tag and a parameter map
//! - **Tensors** (`Tensor`) live in a side table and are referenced by id
//!
//! Each tensor has at most one producing node and any number of consumers.
//! petgraph edges exist solely for topological ordering.

use crate::param::{Parameter, lookup};
use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::Topo;

use std::collections::{BTreeMap, HashMap};

/// Type alias for node identifiers (backed by petgraph NodeIndex).
pub type NodeId = NodeIndex;

/// Unique identifier for a tensor in the graph.
///
/// This is an index into the graph's tensor table and remains valid across
/// node removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub usize);

impl TensorId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

// ──────────────────────────────── Graph ──────────────────────────────────

/// An imported computation graph.
#[derive(Debug)]
pub struct Graph {
    /// The graph structure (nodes only, no edge data).
    graph: StableGraph<Node, ()>,

    /// Tensor side table.
    tensors: Vec<Tensor>,

    /// Lookup table: tensor name -> tensor ID.
    tensor_by_name: HashMap<String, TensorId>,

    /// Lookup table: tensor ID -> producing node ID.
    producer: HashMap<TensorId, NodeId>,

    /// Lookup table: tensor ID -> consuming node IDs.
    consumers: HashMap<TensorId, Vec<NodeId>>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            tensors: Vec::new(),
            tensor_by_name: HashMap::new(),
            producer: HashMap::new(),
            consumers: HashMap::new(),
        }
    }

    // ── Node access ──

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.graph
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))
    }

    /// Borrow a node mutably together with its input tensors.
    ///
    /// The input tensors are shared borrows; nothing else in the graph is
    /// reachable through the returned references.
    pub fn node_with_inputs_mut(&mut self, id: NodeId) -> Result<(&mut Node, Vec<&Tensor>)> {
        let Self { graph, tensors, .. } = self;

        let node = graph
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node {:?} not found", id)))?;

        let inputs = node
            .inputs
            .iter()
            .map(|tensor_id| {
                tensors.get(tensor_id.index()).ok_or_else(|| {
                    Error::InvalidGraph(format!("Tensor {:?} not found", tensor_id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((node, inputs))
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.graph
            .node_indices()
            .filter_map(|id| self.graph.node_weight(id).map(|node| (id, node)))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Find the first node with the given name.
    pub fn find_node_by_name(&self, name: &str) -> Result<NodeId> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
            .ok_or_else(|| Error::InvalidGraph(format!("Node '{}' not found", name)))
    }

    // ── Tensor access ──

    pub fn tensor(&self, id: TensorId) -> Result<&Tensor> {
        self.tensors
            .get(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Tensor {:?} not found", id)))
    }

    pub fn tensor_mut(&mut self, id: TensorId) -> Result<&mut Tensor> {
        self.tensors
            .get_mut(id.index())
            .ok_or_else(|| Error::InvalidGraph(format!("Tensor {:?} not found", id)))
    }

    pub fn tensor_by_name(&self, name: &str) -> Option<TensorId> {
        self.tensor_by_name.get(name).copied()
    }

    /// Iterate over all tensors in insertion order.
    pub fn tensors(&self) -> impl Iterator<Item = (TensorId, &Tensor)> {
        self.tensors
            .iter()
            .enumerate()
            .map(|(i, tensor)| (TensorId::new(i), tensor))
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Get the node that produces a tensor, if any.
    pub fn producer(&self, id: TensorId) -> Option<NodeId> {
        self.producer.get(&id).copied()
    }

    /// Get the nodes that consume a tensor.
    pub fn consumers(&self, id: TensorId) -> &[NodeId] {
        self.consumers.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    // ── Graph mutation ──

    /// Add a tensor and return its ID.
    ///
    /// Tensor names must be unique within the graph.
    pub fn add_tensor(&mut self, tensor: Tensor) -> Result<TensorId> {
        if self.tensor_by_name.contains_key(&tensor.name) {
            return Err(Error::InvalidGraph(format!(
                "Tensor '{}' already exists",
                tensor.name
            )));
        }

        let id = TensorId::new(self.tensors.len());
        self.tensor_by_name.insert(tensor.name.clone(), id);
        self.tensors.push(tensor);
        Ok(id)
    }

    /// Get a tensor by name, creating an unshaped one if it does not exist.
    pub fn ensure_tensor(&mut self, name: &str) -> TensorId {
        if let Some(id) = self.tensor_by_name(name) {
            return id;
        }

        let id = TensorId::new(self.tensors.len());
        self.tensor_by_name.insert(name.to_string(), id);
        self.tensors.push(Tensor::new(name));
        id
    }

    /// Add a node and return its ID.
    ///
    /// Fails if the node references an unknown tensor or claims an output
    /// that another node already produces.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        for &tensor_id in node.inputs.iter().chain(&node.outputs) {
            self.tensor(tensor_id)?;
        }

        for &output_id in &node.outputs {
            if let Some(&owner) = self.producer.get(&output_id) {
                return Err(Error::InvalidGraph(format!(
                    "Tensor '{}' is already produced by node {:?}",
                    self.tensors[output_id.index()].name,
                    owner
                )));
            }
        }

        let inputs = node.inputs.clone();
        let outputs = node.outputs.clone();
        let node_id = self.graph.add_node(node);

        for output_id in outputs {
            self.producer.insert(output_id, node_id);

            // Consumers added before their producer still need ordering edges
            for &consumer_id in self.consumers.get(&output_id).into_iter().flatten() {
                self.graph.add_edge(node_id, consumer_id, ());
            }
        }

        for input_id in inputs {
            self.consumers.entry(input_id).or_default().push(node_id);

            if let Some(&producer_id) = self.producer.get(&input_id) {
                self.graph.add_edge(producer_id, node_id, ());
            }
        }

        Ok(node_id)
    }

    /// Node IDs in an order where every producer precedes its consumers.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(id) = topo.next(&self.graph) {
            order.push(id);
        }

        order
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────── Node ───────────────────────────────────

/// A node in the graph: one operator with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Operator type (e.g., "Tensor.permute", "Permute").
    pub op_type: String,

    /// Node name.
    pub name: String,

    /// Input tensor IDs, in operand order.
    pub inputs: Vec<TensorId>,

    /// Output tensor IDs, in result order.
    pub outputs: Vec<TensorId>,

    /// Parameters keyed by name.
    pub params: BTreeMap<String, Parameter>,
}

impl Node {
    pub fn new(op_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, tensor_id: TensorId) -> Self {
        self.inputs.push(tensor_id);
        self
    }

    pub fn with_output(mut self, tensor_id: TensorId) -> Self {
        self.outputs.push(tensor_id);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set a parameter, replacing any previous value.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Parameter>) {
        self.params.insert(key.into(), value.into());
    }

    /// Get a parameter, failing if it is missing.
    pub fn param(&self, key: &str) -> Result<&Parameter> {
        lookup(&self.params, key)
    }
}

// ──────────────────────────────── Tensor ─────────────────────────────────

/// A tensor flowing between nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    /// Tensor name (unique within the graph).
    pub name: String,

    /// Declared shape. `None` or an empty list means the rank is unknown;
    /// a `-1` extent is a dimension of unknown size.
    pub shape: Option<Vec<i64>>,

    /// Axis the backend treats as the implicit batch dimension.
    pub batch_axis: Option<usize>,
}

impl Tensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: None,
            batch_axis: None,
        }
    }

    pub fn with_shape(mut self, shape: Vec<i64>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_batch_axis(mut self, axis: usize) -> Self {
        self.batch_axis = Some(axis);
        self
    }

    /// Declared rank, if known.
    pub fn rank(&self) -> Option<usize> {
        match &self.shape {
            Some(shape) if !shape.is_empty() => Some(shape.len()),
            _ => None,
        }
    }
}
