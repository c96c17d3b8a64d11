//! Static computational graphs.
//!
//! A [`Graph`] is built once from variables, placeholders, constants and
//! operations, and then run any number of times by a [`crate::session::Session`].
//! Node ids are assigned in insertion order, and an operation can only take
//! tensors that already exist, so the node list is always topologically sorted.

use std::fmt;

use gradgraph_array::{permutation, NdArray};
use itertools::Itertools;

use crate::error::{GraphError, Result};

use self::ops::{Add, MatMul, Multiply, Operation, ReduceSum, Subtract, Transpose};

pub mod graph_util;
pub mod ops;
pub mod tensor_array_map;

/// Position of a node in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A symbolic handle to the value a node produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tensor {
    id: TensorId,
    shape: Vec<usize>,
}

impl Tensor {
    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.id, self.shape.iter().join("x"))
    }
}

pub enum NodeKind {
    /// A value owned by the graph that training can update.
    Variable(NdArray),
    /// A value supplied with every run.
    Placeholder,
    Constant(NdArray),
    Op(Box<dyn Operation>),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Variable(_) => "variable",
            NodeKind::Placeholder => "placeholder",
            NodeKind::Constant(_) => "constant",
            NodeKind::Op(op) => op.name(),
        }
    }
}

pub struct Node {
    name: String,
    output: Tensor,
    kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> &Tensor {
        &self.output
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Tensors this node reads. Empty for everything but operations.
    pub fn inputs(&self) -> Vec<Tensor> {
        match &self.kind {
            NodeKind::Op(op) => op.inputs(),
            _ => Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, tensor: &Tensor) -> Result<&Node> {
        self.node_by_id(tensor.id)
    }

    pub fn node_by_id(&self, id: TensorId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownTensor(id))
    }

    pub(crate) fn node_mut(&mut self, tensor: &Tensor) -> Result<&mut Node> {
        self.nodes
            .get_mut(tensor.id.0)
            .ok_or(GraphError::UnknownTensor(tensor.id))
    }

    /// Output tensors of every variable, in creation order.
    pub fn variables(&self) -> Vec<Tensor> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Variable(_)))
            .map(|node| node.output.clone())
            .collect()
    }

    pub fn placeholder_by_name(&self, name: &str) -> Result<Tensor> {
        self.nodes
            .iter()
            .find(|node| node.name == name && matches!(node.kind, NodeKind::Placeholder))
            .map(|node| node.output.clone())
            .ok_or_else(|| GraphError::UnknownPlaceholder(name.to_string()))
    }

    fn next_tensor(&self, shape: Vec<usize>) -> Tensor {
        Tensor {
            id: TensorId(self.nodes.len()),
            shape,
        }
    }

    fn push(&mut self, name: impl Into<String>, output: Tensor, kind: NodeKind) -> Tensor {
        log::trace!("adding {} node {}", kind.label(), output);
        self.nodes.push(Node {
            name: name.into(),
            output: output.clone(),
            kind,
        });
        output
    }

    /// Fails unless `tensor` was produced by this graph.
    pub(crate) fn check(&self, tensor: &Tensor) -> Result<()> {
        match self.nodes.get(tensor.id.0) {
            Some(node) if node.output == *tensor => Ok(()),
            _ => Err(GraphError::UnknownTensor(tensor.id)),
        }
    }

    pub fn variable(&mut self, name: impl Into<String>, data: NdArray) -> Tensor {
        let output = self.next_tensor(data.shape().to_vec());
        self.push(name, output, NodeKind::Variable(data))
    }

    pub fn placeholder(&mut self, name: impl Into<String>, shape: &[usize]) -> Tensor {
        let output = self.next_tensor(shape.to_vec());
        self.push(name, output, NodeKind::Placeholder)
    }

    pub fn constant(&mut self, data: NdArray) -> Tensor {
        let output = self.next_tensor(data.shape().to_vec());
        let name = format!("constant_{}", output.id.0);
        self.push(name, output, NodeKind::Constant(data))
    }

    /// Reorder the axes of `x`. Without `perm` the axes are reversed.
    pub fn transpose(&mut self, x: &Tensor, perm: Option<Vec<usize>>) -> Result<Tensor> {
        self.check(x)?;
        let resolved = permutation::resolve(perm.as_deref(), x.rank())?;
        let y = self.next_tensor(permutation::permute_shape(x.shape(), &resolved)?);
        let op = Transpose::new(x.clone(), y.clone(), perm);
        Ok(self.push("transpose", y, NodeKind::Op(Box::new(op))))
    }

    pub fn add(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape("add", a, b)?;
        let y = self.next_tensor(shape);
        let op = Add::new(a.clone(), b.clone(), y.clone());
        Ok(self.push("add", y, NodeKind::Op(Box::new(op))))
    }

    pub fn subtract(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape("subtract", a, b)?;
        let y = self.next_tensor(shape);
        let op = Subtract::new(a.clone(), b.clone(), y.clone());
        Ok(self.push("subtract", y, NodeKind::Op(Box::new(op))))
    }

    /// Elementwise product.
    pub fn multiply(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let shape = self.elementwise_shape("multiply", a, b)?;
        let y = self.next_tensor(shape);
        let op = Multiply::new(a.clone(), b.clone(), y.clone());
        Ok(self.push("multiply", y, NodeKind::Op(Box::new(op))))
    }

    pub fn matmul(&mut self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.check(a)?;
        self.check(b)?;
        if a.rank() != 2 || b.rank() != 2 || a.shape[1] != b.shape[0] {
            return Err(GraphError::shape_mismatch("matmul", a.shape(), b.shape()));
        }
        let y = self.next_tensor(vec![a.shape[0], b.shape[1]]);
        let op = MatMul::new(a.clone(), b.clone(), y.clone());
        Ok(self.push("matmul", y, NodeKind::Op(Box::new(op))))
    }

    /// Sum of every element of `x`, as a scalar.
    pub fn reduce_sum(&mut self, x: &Tensor) -> Result<Tensor> {
        self.check(x)?;
        let y = self.next_tensor(Vec::new());
        let op = ReduceSum::new(x.clone(), y.clone());
        Ok(self.push("reduce_sum", y, NodeKind::Op(Box::new(op))))
    }

    /// Both shapes must match, unless one side is a scalar.
    fn elementwise_shape(
        &self,
        operation: &'static str,
        a: &Tensor,
        b: &Tensor,
    ) -> Result<Vec<usize>> {
        self.check(a)?;
        self.check(b)?;
        if a.shape == b.shape || b.rank() == 0 {
            Ok(a.shape.clone())
        } else if a.rank() == 0 {
            Ok(b.shape.clone())
        } else {
            Err(GraphError::shape_mismatch(operation, a.shape(), b.shape()))
        }
    }
}
