//! Runs a [`Graph`]: forward evaluation, back propagation and plain SGD updates.

use std::collections::HashMap;

use derive_builder::Builder;
use gradgraph_array::{NDArrayMath, NdArray};

use crate::{
    error::{GraphError, Result},
    graph::{
        graph_util,
        tensor_array_map::{SummedTensorArrayMap, TensorArrayMap},
        Graph, NodeKind, Tensor, TensorId,
    },
};

#[derive(Builder, Debug, Clone)]
#[builder(pattern = "owned")]
pub struct SessionConfig {
    /// Reject feeds whose shape differs from their placeholder.
    #[builder(default = "true")]
    validate_feeds: bool,
    /// Every element of the cost gradient is seeded with this value.
    #[builder(default = "1.0")]
    gradient_seed: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validate_feeds: true,
            gradient_seed: 1.0,
        }
    }
}

/// A value for one placeholder.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub tensor: Tensor,
    pub data: NdArray,
}

impl FeedEntry {
    pub fn new(tensor: Tensor, data: NdArray) -> Self {
        Self { tensor, data }
    }
}

pub struct Session {
    graph: Graph,
    math: NDArrayMath,
    config: SessionConfig,
}

impl Session {
    pub fn new(graph: Graph, math: NDArrayMath) -> Self {
        Self::with_config(graph, math, SessionConfig::default())
    }

    pub fn with_config(graph: Graph, math: NDArrayMath, config: SessionConfig) -> Self {
        Self {
            graph,
            math,
            config,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn math(&self) -> &NDArrayMath {
        &self.math
    }

    /// Compute the values of `targets`.
    pub fn eval(&self, targets: &[Tensor], feeds: &[FeedEntry]) -> Result<Vec<NdArray>> {
        let order = graph_util::ordered_evaluation_set(&self.graph, targets)?;
        let inference = self.forward(&order, feeds)?;
        targets
            .iter()
            .map(|target| inference.get(target).cloned())
            .collect()
    }

    /// Gradients of `cost` with respect to each tensor of `wrt`.
    ///
    /// A tensor that `cost` does not depend on gets a zero gradient.
    pub fn gradients(
        &self,
        cost: &Tensor,
        wrt: &[Tensor],
        feeds: &[FeedEntry],
    ) -> Result<Vec<NdArray>> {
        let (_, gradients) = self.backward(cost, feeds)?;
        Ok(wrt
            .iter()
            .map(|tensor| match gradients.try_get(tensor) {
                Some(grad) => grad.clone(),
                None => NdArray::zeros(tensor.shape()),
            })
            .collect())
    }

    /// Take one gradient descent step on every variable and return the cost
    /// before the update.
    pub fn sgd_step(
        &mut self,
        cost: &Tensor,
        feeds: &[FeedEntry],
        learning_rate: f32,
    ) -> Result<NdArray> {
        let (inference, gradients) = self.backward(cost, feeds)?;
        let cost_value = inference.get(cost)?.clone();
        let step = NdArray::scalar(-learning_rate);

        let mut updates = Vec::new();
        for variable in self.graph.variables() {
            let grad = match gradients.try_get(&variable) {
                Some(grad) => grad,
                None => continue,
            };
            let current = self.variable_value(&variable)?;
            let updated = self.math.scope(|scope| -> Result<NdArray> {
                let delta = self.math.scalar_times_array(&step, grad)?;
                Ok(scope.keep(self.math.add(current, &delta)?))
            })?;
            updates.push((variable, updated));
        }
        for (variable, updated) in updates {
            self.set_variable(&variable, updated)?;
        }
        log::debug!("sgd step with learning rate {}", learning_rate);
        Ok(cost_value)
    }

    pub fn variable_value(&self, tensor: &Tensor) -> Result<&NdArray> {
        match self.graph.node(tensor)?.kind() {
            NodeKind::Variable(data) => Ok(data),
            other => Err(GraphError::WrongNodeKind {
                id: tensor.id(),
                kind: other.label(),
                expected: "variable",
            }),
        }
    }

    pub fn set_variable(&mut self, tensor: &Tensor, value: NdArray) -> Result<()> {
        if value.shape() != tensor.shape() {
            return Err(GraphError::shape_mismatch(
                "set_variable",
                tensor.shape(),
                value.shape(),
            ));
        }
        let node = self.graph.node_mut(tensor)?;
        match node.kind_mut() {
            NodeKind::Variable(data) => {
                *data = value;
                Ok(())
            }
            other => Err(GraphError::WrongNodeKind {
                id: tensor.id(),
                kind: other.label(),
                expected: "variable",
            }),
        }
    }

    fn backward(
        &self,
        cost: &Tensor,
        feeds: &[FeedEntry],
    ) -> Result<(TensorArrayMap, SummedTensorArrayMap)> {
        let order = graph_util::ordered_evaluation_set(&self.graph, std::slice::from_ref(cost))?;
        let inference = self.forward(&order, feeds)?;

        let mut gradients = SummedTensorArrayMap::new();
        let seed = self.math.scalar_times_array(
            &NdArray::scalar(self.config.gradient_seed),
            &NdArray::ones(cost.shape()),
        )?;
        gradients.add(cost, seed, &self.math)?;

        for &id in order.iter().rev() {
            if let NodeKind::Op(op) = self.graph.node_by_id(id)?.kind() {
                op.back_prop(&self.math, &inference, &mut gradients)?;
            }
        }
        log::debug!(
            "back propagated {} from {} nodes, {} gradients",
            cost,
            order.len(),
            gradients.len()
        );
        Ok((inference, gradients))
    }

    fn forward(&self, order: &[TensorId], feeds: &[FeedEntry]) -> Result<TensorArrayMap> {
        let feeds = self.check_feeds(feeds)?;
        let mut inference = TensorArrayMap::new();

        for &id in order {
            let node = self.graph.node_by_id(id)?;
            match node.kind() {
                NodeKind::Variable(data) | NodeKind::Constant(data) => {
                    inference.set(node.output(), data.clone());
                }
                NodeKind::Placeholder => match feeds.get(&id) {
                    Some(data) => inference.set(node.output(), (*data).clone()),
                    None => {
                        return Err(GraphError::MissingFeed {
                            name: node.name().to_string(),
                            id,
                        })
                    }
                },
                NodeKind::Op(op) => op.feed_forward(&self.math, &mut inference)?,
            }
        }
        log::debug!("evaluated {} nodes", order.len());
        Ok(inference)
    }

    fn check_feeds<'a>(&self, feeds: &'a [FeedEntry]) -> Result<HashMap<TensorId, &'a NdArray>> {
        let mut checked = HashMap::with_capacity(feeds.len());
        for feed in feeds {
            self.graph.check(&feed.tensor)?;
            let node = self.graph.node(&feed.tensor)?;
            if !matches!(node.kind(), NodeKind::Placeholder) {
                return Err(GraphError::WrongNodeKind {
                    id: feed.tensor.id(),
                    kind: node.kind().label(),
                    expected: "placeholder",
                });
            }
            let expected = node.output().shape();
            if self.config.validate_feeds && feed.data.shape() != expected {
                return Err(GraphError::FeedShapeMismatch {
                    name: node.name().to_string(),
                    expected: expected.to_vec(),
                    got: feed.data.shape().to_vec(),
                });
            }
            checked.insert(feed.tensor.id(), &feed.data);
        }
        Ok(checked)
    }
}
