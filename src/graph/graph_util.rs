use std::collections::HashSet;

use crate::{
    error::Result,
    graph::{Graph, Tensor, TensorId},
};

/// Nodes needed to compute `targets`, in an order where every node comes
/// after its inputs.
pub fn ordered_evaluation_set(graph: &Graph, targets: &[Tensor]) -> Result<Vec<TensorId>> {
    let mut needed = HashSet::new();
    let mut stack = Vec::with_capacity(targets.len());
    for target in targets {
        graph.check(target)?;
        stack.push(target.id());
    }

    while let Some(id) = stack.pop() {
        if !needed.insert(id) {
            continue;
        }
        for input in graph.node_by_id(id)?.inputs() {
            if !needed.contains(&input.id()) {
                stack.push(input.id());
            }
        }
    }

    // ids are handed out in insertion order, which is already topological
    let mut order: Vec<TensorId> = needed.into_iter().collect();
    order.sort_unstable();
    Ok(order)
}
