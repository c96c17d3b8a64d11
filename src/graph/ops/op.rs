use gradgraph_array::NDArrayMath;

use crate::{
    error::Result,
    graph::{
        tensor_array_map::{SummedTensorArrayMap, TensorArrayMap},
        Tensor,
    },
};

/// A differentiable node of a [`crate::graph::Graph`].
pub trait Operation: Send + Sync {
    /// Compute the output from the inputs stored in `inference`, and store it there.
    fn feed_forward(&self, math: &NDArrayMath, inference: &mut TensorArrayMap) -> Result<()>;

    /// Accumulate the gradients of the inputs from the gradient of the output.
    ///
    /// If nothing has reached the output's gradient yet, this does nothing.
    fn back_prop(
        &self,
        math: &NDArrayMath,
        inference: &TensorArrayMap,
        gradients: &mut SummedTensorArrayMap,
    ) -> Result<()>;

    fn inputs(&self) -> Vec<Tensor>;

    fn output(&self) -> &Tensor;

    fn name(&self) -> &'static str;
}
