use gradgraph_array::{NDArrayMath, NdArray};

use crate::{
    error::Result,
    graph::{
        ops::Operation,
        tensor_array_map::{SummedTensorArrayMap, TensorArrayMap},
        Tensor,
    },
};

/// Sums every element of `x` into a scalar `y`.
pub struct ReduceSum {
    x: Tensor,
    y: Tensor,
}

impl ReduceSum {
    pub fn new(x: Tensor, y: Tensor) -> Self {
        Self { x, y }
    }
}

impl Operation for ReduceSum {
    fn feed_forward(&self, math: &NDArrayMath, inference: &mut TensorArrayMap) -> Result<()> {
        let x = inference.get(&self.x)?;
        let y = math.scope(|scope| scope.keep(math.sum(x)));
        inference.set(&self.y, y);
        Ok(())
    }

    fn back_prop(
        &self,
        math: &NDArrayMath,
        _inference: &TensorArrayMap,
        gradients: &mut SummedTensorArrayMap,
    ) -> Result<()> {
        let dx = match gradients.try_get(&self.y) {
            Some(dy) => math.scope(|scope| -> Result<NdArray> {
                let ones = math.ones(self.x.shape());
                Ok(scope.keep(math.scalar_times_array(dy, &ones)?))
            })?,
            None => return Ok(()),
        };
        gradients.add(&self.x, dx, math)
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone()]
    }

    fn output(&self) -> &Tensor {
        &self.y
    }

    fn name(&self) -> &'static str {
        "reduce_sum"
    }
}
