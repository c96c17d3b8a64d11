//! Graph operations.

/// Declare a two-input operation.
///
/// `$forward` computes the output from `$a` and `$b`. `$backward_to_a` and
/// `$backward_to_b` compute the input gradients from `$dy`. All three run inside
/// a math scope and may use `?`.
macro_rules! binary_op {
    ($op_name:ident, $label:literal, $math:ident, $a:ident, $b:ident, $dy:ident,
        $forward:expr, $backward_to_a:expr, $backward_to_b:expr) => {
        pub struct $op_name {
            a: $crate::graph::Tensor,
            b: $crate::graph::Tensor,
            y: $crate::graph::Tensor,
        }

        impl $op_name {
            pub fn new(
                a: $crate::graph::Tensor,
                b: $crate::graph::Tensor,
                y: $crate::graph::Tensor,
            ) -> Self {
                Self { a, b, y }
            }
        }

        impl $crate::graph::ops::Operation for $op_name {
            fn feed_forward(
                &self,
                $math: &gradgraph_array::NDArrayMath,
                inference: &mut $crate::graph::tensor_array_map::TensorArrayMap,
            ) -> $crate::error::Result<()> {
                let result = {
                    let $a = inference.get(&self.a)?;
                    let $b = inference.get(&self.b)?;
                    $math.scope(|scope| -> $crate::error::Result<gradgraph_array::NdArray> {
                        let result = $forward;
                        Ok(scope.keep(result))
                    })?
                };
                inference.set(&self.y, result);
                Ok(())
            }

            fn back_prop(
                &self,
                $math: &gradgraph_array::NDArrayMath,
                inference: &$crate::graph::tensor_array_map::TensorArrayMap,
                gradients: &mut $crate::graph::tensor_array_map::SummedTensorArrayMap,
            ) -> $crate::error::Result<()> {
                let (da, db) = {
                    let $dy = match gradients.try_get(&self.y) {
                        Some(dy) => dy,
                        None => return Ok(()),
                    };
                    #[allow(unused_variables)]
                    let $a = inference.get(&self.a)?;
                    #[allow(unused_variables)]
                    let $b = inference.get(&self.b)?;
                    type Grads = (gradgraph_array::NdArray, gradgraph_array::NdArray);
                    $math.scope(|scope| -> $crate::error::Result<Grads> {
                        use $crate::graph::ops::reduce_to_shape;
                        let da = reduce_to_shape($math, $backward_to_a, &self.a);
                        let db = reduce_to_shape($math, $backward_to_b, &self.b);
                        Ok((scope.keep(da), scope.keep(db)))
                    })?
                };
                gradients.add(&self.a, da, $math)?;
                gradients.add(&self.b, db, $math)?;
                Ok(())
            }

            fn inputs(&self) -> Vec<$crate::graph::Tensor> {
                vec![self.a.clone(), self.b.clone()]
            }

            fn output(&self) -> &$crate::graph::Tensor {
                &self.y
            }

            fn name(&self) -> &'static str {
                $label
            }
        }
    };
}

/// Sum a gradient back down to a scalar input that was broadcast in the forward pass.
pub(crate) fn reduce_to_shape(
    math: &gradgraph_array::NDArrayMath,
    grad: gradgraph_array::NdArray,
    target: &crate::graph::Tensor,
) -> gradgraph_array::NdArray {
    if target.rank() == 0 && grad.rank() != 0 {
        math.sum(&grad)
    } else {
        grad
    }
}

mod element_wise;
mod matmul;
mod op;
mod reduce_sum;
mod transpose;

pub use element_wise::{Add, Multiply, Subtract};
pub use matmul::MatMul;
pub use op::Operation;
pub use reduce_sum::ReduceSum;
pub use transpose::Transpose;
