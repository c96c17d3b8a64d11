use gradgraph_array::{permutation, NDArrayMath, NdArray};

use crate::{
    error::Result,
    graph::{
        ops::Operation,
        tensor_array_map::{SummedTensorArrayMap, TensorArrayMap},
        Tensor,
    },
};

/// Reorders the axes of `x` into `y`.
///
/// Without a permutation the axes are reversed. The backward pass transposes
/// the incoming gradient by the inverse permutation, so `dx` always has the
/// shape of `x`.
pub struct Transpose {
    x_tensor: Tensor,
    y_tensor: Tensor,
    perm: Option<Vec<usize>>,
}

impl Transpose {
    pub fn new(x_tensor: Tensor, y_tensor: Tensor, perm: Option<Vec<usize>>) -> Self {
        Self {
            x_tensor,
            y_tensor,
            perm,
        }
    }

    pub fn perm(&self) -> Option<&[usize]> {
        self.perm.as_deref()
    }

    /// Reversal undoes itself, so `None` stays `None`.
    fn inverse_perm(&self, rank: usize) -> Result<Option<Vec<usize>>> {
        match self.perm() {
            Some(perm) => {
                permutation::validate(perm, rank)?;
                Ok(Some(permutation::inverse(perm)?))
            }
            None => Ok(None),
        }
    }
}

impl Operation for Transpose {
    fn feed_forward(&self, math: &NDArrayMath, inference: &mut TensorArrayMap) -> Result<()> {
        let x = inference.get(&self.x_tensor)?;
        let y = math.scope(|scope| -> Result<NdArray> {
            Ok(scope.keep(math.transpose(x, self.perm())?))
        })?;
        inference.set(&self.y_tensor, y);
        Ok(())
    }

    fn back_prop(
        &self,
        math: &NDArrayMath,
        _inference: &TensorArrayMap,
        gradients: &mut SummedTensorArrayMap,
    ) -> Result<()> {
        let dy = match gradients.try_get(&self.y_tensor) {
            Some(dy) => dy,
            None => return Ok(()),
        };
        let inverse = self.inverse_perm(dy.rank())?;
        let dx = math.scope(|scope| -> Result<NdArray> {
            Ok(scope.keep(math.transpose(dy, inverse.as_deref())?))
        })?;
        gradients.add(&self.x_tensor, dx, math)
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x_tensor.clone()]
    }

    fn output(&self) -> &Tensor {
        &self.y_tensor
    }

    fn name(&self) -> &'static str {
        "transpose"
    }
}

#[cfg(test)]
mod tests {
    use gradgraph_array::ArrayError;

    use super::*;
    use crate::{error::GraphError, graph::Graph};

    fn setup(shape: &[usize], perm: Option<Vec<usize>>) -> (Tensor, Tensor, Transpose) {
        let mut g = Graph::new();
        let x = g.placeholder("x", shape);
        let y = g.transpose(&x, perm.clone()).unwrap();
        let op = Transpose::new(x.clone(), y.clone(), perm);
        (x, y, op)
    }

    #[test]
    fn transpose() {
        let math = NDArrayMath::new();
        let (x_tensor, y_tensor, op) = setup(&[2, 3], None);
        let x = NdArray::new(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let dy = NdArray::new(&[3, 2], vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();

        let mut activations = TensorArrayMap::new();
        activations.set(&x_tensor, x.clone());
        op.feed_forward(&math, &mut activations).unwrap();

        let y = activations.get(&y_tensor).unwrap();
        assert_eq!(y.shape(), &[3, 2]);
        assert_eq!(y, &dy);

        let mut gradients = SummedTensorArrayMap::new();
        gradients.add(&y_tensor, dy, &math).unwrap();
        op.back_prop(&math, &activations, &mut gradients).unwrap();

        let dx = gradients.get(&x_tensor).unwrap();
        assert_eq!(dx.shape(), &[2, 3]);
        assert_eq!(dx, &x);
    }

    #[test]
    fn rotation_routes_gradient_through_inverse() {
        let math = NDArrayMath::new();
        let (x_tensor, y_tensor, op) = setup(&[2, 3, 4], Some(vec![1, 2, 0]));
        assert_eq!(y_tensor.shape(), &[3, 4, 2]);

        let mut activations = TensorArrayMap::new();
        let x = NdArray::new(&[2, 3, 4], (0..24).map(|v| v as f32).collect()).unwrap();
        activations.set(&x_tensor, x.clone());
        op.feed_forward(&math, &mut activations).unwrap();

        // feeding y back as dy must reproduce x exactly
        let dy = activations.get(&y_tensor).unwrap().clone();
        let mut gradients = SummedTensorArrayMap::new();
        gradients.add(&y_tensor, dy, &math).unwrap();
        op.back_prop(&math, &activations, &mut gradients).unwrap();
        assert_eq!(gradients.get(&x_tensor).unwrap(), &x);
    }

    #[test]
    fn gradient_is_added_to_existing() {
        let math = NDArrayMath::new();
        let (x_tensor, y_tensor, op) = setup(&[2, 2], None);
        let mut activations = TensorArrayMap::new();
        activations.set(&x_tensor, NdArray::zeros(&[2, 2]));

        let mut gradients = SummedTensorArrayMap::new();
        gradients.add(&x_tensor, NdArray::ones(&[2, 2]), &math).unwrap();
        gradients
            .add(&y_tensor, NdArray::new(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap(), &math)
            .unwrap();
        op.back_prop(&math, &activations, &mut gradients).unwrap();
        assert_eq!(
            gradients.get(&x_tensor).unwrap().values(),
            vec![2.0, 4.0, 3.0, 5.0]
        );
    }

    #[test]
    fn no_gradient_no_op() {
        let math = NDArrayMath::new();
        let (x_tensor, _, op) = setup(&[2, 2], None);
        let activations = TensorArrayMap::new();
        let mut gradients = SummedTensorArrayMap::new();
        op.back_prop(&math, &activations, &mut gradients).unwrap();
        assert!(!gradients.has(&x_tensor));
    }

    fn back_prop_with(perm: Vec<usize>) -> (Result<()>, bool) {
        let math = NDArrayMath::new();
        let mut g = Graph::new();
        let x_tensor = g.placeholder("x", &[2, 2]);
        let y_tensor = g.transpose(&x_tensor, None).unwrap();
        let op = Transpose::new(x_tensor.clone(), y_tensor.clone(), Some(perm));

        let activations = TensorArrayMap::new();
        let mut gradients = SummedTensorArrayMap::new();
        let dy = NdArray::new(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        gradients.add(&y_tensor, dy, &math).unwrap();
        let result = op.back_prop(&math, &activations, &mut gradients);
        (result, gradients.has(&x_tensor))
    }

    #[test]
    fn back_prop_rejects_invalid_permutations() {
        for perm in [vec![5, 0], vec![0, 0], vec![0]] {
            let (result, has_dx) = back_prop_with(perm);
            assert!(matches!(
                result,
                Err(GraphError::Array(ArrayError::InvalidPermutation { .. }))
            ));
            assert!(!has_dx);
        }
    }

    #[test]
    fn feed_forward_rejects_invalid_permutation() {
        let math = NDArrayMath::new();
        let mut g = Graph::new();
        let x_tensor = g.placeholder("x", &[2, 2]);
        let y_tensor = g.transpose(&x_tensor, None).unwrap();
        let op = Transpose::new(x_tensor.clone(), y_tensor, Some(vec![1, 1]));
        let mut activations = TensorArrayMap::new();
        activations.set(&x_tensor, NdArray::ones(&[2, 2]));
        assert!(op.feed_forward(&math, &mut activations).is_err());
    }

    #[test]
    fn scopes_are_balanced() {
        let math = NDArrayMath::new();
        let (x_tensor, _, op) = setup(&[3, 1], None);
        let mut activations = TensorArrayMap::new();
        activations.set(&x_tensor, NdArray::ones(&[3, 1]));
        op.feed_forward(&math, &mut activations).unwrap();
        let memory = math.memory();
        assert_eq!(memory.scopes, 0);
        assert_eq!(memory.tracked, 0);
        assert_eq!(memory.disposed, 0);
    }
}
