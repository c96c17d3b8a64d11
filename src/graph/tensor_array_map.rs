use std::collections::HashMap;

use gradgraph_array::{NDArrayMath, NdArray};

use crate::{
    error::{GraphError, Result},
    graph::{Tensor, TensorId},
};

/// Concrete arrays for the tensors of one graph run.
#[derive(Default)]
pub struct TensorArrayMap {
    arrays: HashMap<TensorId, NdArray>,
}

impl TensorArrayMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `array` for `tensor`, replacing any previous value.
    pub fn set(&mut self, tensor: &Tensor, array: NdArray) {
        self.arrays.insert(tensor.id(), array);
    }

    pub fn get(&self, tensor: &Tensor) -> Result<&NdArray> {
        self.try_get(tensor)
            .ok_or(GraphError::MissingArray(tensor.id()))
    }

    pub fn try_get(&self, tensor: &Tensor) -> Option<&NdArray> {
        self.arrays.get(&tensor.id())
    }

    pub fn has(&self, tensor: &Tensor) -> bool {
        self.arrays.contains_key(&tensor.id())
    }

    /// Remove and return the array stored for `tensor`.
    pub fn delete(&mut self, tensor: &Tensor) -> Option<NdArray> {
        self.arrays.remove(&tensor.id())
    }

    /// Drop the array stored for `tensor`, if any.
    pub fn dispose_array(&mut self, tensor: &Tensor) {
        if self.arrays.remove(&tensor.id()).is_some() {
            log::trace!("disposed array of {}", tensor);
        }
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Gradient storage: adding to a tensor sums with what is already there.
#[derive(Default)]
pub struct SummedTensorArrayMap {
    inner: TensorArrayMap,
}

impl SummedTensorArrayMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `array` into the gradient of `tensor`.
    ///
    /// The array must have the tensor's shape.
    pub fn add(&mut self, tensor: &Tensor, array: NdArray, math: &NDArrayMath) -> Result<()> {
        if array.shape() != tensor.shape() {
            return Err(GraphError::shape_mismatch(
                "accumulate gradient",
                tensor.shape(),
                array.shape(),
            ));
        }
        let summed = match self.inner.try_get(tensor) {
            Some(existing) => math.add(existing, &array)?,
            None => array,
        };
        self.inner.set(tensor, summed);
        Ok(())
    }

    pub fn get(&self, tensor: &Tensor) -> Result<&NdArray> {
        self.inner.get(tensor)
    }

    pub fn try_get(&self, tensor: &Tensor) -> Option<&NdArray> {
        self.inner.try_get(tensor)
    }

    pub fn has(&self, tensor: &Tensor) -> bool {
        self.inner.has(tensor)
    }

    /// Remove and return the accumulated gradient of `tensor`.
    pub fn delete(&mut self, tensor: &Tensor) -> Option<NdArray> {
        self.inner.delete(tensor)
    }

    pub fn dispose_array(&mut self, tensor: &Tensor) {
        self.inner.dispose_array(tensor)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn get_missing_tensor_fails() {
        let mut g = Graph::new();
        let x = g.placeholder("x", &[2]);
        let mut map = TensorArrayMap::new();
        assert!(matches!(map.get(&x), Err(GraphError::MissingArray(_))));

        map.set(&x, NdArray::ones(&[2]));
        assert!(map.has(&x));
        assert_eq!(map.len(), 1);
        map.dispose_array(&x);
        assert!(!map.has(&x));
        assert!(map.is_empty());
    }

    #[test]
    fn summed_map_accumulates() {
        let math = NDArrayMath::new();
        let mut g = Graph::new();
        let x = g.placeholder("x", &[2]);
        let mut grads = SummedTensorArrayMap::new();

        grads.add(&x, NdArray::new(&[2], vec![1.0, 2.0]).unwrap(), &math).unwrap();
        grads.add(&x, NdArray::new(&[2], vec![10.0, 20.0]).unwrap(), &math).unwrap();
        assert_eq!(grads.get(&x).unwrap().values(), vec![11.0, 22.0]);

        // accumulation starts over once the gradient is taken out
        let taken = grads.delete(&x).unwrap();
        assert_eq!(taken.values(), vec![11.0, 22.0]);
        assert!(grads.delete(&x).is_none());
        grads.add(&x, NdArray::ones(&[2]), &math).unwrap();
        assert_eq!(grads.get(&x).unwrap().values(), vec![1.0, 1.0]);
    }

    #[test]
    fn summed_map_rejects_wrong_shape() {
        let math = NDArrayMath::new();
        let mut g = Graph::new();
        let x = g.placeholder("x", &[2, 3]);
        let mut grads = SummedTensorArrayMap::new();
        let err = grads.add(&x, NdArray::ones(&[3, 2]), &math).unwrap_err();
        assert!(matches!(err, GraphError::ShapeMismatch { .. }));
        assert!(!grads.has(&x));
    }
}
