use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, Result};

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one allocation. Every construction, including `clone`, gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

impl ArrayId {
    fn next() -> Self {
        ArrayId(NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An owned, row-major `f32` array.
///
/// Serializes as `{ "shape": [..], "values": [..] }`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "RawArray", into = "RawArray")]
pub struct NdArray {
    id: ArrayId,
    data: ArrayD<f32>,
}

#[derive(Serialize, Deserialize)]
struct RawArray {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl TryFrom<RawArray> for NdArray {
    type Error = ArrayError;

    fn try_from(raw: RawArray) -> Result<Self> {
        NdArray::new(&raw.shape, raw.values)
    }
}

impl From<NdArray> for RawArray {
    fn from(array: NdArray) -> Self {
        RawArray {
            shape: array.shape().to_vec(),
            values: array.values(),
        }
    }
}

impl Clone for NdArray {
    /// Deep copy the array. The copy is a separate allocation with its own id.
    fn clone(&self) -> Self {
        Self::from_array(self.data.clone())
    }
}

impl PartialEq for NdArray {
    /// Two arrays are equal if they have the same shape and values; ids are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl From<ArrayD<f32>> for NdArray {
    fn from(data: ArrayD<f32>) -> Self {
        Self::from_array(data)
    }
}

impl NdArray {
    /// Build an array from row-major `values`.
    pub fn new(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(ArrayError::shape_mismatch(
                "NdArray::new",
                shape,
                &[values.len()],
            ));
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| ArrayError::shape_mismatch("NdArray::new", shape, &[expected]))?;
        Ok(Self::from_array(data))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::zeros(IxDyn(shape)))
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::ones(IxDyn(shape)))
    }

    /// A rank-0 array holding `value`.
    pub fn scalar(value: f32) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Wrap an `ndarray` array, copying it into standard layout if needed.
    pub fn from_array(data: ArrayD<f32>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self {
            id: ArrayId::next(),
            data,
        }
    }

    /// Sample every element from `N(mean, stddev^2)`.
    pub fn random_normal<R: Rng + ?Sized>(
        shape: &[usize],
        mean: f32,
        stddev: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let normal = Normal::new(mean, stddev)
            .map_err(|e| ArrayError::InvalidDistribution(e.to_string()))?;
        let len = shape.iter().product();
        let values = (0..len).map(|_| normal.sample(rng)).collect();
        Self::new(shape, values)
    }

    pub fn id(&self) -> ArrayId {
        self.id
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The elements in row-major order.
    pub fn values(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    pub fn get(&self, index: &[usize]) -> Result<f32> {
        self.data
            .get(IxDyn(index))
            .copied()
            .ok_or_else(|| ArrayError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape().to_vec(),
            })
    }

    /// The value of a single-element array.
    pub fn as_scalar(&self) -> Result<f32> {
        if self.size() != 1 {
            return Err(ArrayError::shape_mismatch("as_scalar", &[], self.shape()));
        }
        Ok(self.data.iter().next().copied().unwrap_or_default())
    }

    pub fn as_array(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn into_array(self) -> ArrayD<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use more_asserts::{assert_gt, assert_lt};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn rejects_wrong_value_count() {
        assert!(NdArray::new(&[2, 3], vec![1.0; 5]).is_err());
        let a = NdArray::new(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a.get(&[1, 0]).unwrap(), 4.0);
        assert!(a.get(&[2, 0]).is_err());
    }

    #[test]
    fn clone_is_a_new_allocation() {
        let a = NdArray::ones(&[2]);
        let b = a.clone();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn non_standard_layout_is_normalized() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .reversed_axes();
        let a = NdArray::from_array(data);
        assert!(a.as_array().is_standard_layout());
        assert_eq!(a.values(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn json_form() {
        let a = NdArray::new(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"shape":[2,2],"values":[1.0,2.0,3.0,4.0]}"#);
        let back: NdArray = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<NdArray>(r#"{"shape":[3],"values":[1.0]}"#).is_err());
    }

    #[test]
    fn random_normal_has_requested_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = NdArray::random_normal(&[3, 4], 0.0, 1.0, &mut rng).unwrap();
        assert_eq!(a.shape(), &[3, 4]);
        assert!(NdArray::random_normal(&[1], 0.0, -1.0, &mut rng).is_err());
    }

    #[test]
    fn random_normal_sample_statistics() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = NdArray::random_normal(&[100, 100], 3.0, 0.5, &mut rng).unwrap();
        let values = a.values();
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        assert_lt!((mean - 3.0).abs(), 0.05);
        assert_lt!((var.sqrt() - 0.5).abs(), 0.05);
        assert_gt!(values.iter().cloned().fold(f32::MIN, f32::max), 3.0);
    }
}
