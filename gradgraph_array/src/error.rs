use thiserror::Error;

/// Errors raised by array construction and array math.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    #[error("shape mismatch in '{operation}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        operation: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("invalid permutation {perm:?} for an array of rank {rank}")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    #[error("'{operation}' expects rank {expected}, got rank {got}")]
    RankMismatch {
        operation: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("index {index:?} is out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),
}

impl ArrayError {
    pub(crate) fn shape_mismatch(
        operation: &'static str,
        expected: &[usize],
        got: &[usize],
    ) -> Self {
        ArrayError::ShapeMismatch {
            operation,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArrayError>;
