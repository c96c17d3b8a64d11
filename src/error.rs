use gradgraph_array::ArrayError;
use thiserror::Error;

use crate::graph::TensorId;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error("shape mismatch in '{operation}': {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        operation: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    #[error("no array is stored for tensor {0}")]
    MissingArray(TensorId),

    #[error("placeholder '{name}' ({id}) was not fed")]
    MissingFeed { name: String, id: TensorId },

    #[error("feed for '{name}' has shape {got:?}, expected {expected:?}")]
    FeedShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("tensor {0} does not belong to this graph")]
    UnknownTensor(TensorId),

    #[error("tensor {id} is a {kind}, expected a {expected}")]
    WrongNodeKind {
        id: TensorId,
        kind: &'static str,
        expected: &'static str,
    },

    #[error("no placeholder is named '{0}'")]
    UnknownPlaceholder(String),
}

impl GraphError {
    pub(crate) fn shape_mismatch(operation: &'static str, lhs: &[usize], rhs: &[usize]) -> Self {
        GraphError::ShapeMismatch {
            operation,
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
