//! Static computational graphs with reverse-mode differentiation.
//!
//! Build a [`graph::Graph`] out of variables, placeholders and operations, then
//! evaluate it or take gradients with a [`session::Session`].

pub mod error;
pub mod graph;
pub mod io;
pub mod session;
pub mod util;

pub use error::{GraphError, Result};
pub use gradgraph_array::{ndarray, permutation, ArrayError, MemoryInfo, NDArrayMath, NdArray};
pub use graph::{Graph, Tensor};
pub use session::{FeedEntry, Session, SessionConfig, SessionConfigBuilder};
