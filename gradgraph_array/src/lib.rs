//! N-dimensional `f32` arrays and the CPU math backend behind `gradgraph`.

pub mod error;
pub mod math;
pub mod ndarr;
pub mod permutation;

pub use error::ArrayError;
pub use math::{MemoryInfo, NDArrayMath, Scope};
pub use ndarr::{ArrayId, NdArray};

pub use ndarray;
