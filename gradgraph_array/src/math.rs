//! CPU array math with scoped tracking of intermediate arrays.
//!
//! Every array produced by [`NDArrayMath`] is registered in the innermost open
//! scope of the calling thread. When a scope closes, the arrays it still
//! tracks are counted as disposed; arrays passed through [`Scope::keep`] move
//! to the parent scope instead.

use std::{
    collections::HashMap,
    thread::{self, ThreadId},
};

use ndarray::{ArrayD, Ix2, IxDyn, Zip};
use parking_lot::Mutex;

use crate::{
    error::{ArrayError, Result},
    ndarr::{ArrayId, NdArray},
    permutation,
};

/// Counters describing the scope stacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    /// Arrays tracked by open scopes.
    pub tracked: usize,
    /// Arrays released by closed scopes since this backend was created.
    pub disposed: usize,
    /// Number of open scopes.
    pub scopes: usize,
}

type Frames = Vec<Vec<ArrayId>>;

/// Each thread opens and closes its own stack of frames.
#[derive(Default)]
struct ScopeState {
    threads: HashMap<ThreadId, Frames>,
    disposed: usize,
}

impl ScopeState {
    fn frames(&mut self, thread: ThreadId) -> Option<&mut Frames> {
        self.threads.get_mut(&thread)
    }
}

/// A CPU backend for [`NdArray`] math.
#[derive(Default)]
pub struct NDArrayMath {
    state: Mutex<ScopeState>,
}

/// Handle to an open scope, passed to the closure given to [`NDArrayMath::scope`].
pub struct Scope<'a> {
    math: &'a NDArrayMath,
    thread: ThreadId,
    depth: usize,
}

impl Scope<'_> {
    /// Let `array` outlive this scope. It becomes tracked by the parent scope, if any.
    pub fn keep(&self, array: NdArray) -> NdArray {
        let mut state = self.math.state.lock();
        let frames = match state.frames(self.thread) {
            Some(frames) => frames,
            None => return array,
        };
        let id = array.id();
        let kept = match frames.get_mut(self.depth) {
            Some(frame) => match frame.iter().position(|&tracked| tracked == id) {
                Some(pos) => {
                    frame.swap_remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        };
        if kept && self.depth > 0 {
            frames[self.depth - 1].push(id);
        }
        array
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Pops the frame it was created for, even when the scope body unwinds.
struct FrameGuard<'a> {
    math: &'a NDArrayMath,
    thread: ThreadId,
    depth: usize,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.math.state.lock();
        // inner frames left open by a panic are released with this one
        let mut released = 0;
        if let Some(frames) = state.frames(self.thread) {
            while frames.len() > self.depth {
                if let Some(frame) = frames.pop() {
                    released += frame.len();
                }
            }
            if frames.is_empty() {
                state.threads.remove(&self.thread);
            }
        }
        state.disposed += released;
        log::trace!("scope at depth {} closed, {} arrays released", self.depth, released);
    }
}

impl NDArrayMath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` inside a new scope on the calling thread.
    ///
    /// Arrays created by this backend on this thread while `f` runs are
    /// released when it returns unless they were passed to [`Scope::keep`].
    pub fn scope<R>(&self, f: impl FnOnce(&Scope<'_>) -> R) -> R {
        let thread = thread::current().id();
        let depth = {
            let mut state = self.state.lock();
            let frames = state.threads.entry(thread).or_default();
            frames.push(Vec::new());
            frames.len() - 1
        };
        let _guard = FrameGuard {
            math: self,
            thread,
            depth,
        };
        f(&Scope {
            math: self,
            thread,
            depth,
        })
    }

    /// Counters summed over every thread.
    pub fn memory(&self) -> MemoryInfo {
        let state = self.state.lock();
        let frames = state.threads.values().flatten();
        MemoryInfo {
            tracked: frames.clone().map(Vec::len).sum(),
            disposed: state.disposed,
            scopes: frames.count(),
        }
    }

    fn track(&self, array: NdArray) -> NdArray {
        let thread = thread::current().id();
        if let Some(frame) = self
            .state
            .lock()
            .frames(thread)
            .and_then(|frames| frames.last_mut())
        {
            frame.push(array.id());
        }
        array
    }

    fn track_raw(&self, data: ArrayD<f32>) -> NdArray {
        self.track(NdArray::from_array(data))
    }

    pub fn zeros(&self, shape: &[usize]) -> NdArray {
        self.track(NdArray::zeros(shape))
    }

    pub fn ones(&self, shape: &[usize]) -> NdArray {
        self.track(NdArray::ones(shape))
    }

    pub fn clone_array(&self, a: &NdArray) -> NdArray {
        self.track(a.clone())
    }

    /// Reorder the axes of `x` by `perm`, or reverse them when `perm` is `None`.
    pub fn transpose(&self, x: &NdArray, perm: Option<&[usize]>) -> Result<NdArray> {
        let perm = permutation::resolve(perm, x.rank())?;
        let permuted = x.as_array().view().permuted_axes(IxDyn(&perm));
        Ok(self.track_raw(permuted.as_standard_layout().into_owned()))
    }

    pub fn add(&self, a: &NdArray, b: &NdArray) -> Result<NdArray> {
        self.binary("add", a, b, |x, y| x + y)
    }

    pub fn sub(&self, a: &NdArray, b: &NdArray) -> Result<NdArray> {
        self.binary("sub", a, b, |x, y| x - y)
    }

    pub fn elementwise_mul(&self, a: &NdArray, b: &NdArray) -> Result<NdArray> {
        self.binary("elementwise_mul", a, b, |x, y| x * y)
    }

    /// Multiply every element of `a` by the scalar array `c`.
    pub fn scalar_times_array(&self, c: &NdArray, a: &NdArray) -> Result<NdArray> {
        let c = c.as_scalar()?;
        Ok(self.track_raw(a.as_array().mapv(|v| c * v)))
    }

    /// Matrix product of two rank-2 arrays.
    pub fn mat_mul(&self, a: &NdArray, b: &NdArray) -> Result<NdArray> {
        let lhs = as_matrix("mat_mul", a)?;
        let rhs = as_matrix("mat_mul", b)?;
        if lhs.ncols() != rhs.nrows() {
            return Err(ArrayError::shape_mismatch(
                "mat_mul",
                &[lhs.ncols(), rhs.ncols()],
                b.shape(),
            ));
        }
        Ok(self.track_raw(lhs.dot(&rhs).into_dyn()))
    }

    /// Sum of all elements, as a rank-0 array.
    pub fn sum(&self, a: &NdArray) -> NdArray {
        self.track(NdArray::scalar(a.as_array().sum()))
    }

    fn binary(
        &self,
        operation: &'static str,
        a: &NdArray,
        b: &NdArray,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<NdArray> {
        let (x, y) = (a.as_array(), b.as_array());
        let out = if a.shape() == b.shape() {
            Zip::from(x).and(y).map_collect(|&p, &q| f(p, q))
        } else if a.rank() == 0 {
            let s = a.as_scalar()?;
            y.mapv(|q| f(s, q))
        } else if b.rank() == 0 {
            let s = b.as_scalar()?;
            x.mapv(|p| f(p, s))
        } else {
            return Err(ArrayError::shape_mismatch(operation, a.shape(), b.shape()));
        };
        Ok(self.track_raw(out))
    }
}

fn as_matrix<'a>(
    operation: &'static str,
    a: &'a NdArray,
) -> Result<ndarray::ArrayView2<'a, f32>> {
    a.as_array()
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| ArrayError::RankMismatch {
            operation,
            expected: 2,
            got: a.rank(),
        })
}
