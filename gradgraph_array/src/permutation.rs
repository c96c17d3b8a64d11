//! Axis permutations used by transpose.
//!
//! A permutation `perm` of rank `n` maps output axis `i` to input axis `perm[i]`,
//! so the output shape is `shape[perm[0]], shape[perm[1]], ...`.

use itertools::Itertools;

use crate::error::{ArrayError, Result};

/// The permutation used when none is given: all axes reversed.
pub fn default_permutation(rank: usize) -> Vec<usize> {
    (0..rank).rev().collect()
}

/// Check that `perm` names every axis of a rank-`rank` array exactly once.
pub fn validate(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank || !perm.iter().all(|&axis| axis < rank) || !perm.iter().all_unique() {
        return Err(ArrayError::InvalidPermutation {
            perm: perm.to_vec(),
            rank,
        });
    }
    Ok(())
}

/// The permutation that undoes `perm`.
pub fn inverse(perm: &[usize]) -> Result<Vec<usize>> {
    validate(perm, perm.len())?;
    let mut inv = vec![0; perm.len()];
    for (i, &axis) in perm.iter().enumerate() {
        inv[axis] = i;
    }
    Ok(inv)
}

/// Shape of an array of shape `shape` after being transposed by `perm`.
pub fn permute_shape(shape: &[usize], perm: &[usize]) -> Result<Vec<usize>> {
    validate(perm, shape.len())?;
    Ok(perm.iter().map(|&axis| shape[axis]).collect())
}

/// Validate an explicit permutation, or fall back to [`default_permutation`].
pub fn resolve(perm: Option<&[usize]>, rank: usize) -> Result<Vec<usize>> {
    match perm {
        Some(perm) => {
            validate(perm, rank)?;
            Ok(perm.to_vec())
        }
        None => Ok(default_permutation(rank)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reverses_axes() {
        assert_eq!(default_permutation(3), vec![2, 1, 0]);
        assert_eq!(default_permutation(0), Vec::<usize>::new());
    }

    #[test]
    fn rejects_repeated_and_out_of_range_axes() {
        assert!(validate(&[0, 0], 2).is_err());
        assert!(validate(&[0, 2], 2).is_err());
        assert!(validate(&[0], 2).is_err());
        assert!(validate(&[1, 0], 2).is_ok());
    }

    #[test]
    fn inverse_of_a_rotation() {
        assert_eq!(inverse(&[1, 2, 0]).unwrap(), vec![2, 0, 1]);
        assert_eq!(inverse(&inverse(&[1, 2, 0]).unwrap()).unwrap(), vec![1, 2, 0]);
        // reversal is its own inverse
        assert_eq!(inverse(&[3, 2, 1, 0]).unwrap(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn inverse_and_shape_reject_invalid_permutations() {
        assert!(matches!(
            inverse(&[5, 0]),
            Err(ArrayError::InvalidPermutation { .. })
        ));
        assert!(inverse(&[0, 0]).is_err());
        assert!(permute_shape(&[2, 3], &[0, 2]).is_err());
        assert!(permute_shape(&[2, 3, 4], &[1, 0]).is_err());
    }

    #[test]
    fn shape_follows_permutation() {
        assert_eq!(permute_shape(&[2, 3, 4], &[1, 2, 0]).unwrap(), vec![3, 4, 2]);
        let perm = [1, 2, 0];
        let permuted = permute_shape(&[2, 3, 4], &perm).unwrap();
        let back = permute_shape(&permuted, &inverse(&perm).unwrap()).unwrap();
        assert_eq!(back, vec![2, 3, 4]);
    }

    #[test]
    fn resolve_uses_default_when_absent() {
        assert_eq!(resolve(None, 2).unwrap(), vec![1, 0]);
        assert_eq!(resolve(Some(&[0, 1]), 2).unwrap(), vec![0, 1]);
        assert_eq!(
            resolve(Some(&[1, 1]), 2),
            Err(ArrayError::InvalidPermutation {
                perm: vec![1, 1],
                rank: 2
            })
        );
    }
}
