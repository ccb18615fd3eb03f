//! Axis restriding for dense row-major buffers.
//!
//! The simulation keeps its arrays in its own axis order while the EMD
//! container stores them in the external, calibrated order. [`restride`]
//! moves a buffer between the two without knowing the rank up front.

use crate::{Error, Result};

/// Returns the shape produced by permuting `dims_in` with `order`.
///
/// # Errors
/// Returns [`Error::InvalidAxisOrder`] if `order` is not a permutation of
/// `0..dims_in.len()`.
pub fn permuted_shape(dims_in: &[usize], order: &[usize]) -> Result<Vec<usize>> {
    validate_order(order, dims_in.len())?;
    Ok(order.iter().map(|&axis| dims_in[axis]).collect())
}

/// Permutes the axes of a row-major buffer.
///
/// Output axis `i` is input axis `order[i]`, so `order = [2, 1, 0]` turns a
/// `(z, y, x)` buffer into `(x, y, z)`.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if `data` does not hold exactly
/// `dims_in.iter().product()` elements, or [`Error::InvalidAxisOrder`] if
/// `order` is not a permutation.
pub fn restride<T: Copy>(data: &[T], dims_in: &[usize], order: &[usize]) -> Result<Vec<T>> {
    let dims_out = permuted_shape(dims_in, order)?;
    check_len(data.len(), dims_in)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let strides_in = row_major_strides(dims_in);
    // stride in the input for a unit step along each output axis
    let steps: Vec<usize> = order.iter().map(|&axis| strides_in[axis]).collect();

    let rank = dims_out.len();
    let mut out = Vec::with_capacity(data.len());
    let mut counter = vec![0usize; rank];
    let mut src = 0usize;

    for _ in 0..data.len() {
        out.push(data[src]);

        for axis in (0..rank).rev() {
            counter[axis] += 1;
            src += steps[axis];
            if counter[axis] < dims_out[axis] {
                break;
            }
            src -= steps[axis] * dims_out[axis];
            counter[axis] = 0;
        }
    }

    Ok(out)
}

/// Swaps the two fastest-varying axes of a row-major buffer.
///
/// This is the reciprocal-space flip applied to diffraction patterns before
/// they are stored.
///
/// # Errors
/// Same conditions as [`restride`]; rank must be at least 2.
pub fn swap_last_two_axes<T: Copy>(data: &[T], dims_in: &[usize]) -> Result<Vec<T>> {
    let rank = dims_in.len();
    if rank < 2 {
        return Err(Error::InvalidAxisOrder {
            order: (0..rank).collect(),
            rank,
        });
    }
    let mut order: Vec<usize> = (0..rank).collect();
    order.swap(rank - 2, rank - 1);
    restride(data, dims_in, &order)
}

/// Row-major strides (in elements) for `dims`.
#[must_use]
pub fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for axis in (0..dims.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }
    strides
}

/// Checks that a buffer of `len` elements matches `shape`.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] on disagreement.
pub fn check_len(len: usize, shape: &[usize]) -> Result<()> {
    let expected: usize = shape.iter().product();
    if len != expected {
        return Err(Error::ShapeMismatch {
            shape: shape.to_vec(),
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn validate_order(order: &[usize], rank: usize) -> Result<()> {
    let mut seen = vec![false; rank];
    let valid = order.len() == rank
        && order.iter().all(|&axis| {
            if axis >= rank || seen[axis] {
                return false;
            }
            seen[axis] = true;
            true
        });

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAxisOrder {
            order: order.to_vec(),
            rank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(n: usize) -> Vec<u32> {
        (0..n).map(|v| u32::try_from(v).unwrap()).collect()
    }

    #[test]
    fn test_identity_order() {
        let data = iota(24);
        let out = restride(&data, &[2, 3, 4], &[0, 1, 2]).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_2d_transpose() {
        // [[0, 1, 2], [3, 4, 5]] -> [[0, 3], [1, 4], [2, 5]]
        let data = iota(6);
        let out = restride(&data, &[2, 3], &[1, 0]).unwrap();
        assert_eq!(out, vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_zyx_to_xyz() {
        let (nz, ny, nx) = (2, 3, 4);
        let data = iota(nz * ny * nx);
        let out = restride(&data, &[nz, ny, nx], &[2, 1, 0]).unwrap();

        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let dst = (x * ny + y) * nz + z;
                    let src = (z * ny + y) * nx + x;
                    assert_eq!(out[dst], data[src]);
                }
            }
        }
    }

    #[test]
    fn test_reader_permutation_is_self_inverse() {
        let dims = [2, 3, 4, 5];
        let data = iota(dims.iter().product());
        let order = [1, 0, 3, 2];

        let once = restride(&data, &dims, &order).unwrap();
        let shape = permuted_shape(&dims, &order).unwrap();
        assert_eq!(shape, vec![3, 2, 5, 4]);

        let twice = restride(&once, &shape, &order).unwrap();
        assert_eq!(twice, data);
    }

    #[test]
    fn test_swap_last_two_axes_per_probe() {
        // two probe positions, each a 2x3 pattern
        let data = iota(12);
        let out = swap_last_two_axes(&data, &[2, 2, 3]).unwrap();
        assert_eq!(out, vec![0, 3, 1, 4, 2, 5, 6, 9, 7, 10, 8, 11]);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = restride(&iota(5), &[2, 3], &[1, 0]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 6, .. }));
    }

    #[test]
    fn test_invalid_order() {
        let data = iota(6);
        assert!(matches!(
            restride(&data, &[2, 3], &[0, 0]),
            Err(Error::InvalidAxisOrder { .. })
        ));
        assert!(matches!(
            restride(&data, &[2, 3], &[0, 1, 2]),
            Err(Error::InvalidAxisOrder { .. })
        ));
        assert!(swap_last_two_axes(&data, &[6]).is_err());
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[7]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }
}
