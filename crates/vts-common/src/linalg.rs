//! Dense kernels that `ndarray` does not provide without a LAPACK backend.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ErrorKind, ShapeError, s};

/// Error returned by [`solve`] when a pivot vanishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularMatrix {
    /// Column at which elimination failed.
    pub column: usize,
}

impl std::fmt::Display for SingularMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "matrix is singular (zero pivot in column {})", self.column)
    }
}

impl std::error::Error for SingularMatrix {}

/// Stacks equally long rows into a `rows × cols` array.
///
/// Ragged input is an `IncompatibleShape` error.
pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Array2<f64>, ShapeError> {
    let cols = rows.first().map_or(0, |r| r.as_ref().len());
    let mut data = Vec::with_capacity(rows.len() * cols);
    for r in rows {
        let r = r.as_ref();
        if r.len() != cols {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape));
        }
        data.extend_from_slice(r);
    }
    Array2::from_shape_vec((rows.len(), cols), data)
}

/// Solves `a · x = rhs` by Gaussian elimination with partial pivoting.
///
/// # Panics
///
/// Panics if `a` is not square or `rhs` does not match its size.
pub fn solve(a: ArrayView2<'_, f64>, rhs: ArrayView1<'_, f64>) -> Result<Array1<f64>, SingularMatrix> {
    let n = a.nrows();
    assert_eq!(a.ncols(), n, "solve requires a square matrix");
    assert_eq!(rhs.len(), n, "right-hand side must match the matrix size");
    let mut a = a.to_owned();
    let mut b = rhs.to_owned();

    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tiny = f64::EPSILON * scale.max(f64::MIN_POSITIVE) * n as f64;

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|r| (r, a[[r, col]].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if pivot_abs.is_nan() || pivot_abs <= tiny {
            return Err(SingularMatrix { column: col });
        }
        if pivot_row != col {
            for j in 0..n {
                a.swap([col, j], [pivot_row, j]);
            }
            b.swap(col, pivot_row);
        }
        let pivot = a[[col, col]];
        for r in col + 1..n {
            let factor = a[[r, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                let delta = factor * a[[col, j]];
                a[[r, j]] -= delta;
            }
            let delta = factor * b[col];
            b[r] -= delta;
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let tail = a.slice(s![i, i + 1..]).dot(&x.slice(s![i + 1..]));
        x[i] = (b[i] - tail) / a[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn from_rows_keeps_row_order() {
        let m = from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m, arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        // Same element count as a 3 × 2 array, but not rectangular.
        let err = from_rows(&[vec![1.0, 2.0], vec![3.0], vec![4.0, 5.0, 6.0]]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleShape);
    }

    #[test]
    fn from_rows_of_nothing_is_empty() {
        let m = from_rows::<Vec<f64>>(&[]).unwrap();
        assert_eq!(m.dim(), (0, 0));
    }

    #[test]
    fn solve_needs_pivoting() {
        let a = arr2(&[[0.0, 1.0], [2.0, 0.0]]);
        let x = solve(a.view(), arr1(&[3.0, 4.0]).view()).unwrap();
        assert_eq!(x, arr1(&[2.0, 3.0]));
    }

    #[test]
    fn solve_rejects_singular_matrix() {
        let a = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(
            solve(a.view(), arr1(&[1.0, 1.0]).view()),
            Err(SingularMatrix { column: 1 })
        );
    }

    #[proptest]
    fn solve_recovers_diagonally_dominant_system(
        #[strategy(1..=8usize)] n: usize,
        #[strategy(pvec(-1.0f64..1.0, #n * #n))] entries: Vec<f64>,
        #[strategy(pvec(-10.0f64..10.0, #n))] x: Vec<f64>,
    ) {
        let mut a = Array2::from_shape_vec((n, n), entries).unwrap();
        for i in 0..n {
            a[[i, i]] += n as f64 + 1.0;
        }
        let x = Array1::from(x);
        let b = a.dot(&x);
        let solved = solve(a.view(), b.view()).unwrap();
        for (s, e) in solved.iter().zip(&x) {
            prop_assert!((s - e).abs() < 1e-9, "solved {s}, expected {e}");
        }
    }
}
