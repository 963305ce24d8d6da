//! Dense linear solves.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Solve a linear system Ax = b using LU decomposition.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    if a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    a.clone().lu().solve(b).ok_or(Error::SingularMatrix)
}

/// Least-squares polynomial fit `y ~ sum_k c_k x^k` of the given order.
///
/// Solves the normal equations; callers keep `x` centred and the order low.
pub fn polyfit(x: &[f64], y: &[f64], order: usize) -> Result<DVector<f64>> {
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    if x.len() <= order {
        return Err(Error::TooFewPoints {
            required: order + 1,
            actual: x.len(),
        });
    }

    let vander = vandermonde(x, order);
    let normal = vander.transpose() * &vander;
    let rhs = vander.transpose() * DVector::from_column_slice(y);
    solve_dense(&normal, &rhs)
}

/// Matrix with rows `[1, x_i, x_i^2, ..., x_i^order]`.
pub fn vandermonde(x: &[f64], order: usize) -> DMatrix<f64> {
    DMatrix::from_fn(x.len(), order + 1, |i, k| x[i].powi(k as i32))
}

/// Evaluate the `deriv`-th derivative of a polynomial with coefficients
/// `coeffs` (lowest order first) at `x`.
pub fn polyval_derivative(coeffs: &DVector<f64>, deriv: usize, x: f64) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .skip(deriv)
        .map(|(k, &c)| {
            let falling: f64 = ((k - deriv + 1)..=k).map(|m| m as f64).product();
            c * falling * x.powi((k - deriv) as i32)
        })
        .sum()
}
