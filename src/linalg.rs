//! Small dense linear algebra on row-major `Vec<Vec<f64>>` matrices.
//!
//! Asset universes are small (tens of names), so plain Gauss-Jordan and
//! Cholesky are sufficient and keep the data model free of matrix types.

use crate::error::{PortfolioError, Result};

/// Pivot magnitude below which a matrix is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Matrix-vector product `M v`.
pub fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

/// Quadratic form `v' M v`.
pub fn quad_form(matrix: &[Vec<f64>], v: &[f64]) -> f64 {
    dot(v, &mat_vec(matrix, v))
}

/// Multiply every entry by `factor`.
pub fn scale(matrix: &[Vec<f64>], factor: f64) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .map(|row| row.iter().map(|v| v * factor).collect())
        .collect()
}

/// Check that `matrix` is `n x n` with finite entries.
pub fn check_square(matrix: &[Vec<f64>], n: usize, name: &str) -> Result<()> {
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(PortfolioError::invalid_input(format!(
            "{} must be {}x{}",
            name, n, n
        )));
    }
    if matrix.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PortfolioError::invalid_input(format!(
            "{} contains non-finite values",
            name
        )));
    }
    Ok(())
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
pub fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(PortfolioError::invalid_input("cannot invert a non-square matrix"));
    }

    // Scale-aware threshold so tiny covariance entries are not flagged spuriously.
    let scale = matrix
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if n == 0 || scale == 0.0 {
        return Err(PortfolioError::SingularMatrix(
            "matrix is empty or all zeros".to_string(),
        ));
    }
    let threshold = SINGULAR_EPS * scale;

    // Augmented matrix [A | I]
    let mut aug = vec![vec![0.0; 2 * n]; n];
    for i in 0..n {
        aug[i][..n].copy_from_slice(&matrix[i]);
        aug[i][n + i] = 1.0;
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))
            .unwrap_or(col);
        if aug[pivot_row][col].abs() < threshold {
            return Err(PortfolioError::SingularMatrix(format!(
                "zero pivot in column {}",
                col
            )));
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for j in 0..2 * n {
            aug[col][j] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[row][col];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[row][j] -= factor * aug[col][j];
                    }
                }
            }
        }
    }

    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Cholesky factor `L` (lower triangular, `A = L L'`) of a symmetric
/// positive-semidefinite matrix.
///
/// Rank-deficient matrices are accepted: a column whose remaining diagonal is
/// numerically zero gets a zero column in `L`. A clearly negative diagonal
/// means the matrix is not PSD and is rejected.
pub fn cholesky(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    let max_diag = (0..n).fold(0.0_f64, |acc, i| acc.max(matrix[i][i].abs()));
    let tolerance = 1e-10 * max_diag.max(f64::MIN_POSITIVE);
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let diag = matrix[i][i] - sum;
                if diag < -tolerance {
                    return Err(PortfolioError::invalid_input(
                        "covariance matrix is not positive semidefinite",
                    ));
                }
                l[i][j] = diag.max(0.0).sqrt();
            } else if l[j][j] > tolerance.sqrt() {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }

    Ok(l)
}
