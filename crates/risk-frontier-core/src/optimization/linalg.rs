use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::FrontierError;
use crate::FrontierResult;

/// Pivots smaller than this are treated as zero.
const PIVOT_TOLERANCE: Decimal = dec!(0.00000000000000000001);

/// Matrix-vector multiplication.
pub(crate) fn mat_vec_multiply(mat: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Dot product.
pub(crate) fn vec_dot(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

/// Quadratic form x' M x.
pub(crate) fn quad_form(x: &[Decimal], mat: &[Vec<Decimal>]) -> Decimal {
    vec_dot(x, &mat_vec_multiply(mat, x))
}

/// Portfolio standard deviation: sqrt(w' * Sigma * w).
pub(crate) fn portfolio_std(w: &[Decimal], sigma: &[Vec<Decimal>]) -> Decimal {
    sqrt_non_negative(quad_form(w, sigma))
}

/// Square root that maps round-off negatives to zero.
pub(crate) fn sqrt_non_negative(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
pub(crate) fn solve_linear_system(
    mat: &[Vec<Decimal>],
    rhs: &[Decimal],
) -> FrontierResult<Vec<Decimal>> {
    let n = mat.len();
    if rhs.len() != n || mat.iter().any(|row| row.len() != n) {
        return Err(FrontierError::InvalidInput {
            field: "linear_system".into(),
            reason: format!("Expected a {}x{} system with {} right-hand values", n, n, n),
        });
    }

    let mut aug: Vec<Vec<Decimal>> = mat
        .iter()
        .zip(rhs.iter())
        .map(|(row, b)| {
            let mut r = row.clone();
            r.push(*b);
            r
        })
        .collect();

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            let val = aug[row][col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < PIVOT_TOLERANCE {
            return Err(FrontierError::SingularMatrix(format!(
                "no usable pivot in column {} of a {}x{} system",
                col, n, n
            )));
        }

        if max_row != col {
            aug.swap(col, max_row);
        }

        let pivot_row = aug[col].clone();
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot_row[col];
            if factor.is_zero() {
                continue;
            }
            for (cell, &pv) in aug[row].iter_mut().zip(pivot_row.iter()).skip(col) {
                *cell -= factor * pv;
            }
        }
    }

    // Back substitution
    let mut x = vec![Decimal::ZERO; n];
    for row in (0..n).rev() {
        let mut acc = aug[row][n];
        for k in (row + 1)..n {
            acc -= aug[row][k] * x[k];
        }
        x[row] = acc / aug[row][row];
    }
    Ok(x)
}
