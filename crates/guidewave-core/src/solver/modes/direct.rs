//! Direct eigen-decomposition of the discretised paraxial operator.
//!
//! With the absorber excluded, the operator
//! $H = D_2 / (2\bar{k}\Delta x^2) + k_0 \Delta n$ is a real symmetric
//! tridiagonal matrix. Its eigenvalues are the propagation-constant
//! corrections β of every mode the grid supports, so
//! $n_{\text{eff}} = n_0 + \beta / k_0$ and the eigenvectors are mutually
//! orthogonal.

use nalgebra::DMatrix;
use ndarray::Array1;
use num_complex::Complex64;

use crate::fields::{fix_phase, normalize};
use crate::solver::{BpmError, Result};
use crate::types::{Field, Grid, ModeResult};

/// Diagonal of H and its constant off-diagonal coupling.
pub(super) fn operator_bands(grid: &Grid, index: &Array1<f64>) -> (Vec<f64>, f64) {
    let k0 = grid.k0();
    let r = 1.0 / (2.0 * grid.reference_wavenumber() * grid.dx() * grid.dx());
    let diag = index.iter().map(|n| -2.0 * r + k0 * (n - grid.n0())).collect();
    (diag, r)
}

/// Assemble H as a dense matrix.
pub(super) fn operator_matrix(grid: &Grid, index: &Array1<f64>) -> DMatrix<f64> {
    let (diag, r) = operator_bands(grid, index);
    let nx = diag.len();
    let mut h = DMatrix::<f64>::zeros(nx, nx);
    for (j, &d) in diag.iter().enumerate() {
        h[(j, j)] = d;
        if j + 1 < nx {
            h[(j, j + 1)] = r;
            h[(j + 1, j)] = r;
        }
    }
    h
}

pub(super) fn solve(grid: &Grid, index: &Array1<f64>, count: usize) -> Result<Vec<ModeResult>> {
    let eigen = operator_matrix(grid, index).symmetric_eigen();
    if eigen.eigenvalues.iter().any(|b| !b.is_finite()) {
        return Err(BpmError::Numerical {
            z: 0.0,
            message: "eigen-decomposition produced non-finite eigenvalues".into(),
        });
    }

    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    order
        .into_iter()
        .take(count)
        .map(|i| {
            let beta = eigen.eigenvalues[i];
            let mut field: Field = eigen
                .eigenvectors
                .column(i)
                .iter()
                .map(|&v| Complex64::new(v, 0.0))
                .collect();
            normalize(&mut field, grid.dx())?;
            fix_phase(&mut field);
            Ok(ModeResult {
                effective_index: grid.n0() + beta / grid.k0(),
                field,
            })
        })
        .collect()
}
