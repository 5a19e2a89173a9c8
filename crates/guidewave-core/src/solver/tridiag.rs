//! Thomas algorithm for complex tridiagonal systems.
//!
//! The factorisation is split from the solve so that a Crank–Nicolson
//! left-hand side can be factorised once and applied to many right-hand
//! sides (static-profile runs, imaginary-distance iterations).

use num_complex::Complex64;
use thiserror::Error;

/// Pivots smaller than this fraction of the largest diagonal entry are
/// treated as singular.
const PIVOT_FLOOR: f64 = 1e-13;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TridiagError {
    #[error("singular pivot at row {row}")]
    Singular { row: usize },

    #[error("non-finite value produced at row {row}")]
    NonFinite { row: usize },

    #[error("empty system")]
    Empty,

    #[error("band or right-hand side has length {got}, system has {expected} rows")]
    LengthMismatch { expected: usize, got: usize },
}

/// LU factors of a tridiagonal matrix in Thomas form.
///
/// Row `i` of the matrix is `sub[i]·x[i-1] + diag[i]·x[i] + sup[i]·x[i+1]`;
/// `sub[0]` and `sup[n-1]` are ignored.
#[derive(Debug, Clone)]
pub struct TridiagonalLu {
    sub: Vec<Complex64>,
    c_prime: Vec<Complex64>,
    pivots: Vec<Complex64>,
}

impl TridiagonalLu {
    /// Factorise the matrix. Fails if any pivot vanishes or is non-finite.
    pub fn factorize(
        sub: &[Complex64],
        diag: &[Complex64],
        sup: &[Complex64],
    ) -> Result<Self, TridiagError> {
        let n = diag.len();
        if n == 0 {
            return Err(TridiagError::Empty);
        }
        for band in [sub, sup] {
            if band.len() != n {
                return Err(TridiagError::LengthMismatch { expected: n, got: band.len() });
            }
        }

        let scale = diag.iter().map(|d| d.norm()).fold(0.0_f64, f64::max).max(f64::MIN_POSITIVE);
        let check = |row: usize, pivot: Complex64| -> Result<(), TridiagError> {
            if !pivot.is_finite() {
                return Err(TridiagError::NonFinite { row });
            }
            if pivot.norm() <= PIVOT_FLOOR * scale {
                return Err(TridiagError::Singular { row });
            }
            Ok(())
        };

        let mut c_prime = vec![Complex64::new(0.0, 0.0); n];
        let mut pivots = vec![Complex64::new(0.0, 0.0); n];

        check(0, diag[0])?;
        pivots[0] = diag[0];
        if n > 1 {
            c_prime[0] = sup[0] / diag[0];
        }
        for i in 1..n {
            let pivot = diag[i] - sub[i] * c_prime[i - 1];
            check(i, pivot)?;
            pivots[i] = pivot;
            if i < n - 1 {
                c_prime[i] = sup[i] / pivot;
            }
        }

        Ok(Self { sub: sub.to_vec(), c_prime, pivots })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    /// Solve `M x = rhs` with the stored factors.
    pub fn solve(&self, rhs: &[Complex64]) -> Result<Vec<Complex64>, TridiagError> {
        let n = self.len();
        if rhs.len() != n {
            return Err(TridiagError::LengthMismatch { expected: n, got: rhs.len() });
        }

        // Forward sweep
        let mut x = vec![Complex64::new(0.0, 0.0); n];
        x[0] = rhs[0] / self.pivots[0];
        for i in 1..n {
            x[i] = (rhs[i] - self.sub[i] * x[i - 1]) / self.pivots[i];
        }

        // Back substitution
        for i in (0..n - 1).rev() {
            let next = x[i + 1];
            x[i] -= self.c_prime[i] * next;
        }

        if let Some(row) = x.iter().position(|v| !v.is_finite()) {
            return Err(TridiagError::NonFinite { row });
        }
        Ok(x)
    }
}

/// Factorise and solve in one call.
pub fn thomas_solve(
    sub: &[Complex64],
    diag: &[Complex64],
    sup: &[Complex64],
    rhs: &[Complex64],
) -> Result<Vec<Complex64>, TridiagError> {
    TridiagonalLu::factorize(sub, diag, sup)?.solve(rhs)
}

/// Tridiagonal matrix-vector product, same layout as [`TridiagonalLu::factorize`].
pub fn tridiag_matvec(
    sub: &[Complex64],
    diag: &[Complex64],
    sup: &[Complex64],
    x: &[Complex64],
) -> Vec<Complex64> {
    let n = x.len();
    (0..n)
        .map(|i| {
            let mut y = diag[i] * x[i];
            if i > 0 {
                y += sub[i] * x[i - 1];
            }
            if i + 1 < n {
                y += sup[i] * x[i + 1];
            }
            y
        })
        .collect()
}

/// Number of eigenvalues strictly above `shift` of the real symmetric
/// tridiagonal matrix with diagonal `diag` and constant off-diagonal `off`.
///
/// Sturm count: the LDLᵀ pivots of `shift·I − M` have as many negative
/// entries as `M` has eigenvalues above `shift`.
pub fn count_eigenvalues_above(diag: &[f64], off: f64, shift: f64) -> usize {
    let scale = diag.iter().fold(off.abs(), |m, d| m.max(d.abs())).max(f64::MIN_POSITIVE);
    let tiny = f64::EPSILON * scale;
    let mut count = 0;
    let mut pivot = 1.0;
    for (i, &d) in diag.iter().enumerate() {
        let coupling = if i == 0 { 0.0 } else { off * off / pivot };
        pivot = shift - d - coupling;
        if pivot.abs() < tiny {
            pivot = tiny;
        }
        if pivot < 0.0 {
            count += 1;
        }
    }
    count
}
