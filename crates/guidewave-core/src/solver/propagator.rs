//! Crank–Nicolson beam propagation.
//!
//! The slowly varying envelope A(x, z) obeys the paraxial wave equation
//!
//! $$
//! \frac{\partial A}{\partial z} = \frac{i}{2\bar{k}} \frac{\partial^2 A}{\partial x^2}
//! + i k_0 \, \delta(x, z) \, A, \qquad \delta = (n - n_0) + i\kappa
//! $$
//!
//! with $\bar{k} = k_0 n_0$ and κ the absorber extinction. Writing the right
//! side as $iHA$ with the 3-point Laplacian (Dirichlet walls just outside
//! the domain), a step of length $h$ solves
//!
//! $$
//! (I - sH) A^{+} = (I + sH) A, \qquad s = \frac{ih}{2}
//! $$
//!
//! For real h and κ = 0 the step is the Cayley transform of a Hermitian
//! matrix, so it is unitary and conserves $\sum |A|^2 \Delta x$ exactly. The
//! mode solver passes an imaginary h, which turns the same step into a
//! damping filter favouring the highest propagation constant.

use ndarray::Array1;
use num_complex::Complex64;

use super::tridiag::{tridiag_matvec, TridiagError, TridiagonalLu};
use super::{BpmError, Result};
use crate::absorber::AbsorberProfile;
use crate::profile::{validate_slice, IndexProfile};
use crate::types::{Field, Grid};

/// A factorised Crank–Nicolson step for one index slice and one step length.
///
/// Reusable for as long as the slice and step length stay fixed.
#[derive(Debug, Clone)]
pub struct CrankNicolsonStep {
    lu: TridiagonalLu,
    rhs_sub: Vec<Complex64>,
    rhs_diag: Vec<Complex64>,
    rhs_sup: Vec<Complex64>,
    h: Complex64,
}

impl CrankNicolsonStep {
    /// Build and factorise the step for index slice `index` (absolute
    /// refractive index) and complex step length `h`. `z` is only used to
    /// label errors.
    pub fn new(
        grid: &Grid,
        index: &Array1<f64>,
        absorber: Option<&AbsorberProfile>,
        h: Complex64,
        z: f64,
    ) -> Result<Self> {
        validate_slice(grid, index)?;
        if let Some(abs) = absorber {
            if abs.len() != grid.nx() {
                return Err(BpmError::Domain(format!(
                    "absorber has {} samples, grid has {}",
                    abs.len(),
                    grid.nx()
                )));
            }
        }
        if !h.is_finite() || h.norm() == 0.0 {
            return Err(BpmError::Numerical {
                z,
                message: format!("degenerate step length {h}"),
            });
        }

        let nx = grid.nx();
        let k0 = grid.k0();
        let n0 = grid.n0();
        let r = 1.0 / (2.0 * grid.reference_wavenumber() * grid.dx() * grid.dx());
        let s = Complex64::new(0.0, 1.0) * h / 2.0;

        let h_diag: Vec<Complex64> = (0..nx)
            .map(|j| {
                let kappa = absorber.map_or(0.0, |a| a.kappa()[j]);
                Complex64::new(-2.0 * r + k0 * (index[j] - n0), k0 * kappa)
            })
            .collect();

        let lhs_off = vec![-s * r; nx];
        let lhs_diag: Vec<Complex64> = h_diag.iter().map(|&d| 1.0 - s * d).collect();
        let lu = TridiagonalLu::factorize(&lhs_off, &lhs_diag, &lhs_off)
            .map_err(|e| numerical(z, "factorising the Crank-Nicolson system", e))?;

        Ok(Self {
            lu,
            rhs_sub: vec![s * r; nx],
            rhs_diag: h_diag.iter().map(|&d| 1.0 + s * d).collect(),
            rhs_sup: vec![s * r; nx],
            h,
        })
    }

    /// Complex step length this step was built for.
    pub fn step_length(&self) -> Complex64 {
        self.h
    }

    /// Advance `field` by one step. `z` is only used to label errors.
    pub fn apply(&self, field: &Field, z: f64) -> Result<Field> {
        if field.len() != self.lu.len() {
            return Err(BpmError::Domain(format!(
                "field has {} samples, grid has {}",
                field.len(),
                self.lu.len()
            )));
        }
        let rhs = tridiag_matvec(&self.rhs_sub, &self.rhs_diag, &self.rhs_sup, &field.to_vec());
        let next = self
            .lu
            .solve(&rhs)
            .map_err(|e| numerical(z, "solving the Crank-Nicolson system", e))?;
        Ok(Array1::from_vec(next))
    }
}

fn numerical(z: f64, stage: &str, err: TridiagError) -> BpmError {
    BpmError::Numerical { z, message: format!("{stage}: {err}") }
}

/// Advances fields along z through an index profile and optional absorber.
///
/// Stateless: every call samples the profile afresh and leaves the profile
/// and absorber untouched.
pub struct Propagator<'a> {
    grid: &'a Grid,
    profile: &'a dyn IndexProfile,
    absorber: Option<&'a AbsorberProfile>,
}

impl<'a> Propagator<'a> {
    pub fn new(
        grid: &'a Grid,
        profile: &'a dyn IndexProfile,
        absorber: Option<&'a AbsorberProfile>,
    ) -> Result<Self> {
        if let Some(abs) = absorber {
            if abs.len() != grid.nx() {
                return Err(BpmError::Domain(format!(
                    "absorber has {} samples, grid has {}",
                    abs.len(),
                    grid.nx()
                )));
            }
        }
        Ok(Self { grid, profile, absorber })
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    /// Factorised step from `z` to `z + dz`, with the index sampled at the
    /// midpoint `z + dz/2`.
    pub fn prepare(&self, z: f64, dz: f64) -> Result<CrankNicolsonStep> {
        if !dz.is_finite() || dz == 0.0 {
            return Err(BpmError::Numerical {
                z,
                message: format!("degenerate axial step {dz}"),
            });
        }
        let slice = self.profile.sample(z + dz / 2.0);
        CrankNicolsonStep::new(self.grid, &slice, self.absorber, Complex64::new(dz, 0.0), z)
    }

    /// Advance `field` from `z` to `z + dz`, returning the new field.
    pub fn step(&self, field: &Field, z: f64, dz: f64) -> Result<Field> {
        if field.len() != self.grid.nx() {
            return Err(BpmError::Domain(format!(
                "field has {} samples, grid has {}",
                field.len(),
                self.grid.nx()
            )));
        }
        self.prepare(z, dz)?.apply(field, z)
    }
}
