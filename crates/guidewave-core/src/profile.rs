//! Refractive-index profiles.
//!
//! An [`IndexProfile`] produces the transverse index slice n(x) at any axial
//! position z. Static structures are the constant case, so the stepping loop
//! never distinguishes between straight and z-varying geometries.

use ndarray::{Array1, Array2, ArrayView1};

use crate::solver::{BpmError, Result};
use crate::types::Grid;

/// Provides the refractive index n(x, z) sampled on the transverse grid.
///
/// Implementations must be referentially transparent: sampling the same z
/// twice yields identical arrays and has no side effects.
pub trait IndexProfile: Send + Sync {
    /// Absolute refractive index at each transverse sample for position `z`.
    fn sample(&self, z: f64) -> Array1<f64>;

    /// Whether the profile is independent of z. Lets callers reuse a
    /// factorised step across an entire run.
    fn is_static(&self) -> bool {
        false
    }
}

/// A z-invariant profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticProfile {
    index: Array1<f64>,
}

impl StaticProfile {
    pub fn new(index: Array1<f64>) -> Self {
        Self { index }
    }

    /// Uniform medium of index `n`.
    pub fn uniform(grid: &Grid, n: f64) -> Self {
        Self::new(Array1::from_elem(grid.nx(), n))
    }

    /// Symmetric step-index slab: `n_core` for |x − centre| < width/2,
    /// `n_clad` elsewhere.
    pub fn slab(grid: &Grid, centre: f64, width: f64, n_core: f64, n_clad: f64) -> Self {
        let index = grid
            .x()
            .mapv(|x| if (x - centre).abs() < width / 2.0 { n_core } else { n_clad });
        Self::new(index)
    }

    pub fn index(&self) -> ArrayView1<'_, f64> {
        self.index.view()
    }
}

impl IndexProfile for StaticProfile {
    fn sample(&self, _z: f64) -> Array1<f64> {
        self.index.clone()
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// A profile computed by a closure of z.
pub struct FnProfile<F> {
    f: F,
}

impl<F> FnProfile<F>
where
    F: Fn(f64) -> Array1<f64> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IndexProfile for FnProfile<F>
where
    F: Fn(f64) -> Array1<f64> + Send + Sync,
{
    fn sample(&self, z: f64) -> Array1<f64> {
        (self.f)(z)
    }
}

impl<F> std::fmt::Debug for FnProfile<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProfile").finish_non_exhaustive()
    }
}

/// A precomputed index map n(x, z) with one column per tabulated z.
///
/// Between tabulated positions the index is interpolated linearly; outside
/// the table the first or last column is used.
#[derive(Debug, Clone)]
pub struct TabulatedProfile {
    z: Vec<f64>,
    table: Array2<f64>,
}

impl TabulatedProfile {
    /// `table` has shape (nx, nz); `z` holds the nz strictly increasing positions.
    pub fn new(z: Vec<f64>, table: Array2<f64>) -> Result<Self> {
        if z.is_empty() {
            return Err(BpmError::Configuration("tabulated profile needs at least one z position".into()));
        }
        if table.ncols() != z.len() {
            return Err(BpmError::Configuration(format!(
                "table has {} columns but {} z positions were given",
                table.ncols(),
                z.len()
            )));
        }
        if z.windows(2).any(|w| w[1] <= w[0]) || z.iter().any(|v| !v.is_finite()) {
            return Err(BpmError::Configuration("tabulated z positions must be finite and strictly increasing".into()));
        }
        Ok(Self { z, table })
    }

    pub fn positions(&self) -> &[f64] {
        &self.z
    }
}

impl IndexProfile for TabulatedProfile {
    fn sample(&self, z: f64) -> Array1<f64> {
        let last = self.z.len() - 1;
        if z <= self.z[0] {
            return self.table.column(0).to_owned();
        }
        if z >= self.z[last] {
            return self.table.column(last).to_owned();
        }
        // First tabulated position strictly above z.
        let hi = self.z.partition_point(|&zi| zi <= z);
        let lo = hi - 1;
        let t = (z - self.z[lo]) / (self.z[hi] - self.z[lo]);
        let a = self.table.column(lo);
        let b = self.table.column(hi);
        Array1::from_shape_fn(a.len(), |j| a[j] + t * (b[j] - a[j]))
    }

    fn is_static(&self) -> bool {
        self.z.len() == 1
    }
}

/// Check that a sampled slice fits the grid and holds plausible indices.
pub fn validate_slice(grid: &Grid, slice: &Array1<f64>) -> Result<()> {
    if slice.len() != grid.nx() {
        return Err(BpmError::Domain(format!(
            "index profile has {} samples, grid has {}",
            slice.len(),
            grid.nx()
        )));
    }
    if let Some(j) = slice.iter().position(|n| !n.is_finite() || *n <= 0.0) {
        return Err(BpmError::Domain(format!(
            "index profile value {} at sample {j} is not a positive finite index",
            slice[j]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid() -> Grid {
        Grid::new(101, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    #[test]
    fn test_static_profile_ignores_z() {
        let profile = StaticProfile::slab(&grid(), 0.0, 2.0, 1.46, 1.45);
        assert!(profile.is_static());
        assert_eq!(profile.sample(0.0), profile.sample(123.4));
        let slice = profile.sample(0.0);
        assert_eq!(slice[50], 1.46);
        assert_eq!(slice[0], 1.45);
        // |x| < 1 is strict: x = ±1.0 lies in the cladding.
        assert_eq!(slice[40], 1.45);
        assert_eq!(slice[41], 1.46);
    }

    #[test]
    fn test_fn_profile_follows_z() {
        let g = grid();
        let profile = FnProfile::new(move |z| Array1::from_elem(g.nx(), 1.45 + 0.001 * z));
        assert!(!profile.is_static());
        assert_abs_diff_eq!(profile.sample(2.0)[7], 1.452, epsilon = 1e-12);
    }

    #[test]
    fn test_tabulated_profile_interpolates_and_clamps() {
        let mut table = Array2::<f64>::zeros((3, 2));
        table.column_mut(0).fill(1.0);
        table.column_mut(1).fill(2.0);
        let profile = TabulatedProfile::new(vec![0.0, 10.0], table).unwrap();

        assert_eq!(profile.sample(-5.0)[0], 1.0);
        assert_eq!(profile.sample(50.0)[2], 2.0);
        assert_abs_diff_eq!(profile.sample(2.5)[1], 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.sample(10.0)[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tabulated_profile_rejects_bad_axes() {
        let table = Array2::<f64>::ones((3, 2));
        assert!(TabulatedProfile::new(vec![0.0], table.clone()).is_err());
        assert!(TabulatedProfile::new(vec![1.0, 1.0], table).is_err());
    }

    #[test]
    fn test_validate_slice() {
        let g = grid();
        assert!(validate_slice(&g, &Array1::from_elem(101, 1.45)).is_ok());
        assert!(matches!(
            validate_slice(&g, &Array1::from_elem(100, 1.45)),
            Err(BpmError::Domain(_))
        ));
        let mut bad = Array1::from_elem(101, 1.45);
        bad[3] = -1.0;
        assert!(matches!(validate_slice(&g, &bad), Err(BpmError::Domain(_))));
    }
}
