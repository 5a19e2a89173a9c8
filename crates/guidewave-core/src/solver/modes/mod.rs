//! Guided-mode solver for a fixed transverse index slice.
//!
//! # Method selection
//!
//! - **Imaginary distance** ([`imaginary`]): repeatedly applies the
//!   Crank–Nicolson step with an imaginary step length, which amplifies the
//!   mode with the highest propagation constant relative to all others.
//!   Higher-order modes are found by projecting out the modes already
//!   converged. Cost per iteration is one tridiagonal solve.
//! - **Direct** ([`direct`]): assembles the discretised operator as a dense
//!   real symmetric matrix and diagonalises it with `nalgebra`. Exact to
//!   round-off but $O(N_x^3)$.
//!
//! Both return modes ordered by decreasing effective index, normalised to
//! unit power with the largest sample real and positive. Only guided modes
//! are returned: modes whose effective index lies above the lowest index of
//! the slice. Everything below that is a radiation mode of the
//! computational box.

pub mod direct;
pub mod imaginary;

use log::warn;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tridiag::count_eigenvalues_above;
use super::{BpmError, Result};
use crate::profile::{validate_slice, IndexProfile};
use crate::types::{Grid, ModeResult};

/// Numerical method used by the [`ModeSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeMethod {
    #[default]
    ImaginaryDistance,
    Direct,
}

/// Mode solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSolverConfig {
    #[serde(default)]
    pub method: ModeMethod,
    /// Relative change in effective index between iterations below which a
    /// mode counts as converged.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Iteration cap per mode.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Imaginary step length (µm). `None` picks $1 / (k_0 \max \Delta n)$.
    #[serde(default)]
    pub step: Option<f64>,
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    10_000
}

impl Default for ModeSolverConfig {
    fn default() -> Self {
        Self {
            method: ModeMethod::default(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            step: None,
        }
    }
}

/// Effective indices of the first modes at one wavelength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub wavelength: f64,
    pub effective_indices: Vec<f64>,
}

/// Computes guided modes of transverse index slices.
#[derive(Debug, Clone, Default)]
pub struct ModeSolver {
    config: ModeSolverConfig,
}

impl ModeSolver {
    pub fn new(config: ModeSolverConfig) -> Result<Self> {
        if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
            return Err(BpmError::Configuration(format!(
                "mode solver tolerance must be positive, got {}",
                config.tolerance
            )));
        }
        if config.max_iterations == 0 {
            return Err(BpmError::Configuration("mode solver needs at least one iteration".into()));
        }
        if let Some(step) = config.step {
            if !step.is_finite() || step <= 0.0 {
                return Err(BpmError::Configuration(format!(
                    "imaginary step must be positive, got {step}"
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModeSolverConfig {
        &self.config
    }

    /// First `count` modes of the index slice `index`, fundamental first.
    pub fn solve(&self, grid: &Grid, index: &Array1<f64>, count: usize) -> Result<Vec<ModeResult>> {
        validate_slice(grid, index)?;
        if count == 0 || count > grid.nx() {
            return Err(BpmError::Configuration(format!(
                "requested {count} modes, must be between 1 and {}",
                grid.nx()
            )));
        }
        let guided = guided_mode_count(grid, index)?;
        if guided == 0 {
            return Err(BpmError::Configuration(format!(
                "index slice guides no modes (no effective index above its lowest index {:.6})",
                lowest_index(index)
            )));
        }
        let count = if count > guided {
            warn!("requested {count} modes but the slice guides only {guided}; returning {guided}");
            guided
        } else {
            count
        };
        match self.config.method {
            ModeMethod::ImaginaryDistance => imaginary::solve(grid, index, count, &self.config),
            ModeMethod::Direct => direct::solve(grid, index, count),
        }
    }

    /// First `count` modes of `profile` sampled at `z`.
    pub fn solve_profile(
        &self,
        grid: &Grid,
        profile: &dyn IndexProfile,
        z: f64,
        count: usize,
    ) -> Result<Vec<ModeResult>> {
        self.solve(grid, &profile.sample(z), count)
    }
}

/// Number of guided modes of `index`: eigenvalues of the discretised
/// operator with an effective index above the lowest index of the slice.
pub fn guided_mode_count(grid: &Grid, index: &Array1<f64>) -> Result<usize> {
    validate_slice(grid, index)?;
    let (diag, coupling) = direct::operator_bands(grid, index);
    let cutoff = grid.k0() * (lowest_index(index) - grid.n0());
    Ok(count_eigenvalues_above(&diag, coupling, cutoff))
}

fn lowest_index(index: &Array1<f64>) -> f64 {
    index.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Effective index of the first `count` modes of `profile` (sampled at `z`)
/// at each wavelength, fewer where the slice guides fewer. Wavelengths are
/// solved in parallel; each point succeeds or fails independently.
pub fn dispersion_sweep(
    solver: &ModeSolver,
    grid: &Grid,
    profile: &dyn IndexProfile,
    z: f64,
    wavelengths: &[f64],
    count: usize,
) -> Vec<Result<SweepPoint>> {
    let index = profile.sample(z);
    wavelengths
        .par_iter()
        .map(|&wavelength| {
            let local = grid.with_wavelength(wavelength)?;
            let modes = solver.solve(&local, &index, count)?;
            Ok(SweepPoint {
                wavelength,
                effective_indices: modes.iter().map(|m| m.effective_index).collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::StaticProfile;

    fn grid() -> Grid {
        Grid::new(101, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(ModeSolver::new(ModeSolverConfig { tolerance: 0.0, ..Default::default() }).is_err());
        assert!(ModeSolver::new(ModeSolverConfig { max_iterations: 0, ..Default::default() }).is_err());
        assert!(ModeSolver::new(ModeSolverConfig { step: Some(-1.0), ..Default::default() }).is_err());
        assert!(ModeSolver::new(ModeSolverConfig::default()).is_ok());
    }

    #[test]
    fn test_mode_count_bounds() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        let solver = ModeSolver::default();
        assert!(matches!(solver.solve(&g, &index, 0), Err(BpmError::Configuration(_))));
        assert!(matches!(solver.solve(&g, &index, 102), Err(BpmError::Configuration(_))));
    }

    #[test]
    fn test_wrong_slice_length_is_domain_error() {
        let g = grid();
        let index = Array1::from_elem(99, 1.45);
        assert!(matches!(ModeSolver::default().solve(&g, &index, 1), Err(BpmError::Domain(_))));
    }

    #[test]
    fn test_guided_mode_count() {
        let g = grid();
        let weak = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        assert_eq!(guided_mode_count(&g, &weak).unwrap(), 1);
        let flat = StaticProfile::uniform(&g, 1.45).sample(0.0);
        assert_eq!(guided_mode_count(&g, &flat).unwrap(), 0);

        let wide = Grid::new(201, 0.1, 0.05, 1.55, 1.45).unwrap();
        let two_mode = StaticProfile::slab(&wide, 0.0, 4.0, 1.5, 1.45).sample(0.0);
        assert_eq!(guided_mode_count(&wide, &two_mode).unwrap(), 2);

        let short = Array1::from_elem(50, 1.45);
        assert!(matches!(guided_mode_count(&g, &short), Err(BpmError::Domain(_))));
    }

    #[test]
    fn test_request_beyond_guided_modes_is_clamped() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        for method in [ModeMethod::Direct, ModeMethod::ImaginaryDistance] {
            let solver = ModeSolver::new(ModeSolverConfig { method, ..Default::default() }).unwrap();
            let modes = solver.solve(&g, &index, 3).unwrap();
            assert_eq!(modes.len(), 1, "{method:?}");
            assert!(modes[0].effective_index > 1.45 && modes[0].effective_index < 1.46);
        }
    }

    #[test]
    fn test_unguided_slice_is_configuration_error() {
        let g = grid();
        let flat = StaticProfile::uniform(&g, 1.45).sample(0.0);
        for method in [ModeMethod::Direct, ModeMethod::ImaginaryDistance] {
            let solver = ModeSolver::new(ModeSolverConfig { method, ..Default::default() }).unwrap();
            assert!(matches!(solver.solve(&g, &flat, 1), Err(BpmError::Configuration(_))));
        }
    }

    #[test]
    fn test_config_deserialises_with_defaults() {
        let cfg: ModeSolverConfig = serde_json::from_str(r#"{"method": "direct"}"#).unwrap();
        assert_eq!(cfg.method, ModeMethod::Direct);
        assert_eq!(cfg.tolerance, 1e-8);
        assert_eq!(cfg.max_iterations, 10_000);
        assert_eq!(cfg.step, None);
    }

    #[test]
    fn test_sweep_effective_index_rises_at_shorter_wavelength() {
        let g = grid();
        let profile = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45);
        let solver = ModeSolver::new(ModeSolverConfig {
            method: ModeMethod::Direct,
            ..Default::default()
        })
        .unwrap();
        let points = dispersion_sweep(&solver, &g, &profile, 0.0, &[1.55, 1.31, 1.0], 1);
        let neff: Vec<f64> = points
            .into_iter()
            .map(|p| p.unwrap().effective_indices[0])
            .collect();
        assert!(neff[0] < neff[1] && neff[1] < neff[2], "neff = {neff:?}");
    }
}
