//! Imaginary-distance mode solving.
//!
//! Substituting $h = -i\tau$ into the Crank–Nicolson step gives the map
//!
//! $$
//! A^{+} = \left(I - \tfrac{\tau}{2} H\right)^{-1} \left(I + \tfrac{\tau}{2} H\right) A
//! $$
//!
//! which multiplies an eigenmode with propagation-constant correction β by
//! $g(\beta) = (1 + \tau\beta/2) / (1 - \tau\beta/2)$. For $\tau\beta/2 < 1$ the
//! gain grows with β, so repeated application converges to the mode with the
//! largest β. The measured gain is inverted to
//! $\beta = (2/\tau)(g - 1)/(g + 1)$ and $n_{\text{eff}} = n_0 + \beta / k_0$.
//!
//! The default step $\tau = 1/(k_0 \max\Delta n)$ keeps every guided mode at
//! $\tau\beta/2 \le 1/2$, well away from the pole of $g$.

use log::{debug, warn};
use ndarray::Array1;
use num_complex::Complex64;

use super::ModeSolverConfig;
use crate::fields::{fix_phase, normalize, overlap};
use crate::solver::{BpmError, CrankNicolsonStep, Result};
use crate::types::{Field, Grid, ModeResult};

pub(super) fn solve(
    grid: &Grid,
    index: &Array1<f64>,
    count: usize,
    config: &ModeSolverConfig,
) -> Result<Vec<ModeResult>> {
    let k0 = grid.k0();
    let n0 = grid.n0();
    let dx = grid.dx();
    let tau = config.step.unwrap_or_else(|| default_step(grid, index));
    let step = CrankNicolsonStep::new(grid, index, None, Complex64::new(0.0, -tau), 0.0)?;

    let mut modes: Vec<ModeResult> = Vec::with_capacity(count);
    for mode_index in 0..count {
        let mut field = trial_field(grid, index);
        deflate(&mut field, &modes, dx);
        renormalize(&mut field, dx, mode_index)?;

        let mut neff = n0;
        let mut previous = f64::NAN;
        let mut delta = f64::INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_iterations {
            iterations += 1;
            let next = step.apply(&field, 0.0)?;
            let gain = overlap(&next, &field, dx);
            let beta = (2.0 / tau) * ((gain - 1.0) / (gain + 1.0)).re;
            neff = n0 + beta / k0;

            field = next;
            deflate(&mut field, &modes, dx);
            renormalize(&mut field, dx, mode_index)?;

            if iterations >= 2 {
                delta = ((neff - previous) / neff.abs().max(f64::MIN_POSITIVE)).abs();
                if delta < config.tolerance {
                    converged = true;
                    break;
                }
            }
            previous = neff;
        }

        fix_phase(&mut field);
        let mode = ModeResult { effective_index: neff, field };

        if !converged {
            warn!(
                "mode {mode_index} not converged after {iterations} iterations \
                 (relative change {delta:.2e}, neff ~ {neff:.8})"
            );
            let mut partial = modes;
            partial.push(mode);
            return Err(BpmError::Convergence { mode_index, iterations, delta, partial });
        }

        debug!("mode {mode_index}: neff = {neff:.10} after {iterations} iterations");
        modes.push(mode);
    }
    Ok(modes)
}

/// $1 / (k_0 \max \Delta n)$, or the grid step when nothing guides.
fn default_step(grid: &Grid, index: &Array1<f64>) -> f64 {
    let max_dn = index.iter().map(|n| n - grid.n0()).fold(f64::NEG_INFINITY, f64::max);
    if max_dn > 0.0 {
        1.0 / (grid.k0() * max_dn)
    } else {
        grid.dz()
    }
}

/// Deterministic start vector with both even and odd content about the
/// centre of the high-index region.
fn trial_field(grid: &Grid, index: &Array1<f64>) -> Field {
    let n_min = index.iter().copied().fold(f64::INFINITY, f64::min);
    let x = grid.x();
    let weight: f64 = index.iter().map(|n| n - n_min).sum();
    let centre = if weight > 0.0 {
        x.iter().zip(index.iter()).map(|(xi, n)| xi * (n - n_min)).sum::<f64>() / weight
    } else {
        0.0
    };
    let width = grid.x_max() / 2.0;
    x.mapv(|xi| {
        let u = (xi - centre) / width;
        Complex64::new((-u * u).exp() * (1.0 + u + 0.5 * u * u), 0.0)
    })
}

/// Remove the components along already-converged (unit-power) modes.
fn deflate(field: &mut Field, modes: &[ModeResult], dx: f64) {
    for mode in modes {
        let c = overlap(field, &mode.field, dx);
        field.zip_mut_with(&mode.field, |a, &m| *a -= c * m);
    }
}

fn renormalize(field: &mut Field, dx: f64, mode_index: usize) -> Result<()> {
    normalize(field, dx).map_err(|_| BpmError::Numerical {
        z: 0.0,
        message: format!("field for mode {mode_index} vanished during imaginary-distance iteration"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::power;
    use crate::profile::{IndexProfile, StaticProfile};
    use approx::assert_abs_diff_eq;

    fn grid() -> Grid {
        Grid::new(101, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    #[test]
    fn test_fundamental_mode_of_slab() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        let modes = solve(&g, &index, 1, &ModeSolverConfig::default()).unwrap();
        let mode = &modes[0];
        assert!(mode.effective_index > 1.45 && mode.effective_index < 1.46);
        assert_abs_diff_eq!(power(&mode.field, g.dx()), 1.0, epsilon = 1e-10);
        // Even mode peaked at the centre.
        assert_abs_diff_eq!(mode.field[50].im, 0.0, epsilon = 1e-12);
        assert!((mode.field[30] - mode.field[70]).norm() < 1e-4);
    }

    #[test]
    fn test_default_step_from_index_contrast() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.47, 1.45).sample(0.0);
        assert_abs_diff_eq!(default_step(&g, &index), 1.0 / (g.k0() * 0.02), epsilon = 1e-9);
        let flat = StaticProfile::uniform(&g, 1.45).sample(0.0);
        assert_eq!(default_step(&g, &flat), g.dz());
    }

    #[test]
    fn test_iteration_cap_reports_best_estimate() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        let config = ModeSolverConfig { max_iterations: 3, tolerance: 1e-15, ..Default::default() };
        let err = solve(&g, &index, 1, &config).unwrap_err();
        assert!(err.is_recoverable());
        match &err {
            BpmError::Convergence { mode_index, iterations, partial, .. } => {
                assert_eq!(*mode_index, 0);
                assert_eq!(*iterations, 3);
                assert_eq!(partial.len(), 1);
            }
            other => panic!("expected convergence error, got {other:?}"),
        }
        let best = err.best_estimate().unwrap();
        assert!(best.effective_index > 1.44 && best.effective_index < 1.46);
        assert_abs_diff_eq!(power(&best.field, g.dx()), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_deflation_leaves_field_orthogonal() {
        let g = grid();
        let index = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45).sample(0.0);
        let modes = solve(&g, &index, 1, &ModeSolverConfig::default()).unwrap();
        let mut field = trial_field(&g, &index);
        deflate(&mut field, &modes, g.dx());
        assert!(overlap(&field, &modes[0].field, g.dx()).norm() < 1e-12);
    }
}
