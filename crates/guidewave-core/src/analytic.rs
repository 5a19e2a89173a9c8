//! Guided modes of a symmetric step-index slab.
//!
//! Exact TE solutions of the scalar Helmholtz equation for a core of width
//! $d$ and index $n_1$ embedded in cladding of index $n_2$. Used as the
//! reference when validating the numerical mode solvers.
//!
//! With $a = d/2$, $k_x = \sqrt{k_0^2 n_1^2 - \beta^2}$ and
//! $\kappa = \sqrt{\beta^2 - k_0^2 n_2^2}$, the dispersion relations are
//!
//! $$ k_x \tan(k_x a) = \kappa \quad \text{(even)}, \qquad
//!    -k_x \cot(k_x a) = \kappa \quad \text{(odd)}. $$
//!
//! Both are multiplied through by the trigonometric denominator before root
//! finding so the scanned functions have no poles.
//!
//! # Reference
//! Okamoto, *Fundamentals of Optical Waveguides*, 2nd ed. (2006), ch. 2.

use std::f64::consts::PI;

use log::warn;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::fields::normalize;
use crate::solver::{BpmError, Result};
use crate::types::{Field, Grid};

/// Scan resolution over the guided range of β.
const SCAN_POINTS: usize = 2000;
const BISECTION_STEPS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlabParity {
    Even,
    Odd,
}

/// One guided mode of the slab.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlabMode {
    pub parity: SlabParity,
    /// Propagation constant β (rad/µm).
    pub beta: f64,
    pub effective_index: f64,
    /// Transverse wavenumber in the core.
    pub kx: f64,
    /// Decay constant in the cladding.
    pub kappa: f64,
}

impl SlabMode {
    /// Mode shape for a core of width `width` centred at `x0`, sampled on
    /// `grid` and normalised to unit power.
    pub fn profile(&self, grid: &Grid, width: f64, x0: f64) -> Result<Field> {
        let a = width / 2.0;
        let mut field: Field = grid
            .x()
            .iter()
            .map(|&x| Complex64::new(self.amplitude(x - x0, a), 0.0))
            .collect();
        normalize(&mut field, grid.dx())?;
        Ok(field)
    }

    fn amplitude(&self, x: f64, a: f64) -> f64 {
        let inside = x.abs() <= a;
        match self.parity {
            SlabParity::Even if inside => (self.kx * x).cos(),
            SlabParity::Even => (self.kx * a).cos() * (-self.kappa * (x.abs() - a)).exp(),
            SlabParity::Odd if inside => (self.kx * x).sin(),
            SlabParity::Odd => {
                x.signum() * (self.kx * a).sin() * (-self.kappa * (x.abs() - a)).exp()
            }
        }
    }
}

/// All guided TE modes of the slab, ordered by decreasing β.
///
/// Fails with a configuration error for non-physical inputs or when the
/// slab guides nothing (`n_core <= n_clad`).
pub fn slab_modes(width: f64, n_core: f64, n_clad: f64, wavelength: f64) -> Result<Vec<SlabMode>> {
    for (name, value) in [("width", width), ("n_core", n_core), ("n_clad", n_clad), ("wavelength", wavelength)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(BpmError::Configuration(format!(
                "slab {name} must be positive and finite, got {value}"
            )));
        }
    }
    if n_core <= n_clad {
        return Err(BpmError::Configuration(format!(
            "slab core index {n_core} does not exceed cladding index {n_clad}"
        )));
    }

    let k0 = 2.0 * PI / wavelength;
    let a = width / 2.0;
    let beta_lo = k0 * n_clad;
    let beta_hi = k0 * n_core;
    let wavenumbers = |beta: f64| {
        let kx = (beta_hi * beta_hi - beta * beta).max(0.0).sqrt();
        let kappa = (beta * beta - beta_lo * beta_lo).max(0.0).sqrt();
        (kx, kappa)
    };
    let even = |beta: f64| {
        let (kx, kappa) = wavenumbers(beta);
        kx * (kx * a).sin() - kappa * (kx * a).cos()
    };
    let odd = |beta: f64| {
        let (kx, kappa) = wavenumbers(beta);
        kx * (kx * a).cos() + kappa * (kx * a).sin()
    };

    let scans: [(SlabParity, &dyn Fn(f64) -> f64); 2] =
        [(SlabParity::Even, &even), (SlabParity::Odd, &odd)];
    let mut modes = Vec::new();
    for (parity, f) in scans {
        let span = beta_hi - beta_lo;
        let mut prev_beta = beta_lo + span / (SCAN_POINTS as f64 + 1.0);
        let mut prev = f(prev_beta);
        for i in 2..=SCAN_POINTS {
            let beta = beta_lo + span * i as f64 / (SCAN_POINTS as f64 + 1.0);
            let value = f(beta);
            if prev == 0.0 || prev.signum() != value.signum() {
                let root = bisect(f, prev_beta, beta);
                let (kx, kappa) = wavenumbers(root);
                modes.push(SlabMode { parity, beta: root, effective_index: root / k0, kx, kappa });
            }
            prev_beta = beta;
            prev = value;
        }
    }

    if modes.is_empty() {
        return Err(BpmError::Configuration(format!(
            "slab of width {width} guides no mode at wavelength {wavelength}"
        )));
    }
    modes.sort_by(|p, q| q.beta.total_cmp(&p.beta));
    Ok(modes)
}

fn bisect(f: &dyn Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> f64 {
    let mut f_lo = f(lo);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_lo == 0.0 {
            return lo;
        }
        if f_lo.signum() == f_mid.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Launch field shaped like the `mode_index`-th slab mode.
///
/// An index past the last guided mode is clamped to the highest-order one.
pub fn slab_mode_field(
    grid: &Grid,
    width: f64,
    n_core: f64,
    n_clad: f64,
    mode_index: usize,
    x0: f64,
) -> Result<Field> {
    let modes = slab_modes(width, n_core, n_clad, grid.wavelength())?;
    let last = modes.len() - 1;
    if mode_index > last {
        warn!("slab guides {} modes, launching mode {last} instead of {mode_index}", modes.len());
    }
    modes[mode_index.min(last)].profile(grid, width, x0)
}
