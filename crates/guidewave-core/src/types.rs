//! Core types shared across the Guidewave engine.
//!
//! This module defines the fundamental data structures used throughout the
//! propagation pipeline: the computational grid, the complex field, solved
//! modes, and the monitor record accumulated by a simulation run.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::fields;
use crate::solver::{BpmError, Result};

/// Complex field amplitude sampled on the transverse grid at one axial position.
pub type Field = Array1<Complex64>;

/// Transverse discretisation and propagation parameters.
///
/// All lengths are in micrometres. A grid is validated once at construction
/// and never mutated afterwards; [`Grid::with_wavelength`] derives a new,
/// validated grid for wavelength sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Grid {
    nx: usize,
    dx: f64,
    dz: f64,
    wavelength: f64,
    n0: f64,
}

impl Grid {
    /// Create a grid of `nx` transverse samples spaced by `dx`, with axial
    /// step `dz`, free-space wavelength `wavelength` and reference index `n0`.
    pub fn new(nx: usize, dx: f64, dz: f64, wavelength: f64, n0: f64) -> Result<Self> {
        if nx < 3 {
            return Err(BpmError::Configuration(format!(
                "grid needs at least 3 transverse points, got {nx}"
            )));
        }
        for (name, value) in [("dx", dx), ("dz", dz), ("wavelength", wavelength), ("n0", n0)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(BpmError::Configuration(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        Ok(Self { nx, dx, dz, wavelength, n0 })
    }

    /// Same grid at a different free-space wavelength.
    pub fn with_wavelength(&self, wavelength: f64) -> Result<Self> {
        Self::new(self.nx, self.dx, self.dz, wavelength, self.n0)
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn dz(&self) -> f64 {
        self.dz
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    pub fn n0(&self) -> f64 {
        self.n0
    }

    /// Free-space wavenumber $k_0 = 2\pi / \lambda$.
    pub fn k0(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength
    }

    /// Reference wavenumber $\bar{k} = k_0 n_0$ carried by the slowly varying envelope.
    pub fn reference_wavenumber(&self) -> f64 {
        self.k0() * self.n0
    }

    /// Distance from the centre to either edge sample.
    pub fn x_max(&self) -> f64 {
        self.centre_offset() * self.dx
    }

    /// Total transverse extent, edge sample to edge sample.
    pub fn width(&self) -> f64 {
        (self.nx - 1) as f64 * self.dx
    }

    /// Transverse coordinate of sample `j`.
    pub fn x_at(&self, j: usize) -> f64 {
        (j as f64 - self.centre_offset()) * self.dx
    }

    /// Transverse coordinates, symmetric about zero.
    pub fn x(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.nx, |j| self.x_at(j))
    }

    fn centre_offset(&self) -> f64 {
        (self.nx - 1) as f64 / 2.0
    }
}

/// A guided mode of a transverse index slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResult {
    /// Effective index $n_{\text{eff}} = \beta / k_0$.
    pub effective_index: f64,
    /// Mode profile, normalised to $\sum |A|^2 \Delta x = 1$.
    pub field: Field,
}

impl ModeResult {
    /// Full propagation constant $\beta = k_0 n_{\text{eff}}$ (µm⁻¹).
    pub fn propagation_constant(&self, grid: &Grid) -> f64 {
        grid.k0() * self.effective_index
    }

    /// |A|² at each sample.
    pub fn intensity(&self) -> Array1<f64> {
        self.field.mapv(|a| a.norm_sqr())
    }
}

/// A single field snapshot taken by a simulation monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEntry {
    /// Axial position of the snapshot (µm).
    pub z: f64,
    /// Field at `z`. Owned copy, independent of the live working field.
    pub field: Field,
}

/// Append-only sequence of field snapshots ordered by increasing z.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorRecord {
    entries: Vec<MonitorEntry>,
}

impl MonitorRecord {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub(crate) fn push(&mut self, z: f64, field: &Field) {
        self.entries.push(MonitorEntry { z, field: field.clone() });
    }

    pub fn entries(&self) -> &[MonitorEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&MonitorEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&MonitorEntry> {
        self.entries.last()
    }

    /// Axial positions of all snapshots.
    pub fn positions(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.z).collect()
    }

    /// Total power $\sum |A|^2 \Delta x$ of each snapshot.
    pub fn powers(&self, dx: f64) -> Vec<f64> {
        self.entries.iter().map(|e| fields::power(&e.field, dx)).collect()
    }

    /// Intensity map |A|², shape (snapshots, nx).
    pub fn intensity_map(&self) -> Array2<f64> {
        let nx = self.entries.first().map_or(0, |e| e.field.len());
        let mut map = Array2::<f64>::zeros((self.entries.len(), nx));
        for (mut row, entry) in map.rows_mut().into_iter().zip(&self.entries) {
            row.assign(&entry.field.mapv(|a| a.norm_sqr()));
        }
        map
    }
}
