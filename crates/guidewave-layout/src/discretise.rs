//! Rasterisation of layouts onto the transverse grid.
//!
//! A [`Layout`] is a background index plus an ordered list of
//! [`Structure`]s; later structures paint over earlier ones. A
//! [`LayoutProfile`] binds a layout to a grid and implements
//! [`IndexProfile`], sampling the layout at the grid's transverse
//! coordinates for any z.

use guidewave_core::{Grid, IndexProfile};
use log::{debug, warn};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::primitives::Structure;
use crate::LayoutError;

/// Background index and the structures painted onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub background: f64,
    #[serde(default, rename = "structure")]
    pub structures: Vec<Structure>,
}

impl Layout {
    pub fn new(background: f64) -> Self {
        Self { background, structures: Vec::new() }
    }

    /// Append a structure on top of the existing ones.
    pub fn with(mut self, structure: Structure) -> Self {
        self.structures.push(structure);
        self
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !self.background.is_finite() || self.background <= 0.0 {
            return Err(LayoutError::InvalidBackground(self.background));
        }
        for (position, s) in self.structures.iter().enumerate() {
            s.validate(position)?;
        }
        Ok(())
    }

    /// Refractive index at (x, z): the last structure covering the point, or
    /// the background.
    pub fn index_at(&self, x: f64, z: f64) -> f64 {
        self.structures
            .iter()
            .rev()
            .find_map(|s| s.index_at(x, z))
            .unwrap_or(self.background)
    }

    pub fn is_z_invariant(&self) -> bool {
        self.structures.iter().all(Structure::is_z_invariant)
    }

    /// Highest index anywhere in the layout.
    pub fn max_index(&self) -> f64 {
        self.structures
            .iter()
            .filter_map(|s| match s {
                Structure::Slab(v) => Some(v.index),
                Structure::SBend(v) => Some(v.index),
                Structure::Mmi(v) => Some(v.guide_index.max(v.mmi_index)),
                Structure::Lens(v) => Some(v.index),
            })
            .fold(self.background, f64::max)
    }
}

/// A [`Layout`] sampled on a fixed transverse grid.
#[derive(Debug, Clone)]
pub struct LayoutProfile {
    layout: Layout,
    x: Array1<f64>,
    /// Precomputed slice when nothing varies along z.
    frozen: Option<Array1<f64>>,
}

impl LayoutProfile {
    pub fn new(layout: Layout, grid: &Grid) -> Result<Self, LayoutError> {
        layout.validate()?;
        let x = grid.x();
        let (lo, hi) = (-grid.x_max(), grid.x_max());
        for (position, s) in layout.structures.iter().enumerate() {
            let (a, b) = s.x_extent();
            if b < lo || a > hi {
                warn!(
                    "structure {position} ({}) spans x in [{a}, {b}], outside the window [{lo}, {hi}]",
                    s.kind()
                );
            }
        }

        let frozen = layout
            .is_z_invariant()
            .then(|| x.mapv(|xi| layout.index_at(xi, 0.0)));
        debug!(
            "layout with {} structures on {} samples (z-invariant: {})",
            layout.structures.len(),
            x.len(),
            frozen.is_some()
        );
        Ok(Self { layout, x, frozen })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Index map of shape (nx, positions.len()), one column per z.
    pub fn rasterise(&self, positions: &[f64]) -> Array2<f64> {
        let mut map = Array2::<f64>::zeros((self.x.len(), positions.len()));
        for (mut column, &z) in map.columns_mut().into_iter().zip(positions) {
            column.assign(&self.sample(z));
        }
        map
    }
}

impl IndexProfile for LayoutProfile {
    fn sample(&self, z: f64) -> Array1<f64> {
        match &self.frozen {
            Some(slice) => slice.clone(),
            None => self.x.mapv(|xi| self.layout.index_at(xi, z)),
        }
    }

    fn is_static(&self) -> bool {
        self.frozen.is_some()
    }
}
