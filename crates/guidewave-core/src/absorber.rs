//! Absorbing boundary layers.
//!
//! The transverse domain ends in Dirichlet walls, so any light reaching the
//! edge would reflect back into the simulated region. An absorber adds an
//! extinction coefficient κ(x) (imaginary index) that is zero in the core and
//! ramps up polynomially towards both edges:
//!
//! $$
//! \kappa(x) = \kappa_{\max} \left(1 - \frac{x_{\max} - |x|}{w}\right)^m,
//! \qquad w = f \, x_{\max}
//! $$
//!
//! where $f$ is the layer width as a fraction of the half-domain and $m$ the
//! ramp order. A gentle ramp reflects less than an abrupt wall of the same
//! peak strength.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::solver::{BpmError, Result};
use crate::types::Grid;

/// Absorbing layer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsorberConfig {
    /// Layer width on each side as a fraction of the half-domain, in (0, 1).
    pub width_fraction: f64,
    /// Extinction coefficient reached at the edge samples.
    pub peak_strength: f64,
    /// Polynomial order of the ramp.
    #[serde(default = "default_order")]
    pub order: f64,
}

fn default_order() -> f64 {
    2.0
}

impl Default for AbsorberConfig {
    fn default() -> Self {
        Self {
            width_fraction: 0.2,
            peak_strength: 1.0,
            order: default_order(),
        }
    }
}

impl AbsorberConfig {
    pub fn new(width_fraction: f64, peak_strength: f64) -> Self {
        Self { width_fraction, peak_strength, order: default_order() }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.width_fraction > 0.0 && self.width_fraction < 1.0) {
            return Err(BpmError::Configuration(format!(
                "absorber width_fraction must lie in (0, 1), got {}",
                self.width_fraction
            )));
        }
        if !self.peak_strength.is_finite() || self.peak_strength < 0.0 {
            return Err(BpmError::Configuration(format!(
                "absorber peak_strength must be non-negative and finite, got {}",
                self.peak_strength
            )));
        }
        if !self.order.is_finite() || self.order < 1.0 {
            return Err(BpmError::Configuration(format!(
                "absorber order must be at least 1, got {}",
                self.order
            )));
        }
        Ok(())
    }
}

/// Per-sample extinction coefficient derived from a grid and an [`AbsorberConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct AbsorberProfile {
    kappa: Array1<f64>,
}

impl AbsorberProfile {
    pub fn new(grid: &Grid, config: &AbsorberConfig) -> Result<Self> {
        config.validate()?;
        let x_max = grid.x_max();
        let width = config.width_fraction * x_max;
        let kappa = Array1::from_shape_fn(grid.nx(), |j| {
            let to_edge = x_max - grid.x_at(j).abs();
            let t = (1.0 - to_edge / width).max(0.0);
            if t == 0.0 {
                0.0
            } else {
                config.peak_strength * t.powf(config.order)
            }
        });
        Ok(Self { kappa })
    }

    /// An absorber that removes nothing.
    pub fn inactive(grid: &Grid) -> Self {
        Self { kappa: Array1::zeros(grid.nx()) }
    }

    pub fn kappa(&self) -> &Array1<f64> {
        &self.kappa
    }

    pub fn len(&self) -> usize {
        self.kappa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kappa.is_empty()
    }

    /// True when every sample is zero.
    pub fn is_inactive(&self) -> bool {
        self.kappa.iter().all(|&k| k == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::new(101, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    #[test]
    fn test_centre_is_zero_and_edges_hit_peak() {
        let profile = AbsorberProfile::new(&grid(), &AbsorberConfig::new(0.2, 1.0)).unwrap();
        let kappa = profile.kappa();
        assert_eq!(kappa[50], 0.0);
        assert_eq!(kappa[0], 1.0);
        assert_eq!(kappa[100], 1.0);
        // Layer covers the outer 1 um on each side.
        assert_eq!(kappa[60], 0.0);
        assert!(kappa[95] > 0.0 && kappa[95] < 1.0);
    }

    #[test]
    fn test_profile_is_symmetric() {
        let profile = AbsorberProfile::new(&grid(), &AbsorberConfig::new(0.35, 0.7)).unwrap();
        let kappa = profile.kappa();
        for j in 0..kappa.len() {
            assert_eq!(kappa[j], kappa[kappa.len() - 1 - j]);
        }
    }

    #[test]
    fn test_zero_strength_is_inactive() {
        let profile = AbsorberProfile::new(&grid(), &AbsorberConfig::new(0.2, 0.0)).unwrap();
        assert!(profile.is_inactive());
        assert!(AbsorberProfile::inactive(&grid()).is_inactive());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let g = grid();
        for cfg in [
            AbsorberConfig::new(0.0, 1.0),
            AbsorberConfig::new(1.0, 1.0),
            AbsorberConfig::new(0.2, -1.0),
            AbsorberConfig { order: 0.5, ..AbsorberConfig::default() },
        ] {
            assert!(matches!(AbsorberProfile::new(&g, &cfg), Err(BpmError::Configuration(_))));
        }
    }

    #[test]
    fn test_config_from_json_defaults_order() {
        let cfg: AbsorberConfig =
            serde_json::from_str(r#"{"width_fraction": 0.1, "peak_strength": 0.5}"#).unwrap();
        assert_eq!(cfg.order, 2.0);
    }
}
