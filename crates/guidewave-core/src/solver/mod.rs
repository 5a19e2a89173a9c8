//! Propagation and mode-solving engine.
//!
//! The [`propagator`] module advances a field along z with a Crank–Nicolson
//! discretisation of the paraxial wave equation; [`modes`] finds guided
//! eigenmodes of a fixed index slice, either by imaginary-distance
//! propagation or by direct eigen-decomposition. Both reduce each step to a
//! complex tridiagonal solve ([`tridiag`]).

pub mod modes;
pub mod propagator;
pub mod tridiag;

pub use modes::{
    dispersion_sweep, guided_mode_count, ModeMethod, ModeSolver, ModeSolverConfig, SweepPoint,
};
pub use propagator::{CrankNicolsonStep, Propagator};

use thiserror::Error;

use crate::types::ModeResult;

/// Errors raised by the engine.
///
/// Configuration and domain errors mean the caller must fix its inputs.
/// Numerical errors abort the current run. A convergence error is the only
/// soft failure: it carries every mode found so far together with the
/// best estimate of the mode that failed to converge.
#[derive(Debug, Error)]
pub enum BpmError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Domain mismatch: {0}")]
    Domain(String),

    #[error("Numerical failure at z = {z:.4} um: {message}")]
    Numerical { z: f64, message: String },

    #[error("Mode {mode_index} did not converge after {iterations} iterations (last relative change {delta:.2e})")]
    Convergence {
        mode_index: usize,
        iterations: usize,
        delta: f64,
        /// Converged modes `0..mode_index` followed by the best estimate for `mode_index`.
        partial: Vec<ModeResult>,
    },
}

impl BpmError {
    /// Best-so-far estimate of the mode that failed to converge.
    pub fn best_estimate(&self) -> Option<&ModeResult> {
        match self {
            BpmError::Convergence { partial, .. } => partial.last(),
            _ => None,
        }
    }

    /// Whether the error still carries a usable approximate result.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BpmError::Convergence { .. })
    }
}

pub type Result<T> = std::result::Result<T, BpmError>;
