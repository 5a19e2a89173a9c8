//! # Guidewave Core
//!
//! The numerical backbone of Guidewave: a two-dimensional paraxial beam
//! propagation engine. A scalar field $A(x, z)$ on a uniform transverse grid
//! is advanced along $z$ by a Crank–Nicolson discretisation of
//!
//! $$ \frac{\partial A}{\partial z} = \frac{i}{2\bar k}\frac{\partial^2 A}{\partial x^2}
//!    + i k_0 \left[(n - n_0) + i\kappa\right] A, $$
//!
//! where $\bar k = k_0 n_0$ and $\kappa$ is the absorbing boundary profile.
//!
//! ## Architecture
//!
//! An [`profile::IndexProfile`] supplies $n(x)$ at any $z$. The
//! [`solver::Propagator`] turns a slice into a factorised
//! [`solver::CrankNicolsonStep`]; the [`simulation::Simulation`] drives steps
//! and fills a [`types::MonitorRecord`]. The [`solver::ModeSolver`] finds
//! guided modes either by imaginary-distance propagation through the same
//! step machinery or by direct diagonalisation.
//!
//! ## Modules
//!
//! - [`types`]: Grid, fields, mode results and monitor records.
//! - [`profile`]: Refractive index profiles.
//! - [`absorber`]: Absorbing boundary layer.
//! - [`solver`]: Tridiagonal kernel, propagator and mode solvers.
//! - [`simulation`]: Full propagation runs.
//! - [`fields`]: Power, overlaps and launch fields.
//! - [`analytic`]: Exact slab waveguide modes for validation.

pub mod absorber;
pub mod analytic;
pub mod fields;
pub mod profile;
pub mod simulation;
pub mod solver;
pub mod types;

pub use absorber::{AbsorberConfig, AbsorberProfile};
pub use profile::{FnProfile, IndexProfile, StaticProfile, TabulatedProfile};
pub use simulation::{Simulation, SimulationConfig, SimulationResult, SimulationSummary};
pub use solver::{BpmError, ModeMethod, ModeSolver, ModeSolverConfig, Propagator};
pub use types::{Field, Grid, ModeResult, MonitorRecord};
