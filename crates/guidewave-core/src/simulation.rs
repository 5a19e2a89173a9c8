//! Full propagation runs.
//!
//! A [`Simulation`] owns the grid, index profile and absorber, steps a launch
//! field from z = 0 to `z_end`, and records snapshots into a
//! [`MonitorRecord`]. Derived quantities (power trace, mode overlaps) are
//! computed from the record afterwards so the stepping loop stays free of
//! reporting logic.

use log::{debug, trace};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::absorber::{AbsorberConfig, AbsorberProfile};
use crate::fields::{overlap, power};
use crate::profile::{validate_slice, IndexProfile};
use crate::solver::{BpmError, CrankNicolsonStep, Propagator, Result};
use crate::types::{Field, Grid, ModeResult, MonitorRecord};

/// Relative slack when deciding whether the last step is a full one.
const STEP_SLACK: f64 = 1e-9;

/// Run length and monitoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Propagation distance (µm).
    pub z_end: f64,
    /// Record every `monitor_stride`-th step (the final step is always recorded).
    #[serde(default = "default_stride")]
    pub monitor_stride: usize,
    /// Refuse runs that would need more steps than this.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

fn default_stride() -> usize {
    1
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { z_end: 0.0, monitor_stride: default_stride(), max_steps: None }
    }
}

/// Power bookkeeping of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub z_end: f64,
    pub steps: usize,
    pub initial_power: f64,
    pub final_power: f64,
    /// (final − initial) / initial.
    pub relative_power_change: f64,
}

/// Owns everything a propagation run needs.
pub struct Simulation {
    grid: Grid,
    profile: Box<dyn IndexProfile>,
    absorber: Option<AbsorberProfile>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(
        grid: Grid,
        profile: Box<dyn IndexProfile>,
        absorber: Option<AbsorberConfig>,
        config: SimulationConfig,
    ) -> Result<Self> {
        if !config.z_end.is_finite() || config.z_end < 0.0 {
            return Err(BpmError::Configuration(format!(
                "z_end must be non-negative and finite, got {}",
                config.z_end
            )));
        }
        if config.monitor_stride == 0 {
            return Err(BpmError::Configuration("monitor_stride must be at least 1".into()));
        }
        let steps = step_count(config.z_end, grid.dz());
        if let Some(cap) = config.max_steps {
            if steps > cap {
                return Err(BpmError::Configuration(format!(
                    "run needs {steps} steps, above the cap of {cap}"
                )));
            }
        }
        let absorber = absorber
            .map(|cfg| AbsorberProfile::new(&grid, &cfg))
            .transpose()?;
        Ok(Self { grid, profile, absorber, config })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn absorber(&self) -> Option<&AbsorberProfile> {
        self.absorber.as_ref()
    }

    pub fn profile(&self) -> &dyn IndexProfile {
        self.profile.as_ref()
    }

    /// Number of axial steps the run will take.
    pub fn steps(&self) -> usize {
        step_count(self.config.z_end, self.grid.dz())
    }

    /// Propagate `initial` from z = 0 to `z_end`.
    pub fn run(&self, initial: Field) -> Result<SimulationResult> {
        let grid = &self.grid;
        if initial.len() != grid.nx() {
            return Err(BpmError::Domain(format!(
                "initial field has {} samples, grid has {}",
                initial.len(),
                grid.nx()
            )));
        }
        validate_slice(grid, &self.profile.sample(0.0))?;

        let propagator = Propagator::new(grid, self.profile.as_ref(), self.absorber.as_ref())?;
        let steps = self.steps();
        let stride = self.config.monitor_stride;
        let dz = grid.dz();
        let mut record = MonitorRecord::with_capacity(steps / stride + 2);
        let mut field = initial;
        let mut z = 0.0;
        record.push(z, &field);

        debug!(
            "propagating {} samples over {} um in {steps} steps (static profile: {})",
            grid.nx(),
            self.config.z_end,
            self.profile.is_static()
        );

        // A static profile has the same full-length step everywhere.
        let shared: Option<CrankNicolsonStep> = if self.profile.is_static() && steps > 0 {
            Some(propagator.prepare(0.0, dz)?)
        } else {
            None
        };
        for k in 1..=steps {
            let h = if k == steps { self.config.z_end - z } else { dz };
            let full_step = (h - dz).abs() <= STEP_SLACK * dz;
            field = match &shared {
                Some(step) if full_step => step.apply(&field, z)?,
                _ => propagator.step(&field, z, h)?,
            };
            z = if k == steps { self.config.z_end } else { k as f64 * dz };

            trace!("z = {z:.4}: power {:.10}", power(&field, grid.dx()));
            if k % stride == 0 || k == steps {
                record.push(z, &field);
            }
        }

        Ok(SimulationResult { record, dx: grid.dx(), steps })
    }
}

/// Number of steps of length `dz` needed to reach `z_end`, the last one
/// possibly shortened.
fn step_count(z_end: f64, dz: f64) -> usize {
    if z_end <= 0.0 {
        return 0;
    }
    (z_end / dz - STEP_SLACK).ceil().max(1.0) as usize
}

/// Monitor record of a finished run plus derived quantities.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    record: MonitorRecord,
    dx: f64,
    steps: usize,
}

impl SimulationResult {
    pub fn record(&self) -> &MonitorRecord {
        &self.record
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Field at the end of the run.
    pub fn final_field(&self) -> Option<&Field> {
        self.record.last().map(|e| &e.field)
    }

    /// (z, power) at every recorded snapshot.
    pub fn powers(&self) -> Vec<(f64, f64)> {
        self.record
            .iter()
            .map(|e| (e.z, power(&e.field, self.dx)))
            .collect()
    }

    /// (z, ⟨A, φ⟩) at every recorded snapshot.
    pub fn mode_overlaps(&self, mode: &ModeResult) -> Vec<(f64, Complex64)> {
        self.record
            .iter()
            .map(|e| (e.z, overlap(&e.field, &mode.field, self.dx)))
            .collect()
    }

    pub fn summary(&self) -> SimulationSummary {
        let initial_power = self.record.first().map_or(0.0, |e| power(&e.field, self.dx));
        let (z_end, final_power) = self
            .record
            .last()
            .map_or((0.0, 0.0), |e| (e.z, power(&e.field, self.dx)));
        let relative_power_change = if initial_power > 0.0 {
            (final_power - initial_power) / initial_power
        } else {
            0.0
        };
        SimulationSummary {
            z_end,
            steps: self.steps,
            initial_power,
            final_power,
            relative_power_change,
        }
    }

    pub fn intensity_map(&self) -> ndarray::Array2<f64> {
        self.record.intensity_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::gaussian;
    use crate::profile::{FnProfile, StaticProfile};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use std::sync::{Arc, Mutex};

    fn grid() -> Grid {
        Grid::new(101, 0.1, 0.05, 1.55, 1.45).unwrap()
    }

    fn config(z_end: f64, stride: usize) -> SimulationConfig {
        SimulationConfig { z_end, monitor_stride: stride, max_steps: None }
    }

    #[test]
    fn test_step_count_lands_on_z_end() {
        assert_eq!(step_count(0.0, 0.05), 0);
        assert_eq!(step_count(10.0, 0.05), 200);
        assert_eq!(step_count(0.12, 0.05), 3);
        assert_eq!(step_count(0.01, 0.05), 1);
    }

    #[test]
    fn test_monitor_stride_and_final_record() {
        let g = grid();
        let sim = Simulation::new(
            g,
            Box::new(StaticProfile::uniform(&g, 1.45)),
            None,
            config(0.5, 4),
        )
        .unwrap();
        let result = sim.run(gaussian(&g, 0.0, 1.0).unwrap()).unwrap();
        let z: Vec<f64> = result.record().positions();
        assert_eq!(result.steps(), 10);
        assert_eq!(z.len(), 4);
        assert_abs_diff_eq!(z[1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(z[2], 0.4, epsilon = 1e-12);
        assert_eq!(z[3], 0.5);
    }

    #[test]
    fn test_partial_last_step() {
        let g = grid();
        let sim = Simulation::new(
            g,
            Box::new(StaticProfile::uniform(&g, 1.45)),
            None,
            config(0.12, 1),
        )
        .unwrap();
        let result = sim.run(gaussian(&g, 0.0, 1.0).unwrap()).unwrap();
        assert_eq!(result.record().positions().last().copied(), Some(0.12));
        assert_eq!(result.record().len(), 4);
    }

    #[test]
    fn test_zero_length_run_records_launch_only() {
        let g = grid();
        let sim = Simulation::new(
            g,
            Box::new(StaticProfile::uniform(&g, 1.45)),
            None,
            SimulationConfig::default(),
        )
        .unwrap();
        let launch = gaussian(&g, 0.0, 1.0).unwrap();
        let result = sim.run(launch.clone()).unwrap();
        assert_eq!(result.record().len(), 1);
        assert_eq!(result.final_field(), Some(&launch));
        assert_eq!(result.summary().relative_power_change, 0.0);
    }

    #[test]
    fn test_static_and_dynamic_paths_agree() {
        let g = grid();
        let slab = StaticProfile::slab(&g, 0.0, 2.0, 1.46, 1.45);
        let index = slab.sample(0.0);
        let launch = gaussian(&g, 0.4, 1.0).unwrap();

        let fixed = Simulation::new(g, Box::new(slab), None, config(1.0, 5)).unwrap();
        let dynamic = Simulation::new(
            g,
            Box::new(FnProfile::new(move |_z| index.clone())),
            None,
            config(1.0, 5),
        )
        .unwrap();

        let a = fixed.run(launch.clone()).unwrap();
        let b = dynamic.run(launch).unwrap();
        for (ea, eb) in a.record().iter().zip(b.record().iter()) {
            assert_eq!(ea.z, eb.z);
            for (p, q) in ea.field.iter().zip(eb.field.iter()) {
                assert!((p - q).norm() < 1e-13);
            }
        }
    }

    /// Slab whose core index rises linearly with z; every sampled z is logged.
    fn ramped_slab(g: &Grid, log: Arc<Mutex<Vec<f64>>>) -> impl IndexProfile {
        let x = g.x();
        FnProfile::new(move |z: f64| {
            log.lock().unwrap().push(z);
            let n_core = 1.46 + 0.2 * z;
            x.mapv(|xi| if xi.abs() < 1.0 { n_core } else { 1.45 })
        })
    }

    #[test]
    fn test_z_varying_profile_is_sampled_at_step_midpoints() {
        let g = grid();
        let dz = g.dz();
        let launch = gaussian(&g, 0.3, 1.0).unwrap();

        let sampled = Arc::new(Mutex::new(Vec::new()));
        let sim = Simulation::new(
            g,
            Box::new(ramped_slab(&g, Arc::clone(&sampled))),
            None,
            config(0.12, 1),
        )
        .unwrap();
        sampled.lock().unwrap().clear();
        let result = sim.run(launch.clone()).unwrap();

        // Launch-plane check, then one midpoint per step; the last step is 0.02 long.
        let expected = [0.0, 0.5 * dz, 1.5 * dz, 2.0 * dz + 0.5 * (0.12 - 2.0 * dz)];
        let seen = sampled.lock().unwrap().clone();
        assert_eq!(seen.len(), expected.len(), "sampled at {seen:?}");
        for (z, e) in seen.iter().zip(expected) {
            assert_abs_diff_eq!(*z, e, epsilon = 1e-15);
        }

        let reference = ramped_slab(&g, Arc::new(Mutex::new(Vec::new())));
        let propagator = Propagator::new(&g, &reference, None).unwrap();
        let mut field = launch;
        for (z, h) in [(0.0, dz), (dz, dz), (2.0 * dz, 0.12 - 2.0 * dz)] {
            field = propagator.step(&field, z, h).unwrap();
        }
        let last = result.final_field().unwrap();
        for (p, q) in last.iter().zip(field.iter()) {
            assert!((p - q).norm() < 1e-13);
        }

        // Sampling at the step start instead would give a measurably different field.
        let mut start_sampled = gaussian(&g, 0.3, 1.0).unwrap();
        for (z, h) in [(0.0, dz), (dz, dz), (2.0 * dz, 0.12 - 2.0 * dz)] {
            let slice = reference.sample(z);
            let step = CrankNicolsonStep::new(&g, &slice, None, Complex64::new(h, 0.0), z).unwrap();
            start_sampled = step.apply(&start_sampled, z).unwrap();
        }
        let gap: f64 = last.iter().zip(start_sampled.iter()).map(|(p, q)| (p - q).norm()).sum();
        assert!(gap > 1e-8, "midpoint and start sampling agree to {gap}");
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let g = grid();
        let uniform = || Box::new(StaticProfile::uniform(&g, 1.45));
        assert!(Simulation::new(g, uniform(), None, config(-1.0, 1)).is_err());
        assert!(Simulation::new(g, uniform(), None, config(1.0, 0)).is_err());
        let capped = SimulationConfig { z_end: 10.0, monitor_stride: 1, max_steps: Some(10) };
        assert!(matches!(
            Simulation::new(g, uniform(), None, capped),
            Err(BpmError::Configuration(_))
        ));
        let bad_absorber = AbsorberConfig::new(1.5, 1.0);
        assert!(Simulation::new(g, uniform(), Some(bad_absorber), config(1.0, 1)).is_err());
    }

    #[test]
    fn test_initial_field_length_is_checked() {
        let g = grid();
        let sim = Simulation::new(g, Box::new(StaticProfile::uniform(&g, 1.45)), None, config(1.0, 1))
            .unwrap();
        let short: Field = Array1::zeros(10);
        assert!(matches!(sim.run(short), Err(BpmError::Domain(_))));
    }
}
