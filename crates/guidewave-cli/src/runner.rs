//! Job runner: ties together layout, launch field and engine.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::warn;
use serde::Serialize;

use guidewave_core::analytic::slab_mode_field;
use guidewave_core::fields::{coupling_efficiency, tilted_gaussian};
use guidewave_core::solver::{dispersion_sweep, SweepPoint};
use guidewave_core::{
    AbsorberProfile, BpmError, Field, Grid, ModeResult, ModeSolver, Simulation, SimulationConfig,
    SimulationResult, SimulationSummary,
};
use guidewave_layout::LayoutProfile;

use crate::config::{JobConfig, LaunchConfig};

/// Results from a propagation run.
pub struct PropagationOutput {
    pub grid: Grid,
    pub profile: LayoutProfile,
    pub result: SimulationResult,
    /// Mode the launch field was taken from, if the job launched a mode.
    pub launch_mode: Option<ModeResult>,
}

/// Solved modes of the layout slice.
pub struct ModesOutput {
    pub grid: Grid,
    pub modes: Vec<ModeResult>,
    /// False when the last mode is an unconverged best estimate.
    pub converged: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    version: &'static str,
    grid: &'a Grid,
    summary: SimulationSummary,
    /// Power fraction still in the launch mode at the end of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    final_launch_coupling: Option<f64>,
}

#[derive(Serialize)]
struct ModesReport<'a> {
    version: &'static str,
    grid: &'a Grid,
    converged: bool,
    modes: &'a [ModeResult],
}

pub fn build_grid(job: &JobConfig) -> Result<Grid> {
    let g = &job.grid;
    let n0 = g.n0.unwrap_or(job.layout.background);
    Grid::new(g.nx, g.dx, g.dz, g.wavelength, n0).context("invalid [grid] section")
}

pub fn build_profile(job: &JobConfig, grid: &Grid) -> Result<LayoutProfile> {
    LayoutProfile::new(job.layout.clone(), grid).context("invalid [layout] section")
}

fn mode_solver(job: &JobConfig) -> Result<ModeSolver> {
    ModeSolver::new(job.modes.solver.clone()).context("invalid [modes] section")
}

fn simulation_config(job: &JobConfig) -> Result<SimulationConfig> {
    let Some(run) = &job.simulation else {
        bail!("job has no [simulation] section");
    };
    Ok(SimulationConfig {
        z_end: run.z_end,
        monitor_stride: run.monitor_stride,
        max_steps: run.max_steps,
    })
}

/// Launch field plus the mode it was taken from, if any.
fn build_launch(
    job: &JobConfig,
    grid: &Grid,
    profile: &LayoutProfile,
) -> Result<(Field, Option<ModeResult>)> {
    let Some(launch) = &job.launch else {
        bail!("job has no [launch] section");
    };
    match launch {
        LaunchConfig::Gaussian { centre, width, angle } => {
            let field = tilted_gaussian(grid, *centre, *width, *angle)
                .context("invalid gaussian launch")?;
            Ok((field, None))
        }
        LaunchConfig::SlabMode { centre, width, n_core, n_clad, mode } => {
            let n_clad = n_clad.unwrap_or(job.layout.background);
            let field = slab_mode_field(grid, *width, *n_core, n_clad, *mode, *centre)
                .context("invalid slab_mode launch")?;
            Ok((field, None))
        }
        LaunchConfig::Mode { mode } => {
            let solver = mode_solver(job)?;
            // The solver stops at the last guided mode, so the highest
            // available order is always the last one returned.
            let mut modes = solver
                .solve_profile(grid, profile, 0.0, mode + 1)
                .with_context(|| format!("solving launch mode {mode}"))?;
            let chosen = modes.pop().context("mode solver returned no modes")?;
            let order = modes.len();
            if order != *mode {
                warn!("launch mode {mode} is not guided; launching mode {order} instead");
            }
            println!("  Launch mode {order}: n_eff = {:.8}", chosen.effective_index);
            Ok((chosen.field.clone(), Some(chosen)))
        }
    }
}

/// Build every engine object a job describes without running anything.
pub fn validate_job(job: &JobConfig) -> Result<()> {
    let grid = build_grid(job)?;
    let profile = build_profile(job, &grid)?;
    if let Some(absorber) = &job.absorber {
        AbsorberProfile::new(&grid, absorber).context("invalid [absorber] section")?;
    }
    mode_solver(job)?;
    if job.simulation.is_some() {
        Simulation::new(grid, Box::new(profile), job.absorber, simulation_config(job)?)
            .context("invalid [simulation] section")?;
    }
    if let Some(sweep) = &job.sweep {
        let wavelengths = sweep.wavelengths.values();
        if wavelengths.is_empty() {
            bail!("[sweep] lists no wavelengths");
        }
        for wl in wavelengths {
            grid.with_wavelength(wl).context("invalid [sweep] wavelength")?;
        }
    }
    Ok(())
}

/// Propagate the launch field through the layout.
pub fn run_propagation(job: &JobConfig) -> Result<PropagationOutput> {
    let grid = build_grid(job)?;
    let profile = build_profile(job, &grid)?;
    println!(
        "  Grid: {} samples, dx = {} um, dz = {} um, lambda = {} um, n0 = {}",
        grid.nx(),
        grid.dx(),
        grid.dz(),
        grid.wavelength(),
        grid.n0()
    );
    println!(
        "  Layout: {} structures, index {} to {}",
        job.layout.structures.len(),
        job.layout.background,
        job.layout.max_index()
    );

    let (launch, launch_mode) = build_launch(job, &grid, &profile)?;
    let sim = Simulation::new(grid, Box::new(profile.clone()), job.absorber, simulation_config(job)?)
        .context("invalid [simulation] section")?;
    println!("  Propagating {} um in {} steps", sim.config().z_end, sim.steps());

    let result = sim.run(launch).context("propagation failed")?;
    let summary = result.summary();
    println!(
        "  Power: {:.6} -> {:.6} ({:+.3e} relative)",
        summary.initial_power, summary.final_power, summary.relative_power_change
    );
    Ok(PropagationOutput { grid, profile, result, launch_mode })
}

/// Solve the modes of the layout slice at `[modes].z`.
///
/// A mode that fails to converge is reported as a warning and its best
/// estimate kept, together with the modes before it.
pub fn solve_modes(job: &JobConfig) -> Result<ModesOutput> {
    let grid = build_grid(job)?;
    let profile = build_profile(job, &grid)?;
    let solver = mode_solver(job)?;

    match solver.solve_profile(&grid, &profile, job.modes.z, job.modes.count) {
        Ok(modes) => {
            for (m, mode) in modes.iter().enumerate() {
                println!(
                    "  Mode {m}: n_eff = {:.10}, beta = {:.6} /um",
                    mode.effective_index,
                    mode.propagation_constant(&grid)
                );
            }
            Ok(ModesOutput { grid, modes, converged: true })
        }
        Err(BpmError::Convergence { mode_index, iterations, delta, partial }) => {
            warn!(
                "mode {mode_index} stopped after {iterations} iterations \
                 (relative change {delta:.2e}); keeping best estimate"
            );
            Ok(ModesOutput { grid, modes: partial, converged: false })
        }
        Err(e) => Err(e).context("mode solve failed"),
    }
}

/// Effective index versus wavelength. Failed points are skipped with a warning.
pub fn run_sweep(job: &JobConfig) -> Result<Vec<SweepPoint>> {
    let Some(sweep) = &job.sweep else {
        bail!("job has no [sweep] section");
    };
    let grid = build_grid(job)?;
    let profile = build_profile(job, &grid)?;
    let solver = mode_solver(job)?;
    let wavelengths = sweep.wavelengths.values();
    println!("  Sweeping {} wavelengths, {} modes each", wavelengths.len(), sweep.count);

    let mut points = Vec::with_capacity(wavelengths.len());
    for (wl, outcome) in wavelengths.iter().zip(dispersion_sweep(
        &solver,
        &grid,
        &profile,
        job.modes.z,
        &wavelengths,
        sweep.count,
    )) {
        match outcome {
            Ok(point) => points.push(point),
            Err(e) => warn!("skipping lambda = {wl} um: {e}"),
        }
    }
    if points.is_empty() {
        bail!("every wavelength of the sweep failed");
    }
    Ok(points)
}

fn create(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn write_header(file: &mut std::fs::File, title: &str, grid: &Grid) -> Result<()> {
    writeln!(file, "# Guidewave BPM: {title}")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        file,
        "# nx: {}, dx: {} um, dz: {} um, wavelength: {} um, n0: {}",
        grid.nx(),
        grid.dx(),
        grid.dz(),
        grid.wavelength(),
        grid.n0()
    )?;
    writeln!(file, "#")?;
    Ok(())
}

/// Write the |A|² map in long format (one row per sample per monitor plane).
pub fn write_intensity_csv(output: &PropagationOutput, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    write_header(&mut file, "Intensity Map", &output.grid)?;
    writeln!(file, "z_um,x_um,intensity")?;

    let x = output.grid.x();
    for entry in output.result.record().iter() {
        for (xi, a) in x.iter().zip(entry.field.iter()) {
            writeln!(file, "{:.6},{:.6},{:.6e}", entry.z, xi, a.norm_sqr())?;
        }
    }

    println!("Intensity map written to: {}", path.display());
    Ok(())
}

/// Write total power at each monitor plane.
pub fn write_power_csv(output: &PropagationOutput, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    write_header(&mut file, "Power Trace", &output.grid)?;

    let launch = output.launch_mode.as_ref();
    if launch.is_some() {
        writeln!(file, "z_um,power,launch_mode_coupling")?;
    } else {
        writeln!(file, "z_um,power")?;
    }
    let dx = output.grid.dx();
    for (entry, (z, power)) in output.result.record().iter().zip(output.result.powers()) {
        match launch {
            Some(mode) => {
                let eta = coupling_efficiency(&entry.field, &mode.field, dx);
                writeln!(file, "{z:.6},{power:.10e},{eta:.10e}")?;
            }
            None => writeln!(file, "{z:.6},{power:.10e}")?,
        }
    }

    println!("Power trace written to: {}", path.display());
    Ok(())
}

/// Write the rasterised refractive index at every monitor plane.
pub fn write_index_csv(output: &PropagationOutput, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    write_header(&mut file, "Index Map", &output.grid)?;
    writeln!(file, "z_um,x_um,n")?;

    let positions = output.result.record().positions();
    let map = output.profile.rasterise(&positions);
    let x = output.grid.x();
    for (column, z) in map.columns().into_iter().zip(&positions) {
        for (xi, n) in x.iter().zip(column.iter()) {
            writeln!(file, "{z:.6},{xi:.6},{n:.8}")?;
        }
    }

    println!("Index map written to: {}", path.display());
    Ok(())
}

/// Write the run summary as JSON.
pub fn write_summary_json(output: &PropagationOutput, path: &Path) -> Result<()> {
    let final_launch_coupling = match (&output.launch_mode, output.result.final_field()) {
        (Some(mode), Some(field)) => Some(coupling_efficiency(field, &mode.field, output.grid.dx())),
        _ => None,
    };
    let report = RunReport {
        version: env!("CARGO_PKG_VERSION"),
        grid: &output.grid,
        summary: output.result.summary(),
        final_launch_coupling,
    };
    let json = serde_json::to_string_pretty(&report).context("serialising run summary")?;
    create(path)?.write_all(json.as_bytes())?;

    println!("Summary written to: {}", path.display());
    Ok(())
}

/// Write mode profiles as CSV columns (real and imaginary part per mode).
pub fn write_modes_csv(output: &ModesOutput, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    write_header(&mut file, "Mode Profiles", &output.grid)?;
    for (m, mode) in output.modes.iter().enumerate() {
        writeln!(file, "# mode {m}: n_eff = {:.12}", mode.effective_index)?;
    }
    if !output.converged {
        writeln!(file, "# last mode did not converge; best estimate shown")?;
    }

    let mut header = String::from("x_um");
    for m in 0..output.modes.len() {
        header.push_str(&format!(",mode{m}_re,mode{m}_im"));
    }
    writeln!(file, "{header}")?;

    for (j, xi) in output.grid.x().iter().enumerate() {
        let mut row = format!("{xi:.6}");
        for mode in &output.modes {
            let a = mode.field[j];
            row.push_str(&format!(",{:.10e},{:.10e}", a.re, a.im));
        }
        writeln!(file, "{row}")?;
    }

    println!("Mode profiles written to: {}", path.display());
    Ok(())
}

/// Write solved modes as JSON.
pub fn write_modes_json(output: &ModesOutput, path: &Path) -> Result<()> {
    let report = ModesReport {
        version: env!("CARGO_PKG_VERSION"),
        grid: &output.grid,
        converged: output.converged,
        modes: &output.modes,
    };
    let json = serde_json::to_string_pretty(&report).context("serialising modes")?;
    create(path)?.write_all(json.as_bytes())?;

    println!("Modes (JSON) written to: {}", path.display());
    Ok(())
}

/// Write effective index versus wavelength.
pub fn write_dispersion_csv(points: &[SweepPoint], path: &Path, job: &JobConfig) -> Result<()> {
    let grid = build_grid(job)?;
    let mut file = create(path)?;
    write_header(&mut file, "Dispersion", &grid)?;

    let columns = points.iter().map(|p| p.effective_indices.len()).max().unwrap_or(0);
    let mut header = String::from("wavelength_um");
    for m in 0..columns {
        header.push_str(&format!(",neff_{m}"));
    }
    writeln!(file, "{header}")?;

    for p in points {
        let mut row = format!("{:.6}", p.wavelength);
        for m in 0..columns {
            match p.effective_indices.get(m) {
                Some(n) => row.push_str(&format!(",{n:.10}")),
                None => row.push(','),
            }
        }
        writeln!(file, "{row}")?;
    }

    println!("Dispersion written to: {}", path.display());
    Ok(())
}
