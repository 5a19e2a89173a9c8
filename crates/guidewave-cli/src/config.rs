//! TOML configuration deserialisation for propagation jobs.

use guidewave_core::{AbsorberConfig, ModeSolverConfig};
use guidewave_layout::Layout;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub grid: GridConfig,
    pub layout: Layout,
    /// Absorbing boundary; omitted means hard (reflecting) edges.
    #[serde(default)]
    pub absorber: Option<AbsorberConfig>,
    #[serde(default)]
    pub launch: Option<LaunchConfig>,
    #[serde(default)]
    pub simulation: Option<RunConfig>,
    #[serde(default)]
    pub modes: ModesConfig,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Transverse grid and wavelength.
#[derive(Debug, Deserialize)]
pub struct GridConfig {
    pub nx: usize,
    /// Transverse sample spacing (µm).
    pub dx: f64,
    /// Axial step (µm).
    pub dz: f64,
    /// Vacuum wavelength (µm).
    pub wavelength: f64,
    /// Reference index. Defaults to the layout background.
    #[serde(default)]
    pub n0: Option<f64>,
}

/// Launch field at z = 0.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchConfig {
    /// Gaussian beam, optionally tilted.
    Gaussian {
        #[serde(default)]
        centre: f64,
        width: f64,
        /// Tilt to the z axis (radians).
        #[serde(default)]
        angle: f64,
    },
    /// Exact mode of a step-index slab.
    SlabMode {
        #[serde(default)]
        centre: f64,
        width: f64,
        n_core: f64,
        /// Defaults to the layout background.
        #[serde(default)]
        n_clad: Option<f64>,
        #[serde(default)]
        mode: usize,
    },
    /// Numerical mode of the layout at z = 0, found with the `[modes]` settings.
    Mode {
        #[serde(default)]
        mode: usize,
    },
}

/// Propagation run settings.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub z_end: f64,
    #[serde(default = "default_stride")]
    pub monitor_stride: usize,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

fn default_stride() -> usize {
    1
}

/// Mode solver settings.
#[derive(Debug, Deserialize)]
pub struct ModesConfig {
    #[serde(flatten)]
    pub solver: ModeSolverConfig,
    /// Number of modes to solve for.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Axial position at which the layout is sliced (µm).
    #[serde(default)]
    pub z: f64,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self { solver: ModeSolverConfig::default(), count: default_count(), z: 0.0 }
    }
}

fn default_count() -> usize {
    1
}

/// Effective index versus wavelength.
#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    pub wavelengths: WavelengthSpec,
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Wavelength specification: either a range or explicit list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range {
        range: [f64; 2],
        points: usize,
    },
    List {
        values: Vec<f64>,
    },
}

impl WavelengthSpec {
    /// Expand into explicit wavelengths (µm).
    pub fn values(&self) -> Vec<f64> {
        match self {
            WavelengthSpec::Range { range, points } => {
                let [start, end] = *range;
                (0..*points)
                    .map(|i| start + (end - start) * i as f64 / (*points - 1).max(1) as f64)
                    .collect()
            }
            WavelengthSpec::List { values } => values.clone(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save the |A|² map as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_intensity: bool,
    /// Whether to save the power trace as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_power: bool,
    /// Whether to save a JSON summary (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
    /// Whether to save the rasterised index map at the monitor planes (default: false).
    #[serde(default)]
    pub save_index: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_intensity: true,
            save_power: true,
            save_json: true,
            save_index: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: JobConfig =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
