//! Guidewave command-line interface.
//!
//! Run beam propagation jobs from TOML configuration files:
//! ```sh
//! guidewave run job.toml
//! guidewave modes job.toml
//! guidewave sweep job.toml
//! guidewave validate job.toml
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guidewave")]
#[command(about = "Guidewave: 2D paraxial beam propagation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propagate the launch field through the layout.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Solve the guided modes of the layout.
    Modes {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Effective index versus wavelength.
    Sweep {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Guidewave BPM");
            println!("=============");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_propagation(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_intensity {
                runner::write_intensity_csv(&result, &out_dir.join("intensity.csv"))?;
            }
            if job.output.save_power {
                runner::write_power_csv(&result, &out_dir.join("power.csv"))?;
            }
            if job.output.save_index {
                runner::write_index_csv(&result, &out_dir.join("index.csv"))?;
            }
            if job.output.save_json {
                runner::write_summary_json(&result, &out_dir.join("summary.json"))?;
            }

            println!("Propagation complete.");
            Ok(())
        }
        Commands::Modes { config, output } => {
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let modes = runner::solve_modes(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_modes_csv(&modes, &out_dir.join("modes.csv"))?;
            if job.output.save_json {
                runner::write_modes_json(&modes, &out_dir.join("modes.json"))?;
            }

            if modes.converged {
                println!("Mode solve complete.");
            } else {
                println!("Mode solve incomplete: last mode is a best estimate.");
            }
            Ok(())
        }
        Commands::Sweep { config, output } => {
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let points = runner::run_sweep(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_dispersion_csv(&points, &out_dir.join("dispersion.csv"), &job)?;

            println!("Sweep complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            runner::validate_job(&job)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
    }
}
