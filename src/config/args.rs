//! Command-line argument parsing

use clap::Parser;

/// Finite-difference verification of MC-PDFT effective Hamiltonians
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override the maximum number of step halvings
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Override the perturbation seed of every case
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep only the norm-ratio check, even when the step cap is reached
    #[arg(long)]
    pub lenient: bool,

    /// Run every case as a negative control
    #[arg(long)]
    pub negative_control: bool,
}
