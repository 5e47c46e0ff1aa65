//! Effective Hamiltonian verification command-line interface
//!
//! Reads a YAML configuration, builds the model systems and runs every
//! listed finite-difference case.

use color_eyre::eyre::Result;
use feff_check::app::FeffCheckApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    FeffCheckApplication::from_cli()?.run()
}
