//! Logging setup and report output

mod output;

pub use output::{setup_output, write_error_table};
