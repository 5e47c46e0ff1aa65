//! Error taxonomy shared by the verification pipeline

use crate::validation_impl::ErrorTable;
use thiserror::Error;

/// Errors surfaced to the scenario runner. None of them are retried.
#[derive(Error, Debug, Clone)]
pub enum FeffError {
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("active-space electron count mismatch: density trace {trace:.8}, expected {expected}")]
    ElectronCount { trace: f64, expected: usize },

    #[error("invalid active space: {0}")]
    InvalidActiveSpace(String),

    #[error("two-body operator view `{0}` is not populated (built in paaa-only mode)")]
    MissingView(&'static str),

    #[error("unknown on-top functional `{0}`")]
    UnknownFunctional(String),

    #[error("finite-difference reference vanished at step {iteration} (|x| = {norm:.3e})\n{table}")]
    DegenerateDirection {
        iteration: usize,
        norm: f64,
        table: ErrorTable,
    },

    #[error("error ratio did not settle near {target} within {iterations} iterations\n{table}")]
    ConvergenceNotReached {
        iterations: usize,
        target: f64,
        table: ErrorTable,
    },

    #[error("{check} check failed: got {value:.10e}, expected {expected} (tolerance {tolerance:.1e})\n{table}")]
    AssertionFailure {
        check: &'static str,
        value: f64,
        expected: f64,
        tolerance: f64,
        table: ErrorTable,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FeffError>;

impl FeffError {
    /// Error table attached to validator failures, if any
    pub fn table(&self) -> Option<&ErrorTable> {
        match self {
            FeffError::DegenerateDirection { table, .. }
            | FeffError::ConvergenceNotReached { table, .. }
            | FeffError::AssertionFailure { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Whether the validator itself rejected the gradient, as opposed to a
    /// failure while setting the case up
    pub fn is_validation_failure(&self) -> bool {
        self.table().is_some()
    }

    pub(crate) fn dims(context: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(FeffError::DimensionMismatch {
                context,
                expected,
                found,
            })
        }
    }
}
