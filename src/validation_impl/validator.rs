//! Shrink loop of the convergence-order check
//!
//! The direction is halved at every step. If the analytic gradient is the
//! exact first derivative of the reference quantity, the relative error is a
//! first-order Taylor remainder and halves with the step, so the ratio of
//! consecutive errors tends to 0.5.

extern crate nalgebra as na;

use super::table::ErrorTable;
use crate::error::{FeffError, Result};
use na::DVector;
use tracing::{debug, info, warn};

/// Thresholds of the shrink loop and of the terminal checks
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorSettings {
    /// Hard cap on the number of halvings
    pub max_iterations: usize,
    /// Expected ratio of consecutive rows (step halving)
    pub target_ratio: f64,
    /// Window of error ratios inspected by the early stop
    pub ratio_window: usize,
    /// Early stop: distance of each windowed error ratio from the target
    pub ratio_tolerance: f64,
    /// Early stop: the latest relative error must be below this floor
    pub error_floor: f64,
    /// Terminal check on the norm column (step-halving sanity)
    pub norm_ratio_tolerance: f64,
    /// Enables the error-magnitude and error-ratio terminal checks. When
    /// off, a run that exhausts the cap is judged by the norm ratio alone.
    pub strict: bool,
    pub strict_error: f64,
    pub strict_ratio_tolerance: f64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        ValidatorSettings {
            max_iterations: 20,
            target_ratio: 0.5,
            ratio_window: 3,
            ratio_tolerance: 0.01,
            error_floor: 1e-3,
            norm_ratio_tolerance: 5e-10,
            strict: true,
            strict_error: 1e-3,
            strict_ratio_tolerance: 0.05,
        }
    }
}

/// Outcome of a passing validation run
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub iterations: usize,
    pub final_norm_ratio: f64,
    pub final_error_ratio: f64,
    pub final_error: f64,
    pub table: ErrorTable,
}

pub struct ConvergenceValidator {
    settings: ValidatorSettings,
}

impl ConvergenceValidator {
    pub fn new(settings: ValidatorSettings) -> Self {
        ConvergenceValidator { settings }
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Run the shrink loop.
    ///
    /// `reference(x)` must return the change of the reference quantity when
    /// the baseline state is displaced by `x`. It is called once per step with
    /// `x = direction / 2^p`; the analytic prediction is `gradient . x`.
    pub fn validate<F>(
        &self,
        gradient: &DVector<f64>,
        direction: &DVector<f64>,
        mut reference: F,
    ) -> Result<ValidationReport>
    where
        F: FnMut(&DVector<f64>) -> Result<f64>,
    {
        FeffError::dims(
            "perturbation direction vs gradient",
            gradient.len(),
            direction.len(),
        )?;
        let s = &self.settings;
        let mut table = ErrorTable::new();
        let mut converged = false;

        info!("-------------------------------------------");
        info!("  Convergence-order check ({} steps max)", s.max_iterations);
        info!("-------------------------------------------");

        for p in 0..s.max_iterations {
            let x = direction / 2f64.powi(p as i32);
            let norm = x.norm();
            let dg_analytic = gradient.dot(&x);
            let dg_reference = reference(&x)?;

            if dg_reference == 0.0 {
                warn!("Reference change vanished at step {} (|x| = {:.3e})", p, norm);
                return Err(FeffError::DegenerateDirection {
                    iteration: p,
                    norm,
                    table,
                });
            }

            let err = ((dg_analytic - dg_reference) / dg_reference).abs();
            table.push(norm, err);
            debug!(
                "step {:>2}: |x| = {:.6e}, analytic = {:+.12e}, reference = {:+.12e}",
                p, norm, dg_analytic, dg_reference
            );
            info!("step {:>2}: |x| = {:.8e}  err = {:.8e}", p, norm, err);

            if let Some(ratio) = table.last_ratio() {
                info!("   ratio: |x| {:.12}  err {:.12}", ratio.norm, ratio.error);
            }

            if p > 1
                && table.error_ratios_settled(s.ratio_window, s.target_ratio, s.ratio_tolerance)
                && err < s.error_floor
            {
                info!("Error ratio settled at step {}", p);
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "Error ratio did not settle within {} steps\n{}",
                s.max_iterations, table
            );
            if s.strict {
                return Err(FeffError::ConvergenceNotReached {
                    iterations: s.max_iterations,
                    target: s.target_ratio,
                    table,
                });
            }
            warn!("Lenient mode: continuing with the norm-ratio check only");
        }

        self.terminal_checks(table)
    }

    fn terminal_checks(&self, table: ErrorTable) -> Result<ValidationReport> {
        let s = &self.settings;
        let (ratio, last) = match (table.last_ratio(), table.last()) {
            (Some(ratio), Some(&last)) => (ratio, last),
            _ => {
                return Err(FeffError::ConvergenceNotReached {
                    iterations: table.len(),
                    target: s.target_ratio,
                    table,
                })
            }
        };

        // (check, value, expected, tolerance, enabled, passed)
        let checks = [
            (
                "norm ratio",
                ratio.norm,
                s.target_ratio,
                s.norm_ratio_tolerance,
                true,
                (ratio.norm - s.target_ratio).abs() < s.norm_ratio_tolerance,
            ),
            (
                "relative error",
                last.error,
                0.0,
                s.strict_error,
                s.strict,
                last.error < s.strict_error,
            ),
            (
                "error ratio",
                ratio.error,
                s.target_ratio,
                s.strict_ratio_tolerance,
                s.strict,
                (ratio.error - s.target_ratio).abs() <= s.strict_ratio_tolerance,
            ),
        ];
        for (check, value, expected, tolerance, enabled, passed) in checks {
            if enabled && !passed {
                warn!("{} check failed: {:.10e}", check, value);
                return Err(FeffError::AssertionFailure {
                    check,
                    value,
                    expected,
                    tolerance,
                    table,
                });
            }
        }

        info!(
            "Converged: norm ratio {:.12}, error ratio {:.6}, final error {:.3e}",
            ratio.norm, ratio.error, last.error
        );
        Ok(ValidationReport {
            iterations: table.len(),
            final_norm_ratio: ratio.norm,
            final_error_ratio: ratio.error,
            final_error: last.error,
            table,
        })
    }
}
