//! Convergence-order validation of analytic derivatives
//!
//! A directional derivative `g . x` is compared with a finite-difference
//! reference computed by full re-evaluation at `x`, while `x` is halved
//! step by step. The ratio of consecutive relative errors identifies the
//! convergence order of the Taylor remainder.
//!
//! # Usage
//!
//! ```rust,ignore
//! use feff_check::{ConvergenceValidator, ValidatorSettings};
//!
//! let validator = ConvergenceValidator::new(ValidatorSettings::default());
//! let report = validator.validate(&gradient, &direction, |x| Ok(f(x) - f0))?;
//! println!("{}", report.table);
//! ```

mod table;
mod validator;

pub use table::{ErrorRow, ErrorTable};
pub use validator::{ConvergenceValidator, ValidationReport, ValidatorSettings};
