//! Finite-difference verification of MC-PDFT effective Hamiltonians
//!
//! The crate builds the first-derivative (`veff`) and contracted
//! second-derivative (`feff`) operators of an on-top functional at a CASCI
//! state, extracts their orbital + CI gradients through a host solver and
//! checks them against finite differences of a contracted energy: the
//! relative error of the linear prediction must halve with the step.

pub mod app;
pub mod casci_impl;
pub mod config;
pub mod contraction;
pub mod density;
pub mod error;
pub mod fixtures;
pub mod gradient;
pub mod hamiltonian_impl;
pub mod io;
pub mod kernel;
pub mod perturbation;
pub mod scenario;
pub mod space;
pub mod system_impl;
pub mod tensor;
pub mod validation_impl;

pub use casci_impl::{CasModel, CasState, CasciResult, HostSolver, SolverConfig};
pub use contraction::contract_veff;
pub use density::{DensityMatrixSet, SpinDensity};
pub use error::{FeffError, Result};
pub use fixtures::{setup_fixtures, teardown_fixtures, Fixtures, SystemSpec};
pub use gradient::{extract, GradientHessian, HcoreOverride};
pub use hamiltonian_impl::{EffectiveHamiltonianBuilder, EffectiveTwoBody, ViewOptions};
pub use kernel::{ModelFunctional, OnTopKernel, QuadratureGrid};
pub use perturbation::{Perturbation, PerturbationGenerator};
pub use scenario::{run_case, CaseOutcome, CaseSpec, ScenarioRunner, SuiteKind};
pub use space::ActiveSpace;
pub use system_impl::{ModelScf, ModelSystem, ScfSettings};
pub use tensor::{Fingerprint, Tensor4};
pub use validation_impl::{ConvergenceValidator, ErrorTable, ValidationReport, ValidatorSettings};
