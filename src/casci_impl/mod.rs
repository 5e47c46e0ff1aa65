//! Host solver seam and the model CASCI solver
//!
//! The verification pipeline talks to the multi-configurational solver only
//! through [`HostSolver`]: reduced densities of a state, the state update
//! for a flat rotation vector, a replaceable core-Hamiltonian provider and
//! the generalized orbital + CI gradient for externally supplied operators.
//!
//! [`CasModel`] implements the seam on a [`ModelSystem`](crate::ModelSystem)
//! with determinant-based CASCI.
//!
//! # Usage
//!
//! ```rust,ignore
//! use feff_check::{CasModel, SolverConfig};
//!
//! let solver = CasModel::new(SolverConfig::new(system.clone(), 2, 2))?;
//! let casci = solver.casci(&scf.mo_coeff)?;
//! let (casdm1, casdm2) = solver.make_casdm12(&casci.state.ci)?;
//! ```

extern crate nalgebra as na;

mod casci;
mod strings;
mod tests;

pub use casci::{CasModel, CasciResult};
pub use strings::{make_strings, CiSpace, Spin};

use crate::density::SpinDensity;
use crate::error::Result;
use crate::gradient::GradientHessian;
use crate::hamiltonian_impl::EffectiveTwoBody;
use crate::space::ActiveSpace;
use crate::system_impl::ModelSystem;
use crate::tensor::Tensor4;
use na::{DMatrix, DVector};
use std::sync::Arc;

/// Source of the core Hamiltonian (AO basis) used by the solver
pub type HcoreProvider = Box<dyn Fn() -> DMatrix<f64> + Send + Sync>;

/// Orbitals and CI vector of one multi-configurational state
#[derive(Debug, Clone, PartialEq)]
pub struct CasState {
    pub mo_coeff: DMatrix<f64>,
    pub ci: DVector<f64>,
}

/// Construction parameters of a solver instance. Exactly the fields the
/// gradient machinery needs.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub system: Arc<ModelSystem>,
    pub ncas: usize,
    pub nelecas: usize,
    /// `2S`; zero when omitted
    pub spin: Option<usize>,
}

impl SolverConfig {
    pub fn new(system: Arc<ModelSystem>, ncas: usize, nelecas: usize) -> Self {
        SolverConfig {
            system,
            ncas,
            nelecas,
            spin: None,
        }
    }

    pub fn with_spin(mut self, two_s: usize) -> Self {
        self.spin = Some(two_s);
        self
    }
}

pub trait HostSolver {
    fn space(&self) -> ActiveSpace;
    fn nmo(&self) -> usize;
    /// Number of determinants
    fn ci_dim(&self) -> usize;
    /// Active electrons `(n_alpha, n_beta)`
    fn nelecas(&self) -> (usize, usize);

    fn make_casdm1s(&self, ci: &DVector<f64>) -> Result<SpinDensity>;
    fn make_casdm12(&self, ci: &DVector<f64>) -> Result<(DMatrix<f64>, Tensor4)>;

    /// Apply a flat rotation vector (orbital block, then CI block)
    fn rotate(&self, state: &CasState, x: &DVector<f64>) -> Result<CasState>;

    /// Core Hamiltonian from the current provider
    fn hcore(&self) -> DMatrix<f64>;
    /// Install `provider`, returning the previous one
    fn replace_hcore(&mut self, provider: HcoreProvider) -> HcoreProvider;

    /// Gradient and diagonal Hessian of the energy functional defined by
    /// the current core Hamiltonian and `two_body`
    fn generalized_gradient(
        &self,
        state: &CasState,
        two_body: &EffectiveTwoBody,
    ) -> Result<GradientHessian>;

    /// Size of the flat rotation vector
    fn nparams(&self) -> usize {
        self.space().ngorb(self.nmo()) + self.ci_dim().saturating_sub(1)
    }
}

/// Householder vector of the reflector mapping `c` onto `∓e0`
fn householder_vector(c: &DVector<f64>) -> DVector<f64> {
    let sign = if c[0] >= 0.0 { 1.0 } else { -1.0 };
    let mut u = c / c.norm();
    u[0] += sign;
    u
}

/// Orthonormal basis of the complement of `c`, shape `(n, n - 1)`
pub fn complement_basis(c: &DVector<f64>) -> DMatrix<f64> {
    let n = c.len();
    if n < 2 {
        return DMatrix::zeros(n, 0);
    }
    let u = householder_vector(c);
    let reflector = DMatrix::identity(n, n) - &u * u.transpose() * (2.0 / u.dot(&u));
    reflector.columns(1, n - 1).into_owned()
}
