//! Gradient/Hessian extraction for effective operators
//!
//! The host solver computes gradients of whatever core Hamiltonian its
//! provider returns. [`extract`] installs the effective one-body operator as
//! that provider for the duration of one call; [`HcoreOverride`] puts the
//! previous provider back when it is dropped, so early returns and panics
//! restore it as well.

extern crate nalgebra as na;

use crate::casci_impl::{CasState, HcoreProvider, HostSolver};
use crate::error::{FeffError, Result};
use crate::hamiltonian_impl::EffectiveTwoBody;
use na::{DMatrix, DVector};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Flat gradient and diagonal Hessian: `ngorb` orbital-rotation entries
/// followed by the CI block.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientHessian {
    pub gradient: DVector<f64>,
    pub hessian_diag: DVector<f64>,
    ngorb: usize,
}

impl GradientHessian {
    pub fn new(gradient: DVector<f64>, hessian_diag: DVector<f64>, ngorb: usize) -> Result<Self> {
        FeffError::dims("diagonal Hessian vs gradient", gradient.len(), hessian_diag.len())?;
        if ngorb > gradient.len() {
            return Err(FeffError::DimensionMismatch {
                context: "orbital block vs gradient length",
                expected: gradient.len(),
                found: ngorb,
            });
        }
        Ok(GradientHessian {
            gradient,
            hessian_diag,
            ngorb,
        })
    }

    pub fn len(&self) -> usize {
        self.gradient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradient.is_empty()
    }

    pub fn ngorb(&self) -> usize {
        self.ngorb
    }

    pub fn nci(&self) -> usize {
        self.gradient.len() - self.ngorb
    }

    /// Elementwise sum with another evaluation of the same layout
    pub fn try_add(&self, other: &GradientHessian) -> Result<GradientHessian> {
        FeffError::dims("summed gradient lengths", self.len(), other.len())?;
        FeffError::dims("summed orbital blocks", self.ngorb, other.ngorb)?;
        Ok(GradientHessian {
            gradient: &self.gradient + &other.gradient,
            hessian_diag: &self.hessian_diag + &other.hessian_diag,
            ngorb: self.ngorb,
        })
    }
}

/// Scoped replacement of a solver's core-Hamiltonian provider
pub struct HcoreOverride<'a, S: HostSolver + ?Sized> {
    solver: &'a mut S,
    saved: Option<HcoreProvider>,
}

impl<'a, S: HostSolver + ?Sized> HcoreOverride<'a, S> {
    pub fn install(solver: &'a mut S, provider: HcoreProvider) -> Self {
        let saved = solver.replace_hcore(provider);
        debug!("core Hamiltonian provider overridden");
        HcoreOverride {
            solver,
            saved: Some(saved),
        }
    }

    /// Install a provider returning a fixed matrix
    pub fn with_matrix(solver: &'a mut S, h1: DMatrix<f64>) -> Self {
        Self::install(solver, Box::new(move || h1.clone()))
    }
}

impl<S: HostSolver + ?Sized> Deref for HcoreOverride<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.solver
    }
}

impl<S: HostSolver + ?Sized> DerefMut for HcoreOverride<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.solver
    }
}

impl<S: HostSolver + ?Sized> Drop for HcoreOverride<'_, S> {
    fn drop(&mut self) {
        if let Some(provider) = self.saved.take() {
            self.solver.replace_hcore(provider);
            debug!("core Hamiltonian provider restored");
        }
    }
}

/// Gradient and diagonal Hessian of the functional defined by an effective
/// operator pair at `state`.
pub fn extract<S: HostSolver + ?Sized>(
    solver: &mut S,
    one_body: &DMatrix<f64>,
    two_body: &EffectiveTwoBody,
    state: &CasState,
) -> Result<GradientHessian> {
    two_body.require_complete()?;
    let guard = HcoreOverride::with_matrix(solver, one_body.clone());
    guard.generalized_gradient(state, two_body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_is_elementwise() {
        let a = GradientHessian::new(
            DVector::from_vec(vec![1.0, 2.0, 3.0]),
            DVector::from_vec(vec![0.5, 0.5, 0.5]),
            2,
        )
        .unwrap();
        let b = GradientHessian::new(
            DVector::from_vec(vec![-1.0, 0.5, 0.0]),
            DVector::from_vec(vec![1.0, 1.0, 1.0]),
            2,
        )
        .unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.gradient.as_slice(), &[0.0, 2.5, 3.0]);
        assert_eq!(sum.hessian_diag.as_slice(), &[1.5, 1.5, 1.5]);
        assert_eq!(sum.ngorb(), 2);
        assert_eq!(sum.nci(), 1);
        assert_eq!(b.try_add(&a).unwrap(), sum);
    }

    #[test]
    fn test_layout_mismatch() {
        let a = GradientHessian::new(DVector::zeros(3), DVector::zeros(3), 2).unwrap();
        let b = GradientHessian::new(DVector::zeros(3), DVector::zeros(3), 1).unwrap();
        assert!(a.try_add(&b).is_err());
        assert!(GradientHessian::new(DVector::zeros(3), DVector::zeros(2), 1).is_err());
        assert!(GradientHessian::new(DVector::zeros(3), DVector::zeros(3), 4).is_err());
    }
}
