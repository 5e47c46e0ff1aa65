//! Density tensor adapter
//!
//! Converts the host solver's active-space reduced densities into the
//! tensors consumed by the effective Hamiltonian builder: AO spin densities
//! (core plus active) and the active-space two-body cumulant.

extern crate nalgebra as na;

use crate::casci_impl::{CasState, HostSolver};
use crate::error::{FeffError, Result};
use crate::space::ActiveSpace;
use crate::tensor::Tensor4;
use na::DMatrix;
use ndarray::Array4;

/// Electron-count tolerance on the trace of the active density
const ELECTRON_COUNT_TOL: f64 = 1e-8;

/// One-body density split by spin channel
#[derive(Debug, Clone, PartialEq)]
pub struct SpinDensity {
    pub alpha: DMatrix<f64>,
    pub beta: DMatrix<f64>,
}

impl SpinDensity {
    pub fn new(alpha: DMatrix<f64>, beta: DMatrix<f64>) -> Result<Self> {
        FeffError::dims("alpha density rows vs columns", alpha.nrows(), alpha.ncols())?;
        FeffError::dims("beta density vs alpha density", alpha.nrows(), beta.nrows())?;
        FeffError::dims("beta density rows vs columns", beta.nrows(), beta.ncols())?;
        Ok(SpinDensity { alpha, beta })
    }

    /// Split a spin-summed density evenly into both channels
    pub fn from_spin_summed(dm: &DMatrix<f64>) -> Self {
        let half = dm * 0.5;
        SpinDensity {
            alpha: half.clone(),
            beta: half,
        }
    }

    pub fn dim(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn total(&self) -> DMatrix<f64> {
        &self.alpha + &self.beta
    }

    pub fn trace(&self) -> f64 {
        self.alpha.trace() + self.beta.trace()
    }
}

/// Densities handed to the effective Hamiltonian builder
#[derive(Debug, Clone)]
pub struct DensityMatrixSet {
    /// AO spin densities including the core
    pub dm1s: SpinDensity,
    /// Active-space cumulant `(ncas, ncas, ncas, ncas)`
    pub cumulant: Tensor4,
}

impl DensityMatrixSet {
    /// Build the density set of `state` from the solver's native RDMs.
    pub fn from_solver<S: HostSolver + ?Sized>(solver: &S, state: &CasState) -> Result<Self> {
        let space = solver.space();
        let casdm1s = solver.make_casdm1s(&state.ci)?;
        let (na, nb) = solver.nelecas();
        check_electron_count(&casdm1s, na + nb)?;

        let (_, casdm2) = solver.make_casdm12(&state.ci)?;
        let cumulant = dm2_cumulant(&casdm2, &casdm1s)?;
        let dm1s = casdm1s_to_dm1s(&state.mo_coeff, &casdm1s, space)?;
        Ok(DensityMatrixSet { dm1s, cumulant })
    }

    pub fn ncas(&self) -> usize {
        self.cumulant.shape()[0]
    }
}

/// AO spin densities from active-space spin densities: every core orbital
/// carries one electron per spin, the active block is `C_a casdm1s C_a^T`.
pub fn casdm1s_to_dm1s(
    mo_coeff: &DMatrix<f64>,
    casdm1s: &SpinDensity,
    space: ActiveSpace,
) -> Result<SpinDensity> {
    space.check(mo_coeff.ncols())?;
    FeffError::dims("active density vs ncas", space.ncas, casdm1s.dim())?;

    let mo_core = mo_coeff.columns(0, space.ncore);
    let mo_cas = mo_coeff.columns(space.ncore, space.ncas);
    let core = &mo_core * mo_core.transpose();

    let alpha = &core + &mo_cas * &casdm1s.alpha * mo_cas.transpose();
    let beta = &core + &mo_cas * &casdm1s.beta * mo_cas.transpose();
    Ok(SpinDensity { alpha, beta })
}

/// Two-body cumulant
/// `dm2[p,q,r,s] - dm1[p,q] dm1[r,s] + a[p,s] a[r,q] + b[p,s] b[r,q]`
/// with `dm2[p,q,r,s] = <p+ r+ s q>`.
pub fn dm2_cumulant(dm2: &Tensor4, dm1s: &SpinDensity) -> Result<Tensor4> {
    let n = dm1s.dim();
    for (axis, &len) in dm2.shape().iter().enumerate() {
        if len != n {
            return Err(FeffError::DimensionMismatch {
                context: match axis {
                    0 => "two-body density axis 0 vs one-body density",
                    1 => "two-body density axis 1 vs one-body density",
                    2 => "two-body density axis 2 vs one-body density",
                    _ => "two-body density axis 3 vs one-body density",
                },
                expected: n,
                found: len,
            });
        }
    }

    let dm1 = dm1s.total();
    let (a, b) = (&dm1s.alpha, &dm1s.beta);
    Ok(Array4::from_shape_fn((n, n, n, n), |(p, q, r, s)| {
        dm2[[p, q, r, s]] - dm1[(p, q)] * dm1[(r, s)]
            + a[(p, s)] * a[(r, q)]
            + b[(p, s)] * b[(r, q)]
    }))
}

/// Check that the spin-summed active density traces to the electron count.
pub fn check_electron_count(casdm1s: &SpinDensity, nelecas: usize) -> Result<()> {
    let trace = casdm1s.trace();
    if (trace - nelecas as f64).abs() > ELECTRON_COUNT_TOL {
        return Err(FeffError::ElectronCount {
            trace,
            expected: nelecas,
        });
    }
    Ok(())
}
