//! Contraction of an effective operator pair with a state's densities
//!
//! ```text
//! veff1' = C^T v1 C
//! E = tr(veff1'[core, core]) + energy_core
//!   + Σ (veff1' + vhf_c)[act, act] * casdm1
//!   + ½ Σ papa[act, :, act, :] * casdm2
//! ```
//!
//! This is the reference quantity of the finite-difference check.

extern crate nalgebra as na;

use crate::casci_impl::{CasState, HostSolver};
use crate::error::{FeffError, Result};
use crate::hamiltonian_impl::EffectiveTwoBody;
use crate::space::ActiveSpace;
use crate::tensor::dot4;
use na::DMatrix;
use ndarray::s;

/// Contract `(one_body, two_body)` with the densities of `state`.
/// `space` defaults to the solver's active space.
pub fn contract_veff<S: HostSolver + ?Sized>(
    solver: &S,
    state: &CasState,
    one_body: &DMatrix<f64>,
    two_body: &EffectiveTwoBody,
    space: Option<ActiveSpace>,
) -> Result<f64> {
    let ActiveSpace { ncore, ncas } = space.unwrap_or_else(|| solver.space());
    let mo = &state.mo_coeff;
    FeffError::dims("one-body operator vs orbital rows", mo.nrows(), one_body.nrows())?;
    FeffError::dims("one-body operator rows vs columns", one_body.nrows(), one_body.ncols())?;
    FeffError::dims("two-body views vs orbital count", mo.ncols(), two_body.nmo())?;
    FeffError::dims("two-body views vs ncas", ncas, two_body.ncas())?;
    ActiveSpace::new(ncore, ncas).check(mo.ncols())?;

    let (casdm1, casdm2) = solver.make_casdm12(&state.ci)?;
    FeffError::dims("active density vs ncas", ncas, casdm1.nrows())?;

    let veff1 = mo.transpose() * one_body * mo;
    let core: f64 = (0..ncore).map(|i| veff1[(i, i)]).sum();

    let act = ncore..ncore + ncas;
    let h_act = (&veff1 + &two_body.vhf_c)
        .view((ncore, ncore), (ncas, ncas))
        .into_owned();
    let one = h_act.dot(&casdm1);

    let papa_act = two_body.papa.slice(s![act.clone(), .., act, ..]);
    let two = 0.5 * dot4(papa_act, casdm2.view());

    Ok(core + two_body.energy_core + one + two)
}
