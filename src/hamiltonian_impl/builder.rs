//! AO effective operators from kernel derivatives
//!
//! The kernel variables on the grid are
//!
//! * `rho(g) = chi_g^T omega chi_g` with `omega = (dm + Q dm Q) / 2`,
//!   `Q = C_a C_a^T`: each core orbital weighted once plus the active density;
//! * `pi(g) = rho_dm^2 - rho_alpha^2 - rho_beta^2 + Σ phi phi phi phi λ`,
//!   the on-top value of the two-body density with a doubly occupied core,
//!   `phi = chi C_a`.
//!
//! The first-derivative operator (`veff`) and the second-derivative operator
//! contracted with a density set (`feff`) are then quadratures over
//! `chi chi^T` and `chi^(x4)`.

extern crate nalgebra as na;

use crate::density::{DensityMatrixSet, SpinDensity};
use crate::error::{FeffError, Result};
use crate::kernel::OnTopKernel;
use crate::tensor::{Fingerprint, Tensor4};
use na::{DMatrix, DVector};
use ndarray::Array4;
use rayon::prelude::*;
use tracing::debug;

/// One-body operator and two-body tensor in the AO basis
#[derive(Debug, Clone)]
pub struct AoEffectiveHamiltonian {
    pub one_body: DMatrix<f64>,
    pub two_body: Tensor4,
}

/// Densities on the grid
#[derive(Debug, Clone)]
pub struct KernelVariables {
    pub rho: DVector<f64>,
    pub pi: DVector<f64>,
}

/// `chi_g^T m chi_g` for every grid point
fn grid_quadratic_form(chi: &DMatrix<f64>, m: &DMatrix<f64>) -> DVector<f64> {
    let x = chi * m;
    DVector::from_fn(chi.nrows(), |g, _| x.row(g).dot(&chi.row(g)))
}

pub struct EffectiveHamiltonianBuilder<'k, K: OnTopKernel + ?Sized> {
    kernel: &'k K,
}

impl<'k, K: OnTopKernel + ?Sized> EffectiveHamiltonianBuilder<'k, K> {
    pub fn new(kernel: &'k K) -> Self {
        EffectiveHamiltonianBuilder { kernel }
    }

    fn check_shapes(&self, dm: &DensityMatrixSet, mo_cas: &DMatrix<f64>) -> Result<()> {
        let nao = self.kernel.grid().nao();
        FeffError::dims("AO spin density vs grid basis size", nao, dm.dm1s.dim())?;
        FeffError::dims("active orbital rows vs grid basis size", nao, mo_cas.nrows())?;
        if mo_cas.ncols() > nao {
            return Err(FeffError::DimensionMismatch {
                context: "active orbitals vs available orbitals",
                expected: nao,
                found: mo_cas.ncols(),
            });
        }
        for &len in dm.cumulant.shape() {
            FeffError::dims("cumulant vs active orbital count", mo_cas.ncols(), len)?;
        }
        Ok(())
    }

    /// Kernel variables of a density set
    pub fn variables(&self, dm: &DensityMatrixSet, mo_cas: &DMatrix<f64>) -> Result<KernelVariables> {
        self.check_shapes(dm, mo_cas)?;
        let chi = &self.kernel.grid().ao;
        let SpinDensity { alpha, beta } = &dm.dm1s;
        let total = dm.dm1s.total();

        let phi = chi * mo_cas;
        let dm_act = mo_cas.transpose() * &total * mo_cas;

        let rho_dm = grid_quadratic_form(chi, &total);
        let rho_act = grid_quadratic_form(&phi, &dm_act);
        let rho_a = grid_quadratic_form(chi, alpha);
        let rho_b = grid_quadratic_form(chi, beta);
        let rho = (&rho_dm + &rho_act) * 0.5;

        let ncas = mo_cas.ncols();
        let lambda = &dm.cumulant;
        let pi = DVector::from_fn(chi.nrows(), |g, _| {
            let f = phi.row(g);
            let mut acc = rho_dm[g] * rho_dm[g] - rho_a[g] * rho_a[g] - rho_b[g] * rho_b[g];
            for t in 0..ncas {
                for u in 0..ncas {
                    let ftu = f[t] * f[u];
                    for v in 0..ncas {
                        for w in 0..ncas {
                            acc += ftu * f[v] * f[w] * lambda[[t, u, v, w]];
                        }
                    }
                }
            }
            acc
        });

        Ok(KernelVariables { rho, pi })
    }

    /// Integrated on-top energy of a density set
    pub fn on_top_energy(&self, dm: &DensityMatrixSet, mo_cas: &DMatrix<f64>) -> Result<f64> {
        let vars = self.variables(dm, mo_cas)?;
        Ok(self.kernel.energy(&vars.rho, &vars.pi))
    }

    /// `v1 = Σ_g w1 chi chi^T`, `v2 = 2 Σ_g w2 chi^(x4)` with the quadrature
    /// weights already folded into `w1` and `w2`.
    fn assemble(&self, w1: &DVector<f64>, w2: &DVector<f64>) -> AoEffectiveHamiltonian {
        let chi = &self.kernel.grid().ao;
        let (ngrid, nao) = chi.shape();

        let scaled = DMatrix::from_fn(ngrid, nao, |g, mu| w1[g] * chi[(g, mu)]);
        let one_body = chi.transpose() * scaled;

        // slab mu of the pair-product Gram matrix, one rayon task per slab
        let slabs: Vec<Vec<f64>> = (0..nao)
            .into_par_iter()
            .map(|mu| {
                let mut slab = vec![0.0; nao * nao * nao];
                for g in 0..ngrid {
                    let c = 2.0 * w2[g] * chi[(g, mu)];
                    if c == 0.0 {
                        continue;
                    }
                    for nu in 0..nao {
                        let cn = c * chi[(g, nu)];
                        for lam in 0..nao {
                            let cnl = cn * chi[(g, lam)];
                            for sig in 0..nao {
                                slab[(nu * nao + lam) * nao + sig] += cnl * chi[(g, sig)];
                            }
                        }
                    }
                }
                slab
            })
            .collect();
        let two_body = Array4::from_shape_fn((nao, nao, nao, nao), |(p, q, r, s)| {
            slabs[p][(q * nao + r) * nao + s]
        });

        AoEffectiveHamiltonian { one_body, two_body }
    }

    /// First-derivative operator at the density set
    pub fn veff(&self, dm: &DensityMatrixSet, mo_cas: &DMatrix<f64>) -> Result<AoEffectiveHamiltonian> {
        let vars = self.variables(dm, mo_cas)?;
        let d = self.kernel.derivatives(&vars.rho, &vars.pi);
        let w = &self.kernel.grid().weights;

        let veff = self.assemble(&w.component_mul(&d.e_rho), &w.component_mul(&d.e_pi));
        debug!(
            "veff: fp(v1) = {:.12}, fp(v2) = {:.12}",
            veff.one_body.fingerprint(),
            veff.two_body.fingerprint()
        );
        Ok(veff)
    }

    /// Second-derivative operator at `dm`, contracted with the kernel
    /// variables of `contracted` (defaults to `dm` itself).
    pub fn feff(
        &self,
        dm: &DensityMatrixSet,
        contracted: Option<&DensityMatrixSet>,
        mo_cas: &DMatrix<f64>,
    ) -> Result<AoEffectiveHamiltonian> {
        let vars = self.variables(dm, mo_cas)?;
        let cvars = match contracted {
            Some(c) => {
                FeffError::dims("contracted spin density vs primary", dm.dm1s.dim(), c.dm1s.dim())?;
                FeffError::dims("contracted cumulant vs primary", dm.ncas(), c.ncas())?;
                self.variables(c, mo_cas)?
            }
            None => vars.clone(),
        };
        let d = self.kernel.derivatives(&vars.rho, &vars.pi);
        let w = &self.kernel.grid().weights;

        let f_rho = d.e_rho_rho.component_mul(&cvars.rho) + d.e_rho_pi.component_mul(&cvars.pi);
        let f_pi = d.e_rho_pi.component_mul(&cvars.rho) + d.e_pi_pi.component_mul(&cvars.pi);
        let feff = self.assemble(&w.component_mul(&f_rho), &w.component_mul(&f_pi));
        debug!(
            "feff: fp(f1) = {:.12}, fp(f2) = {:.12}",
            feff.one_body.fingerprint(),
            feff.two_body.fingerprint()
        );
        Ok(feff)
    }
}

/// `build(kernel, dm1s, cumulant, contracted_dm1s, contracted_cumulant,
/// mo_cas)`: the `feff` operator pair. Missing contracted pieces fall back
/// to their primary counterparts.
pub fn build<K: OnTopKernel + ?Sized>(
    kernel: &K,
    dm1s: &SpinDensity,
    cumulant: &Tensor4,
    contracted_dm1s: Option<&SpinDensity>,
    contracted_cumulant: Option<&Tensor4>,
    mo_cas: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, Tensor4)> {
    let primary = DensityMatrixSet {
        dm1s: dm1s.clone(),
        cumulant: cumulant.clone(),
    };
    let contracted = match (contracted_dm1s, contracted_cumulant) {
        (None, None) => None,
        (cdm1s, ccum) => Some(DensityMatrixSet {
            dm1s: cdm1s.unwrap_or(dm1s).clone(),
            cumulant: ccum.unwrap_or(cumulant).clone(),
        }),
    };
    let feff = EffectiveHamiltonianBuilder::new(kernel).feff(&primary, contracted.as_ref(), mo_cas)?;
    Ok((feff.one_body, feff.two_body))
}
