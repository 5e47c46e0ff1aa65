//! Determinant CASCI on a model system

extern crate nalgebra as na;

use super::strings::CiSpace;
use super::{complement_basis, CasState, HcoreProvider, HostSolver, SolverConfig};
use crate::density::SpinDensity;
use crate::error::{FeffError, Result};
use crate::gradient::GradientHessian;
use crate::hamiltonian_impl::EffectiveTwoBody;
use crate::space::ActiveSpace;
use crate::system_impl::{sorted_symmetric_eigen, ModelSystem};
use crate::tensor::{transform_4index, Tensor4};
use na::{DMatrix, DVector};
use ndarray::Array4;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CasciResult {
    pub state: CasState,
    /// Total CASCI energy
    pub energy: f64,
    /// Core energy including the one-electron core terms
    pub ecore: f64,
}

pub struct CasModel {
    system: Arc<ModelSystem>,
    space: ActiveSpace,
    nelecas: (usize, usize),
    ci_space: CiSpace,
    hcore_provider: HcoreProvider,
}

impl CasModel {
    pub fn new(config: SolverConfig) -> Result<Self> {
        let SolverConfig {
            system,
            ncas,
            nelecas,
            spin,
        } = config;
        let two_s = spin.unwrap_or(0);

        if nelecas > system.nelectron || (system.nelectron - nelecas) % 2 != 0 {
            return Err(FeffError::InvalidActiveSpace(format!(
                "{} active electrons cannot be embedded in {} electrons with a closed-shell core",
                nelecas, system.nelectron
            )));
        }
        if two_s > nelecas || (nelecas - two_s) % 2 != 0 {
            return Err(FeffError::InvalidActiveSpace(format!(
                "2S = {} is incompatible with {} active electrons",
                two_s, nelecas
            )));
        }
        let na = (nelecas + two_s) / 2;
        let nb = (nelecas - two_s) / 2;
        if na > ncas {
            return Err(FeffError::InvalidActiveSpace(format!(
                "{} alpha electrons do not fit in {} active orbitals",
                na, ncas
            )));
        }

        let space = ActiveSpace::new((system.nelectron - nelecas) / 2, ncas);
        space.check(system.nao)?;
        let ci_space = CiSpace::new(ncas, (na, nb));

        let hcore = system.hcore.clone();
        let hcore_provider: HcoreProvider = Box::new(move || hcore.clone());

        info!(
            "CAS({}e, {}o): ncore = {}, nelecas = ({}, {}), {} determinants",
            nelecas,
            ncas,
            space.ncore,
            na,
            nb,
            ci_space.ndet()
        );

        Ok(CasModel {
            system,
            space,
            nelecas: (na, nb),
            ci_space,
            hcore_provider,
        })
    }

    pub fn system(&self) -> &ModelSystem {
        &self.system
    }

    pub fn ci_space(&self) -> &CiSpace {
        &self.ci_space
    }

    fn check_ci(&self, ci: &DVector<f64>) -> Result<()> {
        FeffError::dims("CI vector length vs determinant count", self.ci_space.ndet(), ci.len())
    }

    fn check_mo(&self, mo_coeff: &DMatrix<f64>) -> Result<()> {
        FeffError::dims("orbital rows vs basis size", self.system.nao, mo_coeff.nrows())?;
        self.space.check(mo_coeff.ncols())
    }

    /// Active-space CI problem in the orbitals `mo_coeff`: effective one-body
    /// operator, active ERIs and core energy, using the real ERIs.
    pub fn active_integrals(&self, mo_coeff: &DMatrix<f64>) -> Result<(DMatrix<f64>, Tensor4, f64)> {
        self.check_mo(mo_coeff)?;
        let h = self.hcore();
        let mo_core = mo_coeff.columns(0, self.space.ncore);
        let mo_cas = mo_coeff.columns(self.space.ncore, self.space.ncas).into_owned();

        let dm_core = &mo_core * mo_core.transpose() * 2.0;
        let (j, k) = self.system.jk(&dm_core);
        let vhf = j - k * 0.5;
        let ecore = dm_core.dot(&h) + 0.5 * dm_core.dot(&vhf);

        let h1 = mo_cas.transpose() * (&h + &vhf) * &mo_cas;
        let eri = transform_4index(&self.system.eri, &mo_cas, &mo_cas, &mo_cas, &mo_cas);
        Ok((h1, eri, ecore))
    }

    /// Lowest CASCI root in the orbitals `mo_coeff`
    pub fn casci(&self, mo_coeff: &DMatrix<f64>) -> Result<CasciResult> {
        let (h1, eri, ecore) = self.active_integrals(mo_coeff)?;
        let hci = self.ci_space.hamiltonian(&h1, &eri);
        let (energies, vectors) = sorted_symmetric_eigen(hci);
        let ci = vectors.column(0).into_owned();
        let energy = ecore + energies[0];

        info!("CASCI E = {:.12} au (E_core = {:.12} au)", energy, ecore);
        debug!("CI roots: {:?}", energies.as_slice());

        Ok(CasciResult {
            state: CasState {
                mo_coeff: mo_coeff.clone(),
                ci,
            },
            energy,
            ecore,
        })
    }

    /// CI energy `<c|H|c>` plus the core energy with the real integrals
    pub fn energy(&self, state: &CasState) -> Result<f64> {
        self.check_ci(&state.ci)?;
        let (h1, eri, ecore) = self.active_integrals(&state.mo_coeff)?;
        let sigma = self.ci_space.sigma(&h1, &eri, &state.ci);
        Ok(ecore + state.ci.dot(&sigma))
    }

    /// Antisymmetric generator from the packed orbital block
    fn rotation_generator(&self, x_orb: &[f64]) -> DMatrix<f64> {
        let nmo = self.nmo();
        let mut k = DMatrix::zeros(nmo, nmo);
        for (&(p, q), &v) in self.space.rotation_pairs(nmo).iter().zip(x_orb) {
            k[(p, q)] = v;
            k[(q, p)] = -v;
        }
        k
    }
}

impl HostSolver for CasModel {
    fn space(&self) -> ActiveSpace {
        self.space
    }

    fn nmo(&self) -> usize {
        self.system.nao
    }

    fn ci_dim(&self) -> usize {
        self.ci_space.ndet()
    }

    fn nelecas(&self) -> (usize, usize) {
        self.nelecas
    }

    fn make_casdm1s(&self, ci: &DVector<f64>) -> Result<SpinDensity> {
        self.check_ci(ci)?;
        let (alpha, beta) = self.ci_space.make_rdm1s(ci);
        Ok(SpinDensity { alpha, beta })
    }

    fn make_casdm12(&self, ci: &DVector<f64>) -> Result<(DMatrix<f64>, Tensor4)> {
        self.check_ci(ci)?;
        Ok(self.ci_space.make_rdm12(ci))
    }

    fn rotate(&self, state: &CasState, x: &DVector<f64>) -> Result<CasState> {
        self.check_ci(&state.ci)?;
        self.check_mo(&state.mo_coeff)?;
        FeffError::dims("rotation vector length", self.nparams(), x.len())?;
        let ngorb = self.space.ngorb(self.nmo());

        let k = self.rotation_generator(&x.as_slice()[..ngorb]);
        let mo_coeff = &state.mo_coeff * k.exp();

        let x_ci = x.rows(ngorb, x.len() - ngorb).into_owned();
        let t = complement_basis(&state.ci) * x_ci;
        let theta = t.norm();
        let ci = if theta > 0.0 {
            &state.ci * theta.cos() + &t * (theta.sin() / theta)
        } else {
            state.ci.clone()
        };

        Ok(CasState { mo_coeff, ci })
    }

    fn hcore(&self) -> DMatrix<f64> {
        (self.hcore_provider)()
    }

    fn replace_hcore(&mut self, provider: HcoreProvider) -> HcoreProvider {
        std::mem::replace(&mut self.hcore_provider, provider)
    }

    fn generalized_gradient(
        &self,
        state: &CasState,
        two_body: &EffectiveTwoBody,
    ) -> Result<GradientHessian> {
        two_body.require_complete()?;
        self.check_ci(&state.ci)?;
        self.check_mo(&state.mo_coeff)?;
        let nmo = self.nmo();
        let ActiveSpace { ncore, ncas } = self.space;
        FeffError::dims("two-body views vs orbital count", nmo, two_body.nmo())?;
        FeffError::dims("two-body views vs ncas", ncas, two_body.ncas())?;

        let h_ao = self.hcore();
        FeffError::dims("core Hamiltonian vs basis size", self.system.nao, h_ao.nrows())?;
        let mo = &state.mo_coeff;
        let h = mo.transpose() * h_ao * mo;
        let vhf_c = &two_body.vhf_c;
        let ppaa = &two_body.ppaa;
        let papa = &two_body.papa;
        let (casdm1, casdm2) = self.make_casdm12(&state.ci)?;

        let vhf_a = DMatrix::from_fn(nmo, nmo, |r, q| {
            let mut acc = 0.0;
            for t in 0..ncas {
                for u in 0..ncas {
                    acc += casdm1[(t, u)] * (ppaa[[r, q, t, u]] - 0.5 * papa[[r, t, q, u]]);
                }
            }
            acc
        });
        let h_c = &h + vhf_c;

        // generalized Fock matrix; virtual columns vanish
        let mut fock = DMatrix::zeros(nmo, nmo);
        for i in 0..ncore {
            for r in 0..nmo {
                fock[(r, i)] = h[(r, i)] + 2.0 * (vhf_c[(r, i)] + vhf_a[(r, i)]);
            }
        }
        for t in 0..ncas {
            for r in 0..nmo {
                let mut acc = 0.0;
                for u in 0..ncas {
                    acc += h_c[(r, ncore + u)] * casdm1[(t, u)];
                    for v in 0..ncas {
                        for w in 0..ncas {
                            acc += ppaa[[r, ncore + u, v, w]] * casdm2[[t, u, v, w]];
                        }
                    }
                }
                fock[(r, ncore + t)] = acc;
            }
        }

        // occupation weights: one per core orbital plus the active density
        let mut omega = DMatrix::zeros(nmo, nmo);
        for i in 0..ncore {
            omega[(i, i)] = 1.0;
        }
        omega.view_mut((ncore, ncore), (ncas, ncas)).copy_from(&casdm1);
        let f_mean = &h_c + &vhf_a;
        let f_omega = &f_mean * &omega;

        let pairs = self.space.rotation_pairs(nmo);
        let mut grad = Vec::with_capacity(self.nparams());
        let mut hdiag = Vec::with_capacity(self.nparams());
        for &(p, q) in &pairs {
            grad.push(2.0 * (fock[(p, q)] - fock[(q, p)]));
            hdiag.push(
                2.0 * (f_mean[(q, q)] * omega[(p, p)] + f_mean[(p, p)] * omega[(q, q)]
                    - f_omega[(p, p)]
                    - f_omega[(q, q)]),
            );
        }

        // CI block in the complement of the current vector
        let h1_act = h_c.view((ncore, ncore), (ncas, ncas)).into_owned();
        let eri_act = Array4::from_shape_fn((ncas, ncas, ncas, ncas), |(t, u, v, w)| {
            ppaa[[ncore + t, ncore + u, v, w]]
        });
        let hci = self.ci_space.hamiltonian(&h1_act, &eri_act);
        let sigma = &hci * &state.ci;
        let e0 = state.ci.dot(&sigma);
        let q = complement_basis(&state.ci);
        let ci_grad = q.transpose() * &sigma * 2.0;
        let hq = &hci * &q;
        for k in 0..q.ncols() {
            grad.push(ci_grad[k]);
            hdiag.push(2.0 * (q.column(k).dot(&hq.column(k)) - e0));
        }

        GradientHessian::new(
            DVector::from_vec(grad),
            DVector::from_vec(hdiag),
            pairs.len(),
        )
    }
}
