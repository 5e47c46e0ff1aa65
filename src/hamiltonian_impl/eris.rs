//! MO-basis views of a two-body operator

extern crate nalgebra as na;

use crate::error::{FeffError, Result};
use crate::space::ActiveSpace;
use crate::tensor::{jk_from_eri, transform_4index, Tensor4};
use na::DMatrix;
use ndarray::{s, Array4};
use tracing::debug;

/// Which views to populate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Only fill the entries of `ppaa`/`papa` whose second MO index is active
    pub paaa_only: bool,
    /// Also build the alternate `j_pc`/`k_pc` tensors
    pub jk_pc: bool,
}

impl ViewOptions {
    pub fn full() -> Self {
        ViewOptions::default()
    }

    pub fn paaa_only() -> Self {
        ViewOptions {
            paaa_only: true,
            jk_pc: false,
        }
    }
}

/// Two-body operator seen from the MO basis
///
/// * `ppaa[p,q,t,u] = (pq|tu)`, shape `(nmo, nmo, ncas, ncas)`
/// * `papa[p,t,q,u] = (pt|qu)`, shape `(nmo, ncas, nmo, ncas)`
/// * `vhf_c[p,q] = Σ_i 2(pq|ii) - (pi|iq)` over core orbitals
/// * `energy_core = Σ_i vhf_c[i,i]`
/// * `j_pc[p,i] = (pp|ii)`, `k_pc[p,i] = (pi|ip)` on request
#[derive(Debug, Clone)]
pub struct EffectiveTwoBody {
    pub ppaa: Tensor4,
    pub papa: Tensor4,
    pub vhf_c: DMatrix<f64>,
    pub energy_core: f64,
    pub j_pc: Option<DMatrix<f64>>,
    pub k_pc: Option<DMatrix<f64>>,
    space: ActiveSpace,
    nmo: usize,
    complete: bool,
}

impl EffectiveTwoBody {
    pub fn from_ao(
        eri: &Tensor4,
        mo_coeff: &DMatrix<f64>,
        space: ActiveSpace,
        options: ViewOptions,
    ) -> Result<Self> {
        let nao = mo_coeff.nrows();
        for &len in eri.shape() {
            FeffError::dims("two-body operator vs orbital rows", nao, len)?;
        }
        let nmo = mo_coeff.ncols();
        space.check(nmo)?;
        let ActiveSpace { ncore, ncas } = space;

        let mo_core = mo_coeff.columns(0, ncore).into_owned();
        let mo_cas = mo_coeff.columns(ncore, ncas).into_owned();

        let (ppaa, papa) = if options.paaa_only {
            let paaa = transform_4index(eri, mo_coeff, &mo_cas, &mo_cas, &mo_cas);
            let mut ppaa = Array4::zeros((nmo, nmo, ncas, ncas));
            let mut papa = Array4::zeros((nmo, ncas, nmo, ncas));
            ppaa.slice_mut(s![.., ncore..ncore + ncas, .., ..]).assign(&paaa);
            papa.slice_mut(s![.., .., ncore..ncore + ncas, ..]).assign(&paaa);
            (ppaa, papa)
        } else {
            (
                transform_4index(eri, mo_coeff, mo_coeff, &mo_cas, &mo_cas),
                transform_4index(eri, mo_coeff, &mo_cas, mo_coeff, &mo_cas),
            )
        };

        let dm_core = &mo_core * mo_core.transpose() * 2.0;
        let (j, k) = jk_from_eri(eri, &dm_core);
        let vhf_c = mo_coeff.transpose() * (j - k * 0.5) * mo_coeff;
        let energy_core: f64 = (0..ncore).map(|i| vhf_c[(i, i)]).sum();

        let (j_pc, k_pc) = if options.jk_pc {
            let ppcc = transform_4index(eri, mo_coeff, mo_coeff, &mo_core, &mo_core);
            let pccp = transform_4index(eri, mo_coeff, &mo_core, &mo_core, mo_coeff);
            (
                Some(DMatrix::from_fn(nmo, ncore, |p, i| ppcc[[p, p, i, i]])),
                Some(DMatrix::from_fn(nmo, ncore, |p, i| pccp[[p, i, i, p]])),
            )
        } else {
            (None, None)
        };

        debug!(
            "two-body views: nmo = {}, ncore = {}, ncas = {}, paaa_only = {}, E_core = {:.10}",
            nmo, ncore, ncas, options.paaa_only, energy_core
        );

        Ok(EffectiveTwoBody {
            ppaa,
            papa,
            vhf_c,
            energy_core,
            j_pc,
            k_pc,
            space,
            nmo,
            complete: !options.paaa_only,
        })
    }

    pub fn nmo(&self) -> usize {
        self.nmo
    }

    pub fn ncas(&self) -> usize {
        self.space.ncas
    }

    pub fn space(&self) -> ActiveSpace {
        self.space
    }

    /// False when built in `paaa_only` mode
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn require_complete(&self) -> Result<()> {
        if self.complete {
            Ok(())
        } else {
            Err(FeffError::MissingView("ppaa/papa external block"))
        }
    }

    /// Active-active-active-active block `(tu|vw)`
    pub fn active_block(&self) -> Tensor4 {
        let a = self.space.active();
        self.ppaa.slice(s![a.clone(), a, .., ..]).to_owned()
    }

    /// Copy with the sign of the all-active block flipped in both views
    pub fn with_flipped_active_block(&self) -> Self {
        let mut flipped = self.clone();
        let a = self.space.active();
        flipped
            .ppaa
            .slice_mut(s![a.clone(), a.clone(), .., ..])
            .mapv_inplace(|v| -v);
        flipped
            .papa
            .slice_mut(s![a.clone(), .., a, ..])
            .mapv_inplace(|v| -v);
        flipped
    }
}
