//! One verification case: build the operators at a CASCI state, extract the
//! analytic gradient, and check it against finite differences of the
//! contracted energy along a seeded direction.

extern crate nalgebra as na;

use crate::casci_impl::{CasModel, CasState, HostSolver, SolverConfig};
use crate::contraction::contract_veff;
use crate::density::DensityMatrixSet;
use crate::error::{FeffError, Result};
use crate::fixtures::Fixtures;
use crate::gradient::extract;
use crate::hamiltonian_impl::{
    AoEffectiveHamiltonian, EffectiveHamiltonianBuilder, EffectiveTwoBody, ViewOptions,
};
use crate::kernel::{ModelFunctional, OnTopKernel};
use crate::perturbation::PerturbationGenerator;
use crate::space::ActiveSpace;
use crate::tensor::Fingerprint;
use crate::validation_impl::{ConvergenceValidator, ValidationReport, ValidatorSettings};
use na::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

/// Which derivative is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    /// `grad(feff) + grad(veff)` against the self-consistent contraction
    Summed,
    /// `grad(veff)` against the contraction of the frozen AO operators
    FixedOperator,
}

impl std::fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuiteKind::Summed => write!(f, "summed"),
            SuiteKind::FixedOperator => write!(f, "fixed-operator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSpec {
    pub system: String,
    pub ncas: usize,
    pub nelecas: usize,
    #[serde(default)]
    pub spin: Option<usize>,
    pub functional: String,
    pub seed: u64,
    pub suite: SuiteKind,
    /// Flip the all-active block of the operators handed to the extractor;
    /// the case is then expected to fail to converge.
    #[serde(default)]
    pub negative_control: bool,
    /// Also build and log the `j_pc`/`k_pc` views
    #[serde(default)]
    pub jk_pc: bool,
}

impl CaseSpec {
    pub fn label(&self) -> String {
        format!(
            "{} CAS({},{}) {} seed={} {}{}",
            self.system,
            self.nelecas,
            self.ncas,
            self.functional,
            self.seed,
            self.suite,
            if self.negative_control { " [negative control]" } else { "" }
        )
    }
}

/// Fingerprints logged for a case
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub reference_energy: f64,
    pub veff_one_body: f64,
    pub veff_active_block: f64,
    pub veff_vhf_c_active: f64,
    pub veff_energy_core: f64,
    pub feff_one_body: Option<f64>,
    pub feff_active_block: Option<f64>,
    pub feff_energy_core: Option<f64>,
    /// `veff1 + feff1` in the summed suite, `veff1` otherwise
    pub total_one_body: f64,
    pub j_pc: Option<f64>,
    pub k_pc: Option<f64>,
    pub gradient: f64,
}

#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub label: String,
    pub report: ValidationReport,
    pub diagnostics: Diagnostics,
}

/// Operator pair at one state together with its MO views
struct OperatorSet {
    ao: AoEffectiveHamiltonian,
    views: EffectiveTwoBody,
}

fn vhf_c_active(views: &EffectiveTwoBody) -> DMatrix<f64> {
    let ActiveSpace { ncore, ncas } = views.space();
    views.vhf_c.view((ncore, ncore), (ncas, ncas)).into_owned()
}

fn active_orbitals(state: &CasState, space: ActiveSpace) -> DMatrix<f64> {
    state.mo_coeff.columns(space.ncore, space.ncas).into_owned()
}

pub struct ScenarioRunner<'f> {
    fixtures: &'f Fixtures,
    validator: ConvergenceValidator,
    generator: PerturbationGenerator,
}

impl<'f> ScenarioRunner<'f> {
    pub fn new(
        fixtures: &'f Fixtures,
        settings: ValidatorSettings,
        generator: PerturbationGenerator,
    ) -> Self {
        ScenarioRunner {
            fixtures,
            validator: ConvergenceValidator::new(settings),
            generator,
        }
    }

    pub fn run(&self, case: &CaseSpec) -> Result<CaseOutcome> {
        let label = case.label();
        let _span = info_span!("case", %label).entered();

        let fixture = self.fixtures.get(&case.system)?;
        let mut config = SolverConfig::new(fixture.system.clone(), case.ncas, case.nelecas);
        if let Some(two_s) = case.spin {
            config = config.with_spin(two_s);
        }
        let mut solver = CasModel::new(config)?;
        let casci = solver.casci(&fixture.scf.mo_coeff)?;
        let state0 = casci.state;
        let space = solver.space();

        let kernel = ModelFunctional::from_name(&case.functional, fixture.system.grid.clone())?;
        let builder = EffectiveHamiltonianBuilder::new(&kernel);
        let options = ViewOptions {
            paaa_only: false,
            jk_pc: case.jk_pc,
        };

        let dm0 = DensityMatrixSet::from_solver(&solver, &state0)?;
        let mo_cas0 = active_orbitals(&state0, space);
        let e_ot = builder.on_top_energy(&dm0, &mo_cas0)?;
        info!("{}: E_ot = {:.12} au", kernel.name(), e_ot);

        let veff_ao = builder.veff(&dm0, &mo_cas0)?;
        let veff = OperatorSet {
            views: EffectiveTwoBody::from_ao(&veff_ao.two_body, &state0.mo_coeff, space, options)?,
            ao: veff_ao,
        };
        let feff = match case.suite {
            SuiteKind::Summed => {
                let ao = builder.feff(&dm0, None, &mo_cas0)?;
                Some(OperatorSet {
                    views: EffectiveTwoBody::from_ao(&ao.two_body, &state0.mo_coeff, space, options)?,
                    ao,
                })
            }
            SuiteKind::FixedOperator => None,
        };

        // extractor input; the reference below always uses the true operators
        let (veff_views, feff_views) = if case.negative_control {
            warn!("negative control: all-active block of the extracted operators flipped");
            (
                veff.views.with_flipped_active_block(),
                feff.as_ref().map(|f| f.views.with_flipped_active_block()),
            )
        } else {
            (veff.views.clone(), feff.as_ref().map(|f| f.views.clone()))
        };

        let mut gh = extract(&mut solver, &veff.ao.one_body, &veff_views, &state0)?;
        if let (Some(f), Some(views)) = (&feff, &feff_views) {
            let gf = extract(&mut solver, &f.ao.one_body, views, &state0)?;
            gh = gh.try_add(&gf)?;
        }
        if gh.len() != solver.nparams() {
            return Err(FeffError::DimensionMismatch {
                context: "gradient length vs rotation parameters",
                expected: solver.nparams(),
                found: gh.len(),
            });
        }

        let perturbation = self.generator.generate(&gh, case.seed);

        let reference = |state: &CasState| -> Result<f64> {
            match case.suite {
                SuiteKind::Summed => {
                    let dm = DensityMatrixSet::from_solver(&solver, state)?;
                    let ao = builder.veff(&dm, &active_orbitals(state, space))?;
                    let views = EffectiveTwoBody::from_ao(
                        &ao.two_body,
                        &state.mo_coeff,
                        space,
                        ViewOptions::paaa_only(),
                    )?;
                    contract_veff(&solver, state, &ao.one_body, &views, None)
                }
                SuiteKind::FixedOperator => {
                    let views = EffectiveTwoBody::from_ao(
                        &veff.ao.two_body,
                        &state.mo_coeff,
                        space,
                        ViewOptions::paaa_only(),
                    )?;
                    contract_veff(&solver, state, &veff.ao.one_body, &views, None)
                }
            }
        };

        let r0 = reference(&state0)?;
        let diagnostics = Diagnostics {
            reference_energy: r0,
            veff_one_body: veff.ao.one_body.fingerprint(),
            veff_active_block: veff.views.active_block().fingerprint(),
            veff_vhf_c_active: vhf_c_active(&veff.views).fingerprint(),
            veff_energy_core: veff.views.energy_core,
            feff_one_body: feff.as_ref().map(|f| f.ao.one_body.fingerprint()),
            feff_active_block: feff.as_ref().map(|f| f.views.active_block().fingerprint()),
            feff_energy_core: feff.as_ref().map(|f| f.views.energy_core),
            total_one_body: match &feff {
                Some(f) => (&veff.ao.one_body + &f.ao.one_body).fingerprint(),
                None => veff.ao.one_body.fingerprint(),
            },
            j_pc: veff.views.j_pc.as_ref().map(|j| j.fingerprint()),
            k_pc: veff.views.k_pc.as_ref().map(|k| k.fingerprint()),
            gradient: gh.gradient.fingerprint(),
        };
        info!(
            "fp(veff1) = {:.12}, fp(veff2_aaaa) = {:.12}, fp(vhf_c_aa) = {:.12}, E_core(veff) = {:.12}",
            diagnostics.veff_one_body,
            diagnostics.veff_active_block,
            diagnostics.veff_vhf_c_active,
            diagnostics.veff_energy_core
        );
        if let (Some(f1), Some(f2), Some(ec)) = (
            diagnostics.feff_one_body,
            diagnostics.feff_active_block,
            diagnostics.feff_energy_core,
        ) {
            info!("fp(feff1) = {:.12}, fp(feff2_aaaa) = {:.12}, E_core(feff) = {:.12}", f1, f2, ec);
        }
        info!("fp(one-body total) = {:.12}, R0 = {:.12}", diagnostics.total_one_body, r0);
        if let (Some(j), Some(k)) = (diagnostics.j_pc, diagnostics.k_pc) {
            info!("fp(j_pc) = {:.12}, fp(k_pc) = {:.12}", j, k);
        }

        let report = self.validator.validate(&gh.gradient, &perturbation.direction, |x| {
            let moved = solver.rotate(&state0, x)?;
            Ok(reference(&moved)? - r0)
        })?;

        info!(
            "{} passed after {} steps (error ratio {:.4}, error {:.3e})",
            label, report.iterations, report.final_error_ratio, report.final_error
        );
        Ok(CaseOutcome {
            label,
            report,
            diagnostics,
        })
    }
}

/// Convenience wrapper over [`ScenarioRunner::run`]
pub fn run_case(
    fixtures: &Fixtures,
    case: &CaseSpec,
    settings: &ValidatorSettings,
    generator: &PerturbationGenerator,
) -> Result<CaseOutcome> {
    ScenarioRunner::new(fixtures, settings.clone(), *generator).run(case)
}
