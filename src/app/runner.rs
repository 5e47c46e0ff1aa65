use crate::error::FeffError;
use crate::fixtures::Fixtures;
use crate::perturbation::PerturbationGenerator;
use crate::scenario::{CaseOutcome, CaseSpec, ScenarioRunner};
use crate::validation_impl::ValidatorSettings;
use tracing::{error, info, warn};

/// Result of one case, judged against its expectation
#[derive(Debug)]
pub enum CaseStatus {
    Passed(CaseOutcome),
    /// Negative control rejected by the validator, as it should be
    ExpectedFailure(FeffError),
    Failed(FeffError),
    /// Negative control that converged
    UnexpectedPass(CaseOutcome),
}

impl CaseStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CaseStatus::Passed(_) | CaseStatus::ExpectedFailure(_))
    }
}

#[derive(Debug)]
pub struct CaseResult {
    pub label: String,
    pub status: CaseStatus,
}

pub fn judge(case: &CaseSpec, result: crate::error::Result<CaseOutcome>) -> CaseStatus {
    match (case.negative_control, result) {
        (false, Ok(outcome)) => CaseStatus::Passed(outcome),
        (false, Err(err)) => CaseStatus::Failed(err),
        (true, Err(err)) if err.is_validation_failure() => CaseStatus::ExpectedFailure(err),
        (true, Err(err)) => CaseStatus::Failed(err),
        (true, Ok(outcome)) => CaseStatus::UnexpectedPass(outcome),
    }
}

pub fn run_cases(
    fixtures: &Fixtures,
    cases: &[CaseSpec],
    settings: &ValidatorSettings,
    generator: PerturbationGenerator,
) -> Vec<CaseResult> {
    let runner = ScenarioRunner::new(fixtures, settings.clone(), generator);
    cases
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let label = case.label();
            info!("\n[{}/{}] {}", i + 1, cases.len(), label);
            let status = judge(case, runner.run(case));
            match &status {
                CaseStatus::Passed(_) => {}
                CaseStatus::ExpectedFailure(_) => info!("negative control rejected as expected"),
                CaseStatus::Failed(err) => error!("{} failed: {}", label, err),
                CaseStatus::UnexpectedPass(_) => warn!("negative control {} converged", label),
            }
            CaseResult { label, status }
        })
        .collect()
}
