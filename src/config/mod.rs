//! Configuration of a verification run
//!
//! A YAML file lists the model systems, the reference SCF parameters, the
//! validator thresholds and the cases to run. Missing optional fields are
//! filled by `with_defaults`.

mod args;

pub use args::Args;

use crate::fixtures::SystemSpec;
use crate::perturbation::PerturbationGenerator;
use crate::scenario::CaseSpec;
use crate::system_impl::ScfSettings;
use crate::validation_impl::ValidatorSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub systems: Vec<SystemParams>,
    #[serde(default)]
    pub scf_params: ScfParams,
    pub validation: Option<ValidationParams>,
    pub cases: Vec<CaseSpec>,
}

/// Model system entry
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemParams {
    pub name: String,
    pub atoms: Vec<String>,
    pub basis: Option<String>,
    pub seed: Option<u64>,
    pub grid_points: Option<usize>,
}

impl SystemParams {
    pub fn with_defaults(mut self) -> Self {
        let defaults = SystemSpec::lih();
        if self.basis.is_none() {
            self.basis = Some(defaults.basis);
        }
        if self.seed.is_none() {
            self.seed = Some(defaults.seed);
        }
        if self.grid_points.is_none() {
            self.grid_points = Some(defaults.grid_points);
        }
        self
    }

    pub fn to_spec(&self) -> SystemSpec {
        let defaults = SystemSpec::lih();
        SystemSpec {
            name: self.name.clone(),
            atoms: self.atoms.clone(),
            basis: self.basis.clone().unwrap_or(defaults.basis),
            seed: self.seed.unwrap_or(defaults.seed),
            grid_points: self.grid_points.unwrap_or(defaults.grid_points),
        }
    }
}

/// Reference RHF parameters
#[derive(Debug, Deserialize, Serialize)]
pub struct ScfParams {
    pub density_mixing: Option<f64>,
    pub max_cycle: Option<usize>,
    pub diis_subspace_size: Option<usize>,
    pub convergence_threshold: Option<f64>,
}

impl Default for ScfParams {
    fn default() -> Self {
        let defaults = ScfSettings::default();
        ScfParams {
            density_mixing: Some(defaults.density_mixing),
            max_cycle: Some(defaults.max_cycle),
            diis_subspace_size: Some(defaults.diis_subspace_size),
            convergence_threshold: Some(defaults.convergence_threshold),
        }
    }
}

impl ScfParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.density_mixing.is_none() {
            self.density_mixing = defaults.density_mixing;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.diis_subspace_size.is_none() {
            self.diis_subspace_size = defaults.diis_subspace_size;
        }
        if self.convergence_threshold.is_none() {
            self.convergence_threshold = defaults.convergence_threshold;
        }
        self
    }

    pub fn settings(&self) -> ScfSettings {
        let defaults = ScfSettings::default();
        ScfSettings {
            max_cycle: self.max_cycle.unwrap_or(defaults.max_cycle),
            density_mixing: self.density_mixing.unwrap_or(defaults.density_mixing),
            diis_subspace_size: self.diis_subspace_size.unwrap_or(defaults.diis_subspace_size),
            convergence_threshold: self
                .convergence_threshold
                .unwrap_or(defaults.convergence_threshold),
        }
    }
}

/// Validator and perturbation parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValidationParams {
    pub max_iterations: Option<usize>,
    pub ratio_tolerance: Option<f64>,
    pub error_floor: Option<f64>,
    pub strict: Option<bool>,
    pub hessian_floor: Option<f64>,
}

impl Default for ValidationParams {
    fn default() -> Self {
        let defaults = ValidatorSettings::default();
        ValidationParams {
            max_iterations: Some(defaults.max_iterations),
            ratio_tolerance: Some(defaults.ratio_tolerance),
            error_floor: Some(defaults.error_floor),
            strict: Some(defaults.strict),
            hessian_floor: Some(PerturbationGenerator::default().hessian_floor),
        }
    }
}

impl ValidationParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.max_iterations.is_none() {
            self.max_iterations = defaults.max_iterations;
        }
        if self.ratio_tolerance.is_none() {
            self.ratio_tolerance = defaults.ratio_tolerance;
        }
        if self.error_floor.is_none() {
            self.error_floor = defaults.error_floor;
        }
        if self.strict.is_none() {
            self.strict = defaults.strict;
        }
        if self.hessian_floor.is_none() {
            self.hessian_floor = defaults.hessian_floor;
        }
        self
    }
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.systems = self.systems.into_iter().map(SystemParams::with_defaults).collect();
        self.scf_params = self.scf_params.with_defaults();
        self.validation = Some(self.validation.take().unwrap_or_default().with_defaults());
        self
    }

    pub fn system_specs(&self) -> Vec<SystemSpec> {
        self.systems.iter().map(SystemParams::to_spec).collect()
    }

    /// Validator settings with command-line overrides applied
    pub fn validator_settings(&self, args: &Args) -> ValidatorSettings {
        let mut settings = ValidatorSettings::default();
        if let Some(v) = &self.validation {
            settings.max_iterations = v.max_iterations.unwrap_or(settings.max_iterations);
            settings.ratio_tolerance = v.ratio_tolerance.unwrap_or(settings.ratio_tolerance);
            settings.error_floor = v.error_floor.unwrap_or(settings.error_floor);
            settings.strict = v.strict.unwrap_or(settings.strict);
        }
        if let Some(max_iterations) = args.max_iterations {
            settings.max_iterations = max_iterations;
        }
        if args.lenient {
            settings.strict = false;
        }
        settings
    }

    pub fn perturbation_generator(&self) -> PerturbationGenerator {
        self.validation
            .as_ref()
            .and_then(|v| v.hessian_floor)
            .map(PerturbationGenerator::new)
            .unwrap_or_default()
    }

    /// Cases with command-line overrides applied
    pub fn cases(&self, args: &Args) -> Vec<CaseSpec> {
        self.cases
            .iter()
            .cloned()
            .map(|mut case| {
                if let Some(seed) = args.seed {
                    case.seed = seed;
                }
                if args.negative_control {
                    case.negative_control = true;
                }
                case
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::SuiteKind;
    use clap::Parser;

    const SAMPLE: &str = r#"
systems:
  - name: LiH
    atoms: [Li, H]
scf_params:
  max_cycle: 50
validation:
  strict: false
cases:
  - system: LiH
    ncas: 2
    nelecas: 2
    functional: ftLDA,VWN3
    seed: 1
    suite: summed
  - system: LiH
    ncas: 3
    nelecas: 4
    functional: tPBE
    seed: 1
    suite: fixed_operator
    negative_control: true
"#;

    #[test]
    fn test_parse_and_fill_defaults() {
        let config = serde_yml::from_str::<Config>(SAMPLE).unwrap().with_defaults();
        let specs = config.system_specs();
        assert_eq!(specs, vec![SystemSpec::lih()]);
        assert_eq!(config.scf_params.settings().max_cycle, 50);
        assert_eq!(config.scf_params.settings().diis_subspace_size, 8);
        assert_eq!(config.cases.len(), 2);
        assert_eq!(config.cases[0].suite, SuiteKind::Summed);
        assert_eq!(config.cases[1].suite, SuiteKind::FixedOperator);
        assert!(config.cases[1].negative_control);
        assert!(!config.cases[0].jk_pc);
        assert_eq!(config.cases[0].spin, None);
        assert_eq!(config.perturbation_generator(), PerturbationGenerator::default());
    }

    #[test]
    fn test_command_line_overrides() {
        let config = serde_yml::from_str::<Config>(SAMPLE).unwrap().with_defaults();
        let args = Args::parse_from([
            "feff-check",
            "--max-iterations",
            "12",
            "--seed",
            "9",
            "--negative-control",
        ]);
        let settings = config.validator_settings(&args);
        assert_eq!(settings.max_iterations, 12);
        assert!(!settings.strict);
        let cases = config.cases(&args);
        assert!(cases.iter().all(|c| c.seed == 9 && c.negative_control));
    }
}
