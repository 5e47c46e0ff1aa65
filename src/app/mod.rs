mod report;
mod runner;

pub use runner::{judge, run_cases, CaseResult, CaseStatus};

use self::report::{report_case, report_summary};
use crate::config::{Args, Config};
use crate::fixtures::{setup_fixtures, teardown_fixtures};
use crate::io::setup_output;
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use std::fs;
use tracing::info;

pub struct FeffCheckApplication {
    args: Args,
    config: Config,
}

impl FeffCheckApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());
        info!("Configuration loaded from {}", self.args.config_file);

        let settings = self.config.validator_settings(&self.args);
        let generator = self.config.perturbation_generator();
        let cases = self.config.cases(&self.args);
        info!(
            "{} cases, max {} halvings, strict checks {}",
            cases.len(),
            settings.max_iterations,
            if settings.strict { "on" } else { "off" }
        );

        let fixtures = setup_fixtures(&self.config.system_specs(), &self.config.scf_params.settings())
            .wrap_err("Failed to set up model systems")?;
        let results = run_cases(&fixtures, &cases, &settings, generator);
        teardown_fixtures(fixtures);

        for result in &results {
            report_case(result);
        }
        report_summary(&results);

        let failed = results.iter().filter(|r| !r.status.is_success()).count();
        if failed > 0 {
            return Err(eyre!("{} of {} cases failed", failed, results.len()));
        }
        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
