//! Shared per-run fixtures: model systems and their RHF orbitals
//!
//! Built once by [`setup_fixtures`], passed by reference into every case and
//! released by [`teardown_fixtures`].

use crate::error::{FeffError, Result};
use crate::system_impl::{ModelScf, ModelSystem, ScfResult, ScfSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Description of one model system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub name: String,
    pub atoms: Vec<String>,
    pub basis: String,
    pub seed: u64,
    pub grid_points: usize,
}

impl SystemSpec {
    /// LiH in the `sto-3g`-sized model basis
    pub fn lih() -> Self {
        SystemSpec {
            name: "LiH".to_string(),
            atoms: vec!["Li".to_string(), "H".to_string()],
            basis: "sto-3g".to_string(),
            seed: 7,
            grid_points: 32,
        }
    }
}

pub struct SystemFixture {
    pub system: Arc<ModelSystem>,
    pub scf: ScfResult,
}

pub struct Fixtures {
    systems: BTreeMap<String, SystemFixture>,
}

impl Fixtures {
    pub fn get(&self, name: &str) -> Result<&SystemFixture> {
        self.systems
            .get(name)
            .ok_or_else(|| FeffError::Config(format!("no fixture for system `{}`", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

pub fn setup_fixtures(specs: &[SystemSpec], scf_settings: &ScfSettings) -> Result<Fixtures> {
    let scf = ModelScf::new(scf_settings.clone());
    let mut systems = BTreeMap::new();
    for spec in specs {
        if systems.contains_key(&spec.name) {
            return Err(FeffError::Config(format!("duplicate system name `{}`", spec.name)));
        }
        let system = ModelSystem::from_symbols(
            &spec.name,
            &spec.atoms,
            &spec.basis,
            spec.seed,
            spec.grid_points,
        )?;
        let result = scf.run(&system)?;
        if !result.converged {
            warn!("Reference orbitals of {} are not converged", spec.name);
        }
        info!("Fixture {} ready: E(RHF) = {:.10} au", spec.name, result.energy);
        systems.insert(
            spec.name.clone(),
            SystemFixture {
                system: Arc::new(system),
                scf: result,
            },
        );
    }
    Ok(Fixtures { systems })
}

pub fn teardown_fixtures(fixtures: Fixtures) {
    for name in fixtures.names() {
        info!("Releasing fixture {}", name);
    }
    drop(fixtures);
}
