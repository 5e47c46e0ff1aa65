//! Restricted Hartree-Fock on a model system
//!
//! Produces the reference orbitals shared by every case of a system. The AO
//! basis is orthonormal, so the DIIS error reduces to the commutator
//! `FD - DF` and the Roothaan equations to a plain symmetric eigenproblem.

extern crate nalgebra as na;

use super::model::ModelSystem;
use crate::error::{FeffError, Result};
use na::{DMatrix, DVector};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// DIIS convergence accelerator over Fock matrices
pub struct Diis {
    error_matrices: Vec<DMatrix<f64>>,
    fock_matrices: Vec<DMatrix<f64>>,
    max_subspace_size: usize,
}

impl Diis {
    pub fn new(max_subspace_size: usize) -> Self {
        Diis {
            error_matrices: Vec::new(),
            fock_matrices: Vec::new(),
            max_subspace_size,
        }
    }

    /// Commutator `FD - DF` in an orthonormal basis
    pub fn error_matrix(fock: &DMatrix<f64>, density: &DMatrix<f64>) -> DMatrix<f64> {
        fock * density - density * fock
    }

    /// Push a Fock matrix and its error; drops the oldest pair when full.
    pub fn update(&mut self, fock: DMatrix<f64>, density: &DMatrix<f64>) -> f64 {
        let error = Self::error_matrix(&fock, density);
        let norm = error.norm();
        if self.error_matrices.len() >= self.max_subspace_size {
            self.error_matrices.remove(0);
            self.fock_matrices.remove(0);
        }
        self.error_matrices.push(error);
        self.fock_matrices.push(fock);
        norm
    }

    /// Extrapolated Fock matrix `Σ c_i F_i`, or `None` when the DIIS
    /// equations are singular.
    pub fn extrapolate(&self) -> Option<DMatrix<f64>> {
        let n = self.error_matrices.len();
        if n == 0 {
            return None;
        }

        let mut b = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..n {
                b[(i, j)] = self.error_matrices[i].dot(&self.error_matrices[j]);
            }
            b[(i, n)] = -1.0;
            b[(n, i)] = -1.0;
        }

        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = -1.0;

        let coeffs = match b.lu().solve(&rhs) {
            Some(x) => x,
            None => {
                debug!("DIIS extrapolation failed: singular B matrix");
                return None;
            }
        };

        let mut fock = DMatrix::zeros(self.fock_matrices[0].nrows(), self.fock_matrices[0].ncols());
        for (i, f) in self.fock_matrices.iter().enumerate() {
            fock += f * coeffs[i];
        }
        Some(fock)
    }

    pub fn size(&self) -> usize {
        self.error_matrices.len()
    }
}

/// Flip each column so that its largest-magnitude component is positive
pub fn align_eigenvectors(mut eigvecs: DMatrix<f64>) -> DMatrix<f64> {
    for j in 0..eigvecs.ncols() {
        let max_val = eigvecs
            .column(j)
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Less))
            .unwrap_or(0.0);
        if max_val < 0.0 {
            eigvecs.column_mut(j).neg_mut();
        }
    }
    eigvecs
}

/// Eigen-decomposition of a symmetric matrix with ascending eigenvalues
pub fn sorted_symmetric_eigen(m: DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let eig = m.symmetric_eigen();
    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });
    let values = DVector::from_fn(indices.len(), |i, _| eig.eigenvalues[indices[i]]);
    let vectors = eig.eigenvectors.select_columns(&indices);
    (values, align_eigenvectors(vectors))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScfSettings {
    pub max_cycle: usize,
    pub density_mixing: f64,
    /// Zero disables DIIS
    pub diis_subspace_size: usize,
    pub convergence_threshold: f64,
}

impl Default for ScfSettings {
    fn default() -> Self {
        ScfSettings {
            max_cycle: 100,
            density_mixing: 0.5,
            diis_subspace_size: 8,
            convergence_threshold: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScfResult {
    pub mo_coeff: DMatrix<f64>,
    pub mo_energy: DVector<f64>,
    pub energy: f64,
    pub cycles: usize,
    pub converged: bool,
}

pub struct ModelScf {
    settings: ScfSettings,
}

impl ModelScf {
    pub fn new(settings: ScfSettings) -> Self {
        ModelScf { settings }
    }

    fn density(mo_coeff: &DMatrix<f64>, nocc: usize) -> DMatrix<f64> {
        let occ = mo_coeff.columns(0, nocc);
        &occ * occ.transpose() * 2.0
    }

    fn fock(system: &ModelSystem, density: &DMatrix<f64>) -> DMatrix<f64> {
        let (j, k) = system.jk(density);
        &system.hcore + j - k * 0.5
    }

    pub fn run(&self, system: &ModelSystem) -> Result<ScfResult> {
        if system.nelectron % 2 != 0 {
            return Err(FeffError::Config(format!(
                "restricted reference needs an even electron count, {} has {}",
                system.name, system.nelectron
            )));
        }
        let nocc = system.nelectron / 2;
        if nocc > system.nao {
            return Err(FeffError::DimensionMismatch {
                context: "occupied orbitals vs basis size",
                expected: system.nao,
                found: nocc,
            });
        }
        let s = &self.settings;

        info!("-------------------------------------------");
        info!("  RHF for {} ({} occupied orbitals)", system.name, nocc);
        info!("-------------------------------------------");

        let (mut mo_energy, mut mo_coeff) = sorted_symmetric_eigen(system.hcore.clone());
        let mut density = Self::density(&mo_coeff, nocc);
        let mut diis = (s.diis_subspace_size > 0).then(|| Diis::new(s.diis_subspace_size));
        let mut old_energy = 0.0;
        let mut converged = false;
        let mut cycles = 0;

        for cycle in 0..s.max_cycle {
            cycles = cycle + 1;
            let fock = Self::fock(system, &density);
            let energy = 0.5 * density.dot(&(&system.hcore + &fock));

            let (error_norm, fock) = match diis.as_mut() {
                Some(d) => {
                    let norm = d.update(fock.clone(), &density);
                    let extrapolated = if d.size() > 1 { d.extrapolate() } else { None };
                    (norm, extrapolated.unwrap_or(fock))
                }
                None => (Diis::error_matrix(&fock, &density).norm(), fock),
            };

            let energy_change = energy - old_energy;
            info!(
                "Cycle {}: E = {:.12} au, dE = {:.3e} au, |FD-DF| = {:.3e}",
                cycle, energy, energy_change, error_norm
            );
            if cycle > 0
                && energy_change.abs() < s.convergence_threshold
                && error_norm < s.convergence_threshold.sqrt()
            {
                converged = true;
                old_energy = energy;
                break;
            }
            old_energy = energy;

            let (e, c) = sorted_symmetric_eigen(fock);
            mo_energy = e;
            mo_coeff = c;
            let new_density = Self::density(&mo_coeff, nocc);
            density = if diis.is_some() {
                new_density
            } else {
                &new_density * (1.0 - s.density_mixing) + &density * s.density_mixing
            };
        }

        if converged {
            info!("SCF converged in {} cycles.", cycles);
        } else {
            warn!("SCF did not converge in {} cycles", s.max_cycle);
        }
        info!("Orbital energies:");
        for (i, e) in mo_energy.iter().enumerate() {
            info!("  Level {}: {:.8} au", i + 1, e);
        }

        Ok(ScfResult {
            mo_coeff,
            mo_energy,
            energy: old_energy,
            cycles,
            converged,
        })
    }
}
