//! Seeded model molecular system
//!
//! Integrals live in an orthonormal AO basis whose size follows the
//! per-element function counts of `sto-3g` and `6-31g`. The one-electron
//! Hamiltonian is an ordered diagonal with symmetric noise; the ERIs are
//! built from symmetric factors, `(μν|λσ) = Σ_P L_P[μν] L_P[λσ]`, which
//! makes them 8-fold symmetric and positive semidefinite.

extern crate nalgebra as na;

use crate::error::{FeffError, Result};
use crate::kernel::QuadratureGrid;
use crate::tensor::{jk_from_eri, Tensor4};
use na::{DMatrix, DVector};
use ndarray::Array4;
use periodic_table_on_an_enum::Element;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ModelSystem {
    pub name: String,
    pub elements: Vec<Element>,
    pub basis: String,
    pub nao: usize,
    pub nelectron: usize,
    pub hcore: DMatrix<f64>,
    pub eri: Tensor4,
    pub grid: QuadratureGrid,
}

/// Number of basis functions of one element
pub fn basis_size(element: &Element, basis: &str) -> Result<usize> {
    let z = element.get_atomic_number() as usize;
    let count = match (basis.to_ascii_lowercase().as_str(), z) {
        ("sto-3g", 1..=2) => 1,
        ("sto-3g", 3..=10) => 5,
        ("6-31g", 1..=2) => 2,
        ("6-31g", 3..=10) => 9,
        (b @ ("sto-3g" | "6-31g"), _) => {
            return Err(FeffError::Config(format!(
                "element {} is not available in the {} model basis",
                element.get_symbol(),
                b
            )))
        }
        (other, _) => {
            return Err(FeffError::Config(format!("unknown basis set `{}`", other)));
        }
    };
    Ok(count)
}

impl ModelSystem {
    pub fn from_atoms(
        name: &str,
        elements: &[Element],
        basis: &str,
        seed: u64,
        grid_points: usize,
    ) -> Result<Self> {
        if elements.is_empty() {
            return Err(FeffError::Config(format!("system `{}` has no atoms", name)));
        }
        let nao = elements
            .iter()
            .map(|e| basis_size(e, basis))
            .sum::<Result<usize>>()?;
        let nelectron: usize = elements
            .iter()
            .map(|e| e.get_atomic_number() as usize)
            .sum();

        let mut rng = StdRng::seed_from_u64(seed);

        let mut hcore = DMatrix::zeros(nao, nao);
        for mu in 0..nao {
            hcore[(mu, mu)] = -2.5 + 0.5 * mu as f64 + 0.05 * (2.0 * rng.gen::<f64>() - 1.0);
            for nu in 0..mu {
                let v = 0.15 * (2.0 * rng.gen::<f64>() - 1.0);
                hcore[(mu, nu)] = v;
                hcore[(nu, mu)] = v;
            }
        }

        let naux = 2 * nao;
        let mut factors = Vec::with_capacity(naux);
        for _ in 0..naux {
            let mut l = DMatrix::zeros(nao, nao);
            for mu in 0..nao {
                l[(mu, mu)] = 0.15 + 0.25 * rng.gen::<f64>();
                for nu in 0..mu {
                    let v = 0.08 * (2.0 * rng.gen::<f64>() - 1.0);
                    l[(mu, nu)] = v;
                    l[(nu, mu)] = v;
                }
            }
            factors.push(l);
        }
        let eri = Array4::from_shape_fn((nao, nao, nao, nao), |(p, q, r, s)| {
            factors.iter().map(|l| l[(p, q)] * l[(r, s)]).sum()
        });

        let ao = DMatrix::from_fn(grid_points, nao, |_, _| 2.0 * rng.gen::<f64>() - 1.0);
        let weights = DVector::from_fn(grid_points, |_, _| 0.05 + 0.1 * rng.gen::<f64>());
        let grid = QuadratureGrid::new(ao, weights)?;

        info!("===========================================");
        info!("        Model system: {}", name);
        info!("===========================================");
        info!(
            "Atoms: {}",
            elements
                .iter()
                .map(|e| e.get_symbol())
                .collect::<Vec<_>>()
                .join(" ")
        );
        info!("Basis: {} ({} functions)", basis, nao);
        info!("Electrons: {}", nelectron);
        info!("Grid points: {}", grid_points);
        info!("Seed: {}", seed);

        Ok(ModelSystem {
            name: name.to_string(),
            elements: elements.to_vec(),
            basis: basis.to_string(),
            nao,
            nelectron,
            hcore,
            eri,
            grid,
        })
    }

    /// Parse element symbols (`["Li", "H"]`) and build the system
    pub fn from_symbols(
        name: &str,
        symbols: &[String],
        basis: &str,
        seed: u64,
        grid_points: usize,
    ) -> Result<Self> {
        let elements = symbols
            .iter()
            .map(|s| {
                Element::from_symbol(s)
                    .ok_or_else(|| FeffError::Config(format!("invalid element symbol: {}", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_atoms(name, &elements, basis, seed, grid_points)
    }

    pub fn jk(&self, dm: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        jk_from_eri(&self.eri, dm)
    }
}
