//! Determinant strings and spin-adapted excitation operators
//!
//! Occupation strings are bitmasks over the active orbitals, listed in
//! ascending order. A CI vector is an `(n_alpha_strings, n_beta_strings)`
//! row-major array flattened into a `DVector`.

extern crate nalgebra as na;

use crate::tensor::Tensor4;
use na::{DMatrix, DVector};
use ndarray::Array4;
use std::collections::HashMap;

/// All strings of `nelec` electrons in `norb` orbitals, ascending
pub fn make_strings(norb: usize, nelec: usize) -> Vec<u64> {
    (0u64..(1u64 << norb))
        .filter(|s| s.count_ones() as usize == nelec)
        .collect()
}

fn parity(bits: u64) -> f64 {
    if bits.count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Excitation {
    source: usize,
    target: usize,
    sign: f64,
}

/// `a+_p a_q` over one spin's strings, indexed by `p * norb + q`
fn string_excitations(strings: &[u64], norb: usize) -> Vec<Vec<Excitation>> {
    let index: HashMap<u64, usize> = strings.iter().enumerate().map(|(i, &s)| (s, i)).collect();
    let mut table = Vec::with_capacity(norb * norb);
    for p in 0..norb {
        for q in 0..norb {
            let mut list = Vec::new();
            for (source, &s) in strings.iter().enumerate() {
                if s & (1 << q) == 0 {
                    continue;
                }
                let s1 = s ^ (1 << q);
                if s1 & (1 << p) != 0 {
                    continue;
                }
                let s2 = s1 | (1 << p);
                let sign = parity(s & ((1 << q) - 1)) * parity(s1 & ((1 << p) - 1));
                if let Some(&target) = index.get(&s2) {
                    list.push(Excitation { source, target, sign });
                }
            }
            table.push(list);
        }
    }
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spin {
    Alpha,
    Beta,
}

/// Determinant space of an active space with fixed `(n_alpha, n_beta)`
#[derive(Debug, Clone)]
pub struct CiSpace {
    norb: usize,
    alpha: Vec<u64>,
    beta: Vec<u64>,
    alpha_ex: Vec<Vec<Excitation>>,
    beta_ex: Vec<Vec<Excitation>>,
}

impl CiSpace {
    pub fn new(norb: usize, nelec: (usize, usize)) -> Self {
        let alpha = make_strings(norb, nelec.0);
        let beta = make_strings(norb, nelec.1);
        let alpha_ex = string_excitations(&alpha, norb);
        let beta_ex = string_excitations(&beta, norb);
        CiSpace {
            norb,
            alpha,
            beta,
            alpha_ex,
            beta_ex,
        }
    }

    pub fn norb(&self) -> usize {
        self.norb
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.alpha.len(), self.beta.len())
    }

    pub fn ndet(&self) -> usize {
        self.alpha.len() * self.beta.len()
    }

    /// `E^σ_pq c` for one spin channel
    pub fn apply_spin(&self, spin: Spin, p: usize, q: usize, c: &DVector<f64>) -> DVector<f64> {
        let (na, nb) = self.shape();
        let mut out = DVector::zeros(c.len());
        match spin {
            Spin::Alpha => {
                for ex in &self.alpha_ex[p * self.norb + q] {
                    for ib in 0..nb {
                        out[ex.target * nb + ib] += ex.sign * c[ex.source * nb + ib];
                    }
                }
            }
            Spin::Beta => {
                for ex in &self.beta_ex[p * self.norb + q] {
                    for ia in 0..na {
                        out[ia * nb + ex.target] += ex.sign * c[ia * nb + ex.source];
                    }
                }
            }
        }
        out
    }

    /// Spin-summed `E_pq c`
    pub fn apply(&self, p: usize, q: usize, c: &DVector<f64>) -> DVector<f64> {
        self.apply_spin(Spin::Alpha, p, q, c) + self.apply_spin(Spin::Beta, p, q, c)
    }

    /// `E_pq c` for every pair, indexed by `p * norb + q`
    fn excited_vectors(&self, c: &DVector<f64>) -> Vec<DVector<f64>> {
        let n = self.norb;
        (0..n * n).map(|pq| self.apply(pq / n, pq % n, c)).collect()
    }

    /// Spin-resolved one-body densities `<p+ q>`
    pub fn make_rdm1s(&self, c: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
        let n = self.norb;
        let alpha = DMatrix::from_fn(n, n, |p, q| c.dot(&self.apply_spin(Spin::Alpha, p, q, c)));
        let beta = DMatrix::from_fn(n, n, |p, q| c.dot(&self.apply_spin(Spin::Beta, p, q, c)));
        (alpha, beta)
    }

    /// Spin-summed one- and two-body densities,
    /// `dm2[p,q,r,s] = <p+ r+ s q> = <E_pq E_rs> - δ_qr <E_ps>`.
    pub fn make_rdm12(&self, c: &DVector<f64>) -> (DMatrix<f64>, Tensor4) {
        let n = self.norb;
        let ec = self.excited_vectors(c);
        let dm1 = DMatrix::from_fn(n, n, |p, q| c.dot(&ec[p * n + q]));
        let dm2 = Array4::from_shape_fn((n, n, n, n), |(p, q, r, s)| {
            let mut v = ec[q * n + p].dot(&ec[r * n + s]);
            if q == r {
                v -= dm1[(p, s)];
            }
            v
        });
        (dm1, dm2)
    }

    /// `H c` for `H = Σ h_pq E_pq + ½ Σ (pq|rs) (E_pq E_rs - δ_qr E_ps)`
    pub fn sigma(&self, h1: &DMatrix<f64>, eri: &Tensor4, c: &DVector<f64>) -> DVector<f64> {
        let n = self.norb;
        let ec = self.excited_vectors(c);
        let mut sigma = DVector::zeros(c.len());
        for p in 0..n {
            for q in 0..n {
                let mut k = h1[(p, q)];
                for r in 0..n {
                    k -= 0.5 * eri[[p, r, r, q]];
                }
                sigma.axpy(k, &ec[p * n + q], 1.0);

                let mut inner = DVector::zeros(c.len());
                for r in 0..n {
                    for s in 0..n {
                        inner.axpy(eri[[p, q, r, s]], &ec[r * n + s], 1.0);
                    }
                }
                sigma.axpy(0.5, &self.apply(p, q, &inner), 1.0);
            }
        }
        sigma
    }

    /// Explicit CI matrix, column by column from sigma vectors
    pub fn hamiltonian(&self, h1: &DMatrix<f64>, eri: &Tensor4) -> DMatrix<f64> {
        let ndet = self.ndet();
        let mut h = DMatrix::zeros(ndet, ndet);
        for k in 0..ndet {
            let mut unit = DVector::zeros(ndet);
            unit[k] = 1.0;
            h.set_column(k, &self.sigma(h1, eri, &unit));
        }
        // symmetrize round-off
        (&h + h.transpose()) * 0.5
    }
}
