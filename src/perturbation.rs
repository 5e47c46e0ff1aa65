//! Random test directions shaped like a Newton step
//!
//! The direction keeps the zero pattern of the gradient and, block by block,
//! the norm of `-g / h`. Draws come from `StdRng::seed_from_u64`, one per
//! element in order, so a seed reproduces the direction bit for bit.

extern crate nalgebra as na;

use crate::gradient::GradientHessian;
use na::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationGenerator {
    /// Gradient entries below this magnitude are treated as exact zeros
    pub zero_threshold: f64,
    /// Smallest admissible |h| in the Newton step denominator
    pub hessian_floor: f64,
}

impl Default for PerturbationGenerator {
    fn default() -> Self {
        PerturbationGenerator {
            zero_threshold: 1e-8,
            hessian_floor: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Perturbation {
    pub direction: DVector<f64>,
    pub newton_step: DVector<f64>,
    /// True where the gradient is numerically zero
    pub mask: Vec<bool>,
    pub ngorb: usize,
}

fn block_norm(v: &DVector<f64>, start: usize, len: usize) -> f64 {
    v.rows(start, len).norm()
}

fn rescale_block(v: &mut DVector<f64>, start: usize, len: usize, target: f64) {
    let norm = block_norm(v, start, len);
    if norm > 0.0 {
        v.rows_mut(start, len).scale_mut(target / norm);
    }
}

impl PerturbationGenerator {
    pub fn new(hessian_floor: f64) -> Self {
        PerturbationGenerator {
            hessian_floor,
            ..Self::default()
        }
    }

    /// Newton-step denominators with masked entries set to one and small
    /// entries clamped to the floor
    fn denominators(&self, gh: &GradientHessian, mask: &[bool]) -> DVector<f64> {
        DVector::from_fn(gh.len(), |i, _| {
            let h = gh.hessian_diag[i];
            if mask[i] {
                1.0
            } else if h.abs() < self.hessian_floor {
                if h < 0.0 {
                    -self.hessian_floor
                } else {
                    self.hessian_floor
                }
            } else {
                h
            }
        })
    }

    pub fn generate(&self, gh: &GradientHessian, seed: u64) -> Perturbation {
        let n = gh.len();
        let ngorb = gh.ngorb();
        let nci = gh.nci();
        let g = &gh.gradient;
        let mask: Vec<bool> = g.iter().map(|x| x.abs() < self.zero_threshold).collect();

        let denom = self.denominators(gh, &mask);
        let newton_step = DVector::from_fn(n, |i, _| if mask[i] { 0.0 } else { -g[i] / denom[i] });
        let orb_norm = block_norm(&newton_step, 0, ngorb);
        let ci_norm = block_norm(&newton_step, ngorb, nci);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut direction = DVector::zeros(n);
        for i in 0..n {
            let u: f64 = rng.gen();
            direction[i] = if mask[i] { 0.0 } else { g[i].abs() * (u - 0.5) };
        }
        rescale_block(&mut direction, 0, ngorb, orb_norm);
        rescale_block(&mut direction, ngorb, nci, ci_norm);

        info!(
            "Perturbation (seed {}): |step_orb| = {:.6e}, |step_ci| = {:.6e}, {} masked entries",
            seed,
            orb_norm,
            ci_norm,
            mask.iter().filter(|&&m| m).count()
        );

        Perturbation {
            direction,
            newton_step,
            mask,
            ngorb,
        }
    }
}
