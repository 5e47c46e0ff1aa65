//! Small dense tensor helpers on top of `nalgebra` matrices and
//! `ndarray` rank-4 arrays.

extern crate nalgebra as na;

use na::{DMatrix, DVector};
use ndarray::{Array4, ArrayView4, Zip};
use rayon::prelude::*;

/// Rank-4 tensor (ERIs, cumulants, two-body operators)
pub type Tensor4 = Array4<f64>;

/// Contract one axis of `t` with the rows of `c`: the axis of length
/// `c.nrows()` is replaced by one of length `c.ncols()`.
pub fn contract_axis(t: &Tensor4, c: &DMatrix<f64>, axis: usize) -> Tensor4 {
    let old = t.shape()[axis];
    debug_assert_eq!(old, c.nrows());
    let mut shape = [t.shape()[0], t.shape()[1], t.shape()[2], t.shape()[3]];
    shape[axis] = c.ncols();

    Array4::from_shape_fn(shape, |(i, j, k, l)| {
        let mut idx = [i, j, k, l];
        let out = idx[axis];
        let mut acc = 0.0;
        for m in 0..old {
            idx[axis] = m;
            acc += c[(m, out)] * t[idx];
        }
        acc
    })
}

/// Four-index transformation
/// (ab|cd) = Σ_{μνλσ} C1_{μa} C2_{νb} C3_{λc} C4_{σd} (μν|λσ)
/// done as four quarter transformations.
pub fn transform_4index(
    v: &Tensor4,
    c1: &DMatrix<f64>,
    c2: &DMatrix<f64>,
    c3: &DMatrix<f64>,
    c4: &DMatrix<f64>,
) -> Tensor4 {
    let t = contract_axis(v, c1, 0);
    let t = contract_axis(&t, c2, 1);
    let t = contract_axis(&t, c3, 2);
    contract_axis(&t, c4, 3)
}

/// Full contraction over all four axes. Shapes must agree.
pub fn dot4(a: ArrayView4<f64>, b: ArrayView4<f64>) -> f64 {
    Zip::from(&a).and(&b).fold(0.0, |acc, &x, &y| acc + x * y)
}

/// Coulomb and exchange matrices of a density in the basis of `eri`:
/// `J[μν] = Σ (μν|λσ) D[λσ]`, `K[μν] = Σ (μλ|σν) D[λσ]`.
pub fn jk_from_eri(eri: &Tensor4, dm: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = dm.nrows();
    let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|mu| {
            let mut j_row = vec![0.0; n];
            let mut k_row = vec![0.0; n];
            for nu in 0..n {
                for lam in 0..n {
                    for sig in 0..n {
                        let d = dm[(lam, sig)];
                        j_row[nu] += eri[[mu, nu, lam, sig]] * d;
                        k_row[nu] += eri[[mu, lam, sig, nu]] * d;
                    }
                }
            }
            (j_row, k_row)
        })
        .collect();

    let j = DMatrix::from_fn(n, n, |mu, nu| rows[mu].0[nu]);
    let k = DMatrix::from_fn(n, n, |mu, nu| rows[mu].1[nu]);
    (j, k)
}

/// Cosine-weighted checksum of the entries in row-major order.
/// Cheap way to compare large operators in logs.
pub trait Fingerprint {
    fn fingerprint(&self) -> f64;
}

impl Fingerprint for DMatrix<f64> {
    fn fingerprint(&self) -> f64 {
        let ncols = self.ncols();
        (0..self.nrows())
            .flat_map(|i| (0..ncols).map(move |j| (i, j)))
            .enumerate()
            .map(|(k, (i, j))| self[(i, j)] * (k as f64).cos())
            .sum()
    }
}

impl Fingerprint for DVector<f64> {
    fn fingerprint(&self) -> f64 {
        self.iter()
            .enumerate()
            .map(|(k, x)| x * (k as f64).cos())
            .sum()
    }
}

impl Fingerprint for Tensor4 {
    fn fingerprint(&self) -> f64 {
        self.iter()
            .enumerate()
            .map(|(k, x)| x * (k as f64).cos())
            .sum()
    }
}
