//! On-top kernel seam and the model translated functional
//!
//! A kernel maps the one-body density `rho` and the on-top pair density `pi`
//! at each quadrature point to the energy density and its first and second
//! derivatives. The model functional used here is
//!
//! ```text
//! e(rho, pi) = cx rho^2 + cs (sqrt(1 + rho^2) - 1) + cc rho pi + cp pi^2
//! ```
//!
//! with parameter sets selected by a functional name such as `ftLDA,VWN3`.

extern crate nalgebra as na;

use crate::error::{FeffError, Result};
use na::{DMatrix, DVector};

/// AO values on a quadrature grid
#[derive(Debug, Clone)]
pub struct QuadratureGrid {
    /// `chi[(g, mu)]`, shape `(ngrid, nao)`
    pub ao: DMatrix<f64>,
    pub weights: DVector<f64>,
}

impl QuadratureGrid {
    pub fn new(ao: DMatrix<f64>, weights: DVector<f64>) -> Result<Self> {
        FeffError::dims("grid weights vs AO value rows", ao.nrows(), weights.len())?;
        Ok(QuadratureGrid { ao, weights })
    }

    pub fn npoints(&self) -> usize {
        self.ao.nrows()
    }

    pub fn nao(&self) -> usize {
        self.ao.ncols()
    }
}

/// Kernel derivatives on the grid, one entry per point
#[derive(Debug, Clone)]
pub struct KernelDerivatives {
    pub e_rho: DVector<f64>,
    pub e_pi: DVector<f64>,
    pub e_rho_rho: DVector<f64>,
    pub e_rho_pi: DVector<f64>,
    pub e_pi_pi: DVector<f64>,
}

pub trait OnTopKernel {
    fn name(&self) -> &str;
    fn grid(&self) -> &QuadratureGrid;
    /// Energy density on the grid
    fn energy_density(&self, rho: &DVector<f64>, pi: &DVector<f64>) -> DVector<f64>;
    fn derivatives(&self, rho: &DVector<f64>, pi: &DVector<f64>) -> KernelDerivatives;

    /// Integrated on-top energy `sum_g w e(rho, pi)`
    fn energy(&self, rho: &DVector<f64>, pi: &DVector<f64>) -> f64 {
        self.grid().weights.dot(&self.energy_density(rho, pi))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionalParameters {
    pub cx: f64,
    pub cs: f64,
    pub cc: f64,
    pub cp: f64,
}

impl FunctionalParameters {
    /// Parse names of the form `t<base>` or `ft<base>`
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let (cc, cp, base) = if let Some(base) = lower.strip_prefix("ft") {
            (0.16, 0.08, base)
        } else if let Some(base) = lower.strip_prefix('t') {
            (0.10, 0.05, base)
        } else {
            return Err(FeffError::UnknownFunctional(name.to_string()));
        };

        let (cx, cs) = match base {
            "lda,vwn3" | "lda" => (-0.24, -0.36),
            "pbe" => (-0.27, -0.42),
            "blyp" => (-0.26, -0.40),
            _ => return Err(FeffError::UnknownFunctional(name.to_string())),
        };
        Ok(FunctionalParameters { cx, cs, cc, cp })
    }
}

/// Model translated on-top functional on a fixed grid
#[derive(Debug, Clone)]
pub struct ModelFunctional {
    name: String,
    params: FunctionalParameters,
    grid: QuadratureGrid,
}

impl ModelFunctional {
    pub fn new(name: &str, params: FunctionalParameters, grid: QuadratureGrid) -> Self {
        ModelFunctional {
            name: name.to_string(),
            params,
            grid,
        }
    }

    pub fn from_name(name: &str, grid: QuadratureGrid) -> Result<Self> {
        let params = FunctionalParameters::from_name(name)?;
        Ok(Self::new(name, params, grid))
    }

    pub fn params(&self) -> FunctionalParameters {
        self.params
    }
}

impl OnTopKernel for ModelFunctional {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> &QuadratureGrid {
        &self.grid
    }

    fn energy_density(&self, rho: &DVector<f64>, pi: &DVector<f64>) -> DVector<f64> {
        let FunctionalParameters { cx, cs, cc, cp } = self.params;
        rho.zip_map(pi, |r, p| {
            cx * r * r + cs * ((1.0 + r * r).sqrt() - 1.0) + cc * r * p + cp * p * p
        })
    }

    fn derivatives(&self, rho: &DVector<f64>, pi: &DVector<f64>) -> KernelDerivatives {
        let FunctionalParameters { cx, cs, cc, cp } = self.params;
        let e_rho = rho.zip_map(pi, |r, p| 2.0 * cx * r + cs * r / (1.0 + r * r).sqrt() + cc * p);
        let e_pi = rho.zip_map(pi, |r, p| cc * r + 2.0 * cp * p);
        let e_rho_rho = rho.map(|r| 2.0 * cx + cs / (1.0 + r * r).powf(1.5));
        let n = rho.len();
        KernelDerivatives {
            e_rho,
            e_pi,
            e_rho_rho,
            e_rho_pi: DVector::from_element(n, cc),
            e_pi_pi: DVector::from_element(n, 2.0 * cp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn small_grid() -> QuadratureGrid {
        QuadratureGrid::new(
            DMatrix::from_row_slice(3, 1, &[1.0, 0.5, -0.3]),
            DVector::from_vec(vec![0.1, 0.2, 0.1]),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_names() {
        let ft = FunctionalParameters::from_name("ftLDA,VWN3").unwrap();
        assert_eq!(ft.cc, 0.16);
        assert_eq!(ft.cx, -0.24);
        let t = FunctionalParameters::from_name("tPBE").unwrap();
        assert_eq!((t.cx, t.cp), (-0.27, 0.05));
        assert!(FunctionalParameters::from_name("ftblyp").is_ok());
        assert!(matches!(
            FunctionalParameters::from_name("B3LYP"),
            Err(FeffError::UnknownFunctional(_))
        ));
        assert!(FunctionalParameters::from_name("tM06").is_err());
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let kernel = ModelFunctional::from_name("ftLDA,VWN3", small_grid()).unwrap();
        let rho = DVector::from_vec(vec![0.7, 1.3, 0.2]);
        let pi = DVector::from_vec(vec![0.4, 1.1, 0.05]);
        let d = kernel.derivatives(&rho, &pi);
        let h = 1e-6;

        let e_rp = kernel.energy_density(&rho.add_scalar(h), &pi);
        let e_rm = kernel.energy_density(&rho.add_scalar(-h), &pi);
        let e_pp = kernel.energy_density(&rho, &pi.add_scalar(h));
        let e_pm = kernel.energy_density(&rho, &pi.add_scalar(-h));
        for g in 0..3 {
            assert_abs_diff_eq!(d.e_rho[g], (e_rp[g] - e_rm[g]) / (2.0 * h), epsilon = 1e-8);
            assert_abs_diff_eq!(d.e_pi[g], (e_pp[g] - e_pm[g]) / (2.0 * h), epsilon = 1e-8);
        }

        let d_rp = kernel.derivatives(&rho.add_scalar(h), &pi);
        let d_rm = kernel.derivatives(&rho.add_scalar(-h), &pi);
        for g in 0..3 {
            let fd = (d_rp.e_rho[g] - d_rm.e_rho[g]) / (2.0 * h);
            assert_abs_diff_eq!(d.e_rho_rho[g], fd, epsilon = 1e-7);
            let fd = (d_rp.e_pi[g] - d_rm.e_pi[g]) / (2.0 * h);
            assert_abs_diff_eq!(d.e_rho_pi[g], fd, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_energy_integrates_with_weights() {
        let kernel = ModelFunctional::from_name("tLDA,VWN3", small_grid()).unwrap();
        let rho = DVector::from_vec(vec![1.0, 0.0, 0.0]);
        let pi = DVector::zeros(3);
        let expected = 0.1 * (-0.24 - 0.36 * (2f64.sqrt() - 1.0));
        assert_abs_diff_eq!(kernel.energy(&rho, &pi), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_grid_weight_count_checked() {
        let result = QuadratureGrid::new(DMatrix::zeros(4, 2), DVector::zeros(3));
        assert!(result.is_err());
    }
}
