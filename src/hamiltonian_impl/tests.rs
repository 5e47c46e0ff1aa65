//! Tests for effective operator construction and the MO views

#[cfg(test)]
mod tests {
    use super::super::{build, EffectiveHamiltonianBuilder, EffectiveTwoBody, ViewOptions};
    use crate::casci_impl::{CasModel, CasState, HostSolver, SolverConfig};
    use crate::density::{DensityMatrixSet, SpinDensity};
    use crate::error::FeffError;
    use crate::kernel::{ModelFunctional, OnTopKernel};
    use crate::system_impl::{ModelScf, ModelSystem, ScfSettings};
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;
    use ndarray::{s, Array4, ArrayView4};
    use periodic_table_on_an_enum::Element;
    use std::sync::Arc;

    struct Setup {
        solver: CasModel,
        state: CasState,
        kernel: ModelFunctional,
    }

    impl Setup {
        fn mo_cas(&self) -> DMatrix<f64> {
            let space = self.solver.space();
            self.state.mo_coeff.columns(space.ncore, space.ncas).into_owned()
        }

        fn densities(&self) -> DensityMatrixSet {
            DensityMatrixSet::from_solver(&self.solver, &self.state).unwrap()
        }
    }

    fn setup(ncas: usize, nelecas: usize) -> Setup {
        let system = Arc::new(
            ModelSystem::from_atoms("LiH", &[Element::Lithium, Element::Hydrogen], "sto-3g", 7, 32)
                .unwrap(),
        );
        let scf = ModelScf::new(ScfSettings::default()).run(&system).unwrap();
        let solver = CasModel::new(SolverConfig::new(system.clone(), ncas, nelecas)).unwrap();
        let state = solver.casci(&scf.mo_coeff).unwrap().state;
        let kernel = ModelFunctional::from_name("ftLDA,VWN3", system.grid.clone()).unwrap();
        Setup {
            solver,
            state,
            kernel,
        }
    }

    fn max_abs_diff(a: ArrayView4<f64>, b: ArrayView4<f64>) -> f64 {
        assert_eq!(a.shape(), b.shape());
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    fn assert_eightfold(v: &Array4<f64>) {
        let n = v.shape()[0];
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        let x = v[[p, q, r, s]];
                        assert_abs_diff_eq!(x, v[[q, p, r, s]], epsilon = 1e-12);
                        assert_abs_diff_eq!(x, v[[p, q, s, r]], epsilon = 1e-12);
                        assert_abs_diff_eq!(x, v[[r, s, p, q]], epsilon = 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_operators_are_symmetric() {
        let setup = setup(2, 2);
        let builder = EffectiveHamiltonianBuilder::new(&setup.kernel);
        let dm = setup.densities();
        let veff = builder.veff(&dm, &setup.mo_cas()).unwrap();
        let feff = builder.feff(&dm, None, &setup.mo_cas()).unwrap();
        assert_eq!(veff.two_body.shape(), &[6, 6, 6, 6]);
        assert_abs_diff_eq!(veff.one_body, veff.one_body.transpose(), epsilon = 1e-12);
        assert_abs_diff_eq!(feff.one_body, feff.one_body.transpose(), epsilon = 1e-12);
        assert_eightfold(&veff.two_body);
        assert_eightfold(&feff.two_body);
    }

    #[test]
    fn test_on_top_density_of_closed_shell_determinant() {
        let setup = setup(2, 2);
        let builder = EffectiveHamiltonianBuilder::new(&setup.kernel);
        let mo = &setup.state.mo_coeff;
        let occ = mo.columns(0, 2);
        let dm = &occ * occ.transpose() * 2.0;
        let set = DensityMatrixSet {
            dm1s: SpinDensity::from_spin_summed(&dm),
            cumulant: Array4::zeros((2, 2, 2, 2)),
        };
        let vars = builder.variables(&set, &setup.mo_cas()).unwrap();
        let chi = &setup.kernel.grid().ao;
        for g in 0..chi.nrows() {
            let rho_dm = (chi.row(g) * &dm).dot(&chi.row(g));
            assert_abs_diff_eq!(vars.pi[g], 0.5 * rho_dm * rho_dm, epsilon = 1e-12);
            assert!(vars.rho[g] >= 0.0);
        }
    }

    #[test]
    fn test_feff_defaults_to_self_contraction() {
        let setup = setup(3, 4);
        let builder = EffectiveHamiltonianBuilder::new(&setup.kernel);
        let dm = setup.densities();
        let a = builder.feff(&dm, None, &setup.mo_cas()).unwrap();
        let b = builder.feff(&dm, Some(&dm), &setup.mo_cas()).unwrap();
        assert_eq!(a.one_body, b.one_body);
        assert_eq!(a.two_body, b.two_body);
    }

    #[test]
    fn test_build_falls_back_per_piece() {
        let setup = setup(2, 2);
        let builder = EffectiveHamiltonianBuilder::new(&setup.kernel);
        let dm = setup.densities();
        let mo_cas = setup.mo_cas();

        let (f1, f2) = build(&setup.kernel, &dm.dm1s, &dm.cumulant, None, None, &mo_cas).unwrap();
        let reference = builder.feff(&dm, None, &mo_cas).unwrap();
        assert_eq!(f1, reference.one_body);
        assert_eq!(f2, reference.two_body);

        let other = SpinDensity::new(&dm.dm1s.alpha * 0.9, &dm.dm1s.beta * 1.1).unwrap();
        let (g1, g2) =
            build(&setup.kernel, &dm.dm1s, &dm.cumulant, Some(&other), None, &mo_cas).unwrap();
        let mixed = DensityMatrixSet {
            dm1s: other,
            cumulant: dm.cumulant.clone(),
        };
        let expected = builder.feff(&dm, Some(&mixed), &mo_cas).unwrap();
        assert_eq!(g1, expected.one_body);
        assert_eq!(g2, expected.two_body);
        assert_ne!(g1, f1);
    }

    #[test]
    fn test_builder_rejects_mismatched_shapes() {
        let setup = setup(2, 2);
        let builder = EffectiveHamiltonianBuilder::new(&setup.kernel);
        let dm = setup.densities();

        let short_rows = DMatrix::zeros(5, 2);
        assert!(matches!(
            builder.veff(&dm, &short_rows),
            Err(FeffError::DimensionMismatch { .. })
        ));

        let wide = setup.state.mo_coeff.columns(0, 3).into_owned();
        assert!(matches!(
            builder.veff(&dm, &wide),
            Err(FeffError::DimensionMismatch { .. })
        ));

        let small = DensityMatrixSet {
            dm1s: SpinDensity::from_spin_summed(&DMatrix::identity(4, 4)),
            cumulant: dm.cumulant.clone(),
        };
        assert!(matches!(
            builder.feff(&dm, Some(&small), &setup.mo_cas()),
            Err(FeffError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_paaa_only_views_agree_on_filled_block() {
        let setup = setup(2, 2);
        let space = setup.solver.space();
        let eri = &setup.solver.system().eri;
        let mo = &setup.state.mo_coeff;
        let full = EffectiveTwoBody::from_ao(eri, mo, space, ViewOptions::full()).unwrap();
        let partial = EffectiveTwoBody::from_ao(eri, mo, space, ViewOptions::paaa_only()).unwrap();

        let a = space.active();
        assert!(
            max_abs_diff(
                full.ppaa.slice(s![.., a.clone(), .., ..]),
                partial.ppaa.slice(s![.., a.clone(), .., ..])
            ) < 1e-12
        );
        assert!(
            max_abs_diff(
                full.papa.slice(s![.., .., a.clone(), ..]),
                partial.papa.slice(s![.., .., a, ..])
            ) < 1e-12
        );
        assert_abs_diff_eq!(full.vhf_c, partial.vhf_c, epsilon = 1e-12);
        assert_eq!(full.energy_core, partial.energy_core);

        assert!(full.is_complete());
        assert!(!partial.is_complete());
        assert!(matches!(partial.require_complete(), Err(FeffError::MissingView(_))));
    }

    #[test]
    fn test_core_energy_is_trace_of_core_potential() {
        let setup = setup(2, 2);
        let space = setup.solver.space();
        let eri = &setup.solver.system().eri;
        let views =
            EffectiveTwoBody::from_ao(eri, &setup.state.mo_coeff, space, ViewOptions::full()).unwrap();
        assert_eq!(space.ncore, 1);
        assert_abs_diff_eq!(views.energy_core, views.vhf_c[(0, 0)], epsilon = 1e-14);

        let no_core = setup_views_without_core(&setup);
        assert_eq!(no_core.energy_core, 0.0);
        assert_eq!(no_core.vhf_c, DMatrix::zeros(6, 6));
    }

    fn setup_views_without_core(setup: &Setup) -> EffectiveTwoBody {
        EffectiveTwoBody::from_ao(
            &setup.solver.system().eri,
            &setup.state.mo_coeff,
            crate::space::ActiveSpace::new(0, 3),
            ViewOptions::full(),
        )
        .unwrap()
    }

    #[test]
    fn test_flipped_active_block() {
        let setup = setup(2, 2);
        let space = setup.solver.space();
        let views = EffectiveTwoBody::from_ao(
            &setup.solver.system().eri,
            &setup.state.mo_coeff,
            space,
            ViewOptions::full(),
        )
        .unwrap();
        let flipped = views.with_flipped_active_block();
        assert_eq!(flipped.active_block(), -views.active_block());
        // blocks touching core or virtual orbitals are unchanged
        assert_eq!(flipped.ppaa[[0, 1, 0, 1]], views.ppaa[[0, 1, 0, 1]]);
        assert_eq!(flipped.ppaa[[4, 2, 1, 0]], views.ppaa[[4, 2, 1, 0]]);
        assert_eq!(flipped.papa[[5, 0, 1, 1]], views.papa[[5, 0, 1, 1]]);
        assert_eq!(flipped.papa[[1, 0, 2, 1]], -views.papa[[1, 0, 2, 1]]);
        assert_eq!(flipped.vhf_c, views.vhf_c);
    }

    #[test]
    fn test_optional_coulomb_exchange_views() {
        let setup = setup(2, 2);
        let space = setup.solver.space();
        let eri = &setup.solver.system().eri;
        let mo = &setup.state.mo_coeff;
        let plain = EffectiveTwoBody::from_ao(eri, mo, space, ViewOptions::full()).unwrap();
        assert!(plain.j_pc.is_none() && plain.k_pc.is_none());

        let options = ViewOptions {
            paaa_only: false,
            jk_pc: true,
        };
        let views = EffectiveTwoBody::from_ao(eri, mo, space, options).unwrap();
        let j_pc = views.j_pc.as_ref().unwrap();
        let k_pc = views.k_pc.as_ref().unwrap();
        assert_eq!(j_pc.shape(), (6, 1));
        assert_eq!(k_pc.shape(), (6, 1));
        for p in 0..6 {
            assert_abs_diff_eq!(
                views.vhf_c[(p, p)],
                2.0 * j_pc[(p, 0)] - k_pc[(p, 0)],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_views_reject_wrong_operator_size() {
        let setup = setup(2, 2);
        let eri = Array4::zeros((5, 5, 5, 5));
        let err = EffectiveTwoBody::from_ao(
            &eri,
            &setup.state.mo_coeff,
            setup.solver.space(),
            ViewOptions::full(),
        )
        .unwrap_err();
        assert!(matches!(err, FeffError::DimensionMismatch { .. }));
    }
}
