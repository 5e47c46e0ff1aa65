//! Tests for the model CASCI solver and its host-solver seam

#[cfg(test)]
mod tests {
    use super::super::{complement_basis, make_strings, CasModel, CasState, HostSolver, SolverConfig};
    use crate::contraction::contract_veff;
    use crate::error::FeffError;
    use crate::gradient::{extract, HcoreOverride};
    use crate::hamiltonian_impl::{EffectiveTwoBody, ViewOptions};
    use crate::space::ActiveSpace;
    use crate::system_impl::{ModelScf, ModelSystem, ScfSettings};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{DMatrix, DVector};
    use periodic_table_on_an_enum::Element;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    fn lih() -> Arc<ModelSystem> {
        Arc::new(
            ModelSystem::from_atoms("LiH", &[Element::Lithium, Element::Hydrogen], "sto-3g", 7, 32)
                .unwrap(),
        )
    }

    fn lih_state(ncas: usize, nelecas: usize) -> (CasModel, CasState, f64) {
        let system = lih();
        let scf = ModelScf::new(ScfSettings::default()).run(&system).unwrap();
        let solver = CasModel::new(SolverConfig::new(system, ncas, nelecas)).unwrap();
        let casci = solver.casci(&scf.mo_coeff).unwrap();
        (solver, casci.state, casci.energy)
    }

    fn random_vector(n: usize, seed: u64) -> DVector<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        DVector::from_fn(n, |_, _| rng.gen::<f64>() - 0.5)
    }

    #[test]
    fn test_string_counts() {
        assert_eq!(make_strings(4, 2).len(), 6);
        assert_eq!(make_strings(3, 0), vec![0]);
        assert_eq!(make_strings(3, 3).len(), 1);
    }

    #[test]
    fn test_rdm_traces() {
        for &(ncas, nelecas) in &[(2usize, 2usize), (3, 4)] {
            let (solver, state, _) = lih_state(ncas, nelecas);
            let dm1s = solver.make_casdm1s(&state.ci).unwrap();
            let (na, nb) = solver.nelecas();
            assert_abs_diff_eq!(dm1s.alpha.trace(), na as f64, epsilon = 1e-10);
            assert_abs_diff_eq!(dm1s.beta.trace(), nb as f64, epsilon = 1e-10);

            let (casdm1, casdm2) = solver.make_casdm12(&state.ci).unwrap();
            assert_abs_diff_eq!(casdm1.trace(), nelecas as f64, epsilon = 1e-10);
            let mut pairs = 0.0;
            for p in 0..ncas {
                for r in 0..ncas {
                    pairs += casdm2[[p, p, r, r]];
                }
            }
            assert_abs_diff_eq!(pairs, (nelecas * (nelecas - 1)) as f64, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_dm2_symmetry() {
        let (solver, state, _) = lih_state(3, 4);
        let (_, dm2) = solver.make_casdm12(&state.ci).unwrap();
        let n = 3;
        for p in 0..n {
            for q in 0..n {
                for r in 0..n {
                    for s in 0..n {
                        let x = dm2[[p, q, r, s]];
                        assert_abs_diff_eq!(x, dm2[[r, s, p, q]], epsilon = 1e-12);
                        assert_abs_diff_eq!(x, dm2[[q, p, s, r]], epsilon = 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_casci_energy_matches_contraction_with_real_integrals() {
        for &(ncas, nelecas) in &[(2usize, 2usize), (3, 4)] {
            let (solver, state, energy) = lih_state(ncas, nelecas);
            assert_relative_eq!(solver.energy(&state).unwrap(), energy, max_relative = 1e-12);

            let system = solver.system();
            let space = solver.space();
            let views =
                EffectiveTwoBody::from_ao(&system.eri, &state.mo_coeff, space, ViewOptions::full())
                    .unwrap();
            let contracted = contract_veff(&solver, &state, &system.hcore, &views, None).unwrap();
            // each core orbital carries weight one in the contraction
            let h_mo = state.mo_coeff.transpose() * &system.hcore * &state.mo_coeff;
            let core_one_body: f64 = space.core().map(|i| h_mo[(i, i)]).sum();
            assert_relative_eq!(contracted + core_one_body, energy, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_casci_root_is_stationary_in_ci_space() {
        let (mut solver, state, _) = lih_state(2, 2);
        let hcore = solver.system().hcore.clone();
        let views = EffectiveTwoBody::from_ao(
            &solver.system().eri,
            &state.mo_coeff,
            solver.space(),
            ViewOptions::full(),
        )
        .unwrap();
        let gh = extract(&mut solver, &hcore, &views, &state).unwrap();
        let ci_block = gh.gradient.rows(gh.ngorb(), gh.nci());
        assert!(ci_block.norm() < 1e-8);
        // lowest root: every CI curvature is non-negative
        assert!(gh.hessian_diag.rows(gh.ngorb(), gh.nci()).iter().all(|&h| h > -1e-10));
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let (solver, state, _) = lih_state(2, 2);
        let rotated = solver.rotate(&state, &DVector::zeros(solver.nparams())).unwrap();
        assert_abs_diff_eq!(rotated.mo_coeff, state.mo_coeff, epsilon = 1e-14);
        assert_eq!(rotated.ci, state.ci);
    }

    #[test]
    fn test_rotation_preserves_orthonormality() {
        let (solver, state, _) = lih_state(3, 4);
        let x = random_vector(solver.nparams(), 11) * 0.8;
        let rotated = solver.rotate(&state, &x).unwrap();
        let overlap = rotated.mo_coeff.transpose() * &rotated.mo_coeff;
        assert_abs_diff_eq!(overlap, DMatrix::identity(6, 6), epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.ci.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_parameter_is_plane_rotation() {
        let (solver, state, _) = lih_state(2, 2);
        let (p, q) = solver.space().rotation_pairs(solver.nmo())[0];
        let mut x = DVector::zeros(solver.nparams());
        x[0] = 0.7;
        let rotated = solver.rotate(&state, &x).unwrap();

        let (c, s) = (0.7f64.cos(), 0.7f64.sin());
        let (old_p, old_q) = (state.mo_coeff.column(p), state.mo_coeff.column(q));
        assert_abs_diff_eq!(rotated.mo_coeff.column(q).into_owned(), old_q * c + old_p * s, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.mo_coeff.column(p).into_owned(), old_p * c - old_q * s, epsilon = 1e-12);
        for r in (0..solver.nmo()).filter(|&r| r != p && r != q) {
            assert_abs_diff_eq!(
                rotated.mo_coeff.column(r).into_owned(),
                state.mo_coeff.column(r).into_owned(),
                epsilon = 1e-12
            );
        }
        assert_eq!(rotated.ci, state.ci);
    }

    #[test]
    fn test_rotation_vector_length_checked() {
        let (solver, state, _) = lih_state(2, 2);
        let err = solver
            .rotate(&state, &DVector::zeros(solver.nparams() + 1))
            .unwrap_err();
        assert!(matches!(err, FeffError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_gradient_matches_central_differences() {
        for &(ncas, nelecas) in &[(2usize, 2usize), (3, 4)] {
            let (mut solver, state, _) = lih_state(ncas, nelecas);
            let space = solver.space();
            let system = solver.system().clone();
            // scaled one-body operator so the CI block is not stationary
            let one_body = &system.hcore * 1.3;
            let views =
                EffectiveTwoBody::from_ao(&system.eri, &state.mo_coeff, space, ViewOptions::full())
                    .unwrap();
            let gh = extract(&mut solver, &one_body, &views, &state).unwrap();
            assert_eq!(gh.len(), solver.nparams());

            let value = |x: &DVector<f64>| {
                let moved = solver.rotate(&state, x).unwrap();
                let moved_views = EffectiveTwoBody::from_ao(
                    &system.eri,
                    &moved.mo_coeff,
                    space,
                    ViewOptions::paaa_only(),
                )
                .unwrap();
                contract_veff(&solver, &moved, &one_body, &moved_views, None).unwrap()
            };

            let d = random_vector(gh.len(), 5);
            let h = 1e-4;
            let numeric = (value(&(&d * h)) - value(&(&d * -h))) / (2.0 * h);
            let analytic = gh.gradient.dot(&d);
            assert_abs_diff_eq!(numeric, analytic, epsilon = 1e-6 * analytic.abs().max(1.0));
        }
    }

    #[test]
    fn test_ci_hessian_diagonal_matches_second_differences() {
        let (mut solver, state, _) = lih_state(3, 4);
        let space = solver.space();
        let system = solver.system().clone();
        let one_body = &system.hcore * 1.3;
        let views =
            EffectiveTwoBody::from_ao(&system.eri, &state.mo_coeff, space, ViewOptions::full())
                .unwrap();
        let gh = extract(&mut solver, &one_body, &views, &state).unwrap();

        let value = |x: &DVector<f64>| {
            let moved = solver.rotate(&state, x).unwrap();
            contract_veff(&solver, &moved, &one_body, &views, None).unwrap()
        };
        let e0 = value(&DVector::zeros(gh.len()));
        let h = 1e-3;
        for k in 0..gh.nci() {
            let mut x = DVector::zeros(gh.len());
            x[gh.ngorb() + k] = h;
            let numeric = (value(&x) + value(&-&x) - 2.0 * e0) / (h * h);
            assert_abs_diff_eq!(numeric, gh.hessian_diag[gh.ngorb() + k], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_invalid_active_spaces() {
        let system = lih();
        let odd = CasModel::new(SolverConfig::new(system.clone(), 2, 3));
        assert!(matches!(odd, Err(FeffError::InvalidActiveSpace(_))));

        let too_many = CasModel::new(SolverConfig::new(system.clone(), 2, 6));
        assert!(matches!(too_many, Err(FeffError::InvalidActiveSpace(_))));

        let oversized = CasModel::new(SolverConfig::new(system.clone(), 7, 4));
        assert!(matches!(oversized, Err(FeffError::DimensionMismatch { .. })));

        let bad_spin = CasModel::new(SolverConfig::new(system.clone(), 2, 2).with_spin(4));
        assert!(matches!(bad_spin, Err(FeffError::InvalidActiveSpace(_))));

        let triplet = CasModel::new(SolverConfig::new(system, 2, 2).with_spin(2)).unwrap();
        assert_eq!(triplet.nelecas(), (2, 0));
        assert_eq!(triplet.ci_dim(), 1);
    }

    #[test]
    fn test_complement_basis_is_orthonormal() {
        let c = random_vector(6, 3).normalize();
        let q = complement_basis(&c);
        assert_eq!(q.shape(), (6, 5));
        assert_abs_diff_eq!(q.transpose() * &q, DMatrix::identity(5, 5), epsilon = 1e-13);
        assert!((q.transpose() * &c).norm() < 1e-13);

        let single = complement_basis(&DVector::from_element(1, 1.0));
        assert_eq!(single.shape(), (1, 0));
    }

    #[test]
    fn test_provider_restored_after_failed_gradient() {
        let (mut solver, state, _) = lih_state(2, 2);
        let original = solver.hcore();
        // views built for a different active space
        let wrong = EffectiveTwoBody::from_ao(
            &solver.system().eri,
            &state.mo_coeff,
            ActiveSpace::new(0, 3),
            ViewOptions::full(),
        )
        .unwrap();
        let err = extract(&mut solver, &DMatrix::zeros(6, 6), &wrong, &state).unwrap_err();
        assert!(matches!(err, FeffError::DimensionMismatch { .. }));
        assert_eq!(solver.hcore(), original);
    }

    #[test]
    fn test_provider_restored_after_panic() {
        let (mut solver, _, _) = lih_state(2, 2);
        let original = solver.hcore();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let guard = HcoreOverride::with_matrix(&mut solver, DMatrix::identity(6, 6));
            assert_eq!(guard.hcore(), DMatrix::identity(6, 6));
            panic!("failure while the override is active");
        }));
        assert!(result.is_err());
        assert_eq!(solver.hcore(), original);
    }
}
