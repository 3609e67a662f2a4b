use float_eq::assert_float_eq;
use nalgebra::{DMatrix, DVector};
use pwampc::prelude::*;

//

fn two_modes() -> Vec<AffineSystem>
{
    vec![
        AffineSystem::new(
            DMatrix::from_row_slice(2, 2, &[1., 0.1, 0., 1.]),
            DMatrix::from_row_slice(2, 1, &[0.005, 0.1]),
            DVector::from_vec(vec![0., -0.2]),
        ).unwrap(),
        AffineSystem::new(
            DMatrix::from_row_slice(2, 2, &[0.9, 0.2, -0.3, 1.1]),
            DMatrix::from_row_slice(2, 1, &[0.5, -1.]),
            DVector::from_vec(vec![0.3, 0.1]),
        ).unwrap(),
    ]
}

fn scalar_pwa() -> PwaSystem
{
    // x+ = x + u + 0.5 on [-3, 0], x+ = 0.5 x + u - 1 on [0, 3], |u| <= 1
    let systems = vec![
        AffineSystem::new(DMatrix::from_element(1, 1, 1.), DMatrix::from_element(1, 1, 1.), DVector::from_vec(vec![0.5])).unwrap(),
        AffineSystem::new(DMatrix::from_element(1, 1, 0.5), DMatrix::from_element(1, 1, 1.), DVector::from_vec(vec![-1.])).unwrap(),
    ];
    let xs = [
        Polytope::from_bounds(&DVector::from_vec(vec![-3.]), &DVector::from_vec(vec![0.])).unwrap(),
        Polytope::from_bounds(&DVector::from_vec(vec![0.]), &DVector::from_vec(vec![3.])).unwrap(),
    ];
    let u = Polytope::from_bounds(&DVector::from_vec(vec![-1.]), &DVector::from_vec(vec![1.])).unwrap();
    PwaSystem::from_orthogonal_domains(systems, &xs, &[u.clone(), u]).unwrap()
}

#[test]
fn test_condense_every_prefix()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let systems = two_modes();
    let modes = [0, 1, 1, 0, 1];
    let x0 = DVector::from_vec(vec![0.7, -1.2]);
    let us: Vec<DVector<f64>> = [0.3, -0.5, 1.1, 0., -0.8].iter().map(|u| DVector::from_vec(vec![*u])).collect();

    // step-by-step reference
    let mut xs = vec![x0.clone()];
    for (k, &m) in modes.iter().enumerate() {
        let x_next = systems[m].step(&xs[k], &us[k]);
        xs.push(x_next);
    }

    for n in 0..= modes.len() {
        let seq = ModeSequence::new(modes[0.. n].to_vec());
        let cs = condense(&systems, &seq).unwrap();
        assert_eq!(cs.horizon(), n);
        assert_eq!(cs.b_bar.shape(), (2 * (n + 1), n));

        let traj = cs.simulate(&x0, &us[0.. n]).unwrap();
        assert_eq!(traj.len(), n + 1);
        for (k, x) in traj.iter().enumerate() {
            assert_float_eq!(x.as_slice(), xs[k].as_slice(), abs_all <= 1e-12);
        }
    }
}

#[test]
fn test_condense_empty_horizon()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let cs = condense(&two_modes(), &ModeSequence::default()).unwrap();
    assert_eq!(cs.a_bar, DMatrix::identity(2, 2));
    assert_eq!(cs.b_bar.shape(), (2, 0));
    assert_eq!(cs.c_bar, DVector::zeros(2));
}

#[test]
fn test_condense_double_integrator()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = DMatrix::from_row_slice(2, 2, &[1., 1., 0., 1.]);
    let b = DMatrix::from_row_slice(2, 1, &[0., 1.]);
    let cs = AffineSystem::linear(a.clone(), b.clone()).unwrap().condense(2).unwrap();

    assert_eq!(cs.b_bar.shape(), (6, 2));
    assert!(cs.b_bar.rows(0, 2).iter().all(|e| *e == 0.));
    assert_eq!(cs.b_bar.view((2, 0), (2, 1)), b);
    assert_eq!(cs.b_bar.view((2, 1), (2, 1)), DMatrix::zeros(2, 1));
    assert_eq!(cs.b_bar.view((4, 0), (2, 1)), &a * &b);
    assert_eq!(cs.b_bar.view((4, 1), (2, 1)), b);
    assert_eq!(cs.a_bar.rows(4, 2), &a * &a);
    assert_eq!(cs.c_bar, DVector::zeros(6));
}

#[test]
fn test_condense_rejects()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut systems = two_modes();
    assert_eq!(
        condense(&systems, &ModeSequence::new(vec![0, 2])).err(),
        Some(PwaError::UnknownMode {mode: 2, n_modes: 2})
    );

    systems.push(AffineSystem::linear(DMatrix::identity(2, 2), DMatrix::zeros(2, 2)).unwrap());
    assert_eq!(
        condense(&systems, &ModeSequence::new(vec![0])).err(),
        Some(PwaError::DimensionMismatch {what: "B", expected: (2, 1), found: (2, 2)})
    );
}

#[test]
fn test_affine_system_rejects()
{
    let rslt = AffineSystem::new(DMatrix::identity(2, 2), DMatrix::zeros(3, 1), DVector::zeros(2));
    assert_eq!(
        rslt.err(),
        Some(PwaError::DimensionMismatch {what: "B", expected: (2, 1), found: (3, 1)})
    );
}

#[test]
fn test_pwa_simulate()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pwa = scalar_pwa();
    let x0 = DVector::from_vec(vec![1.]);
    let us = vec![DVector::from_vec(vec![0.]), DVector::from_vec(vec![0.5])];

    // 1 -> 0.5 - 1 = -0.5 -> -0.5 + 0.5 + 0.5 = 0.5
    let (xs, seq) = pwa.simulate(&x0, &us).unwrap();
    assert_eq!(seq.as_slice(), &[1, 0]);
    assert_float_eq!(xs[1][0], -0.5, abs <= 1e-12);
    assert_float_eq!(xs[2][0], 0.5, abs <= 1e-12);

    let traj = pwa.condense(&seq).unwrap().simulate(&x0, &us).unwrap();
    assert_float_eq!(traj[2][0], xs[2][0], abs <= 1e-12);
}

#[test]
fn test_pwa_infeasible_transition()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pwa = scalar_pwa();
    let zero = DVector::from_vec(vec![0.]);

    // boundary shared by both domains
    assert_eq!(
        pwa.find_domain(&zero, &zero).err(),
        Some(PwaError::InfeasibleTransition {step: 0, candidates: vec![0, 1]})
    );

    // input out of every domain at the second step
    let us = vec![DVector::from_vec(vec![0.]), DVector::from_vec(vec![2.])];
    assert_eq!(
        pwa.simulate(&DVector::from_vec(vec![1.]), &us).err(),
        Some(PwaError::InfeasibleTransition {step: 1, candidates: vec![]})
    );
}

#[test]
fn test_pwa_rejects()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let systems = two_modes();
    let d = Polytope::universe(3);
    assert!(PwaSystem::new(systems.clone(), vec![d.clone(), d.clone()]).is_ok());
    assert_eq!(
        PwaSystem::new(systems.clone(), vec![d.clone()]).err(),
        Some(PwaError::DimensionMismatch {what: "domains", expected: (2, 1), found: (1, 1)})
    );
    assert!(PwaSystem::new(systems, vec![d, Polytope::universe(2)]).is_err());
}

#[test]
fn test_state_bounds()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let (lb, ub) = scalar_pwa().state_bounds(&IpmOracle::new()).unwrap();
    assert_float_eq!(lb[0], -3., abs <= 1e-6);
    assert_float_eq!(ub[0], 3., abs <= 1e-6);
}

#[test]
fn test_from_continuous()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let h = 0.1;
    let a = DMatrix::from_row_slice(2, 2, &[0., 1., 0., 0.]);
    let b = DMatrix::from_row_slice(2, 1, &[0., 1.]);
    let c = DVector::from_vec(vec![0., -9.81]);

    let euler = AffineSystem::from_continuous(&a, &b, &c, h, Discretization::ExplicitEuler).unwrap();
    assert_float_eq!(euler.a().as_slice(), [1., 0., h, 1.].as_ref(), abs_all <= 1e-15);
    assert_float_eq!(euler.b().as_slice(), [0., h].as_ref(), abs_all <= 1e-15);
    assert_float_eq!(euler.c().as_slice(), [0., -9.81 * h].as_ref(), abs_all <= 1e-15);

    // exact for the double integrator
    let zoh = AffineSystem::from_continuous(&a, &b, &c, h, Discretization::ZeroOrderHold).unwrap();
    assert_float_eq!(zoh.a().as_slice(), [1., 0., h, 1.].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(zoh.b().as_slice(), [h * h / 2., h].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(zoh.c().as_slice(), [-9.81 * h * h / 2., -9.81 * h].as_ref(), abs_all <= 1e-12);
}

#[test]
fn test_dare()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let one = DMatrix::from_element(1, 1, 1.);
    let (p, k) = Dare::new().solve(&one, &one, &one, &one).unwrap();

    // P^2 - P - 1 = 0
    let golden = (1. + 5f64.sqrt()) / 2.;
    assert_float_eq!(p[(0, 0)], golden, abs <= 1e-8);
    assert_float_eq!(k[(0, 0)], -golden / (golden + 1.), abs <= 1e-8);

    let rslt = Dare::new().par(|p| p.max_iter = 2).solve(&one, &one, &one, &one);
    assert_eq!(rslt.err(), Some(PwaError::NotConverged(2)));
}
