use float_eq::assert_float_eq;
use nalgebra::{DMatrix, DVector};
use pwampc::prelude::*;

//

fn scalar(x: f64) -> DVector<f64>
{
    DVector::from_vec(vec![x])
}

/// minimize u^2 / 2 + x u s.t. |u| <= 1, solved by u = clamp(-x).
fn saturated_pqp() -> ParametricQp
{
    ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::from_element(1, 1, 1.), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::from_row_slice(2, 1, &[1., -1.]), DMatrix::zeros(2, 1), DVector::from_vec(vec![1., 1.]),
    ).unwrap()
}

#[test]
fn test_solve()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = saturated_pqp();
    let oracle = IpmOracle::new();

    let sol = pqp.solve(&oracle, &scalar(0.5)).unwrap();
    assert!(sol.is_available());
    assert_float_eq!(sol.argmin[0], -0.5, abs <= 1e-6);
    assert_float_eq!(sol.cost, -0.125, abs <= 1e-6);

    let sol = pqp.solve(&oracle, &scalar(2.)).unwrap();
    assert_float_eq!(sol.argmin[0], -1., abs <= 1e-6);
    assert_float_eq!(sol.cost, -1.5, abs <= 1e-6);
    assert_eq!(pqp.active_set(&scalar(2.), &sol.argmin).unwrap(), vec![1]);

    let sol = pqp.solve(&oracle, &scalar(-3.)).unwrap();
    assert_float_eq!(sol.argmin[0], 1., abs <= 1e-6);
    assert_eq!(pqp.active_set(&scalar(-3.), &sol.argmin).unwrap(), vec![0]);
}

#[test]
fn test_solve_first_order()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let sol = saturated_pqp().solve(&FirstOrderOracle::new(), &scalar(2.)).unwrap();
    assert_float_eq!(sol.argmin[0], -1., abs <= 1e-3);
    assert_float_eq!(sol.cost, -1.5, abs <= 1e-3);
}

#[test]
fn test_shifted_problem()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = ParametricQp::new(
        DMatrix::from_row_slice(2, 2, &[2., 0., 0., 1.]),
        DMatrix::from_row_slice(1, 2, &[1., 2.]), DMatrix::from_element(1, 1, 3.),
        DVector::from_vec(vec![2., -1.]), scalar(0.5), 4.,
        DMatrix::identity(2, 2), DMatrix::from_row_slice(2, 1, &[1., 0.]), DVector::from_vec(vec![1., 2.]),
    ).unwrap();

    assert_eq!(pqp.hessian()[(0, 0)], 2.);
    assert_float_eq!(pqp.hessian_inv().as_slice(), [0.5, 0., 0., 1.].as_ref(), abs_all <= 1e-12);

    let (c_u, c_x, c) = pqp.constraints();
    assert_eq!(c_u, &DMatrix::identity(2, 2));
    assert_eq!(c_x.as_slice(), [1., 0.].as_ref());
    assert_eq!(c.as_slice(), [1., 2.].as_ref());

    // H^-1 F_xu' = (0.5, 2), H^-1 F_u = (1, -1)
    let (g, s, w) = pqp.shifted_constraints();
    assert_eq!(g, c_u);
    assert_float_eq!(s.as_slice(), [1.5, 2.].as_ref(), abs_all <= 1e-12);
    assert_float_eq!(w.as_slice(), [2., 1.].as_ref(), abs_all <= 1e-12);

    let (f_xx_q, f_x_q, f_q) = pqp.shifted_cost();
    assert_float_eq!(f_xx_q[(0, 0)], -1.5, abs <= 1e-12);
    assert_float_eq!(f_x_q[0], 1.5, abs <= 1e-12);
    assert_float_eq!(f_q, 2.5, abs <= 1e-12);
}

#[test]
fn test_sensitivity()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = saturated_pqp();

    // lower bound active: lambda = x - 1, u = -1
    let sens = pqp.z_sensitivity(&[1]).unwrap();
    assert_eq!(sens.rows, vec![1]);
    assert_float_eq!(sens.lambda.lin[(0, 0)], 1., abs <= 1e-12);
    assert_float_eq!(sens.lambda.off[0], -1., abs <= 1e-12);

    let law = pqp.u_sensitivity(&[1]).unwrap();
    assert_float_eq!(law.lin[(0, 0)], 0., abs <= 1e-12);
    assert_float_eq!(law.off[0], -1., abs <= 1e-12);

    // upper bound active: u = 1
    let law = pqp.u_sensitivity(&[0]).unwrap();
    assert_float_eq!(law.eval(&scalar(-5.))[0], 1., abs <= 1e-12);

    // unconstrained: z = 0, u = -x
    let sens = pqp.z_sensitivity(&[]).unwrap();
    assert!(sens.rows.is_empty());
    assert_eq!(sens.lambda.off.len(), 0);
    assert_float_eq!(sens.z.off[0], 0., abs <= 1e-12);
    let law = pqp.u_sensitivity(&[]).unwrap();
    assert_float_eq!(law.lin[(0, 0)], -1., abs <= 1e-12);
}

#[test]
fn test_laws_continuous_across_regions()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = saturated_pqp();
    let free = pqp.u_sensitivity(&[]).unwrap();
    let v_free = pqp.value_function(&[]).unwrap();

    for (x, active) in [(1., 1), (-1., 0)] {
        let sat = pqp.u_sensitivity(&[active]).unwrap();
        let v_sat = pqp.value_function(&[active]).unwrap();

        assert_float_eq!(free.eval(&scalar(x))[0], sat.eval(&scalar(x))[0], abs <= 1e-12);
        assert_float_eq!(v_free.eval(&scalar(x)), v_sat.eval(&scalar(x)), abs <= 1e-12);
        assert_float_eq!(v_free.gradient(&scalar(x))[0], v_sat.gradient(&scalar(x))[0], abs <= 1e-12);
    }
}

#[test]
fn test_value_function()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = saturated_pqp();
    let oracle = IpmOracle::new();

    // V(x) = 0.5 - x on the lower-saturated region
    let v = pqp.value_function(&[1]).unwrap();
    assert_float_eq!(v.eval(&scalar(2.)), -1.5, abs <= 1e-12);
    assert_float_eq!(v.eval(&scalar(3.)), pqp.solve(&oracle, &scalar(3.)).unwrap().cost, abs <= 1e-6);

    let planes = pqp.cost_sensitivity(&[scalar(2.), scalar(4.)], &[1]).unwrap();
    assert_eq!(planes.len(), 2);
    assert_float_eq!(planes[0].gradient[0], -1., abs <= 1e-12);
    assert_float_eq!(planes[0].offset, 0.5, abs <= 1e-12);
    assert_float_eq!(planes[1].eval(&scalar(4.)), v.eval(&scalar(4.)), abs <= 1e-12);

    // tangent of V(x) = -x^2 / 2 at 0.5
    let planes = pqp.cost_sensitivity(&[scalar(0.5)], &[]).unwrap();
    assert_float_eq!(planes[0].gradient[0], -0.5, abs <= 1e-12);
    assert_float_eq!(planes[0].eval(&scalar(0.5)), -0.125, abs <= 1e-12);

    assert!(pqp.cost_sensitivity(&[DVector::zeros(2)], &[1]).is_err());
}

#[test]
fn test_critical_region()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let pqp = saturated_pqp();

    let cr = pqp.critical_region(&[1]).unwrap();
    assert!(cr.contains(&scalar(2.), 1e-9));
    assert!(cr.contains(&scalar(1.), 1e-9));
    assert!(!cr.contains(&scalar(0.5), 1e-9));
    assert_float_eq!(cr.u.eval(&scalar(7.))[0], -1., abs <= 1e-12);

    let cr = pqp.critical_region(&[]).unwrap();
    for x in [-1., 0., 0.3, 1.] {
        assert!(cr.contains(&scalar(x), 1e-9));
    }
    assert!(!cr.contains(&scalar(1.2), 1e-9));
    assert!(!cr.contains(&scalar(-1.2), 1e-9));

    // inside the region the law agrees with the oracle
    let oracle = IpmOracle::new();
    let x = scalar(0.3);
    let sol = pqp.solve(&oracle, &x).unwrap();
    assert_float_eq!(cr.u.eval(&x)[0], sol.argmin[0], abs <= 1e-6);
    assert_float_eq!(cr.value.eval(&x), sol.cost, abs <= 1e-6);
}

#[test]
fn test_dependent_active_rows()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // row 2 repeats row 0 scaled by two
    let pqp = ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::from_element(1, 1, 1.), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::from_row_slice(3, 1, &[1., -1., 2.]), DMatrix::zeros(3, 1), DVector::from_vec(vec![1., 1., 2.]),
    ).unwrap();

    let sens = pqp.z_sensitivity(&[0, 2]).unwrap();
    assert_eq!(sens.rows, vec![0]);
    assert_eq!(pqp.u_sensitivity(&[0, 2]).unwrap(), pqp.u_sensitivity(&[0]).unwrap());

    assert_eq!(
        pqp.z_sensitivity(&[0, 3]).err(),
        Some(PwaError::ActiveSetOutOfRange {index: 3, n_rows: 3})
    );
}

#[test]
fn test_feasible_set()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // always feasible
    let pqp = saturated_pqp();
    let set = pqp.feasible_set(&oracle).unwrap().unwrap();
    assert_eq!(set.dim(), 1);
    assert_eq!(set.n_facets(), 0);

    // 1 <= u <= x, feasible for x >= 1
    let pqp = ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::zeros(1, 1), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::from_row_slice(2, 1, &[1., -1.]), DMatrix::from_row_slice(2, 1, &[1., 0.]), DVector::from_vec(vec![0., -1.]),
    ).unwrap();
    let set = pqp.feasible_set(&oracle).unwrap().unwrap().clone();
    assert_eq!(set.n_facets(), 1);
    assert!(set.contains(&scalar(1.), 1e-9));
    assert!(set.contains(&scalar(5.), 1e-9));
    assert!(!set.contains(&scalar(0.5), 1e-9));

    // second call returns the stored set
    assert_eq!(pqp.feasible_set(&oracle).unwrap(), Some(&set));

    assert!(pqp.is_feasible(&oracle, &scalar(2.)).unwrap());
    assert!(!pqp.is_feasible(&oracle, &scalar(0.5)).unwrap());
    assert!(!pqp.solve(&oracle, &scalar(0.5)).unwrap().is_available());
}

#[test]
fn test_infeasible()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // u <= 0, u >= 1
    let pqp = ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::from_element(1, 1, 1.), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::from_row_slice(2, 1, &[1., -1.]), DMatrix::zeros(2, 1), DVector::from_vec(vec![0., -1.]),
    ).unwrap();

    assert!(pqp.feasible_set(&oracle).unwrap().is_none());

    let sol = pqp.solve(&oracle, &scalar(0.)).unwrap();
    assert!(!sol.is_available());
    assert!(sol.argmin[0].is_nan());
    assert!(sol.cost.is_nan());
}

#[test]
fn test_solve_free_x()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // minimize u^2 / 2 - 2u + x^2 / 2 + 1 s.t. u <= 1
    let pqp = ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::zeros(1, 1), DMatrix::from_element(1, 1, 1.),
        DVector::from_vec(vec![-2.]), DVector::zeros(1), 1.,
        DMatrix::from_element(1, 1, 1.), DMatrix::zeros(1, 1), DVector::from_vec(vec![1.]),
    ).unwrap();

    let sol = pqp.solve_free_x(&IpmOracle::new()).unwrap();
    assert_float_eq!(sol.u[0], 1., abs <= 1e-6);
    assert_float_eq!(sol.x[0], 0., abs <= 1e-6);
    assert_float_eq!(sol.cost, -0.5, abs <= 1e-6);
}

#[test]
fn test_rejects()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // indefinite
    let rslt = ParametricQp::new(
        DMatrix::from_row_slice(2, 2, &[1., 2., 2., 1.]),
        DMatrix::zeros(1, 2), DMatrix::zeros(1, 1),
        DVector::zeros(2), DVector::zeros(1), 0.,
        DMatrix::zeros(0, 2), DMatrix::zeros(0, 1), DVector::zeros(0),
    );
    assert_eq!(rslt.err(), Some(PwaError::NotStrictlyConvex));

    // asymmetric
    let rslt = ParametricQp::new(
        DMatrix::from_row_slice(2, 2, &[1., 1., 0., 1.]),
        DMatrix::zeros(1, 2), DMatrix::zeros(1, 1),
        DVector::zeros(2), DVector::zeros(1), 0.,
        DMatrix::zeros(0, 2), DMatrix::zeros(0, 1), DVector::zeros(0),
    );
    assert_eq!(rslt.err(), Some(PwaError::NotStrictlyConvex));

    let rslt = ParametricQp::new(
        DMatrix::from_element(1, 1, 1.),
        DMatrix::zeros(2, 1), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::zeros(0, 1), DMatrix::zeros(0, 1), DVector::zeros(0),
    );
    assert_eq!(
        rslt.err(),
        Some(PwaError::DimensionMismatch {what: "F_xu", expected: (1, 1), found: (2, 1)})
    );

    let pqp = saturated_pqp();
    assert!(pqp.solve(&IpmOracle::new(), &DVector::zeros(2)).is_err());
    assert!(pqp.active_set(&scalar(0.), &DVector::zeros(3)).is_err());
}

#[test]
fn test_stages()
{
    let sol = ParametricSolution {
        argmin: DVector::from_vec(vec![1., 2., 3., 4., 5., 6.]),
        cost: 0.,
        active_set: None,
        degeneracy: None,
    };

    let stages = sol.stages(2).unwrap();
    assert_eq!(stages.len(), 3);
    assert_eq!(stages[2].as_slice(), &[5., 6.]);

    assert_eq!(sol.stages(4).err(), Some(PwaError::NonIntegerStageCount {len: 6, stage: 4}));
}

#[test]
fn test_l1_plp()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // minimize |u - x| s.t. |u| <= 1
    let plp = ParametricLp::from_l1(
        &DMatrix::from_element(1, 1, 1.), &DMatrix::from_element(1, 1, -1.), &DVector::zeros(1),
        &DMatrix::from_row_slice(2, 1, &[1., -1.]), &DMatrix::zeros(2, 1), &DVector::from_vec(vec![1., 1.]),
    ).unwrap();
    assert_eq!(plp.n_x(), 1);
    assert_eq!(plp.n_u(), 1);
    assert_eq!(plp.n_aux(), 1);

    let oracle = IpmOracle::new();

    let sol = plp.solve(&oracle, &scalar(0.5)).unwrap();
    assert_eq!(sol.argmin.len(), 1);
    assert_float_eq!(sol.argmin[0], 0.5, abs <= 1e-6);
    assert_float_eq!(sol.cost, 0., abs <= 1e-6);

    // u saturates, the slack rows of -u - s <= -x stay tight
    let sol = plp.solve(&oracle, &scalar(2.)).unwrap();
    assert_float_eq!(sol.argmin[0], 1., abs <= 1e-6);
    assert_float_eq!(sol.cost, 1., abs <= 1e-6);
    assert_eq!(sol.active_set, Some(vec![0, 3]));
    assert!(!sol.degeneracy.unwrap().primal);
}
