use float_eq::assert_float_eq;
use nalgebra::{DMatrix, DVector};
use pwampc::prelude::*;

//

fn unit_box(n: usize) -> Polytope
{
    Polytope::from_bounds(&DVector::from_element(n, -1.), &DVector::from_element(n, 1.)).unwrap()
}

#[test]
fn test_minimal()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // unit box plus a far cut, a scaled duplicate and a zero row
    let mut p = unit_box(2);
    p.add_facets(
        &DMatrix::from_row_slice(3, 2, &[
            1., 1.,
            2., 0.,
            0., 0.,
        ]),
        &DVector::from_vec(vec![5., 2., 1.]),
    ).unwrap();
    assert_eq!(p.n_facets(), 7);

    let m = p.minimal(&oracle).unwrap();
    assert_eq!(m.n_facets(), 4);
    for x in [[0.9, 0.9], [-0.9, 0.5], [0., -1.]] {
        assert!(m.contains(&DVector::from_vec(x.to_vec()), 1e-9));
    }
    assert!(!m.contains(&DVector::from_vec(vec![1.1, 0.]), 1e-9));
}

#[test]
fn test_minimal_drops_touching_facet()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // x + y <= 2 touches the unit box only at the corner
    let mut p = unit_box(2);
    p.add_facets(&DMatrix::from_row_slice(1, 2, &[1., 1.]), &DVector::from_vec(vec![2.])).unwrap();

    let m = p.minimal(&IpmOracle::new()).unwrap();
    assert_eq!(m.n_facets(), 4);
}

#[test]
fn test_is_empty()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // x <= 0, x >= 1
    let p = Polytope::new(DMatrix::from_row_slice(2, 1, &[1., -1.]), DVector::from_vec(vec![0., -1.])).unwrap();
    assert!(p.is_empty(&oracle).unwrap());
    assert_eq!(p.minimal(&oracle).err(), Some(PwaError::EmptySet));

    assert!(!unit_box(3).is_empty(&oracle).unwrap());
    assert!(!Polytope::universe(2).is_empty(&oracle).unwrap());
}

#[test]
fn test_project()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // {(x, u) | x <= 2, 0 <= u <= x} projected on x is [0, 2]
    let p = Polytope::new(
        DMatrix::from_row_slice(3, 2, &[
            1., 0.,
            0., -1.,
            -1., 1.,
        ]),
        DVector::from_vec(vec![2., 0., 0.]),
    ).unwrap();

    let q = p.project(&oracle, 1).unwrap();
    assert_eq!(q.dim(), 1);
    assert_eq!(q.n_facets(), 2);
    assert!(q.contains(&DVector::from_vec(vec![1.]), 1e-9));
    assert!(!q.contains(&DVector::from_vec(vec![-0.5]), 1e-9));
    assert!(!q.contains(&DVector::from_vec(vec![2.5]), 1e-9));

    let (lb, ub) = q.bounding_box(&oracle).unwrap();
    assert_float_eq!(lb[0], 0., abs <= 1e-6);
    assert_float_eq!(ub[0], 2., abs <= 1e-6);
}

#[test]
fn test_project_cube()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let oracle = IpmOracle::new();

    // rotated slab |x + y + z| <= 1 in the unit cube, projected on (x, y)
    let mut p = unit_box(3);
    p.add_facets(
        &DMatrix::from_row_slice(2, 3, &[
            1., 1., 1.,
            -1., -1., -1.,
        ]),
        &DVector::from_vec(vec![1., 1.]),
    ).unwrap();

    let q = p.project(&oracle, 2).unwrap();
    assert_eq!(q.dim(), 2);
    // |x + y| <= 2 is implied by the box, the shadow is the unit square
    assert_eq!(q.n_facets(), 4);
    assert!(q.contains(&DVector::from_vec(vec![1., 1.]), 1e-9));
    assert!(q.contains(&DVector::from_vec(vec![-1., -1.]), 1e-9));
}

#[test]
fn test_bounding_box_unbounded()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // x >= 0, -1 <= y <= 3
    let p = Polytope::from_bounds(
        &DVector::from_vec(vec![0., -1.]),
        &DVector::from_vec(vec![f64::INFINITY, 3.]),
    ).unwrap();

    let (lb, ub) = p.bounding_box(&IpmOracle::new()).unwrap();
    assert_float_eq!(lb.as_slice(), [0., -1.].as_ref(), abs_all <= 1e-6);
    assert_float_eq!(ub[1], 3., abs <= 1e-6);
    assert!(ub[0].is_infinite());
}

#[test]
fn test_dimension_mismatch()
{
    let rslt = Polytope::new(DMatrix::zeros(2, 2), DVector::zeros(3));
    assert_eq!(
        rslt.err(),
        Some(PwaError::DimensionMismatch {what: "polytope rhs", expected: (2, 1), found: (3, 1)})
    );

    let mut p = unit_box(2);
    assert!(p.add_facets(&DMatrix::zeros(1, 3), &DVector::zeros(1)).is_err());
}

#[test]
fn test_intersection()
{
    // unit box cut by x + y <= 0.5
    let half = Polytope::new(DMatrix::from_row_slice(1, 2, &[1., 1.]), DVector::from_vec(vec![0.5])).unwrap();
    let p = unit_box(2).intersection(&half).unwrap();
    assert_eq!(p.n_facets(), 5);

    assert_float_eq!(p.violation(&DVector::from_vec(vec![1., 1.])), 1.5, abs <= 1e-12);
    assert_float_eq!(p.violation(&DVector::zeros(2)), -0.5, abs <= 1e-12);
    assert!(p.contains(&DVector::from_vec(vec![-1., 1.]), 0.));
    assert!(!p.contains(&DVector::from_vec(vec![0.5, 0.5]), 1e-9));
    assert_eq!(Polytope::universe(2).violation(&DVector::zeros(2)), f64::NEG_INFINITY);

    assert_eq!(
        unit_box(2).intersection(&unit_box(3)).err(),
        Some(PwaError::DimensionMismatch {what: "facet lhs", expected: (6, 2), found: (6, 3)})
    );
}
