//! Dense matrix helpers shared by the condenser, the pQP and the MOAS routines.

use nalgebra::{DMatrix, DVector};
use crate::PwaError;

/// Stacks matrices vertically.
///
/// All blocks shall have `n_col` columns; `n_col` is needed when `blocks` is empty.
pub fn vstack(n_col: usize, blocks: &[&DMatrix<f64>]) -> DMatrix<f64>
{
    let n_row = blocks.iter().map(|b| b.nrows()).sum();
    let mut m = DMatrix::zeros(n_row, n_col);

    let mut r = 0;
    for b in blocks {
        assert_eq!(b.ncols(), n_col);
        m.view_mut((r, 0), b.shape()).copy_from(*b);
        r += b.nrows();
    }
    m
}

/// Stacks matrices horizontally.
///
/// All blocks shall have `n_row` rows.
pub fn hstack(n_row: usize, blocks: &[&DMatrix<f64>]) -> DMatrix<f64>
{
    let n_col = blocks.iter().map(|b| b.ncols()).sum();
    let mut m = DMatrix::zeros(n_row, n_col);

    let mut c = 0;
    for b in blocks {
        assert_eq!(b.nrows(), n_row);
        m.view_mut((0, c), b.shape()).copy_from(*b);
        c += b.ncols();
    }
    m
}

/// Block diagonal matrix of two blocks.
pub fn block_diag(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64>
{
    let mut m = DMatrix::zeros(a.nrows() + b.nrows(), a.ncols() + b.ncols());
    m.view_mut((0, 0), a.shape()).copy_from(a);
    m.view_mut(a.shape(), b.shape()).copy_from(b);
    m
}

/// Concatenates vectors.
pub fn vcat(vecs: &[&DVector<f64>]) -> DVector<f64>
{
    let n = vecs.iter().map(|v| v.len()).sum();
    let mut s = DVector::zeros(n);

    let mut r = 0;
    for v in vecs {
        s.rows_mut(r, v.len()).copy_from(*v);
        r += v.len();
    }
    s
}

/// Concatenates a list of per-stage vectors into one flat vector.
pub fn stack_stages(stages: &[DVector<f64>]) -> DVector<f64>
{
    let refs: Vec<&DVector<f64>> = stages.iter().collect();
    vcat(&refs)
}

/// Splits a flat vector into stages of length `stage`.
///
/// Returns [`PwaError::NonIntegerStageCount`] if the length is not a multiple of `stage`.
pub fn split_stages(flat: &DVector<f64>, stage: usize) -> Result<Vec<DVector<f64>>, PwaError>
{
    if stage == 0 || flat.len() % stage != 0 {
        return Err(PwaError::NonIntegerStageCount {len: flat.len(), stage});
    }

    Ok((0.. flat.len() / stage).map(|k| flat.rows(k * stage, stage).into_owned()).collect())
}

/// Indices of rows forming a basis of the row space, chosen greedily in order.
///
/// A row is kept when its residual against the rows kept before it
/// exceeds `eps` relative to its own norm.
pub fn independent_rows(mat: &DMatrix<f64>, eps: f64) -> Vec<usize>
{
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut rows = Vec::new();

    for i in 0.. mat.nrows() {
        let mut v = mat.row(i).transpose();
        let scale = v.norm();
        if scale <= eps {
            continue;
        }

        // modified Gram-Schmidt
        for b in basis.iter() {
            let proj = b.dot(&v);
            v.axpy(-proj, b, 1.);
        }

        let res = v.norm();
        if res > eps * scale {
            basis.push(v / res);
            rows.push(i);
        }
    }
    rows
}

/// Largest eigenvalue magnitude of a square matrix.
pub fn spectral_radius(a: &DMatrix<f64>) -> f64
{
    if a.is_empty() {
        return 0.;
    }

    a.complex_eigenvalues()
        .iter()
        .map(|e| e.norm())
        .fold(0., f64::max)
}

/// `true` when any entry is NaN.
pub fn has_nan(v: &DVector<f64>) -> bool
{
    v.iter().any(|e| e.is_nan())
}

//

#[test]
fn test_independent_rows()
{
    let m = DMatrix::from_row_slice(4, 2, &[
        1., 0.,
        2., 0.,
        0., 0.,
        1., 1.,
    ]);
    assert_eq!(independent_rows(&m, 1e-9), vec![0, 3]);
}

#[test]
fn test_split_stages()
{
    let flat = DVector::from_vec(vec![1., 2., 3., 4.]);
    let stages = split_stages(&flat, 2).unwrap();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[1][0], 3.);
    assert_eq!(stack_stages(&stages), flat);

    assert_eq!(
        split_stages(&flat, 3),
        Err(PwaError::NonIntegerStageCount {len: 4, stage: 3})
    );
}

#[test]
fn test_spectral_radius()
{
    use float_eq::assert_float_eq;

    // rotation scaled by 0.5
    let a = DMatrix::from_row_slice(2, 2, &[
        0., -0.5,
        0.5, 0.,
    ]);
    assert_float_eq!(spectral_radius(&a), 0.5, abs <= 1e-12);
}
