//! Half-space polytopes
//!
//! <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
//! <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
//!
//! A [`Polytope`] is the set \\(\lbrace x \mid A x \preceq b \rbrace\\).
//! Geometric queries which need optimization (emptiness, redundancy removal,
//! projection, bounding boxes) take a [`ConvexOracle`] and solve LPs through it.

use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use crate::linalg_ex::{vstack, block_diag, vcat};
use crate::oracle::{ConvexOracle, SolveStatus, Solution};

/// Relative slack below which a facet is deemed redundant.
const EPS_REDUNDANT: f64 = 1e-8;

/// Coefficients of magnitude not above this are treated as zero.
const EPS_COEF: f64 = 1e-12;

//

/// Polytope in half-space representation \\(A x \preceq b\\).
///
/// Possibly unbounded; a polytope without facets is the whole space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PolytopeData"))]
pub struct Polytope
{
    lhs: DMatrix<f64>,
    rhs: DVector<f64>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PolytopeData
{
    lhs: DMatrix<f64>,
    rhs: DVector<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<PolytopeData> for Polytope
{
    type Error = PwaError;

    fn try_from(data: PolytopeData) -> Result<Self, PwaError>
    {
        Polytope::new(data.lhs, data.rhs)
    }
}

impl Polytope
{
    /// Creates a polytope from \\(A\\) and \\(b\\).
    ///
    /// Returns [`PwaError::DimensionMismatch`] if the row counts differ.
    pub fn new(lhs: DMatrix<f64>, rhs: DVector<f64>) -> Result<Self, PwaError>
    {
        PwaError::check_dim("polytope rhs", (lhs.nrows(), 1), (rhs.len(), 1))?;
        Ok(Polytope {lhs, rhs})
    }

    /// The whole space \\(\mathbb{R}^n\\).
    pub fn universe(n: usize) -> Self
    {
        Polytope {
            lhs: DMatrix::zeros(0, n),
            rhs: DVector::zeros(0),
        }
    }

    /// Box \\(lb \preceq x \preceq ub\\); infinite bounds produce no facet.
    pub fn from_bounds(lb: &DVector<f64>, ub: &DVector<f64>) -> Result<Self, PwaError>
    {
        PwaError::check_dim("upper bound", (lb.len(), 1), (ub.len(), 1))?;

        let mut p = Polytope::universe(lb.len());
        p.add_bounds(lb, ub)?;
        Ok(p)
    }

    /// Dimension of the ambient space.
    pub fn dim(&self) -> usize
    {
        self.lhs.ncols()
    }

    /// Number of facets (rows), redundant ones included.
    pub fn n_facets(&self) -> usize
    {
        self.lhs.nrows()
    }

    /// \\(A\\).
    pub fn lhs(&self) -> &DMatrix<f64>
    {
        &self.lhs
    }

    /// \\(b\\).
    pub fn rhs(&self) -> &DVector<f64>
    {
        &self.rhs
    }

    /// Appends facets \\(A' x \preceq b'\\).
    pub fn add_facets(&mut self, lhs: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<(), PwaError>
    {
        PwaError::check_dim("facet lhs", (rhs.len(), self.dim()), lhs.shape())?;

        self.lhs = vstack(self.dim(), &[&self.lhs, lhs]);
        self.rhs = vcat(&[&self.rhs, rhs]);
        Ok(())
    }

    /// Appends box facets; infinite bounds produce no facet.
    pub fn add_bounds(&mut self, lb: &DVector<f64>, ub: &DVector<f64>) -> Result<(), PwaError>
    {
        let n = self.dim();
        PwaError::check_dim("lower bound", (n, 1), (lb.len(), 1))?;
        PwaError::check_dim("upper bound", (n, 1), (ub.len(), 1))?;

        let mut rows = Vec::new();
        for i in 0.. n {
            if ub[i].is_finite() {
                rows.push((i, 1., ub[i]));
            }
            if lb[i].is_finite() {
                rows.push((i, -1., -lb[i]));
            }
        }

        let mut lhs = DMatrix::zeros(rows.len(), n);
        let mut rhs = DVector::zeros(rows.len());
        for (r, &(i, sign, b)) in rows.iter().enumerate() {
            lhs[(r, i)] = sign;
            rhs[r] = b;
        }
        self.add_facets(&lhs, &rhs)
    }

    /// Cartesian product \\(P \times Q\\), facets block-diagonal.
    pub fn cartesian_product(&self, other: &Polytope) -> Polytope
    {
        Polytope {
            lhs: block_diag(&self.lhs, &other.lhs),
            rhs: vcat(&[&self.rhs, &other.rhs]),
        }
    }

    /// Intersection; both operands shall have the same dimension.
    pub fn intersection(&self, other: &Polytope) -> Result<Polytope, PwaError>
    {
        let mut p = self.clone();
        p.add_facets(&other.lhs, &other.rhs)?;
        Ok(p)
    }

    /// Membership test \\(A x \preceq b + tol\\).
    pub fn contains(&self, x: &DVector<f64>, tol: f64) -> bool
    {
        if x.len() != self.dim() {
            return false;
        }
        let res = &self.lhs * x - &self.rhs;
        res.iter().all(|r| *r <= tol)
    }

    /// Largest constraint violation \\(\max_i (A x - b)_i\\), `-inf` without facets.
    pub fn violation(&self, x: &DVector<f64>) -> f64
    {
        let res = &self.lhs * x - &self.rhs;
        res.iter().fold(f64::NEG_INFINITY, |a, r| a.max(*r))
    }

    /// Emptiness test by a feasibility LP.
    pub fn is_empty<O: ConvexOracle>(&self, oracle: &O) -> Result<bool, PwaError>
    {
        if self.n_facets() == 0 {
            return Ok(false);
        }

        let sol = oracle.solve_lp(&DVector::zeros(self.dim()), &self.lhs, &self.rhs, None)?;
        match sol.status {
            SolveStatus::Optimal => Ok(false),
            SolveStatus::Infeasible | SolveStatus::InfeasibleOrUnbounded => Ok(true),
            s => Err(oracle_failure("emptiness test", s)),
        }
    }

    /// Equivalent polytope without redundant facets.
    ///
    /// Rows are normalized to unit norm first; zero rows with nonnegative
    /// right-hand side are dropped. Each remaining facet is then tested in order
    /// by maximizing it over the other kept facets.
    ///
    /// Returns [`PwaError::EmptySet`] for an empty polytope.
    pub fn minimal<O: ConvexOracle>(&self, oracle: &O) -> Result<Polytope, PwaError>
    {
        if self.is_empty(oracle)? {
            log::debug!("minimal: empty polytope of {} facets", self.n_facets());
            return Err(PwaError::EmptySet);
        }

        let n = self.dim();
        let mut rows: Vec<(DVector<f64>, f64)> = Vec::new();
        for i in 0.. self.n_facets() {
            let a = self.lhs.row(i).transpose();
            let norm = a.norm();
            if norm > EPS_COEF {
                rows.push((a / norm, self.rhs[i] / norm));
            }
        }

        let mut keep = vec![true; rows.len()];
        for i in 0.. rows.len() {
            let (a_i, b_i) = &rows[i];

            // the other kept rows, plus the tested row relaxed by one to keep the LP bounded
            let others: Vec<usize> = (0.. rows.len()).filter(|&j| j != i && keep[j]).collect();
            let mut lhs = DMatrix::zeros(others.len() + 1, n);
            let mut rhs = DVector::zeros(others.len() + 1);
            for (r, &j) in others.iter().enumerate() {
                lhs.set_row(r, &rows[j].0.transpose());
                rhs[r] = rows[j].1;
            }
            lhs.set_row(others.len(), &a_i.transpose());
            rhs[others.len()] = b_i + 1.;

            let sol = oracle.solve_lp(&(-a_i), &lhs, &rhs, None)?;
            let max = -expect_optimal(sol, "redundancy test")?.value;
            if max <= b_i + EPS_REDUNDANT * (1. + b_i.abs()) {
                keep[i] = false;
            }
        }

        let kept: Vec<usize> = (0.. rows.len()).filter(|&i| keep[i]).collect();
        let mut lhs = DMatrix::zeros(kept.len(), n);
        let mut rhs = DVector::zeros(kept.len());
        for (r, &i) in kept.iter().enumerate() {
            lhs.set_row(r, &rows[i].0.transpose());
            rhs[r] = rows[i].1;
        }

        log::trace!("minimal: {} -> {} facets", self.n_facets(), kept.len());
        Ok(Polytope {lhs, rhs})
    }

    /// Orthogonal projection onto the first `n_keep` coordinates.
    ///
    /// The trailing coordinates are eliminated one by one with Fourier–Motzkin,
    /// reducing to a minimal representation after every elimination.
    ///
    /// Returns [`PwaError::EmptySet`] for an empty polytope.
    pub fn project<O: ConvexOracle>(&self, oracle: &O, n_keep: usize) -> Result<Polytope, PwaError>
    {
        if n_keep > self.dim() {
            log::error!("project: {} coordinates requested from dimension {}", n_keep, self.dim());
            return Err(PwaError::DimensionMismatch {
                what: "projection",
                expected: (self.dim(), 1),
                found: (n_keep, 1),
            });
        }

        let mut p = self.minimal(oracle)?;
        while p.dim() > n_keep {
            p = p.eliminate_last().minimal(oracle)?;
            log::debug!("project: dim {} with {} facets", p.dim(), p.n_facets());
        }
        Ok(p)
    }

    fn eliminate_last(&self) -> Polytope
    {
        let n = self.dim();
        let j = n - 1;

        let mut pos = Vec::new();
        let mut neg = Vec::new();
        let mut zero = Vec::new();
        for i in 0.. self.n_facets() {
            let c = self.lhs[(i, j)];
            if c > EPS_COEF {
                pos.push(i);
            }
            else if c < -EPS_COEF {
                neg.push(i);
            }
            else {
                zero.push(i);
            }
        }

        let n_rows = zero.len() + pos.len() * neg.len();
        let mut lhs = DMatrix::zeros(n_rows, j);
        let mut rhs = DVector::zeros(n_rows);

        let mut r = 0;
        for &i in zero.iter() {
            lhs.row_mut(r).copy_from(&self.lhs.view((i, 0), (1, j)));
            rhs[r] = self.rhs[i];
            r += 1;
        }
        for &ip in pos.iter() {
            let cp = self.lhs[(ip, j)];
            for &in_ in neg.iter() {
                let cn = -self.lhs[(in_, j)];
                let row = self.lhs.view((ip, 0), (1, j)) / cp + self.lhs.view((in_, 0), (1, j)) / cn;
                lhs.row_mut(r).copy_from(&row);
                rhs[r] = self.rhs[ip] / cp + self.rhs[in_] / cn;
                r += 1;
            }
        }

        Polytope {lhs, rhs}
    }

    /// Elementwise bounds of the polytope, `±inf` along unbounded directions.
    ///
    /// Returns [`PwaError::EmptySet`] for an empty polytope.
    pub fn bounding_box<O: ConvexOracle>(&self, oracle: &O) -> Result<(DVector<f64>, DVector<f64>), PwaError>
    {
        if self.is_empty(oracle)? {
            return Err(PwaError::EmptySet);
        }

        let n = self.dim();
        let mut lb = DVector::from_element(n, f64::NEG_INFINITY);
        let mut ub = DVector::from_element(n, f64::INFINITY);

        for i in 0.. n {
            let mut e = DVector::zeros(n);
            e[i] = 1.;

            let lo = oracle.solve_lp(&e, &self.lhs, &self.rhs, None)?;
            if lo.status != SolveStatus::Unbounded {
                lb[i] = expect_optimal(lo, "lower bound")?.value;
            }
            let hi = oracle.solve_lp(&(-e), &self.lhs, &self.rhs, None)?;
            if hi.status != SolveStatus::Unbounded {
                ub[i] = -expect_optimal(hi, "upper bound")?.value;
            }
        }
        Ok((lb, ub))
    }
}

fn oracle_failure(what: &str, status: SolveStatus) -> PwaError
{
    log::warn!("{}: oracle returned {:?}", what, status);
    PwaError::Oracle(format!("{} ended with {:?}", what, status))
}

pub(crate) fn expect_optimal(sol: Solution, what: &str) -> Result<Solution, PwaError>
{
    if sol.is_optimal() {
        Ok(sol)
    }
    else {
        Err(oracle_failure(what, sol.status))
    }
}

//

#[test]
fn test_eliminate_last()
{
    // triangle x >= 0, y >= 0, x + y <= 1 projected on x
    let p = Polytope::new(
        DMatrix::from_row_slice(3, 2, &[
            -1., 0.,
            0., -1.,
            1., 1.,
        ]),
        DVector::from_vec(vec![0., 0., 1.]),
    ).unwrap();

    let q = p.eliminate_last();
    assert_eq!(q.dim(), 1);
    assert_eq!(q.n_facets(), 2);
    assert!(q.contains(&DVector::from_vec(vec![0.5]), 0.));
    assert!(!q.contains(&DVector::from_vec(vec![1.5]), 0.));
    assert!(!q.contains(&DVector::from_vec(vec![-0.5]), 0.));
}

#[test]
fn test_cartesian_product()
{
    let x = Polytope::from_bounds(&DVector::from_vec(vec![-1.]), &DVector::from_vec(vec![1.])).unwrap();
    let u = Polytope::from_bounds(&DVector::from_vec(vec![0.]), &DVector::from_vec(vec![f64::INFINITY])).unwrap();
    let d = x.cartesian_product(&u);

    assert_eq!(d.dim(), 2);
    assert_eq!(d.n_facets(), 3);
    assert!(d.contains(&DVector::from_vec(vec![0.5, 10.]), 0.));
    assert!(!d.contains(&DVector::from_vec(vec![0.5, -1.]), 0.));
}
