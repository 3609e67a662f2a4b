//! Convex-solve oracle
//!
//! The explicit MPC routines never solve an optimization problem themselves.
//! They hand a [`ConvexProgram`] to a [`ConvexOracle`], which returns a [`Solution`].
//! Each call creates its own solver session; there is no shared solver state.

use nalgebra::{DMatrix, DVector};
use crate::PwaError;

mod ipm;
mod first_order;

pub use ipm::*;
pub use first_order::*;

//

/// Termination status of an oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus
{
    /// Solved to optimality.
    Optimal,
    /// Found an infeasibility certificate.
    Infeasible,
    /// Found an unboundedness certificate.
    Unbounded,
    /// Either infeasible or unbounded, not distinguished by the backend.
    InfeasibleOrUnbounded,
    /// Stopped for another reason (iteration limit, numerical trouble).
    Failed,
}

//

/// Convex program
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & {1 \over 2} x^T P x + q^T x \\\\
/// {\rm subject \ to} & G x \preceq h \\\\
/// & A x = b,
/// \end{array}
/// \\]
/// which is a linear program when \\(P\\) is absent.
#[derive(Debug, Clone)]
pub struct ConvexProgram
{
    /// \\(P\\), symmetric positive semidefinite, `None` for an LP.
    pub hessian: Option<DMatrix<f64>>,
    /// \\(q\\).
    pub cost: DVector<f64>,
    /// \\(G\\).
    pub ineq_lhs: DMatrix<f64>,
    /// \\(h\\).
    pub ineq_rhs: DVector<f64>,
    /// \\(A\\).
    pub eq_lhs: DMatrix<f64>,
    /// \\(b\\).
    pub eq_rhs: DVector<f64>,
}

impl ConvexProgram
{
    /// Linear program \\(\min q^T x\\) s.t. \\(G x \preceq h\\).
    pub fn lp(cost: DVector<f64>, ineq_lhs: DMatrix<f64>, ineq_rhs: DVector<f64>) -> Self
    {
        let n = cost.len();
        ConvexProgram {
            hessian: None,
            cost,
            ineq_lhs,
            ineq_rhs,
            eq_lhs: DMatrix::zeros(0, n),
            eq_rhs: DVector::zeros(0),
        }
    }

    /// Quadratic program \\(\min {1 \over 2} x^T P x + q^T x\\) s.t. \\(G x \preceq h\\).
    pub fn qp(hessian: DMatrix<f64>, cost: DVector<f64>, ineq_lhs: DMatrix<f64>, ineq_rhs: DVector<f64>) -> Self
    {
        let mut prog = ConvexProgram::lp(cost, ineq_lhs, ineq_rhs);
        prog.hessian = Some(hessian);
        prog
    }

    /// Builder adding equality constraints \\(A x = b\\).
    pub fn with_equalities(mut self, eq_lhs: DMatrix<f64>, eq_rhs: DVector<f64>) -> Self
    {
        self.eq_lhs = eq_lhs;
        self.eq_rhs = eq_rhs;
        self
    }

    /// Builder adding box bounds \\(lb \preceq x \preceq ub\\) as inequality rows.
    ///
    /// Infinite bounds produce no row.
    pub fn with_bounds(mut self, lb: &DVector<f64>, ub: &DVector<f64>) -> Self
    {
        let n = self.n_var();
        let mut rows = Vec::new();
        let mut rhs = Vec::new();
        for i in 0.. n.min(lb.len()).min(ub.len()) {
            if ub[i].is_finite() {
                rows.push((i, 1.));
                rhs.push(ub[i]);
            }
            if lb[i].is_finite() {
                rows.push((i, -1.));
                rhs.push(-lb[i]);
            }
        }

        let m0 = self.ineq_lhs.nrows();
        let mut g = DMatrix::zeros(m0 + rows.len(), n);
        g.view_mut((0, 0), self.ineq_lhs.shape()).copy_from(&self.ineq_lhs);
        let mut h = DVector::zeros(m0 + rows.len());
        h.rows_mut(0, m0).copy_from(&self.ineq_rhs);
        for (k, (&(i, sign), &r)) in rows.iter().zip(rhs.iter()).enumerate() {
            g[(m0 + k, i)] = sign;
            h[m0 + k] = r;
        }

        self.ineq_lhs = g;
        self.ineq_rhs = h;
        self
    }

    /// Number of variables.
    pub fn n_var(&self) -> usize
    {
        self.cost.len()
    }

    /// Number of inequality constraints.
    pub fn n_ineq(&self) -> usize
    {
        self.ineq_rhs.len()
    }

    /// Number of equality constraints.
    pub fn n_eq(&self) -> usize
    {
        self.eq_rhs.len()
    }

    /// Checks the sizes of all operands.
    pub fn check(&self) -> Result<(), PwaError>
    {
        let (n, m, p) = (self.n_var(), self.n_ineq(), self.n_eq());

        if let Some(hessian) = &self.hessian {
            PwaError::check_dim("hessian", (n, n), hessian.shape())?;
        }
        PwaError::check_dim("ineq_lhs", (m, n), self.ineq_lhs.shape())?;
        PwaError::check_dim("eq_lhs", (p, n), self.eq_lhs.shape())?;
        Ok(())
    }

    /// Objective value at `x`.
    pub fn objective(&self, x: &DVector<f64>) -> f64
    {
        let lin = self.cost.dot(x);
        match &self.hessian {
            Some(p) => 0.5 * x.dot(&(p * x)) + lin,
            None => lin,
        }
    }
}

//

/// Degeneracy diagnostics of an LP vertex solution.
///
/// Both flags come from facet counting and are advisory only:
/// * primal degenerate when more inequalities are tight than
///   \\(n - n_{eq}\\), the count needed to pin a vertex;
/// * dual degenerate when more multipliers vanish than
///   \\(m - n + n_{eq}\\), the count of inactive rows at a nondegenerate vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degeneracy
{
    /// Too many tight inequalities.
    pub primal: bool,
    /// Too many vanishing multipliers.
    pub dual: bool,
}

impl Degeneracy
{
    /// Evaluates the facet-count heuristic.
    pub fn assess(n_var: usize, n_eq: usize, active: &[usize], multipliers: &DVector<f64>, eps: f64) -> Self
    {
        let n_ineq = multipliers.len();
        let n_zero = multipliers.iter().filter(|&&l| l < eps).count();

        Degeneracy {
            primal: active.len() + n_eq > n_var,
            dual: n_zero + n_var > n_ineq + n_eq,
        }
    }
}

//

/// Result of an oracle call.
///
/// Non-optimal outcomes carry NaN in `argmin` and `value`;
/// callers check [`Solution::is_optimal`] before using them.
#[derive(Debug, Clone)]
pub struct Solution
{
    /// Outcome reported by the solver.
    pub status: SolveStatus,
    /// Minimizer, NaN unless optimal.
    pub argmin: DVector<f64>,
    /// Optimal objective value, NaN unless optimal.
    pub value: f64,
    /// Inequality multipliers (LP only, optimal only).
    pub ineq_multipliers: Option<DVector<f64>>,
    /// Indices of tight inequality rows (LP only, optimal only).
    pub active_set: Option<Vec<usize>>,
    /// Vertex degeneracy flags (LP only, optimal only).
    pub degeneracy: Option<Degeneracy>,
}

impl Solution
{
    /// Sentinel solution of a non-optimal outcome.
    pub fn unavailable(status: SolveStatus, n_var: usize) -> Self
    {
        Solution {
            status,
            argmin: DVector::from_element(n_var, f64::NAN),
            value: f64::NAN,
            ineq_multipliers: None,
            active_set: None,
            degeneracy: None,
        }
    }

    /// Optimal solution with primal data; LP diagnostics are filled by [`Solution::with_lp_duals`].
    pub fn optimal(prog: &ConvexProgram, argmin: DVector<f64>) -> Self
    {
        let value = prog.objective(&argmin);
        Solution {
            status: SolveStatus::Optimal,
            argmin,
            value,
            ineq_multipliers: None,
            active_set: None,
            degeneracy: None,
        }
    }

    /// Attaches LP multipliers, the active set by slack and the degeneracy flags.
    pub fn with_lp_duals(mut self, prog: &ConvexProgram, multipliers: DVector<f64>, eps_active: f64) -> Self
    {
        let slack = &prog.ineq_rhs - &prog.ineq_lhs * &self.argmin;
        let active: Vec<usize> = slack.iter()
            .enumerate()
            .filter(|(_, s)| **s <= eps_active * (1. + inf_norm(prog.ineq_rhs.as_slice())))
            .map(|(i, _)| i)
            .collect();

        self.degeneracy = Some(Degeneracy::assess(prog.n_var(), prog.n_eq(), &active, &multipliers, eps_active));
        self.active_set = Some(active);
        self.ineq_multipliers = Some(multipliers);
        self
    }

    /// `true` when solved to optimality.
    pub fn is_optimal(&self) -> bool
    {
        self.status == SolveStatus::Optimal
    }
}

//

/// Convex-solve oracle
///
/// Implementors solve a [`ConvexProgram`] and report the outcome as a [`Solution`].
/// Infeasible or unbounded programs are *not* errors: they come back as
/// a [`Solution`] with the matching [`SolveStatus`] and NaN values.
/// `Err` is reserved for malformed programs and backend failures to start.
pub trait ConvexOracle
{
    /// Solves a program.
    fn solve(&self, prog: &ConvexProgram) -> Result<Solution, PwaError>;

    /// Solves \\(\min c^T x\\) s.t. \\(G x \preceq h,\ A x = b\\).
    fn solve_lp(&self,
        cost: &DVector<f64>,
        ineq_lhs: &DMatrix<f64>, ineq_rhs: &DVector<f64>,
        eq: Option<(&DMatrix<f64>, &DVector<f64>)>) -> Result<Solution, PwaError>
    {
        let mut prog = ConvexProgram::lp(cost.clone(), ineq_lhs.clone(), ineq_rhs.clone());
        if let Some((eq_lhs, eq_rhs)) = eq {
            prog = prog.with_equalities(eq_lhs.clone(), eq_rhs.clone());
        }
        self.solve(&prog)
    }

    /// Solves \\(\min {1 \over 2} x^T P x + q^T x\\) s.t. \\(G x \preceq h,\ lb \preceq x \preceq ub\\).
    fn solve_qp(&self,
        hessian: &DMatrix<f64>, cost: &DVector<f64>,
        ineq_lhs: &DMatrix<f64>, ineq_rhs: &DVector<f64>,
        bounds: Option<(&DVector<f64>, &DVector<f64>)>) -> Result<Solution, PwaError>
    {
        let mut prog = ConvexProgram::qp(hessian.clone(), cost.clone(), ineq_lhs.clone(), ineq_rhs.clone());
        if let Some((lb, ub)) = bounds {
            prog = prog.with_bounds(lb, ub);
        }
        self.solve(&prog)
    }
}

//

/// Solves a program without any constraint in closed form.
///
/// Backends call this instead of building an empty cone.
pub(crate) fn solve_unconstrained(prog: &ConvexProgram) -> Solution
{
    let n = prog.n_var();

    match &prog.hessian {
        None => {
            if inf_norm(prog.cost.as_slice()) == 0. {
                Solution::optimal(prog, DVector::zeros(n))
            }
            else {
                Solution::unavailable(SolveStatus::Unbounded, n)
            }
        },
        Some(p) => {
            // minimum-norm stationary point; unbounded if the cost is not in the range of P
            let svd = p.clone().svd(true, true);
            let eps = 1e-12 * (1. + inf_norm(p.as_slice()));
            match svd.solve(&(-&prog.cost), eps) {
                Ok(x) if inf_norm((p * &x + &prog.cost).as_slice()) <= 1e-9 * (1. + inf_norm(prog.cost.as_slice())) => {
                    Solution::optimal(prog, x)
                },
                _ => Solution::unavailable(SolveStatus::Unbounded, n),
            }
        },
    }
}

/// Largest absolute entry, zero when empty.
pub(crate) fn inf_norm(v: &[f64]) -> f64
{
    v.iter().fold(0., |a, e| a.max(e.abs()))
}

//

#[test]
fn test_with_bounds()
{
    let prog = ConvexProgram::lp(
        DVector::from_vec(vec![1., 1.]),
        DMatrix::zeros(0, 2), DVector::zeros(0),
    ).with_bounds(
        &DVector::from_vec(vec![-1., f64::NEG_INFINITY]),
        &DVector::from_vec(vec![2., 3.]),
    );

    assert_eq!(prog.n_ineq(), 3);
    assert_eq!(prog.ineq_rhs, DVector::from_vec(vec![2., 1., 3.]));
    assert_eq!(prog.ineq_lhs[(1, 0)], -1.);
    assert_eq!(prog.ineq_lhs[(2, 1)], 1.);
    assert!(prog.check().is_ok());
}

#[test]
fn test_degeneracy()
{
    // vertex of a 2-D LP pinned by three tight rows
    let mult = DVector::from_vec(vec![1., 0., 0.5, 0.]);
    let d = Degeneracy::assess(2, 0, &[0, 1, 2], &mult, 1e-9);
    assert!(d.primal);
    assert!(!d.dual);
}
