//! Condensed MPC problems of piecewise-affine systems
//!
//! <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
//! <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
//!
//! Fixing the mode sequence \\(z\\) makes the finite-horizon problem
//! \\[
//! \begin{array}{ll}
//! {\rm minimize} & \sum_{k=0}^{N-1} (x_k^T Q x_k + u_k^T R u_k) + x_N^T P x_N \\\\
//! {\rm subject \ to} & x_{k+1} = A_{z(k)} x_k + B_{z(k)} u_k + c_{z(k)} \\\\
//! & (x_k, u_k) \in D_{z(k)},\ x_N \in X_N
//! \end{array}
//! \\]
//! a [`ParametricQp`] in the inputs \\(\bar u\\) with the initial state as parameter.

use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use crate::linalg_ex::{vstack, vcat};
use crate::dynamics::{PwaSystem, ModeSequence, CondensedSystem};
use crate::polytope::Polytope;
use crate::problem::ParametricQp;

//

/// Quadratic stage and terminal weights.
#[derive(Debug, Clone, PartialEq)]
pub struct MpcCost
{
    /// State weight \\(Q\\).
    pub q: DMatrix<f64>,
    /// Input weight \\(R\\).
    pub r: DMatrix<f64>,
    /// Terminal weight \\(P\\).
    pub p: DMatrix<f64>,
}

impl MpcCost
{
    /// Creates the weights.
    ///
    /// Returns [`PwaError::DimensionMismatch`] unless all are square and \\(P\\) matches \\(Q\\).
    pub fn new(q: DMatrix<f64>, r: DMatrix<f64>, p: DMatrix<f64>) -> Result<Self, PwaError>
    {
        let (n_x, n_u) = (q.nrows(), r.nrows());
        PwaError::check_dim("Q", (n_x, n_x), q.shape())?;
        PwaError::check_dim("R", (n_u, n_u), r.shape())?;
        PwaError::check_dim("P", (n_x, n_x), p.shape())?;

        Ok(MpcCost {q, r, p})
    }
}

fn block_diag_repeat(m: &DMatrix<f64>, times: usize, last: Option<&DMatrix<f64>>) -> DMatrix<f64>
{
    let n = m.nrows();
    let total = n * times + last.map_or(0, |l| l.nrows());
    let mut out = DMatrix::zeros(total, total);
    for k in 0.. times {
        out.view_mut((k * n, k * n), (n, n)).copy_from(m);
    }
    if let Some(l) = last {
        out.view_mut((n * times, n * times), l.shape()).copy_from(l);
    }
    out
}

/// Builds the condensed pQP of `pwa` along `seq`.
///
/// Inputs are stacked as \\(\bar u = (u_0, \ldots, u_{N-1})\\). With
/// \\(\bar Q = {\rm diag}(Q, \ldots, Q, P)\\) and \\(\bar R = {\rm diag}(R, \ldots, R)\\):
/// \\(F_{uu} = 2 (\bar B^T \bar Q \bar B + \bar R)\\), \\(F_{xu} = 2 \bar A^T \bar Q \bar B\\),
/// \\(F_{xx} = 2 \bar A^T \bar Q \bar A\\), \\(F_u = 2 \bar B^T \bar Q \bar c\\),
/// \\(F_x = 2 \bar A^T \bar Q \bar c\\), \\(F = \bar c^T \bar Q \bar c\\).
pub fn condensed_qp(pwa: &PwaSystem, seq: &ModeSequence, cost: &MpcCost, terminal: Option<&Polytope>) -> Result<ParametricQp, PwaError>
{
    let (n_x, n_u, n) = (pwa.n_x(), pwa.n_u(), seq.len());
    PwaError::check_dim("Q", (n_x, n_x), cost.q.shape())?;
    PwaError::check_dim("R", (n_u, n_u), cost.r.shape())?;
    PwaError::check_dim("P", (n_x, n_x), cost.p.shape())?;
    if let Some(t) = terminal {
        PwaError::check_dim("terminal set", (t.n_facets(), n_x), t.lhs().shape())?;
    }

    let cs = pwa.condense(seq)?;
    let q_bar = block_diag_repeat(&cost.q, n, Some(&cost.p));
    let r_bar = block_diag_repeat(&cost.r, n, None);

    let qb = &q_bar * &cs.b_bar;
    let qa = &q_bar * &cs.a_bar;
    let qc = &q_bar * &cs.c_bar;

    let f_uu = (cs.b_bar.transpose() * &qb + r_bar) * 2.;
    let f_uu = (&f_uu + f_uu.transpose()) * 0.5;
    let f_xu = cs.a_bar.transpose() * &qb * 2.;
    let f_xx = cs.a_bar.transpose() * &qa * 2.;
    let f_xx = (&f_xx + f_xx.transpose()) * 0.5;
    let f_u = cs.b_bar.transpose() * &qc * 2.;
    let f_x = cs.a_bar.transpose() * &qc * 2.;
    let f = cs.c_bar.dot(&qc);

    let (c_u, c_x, c) = constraints(pwa, seq, &cs, terminal)?;
    log::debug!("condensed MPC: horizon {} with {} constraint rows", n, c.len());

    ParametricQp::new(f_uu, f_xu, f_xx, f_u, f_x, f, c_u, c_x, c)
}

fn constraints(pwa: &PwaSystem, seq: &ModeSequence, cs: &CondensedSystem, terminal: Option<&Polytope>) -> Result<(DMatrix<f64>, DMatrix<f64>, DVector<f64>), PwaError>
{
    let (n_x, n_u, n) = (pwa.n_x(), pwa.n_u(), seq.len());

    let mut c_u_rows: Vec<DMatrix<f64>> = Vec::new();
    let mut c_x_rows: Vec<DMatrix<f64>> = Vec::new();
    let mut c_rows: Vec<DVector<f64>> = Vec::new();

    let mut push = |lhs_x: DMatrix<f64>, lhs_u: DMatrix<f64>, rhs: &DVector<f64>, k: usize| {
        // lhs_x x_k + lhs_u u_k <= rhs, x_k = A_k x + B_k u_bar + c_k, u_k = u_bar[k]
        let (a_k, b_k, c_k) = cs.block(k);
        let mut cu = &lhs_x * b_k;
        if lhs_u.ncols() > 0 {
            let mut v = cu.columns_mut(k * n_u, n_u);
            v += &lhs_u;
        }
        c_u_rows.push(cu);
        c_x_rows.push(-(&lhs_x * a_k));
        c_rows.push(rhs - &lhs_x * c_k);
    };

    for (k, &mode) in seq.as_slice().iter().enumerate() {
        let (_, d) = pwa.mode(mode)?;
        push(
            d.lhs().columns(0, n_x).into_owned(),
            d.lhs().columns(n_x, n_u).into_owned(),
            d.rhs(),
            k,
        );
    }
    if let Some(t) = terminal {
        push(t.lhs().clone(), DMatrix::zeros(t.n_facets(), 0), t.rhs(), n);
    }

    let c_u = vstack(n_u * n, &c_u_rows.iter().collect::<Vec<_>>());
    let c_x = vstack(n_x, &c_x_rows.iter().collect::<Vec<_>>());
    let c = vcat(&c_rows.iter().collect::<Vec<_>>());
    Ok((c_u, c_x, c))
}
