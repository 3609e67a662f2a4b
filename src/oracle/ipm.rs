use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT, ZeroConeT},
};
use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use super::{ConvexOracle, ConvexProgram, Solution, SolveStatus, solve_unconstrained};

//

/// Parameters of [`IpmOracle`].
#[derive(Debug, Clone, PartialEq)]
pub struct IpmParam
{
    /// Tolerance of the duality gap (absolute and relative) and of the feasibility residuals.
    pub eps: f64,
    /// Max iteration number of the interior-point method.
    pub max_iter: u32,
    /// Slack below which an LP inequality is reported active (relative to the right-hand side).
    pub eps_active: f64,
    /// Entries of magnitude not above this are not stored in sparse matrices.
    pub eps_zero: f64,
}

impl Default for IpmParam
{
    fn default() -> Self
    {
        IpmParam {
            eps: 1e-9,
            max_iter: 200,
            eps_active: 1e-7,
            eps_zero: 1e-12,
        }
    }
}

//

/// Oracle backed by the `clarabel` interior-point solver.
///
/// Interior-point solutions are accurate enough to read active sets off the slacks,
/// which is what the explicit MPC routines need.
#[derive(Debug, Clone, Default)]
pub struct IpmOracle
{
    /// oracle parameters.
    pub par: IpmParam,
}

impl IpmOracle
{
    /// Creates an instance with default parameters.
    pub fn new() -> Self
    {
        IpmOracle::default()
    }

    /// Changes parameters by a function.
    ///
    /// * `f` takes a mutable reference of the parameters.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut IpmParam)
    {
        f(&mut self.par);
        self
    }

    fn settings(&self) -> Result<DefaultSettings<f64>, PwaError>
    {
        DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(self.par.max_iter)
            .tol_gap_abs(self.par.eps)
            .tol_gap_rel(self.par.eps)
            .tol_feas(self.par.eps)
            .build()
            .map_err(|e| PwaError::Oracle(format!("clarabel settings: {}", e)))
    }

    fn to_csc(&self, m: &DMatrix<f64>, upper_tri: bool) -> CscMatrix<f64>
    {
        let (nrows, ncols) = m.shape();
        let mut colptr = vec![0usize; ncols + 1];
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();

        for j in 0.. ncols {
            let last = if upper_tri {(j + 1).min(nrows)} else {nrows};
            for i in 0.. last {
                let v = m[(i, j)];
                if v.abs() > self.par.eps_zero {
                    rowval.push(i);
                    nzval.push(v);
                }
            }
            colptr[j + 1] = rowval.len();
        }

        CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
    }
}

impl ConvexOracle for IpmOracle
{
    fn solve(&self, prog: &ConvexProgram) -> Result<Solution, PwaError>
    {
        prog.check()?;

        let (n, m, p) = (prog.n_var(), prog.n_ineq(), prog.n_eq());
        if m + p == 0 {
            return Ok(solve_unconstrained(prog));
        }

        // equalities first: A x + s = b with s in {0}^p x R+^m
        let mut a_all = DMatrix::zeros(p + m, n);
        a_all.view_mut((0, 0), (p, n)).copy_from(&prog.eq_lhs);
        a_all.view_mut((p, 0), (m, n)).copy_from(&prog.ineq_lhs);
        let b_all: Vec<f64> = prog.eq_rhs.iter().chain(prog.ineq_rhs.iter()).copied().collect();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if p > 0 {
            cones.push(ZeroConeT(p));
        }
        if m > 0 {
            cones.push(NonnegativeConeT(m));
        }

        let p_csc = match &prog.hessian {
            Some(h) => self.to_csc(h, true),
            None => CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new()),
        };
        let a_csc = self.to_csc(&a_all, false);
        let q: Vec<f64> = prog.cost.iter().copied().collect();

        let mut solver = DefaultSolver::new(&p_csc, &q, &a_csc, &b_all, &cones, self.settings()?);
        solver.solve();
        let sol = &solver.solution;

        let status = match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => SolveStatus::Infeasible,
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => SolveStatus::Unbounded,
            _ => SolveStatus::Failed,
        };
        log::trace!("clarabel {:?} after {} iterations", sol.status, sol.iterations);

        if status != SolveStatus::Optimal {
            log::debug!("oracle: {:?} ({} vars, {} ineqs, {} eqs)", status, n, m, p);
            return Ok(Solution::unavailable(status, n));
        }

        let argmin = DVector::from_column_slice(&sol.x);
        let rslt = Solution::optimal(prog, argmin);
        if prog.hessian.is_none() {
            let mult = DVector::from_column_slice(&sol.z[p..]);
            Ok(rslt.with_lp_duals(prog, mult, self.par.eps_active))
        }
        else {
            Ok(rslt)
        }
    }
}
