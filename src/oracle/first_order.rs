use nalgebra::{DMatrix, DVector};
use totsu::{MatBuild, ProbLP, ProbQP};
use totsu_core::solver::{Solver, SolverError, SolverParam};
use totsu_core::{FloatGeneric, MatType};
use crate::PwaError;
use super::{ConvexOracle, ConvexProgram, Solution, SolveStatus, solve_unconstrained};

type La = FloatGeneric<f64>;
type AMatBuild = MatBuild<La>;
type AProbLP = ProbLP<La>;
type AProbQP = ProbQP<La>;
type ASolver = Solver<La>;

//

/// Parameters of [`FirstOrderOracle`].
#[derive(Debug, Clone)]
pub struct FirstOrderParam
{
    /// Parameters handed to the `totsu` solver.
    pub solver: SolverParam<f64>,
    /// Slack below which an LP inequality is reported active (relative to the right-hand side).
    pub eps_active: f64,
}

impl Default for FirstOrderParam
{
    fn default() -> Self
    {
        FirstOrderParam {
            solver: SolverParam {
                max_iter: Some(100_000),
                ..Default::default()
            },
            eps_active: 1e-4,
        }
    }
}

//

/// Oracle backed by the `totsu` first-order conic solver.
///
/// Pure Rust and dependency-light, but converged only to about `1e-3`;
/// active sets read off its solutions are unreliable near degenerate vertices.
#[derive(Debug, Clone, Default)]
pub struct FirstOrderOracle
{
    /// oracle parameters.
    pub par: FirstOrderParam,
}

impl FirstOrderOracle
{
    /// Creates an instance with default parameters.
    pub fn new() -> Self
    {
        FirstOrderOracle::default()
    }

    /// Changes parameters by a function.
    ///
    /// * `f` takes a mutable reference of the parameters.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut FirstOrderParam)
    {
        f(&mut self.par);
        self
    }

    fn solver(&self) -> ASolver
    {
        let par = self.par.solver.clone();
        ASolver::new().par(|p| {
            *p = par;
        })
    }
}

fn mat_build(m: &DMatrix<f64>) -> AMatBuild
{
    // nalgebra storage is column-major as well
    AMatBuild::new(MatType::General(m.nrows(), m.ncols())).iter_colmaj(m.as_slice())
}

fn vec_build(v: &DVector<f64>) -> AMatBuild
{
    AMatBuild::new(MatType::General(v.len(), 1)).iter_colmaj(v.as_slice())
}

fn sym_build(m: &DMatrix<f64>) -> AMatBuild
{
    let n = m.nrows();
    let mut b = AMatBuild::new(MatType::SymPack(n));
    for c in 0.. n {
        for r in 0..= c {
            b[(r, c)] = 0.5 * (m[(r, c)] + m[(c, r)]);
        }
    }
    b
}

fn status_of(e: SolverError) -> SolveStatus
{
    match e {
        SolverError::Infeasible => SolveStatus::Infeasible,
        SolverError::Unbounded => SolveStatus::Unbounded,
        _ => SolveStatus::Failed,
    }
}

impl ConvexOracle for FirstOrderOracle
{
    fn solve(&self, prog: &ConvexProgram) -> Result<Solution, PwaError>
    {
        prog.check()?;

        let (n, m, p) = (prog.n_var(), prog.n_ineq(), prog.n_eq());
        if m + p == 0 {
            return Ok(solve_unconstrained(prog));
        }

        let s = self.solver();
        let mat_g = mat_build(&prog.ineq_lhs);
        let vec_h = vec_build(&prog.ineq_rhs);
        let mat_a = mat_build(&prog.eq_lhs);
        let vec_b = vec_build(&prog.eq_rhs);
        let vec_c = vec_build(&prog.cost);

        let rslt = match &prog.hessian {
            None => {
                let mut lp = AProbLP::new(vec_c, mat_g, vec_h, mat_a, vec_b);
                s.solve(lp.problem())
                    .map(|(x, y)| (x[0.. n].to_vec(), Some(y[0.. m].to_vec())))
            },
            Some(h) => {
                let mut qp = AProbQP::new(sym_build(h), vec_c, mat_g, vec_h, mat_a, vec_b, s.par.eps_zero);
                s.solve(qp.problem())
                    .map(|(x, _)| (x[0.. n].to_vec(), None))
            },
        };

        match rslt {
            Ok((x, y)) => {
                let sol = Solution::optimal(prog, DVector::from_vec(x));
                match y {
                    Some(y) => Ok(sol.with_lp_duals(prog, DVector::from_vec(y), self.par.eps_active)),
                    None => Ok(sol),
                }
            },
            Err(e) => {
                log::debug!("oracle: {} ({} vars, {} ineqs, {} eqs)", e, n, m, p);
                Ok(Solution::unavailable(status_of(e), n))
            },
        }
    }
}
