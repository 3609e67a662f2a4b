//! Maximal output admissible set
//!
//! <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
//! <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
//!
//! For \\(x_{k+1} = A x_k\\) and constraints \\(x_k \in X = \lbrace x \mid D x \preceq d \rbrace\\),
//! the MOAS is the set of initial states whose whole trajectory stays in \\(X\\).
//! Following Gilbert and Tan, it equals
//! \\(\lbrace x \mid D A^k x \preceq d,\ k = 0, \ldots, t \rbrace\\)
//! for the smallest determinedness index \\(t\\) at which the next block is redundant.

use nalgebra::DMatrix;
use crate::PwaError;
use crate::linalg_ex::{spectral_radius, block_diag, vcat};
use crate::oracle::{ConvexOracle, SolveStatus};
use crate::polytope::{Polytope, expect_optimal};

//

/// Parameters of [`Moas`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoasParam
{
    /// The stack is complete once every next-step facet is violated by less than this.
    pub eps_conv: f64,
    /// Max determinedness index tried.
    pub max_index: usize,
}

impl Default for MoasParam
{
    fn default() -> Self
    {
        MoasParam {
            eps_conv: 1e-6,
            max_index: 100,
        }
    }
}

/// Result of [`Moas::compute`].
#[derive(Debug, Clone)]
pub struct MoasOutcome
{
    /// The invariant set, with minimal facets.
    pub set: Polytope,
    /// Determinedness index \\(t\\).
    pub determinedness_index: usize,
}

/// Maximal output admissible set computation.
#[derive(Debug, Clone, Default)]
pub struct Moas
{
    /// parameters.
    pub par: MoasParam,
}

impl Moas
{
    /// Creates an instance with default parameters.
    pub fn new() -> Self
    {
        Moas::default()
    }

    /// Changes parameters by a function.
    ///
    /// * `f` takes a mutable reference of the parameters.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut MoasParam)
    {
        f(&mut self.par);
        self
    }

    /// MOAS of \\(x_{k+1} = A x_k\\) within `x_set`.
    ///
    /// At index \\(t\\), one LP per facet \\(i\\) of \\(X\\) maximizes \\(D_i A^{t+1} x\\)
    /// over the current stack; the stack is complete when no maximum exceeds \\(d_i\\).
    ///
    /// Returns
    /// * [`PwaError::UnstableSystem`] if the spectral radius of \\(A\\) is not below one,
    /// * [`PwaError::EmptySet`] if `x_set` (or the stack) is empty,
    /// * [`PwaError::NotConverged`] if \\(t\\) reaches `max_index`.
    pub fn compute<O: ConvexOracle>(&self, oracle: &O, a: &DMatrix<f64>, x_set: &Polytope) -> Result<MoasOutcome, PwaError>
    {
        let n_x = a.nrows();
        PwaError::check_dim("A", (n_x, n_x), a.shape())?;
        PwaError::check_dim("X", (x_set.n_facets(), n_x), x_set.lhs().shape())?;

        let rho = spectral_radius(a);
        if rho >= 1. {
            log::error!("MOAS: spectral radius {:.3e}", rho);
            return Err(PwaError::UnstableSystem(rho));
        }

        let x_min = x_set.minimal(oracle)?;
        let (d, rhs) = (x_min.lhs(), x_min.rhs());
        let n_c = d.nrows();
        log::info!("MOAS: started with {} facets", n_c);

        let mut stack = x_min.clone();
        let mut d_pow = d * a;
        for t in 0.. self.par.max_index {
            // d_pow = D A^{t+1}, stack = {D A^k x <= d, k <= t}
            let mut worst = f64::NEG_INFINITY;
            for i in 0.. n_c {
                let j = d_pow.row(i).transpose();
                let sol = oracle.solve_lp(&(-&j), stack.lhs(), stack.rhs(), None)?;
                let violation = match sol.status {
                    SolveStatus::Unbounded => f64::INFINITY,
                    SolveStatus::Infeasible => return Err(PwaError::EmptySet),
                    _ => -expect_optimal(sol, "MOAS facet")?.value - rhs[i],
                };
                log::trace!("MOAS: t {} facet {} violation {:.3e}", t, i, violation);
                worst = worst.max(violation);
            }

            log::debug!("MOAS: t {} violation {:.3e} facets {}", t, worst, stack.n_facets());
            if worst < self.par.eps_conv {
                let set = stack.minimal(oracle)?;
                log::info!("MOAS: converged at t {} with {} facets", t, set.n_facets());
                return Ok(MoasOutcome {set, determinedness_index: t});
            }

            stack.add_facets(&d_pow, rhs)?;
            d_pow = &d_pow * a;
        }

        log::warn!("MOAS: no convergence within index {}", self.par.max_index);
        Err(PwaError::NotConverged(self.par.max_index))
    }

    /// MOAS of the closed loop \\(u = K x\\) for \\(x_{k+1} = A x_k + B u_k\\)
    /// with joint constraints \\((x, u) \in D\\).
    ///
    /// Uses \\(A_{cl} = A + B K\\) and \\(X = \lbrace x \mid (D_x + D_u K) x \preceq d \rbrace\\).
    pub fn compute_closed_loop<O: ConvexOracle>(&self, oracle: &O, a: &DMatrix<f64>, b: &DMatrix<f64>, k: &DMatrix<f64>, domain: &Polytope) -> Result<MoasOutcome, PwaError>
    {
        let (n_x, n_u) = (a.nrows(), b.ncols());
        PwaError::check_dim("B", (n_x, n_u), b.shape())?;
        PwaError::check_dim("K", (n_u, n_x), k.shape())?;
        PwaError::check_dim("D", (domain.n_facets(), n_x + n_u), domain.lhs().shape())?;

        let a_cl = a + b * k;
        let lhs = domain.lhs().columns(0, n_x) + domain.lhs().columns(n_x, n_u) * k;
        let x_cl = Polytope::new(lhs, domain.rhs().clone())?;

        self.compute(oracle, &a_cl, &x_cl)
    }

    /// [`Moas::compute_closed_loop`] with \\(D = X \times U\\).
    pub fn compute_closed_loop_orthogonal<O: ConvexOracle>(&self, oracle: &O, a: &DMatrix<f64>, b: &DMatrix<f64>, k: &DMatrix<f64>, x_set: &Polytope, u_set: &Polytope) -> Result<MoasOutcome, PwaError>
    {
        let domain = Polytope::new(
            block_diag(x_set.lhs(), u_set.lhs()),
            vcat(&[x_set.rhs(), u_set.rhs()]),
        )?;
        self.compute_closed_loop(oracle, a, b, k, &domain)
    }
}

/// Facets of the stack \\(D A^k x \preceq d\\) for \\(k = 0, \ldots, t\\).
pub fn moas_stack(a: &DMatrix<f64>, x_set: &Polytope, t: usize) -> Result<Polytope, PwaError>
{
    let mut stack = x_set.clone();
    let mut d_pow = x_set.lhs().clone();
    for _ in 0.. t {
        d_pow = &d_pow * a;
        stack.add_facets(&d_pow, x_set.rhs())?;
    }
    Ok(stack)
}

//

#[test]
fn test_moas_stack()
{
    use nalgebra::DVector;

    let a = DMatrix::from_row_slice(1, 1, &[0.5]);
    let x = Polytope::from_bounds(&DVector::from_vec(vec![-1.]), &DVector::from_vec(vec![1.])).unwrap();

    let s = moas_stack(&a, &x, 2).unwrap();
    assert_eq!(s.n_facets(), 6);
    assert_eq!(s.lhs()[(4, 0)], 0.25);
    assert_eq!(s.rhs()[5], 1.);
}
