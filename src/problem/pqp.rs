use std::sync::OnceLock;
use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use crate::linalg_ex::{hstack, vstack, vcat, independent_rows, stack_stages};
use crate::oracle::{ConvexOracle, ConvexProgram, inf_norm};
use crate::polytope::Polytope;
use super::{ParametricProgram, AffineLaw, Sensitivity, QuadraticValue, TangentPlane, CriticalRegion};

//

/// Parameters of [`ParametricQp`].
#[derive(Debug, Clone, PartialEq)]
pub struct PqpParam
{
    /// A row is active when its residual exceeds `-eps_active`.
    pub eps_active: f64,
    /// Relative residual below which an active row is dependent on the preceding ones.
    pub eps_rank: f64,
}

impl Default for PqpParam
{
    fn default() -> Self
    {
        PqpParam {
            eps_active: 1e-6,
            eps_rank: 1e-9,
        }
    }
}

//

/// Parametric quadratic program
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & {1 \over 2} u^T F_{uu} u + x^T F_{xu} u + F_u^T u
///   + {1 \over 2} x^T F_{xx} x + F_x^T x + F \\\\
/// {\rm subject \ to} & C_u u \preceq C_x x + C,
/// \end{array}
/// \\]
/// with variables \\(u \in \mathbb{R}^{n_u}\\) and parameter \\(x \in \mathbb{R}^{n_x}\\).
///
/// The linear terms in \\(u\\) are removed by
/// \\(z = u + H^{-1} (F_{xu}^T x + F_u)\\) with \\(H = F_{uu}\\), giving
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & {1 \over 2} z^T H z + {1 \over 2} x^T F_{xx}^q x + {F_x^q}^T x + F^q \\\\
/// {\rm subject \ to} & G z \preceq W + S x,
/// \end{array}
/// \\]
/// where
/// - \\(F_{xx}^q = F_{xx} - F_{xu} H^{-1} F_{xu}^T\\),
///   \\(F_x^q = F_x - F_{xu} H^{-1} F_u\\),
///   \\(F^q = F - {1 \over 2} F_u^T H^{-1} F_u\\)
/// - \\(G = C_u\\), \\(S = C_x + C_u H^{-1} F_{xu}^T\\), \\(W = C + C_u H^{-1} F_u\\).
///
/// The explicit laws on a fixed active set are derived from this form.
#[derive(Debug)]
pub struct ParametricQp
{
    /// parameters.
    pub par: PqpParam,

    f_uu: DMatrix<f64>,
    f_xu: DMatrix<f64>,
    f_xx: DMatrix<f64>,
    f_u: DVector<f64>,
    f_x: DVector<f64>,
    f: f64,
    c_u: DMatrix<f64>,
    c_x: DMatrix<f64>,
    c: DVector<f64>,

    h_inv: DMatrix<f64>,
    s: DMatrix<f64>,
    w: DVector<f64>,
    f_xx_q: DMatrix<f64>,
    f_x_q: DVector<f64>,
    f_q: f64,

    feasible_set: OnceLock<Option<Polytope>>,
}

/// Solution of [`ParametricQp::solve_free_x`].
#[derive(Debug, Clone)]
pub struct FreeStateSolution
{
    /// \\(u^*\\), NaN when unavailable.
    pub u: DVector<f64>,
    /// \\(x^*\\), NaN when unavailable.
    pub x: DVector<f64>,
    /// Optimal cost, NaN when unavailable.
    pub cost: f64,
}

impl ParametricQp
{
    /// Creates a pQP from its cost and constraint blocks.
    ///
    /// * `f_xu` is \\(n_x \times n_u\\); \\(n_u\\), \\(n_x\\) and the number of rows
    ///   are taken from `f_uu`, `f_xx` and `c`.
    ///
    /// Returns [`PwaError::DimensionMismatch`] for any inconsistent block and
    /// [`PwaError::NotStrictlyConvex`] unless `f_uu` is symmetric positive definite.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        f_uu: DMatrix<f64>, f_xu: DMatrix<f64>, f_xx: DMatrix<f64>,
        f_u: DVector<f64>, f_x: DVector<f64>, f: f64,
        c_u: DMatrix<f64>, c_x: DMatrix<f64>, c: DVector<f64>) -> Result<Self, PwaError>
    {
        let n_u = f_uu.nrows();
        let n_x = f_xx.nrows();
        let m = c.len();

        PwaError::check_dim("F_uu", (n_u, n_u), f_uu.shape())?;
        PwaError::check_dim("F_xx", (n_x, n_x), f_xx.shape())?;
        PwaError::check_dim("F_xu", (n_x, n_u), f_xu.shape())?;
        PwaError::check_dim("F_u", (n_u, 1), (f_u.len(), 1))?;
        PwaError::check_dim("F_x", (n_x, 1), (f_x.len(), 1))?;
        PwaError::check_dim("C_u", (m, n_u), c_u.shape())?;
        PwaError::check_dim("C_x", (m, n_x), c_x.shape())?;

        let asym = inf_norm((&f_uu - f_uu.transpose()).as_slice());
        if asym > 1e-9 * (1. + inf_norm(f_uu.as_slice())) {
            log::error!("F_uu asymmetric by {:.3e}", asym);
            return Err(PwaError::NotStrictlyConvex);
        }
        let h_inv = match f_uu.clone().cholesky() {
            Some(chol) => chol.inverse(),
            None => {
                log::error!("F_uu not positive definite");
                return Err(PwaError::NotStrictlyConvex);
            },
        };

        let h_inv_f_xu_t = &h_inv * f_xu.transpose();
        let h_inv_f_u = &h_inv * &f_u;

        let f_xx_q = &f_xx - &f_xu * &h_inv_f_xu_t;
        let f_x_q = &f_x - &f_xu * &h_inv_f_u;
        let f_q = f - 0.5 * f_u.dot(&h_inv_f_u);
        let s = &c_x + &c_u * &h_inv_f_xu_t;
        let w = &c + &c_u * &h_inv_f_u;

        log::debug!("pQP: n_u {} n_x {} rows {}", n_u, n_x, m);

        Ok(ParametricQp {
            par: PqpParam::default(),
            f_uu, f_xu, f_xx, f_u, f_x, f,
            c_u, c_x, c,
            h_inv, s, w, f_xx_q, f_x_q, f_q,
            feasible_set: OnceLock::new(),
        })
    }

    /// Changes parameters by a function.
    ///
    /// * `f` takes a mutable reference of the parameters.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut PqpParam)
    {
        f(&mut self.par);
        self
    }

    /// Number of constraint rows.
    pub fn n_rows(&self) -> usize
    {
        self.c.len()
    }

    /// \\(H = F_{uu}\\).
    pub fn hessian(&self) -> &DMatrix<f64>
    {
        &self.f_uu
    }

    /// \\(H^{-1}\\).
    pub fn hessian_inv(&self) -> &DMatrix<f64>
    {
        &self.h_inv
    }

    /// \\((C_u, C_x, C)\\).
    pub fn constraints(&self) -> (&DMatrix<f64>, &DMatrix<f64>, &DVector<f64>)
    {
        (&self.c_u, &self.c_x, &self.c)
    }

    /// \\((G, S, W)\\) of the shifted problem.
    pub fn shifted_constraints(&self) -> (&DMatrix<f64>, &DMatrix<f64>, &DVector<f64>)
    {
        (&self.c_u, &self.s, &self.w)
    }

    /// \\((F_{xx}^q, F_x^q, F^q)\\) of the shifted problem.
    pub fn shifted_cost(&self) -> (&DMatrix<f64>, &DVector<f64>, f64)
    {
        (&self.f_xx_q, &self.f_x_q, self.f_q)
    }

    /// `true` if some input satisfies the constraints at `x`.
    pub fn is_feasible<O: ConvexOracle>(&self, oracle: &O, x: &DVector<f64>) -> Result<bool, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;

        let p = Polytope::new(self.c_u.clone(), &self.c + &self.c_x * x)?;
        Ok(!p.is_empty(oracle)?)
    }

    /// Rows with \\(C_u u - C - C_x x \succ -\epsilon\\), `eps_active` being \\(\epsilon\\).
    ///
    /// `u` is the stacked input; see [`ParametricQp::active_set_stages`] for per-step inputs.
    pub fn active_set(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<Vec<usize>, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;
        PwaError::check_dim("u", (self.n_u(), 1), (u.len(), 1))?;

        let res = &self.c_u * u - &self.c - &self.c_x * x;
        Ok(res.iter()
            .enumerate()
            .filter(|(_, r)| **r > -self.par.eps_active)
            .map(|(i, _)| i)
            .collect())
    }

    /// [`ParametricQp::active_set`] of the inputs \\(u_0, \ldots, u_{N-1}\\) stacked in order.
    pub fn active_set_stages(&self, x: &DVector<f64>, us: &[DVector<f64>]) -> Result<Vec<usize>, PwaError>
    {
        self.active_set(x, &stack_stages(us))
    }

    /// Explicit shifted solution \\(z(x)\\) and multipliers \\(\lambda(x)\\) on an active set.
    ///
    /// Active rows linearly dependent on preceding ones are dropped first.
    /// An empty active set yields the unconstrained solution \\(z = 0\\).
    ///
    /// Returns [`PwaError::ActiveSetOutOfRange`] for an index beyond the rows and
    /// [`PwaError::InvalidActiveSet`] if \\(G_A H^{-1} G_A^T\\) is still singular.
    pub fn z_sensitivity(&self, active: &[usize]) -> Result<Sensitivity, PwaError>
    {
        let (n_u, n_x, m) = (self.n_u(), self.n_x(), self.n_rows());
        if let Some(&index) = active.iter().find(|&&i| i >= m) {
            log::error!("active row {} of {}", index, m);
            return Err(PwaError::ActiveSetOutOfRange {index, n_rows: m});
        }

        let g_a = self.c_u.select_rows(active);
        let rows: Vec<usize> = independent_rows(&g_a, self.par.eps_rank)
            .into_iter()
            .map(|k| active[k])
            .collect();
        if rows.len() < active.len() {
            log::debug!("active set {:?} cleaned to {:?}", active, rows);
        }

        if rows.is_empty() {
            return Ok(Sensitivity {
                rows,
                z: AffineLaw {lin: DMatrix::zeros(n_u, n_x), off: DVector::zeros(n_u)},
                lambda: AffineLaw {lin: DMatrix::zeros(0, n_x), off: DVector::zeros(0)},
            });
        }

        let g_a = self.c_u.select_rows(&rows);
        let s_a = self.s.select_rows(&rows);
        let w_a = self.w.select_rows(&rows);

        let h_inv_g_a_t = &self.h_inv * g_a.transpose();
        let chol = (&g_a * &h_inv_g_a_t).cholesky().ok_or_else(|| {
            log::warn!("singular reduced KKT matrix for {:?}", rows);
            PwaError::InvalidActiveSet(active.to_vec())
        })?;

        let lambda_off = -chol.solve(&w_a);
        let lambda_lin = -chol.solve(&s_a);
        let z_off = -&h_inv_g_a_t * &lambda_off;
        let z_lin = -&h_inv_g_a_t * &lambda_lin;

        Ok(Sensitivity {
            rows,
            z: AffineLaw {lin: z_lin, off: z_off},
            lambda: AffineLaw {lin: lambda_lin, off: lambda_off},
        })
    }

    /// Explicit input law \\(u(x) = z(x) - H^{-1} (F_{xu}^T x + F_u)\\) on an active set.
    pub fn u_sensitivity(&self, active: &[usize]) -> Result<AffineLaw, PwaError>
    {
        let sens = self.z_sensitivity(active)?;
        Ok(self.u_law(&sens.z))
    }

    fn u_law(&self, z: &AffineLaw) -> AffineLaw
    {
        AffineLaw {
            lin: &z.lin - &self.h_inv * self.f_xu.transpose(),
            off: &z.off - &self.h_inv * &self.f_u,
        }
    }

    /// Optimal value function on an active set.
    pub fn value_function(&self, active: &[usize]) -> Result<QuadraticValue, PwaError>
    {
        let sens = self.z_sensitivity(active)?;
        Ok(self.value_of(&sens.z))
    }

    fn value_of(&self, z: &AffineLaw) -> QuadraticValue
    {
        let h = &self.f_uu;
        QuadraticValue {
            quadratic: z.lin.transpose() * h * &z.lin + &self.f_xx_q,
            linear: z.lin.transpose() * h * &z.off + &self.f_x_q,
            offset: self.f_q + 0.5 * z.off.dot(&(h * &z.off)),
        }
    }

    /// Tangent planes of the value function of an active set at each of `xs`.
    pub fn cost_sensitivity(&self, xs: &[DVector<f64>], active: &[usize]) -> Result<Vec<TangentPlane>, PwaError>
    {
        let value = self.value_function(active)?;
        xs.iter()
            .map(|x| {
                PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;
                Ok(value.tangent(x))
            })
            .collect()
    }

    /// Critical region of an active set with its laws.
    ///
    /// The region is the set of \\(x\\) where the rows outside the (cleaned) active set hold,
    /// \\(G_I z(x) \preceq W_I + S_I x\\), and the multipliers are nonnegative, \\(\lambda(x) \succeq 0\\).
    pub fn critical_region(&self, active: &[usize]) -> Result<CriticalRegion, PwaError>
    {
        let sens = self.z_sensitivity(active)?;
        let n_x = self.n_x();

        let inactive: Vec<usize> = (0.. self.n_rows()).filter(|i| !sens.rows.contains(i)).collect();
        let g_i = self.c_u.select_rows(&inactive);
        let primal_lhs = &g_i * &sens.z.lin - self.s.select_rows(&inactive);
        let primal_rhs = self.w.select_rows(&inactive) - &g_i * &sens.z.off;

        let dual_lhs = -&sens.lambda.lin;
        let dual_rhs = sens.lambda.off.clone();

        let polytope = Polytope::new(
            vstack(n_x, &[&primal_lhs, &dual_lhs]),
            vcat(&[&primal_rhs, &dual_rhs]),
        )?;

        Ok(CriticalRegion {
            u: self.u_law(&sens.z),
            value: self.value_of(&sens.z),
            polytope,
            sensitivity: sens,
        })
    }

    /// Set of states for which the pQP is feasible, `None` if empty.
    ///
    /// Projection of \\(\lbrace (x, u) \mid C_u u - C_x x \preceq C \rbrace\\) onto \\(x\\),
    /// computed on the first call and kept afterwards.
    pub fn feasible_set<O: ConvexOracle>(&self, oracle: &O) -> Result<Option<&Polytope>, PwaError>
    {
        if let Some(set) = self.feasible_set.get() {
            return Ok(set.as_ref());
        }

        log::info!("feasible set: projecting {} rows from dimension {}", self.n_rows(), self.n_x() + self.n_u());
        let lhs = hstack(self.n_rows(), &[&(-&self.c_x), &self.c_u]);
        let augmented = Polytope::new(lhs, self.c.clone())?;

        let set = if augmented.is_empty(oracle)? {
            log::info!("feasible set: empty");
            None
        }
        else {
            let p = augmented.project(oracle, self.n_x())?;
            log::info!("feasible set: {} facets", p.n_facets());
            Some(p)
        };

        // a concurrent first write stores an equal value
        let _ = self.feasible_set.set(set);
        Ok(self.feasible_set.get().and_then(|s| s.as_ref()))
    }

    /// Minimizes jointly over \\(u\\) and \\(x\\).
    pub fn solve_free_x<O: ConvexOracle>(&self, oracle: &O) -> Result<FreeStateSolution, PwaError>
    {
        let (n_u, n_x) = (self.n_u(), self.n_x());

        let f_ux = self.f_xu.transpose();
        let hessian = vstack(n_u + n_x, &[
            &hstack(n_u, &[&self.f_uu, &f_ux]),
            &hstack(n_x, &[&self.f_xu, &self.f_xx]),
        ]);
        let cost = vcat(&[&self.f_u, &self.f_x]);
        let lhs = hstack(self.n_rows(), &[&self.c_u, &(-&self.c_x)]);

        let sol = oracle.solve(&ConvexProgram::qp(hessian, cost, lhs, self.c.clone()))?;
        if !sol.is_optimal() {
            log::debug!("solve_free_x: {:?}", sol.status);
        }

        Ok(FreeStateSolution {
            u: sol.argmin.rows(0, n_u).into_owned(),
            x: sol.argmin.rows(n_u, n_x).into_owned(),
            cost: sol.value + self.f,
        })
    }
}

impl ParametricProgram for ParametricQp
{
    fn n_x(&self) -> usize
    {
        self.f_xx.nrows()
    }

    fn n_u(&self) -> usize
    {
        self.f_uu.nrows()
    }

    fn program_at(&self, x: &DVector<f64>) -> Result<ConvexProgram, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;

        Ok(ConvexProgram::qp(
            self.f_uu.clone(),
            self.f_xu.tr_mul(x) + &self.f_u,
            self.c_u.clone(),
            &self.c + &self.c_x * x,
        ))
    }

    fn cost_offset(&self, x: &DVector<f64>) -> f64
    {
        0.5 * x.dot(&(&self.f_xx * x)) + self.f_x.dot(x) + self.f
    }
}

//

#[test]
fn test_reject_indefinite()
{
    let rslt = ParametricQp::new(
        DMatrix::from_row_slice(2, 2, &[1., 0., 0., -1.]),
        DMatrix::zeros(1, 2), DMatrix::zeros(1, 1),
        DVector::zeros(2), DVector::zeros(1), 0.,
        DMatrix::zeros(0, 2), DMatrix::zeros(0, 1), DVector::zeros(0),
    );
    assert_eq!(rslt.err(), Some(PwaError::NotStrictlyConvex));
}

#[test]
fn test_active_set_out_of_range()
{
    let pqp = ParametricQp::new(
        DMatrix::identity(1, 1),
        DMatrix::zeros(1, 1), DMatrix::zeros(1, 1),
        DVector::zeros(1), DVector::zeros(1), 0.,
        DMatrix::from_row_slice(2, 1, &[1., -1.]), DMatrix::zeros(2, 1), DVector::from_vec(vec![1., 1.]),
    ).unwrap();
    assert_eq!(pqp.z_sensitivity(&[2]).err(), Some(PwaError::ActiveSetOutOfRange {index: 2, n_rows: 2}));
}
