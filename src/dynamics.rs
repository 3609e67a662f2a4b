//! Affine and piecewise-affine dynamics
//!
//! <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
//! <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
//!
//! Discrete-time systems \\(x_{k+1} = A_i x_k + B_i u_k + c_i\\) where the mode \\(i\\)
//! is selected by \\((x_k, u_k) \in D_i\\), and their condensing over a horizon.

use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use crate::linalg_ex::{split_stages, stack_stages};
use crate::oracle::{ConvexOracle, inf_norm};
use crate::polytope::Polytope;

//

/// Discretization method of [`AffineSystem::from_continuous`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discretization
{
    /// Exact for inputs held constant over the sampling interval.
    ZeroOrderHold,
    /// First-order forward difference.
    ExplicitEuler,
}

/// Affine system \\(x_{k+1} = A x_k + B u_k + c\\).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "AffineSystemData"))]
pub struct AffineSystem
{
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DVector<f64>,
}

/// Unchecked fields of a deserialized [`AffineSystem`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct AffineSystemData
{
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DVector<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<AffineSystemData> for AffineSystem
{
    type Error = PwaError;

    fn try_from(data: AffineSystemData) -> Result<Self, PwaError>
    {
        AffineSystem::new(data.a, data.b, data.c)
    }
}

impl AffineSystem
{
    /// Creates an affine system.
    ///
    /// Returns [`PwaError::DimensionMismatch`] unless \\(A\\) is square
    /// and \\(B\\), \\(c\\) have as many rows as \\(A\\).
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>, c: DVector<f64>) -> Result<Self, PwaError>
    {
        let n_x = a.nrows();
        PwaError::check_dim("A", (n_x, n_x), a.shape())?;
        PwaError::check_dim("B", (n_x, b.ncols()), b.shape())?;
        PwaError::check_dim("c", (n_x, 1), (c.len(), 1))?;

        Ok(AffineSystem {a, b, c})
    }

    /// Linear system, i.e. \\(c = 0\\).
    pub fn linear(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self, PwaError>
    {
        let c = DVector::zeros(a.nrows());
        AffineSystem::new(a, b, c)
    }

    /// Discretizes \\(\dot x = A x + B u + c\\) with sampling time `h`.
    pub fn from_continuous(a: &DMatrix<f64>, b: &DMatrix<f64>, c: &DVector<f64>, h: f64, method: Discretization) -> Result<Self, PwaError>
    {
        let cont = AffineSystem::new(a.clone(), b.clone(), c.clone())?;
        let (n_x, n_u) = (cont.n_x(), cont.n_u());

        match method {
            Discretization::ZeroOrderHold => {
                // exp of [[A, B, c], [0, 0, 0]] * h
                let n = n_x + n_u + 1;
                let mut m = DMatrix::zeros(n, n);
                m.view_mut((0, 0), (n_x, n_x)).copy_from(a);
                m.view_mut((0, n_x), (n_x, n_u)).copy_from(b);
                m.view_mut((0, n_x + n_u), (n_x, 1)).copy_from(c);
                let e = (m * h).exp();

                AffineSystem::new(
                    e.view((0, 0), (n_x, n_x)).into_owned(),
                    e.view((0, n_x), (n_x, n_u)).into_owned(),
                    e.view((0, n_x + n_u), (n_x, 1)).column(0).into_owned(),
                )
            },
            Discretization::ExplicitEuler => {
                AffineSystem::new(
                    DMatrix::identity(n_x, n_x) + a * h,
                    b * h,
                    c * h,
                )
            },
        }
    }

    /// Number of states.
    pub fn n_x(&self) -> usize
    {
        self.a.nrows()
    }

    /// Number of inputs.
    pub fn n_u(&self) -> usize
    {
        self.b.ncols()
    }

    /// \\(A\\).
    pub fn a(&self) -> &DMatrix<f64>
    {
        &self.a
    }

    /// \\(B\\).
    pub fn b(&self) -> &DMatrix<f64>
    {
        &self.b
    }

    /// \\(c\\).
    pub fn c(&self) -> &DVector<f64>
    {
        &self.c
    }

    /// One step of the dynamics.
    pub fn step(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>
    {
        &self.a * x + &self.b * u + &self.c
    }

    /// Condensed dynamics over `n` steps of this system.
    pub fn condense(&self, n: usize) -> Result<CondensedSystem, PwaError>
    {
        condense(core::slice::from_ref(self), &ModeSequence::uniform(0, n))
    }

    /// State trajectory \\(x_0, \ldots, x_N\\) for inputs \\(u_0, \ldots, u_{N-1}\\).
    pub fn simulate(&self, x0: &DVector<f64>, us: &[DVector<f64>]) -> Result<Vec<DVector<f64>>, PwaError>
    {
        self.condense(us.len())?.simulate(x0, us)
    }
}

//

/// Mode sequence \\(z(0), \ldots, z(N-1)\\), one mode index per step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeSequence(Vec<usize>);

impl ModeSequence
{
    /// Creates a sequence from mode indices, step 0 first.
    pub fn new(modes: Vec<usize>) -> Self
    {
        ModeSequence(modes)
    }

    /// The same mode at each of `len` steps.
    pub fn uniform(mode: usize, len: usize) -> Self
    {
        ModeSequence(vec![mode; len])
    }

    /// Horizon length.
    pub fn len(&self) -> usize
    {
        self.0.len()
    }

    /// `true` for a zero-step horizon.
    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }

    /// Mode indices per step.
    pub fn as_slice(&self) -> &[usize]
    {
        &self.0
    }

    /// Returns [`PwaError::UnknownMode`] at the first index not below `n_modes`.
    pub fn validate(&self, n_modes: usize) -> Result<(), PwaError>
    {
        match self.0.iter().find(|&&m| m >= n_modes) {
            Some(&mode) => {
                log::error!("mode {} out of {} modes", mode, n_modes);
                Err(PwaError::UnknownMode {mode, n_modes})
            },
            None => Ok(()),
        }
    }
}

impl From<Vec<usize>> for ModeSequence
{
    fn from(modes: Vec<usize>) -> Self
    {
        ModeSequence(modes)
    }
}

//

/// Condensed dynamics
///
/// \\[
/// \bar x = \bar A x_0 + \bar B \bar u + \bar c,
/// \\]
/// where \\(\bar x = (x_0, \ldots, x_N)\\) and \\(\bar u = (u_0, \ldots, u_{N-1})\\).
#[derive(Debug, Clone, PartialEq)]
pub struct CondensedSystem
{
    /// \\(\bar A\\), \\(n_x (N+1) \times n_x\\).
    pub a_bar: DMatrix<f64>,
    /// \\(\bar B\\), \\(n_x (N+1) \times n_u N\\).
    pub b_bar: DMatrix<f64>,
    /// \\(\bar c\\), \\(n_x (N+1)\\).
    pub c_bar: DVector<f64>,
    n_x: usize,
    n_u: usize,
}

impl CondensedSystem
{
    /// State dimension \\(n_x\\).
    pub fn n_x(&self) -> usize
    {
        self.n_x
    }

    /// Input dimension \\(n_u\\) of a single step.
    pub fn n_u(&self) -> usize
    {
        self.n_u
    }

    /// Horizon length \\(N\\).
    pub fn horizon(&self) -> usize
    {
        (self.a_bar.nrows() / self.n_x.max(1)).saturating_sub(1)
    }

    /// Row block `k` of \\((\bar A, \bar B, \bar c)\\), mapping to \\(x_k\\).
    pub fn block(&self, k: usize) -> (DMatrix<f64>, DMatrix<f64>, DVector<f64>)
    {
        let n_x = self.n_x;
        (
            self.a_bar.rows(k * n_x, n_x).into_owned(),
            self.b_bar.rows(k * n_x, n_x).into_owned(),
            self.c_bar.rows(k * n_x, n_x).into_owned(),
        )
    }

    /// Stacked trajectory \\(\bar x\\) for a stacked input \\(\bar u\\).
    pub fn trajectory(&self, x0: &DVector<f64>, u_bar: &DVector<f64>) -> Result<DVector<f64>, PwaError>
    {
        PwaError::check_dim("x0", (self.n_x, 1), (x0.len(), 1))?;
        PwaError::check_dim("u_bar", (self.b_bar.ncols(), 1), (u_bar.len(), 1))?;

        Ok(&self.a_bar * x0 + &self.b_bar * u_bar + &self.c_bar)
    }

    /// State trajectory \\(x_0, \ldots, x_N\\) for per-step inputs.
    pub fn simulate(&self, x0: &DVector<f64>, us: &[DVector<f64>]) -> Result<Vec<DVector<f64>>, PwaError>
    {
        PwaError::check_dim("inputs", (self.horizon(), 1), (us.len(), 1))?;
        for u in us {
            PwaError::check_dim("u", (self.n_u, 1), (u.len(), 1))?;
        }

        let x_bar = self.trajectory(x0, &stack_stages(us))?;
        split_stages(&x_bar, self.n_x)
    }
}

/// Condenses the dynamics of `systems` along the mode sequence `seq`.
///
/// Block \\(k+1\\) is obtained from block \\(k\\) by one step of mode \\(z(k)\\):
/// \\(\bar A_{k+1} = A \bar A_k\\), \\(\bar B_{k+1} = A \bar B_k + [0 \cdots B \cdots 0]\\),
/// \\(\bar c_{k+1} = A \bar c_k + c\\).
///
/// All systems shall share \\(n_x\\) and \\(n_u\\); this and the mode indices
/// are checked before anything is computed.
pub fn condense(systems: &[AffineSystem], seq: &ModeSequence) -> Result<CondensedSystem, PwaError>
{
    let first = systems.first().ok_or_else(|| {
        log::error!("condense: no system");
        PwaError::UnknownMode {mode: seq.as_slice().first().copied().unwrap_or(0), n_modes: 0}
    })?;
    let (n_x, n_u) = (first.n_x(), first.n_u());
    for s in systems.iter() {
        PwaError::check_dim("A", (n_x, n_x), s.a.shape())?;
        PwaError::check_dim("B", (n_x, n_u), s.b.shape())?;
    }
    seq.validate(systems.len())?;

    let n = seq.len();
    let mut a_bar = DMatrix::zeros(n_x * (n + 1), n_x);
    let mut b_bar = DMatrix::zeros(n_x * (n + 1), n_u * n);
    let mut c_bar = DVector::zeros(n_x * (n + 1));
    a_bar.view_mut((0, 0), (n_x, n_x)).fill_with_identity();

    for (k, &mode) in seq.as_slice().iter().enumerate() {
        let s = &systems[mode];
        let (r0, r1) = (k * n_x, (k + 1) * n_x);

        let a_next = &s.a * a_bar.rows(r0, n_x);
        a_bar.rows_mut(r1, n_x).copy_from(&a_next);

        let b_next = &s.a * b_bar.view((r0, 0), (n_x, n_u * k));
        b_bar.view_mut((r1, 0), (n_x, n_u * k)).copy_from(&b_next);
        b_bar.view_mut((r1, n_u * k), (n_x, n_u)).copy_from(&s.b);

        let c_next = &s.a * c_bar.rows(r0, n_x) + &s.c;
        c_bar.rows_mut(r1, n_x).copy_from(&c_next);
    }

    log::debug!("condense: n_x {} n_u {} horizon {}", n_x, n_u, n);
    Ok(CondensedSystem {a_bar, b_bar, c_bar, n_x, n_u})
}

//

/// Piecewise-affine system
///
/// Mode \\(i\\) applies when \\((x, u) \in D_i\\), with \\(D_i\\) a polytope
/// in the joint state-input space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PwaSystemData"))]
pub struct PwaSystem
{
    systems: Vec<AffineSystem>,
    domains: Vec<Polytope>,
}

/// Unchecked fields of a deserialized [`PwaSystem`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PwaSystemData
{
    systems: Vec<AffineSystem>,
    domains: Vec<Polytope>,
}

#[cfg(feature = "serde")]
impl TryFrom<PwaSystemData> for PwaSystem
{
    type Error = PwaError;

    fn try_from(data: PwaSystemData) -> Result<Self, PwaError>
    {
        PwaSystem::new(data.systems, data.domains)
    }
}

impl PwaSystem
{
    /// Pairs affine systems with their domains.
    ///
    /// Returns [`PwaError::DimensionMismatch`] unless there is at least one mode,
    /// as many domains as systems, all systems share \\(n_x, n_u\\),
    /// and all domains live in \\(\mathbb{R}^{n_x + n_u}\\).
    pub fn new(systems: Vec<AffineSystem>, domains: Vec<Polytope>) -> Result<Self, PwaError>
    {
        PwaError::check_dim("domains", (systems.len(), 1), (domains.len(), 1))?;
        let first = systems.first().ok_or_else(|| {
            log::error!("PwaSystem: no mode");
            PwaError::DimensionMismatch {what: "systems", expected: (1, 1), found: (0, 1)}
        })?;

        let (n_x, n_u) = (first.n_x(), first.n_u());
        for (s, d) in systems.iter().zip(domains.iter()) {
            PwaError::check_dim("B", (n_x, n_u), s.b.shape())?;
            PwaError::check_dim("domain", (d.n_facets(), n_x + n_u), d.lhs().shape())?;
        }

        Ok(PwaSystem {systems, domains})
    }

    /// Builds \\(D_i = X_i \times U_i\\) from separate state and input domains.
    pub fn from_orthogonal_domains(systems: Vec<AffineSystem>, state_domains: &[Polytope], input_domains: &[Polytope]) -> Result<Self, PwaError>
    {
        PwaError::check_dim("input domains", (state_domains.len(), 1), (input_domains.len(), 1))?;

        let domains = state_domains.iter()
            .zip(input_domains.iter())
            .map(|(x, u)| x.cartesian_product(u))
            .collect();
        PwaSystem::new(systems, domains)
    }

    /// State dimension, shared by all modes.
    pub fn n_x(&self) -> usize
    {
        self.systems[0].n_x()
    }

    /// Input dimension, shared by all modes.
    pub fn n_u(&self) -> usize
    {
        self.systems[0].n_u()
    }

    /// Number of modes.
    pub fn n_modes(&self) -> usize
    {
        self.systems.len()
    }

    /// Affine systems, indexed by mode.
    pub fn systems(&self) -> &[AffineSystem]
    {
        &self.systems
    }

    /// Domains \\(D_i\\), indexed by mode.
    pub fn domains(&self) -> &[Polytope]
    {
        &self.domains
    }

    /// Affine system and domain of mode `i`.
    pub fn mode(&self, i: usize) -> Result<(&AffineSystem, &Polytope), PwaError>
    {
        match (self.systems.get(i), self.domains.get(i)) {
            (Some(s), Some(d)) => Ok((s, d)),
            _ => Err(PwaError::UnknownMode {mode: i, n_modes: self.n_modes()}),
        }
    }

    /// Index of the unique domain containing \\((x, u)\\).
    ///
    /// Returns [`PwaError::InfeasibleTransition`] when no domain or more than one contains it.
    pub fn find_domain(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<usize, PwaError>
    {
        self.lookup(x, u, 0)
    }

    fn lookup(&self, x: &DVector<f64>, u: &DVector<f64>, step: usize) -> Result<usize, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;
        PwaError::check_dim("u", (self.n_u(), 1), (u.len(), 1))?;

        let xu = stack_stages(&[x.clone(), u.clone()]);
        let candidates: Vec<usize> = self.domains.iter()
            .enumerate()
            .filter(|(_, d)| d.contains(&xu, 0.))
            .map(|(i, _)| i)
            .collect();

        if candidates.len() == 1 {
            Ok(candidates[0])
        }
        else {
            log::debug!("step {}: (x, u) in domains {:?}", step, candidates);
            Err(PwaError::InfeasibleTransition {step, candidates})
        }
    }

    /// State trajectory and realized mode sequence for per-step inputs.
    pub fn simulate(&self, x0: &DVector<f64>, us: &[DVector<f64>]) -> Result<(Vec<DVector<f64>>, ModeSequence), PwaError>
    {
        let mut xs = vec![x0.clone()];
        let mut modes = Vec::with_capacity(us.len());

        for (k, u) in us.iter().enumerate() {
            let mode = self.lookup(&xs[k], u, k)?;
            let x_next = self.systems[mode].step(&xs[k], u);
            xs.push(x_next);
            modes.push(mode);
        }
        Ok((xs, ModeSequence(modes)))
    }

    /// Condensed dynamics along a mode sequence.
    pub fn condense(&self, seq: &ModeSequence) -> Result<CondensedSystem, PwaError>
    {
        condense(&self.systems, seq)
    }

    /// Elementwise bounds of the state over the union of the domains.
    ///
    /// Empty domains are skipped; [`PwaError::EmptySet`] if all are empty.
    pub fn state_bounds<O: ConvexOracle>(&self, oracle: &O) -> Result<(DVector<f64>, DVector<f64>), PwaError>
    {
        let n_x = self.n_x();
        let mut bounds: Option<(DVector<f64>, DVector<f64>)> = None;

        for (i, d) in self.domains.iter().enumerate() {
            let (lb, ub) = match d.bounding_box(oracle) {
                Ok(b) => b,
                Err(PwaError::EmptySet) => {
                    log::warn!("state_bounds: domain {} is empty", i);
                    continue;
                },
                Err(e) => return Err(e),
            };
            let (lb, ub) = (lb.rows(0, n_x).into_owned(), ub.rows(0, n_x).into_owned());

            bounds = Some(match bounds {
                None => (lb, ub),
                Some((l, u)) => (l.inf(&lb), u.sup(&ub)),
            });
        }
        bounds.ok_or(PwaError::EmptySet)
    }
}

//

/// Parameters of [`Dare`].
#[derive(Debug, Clone, PartialEq)]
pub struct DareParam
{
    /// Tolerance of the change of the cost-to-go matrix between iterations, relative to its magnitude.
    pub eps: f64,
    /// Max iteration number.
    pub max_iter: usize,
}

impl Default for DareParam
{
    fn default() -> Self
    {
        DareParam {
            eps: 1e-10,
            max_iter: 10_000,
        }
    }
}

/// Discrete algebraic Riccati equation solver by value iteration.
///
/// Iterates
/// \\[
/// P \leftarrow A^T P A - A^T P B (B^T P B + R)^{-1} B^T P A + Q
/// \\]
/// from \\(P = Q\\) and returns \\(P\\) with the LQR gain
/// \\(K = -(B^T P B + R)^{-1} B^T P A\\).
#[derive(Debug, Clone, Default)]
pub struct Dare
{
    /// solver parameters.
    pub par: DareParam,
}

impl Dare
{
    /// Creates an instance with default parameters.
    pub fn new() -> Self
    {
        Dare::default()
    }

    /// Changes parameters by a function.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut DareParam)
    {
        f(&mut self.par);
        self
    }

    /// Solves for \\((P, K)\\).
    ///
    /// Returns [`PwaError::NotStrictlyConvex`] if \\(B^T P B + R\\) loses positive definiteness
    /// and [`PwaError::NotConverged`] beyond `max_iter` iterations.
    pub fn solve(&self, a: &DMatrix<f64>, b: &DMatrix<f64>, q: &DMatrix<f64>, r: &DMatrix<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>), PwaError>
    {
        let (n_x, n_u) = (a.nrows(), b.ncols());
        PwaError::check_dim("A", (n_x, n_x), a.shape())?;
        PwaError::check_dim("B", (n_x, n_u), b.shape())?;
        PwaError::check_dim("Q", (n_x, n_x), q.shape())?;
        PwaError::check_dim("R", (n_u, n_u), r.shape())?;

        let gain = |p: &DMatrix<f64>| -> Result<DMatrix<f64>, PwaError> {
            let btp = b.transpose() * p;
            let chol = (&btp * b + r).cholesky().ok_or(PwaError::NotStrictlyConvex)?;
            Ok(-chol.solve(&(btp * a)))
        };

        let mut p = q.clone();
        for i in 0.. self.par.max_iter {
            let k = gain(&p)?;
            // A'P(A + BK) + Q equals the Riccati update at the current gain
            let p_next = a.transpose() * &p * (a + b * &k) + q;
            let p_next = (&p_next + p_next.transpose()) * 0.5;

            let diff = inf_norm((&p_next - &p).as_slice());
            p = p_next;
            if diff <= self.par.eps * (1. + inf_norm(p.as_slice())) {
                log::debug!("dare: converged in {} iterations", i + 1);
                let k = gain(&p)?;
                return Ok((p, k));
            }
        }

        log::warn!("dare: no convergence in {} iterations", self.par.max_iter);
        Err(PwaError::NotConverged(self.par.max_iter))
    }
}

//

#[test]
fn test_condense_blocks()
{
    let s = AffineSystem::new(
        DMatrix::from_row_slice(1, 1, &[2.]),
        DMatrix::from_row_slice(1, 1, &[1.]),
        DVector::from_vec(vec![1.]),
    ).unwrap();
    let cs = s.condense(2).unwrap();

    // x1 = 2 x0 + u0 + 1, x2 = 4 x0 + 2 u0 + u1 + 3
    assert_eq!(cs.a_bar, DMatrix::from_row_slice(3, 1, &[1., 2., 4.]));
    assert_eq!(cs.b_bar, DMatrix::from_row_slice(3, 2, &[0., 0., 1., 0., 2., 1.]));
    assert_eq!(cs.c_bar, DVector::from_vec(vec![0., 1., 3.]));
    assert_eq!(cs.horizon(), 2);
}

#[test]
fn test_mode_validate()
{
    let seq = ModeSequence::new(vec![0, 2, 1]);
    assert!(seq.validate(3).is_ok());
    assert_eq!(seq.validate(2), Err(PwaError::UnknownMode {mode: 2, n_modes: 2}));
}
