/*!
Explicit model predictive control for piecewise-affine (PWA) systems.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate builds, offline, the ingredients of an explicit MPC law for
\\(x_{k+1} = A_i x_k + B_i u_k + c_i\\) if \\((x_k, u_k) \in D_i\\):

* condensing of the dynamics along a mode sequence - [`dynamics`];
* the parametric QP in the initial state, its solution for a fixed state,
  and the affine law, multipliers, value function and critical region of any active set - [`problem`];
* maximal output admissible sets used as terminal constraints - [`moas`];
* the glue building a condensed MPC problem from a PWA model - [`mpc`].

Optimization problems are never solved here; every LP/QP goes through a [`oracle::ConvexOracle`].
Two are provided:
[`oracle::IpmOracle`] on the `clarabel` interior-point solver, accurate enough to identify active sets,
and [`oracle::FirstOrderOracle`] on the `totsu` first-order conic solver.

# Examples

A scalar pQP
\\[
\begin{array}{ll}
{\rm minimize} & {1 \over 2} u^2 + x u \\\\
{\rm subject \ to} & -1 \le u \le 1,
\end{array}
\\]
whose solution is \\(u^*(x) = -x\\) while \\(|x| \le 1\\):

```
use float_eq::assert_float_eq;
use nalgebra::{DMatrix, DVector};
use pwampc::prelude::*;

let pqp = ParametricQp::new(
    DMatrix::from_element(1, 1, 1.),
    DMatrix::from_element(1, 1, 1.), DMatrix::zeros(1, 1),
    DVector::zeros(1), DVector::zeros(1), 0.,
    DMatrix::from_row_slice(2, 1, &[1., -1.]), DMatrix::zeros(2, 1), DVector::from_vec(vec![1., 1.]),
).unwrap();

let oracle = IpmOracle::new();
let x = DVector::from_vec(vec![0.5]);
let sol = pqp.solve(&oracle, &x).unwrap();
assert_float_eq!(sol.argmin[0], -0.5, abs <= 1e-6);

// unconstrained region: explicit law u = -x
let law = pqp.u_sensitivity(&[]).unwrap();
assert_float_eq!(law.eval(&x)[0], -0.5, abs <= 1e-12);
```
*/

pub mod oracle;
pub mod polytope;
pub mod dynamics;
pub mod problem;
pub mod moas;
pub mod mpc;
pub mod linalg_ex;

mod error;

pub use error::*;

/// Prelude
pub mod prelude
{
    pub use crate::PwaError;
    pub use crate::oracle::{ConvexOracle, ConvexProgram, Solution, SolveStatus, IpmOracle, FirstOrderOracle};
    pub use crate::polytope::Polytope;
    pub use crate::dynamics::{AffineSystem, PwaSystem, ModeSequence, CondensedSystem, Discretization, Dare, condense};
    pub use crate::problem::{ParametricProgram, ParametricQp, ParametricLp, ParametricSolution};
    pub use crate::moas::{Moas, MoasOutcome};
    pub use crate::mpc::{MpcCost, condensed_qp};
}
