use nalgebra::{DMatrix, DVector};
use crate::polytope::Polytope;

//

/// Affine map \\(x \mapsto L x + o\\).
#[derive(Debug, Clone, PartialEq)]
pub struct AffineLaw
{
    /// \\(L\\).
    pub lin: DMatrix<f64>,
    /// \\(o\\).
    pub off: DVector<f64>,
}

impl AffineLaw
{
    /// \\(L x + o\\).
    pub fn eval(&self, x: &DVector<f64>) -> DVector<f64>
    {
        &self.lin * x + &self.off
    }
}

/// Explicit primal and dual solution of the pQP on an active set.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensitivity
{
    /// Active rows kept after rank cleaning, in the order given.
    pub rows: Vec<usize>,
    /// \\(z(x)\\) of the shifted variable.
    pub z: AffineLaw,
    /// Multipliers \\(\lambda(x)\\) of `rows`.
    pub lambda: AffineLaw,
}

//

/// Quadratic function \\(V(x) = {1 \over 2} x^T V_q x + V_l^T x + V_o\\).
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticValue
{
    /// \\(V_q\\).
    pub quadratic: DMatrix<f64>,
    /// \\(V_l\\).
    pub linear: DVector<f64>,
    /// \\(V_o\\).
    pub offset: f64,
}

impl QuadraticValue
{
    /// Value at `x`.
    pub fn eval(&self, x: &DVector<f64>) -> f64
    {
        0.5 * x.dot(&(&self.quadratic * x)) + self.linear.dot(x) + self.offset
    }

    /// Gradient \\(V_q x + V_l\\).
    pub fn gradient(&self, x: &DVector<f64>) -> DVector<f64>
    {
        &self.quadratic * x + &self.linear
    }

    /// Tangent plane at `x`.
    pub fn tangent(&self, x: &DVector<f64>) -> TangentPlane
    {
        TangentPlane {
            gradient: self.gradient(x),
            offset: -0.5 * x.dot(&(&self.quadratic * x)) + self.offset,
        }
    }
}

/// Affine function \\(y \mapsto g^T y + b\\) touching a value function at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct TangentPlane
{
    /// \\(g\\).
    pub gradient: DVector<f64>,
    /// \\(b\\).
    pub offset: f64,
}

impl TangentPlane
{
    /// \\(g^T y + b\\).
    pub fn eval(&self, y: &DVector<f64>) -> f64
    {
        self.gradient.dot(y) + self.offset
    }
}

//

/// Critical region of an active set: where its explicit law is optimal.
#[derive(Debug, Clone)]
pub struct CriticalRegion
{
    /// Primal and dual laws.
    pub sensitivity: Sensitivity,
    /// Input law \\(u(x)\\).
    pub u: AffineLaw,
    /// Optimal value function.
    pub value: QuadraticValue,
    /// States where the inactive rows hold and the multipliers are nonnegative.
    ///
    /// Not reduced to minimal facets; possibly empty or lower-dimensional.
    pub polytope: Polytope,
}

impl CriticalRegion
{
    /// Membership of `x` with tolerance `tol`.
    pub fn contains(&self, x: &DVector<f64>, tol: f64) -> bool
    {
        self.polytope.contains(x, tol)
    }
}
