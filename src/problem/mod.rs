//! Parametric programs
//!
//! A parametric program is a family of convex programs indexed by the state \\(x\\).
//! Fixing \\(x\\) instantiates a [`ConvexProgram`] which any [`ConvexOracle`] can solve.

use nalgebra::DVector;
use crate::PwaError;
use crate::linalg_ex::{split_stages, has_nan};
use crate::oracle::{ConvexOracle, ConvexProgram, Degeneracy};

mod pqp;
mod plp;
mod region;

pub use pqp::*;
pub use plp::*;
pub use region::*;

//

/// Solution of a parametric program at a fixed state.
///
/// Infeasible or unbounded instances carry NaN in `argmin` and `cost`.
#[derive(Debug, Clone)]
pub struct ParametricSolution
{
    /// Optimal input \\(u^*\\), NaN when unavailable.
    pub argmin: DVector<f64>,
    /// Optimal cost including the state-only terms, NaN when unavailable.
    pub cost: f64,
    /// Tight inequality rows reported by the oracle (LP only).
    pub active_set: Option<Vec<usize>>,
    /// Vertex degeneracy reported by the oracle (LP only).
    pub degeneracy: Option<Degeneracy>,
}

impl ParametricSolution
{
    /// `false` for the NaN sentinel of a non-optimal instance.
    pub fn is_available(&self) -> bool
    {
        !has_nan(&self.argmin) && !self.cost.is_nan()
    }

    /// Splits the input into per-stage inputs of length `stage`.
    ///
    /// Returns [`PwaError::NonIntegerStageCount`] if the length of `argmin` is not a multiple of `stage`.
    pub fn stages(&self, stage: usize) -> Result<Vec<DVector<f64>>, PwaError>
    {
        split_stages(&self.argmin, stage)
    }
}

//

/// Family of convex programs parameterized by the state.
pub trait ParametricProgram
{
    /// Dimension of the state.
    fn n_x(&self) -> usize;

    /// Number of input variables; they come first among the program variables.
    fn n_u(&self) -> usize;

    /// Convex program at the state `x`.
    fn program_at(&self, x: &DVector<f64>) -> Result<ConvexProgram, PwaError>;

    /// Cost terms depending only on `x`, added to the program value.
    fn cost_offset(&self, _x: &DVector<f64>) -> f64
    {
        0.
    }

    /// Solves the program at the state `x`.
    fn solve<O: ConvexOracle>(&self, oracle: &O, x: &DVector<f64>) -> Result<ParametricSolution, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;

        let sol = oracle.solve(&self.program_at(x)?)?;
        if !sol.is_optimal() {
            log::debug!("parametric solve: {:?}", sol.status);
            return Ok(ParametricSolution {
                argmin: DVector::from_element(self.n_u(), f64::NAN),
                cost: f64::NAN,
                active_set: None,
                degeneracy: None,
            });
        }

        Ok(ParametricSolution {
            argmin: sol.argmin.rows(0, self.n_u()).into_owned(),
            cost: sol.value + self.cost_offset(x),
            active_set: sol.active_set,
            degeneracy: sol.degeneracy,
        })
    }
}
