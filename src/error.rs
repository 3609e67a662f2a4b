/// Errors of the explicit MPC routines.
#[derive(Debug, Clone, PartialEq)]
pub enum PwaError
{
    /// Structurally incompatible matrices.
    DimensionMismatch {
        /// Which operand was rejected.
        what: &'static str,
        /// Required `(rows, cols)`.
        expected: (usize, usize),
        /// Supplied `(rows, cols)`.
        found: (usize, usize),
    },
    /// Quadratic cost in the input is not symmetric positive definite.
    NotStrictlyConvex,
    /// Flat input length is not a multiple of the stage length.
    NonIntegerStageCount {
        /// Length of the flat input vector.
        len: usize,
        /// Requested length of one stage.
        stage: usize,
    },
    /// Active set refers to a constraint row which does not exist.
    ActiveSetOutOfRange {
        /// Offending row index.
        index: usize,
        /// Number of constraint rows.
        n_rows: usize,
    },
    /// Active set whose reduced KKT matrix stays singular after rank cleaning.
    InvalidActiveSet(Vec<usize>),
    /// Mode index outside of the piecewise-affine system.
    UnknownMode {
        /// Offending mode index.
        mode: usize,
        /// Number of modes.
        n_modes: usize,
    },
    /// State/input pair which does not select exactly one domain.
    InfeasibleTransition {
        /// Time step of the transition.
        step: usize,
        /// Domains containing the pair (empty or more than one).
        candidates: Vec<usize>,
    },
    /// Polytope with no points.
    EmptySet,
    /// State transition matrix with spectral radius not below one.
    UnstableSystem(f64),
    /// Iterative routine exceeded its iteration bound.
    NotConverged(usize),
    /// Failure reported by the convex-solve backend.
    Oracle(String),
}

impl PwaError
{
    pub(crate) fn check_dim(what: &'static str, expected: (usize, usize), found: (usize, usize)) -> Result<(), PwaError>
    {
        if expected == found {
            Ok(())
        }
        else {
            log::error!("{}: size mismatch {:?} != {:?}", what, found, expected);
            Err(PwaError::DimensionMismatch {what, expected, found})
        }
    }
}

impl core::fmt::Display for PwaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            PwaError::DimensionMismatch {what, expected, found} =>
                write!(f, "DimensionMismatch: {} is {:?}, required {:?}", what, found, expected),
            PwaError::NotStrictlyConvex =>
                write!(f, "NotStrictlyConvex: input Hessian is not positive definite"),
            PwaError::NonIntegerStageCount {len, stage} =>
                write!(f, "NonIntegerStageCount: {} inputs do not split into stages of {}", len, stage),
            PwaError::ActiveSetOutOfRange {index, n_rows} =>
                write!(f, "ActiveSetOutOfRange: row {} of {}", index, n_rows),
            PwaError::InvalidActiveSet(rows) =>
                write!(f, "InvalidActiveSet: singular reduced KKT matrix for rows {:?}", rows),
            PwaError::UnknownMode {mode, n_modes} =>
                write!(f, "UnknownMode: mode {} of {}", mode, n_modes),
            PwaError::InfeasibleTransition {step, candidates} =>
                write!(f, "InfeasibleTransition: step {} matches domains {:?}", step, candidates),
            PwaError::EmptySet =>
                write!(f, "EmptySet: polytope has no points"),
            PwaError::UnstableSystem(rho) =>
                write!(f, "UnstableSystem: spectral radius {:.3e} >= 1", rho),
            PwaError::NotConverged(iter) =>
                write!(f, "NotConverged: no convergence within {} iterations", iter),
            PwaError::Oracle(msg) =>
                write!(f, "Oracle: {}", msg),
        }
    }
}

impl std::error::Error for PwaError {}

//

#[test]
fn test_error_display()
{
    let e = PwaError::NonIntegerStageCount {len: 5, stage: 2};
    assert_eq!(format!("{}", e), "NonIntegerStageCount: 5 inputs do not split into stages of 2");

    assert!(PwaError::check_dim("c_x", (3, 2), (3, 2)).is_ok());
    assert_eq!(
        PwaError::check_dim("c_x", (3, 2), (2, 3)),
        Err(PwaError::DimensionMismatch {what: "c_x", expected: (3, 2), found: (2, 3)})
    );
}
