use nalgebra::{DMatrix, DVector};
use crate::PwaError;
use crate::linalg_ex::{hstack, vstack, vcat};
use crate::oracle::ConvexProgram;
use super::ParametricProgram;

//

/// Parametric linear program
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & f^T v \\\\
/// {\rm subject \ to} & A v \preceq B x + c,
/// \end{array}
/// \\]
/// where the leading \\(n_u\\) entries of \\(v\\) are the inputs and the rest are auxiliary.
#[derive(Debug, Clone)]
pub struct ParametricLp
{
    f: DVector<f64>,
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DVector<f64>,
    n_u: usize,
}

impl ParametricLp
{
    /// Creates a pLP whose variables are all inputs.
    pub fn new(f: DVector<f64>, a: DMatrix<f64>, b: DMatrix<f64>, c: DVector<f64>) -> Result<Self, PwaError>
    {
        let (n_v, m) = (f.len(), c.len());
        PwaError::check_dim("A", (m, n_v), a.shape())?;
        PwaError::check_dim("B", (m, b.ncols()), b.shape())?;

        Ok(ParametricLp {f, a, b, c, n_u: n_v})
    }

    /// Reformulates
    /// \\(\min \sum_i |(F_u u + F_x x + F)_i|\\) s.t. \\(C_u u \preceq C_x x + C\\)
    /// with one slack \\(s_i \ge |(F_u u + F_x x + F)_i|\\) per term:
    /// \\[
    /// f = \left[ \begin{array}{c} 0 \\\\ 1 \end{array} \right],\
    /// A = \left[ \begin{array}{cc} C_u & 0 \\\\ F_u & -I \\\\ -F_u & -I \end{array} \right],\
    /// B = \left[ \begin{array}{c} C_x \\\\ -F_x \\\\ F_x \end{array} \right],\
    /// c = \left[ \begin{array}{c} C \\\\ -F \\\\ F \end{array} \right].
    /// \\]
    pub fn from_l1(
        f_u: &DMatrix<f64>, f_x: &DMatrix<f64>, f: &DVector<f64>,
        c_u: &DMatrix<f64>, c_x: &DMatrix<f64>, c: &DVector<f64>) -> Result<Self, PwaError>
    {
        let (n_s, n_u, n_x, m) = (f.len(), f_u.ncols(), f_x.ncols(), c.len());
        PwaError::check_dim("F_u", (n_s, n_u), f_u.shape())?;
        PwaError::check_dim("F_x", (n_s, n_x), f_x.shape())?;
        PwaError::check_dim("C_u", (m, n_u), c_u.shape())?;
        PwaError::check_dim("C_x", (m, n_x), c_x.shape())?;

        let eye = DMatrix::<f64>::identity(n_s, n_s);
        let a = vstack(n_u + n_s, &[
            &hstack(m, &[c_u, &DMatrix::zeros(m, n_s)]),
            &hstack(n_s, &[f_u, &(-&eye)]),
            &hstack(n_s, &[&(-f_u), &(-&eye)]),
        ]);
        let b = vstack(n_x, &[c_x, &(-f_x), f_x]);
        let cc = vcat(&[c, &(-f), f]);
        let cost = vcat(&[&DVector::zeros(n_u), &DVector::from_element(n_s, 1.)]);

        log::debug!("L1 pLP: n_u {} slacks {} rows {}", n_u, n_s, a.nrows());
        Ok(ParametricLp {f: cost, a, b, c: cc, n_u})
    }

    /// Number of auxiliary variables after the inputs.
    pub fn n_aux(&self) -> usize
    {
        self.f.len() - self.n_u
    }
}

impl ParametricProgram for ParametricLp
{
    fn n_x(&self) -> usize
    {
        self.b.ncols()
    }

    fn n_u(&self) -> usize
    {
        self.n_u
    }

    fn program_at(&self, x: &DVector<f64>) -> Result<ConvexProgram, PwaError>
    {
        PwaError::check_dim("x", (self.n_x(), 1), (x.len(), 1))?;

        Ok(ConvexProgram::lp(self.f.clone(), self.a.clone(), &self.c + &self.b * x))
    }
}
