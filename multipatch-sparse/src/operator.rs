use core::fmt;
use nalgebra::base::constraint::AreMultipliable;
use nalgebra::constraint::{DimEq, ShapeConstraint};
use nalgebra::storage::Storage;
use nalgebra::{ClosedAdd, ClosedMul, DVector, DVectorView, DVectorViewMut, Dim, Dyn, Matrix, RealField, Scalar, U1};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;

/// A linear map `y = A x` on dynamically sized vectors.
pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T, R, C, S> LinearOperator<T> for Matrix<T, R, C, S>
where
    T: Scalar + One + Zero + ClosedMul + ClosedAdd,
    R: Dim,
    C: Dim,
    S: Storage<T, R, C>,
    ShapeConstraint: DimEq<Dyn, R> + DimEq<C, Dyn> + AreMultipliable<R, C, Dyn, U1>,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if y.len() != self.nrows() || x.len() != self.ncols() {
            return Err(Box::new(DimensionMismatch {
                operator: (self.nrows(), self.ncols()),
                input: x.len(),
                output: y.len(),
            }));
        }
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Diagonal (Jacobi) preconditioner `P = diag(A)^{-1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobiPreconditioner<T: Scalar> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField + Copy> JacobiPreconditioner<T> {
    /// Builds the preconditioner from the diagonal of a square CSR matrix.
    ///
    /// Returns `None` if the matrix is not square or has a zero (or missing) diagonal entry.
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Option<Self> {
        if matrix.nrows() != matrix.ncols() {
            return None;
        }
        let mut diagonal = DVector::zeros(matrix.nrows());
        for (i, _, a_ii) in matrix.diagonal_as_csr().triplet_iter() {
            diagonal[i] += *a_ii;
        }
        if diagonal.iter().any(|a_ii| *a_ii == T::zero()) {
            return None;
        }
        Some(Self {
            inverse_diagonal: diagonal.map(|a_ii| T::one() / a_ii),
        })
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField + Copy> LinearOperator<T> for JacobiPreconditioner<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        if y.len() != self.inverse_diagonal.len() || x.len() != self.inverse_diagonal.len() {
            return Err(Box::new(DimensionMismatch {
                operator: (self.inverse_diagonal.len(), self.inverse_diagonal.len()),
                input: x.len(),
                output: y.len(),
            }));
        }
        y.copy_from(&self.inverse_diagonal.component_mul(&x));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionMismatch {
    pub operator: (usize, usize),
    pub input: usize,
    pub output: usize,
}

impl fmt::Display for DimensionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot apply {}x{} operator to vector of length {} with output of length {}",
            self.operator.0, self.operator.1, self.input, self.output
        )
    }
}

impl Error for DimensionMismatch {}
