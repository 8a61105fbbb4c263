//! Preconditioned BiCGSTAB for small, non-symmetric systems.
use crate::operator::{IdentityOperator, LinearOperator};
use core::fmt;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use num::Zero;
use std::error::Error;
use std::ops::{Deref, DerefMut};

pub trait StoppingCriterion<T: Scalar> {
    fn has_converged(&self, b_norm: T, iteration: usize, approx_residual: DVectorView<T>) -> bool;
}

/// Relative residual tolerance ||r|| <= tol * ||b||.
///
/// The residual is the one updated by the recurrence, not recomputed from `b - Ax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeResidualCriterion<T: Scalar> {
    tol: T,
}

impl<T: Scalar> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }

    pub fn tolerance(&self) -> &T {
        &self.tol
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-12)
    }
}

impl<T: RealField + Copy> StoppingCriterion<T> for RelativeResidualCriterion<T> {
    fn has_converged(&self, b_norm: T, _iteration: usize, approx_residual: DVectorView<T>) -> bool {
        approx_residual.norm() <= self.tol * b_norm
    }
}

#[derive(Debug, Clone)]
pub struct BiCgStabWorkspace<T: Scalar> {
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    v: DVector<T>,
    y: DVector<T>,
    s: DVector<T>,
    z: DVector<T>,
    t: DVector<T>,
}

struct Buffers<'a, T: Scalar> {
    r: &'a mut DVector<T>,
    r_hat: &'a mut DVector<T>,
    p: &'a mut DVector<T>,
    v: &'a mut DVector<T>,
    y: &'a mut DVector<T>,
    s: &'a mut DVector<T>,
    z: &'a mut DVector<T>,
    t: &'a mut DVector<T>,
}

impl<T: Scalar + Zero> Default for BiCgStabWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            r_hat: DVector::zeros(0),
            p: DVector::zeros(0),
            v: DVector::zeros(0),
            y: DVector::zeros(0),
            s: DVector::zeros(0),
            z: DVector::zeros(0),
            t: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> BiCgStabWorkspace<T> {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers<T> {
        for buffer in [
            &mut self.r,
            &mut self.r_hat,
            &mut self.p,
            &mut self.v,
            &mut self.y,
            &mut self.s,
            &mut self.z,
            &mut self.t,
        ] {
            buffer.resize_vertically_mut(dim, T::zero());
            buffer.fill(T::zero());
        }
        Buffers {
            r: &mut self.r,
            r_hat: &mut self.r_hat,
            p: &mut self.p,
            v: &mut self.v,
            y: &mut self.y,
            s: &mut self.s,
            z: &mut self.z,
            t: &mut self.t,
        }
    }
}

#[derive(Debug)]
enum OwnedOrMutRef<'a, T> {
    Owned(T),
    MutRef(&'a mut T),
}

impl<'a, T> Deref for OwnedOrMutRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

impl<'a, T> DerefMut for OwnedOrMutRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

/// Right-preconditioned BiCGSTAB.
///
/// Configured through a builder:
///
/// ```ignore
/// BiCgStab::new()
///     .with_operator(&a)
///     .with_preconditioner(&p)
///     .with_stopping_criterion(RelativeResidualCriterion::new(1e-12))
///     .with_max_iter(n)
///     .solve_with_guess(&b, &mut x)?;
/// ```
#[derive(Debug)]
pub struct BiCgStab<'a, T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: OwnedOrMutRef<'a, BiCgStabWorkspace<T>>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl<'a, T: Scalar + Zero> BiCgStab<'a, T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: OwnedOrMutRef::Owned(BiCgStabWorkspace::default()),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar> BiCgStab<'a, T, (), IdentityOperator, ()> {
    pub fn with_workspace(workspace: &'a mut BiCgStabWorkspace<T>) -> Self {
        Self {
            workspace: OwnedOrMutRef::MutRef(workspace),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar, P, Criterion> BiCgStab<'a, T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> BiCgStab<'a, T, A, P, Criterion> {
        BiCgStab {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T: Scalar, A, P, Criterion> BiCgStab<'a, T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiCgStab<'a, T, A, P2, Criterion> {
        BiCgStab {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<'a, T: Scalar, A, P> BiCgStab<'a, T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(self, stopping_criterion: Criterion) -> BiCgStab<'a, T, A, P, Criterion> {
        BiCgStab {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum SolveErrorKind {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    /// One of the scalar recurrences hit zero before the residual became small.
    Breakdown,
    MaxIterationsReached { max_iter: usize },
}

impl fmt::Display for SolveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::Breakdown => write!(f, "BiCGSTAB breakdown"),
            Self::MaxIterationsReached { max_iter } => {
                write!(f, "Max iterations ({}) reached.", max_iter)
            }
        }
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct SolveError<T> {
    pub output: BiCgStabOutput<T>,
    pub kind: SolveErrorKind,
}

impl<T> SolveError<T> {
    fn new(output: BiCgStabOutput<T>, kind: SolveErrorKind) -> Self {
        Self { output, kind }
    }
}

impl<T: fmt::Debug> fmt::Display for SolveError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BiCGSTAB solve failed after {} iterations (relative residual {:?}). Error: {}",
            self.output.num_iterations, self.output.relative_residual, self.kind
        )
    }
}

impl<T: fmt::Debug> std::error::Error for SolveError<T> {}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct BiCgStabOutput<T> {
    /// Number of completed iterations.
    pub num_iterations: usize,
    /// Relative norm of the recurrence residual when the solver stopped.
    pub relative_residual: T,
}

/// y = Ax
fn apply_operator<T, A>(y: &mut DVector<T>, a: &A, x: &DVector<T>) -> Result<(), Box<dyn Error>>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    a.apply(DVectorViewMut::from(y), DVectorView::from(x))
}

impl<'a, T, A, P, Criterion> BiCgStab<'a, T, A, P, Criterion>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: StoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<BiCgStabOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(
        &mut self,
        b: DVectorView<T>,
        mut x: DVectorViewMut<T>,
    ) -> Result<BiCgStabOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let mut output = BiCgStabOutput {
            num_iterations: 0,
            relative_residual: T::zero(),
        };

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        let Buffers {
            r,
            r_hat,
            p,
            v,
            y,
            s,
            z,
            t,
        } = self.workspace.prepare_buffers(x.len());

        // r = b - Ax
        if let Err(err) = self
            .operator
            .apply(DVectorViewMut::from(&mut *r), DVectorView::from(&x))
        {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        r.neg_mut();
        *r += &b;
        r_hat.copy_from(&*r);

        let mut rho_prev = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();

        loop {
            output.relative_residual = r.norm() / b_norm;
            if self
                .stopping_criterion
                .has_converged(b_norm, output.num_iterations, DVectorView::from(&*r))
            {
                break;
            } else if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            let rho = r_hat.dot(&*r);
            if rho == T::zero() || omega == T::zero() {
                return Err(SolveError::new(output, Breakdown));
            }
            let beta = (rho / rho_prev) * (alpha / omega);

            // p <- r + beta * (p - omega * v)
            p.axpy(-omega, &*v, T::one());
            p.axpy(T::one(), &*r, beta);

            // v = A P p
            if let Err(err) = apply_operator(y, &self.preconditioner, p) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(v, &self.operator, y) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let r_hat_v = r_hat.dot(&*v);
            if r_hat_v == T::zero() {
                return Err(SolveError::new(output, Breakdown));
            }
            alpha = rho / r_hat_v;

            // s <- r - alpha * v
            s.copy_from(&*r);
            s.axpy(-alpha, &*v, T::one());

            if self
                .stopping_criterion
                .has_converged(b_norm, output.num_iterations, DVectorView::from(&*s))
            {
                x.axpy(alpha, &*y, T::one());
                output.num_iterations += 1;
                output.relative_residual = s.norm() / b_norm;
                break;
            }

            // t = A P s
            if let Err(err) = apply_operator(z, &self.preconditioner, s) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(t, &self.operator, z) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let t_norm_squared = t.norm_squared();
            if t_norm_squared == T::zero() {
                return Err(SolveError::new(output, Breakdown));
            }
            omega = t.dot(&*s) / t_norm_squared;

            // x <- x + alpha * P p + omega * P s
            x.axpy(alpha, &*y, T::one());
            x.axpy(omega, &*z, T::one());

            // r <- s - omega * t
            r.copy_from(&*s);
            r.axpy(-omega, &*t, T::one());

            rho_prev = rho;
            output.num_iterations += 1;
        }

        Ok(output)
    }
}
