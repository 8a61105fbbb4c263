//! The linear system coupling the interface derivatives of one chain.
use crate::calculator::DerivativesCalculator;
use crate::chain::{Chain, ChainKind};
use crate::collection::DerivativesCalculatorCollection;
use crate::connectivity::BoundCond;
use crate::error::MultipatchError;
use multipatch_sparse::bicgstab::{BiCgStab, BiCgStabWorkspace, RelativeResidualCriterion};
use multipatch_sparse::operator::JacobiPreconditioner;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

/// Settings of the iterative solver used for periodic chains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Relative residual at which the solve stops.
    pub relative_tolerance: f64,
    /// Iteration cap. `None` uses the number of unknowns of the chain.
    pub max_iterations: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-14,
            max_iterations: None,
        }
    }
}

/// Row `i` of the system: `x_i = b * x_{i-1} + a * x_{i+1} + rhs_sign * c_i`, with all
/// derivatives oriented along the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChainRow {
    pub a: f64,
    pub b: f64,
    pub rhs_sign: f64,
}

#[derive(Debug, Clone)]
enum SystemSolver {
    Empty,
    Scalar { diagonal: f64 },
    Dense(LU<f64, Dyn, Dyn>),
    Krylov {
        matrix: CsrMatrix<f64>,
        preconditioner: JacobiPreconditioner<f64>,
        tolerance: f64,
        max_iter: usize,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ChainSystem {
    rows: Vec<ChainRow>,
    periodic: bool,
    solver: SystemSolver,
}

impl ChainSystem {
    pub fn assemble<C>(
        chain: &Chain,
        calculators: &DerivativesCalculatorCollection<C>,
        settings: &SolverSettings,
    ) -> Result<Self, MultipatchError>
    where
        C: DerivativesCalculator,
    {
        let rows = chain
            .interfaces()
            .iter()
            .map(|interface| {
                let calculator = calculators.get(interface.id)?;
                let truncated = calculator.is_truncated();
                let coeff_1 = if truncated[0] { 0.0 } else { calculator.coeff_deriv_patch_1() };
                let coeff_2 = if truncated[1] { 0.0 } else { calculator.coeff_deriv_patch_2() };
                // Patch 1 of the calculator is the patch before the interface when aligned
                Ok(if interface.aligned {
                    ChainRow {
                        a: coeff_2,
                        b: coeff_1,
                        rhs_sign: 1.0,
                    }
                } else {
                    ChainRow {
                        a: coeff_1,
                        b: coeff_2,
                        rhs_sign: -1.0,
                    }
                })
            })
            .collect::<Result<Vec<_>, MultipatchError>>()?;

        let n = rows.len();
        let periodic = chain.is_periodic();
        if let ChainKind::Open { front, back } = chain.kind() {
            if front == BoundCond::Periodic || back == BoundCond::Periodic {
                return Err(MultipatchError::configuration("an open chain cannot have periodic ends"));
            }
            if n > 0 {
                if front == BoundCond::Greville && rows[0].b != 0.0 {
                    return Err(MultipatchError::configuration(
                        "the first interface couples to the derivative of a Greville boundary",
                    ));
                }
                if back == BoundCond::Greville && rows[n - 1].a != 0.0 {
                    return Err(MultipatchError::configuration(
                        "the last interface couples to the derivative of a Greville boundary",
                    ));
                }
            }
        }

        let mut coo = CooMatrix::new(n, n);
        for (i, row) in rows.iter().enumerate() {
            coo.push(i, i, 1.0);
            if periodic || i > 0 {
                coo.push(i, (i + n - 1) % n, -row.b);
            }
            if periodic || i + 1 < n {
                coo.push(i, (i + 1) % n, -row.a);
            }
        }
        let matrix = CsrMatrix::from(&coo);

        let solver = if n == 0 {
            SystemSolver::Empty
        } else if n == 1 {
            let diagonal = DMatrix::from(&matrix)[(0, 0)];
            if diagonal == 0.0 {
                return Err(MultipatchError::configuration("the interface system is singular"));
            }
            SystemSolver::Scalar { diagonal }
        } else if !periodic {
            let lu = DMatrix::from(&matrix).lu();
            if !lu.is_invertible() {
                return Err(MultipatchError::configuration("the interface system is singular"));
            }
            SystemSolver::Dense(lu)
        } else {
            let preconditioner = JacobiPreconditioner::from_csr(&matrix)
                .ok_or_else(|| MultipatchError::configuration("the interface system has a zero diagonal entry"))?;
            SystemSolver::Krylov {
                matrix,
                preconditioner,
                tolerance: settings.relative_tolerance,
                max_iter: settings.max_iterations.unwrap_or(n),
            }
        };

        Ok(Self { rows, periodic, solver })
    }

    pub fn rows(&self) -> &[ChainRow] {
        &self.rows
    }

    pub fn n(&self) -> usize {
        self.rows.len()
    }

    /// Dense copy of the system matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let n = self.n();
        let mut dense = DMatrix::identity(n, n);
        for (i, row) in self.rows.iter().enumerate() {
            if self.periodic || i > 0 {
                dense[(i, (i + n - 1) % n)] -= row.b;
            }
            if self.periodic || i + 1 < n {
                dense[(i, (i + 1) % n)] -= row.a;
            }
        }
        dense
    }

    /// Solves for the interface derivatives, returning them with the number of iterations used.
    pub fn solve(
        &self,
        rhs: &DVector<f64>,
        workspace: &mut BiCgStabWorkspace<f64>,
    ) -> Result<(DVector<f64>, usize), MultipatchError> {
        match &self.solver {
            SystemSolver::Empty => Ok((DVector::zeros(0), 0)),
            SystemSolver::Scalar { diagonal } => Ok((rhs / *diagonal, 0)),
            SystemSolver::Dense(lu) => lu
                .solve(rhs)
                .map(|x| (x, 0))
                .ok_or_else(|| MultipatchError::configuration("the interface system is singular")),
            SystemSolver::Krylov {
                matrix,
                preconditioner,
                tolerance,
                max_iter,
            } => {
                let mut x = DVector::zeros(rhs.len());
                let output = BiCgStab::with_workspace(workspace)
                    .with_operator(matrix)
                    .with_preconditioner(preconditioner)
                    .with_stopping_criterion(RelativeResidualCriterion::new(*tolerance))
                    .with_max_iter(*max_iter)
                    .solve_with_guess(rhs, &mut x)
                    .map_err(|err| MultipatchError::Convergence {
                        iterations: err.output.num_iterations,
                        relative_residual: err.output.relative_residual,
                        message: err.kind.to_string(),
                    })?;
                Ok((x, output.num_iterations))
            }
        }
    }
}
