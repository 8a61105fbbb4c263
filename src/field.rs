//! Storage of function values and boundary derivatives.
use crate::connectivity::{Connectivity, Extremity, LocalDim, PatchId};
use nalgebra::{DMatrix, DVector, Matrix2};
use serde::{Deserialize, Serialize};

/// Read and write access to the data reconciled across interfaces.
///
/// Per patch, this covers the function values at all interpolation points, the first derivative
/// perpendicular to each edge (`deriv(patch, dim, extremity, idx)` is the derivative along `dim`
/// on the edge at `extremity` of `dim`, at index `idx` along the edge) and the cross derivative
/// at each corner.
pub trait DerivativeStorage {
    /// Number of interpolation points of `patch` along `dim`.
    fn n_points(&self, patch: PatchId, dim: LocalDim) -> usize;

    fn value(&self, patch: PatchId, i1: usize, i2: usize) -> f64;

    fn deriv(&self, patch: PatchId, dim: LocalDim, extremity: Extremity, idx: usize) -> f64;

    fn set_deriv(&mut self, patch: PatchId, dim: LocalDim, extremity: Extremity, idx: usize, value: f64);

    /// Cross derivative at the corner `(extremity_1, extremity_2)`.
    fn cross_deriv(&self, patch: PatchId, extremity_1: Extremity, extremity_2: Extremity) -> f64;

    fn set_cross_deriv(&mut self, patch: PatchId, extremity_1: Extremity, extremity_2: Extremity, value: f64);

    /// Function values along `dim` at index `idx` of the other direction.
    fn value_line(&self, patch: PatchId, dim: LocalDim, idx: usize) -> DVector<f64> {
        DVector::from_fn(self.n_points(patch, dim), |i, _| match dim {
            LocalDim::Dim1 => self.value(patch, i, idx),
            LocalDim::Dim2 => self.value(patch, idx, i),
        })
    }

    /// Derivatives along `dim` stored on the edge at `extremity`, for every point of the edge.
    fn deriv_line(&self, patch: PatchId, dim: LocalDim, extremity: Extremity) -> DVector<f64> {
        DVector::from_fn(self.n_points(patch, dim.other()), |i, _| {
            self.deriv(patch, dim, extremity, i)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PatchData {
    values: DMatrix<f64>,
    /// `derivs[dim][extremity]`, indexed along the edge.
    derivs: [[DVector<f64>; 2]; 2],
    /// `cross[(extremity_1, extremity_2)]`.
    cross: Matrix2<f64>,
}

/// In-memory [`DerivativeStorage`] for all patches of a connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivField {
    patches: Vec<PatchData>,
}

impl DerivField {
    /// Storage with all values and derivatives set to zero.
    pub fn zeros(connectivity: &Connectivity) -> Self {
        let patches = connectivity
            .patches()
            .iter()
            .map(|patch| {
                let (n1, n2) = patch.shape();
                PatchData {
                    values: DMatrix::zeros(n1, n2),
                    derivs: [
                        [DVector::zeros(n2), DVector::zeros(n2)],
                        [DVector::zeros(n1), DVector::zeros(n1)],
                    ],
                    cross: Matrix2::zeros(),
                }
            })
            .collect();
        Self { patches }
    }

    /// Storage with values sampled from `f(patch, [x1, x2])` and zero derivatives.
    pub fn from_fn(connectivity: &Connectivity, f: impl Fn(PatchId, [f64; 2]) -> f64) -> Self {
        let mut field = Self::zeros(connectivity);
        for (idx, (patch, data)) in connectivity.patches().iter().zip(&mut field.patches).enumerate() {
            let (n1, n2) = patch.shape();
            for i1 in 0..n1 {
                for i2 in 0..n2 {
                    data.values[(i1, i2)] = f(PatchId(idx), patch.point(i1, i2));
                }
            }
        }
        field
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn values(&self, patch: PatchId) -> &DMatrix<f64> {
        &self.patches[patch.0].values
    }

    pub fn values_mut(&mut self, patch: PatchId) -> &mut DMatrix<f64> {
        &mut self.patches[patch.0].values
    }

    /// Derivatives along `dim` on the edge at `extremity`.
    pub fn derivs(&self, patch: PatchId, dim: LocalDim, extremity: Extremity) -> &DVector<f64> {
        &self.patches[patch.0].derivs[dim.index()][extremity.index()]
    }

    pub fn derivs_mut(&mut self, patch: PatchId, dim: LocalDim, extremity: Extremity) -> &mut DVector<f64> {
        &mut self.patches[patch.0].derivs[dim.index()][extremity.index()]
    }

    pub fn cross_derivs(&self, patch: PatchId) -> &Matrix2<f64> {
        &self.patches[patch.0].cross
    }
}

impl DerivativeStorage for DerivField {
    fn n_points(&self, patch: PatchId, dim: LocalDim) -> usize {
        let values = &self.patches[patch.0].values;
        match dim {
            LocalDim::Dim1 => values.nrows(),
            LocalDim::Dim2 => values.ncols(),
        }
    }

    fn value(&self, patch: PatchId, i1: usize, i2: usize) -> f64 {
        self.patches[patch.0].values[(i1, i2)]
    }

    fn deriv(&self, patch: PatchId, dim: LocalDim, extremity: Extremity, idx: usize) -> f64 {
        self.derivs(patch, dim, extremity)[idx]
    }

    fn set_deriv(&mut self, patch: PatchId, dim: LocalDim, extremity: Extremity, idx: usize, value: f64) {
        self.derivs_mut(patch, dim, extremity)[idx] = value;
    }

    fn cross_deriv(&self, patch: PatchId, extremity_1: Extremity, extremity_2: Extremity) -> f64 {
        self.patches[patch.0].cross[(extremity_1.index(), extremity_2.index())]
    }

    fn set_cross_deriv(&mut self, patch: PatchId, extremity_1: Extremity, extremity_2: Extremity, value: f64) {
        self.patches[patch.0].cross[(extremity_1.index(), extremity_2.index())] = value;
    }

    fn value_line(&self, patch: PatchId, dim: LocalDim, idx: usize) -> DVector<f64> {
        let values = &self.patches[patch.0].values;
        match dim {
            LocalDim::Dim1 => values.column(idx).into_owned(),
            LocalDim::Dim2 => values.row(idx).transpose(),
        }
    }

    fn deriv_line(&self, patch: PatchId, dim: LocalDim, extremity: Extremity) -> DVector<f64> {
        self.derivs(patch, dim, extremity).clone()
    }
}
