//! Coefficients relating the derivative at one interface to the derivatives at the neighbouring
//! interfaces and to the function values around it.
//!
//! For an interface between patch 1 and patch 2, with derivatives oriented from patch 1 towards
//! patch 2, the cubic spline continuity conditions give
//!
//! ```text
//! s_I = a * s_1 + b * s_2 + c,    c = sum_k w_k f_k
//! ```
//!
//! where `s_1` (`s_2`) is the derivative on the edge of patch 1 (patch 2) opposite to the
//! interface. `a` and `b` are [`DerivativesCalculator::coeff_deriv_patch_1`] and
//! [`DerivativesCalculator::coeff_deriv_patch_2`], and `c` is computed from the function values by
//! [`DerivativesCalculator::get_function_coefficients`].
use crate::calculator::coefficients::{combine, recursive_side, uniform_side, InterfaceRelation, SideRelation};
use crate::connectivity::{BoundCond, Connectivity, Extremity, InterfaceId};
use crate::error::MultipatchError;
use crate::grid::PatchAxis;
use log::debug;
use nalgebra::{DVector, DVectorView};
use serde::{Deserialize, Serialize};

pub(crate) mod coefficients;

/// Maximal difference between the function values of the two patches at the interface.
pub const CONTINUITY_TOLERANCE: f64 = 1e-13;

/// The relation between interface derivatives provided by one interface.
pub trait DerivativesCalculator {
    /// Coefficient on the derivative at the edge of patch 1 opposite to the interface.
    fn coeff_deriv_patch_1(&self) -> f64;

    /// Coefficient on the derivative at the edge of patch 2 opposite to the interface.
    fn coeff_deriv_patch_2(&self) -> f64;

    /// Weighted sum of the function values of both patches.
    ///
    /// `values_1` and `values_2` are the function values at all interpolation points of each
    /// patch along the direction perpendicular to the interface, in local index order.
    fn get_function_coefficients(
        &self,
        values_1: DVectorView<f64>,
        values_2: DVectorView<f64>,
    ) -> Result<f64, MultipatchError>;

    /// Whether the relation of each side only covers the cells next to the interface.
    ///
    /// The coefficient of a truncated side then refers to an interior derivative.
    fn is_truncated(&self) -> [bool; 2] {
        [false, false]
    }
}

impl<'a, C> DerivativesCalculator for &'a C
where
    C: ?Sized + DerivativesCalculator,
{
    fn coeff_deriv_patch_1(&self) -> f64 {
        C::coeff_deriv_patch_1(self)
    }

    fn coeff_deriv_patch_2(&self) -> f64 {
        C::coeff_deriv_patch_2(self)
    }

    fn get_function_coefficients(
        &self,
        values_1: DVectorView<f64>,
        values_2: DVectorView<f64>,
    ) -> Result<f64, MultipatchError> {
        C::get_function_coefficients(self, values_1, values_2)
    }

    fn is_truncated(&self) -> [bool; 2] {
        C::is_truncated(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoefficientScheme {
    /// Closed form on uniform grids, recursion otherwise.
    #[default]
    Auto,
    /// Always use the recursion.
    Recursive,
}

/// Where the samples of one side live in the patch-local grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SideLayout {
    extremity: Extremity,
    n_points: usize,
    truncated: bool,
}

impl SideLayout {
    /// Local index of the point at outward index `j`.
    fn local_index(&self, j: usize) -> usize {
        match self.extremity {
            Extremity::Front => j,
            Extremity::Back => self.n_points - 1 - j,
        }
    }
}

/// One side of an interface after validation.
struct Side {
    layout: SideLayout,
    outward: Vec<f64>,
    closure: bool,
    uniform: bool,
}

#[derive(Debug, Clone)]
pub struct CalculatorBuilder<'a> {
    axes: [&'a PatchAxis; 2],
    extremities: [Extremity; 2],
    opposite_bounds: Option<[BoundCond; 2]>,
    scheme: CoefficientScheme,
    taken_cells: Option<usize>,
}

impl<'a> CalculatorBuilder<'a> {
    /// `axis_1` and `axis_2` are the grids perpendicular to the interface, which lies at
    /// `extremity_1` of `axis_1` and `extremity_2` of `axis_2`.
    pub fn new(axis_1: &'a PatchAxis, extremity_1: Extremity, axis_2: &'a PatchAxis, extremity_2: Extremity) -> Self {
        Self {
            axes: [axis_1, axis_2],
            extremities: [extremity_1, extremity_2],
            opposite_bounds: None,
            scheme: CoefficientScheme::Auto,
            taken_cells: None,
        }
    }

    /// Builder for the interface `id` of `connectivity`, reducing both patches to their grid
    /// perpendicular to the interface.
    pub fn from_interface(connectivity: &'a Connectivity, id: InterfaceId) -> Result<Self, MultipatchError> {
        let interface = connectivity.interface(id)?;
        let (edge1, edge2) = interface.patch_edges().ok_or_else(|| {
            MultipatchError::configuration(format!("interface {} lies on the outer boundary", id.0))
        })?;
        Ok(Self::new(
            connectivity.perpendicular_axis(&edge1)?,
            edge1.extremity,
            connectivity.perpendicular_axis(&edge2)?,
            edge2.extremity,
        ))
    }

    /// Boundary conditions at the ends of both patches opposite to the interface.
    ///
    /// When not given, they follow from the grids: [`BoundCond::Greville`] where the grid has a
    /// closure point, [`BoundCond::Hermite`] otherwise.
    pub fn with_opposite_bounds(self, bound_1: BoundCond, bound_2: BoundCond) -> Self {
        Self {
            opposite_bounds: Some([bound_1, bound_2]),
            ..self
        }
    }

    pub fn with_scheme(self, scheme: CoefficientScheme) -> Self {
        Self { scheme, ..self }
    }

    /// Only use the `n_cells` cells next to the interface on each side.
    pub fn with_taken_cells(self, n_cells: usize) -> Self {
        Self {
            taken_cells: Some(n_cells),
            ..self
        }
    }

    fn side(&self, s: usize) -> Result<Side, MultipatchError> {
        let axis = self.axes[s];
        let extremity = self.extremities[s];
        let opposite = extremity.opposite();
        let patch = s + 1;

        if axis.has_closure(extremity) {
            return Err(MultipatchError::configuration(format!(
                "patch {} has a closure point next to the interface",
                patch
            )));
        }
        let grid_bound = axis.bound_cond(opposite);
        let bound = self.opposite_bounds.map_or(grid_bound, |bounds| bounds[s]);
        if bound == BoundCond::Periodic {
            return Err(MultipatchError::configuration(format!(
                "periodic boundary condition given for the edge of patch {} opposite to the interface",
                patch
            )));
        }
        if bound != grid_bound {
            return Err(MultipatchError::configuration(format!(
                "boundary condition {:?} opposite to the interface of patch {} does not match its grid ({:?})",
                bound, patch, grid_bound
            )));
        }

        let points = axis.points();
        let n_points = points.len();
        let mut outward: Vec<f64> = match extremity {
            Extremity::Front => points.iter().map(|x| x - points[0]).collect(),
            Extremity::Back => points.iter().rev().map(|x| points[n_points - 1] - x).collect(),
        };
        let mut closure = bound == BoundCond::Greville;
        let mut n_cells = axis.n_cells();

        let truncated = match self.taken_cells {
            Some(taken) if taken < n_cells => {
                outward.truncate(taken + 1);
                closure = false;
                n_cells = taken;
                true
            }
            _ => false,
        };

        if n_cells < 2 {
            return Err(MultipatchError::cardinality(format!(
                "patch {} has {} cell(s) perpendicular to the interface, at least 2 are needed",
                patch, n_cells
            )));
        }
        if outward[1] <= 0.0 {
            return Err(MultipatchError::consistency(format!(
                "patch {} has a cell of zero length next to the interface",
                patch
            )));
        }

        Ok(Side {
            layout: SideLayout {
                extremity,
                n_points,
                truncated,
            },
            outward,
            closure,
            uniform: axis.is_uniform() && !closure,
        })
    }

    pub fn build(self) -> Result<SingleInterfaceDerivativesCalculator, MultipatchError> {
        let sides = [self.side(0)?, self.side(1)?];
        let closed_form = self.scheme == CoefficientScheme::Auto && sides.iter().all(|side| side.uniform);

        let relation_of = |side: &Side| -> SideRelation {
            if closed_form {
                uniform_side(side.outward.len() - 1, side.outward[1])
            } else {
                recursive_side(&side.outward, side.closure)
            }
        };
        let relation = combine(
            &relation_of(&sides[0]),
            &relation_of(&sides[1]),
            sides[0].outward[1],
            sides[1].outward[1],
        );
        debug!(
            "Built interface coefficients with {} scheme on {} and {} points (a = {:e}, b = {:e})",
            if closed_form { "closed-form" } else { "recursive" },
            sides[0].outward.len(),
            sides[1].outward.len(),
            relation.coeff_1,
            relation.coeff_2
        );

        Ok(SingleInterfaceDerivativesCalculator {
            layouts: [sides[0].layout, sides[1].layout],
            relation,
            closed_form,
        })
    }
}

/// The coefficients of a single interface, computed once from the grids of both patches.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleInterfaceDerivativesCalculator {
    layouts: [SideLayout; 2],
    relation: InterfaceRelation,
    closed_form: bool,
}

impl SingleInterfaceDerivativesCalculator {
    /// Calculator with the boundary conditions opposite to the interface read from the grids.
    pub fn new(
        axis_1: &PatchAxis,
        extremity_1: Extremity,
        axis_2: &PatchAxis,
        extremity_2: Extremity,
    ) -> Result<Self, MultipatchError> {
        CalculatorBuilder::new(axis_1, extremity_1, axis_2, extremity_2).build()
    }

    pub fn from_interface(connectivity: &Connectivity, id: InterfaceId) -> Result<Self, MultipatchError> {
        CalculatorBuilder::from_interface(connectivity, id)?.build()
    }

    /// Weights of the function values of patch 1, ordered from the interface outwards.
    pub fn weights_patch_1(&self) -> &DVector<f64> {
        &self.relation.weights_1
    }

    /// Weights of the function values of patch 2, ordered from the interface outwards.
    ///
    /// The first entry repeats the weight of the shared point, which is only applied once.
    pub fn weights_patch_2(&self) -> &DVector<f64> {
        &self.relation.weights_2
    }

    /// Whether the closed form for uniform grids was used.
    pub fn uses_closed_form(&self) -> bool {
        self.closed_form
    }

    fn check_len(&self, s: usize, len: usize) -> Result<(), MultipatchError> {
        if len != self.layouts[s].n_points {
            return Err(MultipatchError::cardinality(format!(
                "expected {} function values on patch {}, got {}",
                self.layouts[s].n_points,
                s + 1,
                len
            )));
        }
        Ok(())
    }
}

impl DerivativesCalculator for SingleInterfaceDerivativesCalculator {
    fn coeff_deriv_patch_1(&self) -> f64 {
        self.relation.coeff_1
    }

    fn coeff_deriv_patch_2(&self) -> f64 {
        self.relation.coeff_2
    }

    fn get_function_coefficients(
        &self,
        values_1: DVectorView<f64>,
        values_2: DVectorView<f64>,
    ) -> Result<f64, MultipatchError> {
        self.check_len(0, values_1.len())?;
        self.check_len(1, values_2.len())?;
        let [layout_1, layout_2] = &self.layouts;

        let shared_1 = values_1[layout_1.local_index(0)];
        let shared_2 = values_2[layout_2.local_index(0)];
        if !((shared_1 - shared_2).abs() <= CONTINUITY_TOLERANCE) {
            return Err(MultipatchError::consistency(format!(
                "function values at the interface differ: {:e} on patch 1, {:e} on patch 2",
                shared_1, shared_2
            )));
        }

        let c_1: f64 = self
            .relation
            .weights_1
            .iter()
            .enumerate()
            .map(|(j, w)| w * values_1[layout_1.local_index(j)])
            .sum();
        let c_2: f64 = self
            .relation
            .weights_2
            .iter()
            .enumerate()
            .skip(1)
            .map(|(j, w)| w * values_2[layout_2.local_index(j)])
            .sum();
        Ok(c_1 + c_2)
    }

    fn is_truncated(&self) -> [bool; 2] {
        [self.layouts[0].truncated, self.layouts[1].truncated]
    }
}
