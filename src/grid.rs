//! One-dimensional spline grids and the two-dimensional patches built from them.
use crate::connectivity::{BoundCond, Extremity, LocalDim};
use crate::error::MultipatchError;
use serde::{Deserialize, Serialize};

/// Relative tolerance used to decide whether a breakpoint coincides with an interpolation point.
pub const BREAKPOINT_TOLERANCE: f64 = 1e-15;

fn coincide(a: f64, b: f64) -> bool {
    (a - b).abs() <= BREAKPOINT_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Cubic spline grid along one local direction of a patch.
///
/// Every breakpoint is an interpolation point. In addition, each end may carry one closure
/// point strictly inside its end cell, used instead of a boundary derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchAxis {
    breakpoints: Vec<f64>,
    points: Vec<f64>,
    uniform: bool,
    closure: [bool; 2],
}

impl PatchAxis {
    /// Uniform grid with `n_cells` cells on `[min, max]`.
    pub fn uniform(min: f64, max: f64, n_cells: usize) -> Result<Self, MultipatchError> {
        if n_cells == 0 {
            return Err(MultipatchError::cardinality("a grid needs at least one cell"));
        }
        if !(min < max) {
            return Err(MultipatchError::consistency(format!(
                "grid bounds [{}, {}] are not increasing",
                min, max
            )));
        }
        let h = (max - min) / n_cells as f64;
        let breakpoints: Vec<f64> = (0..=n_cells)
            .map(|i| if i == n_cells { max } else { min + h * i as f64 })
            .collect();
        let mut axis = Self::new(breakpoints.clone(), breakpoints)?;
        axis.uniform = true;
        Ok(axis)
    }

    /// Grid whose interpolation points are its breakpoints.
    pub fn non_uniform(breakpoints: Vec<f64>) -> Result<Self, MultipatchError> {
        Self::new(breakpoints.clone(), breakpoints)
    }

    /// Grid with explicit interpolation points.
    ///
    /// Fails if a breakpoint is not an interpolation point, or if an interpolation point that is
    /// not a breakpoint lies outside the first and last cells.
    /// On a single-cell grid, a lone closure point belongs to the end whose half of the cell holds it.
    pub fn new(breakpoints: Vec<f64>, points: Vec<f64>) -> Result<Self, MultipatchError> {
        if breakpoints.len() < 2 {
            return Err(MultipatchError::cardinality("a grid needs at least two breakpoints"));
        }
        for sequence in [&breakpoints, &points] {
            if sequence.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(MultipatchError::consistency(
                    "breakpoints and interpolation points must be strictly increasing",
                ));
            }
        }

        let n_cells = breakpoints.len() - 1;
        let n_extra = points.len().saturating_sub(breakpoints.len());
        let mut closure = [false; 2];
        let mut next_breakpoint = 0;
        for &x in &points {
            if next_breakpoint < breakpoints.len() && coincide(x, breakpoints[next_breakpoint]) {
                next_breakpoint += 1;
                continue;
            }
            let end = if n_cells == 1 && next_breakpoint == 1 {
                // Both closure points share the single cell
                if n_extra >= 2 {
                    if closure[Extremity::Front.index()] {
                        Extremity::Back
                    } else {
                        Extremity::Front
                    }
                } else if x < 0.5 * (breakpoints[0] + breakpoints[1]) {
                    Extremity::Front
                } else {
                    Extremity::Back
                }
            } else if next_breakpoint == 1 {
                Extremity::Front
            } else if next_breakpoint == n_cells {
                Extremity::Back
            } else {
                return Err(MultipatchError::consistency(format!(
                    "interpolation point {} is not a breakpoint and does not lie in an end cell",
                    x
                )));
            };
            let cell = match end {
                Extremity::Front => 0,
                Extremity::Back => n_cells - 1,
            };
            let inside = breakpoints[cell] < x && x < breakpoints[cell + 1];
            if !inside || closure[end.index()] {
                return Err(MultipatchError::consistency(format!(
                    "interpolation point {} is not a valid closure point",
                    x
                )));
            }
            closure[end.index()] = true;
        }
        if next_breakpoint != breakpoints.len() {
            return Err(MultipatchError::consistency(format!(
                "breakpoint {} is not an interpolation point",
                breakpoints[next_breakpoint]
            )));
        }

        Ok(Self {
            breakpoints,
            points,
            uniform: false,
            closure,
        })
    }

    /// Adds the Greville closure point at `extremity`: the abscissa one third into the end cell.
    pub fn with_greville_closure(self, extremity: Extremity) -> Result<Self, MultipatchError> {
        if self.has_closure(extremity) {
            return Err(MultipatchError::configuration(format!(
                "grid already has a closure point at {:?}",
                extremity
            )));
        }
        let n = self.breakpoints.len();
        let extra = match extremity {
            Extremity::Front => self.breakpoints[0] + (self.breakpoints[1] - self.breakpoints[0]) / 3.0,
            Extremity::Back => self.breakpoints[n - 1] - (self.breakpoints[n - 1] - self.breakpoints[n - 2]) / 3.0,
        };
        let mut points = self.points.clone();
        let position = points.partition_point(|x| *x < extra);
        points.insert(position, extra);
        let uniform = self.uniform;
        let mut closure = self.closure;
        closure[extremity.index()] = true;
        let mut axis = Self::new(self.breakpoints, points)?;
        axis.uniform = uniform;
        axis.closure = closure;
        Ok(axis)
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Interpolation points, including closure points.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn n_cells(&self) -> usize {
        self.breakpoints.len() - 1
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// Whether the breakpoints were generated with a constant step.
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    pub fn has_closure(&self, extremity: Extremity) -> bool {
        self.closure[extremity.index()]
    }

    /// The boundary condition this grid supports at `extremity` when it is not glued to a neighbour.
    pub fn bound_cond(&self, extremity: Extremity) -> BoundCond {
        if self.has_closure(extremity) {
            BoundCond::Greville
        } else {
            BoundCond::Hermite
        }
    }

    pub fn min(&self) -> f64 {
        self.breakpoints[0]
    }

    pub fn max(&self) -> f64 {
        self.breakpoints[self.breakpoints.len() - 1]
    }

    pub fn length(&self) -> f64 {
        self.max() - self.min()
    }

    /// Index of the interpolation point at `extremity`.
    pub fn end_index(&self, extremity: Extremity) -> usize {
        match extremity {
            Extremity::Front => 0,
            Extremity::Back => self.points.len() - 1,
        }
    }
}

/// A logically rectangular patch: a grid along each local direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    axes: [PatchAxis; 2],
}

impl Patch {
    pub fn new(axis1: PatchAxis, axis2: PatchAxis) -> Self {
        Self { axes: [axis1, axis2] }
    }

    pub fn axis(&self, dim: LocalDim) -> &PatchAxis {
        &self.axes[dim.index()]
    }

    /// Number of interpolation points along each direction.
    pub fn shape(&self) -> (usize, usize) {
        (self.axes[0].n_points(), self.axes[1].n_points())
    }

    /// Coordinates of the interpolation point with the given indices.
    pub fn point(&self, i1: usize, i2: usize) -> [f64; 2] {
        [self.axes[0].points()[i1], self.axes[1].points()[i2]]
    }
}
