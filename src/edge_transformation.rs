//! Conversion of positions along one edge of an interface into positions along the other edge.
use crate::connectivity::{Connectivity, Interface, Orientation};
use crate::error::MultipatchError;
use crate::grid::PatchAxis;
use num::integer::gcd;

/// Relative tolerance (with respect to the edge length) for two points to be considered equivalent.
pub const MATCHING_TOLERANCE: f64 = 1e-12;

/// Maps coordinates and grid indices from the parallel grid of one edge to the parallel grid of
/// the edge glued to it.
///
/// Both edges are identified through their normalized coordinate in `[0, 1]`, which is flipped
/// when the interface orientation is [`Orientation::Reversed`].
#[derive(Debug, Clone, Copy)]
pub struct EdgeTransformation<'a> {
    from: &'a PatchAxis,
    to: &'a PatchAxis,
    orientation: Orientation,
}

impl<'a> EdgeTransformation<'a> {
    pub fn new(from: &'a PatchAxis, to: &'a PatchAxis, orientation: Orientation) -> Self {
        Self { from, to, orientation }
    }

    /// Transformation from the first edge of `interface` to its second edge.
    pub fn from_interface(connectivity: &'a Connectivity, interface: &Interface) -> Result<Self, MultipatchError> {
        let (edge1, edge2) = interface
            .patch_edges()
            .ok_or_else(|| MultipatchError::configuration("cannot transform coordinates across the outer boundary"))?;
        Ok(Self::new(
            connectivity.parallel_axis(&edge1)?,
            connectivity.parallel_axis(&edge2)?,
            interface.orientation,
        ))
    }

    /// The inverse transformation.
    pub fn inverse(&self) -> Self {
        Self::new(self.to, self.from, self.orientation)
    }

    pub fn transform_coord(&self, x: f64) -> f64 {
        let t = (x - self.from.min()) / self.from.length();
        let t = match self.orientation {
            Orientation::Same => t,
            Orientation::Reversed => 1.0 - t,
        };
        self.to.min() + t * self.to.length()
    }

    /// Index on the target grid of the point equivalent to point `idx` of the source grid,
    /// or `None` if the target grid has no such point.
    pub fn transform_index(&self, idx: usize) -> Option<usize> {
        let x = self.transform_coord(*self.from.points().get(idx)?);
        let points = self.to.points();
        let tolerance = MATCHING_TOLERANCE * self.to.length();
        let candidate = points.partition_point(|p| *p < x - tolerance);
        points
            .get(candidate)
            .filter(|p| (**p - x).abs() <= tolerance)
            .map(|_| candidate)
    }

    pub fn is_matching_idx(&self, idx: usize) -> bool {
        self.transform_index(idx).is_some()
    }
}

/// A strided range of grid indices `front, front + stride, ..., front + (size - 1) * stride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdxRangeSlice {
    pub front: usize,
    pub size: usize,
    pub stride: usize,
}

impl IdxRangeSlice {
    pub fn get(&self, k: usize) -> Option<usize> {
        (k < self.size).then(|| self.front + k * self.stride)
    }

    pub fn contains(&self, idx: usize) -> bool {
        idx >= self.front && (idx - self.front) % self.stride == 0 && (idx - self.front) / self.stride < self.size
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).map(move |k| self.front + k * self.stride)
    }
}

/// The indices of both edges of an interface that have an equivalent point on the other edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingIdxSlice {
    conforming: Conforming,
    orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Conforming {
    /// Plain uniform grids: both sides are strided ranges.
    Strided(IdxRangeSlice, IdxRangeSlice),
    /// Matched pairs `(idx_on_edge_1, idx_on_edge_2)`, sorted by the first index.
    Explicit(Vec<(usize, usize)>),
}

impl MatchingIdxSlice {
    /// Computes the conforming indices of two parallel grids.
    ///
    /// For uniform grids the index steps follow from the greatest common divisor of the cell
    /// counts; otherwise the points are matched by coordinate.
    pub fn new(axis_1: &PatchAxis, axis_2: &PatchAxis, orientation: Orientation) -> Result<Self, MultipatchError> {
        let plain = |axis: &PatchAxis| axis.is_uniform() && axis.n_points() == axis.n_cells() + 1;
        let conforming = if plain(axis_1) && plain(axis_2) {
            let (n1, n2) = (axis_1.n_cells(), axis_2.n_cells());
            let g = gcd(n1, n2);
            Conforming::Strided(
                IdxRangeSlice {
                    front: 0,
                    size: g + 1,
                    stride: n1 / g,
                },
                IdxRangeSlice {
                    front: 0,
                    size: g + 1,
                    stride: n2 / g,
                },
            )
        } else {
            let transformation = EdgeTransformation::new(axis_1, axis_2, orientation);
            let pairs: Vec<_> = (0..axis_1.n_points())
                .filter_map(|i| transformation.transform_index(i).map(|j| (i, j)))
                .collect();
            if pairs.is_empty() {
                return Err(MultipatchError::consistency(
                    "the edges of the interface have no matching points",
                ));
            }
            Conforming::Explicit(pairs)
        };
        Ok(Self { conforming, orientation })
    }

    pub fn from_interface(connectivity: &Connectivity, interface: &Interface) -> Result<Self, MultipatchError> {
        let transformation = EdgeTransformation::from_interface(connectivity, interface)?;
        Self::new(transformation.from, transformation.to, interface.orientation)
    }

    /// The strided index ranges of both edges, available when both grids are plain uniform grids.
    pub fn strided(&self) -> Option<(&IdxRangeSlice, &IdxRangeSlice)> {
        match &self.conforming {
            Conforming::Strided(conforming_1, conforming_2) => Some((conforming_1, conforming_2)),
            Conforming::Explicit(_) => None,
        }
    }

    /// Sorted conforming indices of the first edge.
    pub fn conforming_idx_1(&self) -> Vec<usize> {
        match &self.conforming {
            Conforming::Strided(conforming_1, _) => conforming_1.iter().collect(),
            Conforming::Explicit(pairs) => pairs.iter().map(|(i, _)| *i).collect(),
        }
    }

    /// Sorted conforming indices of the second edge.
    pub fn conforming_idx_2(&self) -> Vec<usize> {
        match &self.conforming {
            Conforming::Strided(_, conforming_2) => conforming_2.iter().collect(),
            Conforming::Explicit(pairs) => {
                let mut indices: Vec<_> = pairs.iter().map(|(_, j)| *j).collect();
                indices.sort_unstable();
                indices
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.conforming {
            Conforming::Strided(conforming_1, _) => conforming_1.size,
            Conforming::Explicit(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairs of equivalent indices `(idx_on_edge_1, idx_on_edge_2)`, by increasing first index.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let pairs: Vec<_> = match &self.conforming {
            Conforming::Strided(conforming_1, conforming_2) => conforming_1
                .iter()
                .enumerate()
                .filter_map(|(k, idx_1)| {
                    let k2 = match self.orientation {
                        Orientation::Same => k,
                        Orientation::Reversed => conforming_2.size - 1 - k,
                    };
                    conforming_2.get(k2).map(|idx_2| (idx_1, idx_2))
                })
                .collect(),
            Conforming::Explicit(pairs) => pairs.clone(),
        };
        pairs.into_iter()
    }
}
