//! Runtime description of how patches are glued together.
use crate::error::MultipatchError;
use crate::grid::{Patch, PatchAxis};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId(pub usize);

/// One of the two logical directions of a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalDim {
    Dim1,
    Dim2,
}

impl LocalDim {
    pub fn other(&self) -> Self {
        match self {
            Self::Dim1 => Self::Dim2,
            Self::Dim2 => Self::Dim1,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Dim1 => 0,
            Self::Dim2 => 1,
        }
    }
}

/// The end of a local direction: `Front` is the lowest coordinate, `Back` the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extremity {
    Front,
    Back,
}

impl Extremity {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Front => 0,
            Self::Back => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Same,
    Reversed,
}

impl Orientation {
    pub fn sign(&self) -> f64 {
        match self {
            Self::Same => 1.0,
            Self::Reversed => -1.0,
        }
    }

    /// The orientation obtained by following `self` and then `other`.
    pub fn compose(&self, other: Orientation) -> Orientation {
        if *self == other {
            Self::Same
        } else {
            Self::Reversed
        }
    }
}

/// Boundary condition kind at one end of a 1D spline direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundCond {
    Periodic,
    /// The derivative at the end is supplied.
    Hermite,
    /// An additional interpolation point inside the end cell replaces the derivative.
    Greville,
}

/// The side of a patch perpendicular to `dim`, located at `extremity` of that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchEdge {
    pub patch: PatchId,
    pub dim: LocalDim,
    pub extremity: Extremity,
}

impl PatchEdge {
    pub fn new(patch: PatchId, dim: LocalDim, extremity: Extremity) -> Self {
        Self { patch, dim, extremity }
    }

    /// The direction along the edge.
    pub fn parallel_dim(&self) -> LocalDim {
        self.dim.other()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Patch(PatchEdge),
    /// The outer boundary of the domain.
    Outside,
}

impl Edge {
    pub fn patch_edge(&self) -> Option<&PatchEdge> {
        match self {
            Edge::Patch(edge) => Some(edge),
            Edge::Outside => None,
        }
    }
}

impl From<PatchEdge> for Edge {
    fn from(edge: PatchEdge) -> Self {
        Edge::Patch(edge)
    }
}

/// A pair of edges glued together.
///
/// `orientation` tells whether the parallel directions of the two edges run the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interface {
    pub edge1: Edge,
    pub edge2: Edge,
    pub orientation: Orientation,
}

impl Interface {
    pub fn new(edge1: impl Into<Edge>, edge2: impl Into<Edge>, orientation: Orientation) -> Self {
        Self {
            edge1: edge1.into(),
            edge2: edge2.into(),
            orientation,
        }
    }

    /// An interface between a patch edge and the outer boundary.
    pub fn boundary(edge: PatchEdge) -> Self {
        Self::new(edge, Edge::Outside, Orientation::Same)
    }

    pub fn is_boundary(&self) -> bool {
        self.edge1 == Edge::Outside || self.edge2 == Edge::Outside
    }

    /// The edge glued to `edge`, or `None` if `edge` is not part of this interface.
    pub fn other_edge(&self, edge: &PatchEdge) -> Option<Edge> {
        if self.edge1.patch_edge() == Some(edge) {
            Some(self.edge2)
        } else if self.edge2.patch_edge() == Some(edge) {
            Some(self.edge1)
        } else {
            None
        }
    }

    /// Both patch edges, or `None` for a boundary interface.
    pub fn patch_edges(&self) -> Option<(PatchEdge, PatchEdge)> {
        match (self.edge1, self.edge2) {
            (Edge::Patch(edge1), Edge::Patch(edge2)) => Some((edge1, edge2)),
            _ => None,
        }
    }
}

/// Patches and the interfaces between them.
///
/// Edges that do not appear in any interface are treated as part of the outer boundary.
#[derive(Debug, Clone)]
pub struct Connectivity {
    patches: Vec<Patch>,
    interfaces: Vec<Interface>,
    edge_to_interface: FxHashMap<PatchEdge, InterfaceId>,
}

impl Connectivity {
    pub fn new(patches: Vec<Patch>, interfaces: Vec<Interface>) -> Result<Self, MultipatchError> {
        let mut edge_to_interface = FxHashMap::default();
        for (idx, interface) in interfaces.iter().enumerate() {
            let id = InterfaceId(idx);
            if interface.edge1 == Edge::Outside && interface.edge2 == Edge::Outside {
                return Err(MultipatchError::configuration(format!(
                    "interface {} connects two outside edges",
                    idx
                )));
            }
            for edge in [interface.edge1, interface.edge2].iter().filter_map(Edge::patch_edge) {
                if edge.patch.0 >= patches.len() {
                    return Err(MultipatchError::configuration(format!(
                        "interface {} refers to unknown patch {}",
                        idx, edge.patch.0
                    )));
                }
                if let Some(previous) = edge_to_interface.insert(*edge, id) {
                    return Err(MultipatchError::configuration(format!(
                        "edge {:?} belongs to both interface {} and interface {}",
                        edge, previous.0, idx
                    )));
                }
            }
        }

        Ok(Self {
            patches,
            interfaces,
            edge_to_interface,
        })
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, id: PatchId) -> Result<&Patch, MultipatchError> {
        self.patches
            .get(id.0)
            .ok_or_else(|| MultipatchError::configuration(format!("unknown patch {}", id.0)))
    }

    pub fn interfaces(&self) -> impl Iterator<Item = (InterfaceId, &Interface)> {
        self.interfaces
            .iter()
            .enumerate()
            .map(|(idx, interface)| (InterfaceId(idx), interface))
    }

    pub fn interface(&self, id: InterfaceId) -> Result<&Interface, MultipatchError> {
        self.interfaces
            .get(id.0)
            .ok_or_else(|| MultipatchError::configuration(format!("unknown interface {}", id.0)))
    }

    /// The interface that `edge` belongs to, if any.
    pub fn interface_at(&self, edge: &PatchEdge) -> Option<InterfaceId> {
        self.edge_to_interface.get(edge).copied()
    }

    /// The grid perpendicular to `edge`.
    pub fn perpendicular_axis(&self, edge: &PatchEdge) -> Result<&PatchAxis, MultipatchError> {
        Ok(self.patch(edge.patch)?.axis(edge.dim))
    }

    /// The grid along `edge`.
    pub fn parallel_axis(&self, edge: &PatchEdge) -> Result<&PatchAxis, MultipatchError> {
        Ok(self.patch(edge.patch)?.axis(edge.parallel_dim()))
    }
}
