//! Discovery of chains: the sequences of patches crossed when walking along one logical direction.
use crate::connectivity::{
    BoundCond, Connectivity, Edge, Extremity, InterfaceId, LocalDim, Orientation, PatchEdge, PatchId,
};
use crate::error::MultipatchError;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A patch visited by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub patch: PatchId,
    /// The local direction of the patch that the chain runs along.
    pub dim: LocalDim,
    /// Whether the chain runs along increasing (`Same`) or decreasing local coordinates.
    pub orientation: Orientation,
    /// Orientation of the patch's parallel direction relative to the first patch of the chain.
    pub parallel_orientation: Orientation,
}

impl ChainLink {
    /// Extremity through which the chain leaves the patch.
    pub fn exit_extremity(&self) -> Extremity {
        match self.orientation {
            Orientation::Same => Extremity::Back,
            Orientation::Reversed => Extremity::Front,
        }
    }

    /// Extremity through which the chain enters the patch.
    pub fn entry_extremity(&self) -> Extremity {
        self.exit_extremity().opposite()
    }

    pub fn exit_edge(&self) -> PatchEdge {
        PatchEdge::new(self.patch, self.dim, self.exit_extremity())
    }

    pub fn entry_edge(&self) -> PatchEdge {
        PatchEdge::new(self.patch, self.dim, self.entry_extremity())
    }

    /// Extremity of this patch's parallel direction that corresponds to `extremity` on the first patch.
    pub fn parallel_extremity(&self, extremity: Extremity) -> Extremity {
        match self.parallel_orientation {
            Orientation::Same => extremity,
            Orientation::Reversed => extremity.opposite(),
        }
    }
}

/// An interface crossed by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInterface {
    pub id: InterfaceId,
    /// `true` if the first edge of the interface belongs to the patch before it in the chain.
    pub aligned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainKind {
    /// Both ends lie on the outer boundary.
    Open { front: BoundCond, back: BoundCond },
    /// The last patch is glued to the first one.
    Periodic,
}

/// Patches crossed along one direction, with the interfaces between consecutive patches.
///
/// Interface `i` lies between link `i` and link `i + 1` (modulo the number of links for
/// periodic chains).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    links: Vec<ChainLink>,
    interfaces: Vec<ChainInterface>,
    kind: ChainKind,
}

enum Step {
    Boundary,
    Next(ChainInterface, ChainLink),
}

/// Crosses the interface at the exit (or entry, when walking backwards) of `link`.
fn step(connectivity: &Connectivity, link: &ChainLink, forward: bool) -> Result<Step, MultipatchError> {
    let edge = if forward { link.exit_edge() } else { link.entry_edge() };
    let id = match connectivity.interface_at(&edge) {
        Some(id) => id,
        None => return Ok(Step::Boundary),
    };
    let interface = connectivity.interface(id)?;
    let other = match interface.other_edge(&edge) {
        Some(Edge::Patch(other)) => other,
        _ => return Ok(Step::Boundary),
    };

    // Moving forward we enter `other` and leave through its opposite extremity,
    // moving backward we leave `other` through the extremity we entered it by.
    let runs_forward = (other.extremity == Extremity::Front) == forward;
    let orientation = if runs_forward {
        Orientation::Same
    } else {
        Orientation::Reversed
    };
    let next = ChainLink {
        patch: other.patch,
        dim: other.dim,
        orientation,
        parallel_orientation: link.parallel_orientation.compose(interface.orientation),
    };
    // Walking forward, `edge` belongs to the patch before the interface.
    let before = if forward { edge } else { other };
    let chain_interface = ChainInterface {
        id,
        aligned: interface.edge1 == Edge::Patch(before),
    };
    Ok(Step::Next(chain_interface, next))
}

impl Chain {
    /// Finds the chain running through `patch` along its local direction `dim`.
    ///
    /// Open chains start at the patch touching the outer boundary, such that `patch` is crossed
    /// in increasing local coordinates. Periodic chains start at `patch`.
    pub fn discover(connectivity: &Connectivity, patch: PatchId, dim: LocalDim) -> Result<Self, MultipatchError> {
        connectivity.patch(patch)?;
        let start = ChainLink {
            patch,
            dim,
            orientation: Orientation::Same,
            parallel_orientation: Orientation::Same,
        };

        // Walk backwards to find the head of the chain
        let mut head = start;
        let mut visited = FxHashSet::default();
        visited.insert((patch, dim));
        let mut periodic = false;
        loop {
            match step(connectivity, &head, false)? {
                Step::Boundary => break,
                Step::Next(_, previous) => {
                    if (previous.patch, previous.dim) == (patch, dim) {
                        periodic = true;
                        break;
                    }
                    if !visited.insert((previous.patch, previous.dim)) {
                        return Err(MultipatchError::configuration(format!(
                            "chain through patch {} revisits patch {}",
                            patch.0, previous.patch.0
                        )));
                    }
                    head = previous;
                }
            }
        }
        if periodic {
            head = start;
        } else {
            head.parallel_orientation = Orientation::Same;
        }

        let mut links = vec![head];
        let mut interfaces = Vec::new();
        let kind = loop {
            let current = links[links.len() - 1];
            match step(connectivity, &current, true)? {
                Step::Boundary => {
                    let first = &links[0];
                    let front_axis = connectivity.patch(first.patch)?.axis(first.dim);
                    let back_axis = connectivity.patch(current.patch)?.axis(current.dim);
                    break ChainKind::Open {
                        front: front_axis.bound_cond(first.entry_extremity()),
                        back: back_axis.bound_cond(current.exit_extremity()),
                    };
                }
                Step::Next(interface, next) => {
                    interfaces.push(interface);
                    if (next.patch, next.dim) == (head.patch, head.dim) {
                        if next.orientation != head.orientation
                            || next.parallel_orientation != head.parallel_orientation
                        {
                            return Err(MultipatchError::configuration(format!(
                                "periodic chain through patch {} closes with a flipped orientation",
                                head.patch.0
                            )));
                        }
                        break ChainKind::Periodic;
                    }
                    if links.iter().any(|l| (l.patch, l.dim) == (next.patch, next.dim)) {
                        return Err(MultipatchError::configuration(format!(
                            "chain through patch {} revisits patch {}",
                            head.patch.0, next.patch.0
                        )));
                    }
                    links.push(next);
                }
            }
        };

        Ok(Self {
            links,
            interfaces,
            kind,
        })
    }

    /// All distinct chains of the connectivity, one per pair (patch, direction) not yet covered.
    pub fn discover_all(connectivity: &Connectivity) -> Result<Vec<Self>, MultipatchError> {
        let mut covered = FxHashSet::default();
        let mut chains = Vec::new();
        for patch in (0..connectivity.num_patches()).map(PatchId) {
            for dim in [LocalDim::Dim1, LocalDim::Dim2] {
                if covered.contains(&(patch, dim)) {
                    continue;
                }
                let chain = Self::discover(connectivity, patch, dim)?;
                covered.extend(chain.links.iter().map(|link| (link.patch, link.dim)));
                chains.push(chain);
            }
        }
        Ok(chains)
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn interfaces(&self) -> &[ChainInterface] {
        &self.interfaces
    }

    pub fn kind(&self) -> ChainKind {
        self.kind
    }

    pub fn is_periodic(&self) -> bool {
        self.kind == ChainKind::Periodic
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The links on either side of interface `i`.
    pub fn interface_links(&self, i: usize) -> (&ChainLink, &ChainLink) {
        (&self.links[i], &self.links[(i + 1) % self.links.len()])
    }
}
