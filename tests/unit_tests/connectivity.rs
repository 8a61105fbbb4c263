use crate::grid_connectivity;
use multipatch::connectivity::{
    Connectivity, Edge, Extremity, Interface, InterfaceId, LocalDim, Orientation, PatchEdge, PatchId,
};
use multipatch::grid::{Patch, PatchAxis};
use multipatch::MultipatchError;

fn unit_patch() -> Patch {
    Patch::new(
        PatchAxis::uniform(0.0, 1.0, 4).unwrap(),
        PatchAxis::uniform(0.0, 1.0, 3).unwrap(),
    )
}

#[test]
fn orientation_composition() {
    use Orientation::{Reversed, Same};
    assert_eq!(Same.compose(Same), Same);
    assert_eq!(Same.compose(Reversed), Reversed);
    assert_eq!(Reversed.compose(Reversed), Same);
    assert_eq!(Reversed.sign(), -1.0);
    assert_eq!(LocalDim::Dim1.other(), LocalDim::Dim2);
    assert_eq!(Extremity::Back.opposite(), Extremity::Front);
}

#[test]
fn interfaces_are_found_from_their_edges() {
    let axis = PatchAxis::uniform(0.0, 1.0, 4).unwrap();
    let connectivity = grid_connectivity(&[axis.clone(), axis.clone()], &[axis], false);
    assert_eq!(connectivity.num_patches(), 2);

    let right_edge = PatchEdge::new(PatchId(0), LocalDim::Dim1, Extremity::Back);
    let id = connectivity.interface_at(&right_edge).unwrap();
    let interface = connectivity.interface(id).unwrap();
    assert_eq!(
        interface.other_edge(&right_edge),
        Some(Edge::Patch(PatchEdge::new(PatchId(1), LocalDim::Dim1, Extremity::Front)))
    );
    assert!(!interface.is_boundary());

    let outer_edge = PatchEdge::new(PatchId(0), LocalDim::Dim1, Extremity::Front);
    assert_eq!(connectivity.interface_at(&outer_edge), None);
    assert_eq!(interface.other_edge(&outer_edge), None);
    assert_eq!(connectivity.parallel_axis(&right_edge).unwrap().n_points(), 5);
    assert_eq!(right_edge.parallel_dim(), LocalDim::Dim2);
}

#[test]
fn boundary_interfaces_have_no_patch_pair() {
    let edge = PatchEdge::new(PatchId(0), LocalDim::Dim2, Extremity::Front);
    let connectivity = Connectivity::new(vec![unit_patch()], vec![Interface::boundary(edge)]).unwrap();
    let interface = connectivity.interface(InterfaceId(0)).unwrap();
    assert!(interface.is_boundary());
    assert_eq!(interface.patch_edges(), None);
    assert_eq!(interface.other_edge(&edge), Some(Edge::Outside));
}

#[test]
fn invalid_connectivities_are_rejected() {
    let edge = |patch, extremity| PatchEdge::new(PatchId(patch), LocalDim::Dim1, extremity);

    let result = Connectivity::new(
        vec![unit_patch()],
        vec![Interface::new(Edge::Outside, Edge::Outside, Orientation::Same)],
    );
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let result = Connectivity::new(
        vec![unit_patch()],
        vec![Interface::new(edge(0, Extremity::Back), edge(1, Extremity::Front), Orientation::Same)],
    );
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let result = Connectivity::new(
        vec![unit_patch(), unit_patch(), unit_patch()],
        vec![
            Interface::new(edge(0, Extremity::Back), edge(1, Extremity::Front), Orientation::Same),
            Interface::new(edge(0, Extremity::Back), edge(2, Extremity::Front), Orientation::Same),
        ],
    );
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let connectivity = Connectivity::new(vec![unit_patch()], vec![]).unwrap();
    assert!(connectivity.patch(PatchId(1)).is_err());
    assert!(connectivity.interface(InterfaceId(0)).is_err());
}
