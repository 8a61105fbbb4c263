use crate::grid_connectivity;
use multipatch::calculator::{DerivativesCalculator, SingleInterfaceDerivativesCalculator};
use multipatch::chain::Chain;
use multipatch::collection::DerivativesCalculatorCollection;
use multipatch::connectivity::{Connectivity, InterfaceId, LocalDim, PatchId};
use multipatch::grid::PatchAxis;
use multipatch::MultipatchError;

fn two_by_two() -> Connectivity {
    let x = |i: usize| PatchAxis::uniform(i as f64, i as f64 + 1.0, 4).unwrap();
    grid_connectivity(&[x(0), x(1)], &[x(0), x(1)], false)
}

#[test]
fn collection_covers_all_interfaces_between_patches() -> eyre::Result<()> {
    let connectivity = two_by_two();
    let collection = DerivativesCalculatorCollection::from_connectivity(&connectivity)?;
    assert_eq!(collection.len(), 4);
    assert!(!collection.is_empty());
    assert_eq!(
        collection.interface_ids(),
        (0..4).map(InterfaceId).collect::<Vec<_>>()
    );

    for id in collection.interface_ids() {
        let expected = SingleInterfaceDerivativesCalculator::from_interface(&connectivity, id)?;
        assert_eq!(collection.get(id)?, &expected);
    }
    assert!(matches!(
        collection.get(InterfaceId(4)),
        Err(MultipatchError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn collection_for_chain_only_covers_chain_interfaces() -> eyre::Result<()> {
    let connectivity = two_by_two();
    let chain = Chain::discover(&connectivity, PatchId(0), LocalDim::Dim2)?;
    let collection = DerivativesCalculatorCollection::for_chain(&connectivity, &chain)?;
    assert_eq!(collection.len(), 1);
    assert!(collection.contains(chain.interfaces()[0].id));
    // Interfaces along x come first in the grid numbering
    assert_eq!(collection.interface_ids(), vec![InterfaceId(2)]);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct Fixed(f64);

impl DerivativesCalculator for Fixed {
    fn coeff_deriv_patch_1(&self) -> f64 {
        self.0
    }

    fn coeff_deriv_patch_2(&self) -> f64 {
        -self.0
    }

    fn get_function_coefficients(
        &self,
        _values_1: nalgebra::DVectorView<f64>,
        _values_2: nalgebra::DVectorView<f64>,
    ) -> Result<f64, MultipatchError> {
        Ok(0.0)
    }
}

#[test]
fn duplicate_interfaces_are_rejected() {
    let result = DerivativesCalculatorCollection::new(vec![(InterfaceId(0), Fixed(1.0)), (InterfaceId(0), Fixed(2.0))]);
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let collection =
        DerivativesCalculatorCollection::new(vec![(InterfaceId(3), Fixed(1.0)), (InterfaceId(1), Fixed(2.0))]).unwrap();
    assert_eq!(collection.interface_ids(), vec![InterfaceId(1), InterfaceId(3)]);
    assert_eq!(collection.get(InterfaceId(3)).unwrap(), &Fixed(1.0));
}
