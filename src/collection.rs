//! Lookup of the interface calculators of a geometry.
use crate::calculator::{DerivativesCalculator, SingleInterfaceDerivativesCalculator};
use crate::chain::Chain;
use crate::connectivity::{Connectivity, InterfaceId};
use crate::error::MultipatchError;
use rustc_hash::FxHashMap;

/// A fixed set of calculators, one per interface.
#[derive(Debug, Clone)]
pub struct DerivativesCalculatorCollection<C = SingleInterfaceDerivativesCalculator> {
    calculators: FxHashMap<InterfaceId, C>,
}

impl<C: DerivativesCalculator> DerivativesCalculatorCollection<C> {
    /// Fails if the same interface appears twice.
    pub fn new(calculators: impl IntoIterator<Item = (InterfaceId, C)>) -> Result<Self, MultipatchError> {
        let mut map = FxHashMap::default();
        for (id, calculator) in calculators {
            if map.insert(id, calculator).is_some() {
                return Err(MultipatchError::configuration(format!(
                    "more than one calculator given for interface {}",
                    id.0
                )));
            }
        }
        Ok(Self { calculators: map })
    }

    pub fn get(&self, id: InterfaceId) -> Result<&C, MultipatchError> {
        self.calculators
            .get(&id)
            .ok_or_else(|| MultipatchError::configuration(format!("no calculator for interface {}", id.0)))
    }

    pub fn contains(&self, id: InterfaceId) -> bool {
        self.calculators.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    /// Interfaces covered by the collection, in increasing order.
    pub fn interface_ids(&self) -> Vec<InterfaceId> {
        let mut ids: Vec<_> = self.calculators.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl DerivativesCalculatorCollection<SingleInterfaceDerivativesCalculator> {
    /// Calculators for every interface between two patches.
    pub fn from_connectivity(connectivity: &Connectivity) -> Result<Self, MultipatchError> {
        let calculators = connectivity
            .interfaces()
            .filter(|(_, interface)| !interface.is_boundary())
            .map(|(id, _)| Ok((id, SingleInterfaceDerivativesCalculator::from_interface(connectivity, id)?)))
            .collect::<Result<Vec<_>, MultipatchError>>()?;
        Self::new(calculators)
    }

    /// Calculators for the interfaces crossed by `chain`.
    pub fn for_chain(connectivity: &Connectivity, chain: &Chain) -> Result<Self, MultipatchError> {
        let calculators = chain
            .interfaces()
            .iter()
            .map(|interface| {
                Ok((
                    interface.id,
                    SingleInterfaceDerivativesCalculator::from_interface(connectivity, interface.id)?,
                ))
            })
            .collect::<Result<Vec<_>, MultipatchError>>()?;
        Self::new(calculators)
    }
}
