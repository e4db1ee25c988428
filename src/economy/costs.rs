//! Cost tables for units and technologies
//!
//! Technology costs are per level: researching level `n` costs `n` times the
//! base entry.

use crate::core::types::{TechnologyKind, UnitKind};
use crate::economy::resource::ResourceKind;
use crate::economy::resource::ResourceKind::*;

pub type Cost = &'static [(ResourceKind, f64)];

/// Build cost of a unit
pub fn unit_cost(kind: UnitKind) -> Cost {
    match kind {
        UnitKind::ActivatedNeuron => &[(Oxygen, 8.0), (Glutamate, 12.0)],
        UnitKind::Synapse => &[(Oxygen, 10.0), (Potassium, 5.0)],
        UnitKind::Nucleus => &[
            (Oxygen, 30.0),
            (Potassium, 20.0),
            (Chloride, 20.0),
            (Glutamate, 20.0),
            (Dopamine, 15.0),
            (Serotonin, 15.0),
        ],
        UnitKind::ResourceNeuron => &[],
        UnitKind::Loophole => &[(Oxygen, 15.0), (Dopamine, 10.0), (Serotonin, 5.0)],
        UnitKind::Epsp => &[(Potassium, 4.0)],
        UnitKind::Ipsp => &[(Potassium, 3.0), (Chloride, 5.0)],
        UnitKind::Macro => &[
            (Potassium, 6.0),
            (Chloride, 4.0),
            (Dopamine, 6.0),
            (Serotonin, 4.0),
        ],
    }
}

/// Base cost of one technology level
pub fn technology_cost(kind: TechnologyKind) -> Cost {
    match kind {
        TechnologyKind::Way => &[(Dopamine, 10.0), (Serotonin, 5.0)],
        TechnologyKind::Swarm => &[(Dopamine, 8.0), (Glutamate, 8.0)],
        TechnologyKind::TotalOxygen => &[(Oxygen, 15.0), (Glutamate, 5.0)],
        TechnologyKind::TotalResource => &[(Oxygen, 10.0), (Serotonin, 10.0)],
        TechnologyKind::Curve => &[(Dopamine, 10.0), (Serotonin, 10.0)],
        TechnologyKind::AtkPotential => &[(Potassium, 10.0), (Dopamine, 5.0)],
        TechnologyKind::AtkSpeed => &[(Potassium, 8.0), (Serotonin, 6.0)],
        TechnologyKind::AtkDuration => &[(Chloride, 10.0), (Dopamine, 4.0)],
        TechnologyKind::DefPotential => &[(Glutamate, 12.0), (Dopamine, 4.0)],
        TechnologyKind::DefSpeed => &[(Glutamate, 10.0), (Serotonin, 4.0)],
        TechnologyKind::NucleusRange => &[(Oxygen, 12.0), (Glutamate, 8.0), (Dopamine, 8.0)],
    }
}

/// Whether building this unit binds its cost until the unit is destroyed
pub fn binds_cost(kind: UnitKind) -> bool {
    kind.is_neuron()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_costs_never_use_iron() {
        for kind in UnitKind::NEURONS.iter().chain(UnitKind::POTENTIALS.iter()) {
            assert!(unit_cost(*kind).iter().all(|(r, _)| r.is_bindable()));
        }
        for tech in TechnologyKind::ALL {
            assert!(technology_cost(tech).iter().all(|(r, amount)| r.is_bindable() && *amount > 0.0));
        }
    }

    #[test]
    fn test_only_neurons_bind() {
        assert!(binds_cost(UnitKind::Synapse));
        assert!(!binds_cost(UnitKind::Epsp));
    }

    #[test]
    fn test_resource_neuron_is_free() {
        assert!(unit_cost(UnitKind::ResourceNeuron).is_empty());
    }
}
