//! Per-player economy: growth, iron investment and cost settlement

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::EconomyConfig;
use crate::core::error::{DissonanceError, Result};
use crate::core::types::{Position, TechnologyKind};
use crate::economy::costs::Cost;
use crate::economy::resource::{Resource, ResourceKind};

/// Side effect of moving iron in or out of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IronEffect {
    None,
    /// The resource became active; its resource neuron belongs at this cell
    Activated(Option<Position>),
    /// The resource went inactive; the resource neuron at this cell goes away
    Deactivated(Option<Position>),
}

/// Serializable view of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub kind: ResourceKind,
    pub current: f64,
    pub bound: f64,
    pub limit: f64,
    pub distributed_iron: u32,
    pub active: bool,
    pub blocked: bool,
    pub gathered: f64,
    pub spent: f64,
}

/// Resource pool of one player
///
/// Iron invested into a resource is held as bound iron, so distributing and
/// removing iron never changes `current + bound` of the iron entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Economy {
    resources: Vec<Resource>,
    base_slowdown: f64,
    slowdown: f64,
    curve_step: f64,
    limit_step: f64,
    activation_threshold: u32,
}

impl Economy {
    /// Create a pool; `slots` are the resource neuron cells in `ResourceKind::BINDABLE` order
    pub fn new(config: &EconomyConfig, slots: &[Position]) -> Self {
        let resources = ResourceKind::ALL
            .iter()
            .map(|kind| match kind {
                ResourceKind::Iron => Resource::new(config.iron_start, config.iron_limit, None),
                ResourceKind::Oxygen => Resource::new(
                    config.oxygen_start,
                    config.resource_limit,
                    slots.first().copied(),
                ),
                other => Resource::new(
                    config.resource_start,
                    config.resource_limit,
                    slots.get(other.index() - 1).copied(),
                ),
            })
            .collect();

        Self {
            resources,
            base_slowdown: config.slowdown,
            slowdown: config.slowdown,
            curve_step: config.curve_step,
            limit_step: config.limit_step,
            activation_threshold: config.activation_threshold,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &Resource {
        &self.resources[kind.index()]
    }

    fn get_mut(&mut self, kind: ResourceKind) -> &mut Resource {
        &mut self.resources[kind.index()]
    }

    pub fn iron(&self) -> f64 {
        self.get(ResourceKind::Iron).current()
    }

    pub fn slowdown(&self) -> f64 {
        self.slowdown
    }

    /// Kind of the resource whose neuron sits at `pos`
    pub fn resource_at(&self, pos: Position) -> Option<ResourceKind> {
        ResourceKind::BINDABLE
            .iter()
            .copied()
            .find(|kind| self.get(*kind).position() == Some(pos))
    }

    /// One growth step
    ///
    /// Iron grows by `iron_rate` only when `iron_eligible`. Every other
    /// resource grows if active and not blocked, by
    /// `boost * |ln(oxygen + 0.5)| * (1 - (current + bound) / limit) / slowdown`
    /// with `boost = 1 + invested_iron / 10`.
    pub fn increase_resources(&mut self, iron_eligible: bool, iron_rate: f64) {
        let slowdown = self.slowdown;
        for kind in ResourceKind::ALL {
            if kind == ResourceKind::Iron {
                if iron_eligible {
                    self.get_mut(kind).increase(iron_rate);
                }
                continue;
            }
            let oxygen = self.get(ResourceKind::Oxygen).current();
            let res = self.get_mut(kind);
            if !res.is_active() || res.is_blocked() || res.limit() <= 0.0 {
                continue;
            }
            let boost = 1.0 + res.distributed_iron() as f64 / 10.0;
            let gain = (oxygen + 0.5).ln().abs();
            let negative_factor = 1.0 - (res.current() + res.bound()) / res.limit();
            let delta = boost * gain * negative_factor / slowdown;
            res.increase(delta);
        }
    }

    /// Invest one iron unit into `kind`
    pub fn distribute_iron(&mut self, kind: ResourceKind) -> Result<IronEffect> {
        if !kind.is_bindable() {
            return Err(DissonanceError::InvalidTarget("iron cannot be invested in iron".into()));
        }
        if !self.get_mut(ResourceKind::Iron).lock(1.0) {
            return Err(DissonanceError::InsufficientResources(format!("{}: 1", ResourceKind::Iron)));
        }
        let threshold = self.activation_threshold;
        let res = self.get_mut(kind);
        res.add_iron();
        if !res.is_active() && res.distributed_iron() >= threshold {
            res.set_active(true);
            debug!(resource = %kind, "resource activated");
            return Ok(IronEffect::Activated(res.position()));
        }
        Ok(IronEffect::None)
    }

    /// Take one iron unit back out of `kind`
    ///
    /// An active resource stays active until its last iron unit is removed.
    pub fn remove_iron(&mut self, kind: ResourceKind) -> Result<IronEffect> {
        if !kind.is_bindable() {
            return Err(DissonanceError::InvalidTarget("iron cannot be invested in iron".into()));
        }
        if !self.get_mut(kind).take_iron() {
            return Err(DissonanceError::InvalidTarget(format!("no iron invested in {}", kind)));
        }
        self.get_mut(ResourceKind::Iron).unlock(1.0);
        let res = self.get_mut(kind);
        if res.is_active() && res.distributed_iron() == 0 {
            res.set_active(false);
            debug!(resource = %kind, "resource deactivated");
            return Ok(IronEffect::Deactivated(res.position()));
        }
        Ok(IronEffect::None)
    }

    /// The resource neuron of `kind` was destroyed: invested iron is lost
    pub fn deactivate(&mut self, kind: ResourceKind) {
        let invested = self.get(kind).distributed_iron() as f64;
        let res = self.get_mut(kind);
        res.clear_iron();
        res.set_active(false);
        res.set_blocked(false);
        self.get_mut(ResourceKind::Iron).unbind(invested);
    }

    pub fn set_blocked(&mut self, kind: ResourceKind, blocked: bool) {
        self.get_mut(kind).set_blocked(blocked);
    }

    /// Shortfall per resource for `cost` scaled by `boost`; empty when affordable
    pub fn missing_resources(&self, cost: Cost, boost: f64) -> Vec<(ResourceKind, f64)> {
        cost.iter()
            .filter_map(|(kind, amount)| {
                let needed = amount * boost;
                let have = self.get(*kind).current();
                (have < needed).then(|| (*kind, needed - have))
            })
            .collect()
    }

    pub fn can_afford(&self, cost: Cost, boost: f64) -> bool {
        self.missing_resources(cost, boost).is_empty()
    }

    /// Debit `cost` (and bind it when `bind`); all or nothing
    pub fn take_resources(&mut self, cost: Cost, bind: bool, boost: f64) -> Result<()> {
        let missing = self.missing_resources(cost, boost);
        if !missing.is_empty() {
            return Err(DissonanceError::InsufficientResources(format_missing(&missing)));
        }
        for (kind, amount) in cost {
            let res = self.get_mut(*kind);
            res.decrease(amount * boost);
            if bind {
                res.bind(amount * boost);
            }
        }
        Ok(())
    }

    /// Release amounts bound by a destroyed neuron
    pub fn free_bound(&mut self, cost: Cost) {
        for (kind, amount) in cost {
            self.get_mut(*kind).unbind(*amount);
        }
    }

    /// Apply the economic effect of a technology at its new `level`
    pub fn apply_technology(&mut self, kind: TechnologyKind, level: u32) {
        let factor = 1.0 + self.limit_step * level as f64;
        match kind {
            TechnologyKind::TotalOxygen => self.get_mut(ResourceKind::Oxygen).set_limit_factor(factor),
            TechnologyKind::TotalResource => {
                for res in ResourceKind::BINDABLE {
                    if res != ResourceKind::Oxygen {
                        self.get_mut(res).set_limit_factor(factor);
                    }
                }
            }
            TechnologyKind::Curve => {
                self.slowdown = (self.base_slowdown - self.curve_step * level as f64).max(1.0);
            }
            _ => {}
        }
    }

    pub fn summary(&self) -> Vec<ResourceSummary> {
        ResourceKind::ALL
            .iter()
            .map(|kind| {
                let res = self.get(*kind);
                ResourceSummary {
                    kind: *kind,
                    current: res.current(),
                    bound: res.bound(),
                    limit: res.limit(),
                    distributed_iron: res.distributed_iron(),
                    active: res.is_active(),
                    blocked: res.is_blocked(),
                    gathered: res.gathered(),
                    spent: res.spent(),
                }
            })
            .collect()
    }

    /// Sum of current amounts over all non-iron resources
    pub fn total_current(&self) -> f64 {
        ResourceKind::BINDABLE.iter().map(|kind| self.get(*kind).current()).sum()
    }
}

/// Render a shortfall list as "oxygen: 3.5, potassium: 1.0"
pub fn format_missing(missing: &[(ResourceKind, f64)]) -> String {
    missing
        .iter()
        .map(|(kind, amount)| format!("{}: {:.1}", kind, amount))
        .collect::<Vec<_>>()
        .join(", ")
}
