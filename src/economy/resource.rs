//! Resource kinds and a single resource pool entry

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::core::types::Position;

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Iron,
    Oxygen,
    Potassium,
    Chloride,
    Glutamate,
    Dopamine,
    Serotonin,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Iron,
        ResourceKind::Oxygen,
        ResourceKind::Potassium,
        ResourceKind::Chloride,
        ResourceKind::Glutamate,
        ResourceKind::Dopamine,
        ResourceKind::Serotonin,
    ];

    /// Resources that iron can be invested in (everything but iron)
    pub const BINDABLE: [ResourceKind; 6] = [
        ResourceKind::Oxygen,
        ResourceKind::Potassium,
        ResourceKind::Chloride,
        ResourceKind::Glutamate,
        ResourceKind::Dopamine,
        ResourceKind::Serotonin,
    ];

    pub fn is_bindable(&self) -> bool {
        !matches!(self, ResourceKind::Iron)
    }

    /// Position in `ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One entry of a player's resource pool
///
/// Invariant: `0 <= current` and `current + bound <= limit()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    current: f64,
    bound: f64,
    base_limit: f64,
    limit_factor: f64,
    distributed_iron: u32,
    active: bool,
    blocked: bool,
    position: Option<Position>,
    gathered: f64,
    spent: f64,
}

impl Resource {
    pub fn new(current: f64, base_limit: f64, position: Option<Position>) -> Self {
        Self {
            current: current.clamp(0.0, base_limit),
            bound: 0.0,
            base_limit,
            limit_factor: 1.0,
            distributed_iron: 0,
            active: false,
            blocked: false,
            position,
            gathered: 0.0,
            spent: 0.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn limit(&self) -> f64 {
        self.base_limit * self.limit_factor
    }

    /// Room left before the limit is reached
    pub fn headroom(&self) -> f64 {
        (self.limit() - self.current - self.bound).max(0.0)
    }

    pub fn distributed_iron(&self) -> u32 {
        self.distributed_iron
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Source cell where the resource neuron materialises
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn gathered(&self) -> f64 {
        self.gathered
    }

    pub fn spent(&self) -> f64 {
        self.spent
    }

    /// Add up to `amount`, never past the limit. Returns what was added.
    pub(crate) fn increase(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let added = amount.min(self.headroom());
        self.current += added;
        self.gathered += added;
        added
    }

    /// Remove `amount`; callers check affordability first
    pub(crate) fn decrease(&mut self, amount: f64) {
        let removed = amount.min(self.current).max(0.0);
        self.current -= removed;
        self.spent += removed;
    }

    /// Move `amount` from current into bound without touching statistics
    pub(crate) fn lock(&mut self, amount: f64) -> bool {
        if amount > self.current {
            return false;
        }
        self.current -= amount;
        self.bound += amount;
        true
    }

    /// Move `amount` from bound back into current
    pub(crate) fn unlock(&mut self, amount: f64) -> bool {
        if amount > self.bound {
            return false;
        }
        self.bound -= amount;
        self.current += amount;
        true
    }

    pub(crate) fn bind(&mut self, amount: f64) {
        self.bound += amount.max(0.0);
    }

    pub(crate) fn unbind(&mut self, amount: f64) {
        self.bound = (self.bound - amount.max(0.0)).max(0.0);
    }

    pub(crate) fn set_limit_factor(&mut self, factor: f64) {
        self.limit_factor = factor.max(1.0);
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn add_iron(&mut self) {
        self.distributed_iron += 1;
    }

    pub(crate) fn take_iron(&mut self) -> bool {
        if self.distributed_iron == 0 {
            return false;
        }
        self.distributed_iron -= 1;
        true
    }

    pub(crate) fn clear_iron(&mut self) {
        self.distributed_iron = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_respects_limit_and_bound() {
        let mut res = Resource::new(90.0, 100.0, None);
        res.bind(5.0);
        assert_eq!(res.increase(20.0), 5.0);
        assert_eq!(res.current(), 95.0);
        assert_eq!(res.current() + res.bound(), res.limit());
    }

    #[test]
    fn test_decrease_never_negative() {
        let mut res = Resource::new(3.0, 100.0, None);
        res.decrease(10.0);
        assert_eq!(res.current(), 0.0);
        assert_eq!(res.spent(), 3.0);
    }

    #[test]
    fn test_unbind_clamps() {
        let mut res = Resource::new(0.0, 100.0, None);
        res.bind(4.0);
        res.unbind(10.0);
        assert_eq!(res.bound(), 0.0);
    }

    #[test]
    fn test_limit_factor() {
        let mut res = Resource::new(0.0, 50.0, None);
        res.set_limit_factor(1.4);
        assert!((res.limit() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_bindable() {
        assert!(!ResourceKind::Iron.is_bindable());
        assert!(ResourceKind::BINDABLE.iter().all(|r| r.is_bindable()));
    }
}
