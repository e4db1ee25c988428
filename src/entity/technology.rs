//! Per-player technology levels

use serde::{Deserialize, Serialize};

use crate::core::error::{DissonanceError, Result};
use crate::core::types::TechnologyKind;

pub const MAX_TECHNOLOGY_LEVEL: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologySummary {
    pub kind: TechnologyKind,
    pub level: u32,
    pub max_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technologies {
    levels: [u32; TechnologyKind::ALL.len()],
    max_level: u32,
}

impl Default for Technologies {
    fn default() -> Self {
        Self::new(MAX_TECHNOLOGY_LEVEL)
    }
}

impl Technologies {
    pub fn new(max_level: u32) -> Self {
        Self {
            levels: [0; TechnologyKind::ALL.len()],
            max_level,
        }
    }

    pub fn level(&self, kind: TechnologyKind) -> u32 {
        self.levels[kind as usize]
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn is_maxed(&self, kind: TechnologyKind) -> bool {
        self.level(kind) >= self.max_level
    }

    /// Cost multiplier for researching the next level
    pub fn next_cost_factor(&self, kind: TechnologyKind) -> f64 {
        (self.level(kind) + 1) as f64
    }

    /// Raise the level by one and return the new level
    pub fn research(&mut self, kind: TechnologyKind) -> Result<u32> {
        if self.is_maxed(kind) {
            return Err(DissonanceError::TechnologyMaxed(kind.to_string()));
        }
        self.levels[kind as usize] += 1;
        Ok(self.levels[kind as usize])
    }

    pub fn summary(&self) -> Vec<TechnologySummary> {
        TechnologyKind::ALL
            .iter()
            .map(|kind| TechnologySummary {
                kind: *kind,
                level: self.level(*kind),
                max_level: self.max_level,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_until_max() {
        let mut techs = Technologies::default();
        assert_eq!(techs.next_cost_factor(TechnologyKind::Way), 1.0);
        for expected in 1..=MAX_TECHNOLOGY_LEVEL {
            assert_eq!(techs.research(TechnologyKind::Way).unwrap(), expected);
        }
        assert!(techs.is_maxed(TechnologyKind::Way));
        assert!(matches!(
            techs.research(TechnologyKind::Way),
            Err(DissonanceError::TechnologyMaxed(_))
        ));
        assert_eq!(techs.level(TechnologyKind::Swarm), 0);
    }

    #[test]
    fn test_summary_lists_all() {
        let techs = Technologies::default();
        assert_eq!(techs.summary().len(), TechnologyKind::ALL.len());
    }
}
