//! Read-only view of the match handed to the AI each tick

use ahash::AHashSet;

use crate::core::types::{PlayerId, Position, TimeMs, UnitKind};
use crate::entity::{Player, Potential, PotentialKind};
use crate::field::Field;

/// Everything the AI may look at when deciding; it never mutates the match
pub struct DecisionContext<'a> {
    pub players: &'a [Player],
    pub field: &'a Field,
    pub occupied: &'a AHashSet<Position>,
    pub now: TimeMs,
    own: usize,
}

impl<'a> DecisionContext<'a> {
    pub fn new(
        players: &'a [Player],
        own: PlayerId,
        field: &'a Field,
        occupied: &'a AHashSet<Position>,
        now: TimeMs,
    ) -> Option<Self> {
        (own.0 < players.len()).then_some(Self {
            players,
            field,
            occupied,
            now,
            own: own.0,
        })
    }

    pub fn player(&self) -> &'a Player {
        &self.players[self.own]
    }

    pub fn own_nucleus(&self) -> Option<Position> {
        self.player().nuclei().first().copied()
    }

    pub fn count(&self, kind: UnitKind) -> usize {
        self.player().neurons().filter(|n| n.unit_kind() == kind).count()
    }

    /// Enemies still in the match
    pub fn live_enemies(&self) -> Vec<&'a Player> {
        let player = self.player();
        player
            .enemies()
            .iter()
            .filter_map(|id| self.players.get(id.0))
            .filter(|p| !p.has_lost())
            .collect()
    }

    /// The live enemy whose nucleus is closest to ours
    pub fn primary_enemy(&self) -> Option<&'a Player> {
        let home = self.own_nucleus()?;
        self.live_enemies()
            .into_iter()
            .filter_map(|enemy| enemy.nuclei().first().map(|n| (enemy, n.distance(&home))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(enemy, _)| enemy)
    }

    pub fn enemy_nucleus(&self) -> Option<Position> {
        self.primary_enemy()?.nuclei().first().copied()
    }

    /// Enemy epsps heading for one of our neurons
    pub fn incoming_epsps(&self) -> Vec<&'a Potential> {
        let player = self.player();
        self.live_enemies()
            .into_iter()
            .flat_map(|enemy| enemy.potentials())
            .filter(|p| p.kind == PotentialKind::Epsp && player.neuron(p.target).is_some())
            .collect()
    }

    /// Our activated neurons in reach of at least one of `threats` somewhere
    /// on its remaining path
    pub fn defenders_on(&self, threats: &[&Potential], radius: f64) -> usize {
        self.player()
            .neuron_positions(Some(UnitKind::ActivatedNeuron))
            .into_iter()
            .filter(|defender| {
                threats.iter().any(|threat| {
                    std::iter::once(&threat.position)
                        .chain(threat.remaining())
                        .any(|cell| defender.distance(cell) <= radius)
                })
            })
            .count()
    }
}
