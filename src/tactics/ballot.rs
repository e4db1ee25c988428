//! Weighted ballots with a deterministic winner

use serde::{Deserialize, Serialize};

/// Votes over a fixed, ordered set of candidates
///
/// The winner is the candidate with the highest weight; on a tie the one
/// listed first wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot<K> {
    votes: Vec<(K, u32)>,
}

impl<K: Copy + PartialEq> Ballot<K> {
    pub fn new(candidates: &[K]) -> Self {
        Self {
            votes: candidates.iter().map(|k| (*k, 0)).collect(),
        }
    }

    pub fn add(&mut self, candidate: K, weight: u32) {
        if let Some(entry) = self.votes.iter_mut().find(|(k, _)| *k == candidate) {
            entry.1 += weight;
        }
    }

    /// Vote for the candidate at `index` (wrapping)
    pub fn add_nth(&mut self, index: usize, weight: u32) {
        if self.votes.is_empty() {
            return;
        }
        let len = self.votes.len();
        self.votes[index % len].1 += weight;
    }

    pub fn weight(&self, candidate: K) -> u32 {
        self.votes
            .iter()
            .find(|(k, _)| *k == candidate)
            .map(|(_, w)| *w)
            .unwrap_or(0)
    }

    pub fn winner(&self) -> Option<K> {
        let mut best: Option<(K, u32)> = None;
        for &(k, w) in &self.votes {
            if best.map_or(true, |(_, bw)| w > bw) {
                best = Some((k, w));
            }
        }
        best.map(|(k, _)| k)
    }

    /// Candidates from strongest to weakest, ties in declaration order
    pub fn ranking(&self) -> Vec<K> {
        let mut ranked: Vec<(usize, K, u32)> = self
            .votes
            .iter()
            .enumerate()
            .map(|(i, (k, w))| (i, *k, *w))
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        ranked.into_iter().map(|(_, k, _)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_weight_wins() {
        let mut ballot = Ballot::new(&['a', 'b', 'c']);
        ballot.add('b', 2);
        ballot.add('c', 1);
        assert_eq!(ballot.winner(), Some('b'));
        assert_eq!(ballot.weight('b'), 2);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let mut ballot = Ballot::new(&['a', 'b', 'c']);
        ballot.add('c', 3);
        ballot.add('b', 3);
        assert_eq!(ballot.winner(), Some('b'));
        assert_eq!(ballot.ranking(), vec!['b', 'c', 'a']);
        assert_eq!(Ballot::new(&['x', 'y']).winner(), Some('x'));
    }

    #[test]
    fn test_add_nth_wraps() {
        let mut ballot = Ballot::new(&[1, 2, 3]);
        ballot.add_nth(4, 5);
        assert_eq!(ballot.weight(2), 5);
        ballot.add(9, 1);
        assert_eq!(ballot.ranking()[0], 2);
    }
}
