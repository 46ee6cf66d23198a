// VoteTally - decaying per-key scores that turn noisy window estimates into
// one stable displayed key.
//
// Owned exclusively by the analysis thread; no synchronisation needed.

use super::key::{Key, KEY_COUNT};
use crate::config::DEFAULT_VOTE_DECAY;

/// Exponentially decaying vote tally over the 24 keys
#[derive(Debug, Clone)]
pub struct VoteTally {
    scores: [f32; KEY_COUNT],
    decay: f32,
    leader: Option<Key>,
}

impl VoteTally {
    /// Create an empty tally
    ///
    /// # Arguments
    /// * `decay` - Retention factor applied to all scores per vote, in (0, 1)
    pub fn new(decay: f32) -> Self {
        Self {
            scores: [0.0; KEY_COUNT],
            decay,
            leader: None,
        }
    }

    /// Cast one vote and return the new leader
    ///
    /// Every score is decayed, the voted key gains 1.0, and the leader is the
    /// strictly largest score in enumerant order (ties keep the lower index).
    pub fn cast(&mut self, key: Key) -> Key {
        for score in self.scores.iter_mut() {
            *score *= self.decay;
        }
        self.scores[key.index()] += 1.0;

        let leader = self.scan_leader().unwrap_or(key);
        self.leader = Some(leader);
        leader
    }

    fn scan_leader(&self) -> Option<Key> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in self.scores.iter().enumerate() {
            let beats = match best {
                Some((_, best_score)) => score > best_score,
                None => score > 0.0,
            };
            if beats {
                best = Some((index, score));
            }
        }
        best.and_then(|(index, _)| Key::from_index(index))
    }

    /// Current leader, `None` until the first vote
    pub fn leader(&self) -> Option<Key> {
        self.leader
    }

    pub fn score(&self, key: Key) -> f32 {
        self.scores[key.index()]
    }

    /// Leader score as a share of the total, 0.0 when empty
    pub fn confidence(&self) -> f32 {
        let total: f32 = self.scores.iter().sum();
        match self.leader {
            Some(key) if total > 0.0 => self.scores[key.index()] / total,
            _ => 0.0,
        }
    }

    /// Zero every score and forget the leader
    pub fn reset(&mut self) {
        self.scores = [0.0; KEY_COUNT];
        self.leader = None;
    }
}

impl Default for VoteTally {
    fn default() -> Self {
        Self::new(DEFAULT_VOTE_DECAY)
    }
}
