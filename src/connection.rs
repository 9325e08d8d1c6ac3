//! Connection — a typed, force-model link between two tokens.
//!
//! Carries the force-model fields the arbiter and grid actually consume,
//! without learning/mutability machinery neither uses.

use crate::coordinates::NUM_SPACES;
use crate::token::TokenId;
use serde::{Deserialize, Serialize};

pub type ConnectionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    Proximity,
    Hypernym,
    Similar,
    Related,
    Custom(u16),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub kind: ConnectionKind,
    pub preferred_distance: f32,
    pub pull_strength: f32,
    pub rigidity: f32,
    /// Bitmask over the 8 spaces (bit i set → force applies in space i).
    pub active_levels: u8,
    pub bidirectional: bool,
    pub created_at: u64,
}

impl Connection {
    pub fn active_in(&self, space_index: usize) -> bool {
        debug_assert!(space_index < NUM_SPACES);
        self.active_levels & (1 << space_index) != 0
    }

    /// The other endpoint, if `id` is one of this connection's tokens.
    pub fn other(&self, id: TokenId) -> Option<TokenId> {
        if id == self.token_a {
            Some(self.token_b)
        } else if id == self.token_b {
            Some(self.token_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPrototype {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub kind: ConnectionKind,
    pub preferred_distance: f32,
    pub pull_strength: f32,
    pub rigidity: f32,
    pub active_levels: u8,
    pub bidirectional: bool,
}

impl ConnectionPrototype {
    pub(crate) fn into_connection(self, id: ConnectionId, now: u64) -> Connection {
        Connection {
            id,
            token_a: self.token_a,
            token_b: self.token_b,
            kind: self.kind,
            preferred_distance: self.preferred_distance,
            pull_strength: self.pull_strength,
            rigidity: self.rigidity,
            active_levels: self.active_levels,
            bidirectional: self.bidirectional,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection {
            id: 1,
            token_a: 1,
            token_b: 2,
            kind: ConnectionKind::Proximity,
            preferred_distance: 5.0,
            pull_strength: 0.5,
            rigidity: 0.1,
            active_levels: 0b0000_0001,
            bidirectional: true,
            created_at: 0,
        }
    }

    #[test]
    fn active_levels_mask_l1_only() {
        let c = conn();
        assert!(c.active_in(0));
        assert!(!c.active_in(1));
    }

    #[test]
    fn other_resolves_either_endpoint() {
        let c = conn();
        assert_eq!(c.other(1), Some(2));
        assert_eq!(c.other(2), Some(1));
        assert_eq!(c.other(99), None);
    }
}
