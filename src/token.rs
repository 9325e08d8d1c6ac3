//! Token — the atomic unit of the runtime store.
//!
//! An id is never reused; `ACTIVE` tokens are the
//! only ones indexed in the spatial grid.

use crate::coordinates::{coords8_finite, Coords8, NUM_SPACES};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub type TokenId = u32;

/// Bit flags packed into `Token::flags`.
pub mod flags {
    pub const ACTIVE: u8 = 1 << 0;
    pub const PINNED: u8 = 1 << 1;
    pub const DECAYED: u8 = 1 << 2;
}

/// Small enum distinguishing what kind of thing a Token denotes. Opaque to
/// the engine beyond dispatch — no behavior branches on it except storage
/// bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityType {
    Concept = 0,
    Event = 1,
    Percept = 2,
    Goal = 3,
    Other = 255,
}

/// Per-dimension scale factors a coordinate is interpreted with; stable for
/// the process lifetime, owned by CDNA rather than per-token, but exposed
/// here for distance normalization callers who do not hold a CDNA handle.
pub const SCALE_FACTORS: [f32; NUM_SPACES] = [1.0; NUM_SPACES];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub coords: Coords8,
    pub weight: f32,
    pub entity_type: EntityType,
    pub flags: u8,
    pub field_radius: f32,
    pub field_strength: f32,
    pub created_at: u64,
    pub last_seen_at: u64,
}

impl Token {
    pub fn is_active(&self) -> bool {
        self.flags & flags::ACTIVE != 0
    }

    pub fn set_active(&mut self, active: bool) {
        if active {
            self.flags |= flags::ACTIVE;
        } else {
            self.flags &= !flags::ACTIVE;
        }
    }

    pub fn coords_finite(&self) -> bool {
        coords8_finite(&self.coords)
    }
}

/// Caller-supplied shape for create/update — mirrors `Token` minus the id
/// and timestamps the store assigns itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPrototype {
    pub coords: Coords8,
    pub weight: f32,
    pub entity_type: EntityType,
    pub flags: u8,
    pub field_radius: f32,
    pub field_strength: f32,
}

impl TokenPrototype {
    pub fn validate(&self) -> Result<(), String> {
        if !coords8_finite(&self.coords) {
            return Err("token coordinates must be finite".into());
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err("token weight must be in [0,1]".into());
        }
        Ok(())
    }

    pub(crate) fn into_token(self, id: TokenId, now: u64) -> Token {
        Token {
            id,
            coords: self.coords,
            weight: self.weight,
            entity_type: self.entity_type,
            flags: self.flags,
            field_radius: self.field_radius,
            field_strength: self.field_strength,
            created_at: now,
            last_seen_at: now,
        }
    }
}

/// Monotonic timestamp in microseconds since the epoch, used for
/// `created_at`/`last_seen_at` fields across the crate.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto() -> TokenPrototype {
        TokenPrototype {
            coords: [[0.0, 0.0, 0.0]; NUM_SPACES],
            weight: 0.5,
            entity_type: EntityType::Concept,
            flags: flags::ACTIVE,
            field_radius: 1.0,
            field_strength: 1.0,
        }
    }

    #[test]
    fn active_flag_roundtrips() {
        let mut t = proto().into_token(1, 0);
        assert!(t.is_active());
        t.set_active(false);
        assert!(!t.is_active());
    }

    #[test]
    fn rejects_non_finite_coords() {
        let mut p = proto();
        p.coords[0][0] = f32::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let mut p = proto();
        p.weight = 1.5;
        assert!(p.validate().is_err());
    }
}
