//! Associative reflex memory for the Arbiter's Fast path: an O(ns-µs)
//! nearest-neighbor lookup against learned experience. A spatial hash
//! narrows candidates to a handful sharing a coarse bucket, then an exact
//! similarity check against each candidate picks the match (or none).

use crate::coordinates::NUM_SPACES;
use dashmap::DashMap;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct ShiftConfig {
    pub default: u8,
    pub per_dimension: [Option<u8>; NUM_SPACES],
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            default: 6,
            per_dimension: [None; NUM_SPACES],
        }
    }
}

impl ShiftConfig {
    pub fn shift_for(&self, dim: usize) -> u8 {
        self.per_dimension.get(dim).copied().flatten().unwrap_or(self.default)
    }
}

/// Quantize + mix an 8D state vector into a single spatial hash via
/// per-dimension shift and XOR-rotate dispersion.
pub fn compute_grid_hash(state: &[f32; NUM_SPACES], shift: &ShiftConfig) -> u64 {
    let mut hash: u64 = 0;
    for (dim_idx, v) in state.iter().enumerate() {
        let dim_shift = shift.shift_for(dim_idx);
        let quantized = (*v as i64 as u64).wrapping_shr(dim_shift as u32);
        let rotation = 13 + (dim_idx as u32) * 7;
        let dim_hash = quantized ^ (dim_idx as u64).rotate_left(rotation);
        hash ^= dim_hash.rotate_left(rotation);
    }
    hash
}

fn euclidean_similarity(a: &[f32; NUM_SPACES], b: &[f32; NUM_SPACES]) -> f32 {
    let sum_sq: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    1.0 / (1.0 + sum_sq.sqrt())
}

pub struct ExperienceEntry {
    pub id: u64,
    pub state: [f32; NUM_SPACES],
    pub action_type: String,
    pub parameters: Value,
    pub estimated_reward: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssociativeStats {
    pub total_lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub collisions: u64,
}

impl AssociativeStats {
    pub fn hit_rate(&self) -> f32 {
        if self.total_lookups == 0 {
            0.0
        } else {
            self.hits as f32 / self.total_lookups as f32
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FastPathResult {
    pub experience_id: u64,
    pub lookup_ns: u64,
    pub similarity: f32,
}

pub struct FastPathConfig {
    pub shift: ShiftConfig,
    pub similarity_threshold: f32,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            shift: ShiftConfig::default(),
            similarity_threshold: 0.9,
        }
    }
}

/// Maps spatial hashes to candidate experience ids (lock-free, DashMap
/// sharded internally), with the experiences themselves in a second map.
pub struct AssociativeMemory {
    hash_index: DashMap<u64, SmallVec<[u64; 4]>>,
    experiences: DashMap<u64, ExperienceEntry>,
    next_id: AtomicU64,
    stats: parking_lot::Mutex<AssociativeStats>,
}

impl Default for AssociativeMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociativeMemory {
    pub fn new() -> Self {
        Self {
            hash_index: DashMap::new(),
            experiences: DashMap::new(),
            next_id: AtomicU64::new(1),
            stats: parking_lot::Mutex::new(AssociativeStats::default()),
        }
    }

    pub fn insert(
        &self,
        state: [f32; NUM_SPACES],
        action_type: impl Into<String>,
        parameters: Value,
        estimated_reward: f32,
        shift: &ShiftConfig,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let hash = compute_grid_hash(&state, shift);
        self.hash_index.entry(hash).or_insert_with(SmallVec::new).push(id);
        self.experiences.insert(
            id,
            ExperienceEntry {
                id,
                state,
                action_type: action_type.into(),
                parameters,
                estimated_reward,
            },
        );
        id
    }

    /// Probe for a cached reflex near `state`. Returns `None` when no
    /// candidate clears `config.similarity_threshold`.
    pub fn probe(&self, state: &[f32; NUM_SPACES], config: &FastPathConfig) -> Option<(FastPathResult, String, Value, f32)> {
        let start = std::time::Instant::now();
        let hash = compute_grid_hash(state, &config.shift);

        let mut stats = self.stats.lock();
        stats.total_lookups += 1;
        let candidates = match self.hash_index.get(&hash) {
            Some(c) => c.clone(),
            None => {
                stats.misses += 1;
                return None;
            }
        };
        if candidates.len() > 1 {
            stats.collisions += 1;
        }
        drop(stats);

        let mut best: Option<(f32, ExperienceEntry)> = None;
        for candidate_id in candidates {
            if let Some(entry) = self.experiences.get(&candidate_id) {
                let sim = euclidean_similarity(state, &entry.state);
                if best.as_ref().map(|(s, _)| sim > *s).unwrap_or(true) {
                    best = Some((
                        sim,
                        ExperienceEntry {
                            id: entry.id,
                            state: entry.state,
                            action_type: entry.action_type.clone(),
                            parameters: entry.parameters.clone(),
                            estimated_reward: entry.estimated_reward,
                        },
                    ));
                }
            }
        }

        match best {
            Some((sim, entry)) if sim >= config.similarity_threshold => {
                self.stats.lock().hits += 1;
                Some((
                    FastPathResult {
                        experience_id: entry.id,
                        lookup_ns: start.elapsed().as_nanos() as u64,
                        similarity: sim,
                    },
                    entry.action_type,
                    entry.parameters,
                    entry.estimated_reward,
                ))
            }
            _ => {
                self.stats.lock().misses += 1;
                None
            }
        }
    }

    pub fn stats(&self) -> AssociativeStats {
        *self.stats.lock()
    }

    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_probes_with_high_similarity() {
        let mem = AssociativeMemory::new();
        let shift = ShiftConfig::default();
        let state = [1.0; NUM_SPACES];
        mem.insert(state, "respond", Value::Null, 0.5, &shift);
        let config = FastPathConfig { shift, similarity_threshold: 0.9 };
        let result = mem.probe(&state, &config);
        assert!(result.is_some());
        assert_eq!(result.unwrap().0.similarity, 1.0);
    }

    #[test]
    fn far_state_misses() {
        let mem = AssociativeMemory::new();
        let shift = ShiftConfig::default();
        mem.insert([0.0; NUM_SPACES], "respond", Value::Null, 0.5, &shift);
        let config = FastPathConfig { shift, similarity_threshold: 0.99 };
        let far = [1000.0; NUM_SPACES];
        assert!(mem.probe(&far, &config).is_none());
    }
}
