//! CuriosityEngine — uncertainty, surprise, and novelty tracking, plus the
//! exploration priority queue the curiosity pathway draws from.
//!
//! All trackers key on a
//! [`CoordinateIndex`] cell discretized the same way the spatial grid
//! discretizes a single space, but over all 8 dimensions at once.

use crate::coordinates::{CoordinateExt, CoordinateIndex, NUM_SPACES};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy)]
pub struct UncertaintyCell {
    pub confidence: f32,
    pub visit_count: u64,
    pub last_visit: u64,
    pub running_accuracy: f32,
}

impl Default for UncertaintyCell {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            visit_count: 0,
            last_visit: 0,
            running_accuracy: 0.0,
        }
    }
}

pub struct UncertaintyTracker {
    cells: DashMap<CoordinateIndex, UncertaintyCell>,
    bucket_size: f32,
}

impl UncertaintyTracker {
    pub fn new(bucket_size: f32) -> Self {
        Self {
            cells: DashMap::new(),
            bucket_size,
        }
    }

    fn cell_key(&self, state: &[f32; NUM_SPACES]) -> CoordinateIndex {
        state.as_cell_key(self.bucket_size)
    }

    /// `uncertainty(state) = 1 - confidence[cell]`; an unseen cell is 1.0.
    pub fn uncertainty(&self, state: &[f32; NUM_SPACES]) -> f32 {
        let key = self.cell_key(state);
        match self.cells.get(&key) {
            Some(cell) => 1.0 - cell.confidence,
            None => 1.0,
        }
    }

    /// Record a visit with observed prediction accuracy `a`. Updates
    /// confidence via `visit_factor = 1 - exp(-visits/10)`,
    /// `confidence <- a * visit_factor`.
    pub fn record_visit(&self, state: &[f32; NUM_SPACES], accuracy: f32, at_secs: u64) {
        let key = self.cell_key(state);
        let mut entry = self.cells.entry(key).or_default();
        entry.visit_count += 1;
        let visit_factor = 1.0 - (-(entry.visit_count as f32) / 10.0).exp();
        entry.confidence = (accuracy * visit_factor).clamp(0.0, 1.0);
        let n = entry.visit_count as f32;
        entry.running_accuracy += (accuracy - entry.running_accuracy) / n;
        entry.last_visit = at_secs;
    }

    pub fn get(&self, state: &[f32; NUM_SPACES]) -> Option<UncertaintyCell> {
        self.cells.get(&self.cell_key(state)).map(|c| *c)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop cells older than `max_age_secs` whose visit_count is below
    /// `min_visits`.
    pub fn cleanup(&self, now: u64, max_age_secs: u64, min_visits: u64) {
        self.cells
            .retain(|_, cell| now.saturating_sub(cell.last_visit) < max_age_secs || cell.visit_count >= min_visits);
    }

    /// Top-k most uncertain visited cells, for deriving an exploration
    /// target when the queue is empty.
    pub fn top_uncertain(&self, k: usize) -> Vec<(CoordinateIndex, f32)> {
        let mut all: Vec<(CoordinateIndex, f32)> = self
            .cells
            .iter()
            .map(|e| (*e.key(), 1.0 - e.value().confidence))
            .collect();
        all.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        all.truncate(k);
        all
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SurpriseEvent {
    pub normalized_distance: f32,
    pub at_secs: u64,
}

pub struct SurpriseHistory {
    ring: Mutex<VecDeque<SurpriseEvent>>,
    capacity: usize,
    recent_window: usize,
    running_mean: Mutex<f32>,
    alpha: f32,
}

impl SurpriseHistory {
    pub fn new(capacity: usize, recent_window: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            recent_window,
            running_mean: Mutex::new(0.0),
            alpha: 0.1,
        }
    }

    pub fn record(&self, normalized_distance: f32, at_secs: u64) {
        let mut ring = self.ring.lock();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(SurpriseEvent { normalized_distance, at_secs });
        let mut mean = self.running_mean.lock();
        *mean = self.alpha * normalized_distance + (1.0 - self.alpha) * *mean;
    }

    /// Mean of the last N=`recent_window` surprise events.
    pub fn current_surprise(&self) -> f32 {
        let ring = self.ring.lock();
        let n = self.recent_window.min(ring.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f32 = ring.iter().rev().take(n).map(|e| e.normalized_distance).sum();
        sum / n as f32
    }

    pub fn max_recent_surprise(&self) -> f32 {
        let ring = self.ring.lock();
        let n = self.recent_window.min(ring.len());
        ring.iter()
            .rev()
            .take(n)
            .map(|e| e.normalized_distance)
            .fold(0.0f32, f32::max)
    }

    pub fn ema(&self) -> f32 {
        *self.running_mean.lock()
    }
}

pub struct NoveltyTracker {
    last_seen: DashMap<CoordinateIndex, u64>,
    bucket_size: f32,
}

impl NoveltyTracker {
    pub fn new(bucket_size: f32) -> Self {
        Self {
            last_seen: DashMap::new(),
            bucket_size,
        }
    }

    fn cell_key(&self, state: &[f32; NUM_SPACES]) -> CoordinateIndex {
        state.as_cell_key(self.bucket_size)
    }

    /// `novelty(state)`: unseen cell -> 1.0, else `1 - exp(-dt/3600)`.
    pub fn novelty(&self, state: &[f32; NUM_SPACES], now: u64) -> f32 {
        let key = self.cell_key(state);
        match self.last_seen.get(&key) {
            Some(last) => {
                let dt = now.saturating_sub(*last) as f32;
                1.0 - (-dt / 3600.0).exp()
            }
            None => 1.0,
        }
    }

    pub fn observe(&self, state: &[f32; NUM_SPACES], now: u64) {
        let key = self.cell_key(state);
        self.last_seen.insert(key, now);
    }

    pub fn unique_cells(&self) -> usize {
        self.last_seen.len()
    }

    pub fn cleanup(&self, now: u64, max_age_secs: u64) {
        self.last_seen.retain(|_, last| now.saturating_sub(*last) < max_age_secs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExplorationPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl ExplorationPriority {
    pub fn from_score(score: f32) -> Self {
        if score > 0.8 {
            ExplorationPriority::Critical
        } else if score > 0.6 {
            ExplorationPriority::High
        } else if score > 0.4 {
            ExplorationPriority::Medium
        } else {
            ExplorationPriority::Low
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplorationTarget {
    pub state: [f32; NUM_SPACES],
    pub score: f32,
    pub reason: String,
    pub priority: ExplorationPriority,
    pub created_at: u64,
}

/// Ordering key used by the binary heap: primary by priority, then by
/// score descending, then by earliest created_at.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapKey {
    priority: ExplorationPriority,
    score: f32,
    created_at: u64,
}

impl Eq for HeapKey {}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.score.partial_cmp(&other.score).unwrap_or(std::cmp::Ordering::Equal))
            // earliest created_at should sort "greater" in a max-heap so it pops first among ties
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

struct QueueItem {
    key: HeapKey,
    target: ExplorationTarget,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.key.cmp(&other.key))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Capacity-bounded priority queue with lowest-priority eviction.
pub struct ExplorationQueue {
    heap: Mutex<std::collections::BinaryHeap<QueueItem>>,
    capacity: usize,
}

impl ExplorationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(std::collections::BinaryHeap::new()),
            capacity,
        }
    }

    pub fn push(&self, target: ExplorationTarget) {
        let key = HeapKey {
            priority: target.priority,
            score: target.score,
            created_at: target.created_at,
        };
        let mut heap = self.heap.lock();
        heap.push(QueueItem { key, target });
        if heap.len() > self.capacity {
            evict_lowest(&mut heap);
        }
    }

    pub fn pop(&self) -> Option<ExplorationTarget> {
        self.heap.lock().pop().map(|item| item.target)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `BinaryHeap` only gives O(1) access to the max; eviction of the lowest
/// element requires draining into a vec. Bounded by `capacity`, so this is
/// infrequent (only on overflow) and cheap in absolute terms.
fn evict_lowest(heap: &mut std::collections::BinaryHeap<QueueItem>) {
    let mut items: Vec<QueueItem> = std::mem::take(heap).into_vec();
    if let Some((min_idx, _)) = items
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.key.cmp(&b.key))
    {
        items.remove(min_idx);
    }
    *heap = items.into();
}

pub struct CuriosityConfig {
    pub bucket_size: f32,
    pub surprise_capacity: usize,
    pub surprise_window: usize,
    pub exploration_queue_capacity: usize,
    pub cleanup_interval_secs: u64,
    pub max_cell_age_secs: u64,
    pub min_cell_visits: u64,
}

impl Default for CuriosityConfig {
    fn default() -> Self {
        Self {
            bucket_size: 10.0,
            surprise_capacity: 50,
            surprise_window: 10,
            exploration_queue_capacity: 256,
            cleanup_interval_secs: 300,
            max_cell_age_secs: 86_400,
            min_cell_visits: 2,
        }
    }
}

pub struct CuriosityEngine {
    pub uncertainty: UncertaintyTracker,
    pub surprise: SurpriseHistory,
    pub novelty: NoveltyTracker,
    pub queue: ExplorationQueue,
    config: CuriosityConfig,
}

impl CuriosityEngine {
    pub fn new(config: CuriosityConfig) -> Self {
        Self {
            uncertainty: UncertaintyTracker::new(config.bucket_size),
            surprise: SurpriseHistory::new(config.surprise_capacity, config.surprise_window),
            novelty: NoveltyTracker::new(config.bucket_size),
            queue: ExplorationQueue::new(config.exploration_queue_capacity),
            config,
        }
    }

    pub fn config(&self) -> &CuriosityConfig {
        &self.config
    }

    /// `surprise(predicted, actual) = ||predicted - actual||_2 / sqrt(8)`.
    pub fn normalized_surprise(predicted: &[f32; NUM_SPACES], actual: &[f32; NUM_SPACES]) -> f32 {
        let sum_sq: f32 = predicted
            .iter()
            .zip(actual.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum();
        sum_sq.sqrt() / (NUM_SPACES as f32).sqrt()
    }

    /// Closes the feedback loop after an observer reports `actual_state`
    /// following a chosen intent predicted to reach `predicted_state`.
    pub fn update(&self, predicted_state: &[f32; NUM_SPACES], actual_state: &[f32; NUM_SPACES], now: u64) {
        let distance = Self::normalized_surprise(predicted_state, actual_state);
        self.surprise.record(distance, now);
        let accuracy = 1.0 / (1.0 + distance);
        self.uncertainty.record_visit(actual_state, accuracy, now);
        self.novelty.observe(actual_state, now);
    }

    /// Weighted curiosity score: `c = w_u*uncertainty + w_s*surprise + w_n*novelty`.
    pub fn score(&self, state: &[f32; NUM_SPACES], weights: CuriosityWeights, now: u64) -> f32 {
        weights.w_u * self.uncertainty.uncertainty(state)
            + weights.w_s * self.surprise.current_surprise()
            + weights.w_n * self.novelty.novelty(state, now)
    }

    /// Derive a target from the top-k most uncertain visited cells when the
    /// exploration queue is empty.
    pub fn derive_target_from_uncertainty(&self, k: usize, now: u64) -> Option<ExplorationTarget> {
        let top = self.uncertainty.top_uncertain(k);
        top.into_iter().next().map(|(cell, score)| {
            let mut state = [0.0f32; NUM_SPACES];
            for (i, v) in cell.0.iter().enumerate() {
                state[i] = *v as f32 * self.config.bucket_size;
            }
            ExplorationTarget {
                state,
                score,
                reason: "most-uncertain-cell".into(),
                priority: ExplorationPriority::from_score(score),
                created_at: now,
            }
        })
    }

    pub fn cleanup(&self, now: u64) {
        self.uncertainty
            .cleanup(now, self.config.max_cell_age_secs, self.config.min_cell_visits);
        self.novelty.cleanup(now, self.config.max_cell_age_secs);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CuriosityWeights {
    pub w_u: f32,
    pub w_s: f32,
    pub w_n: f32,
}

impl Default for CuriosityWeights {
    fn default() -> Self {
        Self { w_u: 0.4, w_s: 0.3, w_n: 0.3 }
    }
}

impl CuriosityWeights {
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.w_u + self.w_s + self.w_n;
        if (sum - 1.0).abs() > 0.05 {
            return Err(format!("curiosity weights must sum to ~1.0, got {sum}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_cell_is_fully_uncertain() {
        let tracker = UncertaintyTracker::new(10.0);
        assert_eq!(tracker.uncertainty(&[0.0; NUM_SPACES]), 1.0);
    }

    #[test]
    fn visiting_reduces_uncertainty_over_time() {
        let tracker = UncertaintyTracker::new(10.0);
        let state = [0.0; NUM_SPACES];
        for i in 0..20 {
            tracker.record_visit(&state, 0.9, i);
        }
        assert!(tracker.uncertainty(&state) < 0.5);
    }

    #[test]
    fn s4_novelty_decays_over_a_day() {
        let tracker = NoveltyTracker::new(10.0);
        let state = [0.0; NUM_SPACES];
        assert_eq!(tracker.novelty(&state, 0), 1.0);
        tracker.observe(&state, 0);
        assert!(tracker.novelty(&state, 1) < 1.0);
        assert!(tracker.novelty(&state, 86_400) >= 0.99);
    }

    #[test]
    fn exploration_priority_thresholds() {
        assert_eq!(ExplorationPriority::from_score(0.9), ExplorationPriority::Critical);
        assert_eq!(ExplorationPriority::from_score(0.7), ExplorationPriority::High);
        assert_eq!(ExplorationPriority::from_score(0.5), ExplorationPriority::Medium);
        assert_eq!(ExplorationPriority::from_score(0.1), ExplorationPriority::Low);
    }

    #[test]
    fn queue_pops_highest_priority_first() {
        let q = ExplorationQueue::new(10);
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.5,
            reason: "medium".into(),
            priority: ExplorationPriority::Medium,
            created_at: 0,
        });
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.9,
            reason: "critical".into(),
            priority: ExplorationPriority::Critical,
            created_at: 1,
        });
        assert_eq!(q.pop().unwrap().reason, "critical");
        assert_eq!(q.pop().unwrap().reason, "medium");
    }

    #[test]
    fn queue_ties_break_by_earliest_created_at() {
        let q = ExplorationQueue::new(10);
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.9,
            reason: "second".into(),
            priority: ExplorationPriority::Critical,
            created_at: 5,
        });
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.9,
            reason: "first".into(),
            priority: ExplorationPriority::Critical,
            created_at: 1,
        });
        assert_eq!(q.pop().unwrap().reason, "first");
    }

    #[test]
    fn queue_evicts_lowest_priority_when_full() {
        let q = ExplorationQueue::new(1);
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.1,
            reason: "low".into(),
            priority: ExplorationPriority::Low,
            created_at: 0,
        });
        q.push(ExplorationTarget {
            state: [0.0; NUM_SPACES],
            score: 0.9,
            reason: "critical".into(),
            priority: ExplorationPriority::Critical,
            created_at: 1,
        });
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().unwrap().reason, "critical");
    }

    #[test]
    fn weights_must_sum_near_one() {
        assert!(CuriosityWeights::default().validate().is_ok());
        let bad = CuriosityWeights { w_u: 0.5, w_s: 0.5, w_n: 0.5 };
        assert!(bad.validate().is_err());
    }
}
