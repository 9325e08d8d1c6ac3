//! SignalSystem — the event-bus heart of the core.
//!
//! `emit` normalizes a [`SignalEvent`], registers its
//! type, dispatches to matched subscribers, consults [`CuriosityEngine`]
//! for novelty, looks up spatial neighbors in L1 via [`RuntimeStore`], and
//! returns a [`ProcessingResult`]. The hot path never suspends.

use crate::coordinates::CoordinateSpace;
use crate::curiosity::CuriosityEngine;
use crate::event_registry::EventTypeRegistry;
use crate::filter::CompiledFilter;
use crate::metrics;
use crate::runtime_store::RuntimeStore;
use crate::signal_event::SignalEvent;
use crate::subscriber::{DeliveryOutcome, Subscriber, SubscriberEvent, SubscriberId};
use crate::token::TokenId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A neighbor found in L1 around the event's projected position. The
/// "resonance" is this core's own pass-through scalar, `1/(1+distance)`;
/// a collaborator wanting a richer model can recompute it from `distance`.
#[derive(Debug, Clone, Copy)]
pub struct NeighborRecord {
    pub token_id: TokenId,
    pub distance: f32,
    pub resonance: f32,
    pub layer_affinity: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub neuro_tick: u64,
    pub token_id: Option<TokenId>,
    pub is_novel: bool,
    pub anomaly_score: f32,
    pub max_recent_anomaly_score: f32,
    pub neighbors: Vec<NeighborRecord>,
    /// Always empty until a policy engine is wired in.
    pub triggered_actions: Vec<u64>,
    pub processing_time_us: u64,
}

pub struct SignalSystemConfig {
    pub neighbor_radius: f32,
    pub max_neighbors: usize,
    /// A state's novelty must clear this to count as `is_novel`: a first
    /// emit at a given state reads true, a re-emit moments later false.
    pub novelty_threshold: f32,
    pub push_max_failures: u32,
}

impl Default for SignalSystemConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: 10.0,
            max_neighbors: 16,
            novelty_threshold: 0.99,
            push_max_failures: 5,
        }
    }
}

pub struct SignalSystem {
    config: SignalSystemConfig,
    registry: EventTypeRegistry,
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    neuro_tick: AtomicU64,
    store: Arc<RuntimeStore>,
    curiosity: Arc<CuriosityEngine>,
}

impl SignalSystem {
    pub fn new(config: SignalSystemConfig, store: Arc<RuntimeStore>, curiosity: Arc<CuriosityEngine>) -> Self {
        Self {
            config,
            registry: EventTypeRegistry::new(),
            subscribers: RwLock::new(Vec::new()),
            neuro_tick: AtomicU64::new(0),
            store,
            curiosity,
        }
    }

    pub fn registry(&self) -> &EventTypeRegistry {
        &self.registry
    }

    pub fn subscribe_polling(&self, name: impl Into<String>, filter: CompiledFilter) -> crate::subscriber::PollingHandle {
        let (sub, handle) = Subscriber::new_polling(name, filter);
        self.subscribers.write().push(sub);
        handle
    }

    pub fn subscribe_push(
        &self,
        name: impl Into<String>,
        filter: CompiledFilter,
        sender: crossbeam_channel::Sender<SubscriberEvent>,
    ) {
        let sub = Subscriber::new_push(name, filter, sender, self.config.push_max_failures);
        self.subscribers.write().push(sub);
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Accept and process one [`SignalEvent`]: validate, stamp a neuro
    /// tick, intern the event type, dispatch to subscribers, score
    /// novelty/surprise, look up spatial neighbors, and return a result.
    pub fn emit(&self, mut event: SignalEvent) -> crate::error::Result<ProcessingResult> {
        event.validate()?;
        let start = Instant::now();

        let neuro_tick = self.neuro_tick.fetch_add(1, Ordering::SeqCst) + 1;
        event.temporal.neuro_tick = neuro_tick;
        event.temporal.created_at_us = crate::token::now_micros();

        let _event_type_id = self.registry.intern(&event.event_type);

        let (filter_matches, filter_misses) = self.dispatch(&event);
        metrics::FILTER_MATCHES.inc_by(filter_matches as u64);
        metrics::FILTER_MISSES.inc_by(filter_misses as u64);

        let now_secs = crate::curiosity::now_secs();
        let novelty = self.curiosity.novelty.novelty(&event.semantic_vector, now_secs);
        let is_novel = novelty >= self.config.novelty_threshold;
        self.curiosity.novelty.observe(&event.semantic_vector, now_secs);

        let anomaly_score = self.curiosity.surprise.current_surprise();
        let max_recent_anomaly_score = self.curiosity.surprise.max_recent_surprise();

        let center = [event.semantic_vector[CoordinateSpace::L1Physical.index()], 0.0, 0.0];
        let hits = self
            .store
            .range_query(CoordinateSpace::L1Physical, center, self.config.neighbor_radius);
        let neighbors: Vec<NeighborRecord> = hits
            .into_iter()
            .take(self.config.max_neighbors)
            .map(|hit| NeighborRecord {
                token_id: hit.token_id,
                distance: hit.distance,
                resonance: 1.0 / (1.0 + hit.distance),
                layer_affinity: event
                    .layer_affinities
                    .map(|l| l[CoordinateSpace::L1Physical.index()]),
            })
            .collect();
        let token_id = neighbors.first().map(|n| n.token_id);

        let processing_time_us = start.elapsed().as_micros() as u64;

        metrics::EVENTS_TOTAL.inc();
        metrics::EVENTS_BY_TYPE
            .with_label_values(&[event.event_type.as_str()])
            .inc();
        metrics::EMIT_DURATION_US
            .with_label_values(&[event.event_type.as_str()])
            .observe(processing_time_us as f64);

        Ok(ProcessingResult {
            neuro_tick,
            token_id,
            is_novel,
            anomaly_score,
            max_recent_anomaly_score,
            neighbors,
            triggered_actions: Vec::new(),
            processing_time_us,
        })
    }

    /// Test every subscriber's compiled filter and deliver on match.
    /// Returns (matches, misses); a subscriber repeatedly backpressuring
    /// is pruned before returning.
    fn dispatch(&self, event: &SignalEvent) -> (usize, usize) {
        let mut matches = 0;
        let mut misses = 0;
        let mut removed = Vec::new();
        {
            let subs = self.subscribers.read();
            for sub in subs.iter() {
                if sub.filter.matches(event) {
                    matches += 1;
                    let outcome = sub.deliver(SubscriberEvent {
                        event_type: event.event_type.clone(),
                        neuro_tick: event.temporal.neuro_tick,
                    });
                    match outcome {
                        DeliveryOutcome::Delivered => metrics::SUBSCRIBER_NOTIFICATIONS.inc(),
                        DeliveryOutcome::Removed => removed.push(sub.id),
                        DeliveryOutcome::Dropped => {}
                    }
                } else {
                    misses += 1;
                }
            }
        }
        if !removed.is_empty() {
            self.subscribers.write().retain(|s| !removed.contains(&s.id));
        }
        (matches, misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::NUM_SPACES;
    use crate::curiosity::CuriosityConfig;
    use crate::filter::{ConditionSpec, EventTypePattern, FilterCompiler, FilterSpec, LogicSpec};
    use crate::grid::GridConfig;
    use crate::guardian::{Guardian, GuardianConfig};

    fn system() -> SignalSystem {
        let store = Arc::new(RuntimeStore::new(
            Arc::new(Guardian::new(GuardianConfig::default())),
            GridConfig::default(),
        ));
        let curiosity = Arc::new(CuriosityEngine::new(CuriosityConfig::default()));
        SignalSystem::new(SignalSystemConfig::default(), store, curiosity)
    }

    fn event(event_type: &str) -> SignalEvent {
        SignalEvent::new(event_type, [0.0; NUM_SPACES])
    }

    #[test]
    fn neuro_tick_strictly_increases() {
        let sys = system();
        let r1 = sys.emit(event("a")).unwrap();
        let r2 = sys.emit(event("a")).unwrap();
        assert!(r2.neuro_tick > r1.neuro_tick);
    }

    #[test]
    fn s4_novelty_flips_on_second_identical_emit() {
        let sys = system();
        let r1 = sys.emit(event("signal.input.text")).unwrap();
        let r2 = sys.emit(event("signal.input.text")).unwrap();
        assert!(r1.is_novel);
        assert!(!r2.is_novel);
    }

    #[test]
    fn invariant3_matches_plus_misses_equals_subscribers_tested() {
        let sys = system();
        let compiler = FilterCompiler::new();
        let filter = compiler
            .compile(&FilterSpec {
                logic: LogicSpec::Leaf(ConditionSpec::EventType(EventTypePattern::Exact("a".into()))),
            })
            .unwrap();
        let _handle = sys.subscribe_polling("only-a", filter);
        assert_eq!(sys.subscriber_count(), 1);
        let result = sys.emit(event("b"));
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_non_finite_vector() {
        let sys = system();
        let mut e = event("a");
        e.semantic_vector[0] = f32::NAN;
        assert!(sys.emit(e).is_err());
    }

    #[test]
    fn triggered_actions_is_always_empty() {
        let sys = system();
        let result = sys.emit(event("a")).unwrap();
        assert!(result.triggered_actions.is_empty());
    }
}
