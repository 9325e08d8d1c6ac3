//! ActionController — the tri-pathway arbiter choosing how a state gets
//! turned into an [`ActionIntent`].
//!
//! Four pathways, tried in order: Curiosity (explore when the curiosity
//! score clears a threshold), Fast/Reflex (nearest-neighbor lookup in
//! learned experience, nanosecond-scale), Slow/Reasoning (a collaborator
//! contract — this core only defines the trait, never a real planner), and
//! Failsafe when every other pathway declines or errors.

use crate::action_types::{ActionId, ActionIntent, ActionType, DecisionSource};
use crate::coordinates::NUM_SPACES;
use crate::curiosity::{CuriosityEngine, CuriosityWeights};
use crate::experience::{AssociativeMemory, FastPathConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Collaborator contract for the Slow/Reasoning pathway. The core never
/// implements this itself; an embedding process supplies a real
/// planner/LLM/policy engine.
#[async_trait]
pub trait ReasoningCollaborator: Send + Sync {
    async fn reason(&self, state: &[f32; NUM_SPACES]) -> Option<(ActionType, Value, f32, f32)>;
}

/// Reasoning collaborator that always declines, used when no planner is
/// wired in. The arbiter then falls through to Failsafe.
pub struct NoReasoningCollaborator;

#[async_trait]
impl ReasoningCollaborator for NoReasoningCollaborator {
    async fn reason(&self, _state: &[f32; NUM_SPACES]) -> Option<(ActionType, Value, f32, f32)> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterState {
    Idle,
    Arbitrating,
    Curiosity,
    Fast,
    Slow,
    Failsafe,
    Emitted,
}

pub struct ArbiterConfig {
    pub curiosity_threshold: f32,
    pub curiosity_weights: CuriosityWeights,
    pub fast_path: FastPathConfig,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            curiosity_threshold: 0.75,
            curiosity_weights: CuriosityWeights::default(),
            fast_path: FastPathConfig::default(),
        }
    }
}

pub struct Arbiter {
    config: ArbiterConfig,
    curiosity: Arc<CuriosityEngine>,
    experience: Arc<AssociativeMemory>,
    reasoning: Arc<dyn ReasoningCollaborator>,
    next_action_id: AtomicU64,
}

impl Arbiter {
    pub fn new(
        config: ArbiterConfig,
        curiosity: Arc<CuriosityEngine>,
        experience: Arc<AssociativeMemory>,
        reasoning: Arc<dyn ReasoningCollaborator>,
    ) -> Self {
        Self {
            config,
            curiosity,
            experience,
            reasoning,
            next_action_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> ActionId {
        self.next_action_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run the full pathway cascade for `state`, returning the chosen
    /// [`ActionIntent`]. Never errors: a pathway that declines or fails is
    /// simply skipped, and Failsafe always succeeds.
    pub async fn decide(&self, state: &[f32; NUM_SPACES]) -> ActionIntent {
        let now = crate::token::now_micros();

        let curiosity_score = self.curiosity.score(state, self.config.curiosity_weights, now / 1_000_000);
        if curiosity_score >= self.config.curiosity_threshold {
            if let Some(target) = self.next_curiosity_target(state, curiosity_score, now) {
                return target;
            }
        }

        if let Some((result, action_type, parameters, estimated_reward)) =
            self.experience.probe(state, &self.config.fast_path)
        {
            return ActionIntent {
                action_id: self.next_id(),
                action_type: ActionType::Custom(action_type),
                parameters,
                estimated_reward,
                confidence: result.similarity,
                timestamp_us: now,
                source: DecisionSource::Reflex {
                    experience_id: result.experience_id,
                    lookup_ns: result.lookup_ns,
                    similarity: result.similarity,
                },
            };
        }

        let reasoning_start = std::time::Instant::now();
        if let Some((action_type, parameters, estimated_reward, confidence)) = self.reasoning.reason(state).await {
            return ActionIntent {
                action_id: self.next_id(),
                action_type,
                parameters,
                estimated_reward,
                confidence,
                timestamp_us: now,
                source: DecisionSource::Reasoning {
                    policy_version: 0,
                    time_ms: reasoning_start.elapsed().as_secs_f32() * 1000.0,
                },
            };
        }

        ActionIntent {
            action_id: self.next_id(),
            action_type: ActionType::Noop,
            parameters: Value::Null,
            estimated_reward: 0.0,
            confidence: 0.0,
            timestamp_us: now,
            source: DecisionSource::Failsafe {
                reason: "no pathway produced an action".into(),
            },
        }
    }

    /// Pop the highest-priority exploration target, or derive one from the
    /// most uncertain visited cell when the queue is empty.
    fn next_curiosity_target(&self, state: &[f32; NUM_SPACES], score: f32, now_us: u64) -> Option<ActionIntent> {
        let _ = state;
        let target = self
            .curiosity
            .queue
            .pop()
            .or_else(|| self.curiosity.derive_target_from_uncertainty(1, now_us / 1_000_000))?;
        Some(ActionIntent {
            action_id: self.next_id(),
            action_type: ActionType::Explore,
            parameters: serde_json::json!({ "target_state": target.state, "reason": target.reason }),
            estimated_reward: target.score,
            confidence: score,
            timestamp_us: now_us,
            source: DecisionSource::Curiosity {
                score,
                reason: target.reason,
            },
        })
    }

    /// Close the loop after an observer reports what actually happened
    /// following a chosen intent.
    pub fn update(&self, predicted_state: &[f32; NUM_SPACES], actual_state: &[f32; NUM_SPACES]) {
        let now = crate::curiosity::now_secs();
        self.curiosity.update(predicted_state, actual_state, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curiosity::CuriosityConfig;

    fn arbiter() -> Arbiter {
        Arbiter::new(
            ArbiterConfig::default(),
            Arc::new(CuriosityEngine::new(CuriosityConfig::default())),
            Arc::new(AssociativeMemory::new()),
            Arc::new(NoReasoningCollaborator),
        )
    }

    #[tokio::test]
    async fn falls_back_to_failsafe_when_nothing_else_fires() {
        let arb = arbiter();
        let intent = arb.decide(&[0.0; NUM_SPACES]).await;
        assert!(matches!(intent.source, DecisionSource::Failsafe { .. }));
    }

    #[tokio::test]
    async fn reflex_path_wins_on_a_cached_state() {
        let arb = arbiter();
        let state = [1.0; NUM_SPACES];
        arb.experience.insert(
            state,
            "respond",
            serde_json::Value::Null,
            0.5,
            &arb.config.fast_path.shift,
        );
        let intent = arb.decide(&state).await;
        assert!(matches!(intent.source, DecisionSource::Reflex { .. }));
    }

    struct AlwaysReasons;

    #[async_trait]
    impl ReasoningCollaborator for AlwaysReasons {
        async fn reason(&self, _state: &[f32; NUM_SPACES]) -> Option<(ActionType, Value, f32, f32)> {
            Some((ActionType::Respond, Value::Null, 0.8, 0.9))
        }
    }

    #[tokio::test]
    async fn reasoning_path_used_when_reflex_misses() {
        let arb = Arbiter::new(
            ArbiterConfig::default(),
            Arc::new(CuriosityEngine::new(CuriosityConfig::default())),
            Arc::new(AssociativeMemory::new()),
            Arc::new(AlwaysReasons),
        );
        let intent = arb.decide(&[2.0; NUM_SPACES]).await;
        assert!(matches!(intent.source, DecisionSource::Reasoning { .. }));
    }

    #[tokio::test]
    async fn update_feeds_curiosity_engine() {
        let arb = arbiter();
        arb.update(&[0.0; NUM_SPACES], &[5.0; NUM_SPACES]);
        assert!(!arb.curiosity.uncertainty.is_empty());
    }
}
