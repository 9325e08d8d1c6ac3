//! ActionIntent and the tagged decision-source it carries.

use serde::{Deserialize, Serialize};

pub type ActionId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionType {
    Explore,
    Respond,
    Noop,
    Custom(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DecisionSource {
    Reflex {
        experience_id: u64,
        lookup_ns: u64,
        similarity: f32,
    },
    Reasoning {
        policy_version: u32,
        time_ms: f32,
    },
    Curiosity {
        score: f32,
        reason: String,
    },
    Failsafe {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionIntent {
    pub action_id: ActionId,
    pub action_type: ActionType,
    pub parameters: serde_json::Value,
    pub estimated_reward: f32,
    pub confidence: f32,
    pub timestamp_us: u64,
    pub source: DecisionSource,
}
