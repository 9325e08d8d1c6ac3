//! SignalEvent — the input to [`crate::signal_system::SignalSystem::emit`].
//!
//! Carries identification, a source energy profile, temporal placement,
//! routing, and trace context. No packed-byte wire layout: this crate has
//! no FFI boundary to serve.

use crate::coordinates::NUM_SPACES;
use crate::error::{AxonError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: Option<String>,
    pub correlation_id: Option<String>,
    /// The W3C `traceparent` sampled bit, inherited from an upstream caller.
    pub parent_sampled: Option<bool>,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self {
            trace_id: None,
            correlation_id: None,
            parent_sampled: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routing {
    pub tags: Vec<String>,
    pub ttl: u8,
    pub trace: TraceContext,
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            ttl: 0,
            trace: TraceContext::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Temporal {
    pub created_at_us: u64,
    /// Assigned by `SignalSystem`; callers should leave this 0 and let
    /// `emit` allocate it.
    pub neuro_tick: u64,
    pub sequence_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub event_type: String,
    pub semantic_vector: [f32; NUM_SPACES],
    pub priority: u8,
    pub confidence: u8,
    pub urgency: u8,
    pub magnitude: i16,
    pub valence: i8,
    pub arousal: u8,
    pub layer_affinities: Option<[f32; NUM_SPACES]>,
    pub temporal: Temporal,
    pub routing: Routing,
}

impl SignalEvent {
    pub fn new(event_type: impl Into<String>, semantic_vector: [f32; NUM_SPACES]) -> Self {
        Self {
            event_type: event_type.into(),
            semantic_vector,
            priority: 0,
            confidence: 0,
            urgency: 0,
            magnitude: 0,
            valence: 0,
            arousal: 0,
            layer_affinities: None,
            temporal: Temporal {
                created_at_us: 0,
                neuro_tick: 0,
                sequence_id: None,
            },
            routing: Routing::default(),
        }
    }

    /// Validate shape and finiteness invariants.
    /// `semantic_vector` is a fixed-size array so the "length != 8" boundary
    /// is enforced by the type system at construction time for Rust
    /// callers; this validates the finiteness and range invariants that
    /// remain runtime checks, and is also where a non-Rust caller's
    /// variable-length vector (arriving via `from_vec`) is rejected.
    pub fn validate(&self) -> Result<()> {
        if !self.semantic_vector.iter().all(|v| v.is_finite()) {
            return Err(AxonError::validation("semantic_vector must be all finite"));
        }
        if let Some(layers) = self.layer_affinities {
            if !layers.iter().all(|v| v.is_finite()) {
                return Err(AxonError::validation("layer_affinities must be all finite"));
            }
        }
        Ok(())
    }

    /// Construct from a caller-supplied variable-length vector, as a
    /// non-Rust adapter boundary would hand one in. Enforces the
    /// length == 8 boundary explicitly.
    pub fn from_vec(event_type: impl Into<String>, vector: Vec<f32>) -> Result<Self> {
        if vector.len() != NUM_SPACES {
            return Err(AxonError::validation(format!(
                "semantic_vector must have exactly {NUM_SPACES} components, got {}",
                vector.len()
            )));
        }
        let mut arr = [0.0f32; NUM_SPACES];
        arr.copy_from_slice(&vector);
        let event = Self::new(event_type, arr);
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_vector() {
        assert!(SignalEvent::from_vec("t", vec![0.0; 7]).is_err());
        assert!(SignalEvent::from_vec("t", vec![0.0; 9]).is_err());
    }

    #[test]
    fn rejects_non_finite() {
        let mut v = vec![0.0; NUM_SPACES];
        v[2] = f32::NAN;
        assert!(SignalEvent::from_vec("t", v).is_err());
    }

    #[test]
    fn roundtrips_through_json() {
        let event = SignalEvent::new("signal.input.text", [0.0; NUM_SPACES]);
        let json = serde_json::to_string(&event).unwrap();
        let back: SignalEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type, back.event_type);
        assert_eq!(event.semantic_vector, back.semantic_vector);
    }
}
