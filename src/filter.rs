//! SubscriptionFilter compiler and matcher.
//!
//! A [`FilterSpec`]
//! (the wire/JSON shape a collaborator sends) is compiled once into a
//! [`CompiledFilter`] whose `matches` call is allocation-free and O(number
//! of conditions): dot-path fields resolve to a fixed enum of known
//! [`SignalEvent`] accessors at compile time (unknown paths are rejected
//! there, never at match time), and regex conditions are pre-compiled and
//! cached by filter id.

use crate::error::{AxonError, Result};
use crate::signal_event::SignalEvent;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type FilterId = u32;

static NEXT_FILTER_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventTypePattern {
    Exact(String),
    /// Glob-style, `*` matches any sequence including dots.
    Wildcard(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConditionSpec {
    EventType(EventTypePattern),
    NumericU8 { field: String, op: NumericOp, value: u8 },
    NumericI16 { field: String, op: NumericOp, value: i16 },
    NumericF32 { field: String, op: NumericOp, value: f32 },
    NumericIn { field: String, values: Vec<i64>, negate: bool },
    Contains { field: String, token: String },
    Regex { field: String, pattern: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogicSpec {
    And(Vec<LogicSpec>),
    Or(Vec<LogicSpec>),
    Not(Box<LogicSpec>),
    Leaf(ConditionSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub logic: LogicSpec,
}

/// The fixed set of dot-paths the core understands. Anything else is a
/// compile-time `Validation` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownField {
    EventType,
    RoutingPriority,
    RoutingTtl,
    RoutingTags,
    EnergyConfidence,
    EnergyUrgency,
    EnergyMagnitude,
    EnergyValence,
    EnergyArousal,
    LayerDim(usize),
}

fn resolve_field(path: &str) -> Result<KnownField> {
    Ok(match path {
        "event_type" => KnownField::EventType,
        "routing.priority" => KnownField::RoutingPriority,
        "routing.ttl" => KnownField::RoutingTtl,
        "routing.tags" => KnownField::RoutingTags,
        "energy.confidence" => KnownField::EnergyConfidence,
        "energy.urgency" => KnownField::EnergyUrgency,
        "energy.magnitude" => KnownField::EnergyMagnitude,
        "energy.valence" => KnownField::EnergyValence,
        "energy.arousal" => KnownField::EnergyArousal,
        "layer.physical" => KnownField::LayerDim(0),
        "layer.l2" => KnownField::LayerDim(1),
        "layer.l3" => KnownField::LayerDim(2),
        "layer.emotional" => KnownField::LayerDim(3),
        "layer.l5" => KnownField::LayerDim(4),
        "layer.l6" => KnownField::LayerDim(5),
        "layer.l7" => KnownField::LayerDim(6),
        "layer.abstract" => KnownField::LayerDim(7),
        other => {
            return Err(AxonError::validation(format!(
                "unknown filter field path: {other}"
            )))
        }
    })
}

enum CompiledCondition {
    EventTypeExact(String),
    EventTypeWildcard(Vec<GlobToken>),
    NumericU8 { field: KnownField, op: NumericOp, value: u8 },
    NumericI16 { field: KnownField, op: NumericOp, value: i16 },
    NumericF32 { field: KnownField, op: NumericOp, value: f32 },
    NumericIn { field: KnownField, values: Vec<i64>, negate: bool },
    Contains { field: KnownField, token: String },
    Regex { field: KnownField, re: Arc<Regex> },
}

enum CompiledNode {
    And(Vec<CompiledNode>),
    Or(Vec<CompiledNode>),
    Not(Box<CompiledNode>),
    Leaf(CompiledCondition),
}

pub struct CompiledFilter {
    pub id: FilterId,
    root: CompiledNode,
}

/// A pre-split glob pattern: alternating literal segments split on `*`.
/// `["signal.input.", ""]` for `signal.input.*`.
type GlobToken = String;

fn split_glob(pattern: &str) -> Vec<GlobToken> {
    pattern.split('*').map(|s| s.to_string()).collect()
}

/// Matches `text` against a glob pre-split on `*`, where `*` matches any
/// sequence including dots. Allocation-free aside from the one-time split
/// done at compile time.
fn glob_match(segments: &[GlobToken], text: &str) -> bool {
    if segments.len() == 1 {
        return text == segments[0];
    }
    let mut rest = text;
    if !rest.starts_with(segments[0].as_str()) {
        return false;
    }
    rest = &rest[segments[0].len()..];
    if !rest.ends_with(segments[segments.len() - 1].as_str()) {
        return false;
    }
    rest = &rest[..rest.len() - segments[segments.len() - 1].len()];
    for mid in &segments[1..segments.len() - 1] {
        if mid.is_empty() {
            continue;
        }
        match rest.find(mid.as_str()) {
            Some(pos) => rest = &rest[pos + mid.len()..],
            None => return false,
        }
    }
    true
}

/// Regex cache keyed by compiled pattern text, shared across filters that
/// happen to use the same pattern, deduping identical patterns across
/// distinct filter ids.
#[derive(Default)]
pub struct FilterCompiler {
    regex_cache: dashmap::DashMap<String, Arc<Regex>>,
}

impl FilterCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled_regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Arc::new(
            Regex::new(pattern)
                .map_err(|e| AxonError::validation(format!("bad regex '{pattern}': {e}")))?,
        );
        self.regex_cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    fn compile_condition(&self, spec: &ConditionSpec) -> Result<CompiledCondition> {
        Ok(match spec {
            ConditionSpec::EventType(EventTypePattern::Exact(s)) => {
                CompiledCondition::EventTypeExact(s.clone())
            }
            ConditionSpec::EventType(EventTypePattern::Wildcard(pattern)) => {
                CompiledCondition::EventTypeWildcard(split_glob(pattern))
            }
            ConditionSpec::NumericU8 { field, op, value } => CompiledCondition::NumericU8 {
                field: resolve_field(field)?,
                op: *op,
                value: *value,
            },
            ConditionSpec::NumericI16 { field, op, value } => CompiledCondition::NumericI16 {
                field: resolve_field(field)?,
                op: *op,
                value: *value,
            },
            ConditionSpec::NumericF32 { field, op, value } => CompiledCondition::NumericF32 {
                field: resolve_field(field)?,
                op: *op,
                value: *value,
            },
            ConditionSpec::NumericIn { field, values, negate } => CompiledCondition::NumericIn {
                field: resolve_field(field)?,
                values: values.clone(),
                negate: *negate,
            },
            ConditionSpec::Contains { field, token } => CompiledCondition::Contains {
                field: resolve_field(field)?,
                token: token.clone(),
            },
            ConditionSpec::Regex { field, pattern } => CompiledCondition::Regex {
                field: resolve_field(field)?,
                re: self.compiled_regex(pattern)?,
            },
        })
    }

    fn compile_node(&self, spec: &LogicSpec) -> Result<CompiledNode> {
        Ok(match spec {
            LogicSpec::And(nodes) => {
                CompiledNode::And(nodes.iter().map(|n| self.compile_node(n)).collect::<Result<_>>()?)
            }
            LogicSpec::Or(nodes) => {
                CompiledNode::Or(nodes.iter().map(|n| self.compile_node(n)).collect::<Result<_>>()?)
            }
            LogicSpec::Not(inner) => CompiledNode::Not(Box::new(self.compile_node(inner)?)),
            LogicSpec::Leaf(cond) => CompiledNode::Leaf(self.compile_condition(cond)?),
        })
    }

    /// Compile a [`FilterSpec`] into an allocation-free matcher. Unknown
    /// dot-paths and bad regex patterns fail here, never at match time.
    pub fn compile(&self, spec: &FilterSpec) -> Result<CompiledFilter> {
        let root = self.compile_node(&spec.logic)?;
        Ok(CompiledFilter {
            id: NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed),
            root,
        })
    }
}

fn cmp_numeric<T: PartialOrd>(op: NumericOp, lhs: T, rhs: T) -> bool {
    match op {
        NumericOp::Eq => lhs == rhs,
        NumericOp::Ne => lhs != rhs,
        NumericOp::Lt => lhs < rhs,
        NumericOp::Le => lhs <= rhs,
        NumericOp::Gt => lhs > rhs,
        NumericOp::Ge => lhs >= rhs,
    }
}

fn field_str(field: KnownField, event: &SignalEvent) -> Option<&str> {
    match field {
        KnownField::EventType => Some(event.event_type.as_str()),
        _ => None,
    }
}

fn field_tags<'a>(field: KnownField, event: &'a SignalEvent) -> Option<&'a [String]> {
    match field {
        KnownField::RoutingTags => Some(event.routing.tags.as_slice()),
        _ => None,
    }
}

fn field_f32(field: KnownField, event: &SignalEvent) -> Option<f32> {
    match field {
        KnownField::LayerDim(i) => event.layer_affinities.map(|l| l[i]),
        _ => None,
    }
}

fn field_u8(field: KnownField, event: &SignalEvent) -> Option<u8> {
    match field {
        KnownField::RoutingPriority => Some(event.priority),
        KnownField::RoutingTtl => Some(event.routing.ttl),
        KnownField::EnergyConfidence => Some(event.confidence),
        KnownField::EnergyUrgency => Some(event.urgency),
        KnownField::EnergyArousal => Some(event.arousal),
        _ => None,
    }
}

fn field_i16(field: KnownField, event: &SignalEvent) -> Option<i16> {
    match field {
        KnownField::EnergyMagnitude => Some(event.magnitude),
        _ => None,
    }
}

fn field_i8(field: KnownField, event: &SignalEvent) -> Option<i8> {
    match field {
        KnownField::EnergyValence => Some(event.valence),
        _ => None,
    }
}

fn eval_condition(cond: &CompiledCondition, event: &SignalEvent) -> bool {
    match cond {
        CompiledCondition::EventTypeExact(s) => event.event_type == *s,
        CompiledCondition::EventTypeWildcard(segments) => glob_match(segments, &event.event_type),
        CompiledCondition::NumericU8 { field, op, value } => field_u8(*field, event)
            .map(|v| cmp_numeric(*op, v, *value))
            .unwrap_or(false),
        CompiledCondition::NumericI16 { field, op, value } => {
            if let Some(v) = field_i16(*field, event) {
                cmp_numeric(*op, v, *value)
            } else if let Some(v) = field_i8(*field, event) {
                cmp_numeric(*op, v as i16, *value)
            } else {
                false
            }
        }
        CompiledCondition::NumericF32 { field, op, value } => field_f32(*field, event)
            .map(|v| cmp_numeric(*op, v, *value))
            .unwrap_or(false),
        CompiledCondition::NumericIn { field, values, negate } => {
            let found = if let Some(v) = field_u8(*field, event) {
                values.contains(&(v as i64))
            } else if let Some(v) = field_i16(*field, event) {
                values.contains(&(v as i64))
            } else {
                false
            };
            found != *negate
        }
        CompiledCondition::Contains { field, token } => {
            if let Some(tags) = field_tags(*field, event) {
                tags.iter().any(|t| t == token)
            } else if let Some(s) = field_str(*field, event) {
                s.contains(token.as_str())
            } else {
                false
            }
        }
        CompiledCondition::Regex { field, re } => field_str(*field, event)
            .map(|s| re.is_match(s))
            .unwrap_or(false),
    }
}

fn eval_node(node: &CompiledNode, event: &SignalEvent) -> bool {
    match node {
        CompiledNode::And(nodes) => nodes.iter().all(|n| eval_node(n, event)),
        CompiledNode::Or(nodes) => nodes.iter().any(|n| eval_node(n, event)),
        CompiledNode::Not(inner) => !eval_node(inner, event),
        CompiledNode::Leaf(cond) => eval_condition(cond, event),
    }
}

impl CompiledFilter {
    pub fn matches(&self, event: &SignalEvent) -> bool {
        eval_node(&self.root, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::NUM_SPACES;

    fn event(event_type: &str, priority: u8) -> SignalEvent {
        let mut e = SignalEvent::new(event_type, [0.0; NUM_SPACES]);
        e.priority = priority;
        e
    }

    #[test]
    fn s2_priority_threshold() {
        let compiler = FilterCompiler::new();
        let spec = FilterSpec {
            logic: LogicSpec::Leaf(ConditionSpec::NumericU8 {
                field: "routing.priority".into(),
                op: NumericOp::Ge,
                value: 150,
            }),
        };
        let filter = compiler.compile(&spec).unwrap();
        assert!(!filter.matches(&event("e", 100)));
        assert!(filter.matches(&event("e", 200)));
    }

    #[test]
    fn s3_wildcard_and_priority() {
        let compiler = FilterCompiler::new();
        let spec = FilterSpec {
            logic: LogicSpec::And(vec![
                LogicSpec::Leaf(ConditionSpec::EventType(EventTypePattern::Wildcard(
                    "signal.input.*".into(),
                ))),
                LogicSpec::Leaf(ConditionSpec::NumericU8 {
                    field: "routing.priority".into(),
                    op: NumericOp::Ge,
                    value: 150,
                }),
            ]),
        };
        let filter = compiler.compile(&spec).unwrap();
        assert!(filter.matches(&event("signal.input.text", 200)));
        assert!(!filter.matches(&event("signal.system.tick", 200)));
    }

    #[test]
    fn unknown_field_is_compile_error() {
        let compiler = FilterCompiler::new();
        let spec = FilterSpec {
            logic: LogicSpec::Leaf(ConditionSpec::NumericU8 {
                field: "nonsense.path".into(),
                op: NumericOp::Ge,
                value: 1,
            }),
        };
        assert!(compiler.compile(&spec).is_err());
    }

    #[test]
    fn not_inverts() {
        let compiler = FilterCompiler::new();
        let spec = FilterSpec {
            logic: LogicSpec::Not(Box::new(LogicSpec::Leaf(ConditionSpec::EventType(
                EventTypePattern::Exact("a".into()),
            )))),
        };
        let filter = compiler.compile(&spec).unwrap();
        assert!(!filter.matches(&event("a", 0)));
        assert!(filter.matches(&event("b", 0)));
    }

    #[test]
    fn regex_condition_matches() {
        let compiler = FilterCompiler::new();
        let spec = FilterSpec {
            logic: LogicSpec::Leaf(ConditionSpec::Regex {
                field: "event_type".into(),
                pattern: "^signal\\.input\\..+$".into(),
            }),
        };
        let filter = compiler.compile(&spec).unwrap();
        assert!(filter.matches(&event("signal.input.text", 0)));
        assert!(!filter.matches(&event("signal.system.tick", 0)));
    }

    #[test]
    fn glob_with_middle_star() {
        assert!(glob_match(&split_glob("a*c"), "abc"));
        assert!(glob_match(&split_glob("a*c"), "ac"));
        assert!(!glob_match(&split_glob("a*c"), "abd"));
        assert!(glob_match(&split_glob("a*b*c"), "axxbyyc"));
    }
}
