// Axiom - Высокопроизводительная система пространственных вычислений на основе токенов.
// Copyright (C) 2024-2025 Chernov Denys

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! A process-resident cognitive runtime core: an in-memory 8D semantic
//! space, a tri-pathway action arbiter, and the durability/safety substrate
//! both depend on. REST/WebSocket gateways, sensor adapters, action
//! executors, and language bindings are collaborator contracts, not part
//! of this crate — see [`arbiter::ReasoningCollaborator`] for the one
//! trait seam a host process plugs a real deliberative policy into.
//!
//! Dependency order, leaves first: [`guardian`] → [`wal`]/[`async_wal`] →
//! [`runtime_store`] → [`grid`] → [`filter`] → [`signal_system`] →
//! [`curiosity`] → [`arbiter`], all wired together by [`runtime::Runtime`].

pub mod action_types;
pub mod arbiter;
pub mod async_wal;
pub mod cdna;
pub mod config;
pub mod connection;
pub mod coordinates;
pub mod curiosity;
pub mod error;
pub mod event_registry;
pub mod experience;
pub mod filter;
pub mod grid;
pub mod guardian;
pub mod logging;
pub mod metrics;
pub mod panic_handler;
pub mod runtime;
pub mod runtime_store;
pub mod sampling;
pub mod signal_event;
pub mod signal_system;
pub mod subscriber;
pub mod token;
pub mod wal;

pub use action_types::{ActionId, ActionIntent, ActionType, DecisionSource};
pub use arbiter::{Arbiter, ArbiterConfig, ArbiterState, NoReasoningCollaborator, ReasoningCollaborator};
pub use async_wal::{spawn_async_wal, AsyncWalConfig, AsyncWalHandle};
pub use cdna::{cdna_flags, ProfileId, ProfileState, CDNA, CDNA_MAGIC, CDNA_VERSION_MAJOR, CDNA_VERSION_MINOR};
pub use config::{exit_code, RuntimeConfig};
pub use connection::{Connection, ConnectionId, ConnectionKind, ConnectionPrototype};
pub use coordinates::{CoordinateExt, CoordinateIndex, CoordinateSpace, Coord3, Coords8, NUM_SPACES};
pub use curiosity::{
    CuriosityConfig, CuriosityEngine, CuriosityWeights, ExplorationPriority, ExplorationQueue,
    ExplorationTarget, NoveltyTracker, SurpriseHistory, UncertaintyTracker,
};
pub use error::{AxonError, Result};
pub use event_registry::{EventTypeId, EventTypeRegistry};
pub use experience::{AssociativeMemory, AssociativeStats, FastPathConfig, FastPathResult, ShiftConfig};
pub use filter::{CompiledFilter, ConditionSpec, EventTypePattern, FilterCompiler, FilterSpec, LogicSpec, NumericOp};
pub use grid::{GridConfig, NeighborHit, SpatialIndex};
pub use guardian::{Guardian, GuardianConfig, ResourceStats};
pub use panic_handler::{catch_panic, catch_panic_async, install_panic_hook, PanicError, PanicResult};
pub use runtime::Runtime;
pub use runtime_store::RuntimeStore;
pub use sampling::{parent_sampled_from_traceparent, TraceSampler};
pub use signal_event::{Routing, SignalEvent, Temporal, TraceContext};
pub use signal_system::{NeighborRecord, ProcessingResult, SignalSystem, SignalSystemConfig};
pub use subscriber::{Delivery, DeliveryOutcome, PollingHandle, Subscriber, SubscriberEvent, SubscriberId};
pub use token::{flags as token_flags, now_micros, EntityType, Token, TokenId, TokenPrototype, SCALE_FACTORS};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_cargo_manifest() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
