//! Runtime — the single explicitly-constructed object wiring every
//! component together, passed to collaborators rather than reached for as
//! a global singleton.
//!
//! Dependency order, leaves first: Guardian → Log →
//! RuntimeStore → SpatialIndex → FilterCompiler → SignalSystem →
//! CuriosityEngine → Arbiter.

use crate::action_types::ActionIntent;
use crate::arbiter::{Arbiter, ArbiterConfig, NoReasoningCollaborator, ReasoningCollaborator};
use crate::async_wal::{spawn_async_wal, AsyncWalConfig, AsyncWalHandle};
use crate::config::RuntimeConfig;
use crate::coordinates::NUM_SPACES;
use crate::curiosity::{CuriosityConfig, CuriosityEngine};
use crate::error::Result;
use crate::experience::AssociativeMemory;
use crate::filter::FilterCompiler;
use crate::grid::GridConfig;
use crate::guardian::{Guardian, GuardianConfig};
use crate::runtime_store::RuntimeStore;
use crate::sampling::TraceSampler;
use crate::signal_system::{ProcessingResult, SignalSystem, SignalSystemConfig};
use crate::wal::{WalEntryType, WalReader, ReplayBound};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Runtime {
    guardian: Arc<Guardian>,
    store: Arc<RuntimeStore>,
    filter_compiler: Arc<FilterCompiler>,
    signal_system: Arc<SignalSystem>,
    curiosity: Arc<CuriosityEngine>,
    experience: Arc<AssociativeMemory>,
    arbiter: Arc<Arbiter>,
    wal: AsyncWalHandle,
    wal_join: tokio::task::JoinHandle<()>,
    wal_shutdown: mpsc::Sender<()>,
    sampler: TraceSampler,
    config: RuntimeConfig,
}

impl Runtime {
    /// Construct every component per the dependency order above. Must run
    /// on a tokio runtime: the async WAL writer task is spawned here.
    pub async fn new(config: RuntimeConfig) -> Result<Self> {
        crate::panic_handler::install_panic_hook();
        crate::metrics::register_all();

        let guardian = Arc::new(Guardian::new(GuardianConfig {
            max_tokens: config.max_tokens,
            max_connections: config.max_connections,
            max_memory_bytes: config.max_memory_bytes,
            ..GuardianConfig::default()
        }));

        let (wal, wal_join, wal_shutdown) =
            crate::panic_handler::catch_panic(|| spawn_async_wal(AsyncWalConfig::new(config.log_path.clone())))
                .map_err(|_| {
                    guardian.record_panic_recovered();
                    crate::error::AxonError::Durability("async wal spawn panicked".into())
                })?
                .map_err(|e| crate::error::AxonError::Durability(e.to_string()))?;

        let store = Arc::new(RuntimeStore::new(guardian.clone(), GridConfig::default()));
        store.cdna_set_profile(config.cdna_profile_id);

        let filter_compiler = Arc::new(FilterCompiler::new());

        let curiosity = Arc::new(CuriosityEngine::new(CuriosityConfig::default()));
        let signal_system = Arc::new(SignalSystem::new(
            SignalSystemConfig::default(),
            store.clone(),
            curiosity.clone(),
        ));

        let experience = Arc::new(AssociativeMemory::new());
        let arbiter = Arc::new(Arbiter::new(
            ArbiterConfig::default(),
            curiosity.clone(),
            experience.clone(),
            Arc::new(NoReasoningCollaborator),
        ));

        let sampler = TraceSampler::new(config.trace_sample_rate);

        Ok(Self {
            guardian,
            store,
            filter_compiler,
            signal_system,
            curiosity,
            experience,
            arbiter,
            wal,
            wal_join,
            wal_shutdown,
            sampler,
            config,
        })
    }

    pub async fn from_env() -> Result<Self> {
        Self::new(RuntimeConfig::from_env()?).await
    }

    /// Swap in a real deliberative policy for the arbiter's Slow path.
    /// Only meaningful before any `decide` call has raced against this
    /// swap; callers typically do this once, right after construction.
    pub fn with_reasoning(mut self, reasoning: Arc<dyn ReasoningCollaborator>) -> Self {
        self.arbiter = Arc::new(Arbiter::new(
            ArbiterConfig::default(),
            self.curiosity.clone(),
            self.experience.clone(),
            reasoning,
        ));
        self
    }

    pub fn guardian(&self) -> &Arc<Guardian> {
        &self.guardian
    }

    pub fn store(&self) -> &Arc<RuntimeStore> {
        &self.store
    }

    pub fn filter_compiler(&self) -> &Arc<FilterCompiler> {
        &self.filter_compiler
    }

    pub fn signal_system(&self) -> &Arc<SignalSystem> {
        &self.signal_system
    }

    pub fn curiosity(&self) -> &Arc<CuriosityEngine> {
        &self.curiosity
    }

    pub fn experience(&self) -> &Arc<AssociativeMemory> {
        &self.experience
    }

    pub fn arbiter(&self) -> &Arc<Arbiter> {
        &self.arbiter
    }

    pub fn sampler(&self) -> &TraceSampler {
        &self.sampler
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Submit a durable WAL entry through the async writer (non-blocking;
    /// fails fast with `Backpressure` on a full queue).
    pub fn record(&self, entry_type: WalEntryType, payload: Vec<u8>) -> Result<()> {
        self.wal.submit(entry_type, payload, crate::token::now_micros())
    }

    /// Ask the arbiter for the next [`ActionIntent`] for `state`.
    pub async fn decide(&self, state: &[f32; NUM_SPACES]) -> ActionIntent {
        self.arbiter.decide(state).await
    }

    /// Hand a processed signal straight to `emit`; a thin convenience so
    /// collaborators only need to hold a `Runtime`.
    pub fn emit(&self, event: crate::signal_event::SignalEvent) -> Result<ProcessingResult> {
        self.signal_system.emit(event)
    }

    /// Replay a log file from offset 0 into a caller-supplied handler,
    /// reconstructing `RuntimeStore` state.
    /// A static utility rather than an instance method: replay happens
    /// before a `Runtime` exists, at process startup.
    pub fn replay_log(
        path: impl AsRef<std::path::Path>,
        handler: impl FnMut(crate::wal::WalEntry),
    ) -> Result<Option<ReplayBound>> {
        WalReader::replay(path, handler)
    }

    /// Drain the async WAL queue, flush durably, and join the writer task.
    pub async fn shutdown(self) {
        let _ = self.wal_shutdown.send(()).await;
        let _ = self.wal_join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn constructs_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.log_path = dir.path().join("runtime.wal");
        let runtime = Runtime::new(config).await.unwrap();
        assert_eq!(runtime.store().count_tokens(), 0);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn emit_and_decide_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.log_path = dir.path().join("runtime2.wal");
        let runtime = Runtime::new(config).await.unwrap();

        let event = crate::signal_event::SignalEvent::new("signal.input.text", [0.0; NUM_SPACES]);
        let result = runtime.emit(event).unwrap();
        assert_eq!(result.neuro_tick, 1);

        let intent = runtime.decide(&[0.0; NUM_SPACES]).await;
        assert!(intent.action_id > 0);

        runtime.shutdown().await;
    }
}
