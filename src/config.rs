//! Process-level configuration read from the environment at startup.
//!
//! The core itself never reads argv — the embedding process does that and
//! is expected to set these variables before constructing a [`crate::runtime::Runtime`].

use crate::error::{AxonError, Result};
use std::env;
use std::path::PathBuf;

/// Exit codes for the process embedding this core.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const LOG_CORRUPTION_UNRECOVERABLE: i32 = 2;
    pub const QUOTA_EXCEEDED_AT_INIT: i32 = 3;
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_tokens: usize,
    pub max_connections: usize,
    pub max_memory_bytes: u64,
    pub log_path: PathBuf,
    pub cdna_profile_id: u16,
    pub trace_sample_rate: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1_000_000,
            max_connections: 1_000_000,
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
            log_path: PathBuf::from("./axon.log"),
            cdna_profile_id: 0,
            trace_sample_rate: 0.01,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset. Returns [`AxonError::Validation`] (→ exit code 1 for
    /// the embedder) on a malformed value.
    pub fn from_env() -> Result<Self> {
        let mut cfg = RuntimeConfig::default();

        if let Ok(v) = env::var("MAX_TOKENS") {
            cfg.max_tokens = v
                .parse()
                .map_err(|_| AxonError::validation(format!("MAX_TOKENS not a valid usize: {v}")))?;
        }
        if let Ok(v) = env::var("MAX_MEMORY_BYTES") {
            cfg.max_memory_bytes = v
                .parse()
                .map_err(|_| AxonError::validation(format!("MAX_MEMORY_BYTES not a valid u64: {v}")))?;
        }
        if let Ok(v) = env::var("LOG_PATH") {
            cfg.log_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("CDNA_PROFILE_ID") {
            cfg.cdna_profile_id = v
                .parse()
                .map_err(|_| AxonError::validation(format!("CDNA_PROFILE_ID not a valid u16: {v}")))?;
        }
        if let Ok(v) = env::var("TRACE_SAMPLE_RATE") {
            let rate: f32 = v
                .parse()
                .map_err(|_| AxonError::validation(format!("TRACE_SAMPLE_RATE not a valid f32: {v}")))?;
            if !(0.0..=1.0).contains(&rate) {
                return Err(AxonError::validation(format!(
                    "TRACE_SAMPLE_RATE out of range [0,1]: {rate}"
                )));
            }
            cfg.trace_sample_rate = rate;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(AxonError::validation("max_tokens must be > 0"));
        }
        if self.max_connections == 0 {
            return Err(AxonError::validation("max_connections must be > 0"));
        }
        if self.max_memory_bytes == 0 {
            return Err(AxonError::validation("max_memory_bytes must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.trace_sample_rate) {
            return Err(AxonError::validation("trace_sample_rate must be in [0,1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let mut cfg = RuntimeConfig::default();
        cfg.trace_sample_rate = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let mut cfg = RuntimeConfig::default();
        cfg.max_tokens = 0;
        assert!(cfg.validate().is_err());
    }
}
