//! Guardian — resource quotas and the panic containment boundary.
//!
//! Memory accounting prefers the OS-reported resident set
//! (Linux `/proc/self/status`, `VmRSS`) and falls back to a simple per-entity
//! approximation when that file is unavailable (non-Linux, containers
//! without procfs).

use std::fs;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const APPROX_BYTES_PER_TOKEN: u64 = 64;
const APPROX_BYTES_PER_CONNECTION: u64 = 64;

#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub max_tokens: usize,
    pub max_connections: usize,
    pub max_memory_bytes: u64,
    pub aggressive_cleanup_threshold: f32,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1_000_000,
            max_connections: 1_000_000,
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
            aggressive_cleanup_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStats {
    pub token_count: usize,
    pub connection_count: usize,
    pub memory_bytes: u64,
    pub panics_recovered: u64,
}

pub struct Guardian {
    config: GuardianConfig,
    token_count: AtomicUsize,
    connection_count: AtomicUsize,
    panics_recovered: AtomicU64,
}

impl Guardian {
    pub fn new(config: GuardianConfig) -> Self {
        Self {
            config,
            token_count: AtomicUsize::new(0),
            connection_count: AtomicUsize::new(0),
            panics_recovered: AtomicU64::new(0),
        }
    }

    pub fn can_create_token(&self) -> bool {
        self.token_count.load(Ordering::Relaxed) < self.config.max_tokens
    }

    pub fn can_create_connection(&self) -> bool {
        self.connection_count.load(Ordering::Relaxed) < self.config.max_connections
    }

    pub fn record_token_created(&self) {
        self.token_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_deleted(&self) {
        self.token_count.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_connection_created(&self) {
        self.connection_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_deleted(&self) {
        self.connection_count.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_panic_recovered(&self) {
        self.panics_recovered.fetch_add(1, Ordering::Relaxed);
    }

    /// Resident set size read from `/proc/self/status` on Linux, falling
    /// back to `64 B/token + 64 B/connection` everywhere else.
    fn memory_bytes(&self) -> u64 {
        if let Some(rss) = read_linux_rss_bytes() {
            return rss;
        }
        let tokens = self.token_count.load(Ordering::Relaxed) as u64;
        let conns = self.connection_count.load(Ordering::Relaxed) as u64;
        tokens * APPROX_BYTES_PER_TOKEN + conns * APPROX_BYTES_PER_CONNECTION
    }

    pub fn resource_stats(&self) -> ResourceStats {
        ResourceStats {
            token_count: self.token_count.load(Ordering::Relaxed),
            connection_count: self.connection_count.load(Ordering::Relaxed),
            memory_bytes: self.memory_bytes(),
            panics_recovered: self.panics_recovered.load(Ordering::Relaxed),
        }
    }

    pub fn should_trigger_aggressive_cleanup(&self) -> bool {
        let usage = self.memory_bytes() as f64;
        let limit = self.config.max_memory_bytes as f64;
        if limit <= 0.0 {
            return false;
        }
        (usage / limit) >= self.config.aggressive_cleanup_threshold as f64
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }
}

fn read_linux_rss_bytes() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_quota_rejects_fourth_token() {
        let guardian = Guardian::new(GuardianConfig {
            max_tokens: 3,
            ..GuardianConfig::default()
        });
        for _ in 0..3 {
            assert!(guardian.can_create_token());
            guardian.record_token_created();
        }
        assert!(!guardian.can_create_token());
        assert_eq!(guardian.resource_stats().token_count, 3);
    }

    #[test]
    fn aggressive_cleanup_threshold() {
        let guardian = Guardian::new(GuardianConfig {
            max_memory_bytes: 100,
            aggressive_cleanup_threshold: 0.5,
            ..GuardianConfig::default()
        });
        // fallback accounting: 0 tokens/connections -> 0 bytes, below threshold
        // unless procfs reports real RSS, in which case we just assert no panic.
        let _ = guardian.should_trigger_aggressive_cleanup();
    }
}
