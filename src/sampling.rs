//! Trace sampling — base rate, W3C `traceparent` parent-sampled
//! inheritance.

pub const DEFAULT_SAMPLE_RATE: f32 = 0.01;

pub struct TraceSampler {
    base_rate: f32,
}

impl TraceSampler {
    pub fn new(base_rate: f32) -> Self {
        Self {
            base_rate: base_rate.clamp(0.0, 1.0),
        }
    }

    /// Sample unconditionally if the upstream caller already sampled
    /// (`parent_sampled == Some(true)`), otherwise roll against the base
    /// rate. A caller with no parent context is a fresh root trace.
    pub fn should_sample(&self, parent_sampled: Option<bool>) -> bool {
        if parent_sampled == Some(true) {
            return true;
        }
        rand::random::<f32>() < self.base_rate
    }

    pub fn base_rate(&self) -> f32 {
        self.base_rate
    }
}

/// Parse a W3C `traceparent` header (`version-trace_id-parent_id-flags`)
/// and extract the sampled bit (flags & 0x01). Returns `None` on malformed
/// input rather than erroring — a bad header degrades to "no parent
/// context", never blocks the caller.
pub fn parent_sampled_from_traceparent(header: &str) -> Option<bool> {
    let parts: Vec<&str> = header.split('-').collect();
    if parts.len() != 4 {
        return None;
    }
    let flags = u8::from_str_radix(parts[3], 16).ok()?;
    Some(flags & 0x01 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_sampled_bit_extracted() {
        assert_eq!(
            parent_sampled_from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
            Some(true)
        );
        assert_eq!(
            parent_sampled_from_traceparent("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00"),
            Some(false)
        );
    }

    #[test]
    fn malformed_header_is_none() {
        assert_eq!(parent_sampled_from_traceparent("not-a-traceparent"), None);
    }

    #[test]
    fn parent_sampled_forces_sampling() {
        let sampler = TraceSampler::new(0.0);
        assert!(sampler.should_sample(Some(true)));
    }

    #[test]
    fn zero_base_rate_never_samples_root_trace() {
        let sampler = TraceSampler::new(0.0);
        assert!(!sampler.should_sample(None));
    }
}
