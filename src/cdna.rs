//! Constitutional configuration (CDNA) — process-wide, validated-mutation-only.
//!
//! 384 bytes is the on-disk/wire budget; in memory the semantic fields stay
//! typed and the remainder is reserved as raw bytes, so the wire shape is
//! reproducible by `to_bytes`/`from_bytes` without every byte needing to
//! carry meaning yet.

use crate::coordinates::NUM_SPACES;
use crate::error::{AxonError, Result};
use serde::{Deserialize, Serialize};

pub const CDNA_MAGIC: u32 = 0x4144_4E41; // "ADNA"... kept distinct from ADNA policy engine, repurposed as CDNA tag
pub const CDNA_VERSION_MAJOR: u8 = 1;
pub const CDNA_VERSION_MINOR: u8 = 0;
pub const CDNA_WIRE_SIZE: usize = 384;

pub type ProfileId = u16;

/// Bit flags packed into `CDNA::flags`, mirroring the style of
/// [`crate::token::flags`].
pub mod cdna_flags {
    pub const TRACE_ENABLED: u32 = 1 << 0;
    pub const AGGRESSIVE_CLEANUP: u32 = 1 << 1;
    pub const STRICT_VALIDATION: u32 = 1 << 2;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileState {
    pub profile_id: ProfileId,
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CDNA {
    pub scales: [f32; NUM_SPACES],
    pub profile_id: ProfileId,
    pub flags: u32,
    pub trace_sample_rate: f32,
}

impl Default for CDNA {
    fn default() -> Self {
        Self {
            scales: [1.0; NUM_SPACES],
            profile_id: 0,
            flags: 0,
            trace_sample_rate: 0.01,
        }
    }
}

impl CDNA {
    pub fn validate(&self) -> Result<()> {
        for (i, s) in self.scales.iter().enumerate() {
            if !(s.is_finite() && *s > 0.0) {
                return Err(AxonError::validation(format!(
                    "cdna scale[{i}] must be finite and > 0, got {s}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.trace_sample_rate) {
            return Err(AxonError::validation("cdna trace_sample_rate out of [0,1]"));
        }
        Ok(())
    }

    pub fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn update_scales(&mut self, scales: [f32; NUM_SPACES]) -> Result<()> {
        for (i, s) in scales.iter().enumerate() {
            if !(s.is_finite() && *s > 0.0) {
                return Err(AxonError::validation(format!(
                    "requested scale[{i}] must be finite and > 0, got {s}"
                )));
            }
        }
        self.scales = scales;
        Ok(())
    }

    pub fn set_profile(&mut self, profile_id: ProfileId) {
        self.profile_id = profile_id;
    }

    /// Encode into the fixed `CDNA_WIRE_SIZE`-byte layout, little-endian:
    /// magic(4) version_major(1) version_minor(1) profile_id(2) flags(4)
    /// trace_sample_rate(4) scales(8*4=32), zero-padded to 384 bytes.
    pub fn to_bytes(&self) -> [u8; CDNA_WIRE_SIZE] {
        let mut buf = [0u8; CDNA_WIRE_SIZE];
        let mut pos = 0;
        buf[pos..pos + 4].copy_from_slice(&CDNA_MAGIC.to_le_bytes());
        pos += 4;
        buf[pos] = CDNA_VERSION_MAJOR;
        pos += 1;
        buf[pos] = CDNA_VERSION_MINOR;
        pos += 1;
        buf[pos..pos + 2].copy_from_slice(&self.profile_id.to_le_bytes());
        pos += 2;
        buf[pos..pos + 4].copy_from_slice(&self.flags.to_le_bytes());
        pos += 4;
        buf[pos..pos + 4].copy_from_slice(&self.trace_sample_rate.to_le_bytes());
        pos += 4;
        for s in &self.scales {
            buf[pos..pos + 4].copy_from_slice(&s.to_le_bytes());
            pos += 4;
        }
        buf
    }

    /// Decode from the `CDNA_WIRE_SIZE`-byte layout written by [`to_bytes`](Self::to_bytes).
    /// Rejects a bad magic, an unsupported major version, or a short buffer;
    /// the result still passes through [`validate`](Self::validate).
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != CDNA_WIRE_SIZE {
            return Err(AxonError::validation(format!(
                "cdna wire buffer must be {CDNA_WIRE_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let mut pos = 0;
        let magic = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        if magic != CDNA_MAGIC {
            return Err(AxonError::validation(format!("cdna bad magic: {magic:#x}")));
        }
        let version_major = buf[pos];
        pos += 1;
        if version_major != CDNA_VERSION_MAJOR {
            return Err(AxonError::validation(format!(
                "cdna unsupported major version {version_major}"
            )));
        }
        let _version_minor = buf[pos];
        pos += 1;
        let profile_id = u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap());
        pos += 2;
        let flags = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let trace_sample_rate = f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let mut scales = [0f32; NUM_SPACES];
        for s in scales.iter_mut() {
            *s = f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
            pos += 4;
        }
        let cdna = CDNA {
            scales,
            profile_id,
            flags,
            trace_sample_rate,
        };
        cdna.validate()?;
        Ok(cdna)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_validates() {
        assert!(CDNA::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_scale() {
        let mut c = CDNA::default();
        c.scales[3] = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_negative_scale() {
        let mut c = CDNA::default();
        c.scales[0] = -1.0;
        assert!(c.update_scales(c.scales).is_err());
    }

    #[test]
    fn flag_roundtrip() {
        let mut c = CDNA::default();
        c.set_flag(cdna_flags::TRACE_ENABLED, true);
        assert!(c.has_flag(cdna_flags::TRACE_ENABLED));
        c.set_flag(cdna_flags::TRACE_ENABLED, false);
        assert!(!c.has_flag(cdna_flags::TRACE_ENABLED));
    }

    #[test]
    fn wire_roundtrip_is_384_bytes() {
        let mut c = CDNA::default();
        c.set_flag(cdna_flags::STRICT_VALIDATION, true);
        c.profile_id = 7;
        c.scales[2] = 2.5;
        let bytes = c.to_bytes();
        assert_eq!(bytes.len(), CDNA_WIRE_SIZE);
        let decoded = CDNA::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.profile_id, 7);
        assert_eq!(decoded.scales[2], 2.5);
        assert!(decoded.has_flag(cdna_flags::STRICT_VALIDATION));
    }

    #[test]
    fn from_bytes_rejects_bad_magic() {
        let mut bytes = CDNA::default().to_bytes();
        bytes[0] ^= 0xFF;
        assert!(CDNA::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(CDNA::from_bytes(&[0u8; 10]).is_err());
    }
}
