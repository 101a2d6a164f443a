use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UcoinError;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Sequence number of an amendment. 0 is the root (genesis) amendment.
pub type AmNumber = u64;

/// Uppercase hex SHA-1 digest. The empty string stands for "no hash"
/// (root amendment's previous hash, empty merkle root).
pub type HexHash = String;

// ── Fingerprint ──────────────────────────────────────────────────────────────

/// 40 uppercase hex characters identifying a participant's public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const LEN: usize = 40;

    /// Parse a fingerprint, normalising to uppercase.
    pub fn parse(s: &str) -> Result<Self, UcoinError> {
        let s = s.trim();
        if s.len() != Self::LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(UcoinError::MalformedDocument(format!(
                "invalid fingerprint '{s}': expected {} hex characters",
                Self::LEN
            )));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in log lines.
    pub fn short(&self) -> &str {
        &self.0[Self::LEN - 16..]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(0x{})", self.short())
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = UcoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── KeyState ─────────────────────────────────────────────────────────────────

/// Tri-state of a key relative to the pending amendment: leaving (-1),
/// nothing pending (0) or joining (+1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyState {
    Leaving,
    #[default]
    Unchanged,
    Joining,
}

impl KeyState {
    /// Clamp an arbitrary signed delta into `{-1, 0, 1}`.
    pub fn from_delta(delta: i64) -> Self {
        match delta.signum() {
            -1 => KeyState::Leaving,
            1 => KeyState::Joining,
            _ => KeyState::Unchanged,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            KeyState::Leaving => -1,
            KeyState::Unchanged => 0,
            KeyState::Joining => 1,
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_normalised() {
        let fpr = Fingerprint::parse("c73882b64b7e72237a2f460ce9cab76d19a8651e").unwrap();
        assert_eq!(fpr.as_str(), "C73882B64B7E72237A2F460CE9CAB76D19A8651E");
        assert_eq!(fpr.short(), "E9CAB76D19A8651E");
    }

    #[test]
    fn fingerprint_rejects_bad_input() {
        assert!(Fingerprint::parse("C73882B64B7E").is_err());
        assert!(Fingerprint::parse("Z73882B64B7E72237A2F460CE9CAB76D19A8651E").is_err());
    }

    #[test]
    fn delta_is_clamped() {
        assert_eq!(KeyState::from_delta(-3), KeyState::Leaving);
        assert_eq!(KeyState::from_delta(0), KeyState::Unchanged);
        assert_eq!(KeyState::from_delta(2), KeyState::Joining);
    }
}
