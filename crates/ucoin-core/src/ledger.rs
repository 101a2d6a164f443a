use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::amendment::SetKind;
use crate::types::{Fingerprint, KeyState};

// ── KeyEntry ─────────────────────────────────────────────────────────────────

/// Per-participant bookkeeping persisted in the key ledger.
///
/// `is_member`/`is_voter` reflect the last promoted amendment; the
/// `last_*_state` fields are relative to the pending one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub fingerprint: Fingerprint,
    /// Appeared in a promoted amendment at least once.
    #[serde(default)]
    pub known: bool,
    #[serde(default)]
    pub managed: bool,
    pub is_member: bool,
    pub is_voter: bool,
    pub last_ms_state: KeyState,
    pub last_voter_state: KeyState,
    /// Exclusion decided by the node (expired membership), not by the key.
    #[serde(default)]
    pub kick: bool,
    /// Keys this one is recorded as out of reach of. Part of the stored
    /// record only: amendment building never reads or writes it, and
    /// promotion carries it over untouched.
    #[serde(default)]
    pub distanced: BTreeSet<Fingerprint>,
}

impl KeyEntry {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            known: false,
            managed: false,
            is_member: false,
            is_voter: false,
            last_ms_state: KeyState::Unchanged,
            last_voter_state: KeyState::Unchanged,
            kick: false,
            distanced: BTreeSet::new(),
        }
    }

    /// Confirmed status in the last promoted amendment.
    pub fn confirmed(&self, kind: SetKind) -> bool {
        match kind {
            SetKind::Members => self.is_member,
            SetKind::Voters => self.is_voter,
        }
    }

    pub fn set_confirmed(&mut self, kind: SetKind, value: bool) {
        match kind {
            SetKind::Members => self.is_member = value,
            SetKind::Voters => self.is_voter = value,
        }
    }

    pub fn state(&self, kind: SetKind) -> KeyState {
        match kind {
            SetKind::Members => self.last_ms_state,
            SetKind::Voters => self.last_voter_state,
        }
    }

    pub fn set_state(&mut self, kind: SetKind, state: KeyState) {
        match kind {
            SetKind::Members => self.last_ms_state = state,
            SetKind::Voters => self.last_voter_state = state,
        }
    }

    /// Whether this key must be a leaf of the proposed set of `kind`:
    /// confirmed and not leaving, or joining.
    pub fn is_leaf(&self, kind: SetKind) -> bool {
        let state = self.state(kind);
        (self.confirmed(kind) && state != KeyState::Leaving) || state == KeyState::Joining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> KeyEntry {
        KeyEntry::new(Fingerprint::parse("2E69197FAB029D8669EF85E82457A1587CA0ED9C").unwrap())
    }

    #[test]
    fn leaf_follows_status_and_state() {
        let mut e = entry();
        assert!(!e.is_leaf(SetKind::Members));
        e.set_state(SetKind::Members, KeyState::Joining);
        assert!(e.is_leaf(SetKind::Members));
        e.is_member = true;
        e.set_state(SetKind::Members, KeyState::Unchanged);
        assert!(e.is_leaf(SetKind::Members));
        e.set_state(SetKind::Members, KeyState::Leaving);
        assert!(!e.is_leaf(SetKind::Members));
        assert!(!e.is_leaf(SetKind::Voters));
    }

    #[test]
    fn older_entries_deserialize_with_defaults() {
        let json = r#"{"fingerprint":"2E69197FAB029D8669EF85E82457A1587CA0ED9C","is_member":true,
            "is_voter":false,"last_ms_state":"Unchanged","last_voter_state":"Joining"}"#;
        let e: KeyEntry = serde_json::from_str(json).unwrap();
        assert!(e.is_member);
        assert!(!e.kick);
        assert_eq!(e.last_voter_state, KeyState::Joining);
    }
}
