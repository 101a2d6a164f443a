use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DOCUMENT_VERSION;
use crate::document::Fields;
use crate::error::UcoinError;
use crate::hash::sha1_hex;
use crate::types::{AmNumber, Fingerprint, HexHash, Timestamp};

// ── SetKind ──────────────────────────────────────────────────────────────────

/// The two merkle-committed sets carried by an amendment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetKind {
    Members,
    Voters,
}

impl SetKind {
    /// Log tag used for transitions on this set.
    pub fn tag(self) -> &'static str {
        match self {
            SetKind::Members => "MS",
            SetKind::Voters => "VT",
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `+FPR` (joining) or `-FPR` (leaving) token of a changes list.
pub fn change_token(joining: bool, key: &Fingerprint) -> String {
    format!("{}{}", if joining { '+' } else { '-' }, key)
}

/// Split a changes token back into its direction and key.
pub fn parse_change(token: &str) -> Result<(bool, Fingerprint), UcoinError> {
    let joining = match token.chars().next() {
        Some('+') => true,
        Some('-') => false,
        _ => {
            return Err(UcoinError::MalformedDocument(format!(
                "wrong structure for change line '{token}'"
            )))
        }
    };
    Ok((joining, Fingerprint::parse(&token[1..])?))
}

// ── Amendment ────────────────────────────────────────────────────────────────

/// An epoch's contract revision: member set, voter set and money supply.
///
/// `hash` is the uppercase SHA-1 of [`Amendment::raw`] and covers every
/// field except `hash` and `promoted`. Every mutation must be followed by
/// [`Amendment::refresh_hash`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub version: u32,
    pub currency: String,
    pub number: AmNumber,
    /// Start of validity of this amendment.
    pub generated_at: Timestamp,
    pub dividend: u64,
    pub monetary_mass: u64,
    /// Votes required to promote the follower of this amendment.
    pub next_votes: u64,
    /// Empty iff `number == 0`.
    pub previous_hash: HexHash,
    pub members_root: HexHash,
    pub members_count: u64,
    pub members_changes: Vec<String>,
    pub voters_root: HexHash,
    pub voters_count: u64,
    pub voters_changes: Vec<String>,
    pub hash: HexHash,
    pub promoted: bool,
}

impl Amendment {
    pub fn new(currency: &str, number: AmNumber, generated_at: Timestamp) -> Self {
        let mut am = Self {
            version: DOCUMENT_VERSION,
            currency: currency.to_string(),
            number,
            generated_at,
            dividend: 0,
            monetary_mass: 0,
            next_votes: 0,
            previous_hash: String::new(),
            members_root: String::new(),
            members_count: 0,
            members_changes: Vec::new(),
            voters_root: String::new(),
            voters_count: 0,
            voters_changes: Vec::new(),
            hash: String::new(),
            promoted: false,
        };
        am.refresh_hash();
        am
    }

    /// Canonical raw text, the signed and hashed form of the amendment.
    pub fn raw(&self) -> String {
        let mut raw = String::new();
        raw += &format!("Version: {}\n", self.version);
        raw += &format!("Currency: {}\n", self.currency);
        raw += &format!("Number: {}\n", self.number);
        raw += &format!("GeneratedOn: {}\n", self.generated_at);
        if self.dividend > 0 {
            raw += &format!("UniversalDividend: {}\n", self.dividend);
        }
        raw += &format!("MonetaryMass: {}\n", self.monetary_mass);
        raw += &format!("NextRequiredVotes: {}\n", self.next_votes);
        if self.number > 0 {
            raw += &format!("PreviousHash: {}\n", self.previous_hash);
        }
        raw += &format!("MembersRoot: {}\n", self.members_root);
        raw += &format!("MembersCount: {}\n", self.members_count);
        raw += "MembersChanges:\n";
        for change in &self.members_changes {
            raw += change;
            raw += "\n";
        }
        raw += &format!("VotersRoot: {}\n", self.voters_root);
        raw += &format!("VotersCount: {}\n", self.voters_count);
        raw += "VotersChanges:\n";
        for change in &self.voters_changes {
            raw += change;
            raw += "\n";
        }
        raw
    }

    pub fn compute_hash(&self) -> HexHash {
        sha1_hex(self.raw().as_bytes())
    }

    pub fn refresh_hash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// Parse a canonical raw amendment. The result is unpromoted and its
    /// hash is computed from the parsed fields.
    pub fn parse(raw: &str) -> Result<Self, UcoinError> {
        let fields = Fields::parse(raw)?;
        let version = fields.require_u64("Version")? as u32;
        if version != DOCUMENT_VERSION {
            return Err(UcoinError::MalformedDocument(format!("version {version} not supported")));
        }
        let number = fields.require_u64("Number")?;
        let previous_hash = match fields.get("PreviousHash") {
            Some(h) if number > 0 => h.to_ascii_uppercase(),
            None if number == 0 => String::new(),
            _ => {
                return Err(UcoinError::MalformedDocument(
                    "PreviousHash is required if and only if Number > 0".into(),
                ))
            }
        };
        let dividend = match fields.get("UniversalDividend") {
            Some(_) => fields.require_u64("UniversalDividend")?,
            None => 0,
        };
        let mut am = Self {
            version,
            currency: fields.require("Currency")?.to_string(),
            number,
            generated_at: fields.require_timestamp("GeneratedOn")?,
            dividend,
            monetary_mass: fields.require_u64("MonetaryMass")?,
            next_votes: fields.require_u64("NextRequiredVotes")?,
            previous_hash,
            members_root: fields.require("MembersRoot")?.to_ascii_uppercase(),
            members_count: fields.require_u64("MembersCount")?,
            members_changes: fields.items("MembersChanges"),
            voters_root: fields.require("VotersRoot")?.to_ascii_uppercase(),
            voters_count: fields.require_u64("VotersCount")?,
            voters_changes: fields.items("VotersChanges"),
            hash: String::new(),
            promoted: false,
        };
        for change in am.members_changes.iter().chain(am.voters_changes.iter()) {
            parse_change(change)?;
        }
        am.refresh_hash();
        Ok(am)
    }

    // ── Set accessors ────────────────────────────────────────────────────────

    pub fn changes(&self, kind: SetKind) -> &[String] {
        match kind {
            SetKind::Members => &self.members_changes,
            SetKind::Voters => &self.voters_changes,
        }
    }

    pub fn root(&self, kind: SetKind) -> &str {
        match kind {
            SetKind::Members => &self.members_root,
            SetKind::Voters => &self.voters_root,
        }
    }

    pub fn count(&self, kind: SetKind) -> u64 {
        match kind {
            SetKind::Members => self.members_count,
            SetKind::Voters => self.voters_count,
        }
    }

    /// Record a set's root and leaf count as read back from its merkle set.
    pub fn set_commitment(&mut self, kind: SetKind, root: HexHash, count: u64) {
        match kind {
            SetKind::Members => {
                self.members_root = root;
                self.members_count = count;
            }
            SetKind::Voters => {
                self.voters_root = root;
                self.voters_count = count;
            }
        }
    }

    /// Add `token` to a changes list, keeping it sorted and duplicate-free.
    pub fn add_change(&mut self, kind: SetKind, token: &str) {
        let list = self.changes_mut(kind);
        if let Err(pos) = list.binary_search_by(|c| c.as_str().cmp(token)) {
            list.insert(pos, token.to_string());
        }
    }

    /// Remove `token` from a changes list if present.
    pub fn remove_change(&mut self, kind: SetKind, token: &str) {
        self.changes_mut(kind).retain(|c| c != token);
    }

    fn changes_mut(&mut self, kind: SetKind) -> &mut Vec<String> {
        match kind {
            SetKind::Members => &mut self.members_changes,
            SetKind::Voters => &mut self.voters_changes,
        }
    }

    /// Keys joining (`joining == true`) or leaving a set with this amendment.
    pub fn changed_keys(&self, kind: SetKind, joining: bool) -> Vec<Fingerprint> {
        self.changes(kind)
            .iter()
            .filter_map(|c| parse_change(c).ok())
            .filter(|(j, _)| *j == joining)
            .map(|(_, key)| key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "2E69197FAB029D8669EF85E82457A1587CA0ED9C";
    const KEY_B: &str = "C73882B64B7E72237A2F460CE9CAB76D19A8651E";

    fn sample() -> Amendment {
        let mut am = Amendment::new("beta_brousouf", 1, 1_403_388_000);
        am.previous_hash = "58A2700B6CE56E112238FDCD81C8DACE2F2D06DC".into();
        am.next_votes = 1;
        am.dividend = 100;
        am.monetary_mass = 200;
        am.members_root = "F92B6F81C85200250EE7A2C3ADA5B0B2CA6D3ED4".into();
        am.members_count = 2;
        am.add_change(SetKind::Members, &format!("+{KEY_B}"));
        am.add_change(SetKind::Members, &format!("+{KEY_A}"));
        am.refresh_hash();
        am
    }

    #[test]
    fn raw_layout() {
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        assert_eq!(
            am.raw(),
            "Version: 1\nCurrency: beta_brousouf\nNumber: 0\nGeneratedOn: 1403301600\n\
             MonetaryMass: 0\nNextRequiredVotes: 0\nMembersRoot: \nMembersCount: 0\n\
             MembersChanges:\nVotersRoot: \nVotersCount: 0\nVotersChanges:\n"
        );
        assert_eq!(am.hash, sha1_hex(am.raw().as_bytes()));
    }

    #[test]
    fn parse_restores_every_hashed_field() {
        let am = sample();
        let parsed = Amendment::parse(&am.raw().replace('\n', "\r\n")).unwrap();
        assert_eq!(parsed, am);
    }

    #[test]
    fn hash_ignores_promotion() {
        let mut am = sample();
        let before = am.compute_hash();
        am.promoted = true;
        assert_eq!(am.compute_hash(), before);
        am.members_count = 3;
        assert_ne!(am.compute_hash(), before);
    }

    #[test]
    fn changes_stay_sorted_and_unique() {
        let mut am = sample();
        am.add_change(SetKind::Members, &format!("+{KEY_A}"));
        assert_eq!(am.members_changes, vec![format!("+{KEY_A}"), format!("+{KEY_B}")]);
        am.remove_change(SetKind::Members, &format!("+{KEY_A}"));
        assert_eq!(am.changed_keys(SetKind::Members, true), vec![Fingerprint::parse(KEY_B).unwrap()]);
    }

    #[test]
    fn previous_hash_is_mandatory_after_root() {
        let raw = Amendment::new("beta_brousouf", 3, 1_403_301_600).raw();
        assert!(Amendment::parse(&raw).is_err());
    }

    #[test]
    fn bad_change_line_is_rejected() {
        let raw = Amendment::new("beta_brousouf", 0, 1_403_301_600)
            .raw()
            .replace("MembersChanges:\n", "MembersChanges:\n+NOTAKEY\n");
        assert!(Amendment::parse(&raw).is_err());
    }
}
