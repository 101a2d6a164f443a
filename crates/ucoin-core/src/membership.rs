use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DOCUMENT_VERSION;
use crate::document::{split_signed, Fields};
use crate::error::UcoinError;
use crate::hash::sha1_hex;
use crate::types::{AmNumber, Fingerprint, HexHash, Timestamp};

/// Requested change of member status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = UcoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            other => Err(UcoinError::MalformedDocument(format!(
                "membership must be IN or OUT, got '{other}'"
            ))),
        }
    }
}

/// Common surface of the two registration documents (Membership and
/// Voting), so that storage and context assembly treat them alike.
pub trait Registration: Clone + Serialize + for<'de> Deserialize<'de> {
    /// Registry name, also used as the storage tree prefix.
    const REGISTRY: &'static str;

    fn currency(&self) -> &str;
    fn issuer(&self) -> &Fingerprint;
    fn sig_time(&self) -> Timestamp;
    fn am_number(&self) -> AmNumber;
    fn set_am_number(&mut self, number: AmNumber);
    fn hash(&self) -> &str;
    fn is_current(&self) -> bool;
    fn set_current(&mut self, current: bool);
    fn is_eligible(&self) -> bool;
    fn set_eligible(&mut self, eligible: bool);
    fn is_propagated(&self) -> bool;
    fn set_propagated(&mut self, propagated: bool);
    fn signature(&self) -> &str;
    /// Raw text covered by the signature.
    fn unsigned_raw(&self) -> String;
    /// Raw text followed by the detached signature.
    fn signed_raw(&self) -> String {
        format!("{}{}", self.unsigned_raw(), self.signature())
    }
}

macro_rules! registration_accessors {
    () => {
        fn currency(&self) -> &str {
            &self.currency
        }
        fn issuer(&self) -> &Fingerprint {
            &self.issuer
        }
        fn sig_time(&self) -> Timestamp {
            self.sig_time
        }
        fn am_number(&self) -> AmNumber {
            self.am_number
        }
        fn set_am_number(&mut self, number: AmNumber) {
            self.am_number = number;
        }
        fn hash(&self) -> &str {
            &self.hash
        }
        fn is_current(&self) -> bool {
            self.current
        }
        fn set_current(&mut self, current: bool) {
            self.current = current;
        }
        fn is_eligible(&self) -> bool {
            self.eligible
        }
        fn set_eligible(&mut self, eligible: bool) {
            self.eligible = eligible;
        }
        fn is_propagated(&self) -> bool {
            self.propagated
        }
        fn set_propagated(&mut self, propagated: bool) {
            self.propagated = propagated;
        }
        fn signature(&self) -> &str {
            &self.signature
        }
        fn unsigned_raw(&self) -> String {
            self.raw()
        }
    };
}

fn check_header(fields: &Fields, registry: &str) -> Result<(), UcoinError> {
    let version = fields.require_u64("Version")?;
    if version != DOCUMENT_VERSION as u64 {
        return Err(UcoinError::MalformedDocument(format!("version {version} not supported")));
    }
    let found = fields.require("Registry")?;
    if found != registry {
        return Err(UcoinError::MalformedDocument(format!(
            "expected registry {registry}, got {found}"
        )));
    }
    Ok(())
}

// ── Membership ───────────────────────────────────────────────────────────────

/// Signed request to join (IN) or leave (OUT) the member set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub version: u32,
    pub currency: String,
    pub issuer: Fingerprint,
    pub direction: Direction,
    pub sig_time: Timestamp,
    pub signature: String,
    /// SHA-1 of the signed raw text.
    pub hash: HexHash,
    /// Number of the pending amendment this membership affects.
    pub am_number: AmNumber,
    /// Latest confirmed membership of its issuer.
    pub current: bool,
    /// Not cancelled by a later membership for the same amendment.
    pub eligible: bool,
    pub propagated: bool,
}

impl Membership {
    pub fn new(
        currency: &str,
        issuer: Fingerprint,
        direction: Direction,
        sig_time: Timestamp,
        signature: &str,
    ) -> Self {
        let mut ms = Self {
            version: DOCUMENT_VERSION,
            currency: currency.to_string(),
            issuer,
            direction,
            sig_time,
            signature: signature.to_string(),
            hash: String::new(),
            am_number: 0,
            current: false,
            eligible: true,
            propagated: false,
        };
        ms.hash = sha1_hex(ms.signed_raw().as_bytes());
        ms
    }

    /// Parse a raw membership followed by its detached signature.
    pub fn parse(signed_raw: &str) -> Result<Self, UcoinError> {
        let (body, signature) = split_signed(signed_raw);
        let fields = Fields::parse(&body)?;
        check_header(&fields, Self::REGISTRY)?;
        Ok(Self::new(
            fields.require("Currency")?,
            Fingerprint::parse(fields.require("Issuer")?)?,
            fields.require("Membership")?.parse()?,
            fields.require_timestamp("Date")?,
            &signature,
        ))
    }

    pub fn raw(&self) -> String {
        format!(
            "Version: {}\nCurrency: {}\nRegistry: {}\nIssuer: {}\nMembership: {}\nDate: {}\n",
            self.version,
            self.currency,
            Self::REGISTRY,
            self.issuer,
            self.direction,
            self.sig_time
        )
    }
}

impl Registration for Membership {
    const REGISTRY: &'static str = "MEMBERSHIP";
    registration_accessors!();
}

// ── Voting ───────────────────────────────────────────────────────────────────

/// Signed declaration of a member's will to become a voter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    pub version: u32,
    pub currency: String,
    pub issuer: Fingerprint,
    pub sig_time: Timestamp,
    pub signature: String,
    pub hash: HexHash,
    pub am_number: AmNumber,
    pub current: bool,
    pub eligible: bool,
    pub propagated: bool,
}

impl Voting {
    pub fn new(currency: &str, issuer: Fingerprint, sig_time: Timestamp, signature: &str) -> Self {
        let mut vt = Self {
            version: DOCUMENT_VERSION,
            currency: currency.to_string(),
            issuer,
            sig_time,
            signature: signature.to_string(),
            hash: String::new(),
            am_number: 0,
            current: false,
            eligible: true,
            propagated: false,
        };
        vt.hash = sha1_hex(vt.signed_raw().as_bytes());
        vt
    }

    pub fn parse(signed_raw: &str) -> Result<Self, UcoinError> {
        let (body, signature) = split_signed(signed_raw);
        let fields = Fields::parse(&body)?;
        check_header(&fields, Self::REGISTRY)?;
        Ok(Self::new(
            fields.require("Currency")?,
            Fingerprint::parse(fields.require("Issuer")?)?,
            fields.require_timestamp("Date")?,
            &signature,
        ))
    }

    pub fn raw(&self) -> String {
        format!(
            "Version: {}\nCurrency: {}\nRegistry: {}\nIssuer: {}\nDate: {}\n",
            self.version,
            self.currency,
            Self::REGISTRY,
            self.issuer,
            self.sig_time
        )
    }
}

impl Registration for Voting {
    const REGISTRY: &'static str = "VOTING";
    registration_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG: &str = "-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----\n";

    fn issuer() -> Fingerprint {
        Fingerprint::parse("C73882B64B7E72237A2F460CE9CAB76D19A8651E").unwrap()
    }

    #[test]
    fn membership_parses_signed_raw() {
        let ms = Membership::new("beta_brousouf", issuer(), Direction::In, 1_403_301_700, SIG);
        let parsed = Membership::parse(&ms.signed_raw()).unwrap();
        assert_eq!(parsed, ms);
        assert_eq!(parsed.hash, sha1_hex(ms.signed_raw().as_bytes()));
        assert!(parsed.eligible);
        assert!(!parsed.current);
    }

    #[test]
    fn membership_direction_is_checked() {
        let raw = Membership::new("beta_brousouf", issuer(), Direction::Out, 1, "")
            .raw()
            .replace("OUT", "MAYBE");
        assert!(Membership::parse(&raw).is_err());
    }

    #[test]
    fn voting_registry_is_checked() {
        let ms = Membership::new("beta_brousouf", issuer(), Direction::In, 1, SIG);
        assert!(Voting::parse(&ms.signed_raw()).is_err());
        let vt = Voting::new("beta_brousouf", issuer(), 1, SIG);
        assert_eq!(Voting::parse(&vt.signed_raw()).unwrap(), vt);
    }

    #[test]
    fn signature_changes_hash() {
        let a = Voting::new("beta_brousouf", issuer(), 1, SIG);
        let b = Voting::new("beta_brousouf", issuer(), 1, "-----BEGIN other\n");
        assert_ne!(a.hash, b.hash);
    }
}
