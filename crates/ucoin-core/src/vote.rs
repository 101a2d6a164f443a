use serde::{Deserialize, Serialize};

use crate::amendment::Amendment;
use crate::document::split_signed;
use crate::error::UcoinError;
use crate::hash::sha1_hex;
use crate::types::{AmNumber, Fingerprint, HexHash, Timestamp};

/// A voter's detached signature over an amendment's raw text.
///
/// Issuer and signing time are extracted from the signature by the
/// external signature layer and handed over alongside the raw text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub issuer: Fingerprint,
    /// Number of the amendment voted for.
    pub basis: AmNumber,
    pub amendment_hash: HexHash,
    pub signature: String,
    pub sig_time: Timestamp,
    /// SHA-1 of the signature, the leaf pushed in the signatures merkle set.
    pub hash: HexHash,
    pub propagated: bool,
    /// Produced by this node's own signer.
    pub self_generated: bool,
}

impl Vote {
    pub fn new(amendment: &Amendment, issuer: Fingerprint, sig_time: Timestamp, signature: &str) -> Self {
        Self {
            issuer,
            basis: amendment.number,
            amendment_hash: amendment.hash.clone(),
            signature: signature.to_string(),
            sig_time,
            hash: sha1_hex(signature.as_bytes()),
            propagated: false,
            self_generated: false,
        }
    }

    /// Split a signed amendment into the voted amendment and its vote.
    pub fn parse(
        signed_raw: &str,
        issuer: Fingerprint,
        sig_time: Timestamp,
    ) -> Result<(Self, Amendment), UcoinError> {
        let (body, signature) = split_signed(signed_raw);
        if signature.is_empty() {
            return Err(UcoinError::MalformedDocument("vote carries no signature".into()));
        }
        let amendment = Amendment::parse(&body)?;
        let vote = Self::new(&amendment, issuer, sig_time, &signature);
        Ok((vote, amendment))
    }

    /// The signed form: amendment raw text followed by the signature.
    pub fn signed_raw(&self, amendment: &Amendment) -> String {
        format!("{}{}", amendment.raw(), self.signature)
    }

    /// Identity used to detect resubmissions.
    pub fn document_hash(&self, amendment: &Amendment) -> HexHash {
        sha1_hex(self.signed_raw(amendment).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_splits_amendment_and_signature() {
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        let issuer = Fingerprint::parse("2E69197FAB029D8669EF85E82457A1587CA0ED9C").unwrap();
        let signed = format!("{}-----BEGIN PGP SIGNATURE-----\nxyz\n", am.raw());
        let (vote, parsed) = Vote::parse(&signed, issuer, 1_403_301_700).unwrap();
        assert_eq!(parsed, am);
        assert_eq!(vote.basis, 0);
        assert_eq!(vote.amendment_hash, am.hash);
        assert_eq!(vote.hash, sha1_hex(b"-----BEGIN PGP SIGNATURE-----\nxyz\n"));
        assert_eq!(vote.signed_raw(&am), signed);
    }

    #[test]
    fn unsigned_vote_is_rejected() {
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        let issuer = Fingerprint::parse("2E69197FAB029D8669EF85E82457A1587CA0ED9C").unwrap();
        assert!(Vote::parse(&am.raw(), issuer, 1).is_err());
    }
}
