//! Read-only views served by the external controller layer.

use serde::Serialize;
use std::collections::BTreeMap;

use ucoin_core::amendment::{Amendment, SetKind};
use ucoin_core::error::UcoinError;
use ucoin_core::membership::{Membership, Registration, Voting};
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Fingerprint};
use ucoin_core::vote::Vote;
use ucoin_crypto::merkle::MerkleSet;
use ucoin_state::{signatures_merkle, StateDb};

/// Merkle tree summary of a set, as diffed by peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerkleView {
    pub depth: usize,
    pub nodes_count: usize,
    pub leaves_count: u64,
    pub root: String,
    pub leaves: Vec<String>,
}

impl From<&MerkleSet> for MerkleView {
    fn from(set: &MerkleSet) -> Self {
        Self {
            depth: set.depth(),
            nodes_count: set.nodes_count(),
            leaves_count: set.leaves_count(),
            root: set.root(),
            leaves: set.leaves(),
        }
    }
}

/// The votes that promoted an amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteBundle {
    pub amendment: Amendment,
    pub signatures: MerkleView,
    pub votes: Vec<Vote>,
}

pub struct Views<'a> {
    db: &'a StateDb,
    params: &'a Parameters,
}

impl<'a> Views<'a> {
    pub fn new(db: &'a StateDb, params: &'a Parameters) -> Self {
        Self { db, params }
    }

    pub fn parameters(&self) -> &Parameters {
        self.params
    }

    // ── Registries ───────────────────────────────────────────────────────────

    pub fn membership_current(&self, fpr: &Fingerprint) -> Result<Membership, UcoinError> {
        self.current_of::<Membership>(fpr)
    }

    pub fn membership_history(&self, fpr: &Fingerprint) -> Result<Vec<Membership>, UcoinError> {
        self.db.registrations_of(fpr)
    }

    pub fn voting_current(&self, fpr: &Fingerprint) -> Result<Voting, UcoinError> {
        self.current_of::<Voting>(fpr)
    }

    pub fn voting_history(&self, fpr: &Fingerprint) -> Result<Vec<Voting>, UcoinError> {
        self.db.registrations_of(fpr)
    }

    fn current_of<R: Registration>(&self, fpr: &Fingerprint) -> Result<R, UcoinError> {
        self.db
            .current_registration::<R>(fpr)?
            .ok_or_else(|| UcoinError::NotFound(format!("no current {} for {fpr}", R::REGISTRY)))
    }

    // ── Amendments ───────────────────────────────────────────────────────────

    /// The latest promoted amendment.
    pub fn current_amendment(&self) -> Result<Amendment, UcoinError> {
        self.db
            .current()?
            .ok_or_else(|| UcoinError::NotFound("no promoted amendment yet".into()))
    }

    /// Promoted amendment `number`, else the pending one if it has that number.
    pub fn amendment(&self, number: AmNumber) -> Result<Amendment, UcoinError> {
        if let Some(am) = self.db.promoted(number)? {
            return Ok(am);
        }
        match self.db.pending()? {
            Some(pending) if pending.number == number => Ok(pending),
            _ => Err(UcoinError::NotFound(format!("amendment #{number}"))),
        }
    }

    fn changes_view(
        &self,
        number: AmNumber,
        algo: &str,
        kind: SetKind,
        joining: bool,
    ) -> Result<MerkleView, UcoinError> {
        self.check_algorithm(algo)?;
        let am = self.amendment(number)?;
        let keys = am.changed_keys(kind, joining);
        let set = MerkleSet::from_leaves(keys.iter().map(Fingerprint::as_str));
        Ok(MerkleView::from(&set))
    }

    pub fn members_in(&self, number: AmNumber, algo: &str) -> Result<MerkleView, UcoinError> {
        self.changes_view(number, algo, SetKind::Members, true)
    }

    pub fn members_out(&self, number: AmNumber, algo: &str) -> Result<MerkleView, UcoinError> {
        self.changes_view(number, algo, SetKind::Members, false)
    }

    pub fn voters_in(&self, number: AmNumber, algo: &str) -> Result<MerkleView, UcoinError> {
        self.changes_view(number, algo, SetKind::Voters, true)
    }

    pub fn voters_out(&self, number: AmNumber, algo: &str) -> Result<MerkleView, UcoinError> {
        self.changes_view(number, algo, SetKind::Voters, false)
    }

    // ── Votes ────────────────────────────────────────────────────────────────

    /// Votes collected by the promoted amendment `number`.
    pub fn vote_bundle(&self, number: AmNumber, algo: &str) -> Result<VoteBundle, UcoinError> {
        self.check_algorithm(algo)?;
        let amendment = self
            .db
            .promoted(number)?
            .ok_or_else(|| UcoinError::NotFound(format!("promoted amendment #{number}")))?;
        let signatures = self.db.merkle(&signatures_merkle(number, &amendment.hash))?;
        let votes = self.db.votes_for(number, &amendment.hash)?;
        Ok(VoteBundle { signatures: MerkleView::from(&signatures), votes, amendment })
    }

    /// Vote counts per amendment number and hash.
    pub fn votes_index(&self) -> Result<BTreeMap<AmNumber, BTreeMap<String, u64>>, UcoinError> {
        self.db.votes_index()
    }

    fn check_algorithm(&self, algo: &str) -> Result<(), UcoinError> {
        if algo != self.params.algorithm {
            return Err(UcoinError::UnknownAlgorithm(algo.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_algorithm_is_refused() {
        let db = StateDb::temporary().unwrap();
        let params = Parameters::default();
        let views = Views::new(&db, &params);
        let err = views.members_in(0, "Community").unwrap_err();
        assert!(matches!(err, UcoinError::UnknownAlgorithm(_)));
        assert!(matches!(views.amendment(0).unwrap_err(), UcoinError::NotFound(_)));
    }

    #[test]
    fn merkle_view_of_empty_set() {
        let view = MerkleView::from(&MerkleSet::new());
        assert_eq!(view.root, "");
        assert_eq!(view.leaves_count, 0);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["depth"], 0);
    }
}
