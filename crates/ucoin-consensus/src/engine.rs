use std::sync::Arc;
use tracing::info;

use ucoin_core::amendment::Amendment;
use ucoin_core::error::UcoinError;
use ucoin_core::membership::{Membership, Voting};
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Fingerprint, Timestamp};
use ucoin_core::vote::Vote;
use ucoin_crypto::signer::{DetachedSigner, SignatureVerifier};
use ucoin_state::StateDb;

use crate::builder::AmendmentBuilder;
use crate::propagation::{propagate_registration, propagate_vote, Broadcaster, PeerEvent};
use crate::registry::{self, Submission};
use crate::views::Views;
use crate::votes::{self, VoteReceipt};

// ── ConsensusEngine ──────────────────────────────────────────────────────────

/// The amendment consensus engine of one node.
///
/// Every mutating method runs to completion before returning and must not
/// be called concurrently; `SyncService` serializes calls through its
/// queues.
pub struct ConsensusEngine {
    db: Arc<StateDb>,
    params: Parameters,
    verifier: Arc<dyn SignatureVerifier>,
    signer: Option<Arc<dyn DetachedSigner>>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl ConsensusEngine {
    pub fn new(
        db: Arc<StateDb>,
        params: Parameters,
        verifier: Arc<dyn SignatureVerifier>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, UcoinError> {
        params.validate()?;
        Ok(Self { db, params, verifier, signer: None, broadcaster })
    }

    /// Give the engine this node's signing key, enabling self-votes.
    pub fn with_signer(mut self, signer: Arc<dyn DetachedSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn db(&self) -> &StateDb {
        &self.db
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn views(&self) -> Views<'_> {
        Views::new(&self.db, &self.params)
    }

    /// The pending amendment, created from the current one (or as the
    /// root amendment) if none is under construction.
    pub fn start(&self) -> Result<Amendment, UcoinError> {
        if let Some(pending) = self.db.pending()? {
            return Ok(pending);
        }
        let current = self.db.current()?;
        AmendmentBuilder::create_next(&self.db, &self.params, current.as_ref())
    }

    // ── Documents ────────────────────────────────────────────────────────────

    pub fn submit_membership(&self, ms: Membership) -> Result<Submission<Membership>, UcoinError> {
        let submission = registry::submit_membership(&self.db, &self.params, &*self.verifier, ms)?;
        let mut record = submission.record().clone();
        propagate_registration(&self.db, &*self.broadcaster, &mut record, PeerEvent::Membership)?;
        self.db.flush()?;
        Ok(submission)
    }

    pub fn submit_voting(&self, vt: Voting) -> Result<Submission<Voting>, UcoinError> {
        let submission = registry::submit_voting(&self.db, &self.params, &*self.verifier, vt)?;
        let mut record = submission.record().clone();
        propagate_registration(&self.db, &*self.broadcaster, &mut record, PeerEvent::Voting)?;
        self.db.flush()?;
        Ok(submission)
    }

    /// Submit a signed amendment (raw text followed by the signature) as a
    /// vote of `issuer` signed at `sig_time`.
    pub fn submit_vote(
        &self,
        signed_raw: &str,
        issuer: Fingerprint,
        sig_time: Timestamp,
    ) -> Result<VoteReceipt, UcoinError> {
        let (vote, amendment) = Vote::parse(signed_raw, issuer, sig_time)?;
        self.accept_vote(vote, amendment)
    }

    pub fn accept_vote(&self, vote: Vote, amendment: Amendment) -> Result<VoteReceipt, UcoinError> {
        let mut receipt = votes::submit_vote(&self.db, &self.params, &*self.verifier, vote, amendment)?;
        propagate_vote(&self.db, &*self.broadcaster, &mut receipt.vote, &receipt.amendment)?;
        self.db.flush()?;
        Ok(receipt)
    }

    /// This node's vote on the pending amendment `number`.
    pub fn self_vote(&self, number: AmNumber, now: Timestamp) -> Result<VoteReceipt, UcoinError> {
        let signer = self.signer.as_deref().ok_or(UcoinError::VoteUnavailable)?;
        let mut receipt =
            votes::self_vote(&self.db, &self.params, &*self.verifier, signer, number, now)?;
        propagate_vote(&self.db, &*self.broadcaster, &mut receipt.vote, &receipt.amendment)?;
        self.db.flush()?;
        Ok(receipt)
    }

    // ── Managed keys ─────────────────────────────────────────────────────────

    /// Flag `fpr` as a key managed by this node.
    pub fn manage_key(&self, fpr: &Fingerprint) -> Result<(), UcoinError> {
        let mut entry = self.db.key_or_default(fpr)?;
        if !entry.managed {
            entry.managed = true;
            self.db.put_key(&entry)?;
            info!(key = %fpr, "key managed");
        }
        Ok(())
    }

    pub fn managed_keys(&self) -> Result<Vec<Fingerprint>, UcoinError> {
        Ok(self
            .db
            .keys()?
            .into_iter()
            .filter(|e| e.managed)
            .map(|e| e.fingerprint)
            .collect())
    }
}
