//! Vote Intake: validates and records votes, refreshes the voter's
//! bookkeeping and asks the Promotion Engine to check quorum.

use tracing::{debug, info, warn};

use ucoin_core::amendment::Amendment;
use ucoin_core::error::UcoinError;
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Timestamp};
use ucoin_core::vote::Vote;
use ucoin_crypto::signer::{DetachedSigner, SignatureVerifier};
use ucoin_state::{signatures_merkle, StateDb};

use crate::builder::AmendmentBuilder;
use crate::promotion::{check, try_to_promote, Promotion};

/// A recorded vote and what became of the promotion attempt it triggered.
#[derive(Debug)]
pub struct VoteReceipt {
    pub vote: Vote,
    pub amendment: Amendment,
    /// Refusals (chain mismatch, not a follower...) do not undo the vote.
    pub promotion: Result<Promotion, UcoinError>,
}

/// Validate `vote` on `candidate` and record it.
pub fn submit_vote(
    db: &StateDb,
    params: &Parameters,
    verifier: &dyn SignatureVerifier,
    vote: Vote,
    candidate: Amendment,
) -> Result<VoteReceipt, UcoinError> {
    debug!(issuer = %vote.issuer, basis = vote.basis, hash = %vote.amendment_hash, "incoming vote");
    if candidate.currency != params.currency {
        return Err(UcoinError::WrongCurrency(candidate.currency));
    }
    if vote.basis != candidate.number || vote.amendment_hash != candidate.hash {
        return Err(UcoinError::BasisMismatch { basis: vote.basis, number: candidate.number });
    }
    if !verifier.verify(&vote.issuer, &candidate.raw(), &vote.signature) {
        return Err(UcoinError::InvalidSignature);
    }

    let current = db.current()?;
    let next_number = current.as_ref().map_or(0, |c| c.number + 1);
    if vote.basis > next_number {
        return Err(UcoinError::PreviousAmendmentNotFound(vote.basis));
    }
    if candidate.generated_at > vote.sig_time {
        return Err(UcoinError::VoteForFutureEpoch {
            number: candidate.number,
            generated_at: candidate.generated_at,
            sig_time: vote.sig_time,
        });
    }
    if let Some(current) = &current {
        if vote.basis < current.number {
            return Err(UcoinError::ObsoleteVote(vote.basis));
        }
    }
    if vote.basis > 0 {
        let previous = vote.basis - 1;
        let voters = db.voters_snapshot(previous)?.unwrap_or_default();
        if !voters.contains(&vote.issuer) {
            return Err(UcoinError::NotAVoter(previous));
        }
        let promoted = db
            .promoted(previous)?
            .ok_or(UcoinError::PreviousAmendmentNotFound(vote.basis))?;
        if candidate.previous_hash != promoted.hash {
            return Err(UcoinError::ForkedProposal { number: candidate.number, previous });
        }
    }
    if db.get_vote(vote.basis, &vote.amendment_hash, &vote.issuer)?.is_some() {
        return Err(UcoinError::AlreadyReceived(format!(
            "vote of {} for amendment #{} ({})",
            vote.issuer, vote.basis, vote.amendment_hash
        )));
    }

    // Recording and promotion land together; a fatal error leaves no trace.
    let (signatures, promotion) = db.atomically(|| {
        if db.get_amendment(&candidate.hash)?.is_none() {
            db.put_amendment(&candidate)?;
        }
        let stacked = current
            .as_ref()
            .is_some_and(|c| c.number == candidate.number && c.hash == candidate.hash);
        if stacked {
            // Late vote on the promoted amendment: keeps the voter in the set.
            let mut builder = AmendmentBuilder::load(db, params)?;
            builder.stage_vote(vote.clone());
            builder.update_voter(&vote.issuer)?;
            builder.commit()?;
        } else {
            db.put_vote(&vote)?;
        }
        let merkle_name = signatures_merkle(candidate.number, &candidate.hash);
        let mut signatures = db.merkle(&merkle_name)?;
        signatures.push(&vote.signature);
        db.put_merkle(&merkle_name, &signatures)?;

        match try_to_promote(db, params, &candidate) {
            Err(e) if e.is_fatal() => Err(e),
            other => Ok((signatures.leaves_count(), other)),
        }
    })?;
    info!(issuer = %vote.issuer.short(), number = candidate.number, signatures, "vote recorded");
    match &promotion {
        Ok(outcome) => debug!(number = candidate.number, ?outcome, "promotion attempt"),
        Err(e) => warn!(number = candidate.number, error = %e, "not promoted"),
    }
    Ok(VoteReceipt { vote, amendment: candidate, promotion })
}

/// This node's vote on the pending amendment `number`, generating and
/// submitting it on first request.
pub fn self_vote(
    db: &StateDb,
    params: &Parameters,
    verifier: &dyn SignatureVerifier,
    signer: &dyn DetachedSigner,
    number: AmNumber,
    now: Timestamp,
) -> Result<VoteReceipt, UcoinError> {
    let pending = db.pending()?.ok_or(UcoinError::NoPendingAmendment)?;
    if pending.number != number {
        return Err(UcoinError::VoteUnavailable);
    }
    if let Some(vote) = db.get_vote(number, &pending.hash, signer.fingerprint())? {
        let promotion = check(db, &pending);
        return Ok(VoteReceipt { vote, amendment: pending, promotion });
    }
    let signature = signer.sign(&pending.raw())?;
    let mut vote = Vote::new(&pending, signer.fingerprint().clone(), now, &signature);
    vote.self_generated = true;
    info!(number, hash = %pending.hash, "self-vote generated");
    submit_vote(db, params, verifier, vote, pending)
}
