//! Submission of Membership and Voting documents to the pending amendment.
//!
//! Checks run in a fixed order (validation, duplicate, timing, status,
//! cancellation) and each one assumes the previous ones hold.

use tracing::{debug, info, warn};

use ucoin_core::amendment::SetKind;
use ucoin_core::document::format_timestamp;
use ucoin_core::error::UcoinError;
use ucoin_core::membership::{Direction, Membership, Registration, Voting};
use ucoin_core::params::Parameters;
use ucoin_crypto::signer::SignatureVerifier;
use ucoin_state::StateDb;

use crate::builder::AmendmentBuilder;
use crate::context;

/// Result of an accepted registration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<R> {
    /// Recorded and applied to the pending amendment.
    Accepted(R),
    /// Recorded, but it cancelled an earlier document of its issuer for
    /// the same amendment; neither counts any more.
    Cancelled(R),
}

impl<R> Submission<R> {
    pub fn record(&self) -> &R {
        match self {
            Submission::Accepted(r) | Submission::Cancelled(r) => r,
        }
    }

    pub fn into_record(self) -> R {
        match self {
            Submission::Accepted(r) | Submission::Cancelled(r) => r,
        }
    }
}

/// Checks shared by both registries. Returns the document bound to the
/// pending amendment and the still-eligible document it cancels, if any.
fn prepare<R: Registration>(
    db: &StateDb,
    params: &Parameters,
    verifier: &dyn SignatureVerifier,
    builder: &AmendmentBuilder<'_>,
    mut doc: R,
) -> Result<(R, Option<R>), UcoinError> {
    debug!(registry = R::REGISTRY, issuer = %doc.issuer(), hash = %doc.hash(), "incoming document");
    if doc.currency() != params.currency {
        return Err(UcoinError::WrongCurrency(doc.currency().to_string()));
    }
    if !verifier.verify(doc.issuer(), &doc.unsigned_raw(), doc.signature()) {
        return Err(UcoinError::InvalidSignature);
    }
    if db.registration_by_hash::<R>(doc.hash())?.is_some() {
        return Err(UcoinError::AlreadyReceived(format!("{} {}", R::REGISTRY, doc.hash())));
    }
    let (start, end) = params.window(builder.current().map(|c| c.generated_at));
    if doc.sig_time() < start {
        return Err(UcoinError::TooLate {
            date: format_timestamp(doc.sig_time()),
            minimal: format_timestamp(start),
        });
    }
    if doc.sig_time() >= end {
        return Err(UcoinError::TooEarly {
            date: format_timestamp(doc.sig_time()),
            maximal: format_timestamp(end),
        });
    }

    let number = builder.pending().number;
    doc.set_am_number(number);
    doc.set_current(false);
    doc.set_eligible(true);
    doc.set_propagated(false);
    let previous = db
        .registrations_for::<R>(doc.issuer(), number)?
        .into_iter()
        .rev()
        .find(|r| r.is_eligible());
    Ok((doc, previous))
}

/// Submit a membership to the pending amendment.
pub fn submit_membership(
    db: &StateDb,
    params: &Parameters,
    verifier: &dyn SignatureVerifier,
    ms: Membership,
) -> Result<Submission<Membership>, UcoinError> {
    let mut builder = AmendmentBuilder::load(db, params)?;
    let (mut ms, previous) = prepare(db, params, verifier, &builder, ms)?;

    if ms.direction == Direction::Out {
        let latest = context::latest_membership(db, &ms.issuer, ms.am_number, &[])?;
        if latest.map_or(true, |l| l.direction == Direction::Out) {
            warn!(issuer = %ms.issuer, "OUT membership without prior IN");
            return Err(UcoinError::OptInOnly);
        }
    }

    let cancelled = previous.is_some();
    if let Some(mut previous) = previous {
        previous.eligible = false;
        ms.eligible = false;
        info!(issuer = %ms.issuer, number = ms.am_number, "membership cancelled");
        builder.stage_membership(previous);
    }
    builder.stage_membership(ms.clone());
    builder.update_member(&ms.issuer)?;
    builder.commit()?;

    Ok(if cancelled { Submission::Cancelled(ms) } else { Submission::Accepted(ms) })
}

/// Submit a voting declaration to the pending amendment.
pub fn submit_voting(
    db: &StateDb,
    params: &Parameters,
    verifier: &dyn SignatureVerifier,
    vt: Voting,
) -> Result<Submission<Voting>, UcoinError> {
    let mut builder = AmendmentBuilder::load(db, params)?;
    let (mut vt, previous) = prepare(db, params, verifier, &builder, vt)?;

    let entry = builder.key(&vt.issuer)?;
    if !entry.is_leaf(SetKind::Members) {
        return Err(UcoinError::NotAProposedMember);
    }
    if entry.is_voter {
        return Err(UcoinError::AlreadyVoter);
    }

    let cancelled = previous.is_some();
    if let Some(mut previous) = previous {
        previous.eligible = false;
        vt.eligible = false;
        info!(issuer = %vt.issuer, number = vt.am_number, "voting cancelled");
        builder.stage_voting(previous);
    }
    builder.stage_voting(vt.clone());
    builder.update_voter(&vt.issuer)?;
    builder.commit()?;

    Ok(if cancelled { Submission::Cancelled(vt) } else { Submission::Accepted(vt) })
}
