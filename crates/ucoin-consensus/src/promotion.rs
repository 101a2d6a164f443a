//! Promotion Engine: turns the voted candidate into the new promoted
//! amendment once quorum and chain linkage hold.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use ucoin_core::amendment::{parse_change, Amendment, SetKind};
use ucoin_core::error::UcoinError;
use ucoin_core::ledger::KeyEntry;
use ucoin_core::membership::{Direction, Membership, Registration, Voting};
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Fingerprint, KeyState};
use ucoin_crypto::merkle::MerkleSet;
use ucoin_state::{signatures_merkle, StateDb, PROPOSED_MEMBERS, PROPOSED_VOTERS};

use crate::builder::AmendmentBuilder;

/// Outcome of a promotion attempt. Missing quorum is not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Promotion {
    Promoted(Amendment),
    /// Quorum not met yet.
    NotYet { have: u64, need: u64 },
    /// The candidate is the already promoted current amendment.
    AlreadyPromoted(AmNumber),
}

/// Decide whether `candidate` may be promoted now, without side effects.
pub fn check(db: &StateDb, candidate: &Amendment) -> Result<Promotion, UcoinError> {
    let computed = candidate.compute_hash();
    if computed != candidate.hash {
        return Err(UcoinError::AmendmentHashMismatch {
            announced: candidate.hash.clone(),
            computed,
        });
    }
    let current = db.current()?;
    if candidate.number == 0 && current.is_none() {
        return Ok(Promotion::Promoted(candidate.clone()));
    }
    let current = current.ok_or(UcoinError::RootAmendmentMissing)?;
    if current.number == candidate.number && current.hash == candidate.hash {
        return Ok(Promotion::AlreadyPromoted(current.number));
    }
    if candidate.number != current.number + 1 {
        return Err(UcoinError::NotAFollower {
            number: candidate.number,
            current: current.number,
        });
    }
    if candidate.previous_hash != current.hash {
        return Err(UcoinError::ChainMismatch {
            previous_hash: candidate.previous_hash.clone(),
            current_hash: current.hash,
        });
    }
    let have = db
        .merkle(&signatures_merkle(candidate.number, &candidate.hash))?
        .leaves_count();
    let need = current.next_votes;
    if have < need {
        debug!(number = candidate.number, have, need, "quorum not met");
        return Ok(Promotion::NotYet { have, need });
    }
    Ok(Promotion::Promoted(candidate.clone()))
}

/// Promote `candidate` if it qualifies, then start its follower. The
/// promotion and the follower are written in one batch.
pub fn try_to_promote(
    db: &StateDb,
    params: &Parameters,
    candidate: &Amendment,
) -> Result<Promotion, UcoinError> {
    match check(db, candidate)? {
        Promotion::Promoted(am) => Ok(Promotion::Promoted(db.atomically(|| promote(db, params, am))?)),
        other => Ok(other),
    }
}

fn promote(db: &StateDb, params: &Parameters, mut am: Amendment) -> Result<Amendment, UcoinError> {
    am.promoted = true;
    db.put_promoted(&am)?;
    if am.dividend > 0 {
        db.set_last_dividend(&am)?;
    }

    // Confirm the set changes in the ledger.
    let mut ledger: BTreeMap<Fingerprint, KeyEntry> = db
        .keys()?
        .into_iter()
        .map(|entry| (entry.fingerprint.clone(), entry))
        .collect();
    for kind in [SetKind::Members, SetKind::Voters] {
        for token in am.changes(kind) {
            let (joining, fpr) = parse_change(token)?;
            let entry = ledger
                .entry(fpr.clone())
                .or_insert_with(|| KeyEntry::new(fpr));
            entry.set_confirmed(kind, joining);
            entry.known = true;
        }
    }

    // Eligible documents become current; leavers lose theirs.
    confirm_registrations::<Membership>(db, am.number)?;
    confirm_registrations::<Voting>(db, am.number)?;
    for fpr in am.changed_keys(SetKind::Members, false) {
        if let Some(mut ms) = db.current_registration::<Membership>(&fpr)? {
            if ms.direction == Direction::In {
                ms.current = false;
                db.save_registration(&ms)?;
            }
        }
    }
    for fpr in am.changed_keys(SetKind::Voters, false) {
        if let Some(mut vt) = db.current_registration::<Voting>(&fpr)? {
            vt.current = false;
            db.save_registration(&vt)?;
        }
    }

    // Reset pending states and rebuild the proposed sets.
    let mut members = MerkleSet::new();
    let mut voters = Vec::new();
    for entry in ledger.values_mut() {
        entry.last_ms_state = KeyState::Unchanged;
        entry.last_voter_state = KeyState::Unchanged;
        entry.kick = false;
        if entry.is_member {
            members.push(entry.fingerprint.as_str());
        }
        if entry.is_voter {
            voters.push(entry.fingerprint.clone());
        }
        db.put_key(entry)?;
    }
    let voters_set = MerkleSet::from_leaves(voters.iter().map(Fingerprint::as_str));
    if members.root() != am.members_root || voters_set.root() != am.voters_root {
        warn!(number = am.number, "ledger roots differ from the promoted amendment");
    }
    db.put_merkle(PROPOSED_MEMBERS, &members)?;
    db.put_merkle(PROPOSED_VOTERS, &voters_set)?;
    db.put_voters_snapshot(am.number, &voters)?;

    let votes = db.merkle(&signatures_merkle(am.number, &am.hash))?.leaves_count();
    info!(number = am.number, hash = %am.hash, votes, "amendment promoted");

    AmendmentBuilder::create_next(db, params, Some(&am))?;
    Ok(am)
}

/// Flip the eligible registrations targeting `number` to current,
/// demoting their issuers' previous current ones.
fn confirm_registrations<R: Registration>(db: &StateDb, number: AmNumber) -> Result<(), UcoinError> {
    for mut record in db.eligible_registrations::<R>(number)? {
        if let Some(mut previous) = db.current_registration::<R>(record.issuer())? {
            previous.set_current(false);
            db.save_registration(&previous)?;
        }
        record.set_current(true);
        db.save_registration(&record)?;
    }
    Ok(())
}
