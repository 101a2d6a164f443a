//! Context assembly: what the indicator vectors are for a key right now.
//!
//! Reads go to the store, overlaid with documents staged by the running
//! operation but not yet committed.

use ucoin_core::amendment::{Amendment, SetKind};
use ucoin_core::error::UcoinError;
use ucoin_core::ledger::KeyEntry;
use ucoin_core::membership::{Direction, Membership, Registration, Voting};
use ucoin_core::params::Parameters;
use ucoin_core::types::{AmNumber, Fingerprint, Timestamp};
use ucoin_core::vote::Vote;
use ucoin_state::StateDb;

use crate::indicator::{MemberStatus, PendingMembership, PendingVoting};

/// Stored registrations of `issuer` for amendment `number`, with staged
/// documents replacing or following them.
pub fn registrations_for<R: Registration>(
    db: &StateDb,
    issuer: &Fingerprint,
    number: AmNumber,
    staged: &[R],
) -> Result<Vec<R>, UcoinError> {
    let mut records = db.registrations_for::<R>(issuer, number)?;
    for doc in staged
        .iter()
        .filter(|d| d.issuer() == issuer && d.am_number() == number)
    {
        match records.iter_mut().find(|r| r.hash() == doc.hash()) {
            Some(slot) => *slot = doc.clone(),
            None => records.push(doc.clone()),
        }
    }
    Ok(records)
}

/// Confirmed membership status of `issuer` as seen by the amendment
/// generated at `generated_at`.
pub fn member_status(
    db: &StateDb,
    params: &Parameters,
    issuer: &Fingerprint,
    generated_at: Timestamp,
) -> Result<MemberStatus, UcoinError> {
    Ok(match db.current_registration::<Membership>(issuer)? {
        None => MemberStatus::None,
        Some(ms) if ms.direction == Direction::Out => MemberStatus::Out,
        Some(ms) if generated_at - ms.sig_time > params.ms_expires => MemberStatus::InTooOld,
        Some(_) => MemberStatus::In,
    })
}

/// Pending membership events, decided by the two most recent memberships
/// of `issuer` for amendment `number`.
pub fn pending_membership(
    db: &StateDb,
    issuer: &Fingerprint,
    number: AmNumber,
    staged: &[Membership],
) -> Result<PendingMembership, UcoinError> {
    let records = registrations_for(db, issuer, number, staged)?;
    let mut pending = PendingMembership::default();
    match records.as_slice() {
        [.., newest] if newest.eligible => match newest.direction {
            Direction::In => pending.next_in = true,
            Direction::Out => pending.next_out = true,
        },
        [.., older, newest] if !older.eligible && !newest.eligible => match older.direction {
            Direction::In => pending.next_in_cancelled = true,
            Direction::Out => pending.next_out_cancelled = true,
        },
        _ => {}
    }
    Ok(pending)
}

/// The issuer's latest relevant membership: its newest eligible one for
/// amendment `number`, else its confirmed one.
pub fn latest_membership(
    db: &StateDb,
    issuer: &Fingerprint,
    number: AmNumber,
    staged: &[Membership],
) -> Result<Option<Membership>, UcoinError> {
    let newest_eligible = registrations_for(db, issuer, number, staged)?
        .into_iter()
        .rev()
        .find(|ms| ms.eligible);
    match newest_eligible {
        Some(ms) => Ok(Some(ms)),
        None => db.current_registration::<Membership>(issuer),
    }
}

/// Whether `issuer` voted on the promoted amendment `current`. Votes on
/// the root amendment are never required, nor from voters who were not
/// entitled to vote on `current`.
pub fn has_voted(
    db: &StateDb,
    issuer: &Fingerprint,
    current: Option<&Amendment>,
    staged: &[Vote],
) -> Result<bool, UcoinError> {
    let Some(current) = current else {
        return Ok(true);
    };
    if current.number == 0 {
        return Ok(true);
    }
    let entitled = db
        .voters_snapshot(current.number - 1)?
        .is_some_and(|voters| voters.contains(issuer));
    if !entitled {
        return Ok(true);
    }
    let staged_vote = staged
        .iter()
        .any(|v| &v.issuer == issuer && v.basis == current.number && v.amendment_hash == current.hash);
    Ok(staged_vote || db.get_vote(current.number, &current.hash, issuer)?.is_some())
}

/// Voter-side events of `entry` for the pending amendment `number`.
pub fn pending_voting(
    db: &StateDb,
    entry: &KeyEntry,
    number: AmNumber,
    current: Option<&Amendment>,
    staged_votings: &[Voting],
    staged_votes: &[Vote],
) -> Result<PendingVoting, UcoinError> {
    let has_new_voting = registrations_for(db, &entry.fingerprint, number, staged_votings)?
        .last()
        .is_some_and(|vt| vt.eligible);
    Ok(PendingVoting {
        has_voted: has_voted(db, &entry.fingerprint, current, staged_votes)?,
        has_new_voting,
        is_leaving_member: !entry.is_leaf(SetKind::Members),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "2E69197FAB029D8669EF85E82457A1587CA0ED9C";

    fn alice() -> Fingerprint {
        Fingerprint::parse(ALICE).unwrap()
    }

    fn ms(direction: Direction, sig: &str, eligible: bool) -> Membership {
        let mut ms = Membership::new("beta_brousouf", alice(), direction, 1_403_301_700, sig);
        ms.am_number = 1;
        ms.eligible = eligible;
        ms
    }

    #[test]
    fn newest_eligible_gives_next_direction() {
        let db = StateDb::temporary().unwrap();
        let staged = [ms(Direction::In, "-----BEGIN a\n", true)];
        let p = pending_membership(&db, &alice(), 1, &staged).unwrap();
        assert!(p.next_in && !p.next_out);
    }

    #[test]
    fn cancelled_pair_gives_cancelled_flag() {
        let db = StateDb::temporary().unwrap();
        db.save_registration(&ms(Direction::In, "-----BEGIN a\n", false)).unwrap();
        let staged = [ms(Direction::Out, "-----BEGIN b\n", false)];
        let p = pending_membership(&db, &alice(), 1, &staged).unwrap();
        assert_eq!(
            p,
            PendingMembership { next_in_cancelled: true, ..Default::default() }
        );
        assert!(latest_membership(&db, &alice(), 1, &staged).unwrap().is_none());
    }

    #[test]
    fn status_tracks_expiry() {
        let db = StateDb::temporary().unwrap();
        let params = Parameters::default();
        assert_eq!(member_status(&db, &params, &alice(), 0).unwrap(), MemberStatus::None);
        let mut confirmed = ms(Direction::In, "-----BEGIN a\n", true);
        confirmed.current = true;
        db.save_registration(&confirmed).unwrap();
        let fresh = confirmed.sig_time + 10;
        let stale = confirmed.sig_time + params.ms_expires + 1;
        assert_eq!(member_status(&db, &params, &alice(), fresh).unwrap(), MemberStatus::In);
        assert_eq!(member_status(&db, &params, &alice(), stale).unwrap(), MemberStatus::InTooOld);
    }

    #[test]
    fn root_amendment_needs_no_vote() {
        let db = StateDb::temporary().unwrap();
        let root = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        assert!(has_voted(&db, &alice(), Some(&root), &[]).unwrap());
        let next = Amendment::new("beta_brousouf", 1, 1_403_388_000);
        assert!(has_voted(&db, &alice(), Some(&next), &[]).unwrap());
        db.put_voters_snapshot(0, &[alice()]).unwrap();
        assert!(!has_voted(&db, &alice(), Some(&next), &[]).unwrap());
        let vote = Vote::new(&next, alice(), 1_403_388_100, "-----BEGIN v\n");
        assert!(has_voted(&db, &alice(), Some(&next), &[vote]).unwrap());
    }
}
