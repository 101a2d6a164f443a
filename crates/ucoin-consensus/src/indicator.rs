//! Indicator Calculator: pure mapping from a key's confirmed status and
//! its pending change events to a signed delta on the member or voter set.

use tracing::error;

use ucoin_core::error::UcoinError;
use ucoin_core::types::KeyState;

// ── Membership ───────────────────────────────────────────────────────────────

/// Confirmed membership status of a key before the pending amendment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    /// No confirmed membership.
    None,
    In,
    Out,
    /// Confirmed IN older than the membership expiry.
    InTooOld,
}

impl MemberStatus {
    /// `[none, in, out, in_too_old]`
    pub fn vector(self) -> [i64; 4] {
        match self {
            MemberStatus::None => [1, 0, 0, 0],
            MemberStatus::In => [0, 1, 0, 0],
            MemberStatus::Out => [0, 0, 1, 0],
            MemberStatus::InTooOld => [0, 0, 0, 1],
        }
    }
}

/// Membership events recorded for the pending amendment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingMembership {
    pub next_in: bool,
    pub next_out: bool,
    pub next_in_cancelled: bool,
    pub next_out_cancelled: bool,
}

impl PendingMembership {
    /// `[1, next_in, next_out, next_in_cancelled, next_out_cancelled]`
    pub fn vector(&self) -> [i64; 5] {
        [
            1,
            self.next_in as i64,
            self.next_out as i64,
            self.next_in_cancelled as i64,
            self.next_out_cancelled as i64,
        ]
    }
}

/// Membership delta for a state vector `ms` and a pending vector `p`.
pub fn membership_delta(ms: [i64; 4], p: [i64; 5]) -> Result<KeyState, UcoinError> {
    check_vector("membership", &ms)?;
    let delta = ms[0] * (p[1] - p[3])
        + ms[1] * (-p[2] + p[4])
        + ms[2] * (p[1] - p[3])
        + ms[3] * (-p[0] + p[1] - p[3]);
    Ok(KeyState::from_delta(delta))
}

// ── Voting ───────────────────────────────────────────────────────────────────

/// Voter-side events for the pending amendment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingVoting {
    pub has_voted: bool,
    pub has_new_voting: bool,
    pub is_leaving_member: bool,
}

impl PendingVoting {
    /// `[has_not_voted, has_voted, has_new_voting, is_leaving_member]`
    pub fn vector(&self) -> [i64; 4] {
        [
            !self.has_voted as i64,
            self.has_voted as i64,
            self.has_new_voting as i64,
            self.is_leaving_member as i64,
        ]
    }
}

/// `[was_not_voter, was_voter]`
pub fn voter_vector(was_voter: bool) -> [i64; 2] {
    [!was_voter as i64, was_voter as i64]
}

/// Voter delta for a state vector `vt` and a pending vector `p`.
pub fn voting_delta(vt: [i64; 2], p: [i64; 4]) -> Result<KeyState, UcoinError> {
    check_vector("voter", &vt)?;
    let delta = vt[0] * (p[2] - p[3]) + vt[1] * (-p[0] + p[1] - p[3]);
    Ok(KeyState::from_delta(delta))
}

fn check_vector(vector: &'static str, values: &[i64]) -> Result<(), UcoinError> {
    let sum: i64 = values.iter().sum();
    if sum != 1 || values.iter().any(|v| !(0..=1).contains(v)) {
        error!(vector, ?values, "state vector does not sum to 1");
        return Err(UcoinError::InvalidStateVector { vector, values: values.to_vec() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use KeyState::*;

    fn pending(next_in: bool, next_out: bool, in_cancelled: bool, out_cancelled: bool) -> [i64; 5] {
        PendingMembership {
            next_in,
            next_out,
            next_in_cancelled: in_cancelled,
            next_out_cancelled: out_cancelled,
        }
        .vector()
    }

    #[test]
    fn newcomer_joins_with_in() {
        let ms = MemberStatus::None.vector();
        assert_eq!(membership_delta(ms, pending(true, false, false, false)).unwrap(), Joining);
        assert_eq!(membership_delta(ms, pending(false, false, false, false)).unwrap(), Unchanged);
    }

    #[test]
    fn member_leaves_with_out_and_cancels_back() {
        let ms = MemberStatus::In.vector();
        assert_eq!(membership_delta(ms, pending(false, true, false, false)).unwrap(), Leaving);
        assert_eq!(membership_delta(ms, pending(false, false, false, true)).unwrap(), Joining);
        // Renewal of a valid membership changes nothing.
        assert_eq!(membership_delta(ms, pending(true, false, false, false)).unwrap(), Unchanged);
    }

    #[test]
    fn cancelled_in_reverts_join() {
        let ms = MemberStatus::Out.vector();
        assert_eq!(membership_delta(ms, pending(true, false, false, false)).unwrap(), Joining);
        assert_eq!(membership_delta(ms, pending(false, false, true, false)).unwrap(), Leaving);
    }

    #[test]
    fn too_old_membership_must_be_renewed() {
        let ms = MemberStatus::InTooOld.vector();
        assert_eq!(membership_delta(ms, pending(false, false, false, false)).unwrap(), Leaving);
        assert_eq!(membership_delta(ms, pending(true, false, false, false)).unwrap(), Unchanged);
    }

    #[test]
    fn broken_vectors_are_fatal() {
        let err = membership_delta([1, 1, 0, 0], pending(true, false, false, false)).unwrap_err();
        assert!(err.is_fatal());
        let err = voting_delta([0, 0], PendingVoting::default().vector()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn voter_rules() {
        let newcomer = voter_vector(false);
        let voting = PendingVoting { has_new_voting: true, ..Default::default() };
        assert_eq!(voting_delta(newcomer, voting.vector()).unwrap(), Joining);
        let leaving = PendingVoting { has_new_voting: true, is_leaving_member: true, ..Default::default() };
        assert_eq!(voting_delta(newcomer, leaving.vector()).unwrap(), Unchanged);

        let voter = voter_vector(true);
        let active = PendingVoting { has_voted: true, ..Default::default() };
        assert_eq!(voting_delta(voter, active.vector()).unwrap(), Unchanged);
        assert_eq!(voting_delta(voter, PendingVoting::default().vector()).unwrap(), Leaving);
        let quitting = PendingVoting { has_voted: true, is_leaving_member: true, ..Default::default() };
        assert_eq!(voting_delta(voter, quitting.vector()).unwrap(), Leaving);
    }
}
