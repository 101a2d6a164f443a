//! Amendment Builder: owns the pending amendment together with the two
//! proposed merkle sets and the key ledger entries it touches.
//!
//! Every operation stages its changes in memory and [`AmendmentBuilder::commit`]
//! writes them in one pass, so a failing operation leaves the store as it was.

use std::collections::BTreeMap;
use tracing::{debug, info};

use ucoin_core::amendment::{change_token, Amendment, SetKind};
use ucoin_core::error::UcoinError;
use ucoin_core::ledger::KeyEntry;
use ucoin_core::membership::{Membership, Voting};
use ucoin_core::params::Parameters;
use ucoin_core::types::{Fingerprint, KeyState};
use ucoin_core::vote::Vote;
use ucoin_crypto::merkle::MerkleSet;
use ucoin_state::{StateDb, PROPOSED_MEMBERS, PROPOSED_VOTERS};

use crate::context;
use crate::dividend::universal_dividend;
use crate::indicator::{membership_delta, voter_vector, voting_delta, MemberStatus};

// ── Transition table ─────────────────────────────────────────────────────────

/// Effect of moving a key from one state to another on a proposed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    NoOp,
    /// 0 → 1: push leaf, record `+key`.
    Add,
    /// 1 → 0: remove leaf, drop `+key`.
    RemoveCancel,
    /// 0 → −1: remove leaf, record `-key`.
    Remove,
    /// −1 → 0: push leaf, drop `-key`.
    AddCancel,
}

impl Transition {
    pub fn between(from: KeyState, to: KeyState) -> Self {
        use KeyState::*;
        match (from, to) {
            (Unchanged, Joining) => Transition::Add,
            (Joining, Unchanged) => Transition::RemoveCancel,
            (Unchanged, Leaving) => Transition::Remove,
            (Leaving, Unchanged) => Transition::AddCancel,
            _ => Transition::NoOp,
        }
    }
}

/// Clamp an indicator target for `entry` on set `kind`: a confirmed key
/// cannot join again, an unconfirmed one cannot leave, and a pending join
/// (or leave) is only ever cancelled, never flipped.
pub fn clamp_target(entry: &KeyEntry, kind: SetKind, target: KeyState) -> KeyState {
    let target = match target {
        KeyState::Joining if entry.confirmed(kind) => KeyState::Unchanged,
        KeyState::Leaving if !entry.confirmed(kind) => KeyState::Unchanged,
        other => other,
    };
    match (entry.state(kind), target) {
        (KeyState::Joining, KeyState::Leaving) | (KeyState::Leaving, KeyState::Joining) => {
            KeyState::Unchanged
        }
        _ => target,
    }
}

// ── AmendmentBuilder ─────────────────────────────────────────────────────────

pub struct AmendmentBuilder<'a> {
    db: &'a StateDb,
    params: &'a Parameters,
    current: Option<Amendment>,
    previous_dividend: Option<u64>,
    pending: Amendment,
    members: MerkleSet,
    voters: MerkleSet,
    keys: BTreeMap<Fingerprint, KeyEntry>,
    memberships: Vec<Membership>,
    votings: Vec<Voting>,
    votes: Vec<Vote>,
}

impl<'a> AmendmentBuilder<'a> {
    /// Open the builder on the stored pending amendment.
    pub fn load(db: &'a StateDb, params: &'a Parameters) -> Result<Self, UcoinError> {
        let pending = db.pending()?.ok_or(UcoinError::NoPendingAmendment)?;
        Self::with_pending(db, params, pending)
    }

    fn with_pending(
        db: &'a StateDb,
        params: &'a Parameters,
        pending: Amendment,
    ) -> Result<Self, UcoinError> {
        Ok(Self {
            current: db.current()?,
            previous_dividend: db.last_dividend()?.map(|am| am.dividend),
            members: db.merkle(PROPOSED_MEMBERS)?,
            voters: db.merkle(PROPOSED_VOTERS)?,
            keys: BTreeMap::new(),
            memberships: Vec::new(),
            votings: Vec::new(),
            votes: Vec::new(),
            pending,
            db,
            params,
        })
    }

    /// Create the amendment following `previous` (the root amendment when
    /// `None`) and store it as the pending one.
    pub fn create_next(
        db: &'a StateDb,
        params: &'a Parameters,
        previous: Option<&Amendment>,
    ) -> Result<Amendment, UcoinError> {
        let pending = match previous {
            None => Amendment::new(&params.currency, 0, params.epoch0_start),
            Some(prev) => {
                let mut am = Amendment::new(
                    &params.currency,
                    prev.number + 1,
                    prev.generated_at + params.epoch_length,
                );
                am.previous_hash = prev.hash.clone();
                am.monetary_mass = prev.monetary_mass;
                am
            }
        };
        let mut builder = Self::with_pending(db, params, pending)?;
        builder.refresh()?;

        if previous.is_some_and(|prev| prev.number > 0) {
            for entry in db.keys()? {
                if entry.is_member {
                    builder.review_member(&entry.fingerprint)?;
                }
            }
            for entry in db.keys()? {
                if entry.is_voter {
                    builder.update_voter(&entry.fingerprint)?;
                }
            }
        }

        let am = builder.commit()?;
        info!(number = am.number, hash = %am.hash, "amendment created");
        Ok(am)
    }

    pub fn pending(&self) -> &Amendment {
        &self.pending
    }

    /// Latest promoted amendment.
    pub fn current(&self) -> Option<&Amendment> {
        self.current.as_ref()
    }

    /// Ledger entry of `fpr` as staged by this builder.
    pub fn key(&mut self, fpr: &Fingerprint) -> Result<&mut KeyEntry, UcoinError> {
        if !self.keys.contains_key(fpr) {
            let entry = self.db.key_or_default(fpr)?;
            self.keys.insert(fpr.clone(), entry);
        }
        self.keys
            .get_mut(fpr)
            .ok_or_else(|| UcoinError::InconsistentLedger(format!("entry {fpr} vanished")))
    }

    // ── Staging ──────────────────────────────────────────────────────────────

    pub fn stage_membership(&mut self, ms: Membership) {
        self.memberships.retain(|m| m.hash != ms.hash);
        self.memberships.push(ms);
    }

    pub fn stage_voting(&mut self, vt: Voting) {
        self.votings.retain(|v| v.hash != vt.hash);
        self.votings.push(vt);
    }

    pub fn stage_vote(&mut self, vote: Vote) {
        self.votes.push(vote);
    }

    // ── Set updates ──────────────────────────────────────────────────────────

    /// Move `fpr` towards `target` on set `kind`, keeping the merkle set,
    /// the changes list and the ledger state in step.
    pub fn apply(
        &mut self,
        kind: SetKind,
        fpr: &Fingerprint,
        target: KeyState,
    ) -> Result<Transition, UcoinError> {
        let entry = self.key(fpr)?.clone();
        let to = clamp_target(&entry, kind, target);
        let transition = Transition::between(entry.state(kind), to);
        if transition == Transition::NoOp {
            return Ok(transition);
        }

        let plus = change_token(true, fpr);
        let minus = change_token(false, fpr);
        let set = match kind {
            SetKind::Members => &mut self.members,
            SetKind::Voters => &mut self.voters,
        };
        match transition {
            Transition::Add => {
                set.push(fpr.as_str());
                self.pending.add_change(kind, &plus);
                self.pending.remove_change(kind, &minus);
                info!(number = self.pending.number, "{kind} {plus}");
            }
            Transition::RemoveCancel => {
                set.remove(fpr.as_str());
                self.pending.remove_change(kind, &plus);
                info!(number = self.pending.number, "{kind} CANCEL {plus}");
            }
            Transition::Remove => {
                set.remove(fpr.as_str());
                self.pending.add_change(kind, &minus);
                self.pending.remove_change(kind, &plus);
                info!(number = self.pending.number, "{kind} {minus}");
            }
            Transition::AddCancel => {
                set.push(fpr.as_str());
                self.pending.remove_change(kind, &minus);
                info!(number = self.pending.number, "{kind} CANCEL {minus}");
            }
            Transition::NoOp => {}
        }
        let entry = self.key(fpr)?;
        entry.set_state(kind, to);
        if kind == SetKind::Members && transition == Transition::AddCancel {
            entry.kick = false;
        }
        self.refresh()?;
        Ok(transition)
    }

    /// Recompute the membership indicator of `fpr` and apply it. Voter
    /// bookkeeping follows, since leaving members stop being voters.
    pub fn update_member(&mut self, fpr: &Fingerprint) -> Result<Transition, UcoinError> {
        let status =
            context::member_status(self.db, self.params, fpr, self.pending.generated_at)?;
        self.update_member_with(fpr, status)
    }

    fn update_member_with(
        &mut self,
        fpr: &Fingerprint,
        status: MemberStatus,
    ) -> Result<Transition, UcoinError> {
        let pending =
            context::pending_membership(self.db, fpr, self.pending.number, &self.memberships)?;
        debug!(key = %fpr, ms = ?status.vector(), p = ?pending.vector(), "membership indicator");
        let target = membership_delta(status.vector(), pending.vector())?;
        let transition = self.apply(SetKind::Members, fpr, target)?;

        let entry = self.key(fpr)?;
        if entry.is_voter || entry.last_voter_state != KeyState::Unchanged {
            self.update_voter(fpr)?;
        }
        Ok(transition)
    }

    /// Re-evaluate a confirmed member at amendment creation. An expired
    /// membership excludes the member and flags the exclusion as a kick.
    fn review_member(&mut self, fpr: &Fingerprint) -> Result<(), UcoinError> {
        let status =
            context::member_status(self.db, self.params, fpr, self.pending.generated_at)?;
        let transition = self.update_member_with(fpr, status)?;
        if status == MemberStatus::InTooOld && transition == Transition::Remove {
            self.key(fpr)?.kick = true;
            info!(key = %fpr, number = self.pending.number, "membership expired, member kicked");
        }
        Ok(())
    }

    /// Recompute the voter indicator of `fpr` and apply it.
    pub fn update_voter(&mut self, fpr: &Fingerprint) -> Result<Transition, UcoinError> {
        let entry = self.key(fpr)?.clone();
        let pending = context::pending_voting(
            self.db,
            &entry,
            self.pending.number,
            self.current.as_ref(),
            &self.votings,
            &self.votes,
        )?;
        let vt = voter_vector(entry.is_voter);
        debug!(key = %fpr, vt = ?vt, p = ?pending.vector(), "voter indicator");
        let target = voting_delta(vt, pending.vector())?;
        self.apply(SetKind::Voters, fpr, target)
    }

    /// Re-read counts and roots, then recompute quorum, dividend and hash.
    fn refresh(&mut self) -> Result<(), UcoinError> {
        self.pending
            .set_commitment(SetKind::Members, self.members.root(), self.members.leaves_count());
        self.pending
            .set_commitment(SetKind::Voters, self.voters.root(), self.voters.leaves_count());
        self.pending.next_votes = self.params.next_votes(self.pending.voters_count);
        let issuance = universal_dividend(
            self.params,
            self.pending.number,
            self.pending.generated_at,
            self.pending.members_count,
            self.previous_dividend,
            self.current.as_ref().map_or(0, |c| c.monetary_mass),
        )?;
        self.pending.dividend = issuance.dividend;
        self.pending.monetary_mass = issuance.monetary_mass;
        self.pending.refresh_hash();
        Ok(())
    }

    /// Write every staged document, ledger entry and merkle set, then the
    /// pending amendment, as one batch.
    pub fn commit(self) -> Result<Amendment, UcoinError> {
        let db = self.db;
        db.atomically(|| {
            for ms in &self.memberships {
                db.save_registration(ms)?;
            }
            for vt in &self.votings {
                db.save_registration(vt)?;
            }
            for vote in &self.votes {
                db.put_vote(vote)?;
            }
            for entry in self.keys.values() {
                db.put_key(entry)?;
            }
            db.put_merkle(PROPOSED_MEMBERS, &self.members)?;
            db.put_merkle(PROPOSED_VOTERS, &self.voters)?;
            db.put_pending(&self.pending)
        })?;
        debug!(number = self.pending.number, hash = %self.pending.hash, "pending amendment saved");
        Ok(self.pending)
    }
}
