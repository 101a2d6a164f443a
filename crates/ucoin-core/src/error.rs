use thiserror::Error;

use crate::types::{AmNumber, Timestamp};

/// Where an error falls in the node's rejection policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad signature, malformed document, mismatched fingerprint or hash.
    Validation,
    /// Outside the accepted time window; the caller may retry later.
    Timing,
    /// Duplicate or contradicting submission; no state change.
    Conflict,
    /// Broken bookkeeping invariant. Fatal for the triggering operation.
    Integrity,
    /// Persistent store or encoding failure.
    Storage,
}

#[derive(Debug, Error)]
pub enum UcoinError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("currency not managed: {0}")]
    WrongCurrency(String),

    #[error("amendment hash mismatch: announced {announced}, computed {computed}")]
    AmendmentHashMismatch { announced: String, computed: String },

    #[error("vote basis {basis} does not match amendment #{number}")]
    BasisMismatch { basis: AmNumber, number: AmNumber },

    // ── Timing errors ────────────────────────────────────────────────────────
    #[error("too late for this document ({date}): must be at least {minimal}, time of current amendment")]
    TooLate { date: String, minimal: String },

    #[error("too early for this document ({date}): must be at most {maximal} (next amendment date)")]
    TooEarly { date: String, maximal: String },

    #[error("vote for future epoch: amendment #{number} starts at {generated_at}, signed at {sig_time}")]
    VoteForFutureEpoch { number: AmNumber, generated_at: Timestamp, sig_time: Timestamp },

    #[error("previous amendment not found, cannot record vote for amendment #{0}")]
    PreviousAmendmentNotFound(AmNumber),

    #[error("no amendment is under construction yet")]
    NoPendingAmendment,

    // ── Conflict errors ──────────────────────────────────────────────────────
    #[error("already received: {0}")]
    AlreadyReceived(String),

    #[error("you can only opt-in right now")]
    OptInOnly,

    #[error("only members may be voters")]
    NotAProposedMember,

    #[error("already a voter for the current amendment")]
    AlreadyVoter,

    #[error("only voters of amendment #{0} may vote for its follower")]
    NotAVoter(AmNumber),

    #[error("cannot record vote for previous amendment #{0}")]
    ObsoleteVote(AmNumber),

    #[error("vote on a forked chain: amendment #{number} does not extend the promoted amendment #{previous}")]
    ForkedProposal { number: AmNumber, previous: AmNumber },

    #[error("amendment #{0} is already promoted")]
    AlreadyPromoted(AmNumber),

    #[error("not promoted: need root amendment first")]
    RootAmendmentMissing,

    #[error("not promoted: #{number} is not a follower of current amendment #{current}")]
    NotAFollower { number: AmNumber, current: AmNumber },

    #[error("not promoted: previous hash {previous_hash} does not match current amendment {current_hash}")]
    ChainMismatch { previous_hash: String, current_hash: String },

    #[error("algorithm not managed: {0}")]
    UnknownAlgorithm(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("vote unavailable for now")]
    VoteUnavailable,

    // ── Integrity errors ─────────────────────────────────────────────────────
    #[error("wrong {vector} state vector {values:?}: components must sum to exactly 1")]
    InvalidStateVector { vector: &'static str, values: Vec<i64> },

    #[error("dividend {dividend} exceeds the epoch cap of {cap}")]
    DividendCapExceeded { dividend: u64, cap: u64 },

    #[error("monetary arithmetic overflow while computing amendment #{0}")]
    MonetaryOverflow(AmNumber),

    #[error("inconsistent ledger: {0}")]
    InconsistentLedger(String),

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("propagation failed: {0}")]
    Propagation(String),
}

impl UcoinError {
    pub fn kind(&self) -> ErrorKind {
        use UcoinError::*;
        match self {
            InvalidSignature
            | MalformedDocument(_)
            | WrongCurrency(_)
            | AmendmentHashMismatch { .. }
            | BasisMismatch { .. }
            | InvalidParameters(_) => ErrorKind::Validation,

            TooLate { .. }
            | TooEarly { .. }
            | VoteForFutureEpoch { .. }
            | PreviousAmendmentNotFound(_)
            | NoPendingAmendment => ErrorKind::Timing,

            AlreadyReceived(_)
            | OptInOnly
            | NotAProposedMember
            | AlreadyVoter
            | NotAVoter(_)
            | ObsoleteVote(_)
            | ForkedProposal { .. }
            | AlreadyPromoted(_)
            | RootAmendmentMissing
            | NotAFollower { .. }
            | ChainMismatch { .. }
            | UnknownAlgorithm(_)
            | NotFound(_)
            | VoteUnavailable => ErrorKind::Conflict,

            InvalidStateVector { .. }
            | DividendCapExceeded { .. }
            | MonetaryOverflow(_)
            | InconsistentLedger(_) => ErrorKind::Integrity,

            Serialization(_) | Storage(_) | Propagation(_) => ErrorKind::Storage,
        }
    }

    /// Integrity errors reveal a bookkeeping bug and abort the operation.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(UcoinError::InvalidSignature.kind(), ErrorKind::Validation);
        assert_eq!(UcoinError::NoPendingAmendment.kind(), ErrorKind::Timing);
        assert_eq!(UcoinError::AlreadyReceived("x".into()).kind(), ErrorKind::Conflict);
        assert!(UcoinError::InvalidStateVector { vector: "membership", values: vec![1, 1, 0, 0] }
            .is_fatal());
        assert!(!UcoinError::OptInOnly.is_fatal());
    }
}
