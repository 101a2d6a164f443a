use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use ucoin_core::amendment::Amendment;
use ucoin_core::error::UcoinError;
use ucoin_core::membership::{Membership, Registration, Voting};
use ucoin_core::vote::Vote;
use ucoin_state::StateDb;

/// Accepted documents forwarded to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerEvent {
    Membership(Membership),
    Voting(Voting),
    /// A vote travels with the amendment it signs.
    Vote { vote: Vote, amendment: Amendment },
}

impl PeerEvent {
    /// Event name as announced to peers.
    pub fn name(&self) -> &'static str {
        match self {
            PeerEvent::Membership(_) => "membership",
            PeerEvent::Voting(_) => "voting",
            PeerEvent::Vote { .. } => "vote",
        }
    }

    /// Serialize for the peer transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, UcoinError> {
        bincode::serialize(self).map_err(|e| UcoinError::Serialization(e.to_string()))
    }

    /// Deserialize bytes received from a peer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UcoinError> {
        bincode::deserialize(bytes).map_err(|e| UcoinError::Serialization(e.to_string()))
    }
}

/// Outbound side of the peer transport.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, event: PeerEvent) -> Result<(), UcoinError>;
}

impl Broadcaster for UnboundedSender<PeerEvent> {
    fn broadcast(&self, event: PeerEvent) -> Result<(), UcoinError> {
        self.send(event)
            .map_err(|e| UcoinError::Propagation(format!("peer channel closed ({})", e.0.name())))
    }
}

/// Broadcast a registration once, then persist its `propagated` flag. A
/// failed broadcast leaves the flag unset for a later retry.
pub fn propagate_registration<R: Registration>(
    db: &StateDb,
    broadcaster: &dyn Broadcaster,
    record: &mut R,
    event: impl FnOnce(R) -> PeerEvent,
) -> Result<(), UcoinError> {
    if record.is_propagated() {
        return Ok(());
    }
    let event = event(record.clone());
    let name = event.name();
    match broadcaster.broadcast(event) {
        Ok(()) => {
            record.set_propagated(true);
            db.save_registration(record)?;
            debug!(event = name, hash = %record.hash(), "propagated");
        }
        Err(e) => warn!(event = name, error = %e, "propagation failed"),
    }
    Ok(())
}

/// Broadcast a vote once, then persist its `propagated` flag.
pub fn propagate_vote(
    db: &StateDb,
    broadcaster: &dyn Broadcaster,
    vote: &mut Vote,
    amendment: &Amendment,
) -> Result<(), UcoinError> {
    if vote.propagated {
        return Ok(());
    }
    let event = PeerEvent::Vote { vote: vote.clone(), amendment: amendment.clone() };
    match broadcaster.broadcast(event) {
        Ok(()) => {
            vote.propagated = true;
            db.put_vote(vote)?;
            debug!(event = "vote", issuer = %vote.issuer.short(), "propagated");
        }
        Err(e) => warn!(event = "vote", error = %e, "propagation failed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucoin_core::membership::Direction;
    use ucoin_core::types::Fingerprint;

    fn membership() -> Membership {
        let issuer = Fingerprint::parse("2E69197FAB029D8669EF85E82457A1587CA0ED9C").unwrap();
        Membership::new("beta_brousouf", issuer, Direction::In, 1_403_301_700, "-----BEGIN s\n")
    }

    #[test]
    fn wire_codec() {
        let event = PeerEvent::Membership(membership());
        let bytes = event.to_bytes().unwrap();
        assert_eq!(PeerEvent::from_bytes(&bytes).unwrap(), event);
        assert!(PeerEvent::from_bytes(&[0xFF, 0x01]).is_err());
    }

    #[test]
    fn registration_is_broadcast_once() {
        let db = StateDb::temporary().unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut ms = membership();
        db.save_registration(&ms).unwrap();

        propagate_registration(&db, &tx, &mut ms, PeerEvent::Membership).unwrap();
        propagate_registration(&db, &tx, &mut ms, PeerEvent::Membership).unwrap();
        assert_eq!(rx.try_recv().unwrap().name(), "membership");
        assert!(rx.try_recv().is_err());
        let stored: Membership = db.registration_by_hash(&ms.hash).unwrap().unwrap();
        assert!(stored.propagated);
    }

    #[test]
    fn closed_channel_keeps_flag_unset() {
        let db = StateDb::temporary().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut ms = membership();
        propagate_registration(&db, &tx, &mut ms, PeerEvent::Membership).unwrap();
        assert!(!ms.propagated);
    }
}
