//! Single-worker queues in front of the engine.
//!
//! Amendment creation, registrations and votes each get their own FIFO
//! worker. A job runs to completion (writes flushed) before its worker
//! dequeues the next one, and every job re-reads the pending amendment
//! when it starts. The engine itself sits behind a mutex, so jobs from
//! different queues never interleave inside the store.

use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ucoin_core::amendment::Amendment;
use ucoin_core::error::UcoinError;
use ucoin_core::membership::{Membership, Voting};
use ucoin_core::types::{AmNumber, Fingerprint, Timestamp};
use ucoin_core::vote::Vote;

use crate::engine::ConsensusEngine;
use crate::registry::Submission;
use crate::votes::VoteReceipt;

type Reply<T> = oneshot::Sender<Result<T, UcoinError>>;

enum CreationJob {
    Start { reply: Reply<Amendment> },
}

enum RegistrationJob {
    Membership { ms: Membership, reply: Reply<Submission<Membership>> },
    Voting { vt: Voting, reply: Reply<Submission<Voting>> },
}

enum VoteJob {
    Incoming { vote: Vote, amendment: Amendment, reply: Reply<VoteReceipt> },
    SelfVote { number: AmNumber, now: Timestamp, reply: Reply<VoteReceipt> },
}

/// Cloneable handle to the three queues.
#[derive(Clone)]
pub struct SyncService {
    engine: Arc<Mutex<ConsensusEngine>>,
    creation: mpsc::UnboundedSender<CreationJob>,
    registrations: mpsc::UnboundedSender<RegistrationJob>,
    votes: mpsc::UnboundedSender<VoteJob>,
}

/// Run `job` on the blocking pool with exclusive access to the engine.
async fn run<T, F>(engine: &Arc<Mutex<ConsensusEngine>>, job: F) -> Result<T, UcoinError>
where
    T: Send + 'static,
    F: FnOnce(&ConsensusEngine) -> Result<T, UcoinError> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || {
        let guard = engine
            .lock()
            .map_err(|_| UcoinError::Storage("engine lock poisoned".into()))?;
        job(&*guard)
    })
    .await
    .map_err(|e| UcoinError::Storage(format!("worker task failed: {e}")))?
}

fn answer<T>(queue: &'static str, reply: Reply<T>, result: Result<T, UcoinError>) {
    if let Err(e) = &result {
        debug!(queue, error = %e, "job refused");
    }
    if reply.send(result).is_err() {
        warn!(queue, "caller dropped before the job completed");
    }
}

impl SyncService {
    /// Spawn the three workers on the current tokio runtime.
    pub fn spawn(engine: ConsensusEngine) -> (Self, Vec<JoinHandle<()>>) {
        let engine = Arc::new(Mutex::new(engine));
        let (creation, mut creation_rx) = mpsc::unbounded_channel::<CreationJob>();
        let (registrations, mut registrations_rx) = mpsc::unbounded_channel::<RegistrationJob>();
        let (votes, mut votes_rx) = mpsc::unbounded_channel::<VoteJob>();

        let mut handles = Vec::with_capacity(3);

        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            while let Some(CreationJob::Start { reply }) = creation_rx.recv().await {
                let result = run(&e, |engine| engine.start()).await;
                answer("creation", reply, result);
            }
        }));

        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            while let Some(job) = registrations_rx.recv().await {
                match job {
                    RegistrationJob::Membership { ms, reply } => {
                        let result = run(&e, move |engine| engine.submit_membership(ms)).await;
                        answer("membership", reply, result);
                    }
                    RegistrationJob::Voting { vt, reply } => {
                        let result = run(&e, move |engine| engine.submit_voting(vt)).await;
                        answer("voting", reply, result);
                    }
                }
            }
        }));

        let e = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            while let Some(job) = votes_rx.recv().await {
                match job {
                    VoteJob::Incoming { vote, amendment, reply } => {
                        let result = run(&e, move |engine| engine.accept_vote(vote, amendment)).await;
                        answer("vote", reply, result);
                    }
                    VoteJob::SelfVote { number, now, reply } => {
                        let result = run(&e, move |engine| engine.self_vote(number, now)).await;
                        answer("self-vote", reply, result);
                    }
                }
            }
        }));

        (Self { engine, creation, registrations, votes }, handles)
    }

    async fn request<J, T>(
        queue: &mpsc::UnboundedSender<J>,
        job: impl FnOnce(Reply<T>) -> J,
    ) -> Result<T, UcoinError> {
        let (tx, rx) = oneshot::channel();
        queue
            .send(job(tx))
            .map_err(|_| UcoinError::Storage("queue closed".into()))?;
        rx.await
            .map_err(|_| UcoinError::Storage("worker stopped before answering".into()))?
    }

    /// Create the pending amendment if none exists yet.
    pub async fn start(&self) -> Result<Amendment, UcoinError> {
        Self::request(&self.creation, |reply| CreationJob::Start { reply }).await
    }

    pub async fn submit_membership(&self, ms: Membership) -> Result<Submission<Membership>, UcoinError> {
        Self::request(&self.registrations, |reply| RegistrationJob::Membership { ms, reply }).await
    }

    pub async fn submit_voting(&self, vt: Voting) -> Result<Submission<Voting>, UcoinError> {
        Self::request(&self.registrations, |reply| RegistrationJob::Voting { vt, reply }).await
    }

    pub async fn submit_vote(
        &self,
        signed_raw: &str,
        issuer: Fingerprint,
        sig_time: Timestamp,
    ) -> Result<VoteReceipt, UcoinError> {
        let (vote, amendment) = Vote::parse(signed_raw, issuer, sig_time)?;
        self.accept_vote(vote, amendment).await
    }

    pub async fn accept_vote(&self, vote: Vote, amendment: Amendment) -> Result<VoteReceipt, UcoinError> {
        Self::request(&self.votes, |reply| VoteJob::Incoming { vote, amendment, reply }).await
    }

    pub async fn self_vote(&self, number: AmNumber, now: Timestamp) -> Result<VoteReceipt, UcoinError> {
        Self::request(&self.votes, |reply| VoteJob::SelfVote { number, now, reply }).await
    }

    /// Run a read-only query against the engine, serialized with the queues.
    pub async fn query<T, F>(&self, f: F) -> Result<T, UcoinError>
    where
        T: Send + 'static,
        F: FnOnce(&ConsensusEngine) -> Result<T, UcoinError> + Send + 'static,
    {
        run(&self.engine, f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::PeerEvent;
    use ucoin_core::membership::Direction;
    use ucoin_core::params::Parameters;
    use ucoin_crypto::signer::{DetachedSigner, DigestSigner};
    use ucoin_state::StateDb;

    fn node_key() -> Fingerprint {
        Fingerprint::parse("C73882B64B7E72237A2F460CE9CAB76D19A8651E").unwrap()
    }

    fn service() -> (SyncService, mpsc::UnboundedReceiver<PeerEvent>, Parameters) {
        let params = Parameters::default();
        let db = Arc::new(StateDb::temporary().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let verifier = Arc::new(DigestSigner::new(node_key()));
        let engine = ConsensusEngine::new(db, params.clone(), verifier, Arc::new(tx)).unwrap();
        let (service, _handles) = SyncService::spawn(engine);
        (service, rx, params)
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let (service, _rx, params) = service();
        let first = service.start().await.unwrap();
        let second = service.start().await.unwrap();
        assert_eq!(first.number, 0);
        assert_eq!(first.generated_at, params.epoch0_start);
        assert_eq!(first.hash, second.hash);
    }

    #[tokio::test]
    async fn membership_goes_through_its_queue() {
        let (service, mut rx, params) = service();
        service.start().await.unwrap();

        let signer = DigestSigner::new(Fingerprint::parse("2E69197FAB029D8669EF85E82457A1587CA0ED9C").unwrap());
        let unsigned = Membership::new(
            &params.currency,
            signer.fingerprint().clone(),
            Direction::In,
            params.epoch0_start + 100,
            "",
        );
        let signature = signer.sign(&unsigned.raw()).unwrap();
        let ms = Membership::new(
            &params.currency,
            signer.fingerprint().clone(),
            Direction::In,
            params.epoch0_start + 100,
            &signature,
        );

        let accepted = service.submit_membership(ms.clone()).await.unwrap();
        assert!(matches!(accepted, Submission::Accepted(_)));
        assert_eq!(rx.recv().await.unwrap().name(), "membership");

        let again = service.submit_membership(ms).await.unwrap_err();
        assert!(matches!(again, UcoinError::AlreadyReceived(_)));

        let pending = service.query(|engine| engine.views().amendment(0)).await.unwrap();
        assert_eq!(pending.members_changes.len(), 1);
    }

    #[tokio::test]
    async fn self_vote_needs_a_signer() {
        let (service, _rx, _params) = service();
        service.start().await.unwrap();
        let err = service.self_vote(0, 1_403_301_700).await.unwrap_err();
        assert!(matches!(err, UcoinError::VoteUnavailable));
    }
}
