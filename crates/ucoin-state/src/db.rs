use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionResult};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use ucoin_core::amendment::Amendment;
use ucoin_core::error::UcoinError;
use ucoin_core::ledger::KeyEntry;
use ucoin_core::membership::{Membership, Registration};
use ucoin_core::types::{AmNumber, Fingerprint};
use ucoin_core::vote::Vote;
use ucoin_crypto::merkle::MerkleSet;

/// Merkle set backing `members_root` of the pending amendment.
pub const PROPOSED_MEMBERS: &str = "proposedMembers";
/// Merkle set backing `voters_root` of the pending amendment.
pub const PROPOSED_VOTERS: &str = "proposedVoters";

const META_CURRENT: &str = "current";
const META_PENDING: &str = "pending";
const META_LAST_DIVIDEND: &str = "last_dividend";

/// Name of the vote-signature merkle set of an amendment.
pub fn signatures_merkle(number: AmNumber, hash: &str) -> String {
    format!("signatures:{number:020}:{hash}")
}

fn storage(e: sled::Error) -> UcoinError {
    UcoinError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, UcoinError> {
    bincode::serialize(value).map_err(|e| UcoinError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, UcoinError> {
    bincode::deserialize(bytes).map_err(|e| UcoinError::Serialization(e.to_string()))
}

/// Writes staged by [`StateDb::atomically`], keyed by tree name then key.
type WriteSet = BTreeMap<Vec<u8>, (sled::Tree, BTreeMap<Vec<u8>, Vec<u8>>)>;

/// Records and index of one registry (memberships or votings).
struct RegistryTrees {
    /// `{issuer}:{am_number:020}:{seq:020}` → bincode(record)
    records: sled::Tree,
    /// document hash → record key
    by_hash: sled::Tree,
}

/// Persistent state database backed by sled.
///
/// Named trees:
///   amendments     — amendment hash          → bincode(Amendment)
///   am_numbers     — `{number:020}:{hash}`   → []
///   promoted       — `{number:020}`          → promoted amendment hash
///   memberships    — `{issuer}:{am}:{seq}`   → bincode(Membership) (+ hash index)
///   votings        — `{issuer}:{am}:{seq}`   → bincode(Voting) (+ hash index)
///   votes          — `{basis:020}:{hash}:{issuer}` → bincode(Vote)
///   keys           — fingerprint             → bincode(KeyEntry)
///   merkles        — merkle name             → bincode(MerkleSet)
///   voter_snapshots— `{number:020}`          → bincode(Vec<Fingerprint>)
///   meta           — utf8 key                → raw bytes
///
/// Inside [`StateDb::atomically`] every write is staged in memory and
/// reads see the staged value first; the whole set reaches sled in one
/// transaction or not at all.
pub struct StateDb {
    db: sled::Db,
    amendments: sled::Tree,
    am_numbers: sled::Tree,
    promoted: sled::Tree,
    memberships: RegistryTrees,
    votings: RegistryTrees,
    votes: sled::Tree,
    keys: sled::Tree,
    merkles: sled::Tree,
    voter_snapshots: sled::Tree,
    meta: sled::Tree,
    staged: Mutex<Option<WriteSet>>,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UcoinError> {
        let db = sled::open(path.as_ref()).map_err(storage)?;
        debug!(path = %path.as_ref().display(), "state db opened");
        Self::with_db(db)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, UcoinError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self, UcoinError> {
        let tree = |name: &str| db.open_tree(name).map_err(storage);
        Ok(Self {
            amendments: tree("amendments")?,
            am_numbers: tree("am_numbers")?,
            promoted: tree("promoted")?,
            memberships: RegistryTrees {
                records: tree("memberships")?,
                by_hash: tree("memberships_by_hash")?,
            },
            votings: RegistryTrees {
                records: tree("votings")?,
                by_hash: tree("votings_by_hash")?,
            },
            votes: tree("votes")?,
            keys: tree("keys")?,
            merkles: tree("merkles")?,
            voter_snapshots: tree("voter_snapshots")?,
            meta: tree("meta")?,
            staged: Mutex::new(None),
            db,
        })
    }

    // ── Staged writes ────────────────────────────────────────────────────────

    fn staging(&self) -> Result<MutexGuard<'_, Option<WriteSet>>, UcoinError> {
        self.staged
            .lock()
            .map_err(|_| UcoinError::Storage("staged write set poisoned".into()))
    }

    /// Run `op` with every write staged, then commit the staged set in a
    /// single sled transaction if `op` succeeds. On error nothing is
    /// written. Nested calls join the outermost batch.
    ///
    /// Callers must not run other writers concurrently; the engine is
    /// serialized behind one lock.
    pub fn atomically<T>(&self, op: impl FnOnce() -> Result<T, UcoinError>) -> Result<T, UcoinError> {
        {
            let mut staged = self.staging()?;
            if staged.is_some() {
                drop(staged);
                return op();
            }
            *staged = Some(WriteSet::new());
        }
        let result = op();
        let writes = self.staging()?.take().unwrap_or_default();
        match result {
            Ok(value) => {
                self.apply(writes)?;
                Ok(value)
            }
            Err(e) => {
                let discarded: usize = writes.values().map(|(_, entries)| entries.len()).sum();
                warn!(discarded, error = %e, "staged writes dropped");
                Err(e)
            }
        }
    }

    fn apply(&self, writes: WriteSet) -> Result<(), UcoinError> {
        if writes.is_empty() {
            return Ok(());
        }
        let (trees, batches): (Vec<sled::Tree>, Vec<BTreeMap<Vec<u8>, Vec<u8>>>) =
            writes.into_values().unzip();
        let result: TransactionResult<(), ()> = trees.as_slice().transaction(|tx_trees| {
            for (tree, entries) in tx_trees.iter().zip(&batches) {
                for (key, value) in entries {
                    tree.insert(key.as_slice(), value.as_slice())?;
                }
            }
            Ok::<(), ConflictableTransactionError<()>>(())
        });
        result.map_err(|e| UcoinError::Storage(format!("staged commit failed: {e:?}")))?;
        debug!(trees = trees.len(), "staged writes committed");
        Ok(())
    }

    fn read(&self, tree: &sled::Tree, key: &[u8]) -> Result<Option<Vec<u8>>, UcoinError> {
        let name = tree.name();
        if let Some(writes) = self.staging()?.as_ref() {
            if let Some(value) = writes.get(&name[..]).and_then(|(_, entries)| entries.get(key)) {
                return Ok(Some(value.clone()));
            }
        }
        Ok(tree.get(key).map_err(storage)?.map(|v| v.to_vec()))
    }

    fn write(&self, tree: &sled::Tree, key: &[u8], value: Vec<u8>) -> Result<(), UcoinError> {
        let mut staged = self.staging()?;
        match staged.as_mut() {
            Some(writes) => {
                writes
                    .entry(tree.name().to_vec())
                    .or_insert_with(|| (tree.clone(), BTreeMap::new()))
                    .1
                    .insert(key.to_vec(), value);
            }
            None => {
                tree.insert(key, value).map_err(storage)?;
            }
        }
        Ok(())
    }

    /// Entries under `prefix`, staged values overriding stored ones, in key order.
    fn entries(&self, tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, UcoinError> {
        let mut merged = BTreeMap::new();
        for item in tree.scan_prefix(prefix) {
            let (key, value) = item.map_err(storage)?;
            merged.insert(key.to_vec(), value.to_vec());
        }
        let name = tree.name();
        if let Some((_, entries)) = self.staging()?.as_ref().and_then(|w| w.get(&name[..])) {
            for (key, value) in entries.range(prefix.to_vec()..) {
                if !key.starts_with(prefix) {
                    break;
                }
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn get<T: DeserializeOwned>(&self, tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, UcoinError> {
        match self.read(tree, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), UcoinError> {
        self.write(tree, key, encode(value)?)
    }

    fn scan<T: DeserializeOwned>(&self, tree: &sled::Tree, prefix: &str) -> Result<Vec<T>, UcoinError> {
        self.entries(tree, prefix.as_bytes())?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    // ── Amendments ───────────────────────────────────────────────────────────

    pub fn get_amendment(&self, hash: &str) -> Result<Option<Amendment>, UcoinError> {
        self.get(&self.amendments, hash.as_bytes())
    }

    pub fn put_amendment(&self, am: &Amendment) -> Result<(), UcoinError> {
        self.put(&self.amendments, am.hash.as_bytes(), am)?;
        self.write(&self.am_numbers, format!("{:020}:{}", am.number, am.hash).as_bytes(), Vec::new())
    }

    /// Every stored amendment carrying `number`, promoted or not.
    pub fn amendments_numbered(&self, number: AmNumber) -> Result<Vec<Amendment>, UcoinError> {
        let mut out = Vec::new();
        for (key, _) in self.entries(&self.am_numbers, format!("{number:020}:").as_bytes())? {
            let key = String::from_utf8_lossy(&key).into_owned();
            if let Some((_, hash)) = key.split_once(':') {
                if let Some(am) = self.get_amendment(hash)? {
                    out.push(am);
                }
            }
        }
        Ok(out)
    }

    /// The promoted amendment numbered `number`, if any.
    pub fn promoted(&self, number: AmNumber) -> Result<Option<Amendment>, UcoinError> {
        match self.read(&self.promoted, format!("{number:020}").as_bytes())? {
            Some(hash) => self.get_amendment(&String::from_utf8_lossy(&hash)),
            None => Ok(None),
        }
    }

    /// Record `am` as the promoted amendment of its number and as current.
    pub fn put_promoted(&self, am: &Amendment) -> Result<(), UcoinError> {
        self.put_amendment(am)?;
        self.write(&self.promoted, format!("{:020}", am.number).as_bytes(), am.hash.as_bytes().to_vec())?;
        self.put_meta(META_CURRENT, am.hash.as_bytes())
    }

    /// Latest promoted amendment.
    pub fn current(&self) -> Result<Option<Amendment>, UcoinError> {
        match self.get_meta(META_CURRENT)? {
            Some(hash) => self.get_amendment(&String::from_utf8_lossy(&hash)),
            None => Ok(None),
        }
    }

    /// The amendment under construction.
    pub fn pending(&self) -> Result<Option<Amendment>, UcoinError> {
        self.get(&self.meta, META_PENDING.as_bytes())
    }

    pub fn put_pending(&self, am: &Amendment) -> Result<(), UcoinError> {
        self.put(&self.meta, META_PENDING.as_bytes(), am)
    }

    /// Latest promoted amendment that issued a dividend.
    pub fn last_dividend(&self) -> Result<Option<Amendment>, UcoinError> {
        match self.get_meta(META_LAST_DIVIDEND)? {
            Some(hash) => self.get_amendment(&String::from_utf8_lossy(&hash)),
            None => Ok(None),
        }
    }

    pub fn set_last_dividend(&self, am: &Amendment) -> Result<(), UcoinError> {
        self.put_meta(META_LAST_DIVIDEND, am.hash.as_bytes())
    }

    // ── Memberships / Votings ────────────────────────────────────────────────

    fn registry<R: Registration>(&self) -> &RegistryTrees {
        if R::REGISTRY == Membership::REGISTRY {
            &self.memberships
        } else {
            &self.votings
        }
    }

    /// Insert or update a registration document. New documents are keyed
    /// after every earlier one of the same issuer and amendment.
    pub fn save_registration<R: Registration>(&self, record: &R) -> Result<(), UcoinError> {
        let trees = self.registry::<R>();
        let key = match self.read(&trees.by_hash, record.hash().as_bytes())? {
            Some(key) => key,
            None => {
                let seq = self.db.generate_id().map_err(storage)?;
                let key = format!("{}:{:020}:{:020}", record.issuer(), record.am_number(), seq);
                self.write(&trees.by_hash, record.hash().as_bytes(), key.clone().into_bytes())?;
                key.into_bytes()
            }
        };
        self.put(&trees.records, &key, record)
    }

    pub fn registration_by_hash<R: Registration>(&self, hash: &str) -> Result<Option<R>, UcoinError> {
        let trees = self.registry::<R>();
        match self.read(&trees.by_hash, hash.as_bytes())? {
            Some(key) => self.get(&trees.records, &key),
            None => Ok(None),
        }
    }

    /// Every registration of `issuer`, by amendment then creation order.
    pub fn registrations_of<R: Registration>(&self, issuer: &Fingerprint) -> Result<Vec<R>, UcoinError> {
        self.scan(&self.registry::<R>().records, &format!("{issuer}:"))
    }

    /// Registrations of `issuer` targeting amendment `number`, oldest first.
    pub fn registrations_for<R: Registration>(
        &self,
        issuer: &Fingerprint,
        number: AmNumber,
    ) -> Result<Vec<R>, UcoinError> {
        self.scan(&self.registry::<R>().records, &format!("{issuer}:{number:020}:"))
    }

    /// The confirmed registration of `issuer`, if any.
    pub fn current_registration<R: Registration>(&self, issuer: &Fingerprint) -> Result<Option<R>, UcoinError> {
        Ok(self
            .registrations_of::<R>(issuer)?
            .into_iter()
            .rev()
            .find(|r| r.is_current()))
    }

    /// Still-eligible registrations targeting amendment `number`.
    pub fn eligible_registrations<R: Registration>(&self, number: AmNumber) -> Result<Vec<R>, UcoinError> {
        let all: Vec<R> = self.scan(&self.registry::<R>().records, "")?;
        Ok(all
            .into_iter()
            .filter(|r| r.am_number() == number && r.is_eligible())
            .collect())
    }

    /// Confirmed registrations of every issuer.
    pub fn current_registrations<R: Registration>(&self) -> Result<Vec<R>, UcoinError> {
        let all: Vec<R> = self.scan(&self.registry::<R>().records, "")?;
        Ok(all.into_iter().filter(|r| r.is_current()).collect())
    }

    // ── Votes ────────────────────────────────────────────────────────────────

    fn vote_key(basis: AmNumber, amendment_hash: &str, issuer: &Fingerprint) -> String {
        format!("{basis:020}:{amendment_hash}:{issuer}")
    }

    pub fn get_vote(
        &self,
        basis: AmNumber,
        amendment_hash: &str,
        issuer: &Fingerprint,
    ) -> Result<Option<Vote>, UcoinError> {
        self.get(&self.votes, Self::vote_key(basis, amendment_hash, issuer).as_bytes())
    }

    pub fn put_vote(&self, vote: &Vote) -> Result<(), UcoinError> {
        let key = Self::vote_key(vote.basis, &vote.amendment_hash, &vote.issuer);
        self.put(&self.votes, key.as_bytes(), vote)
    }

    /// Votes on the amendment `(basis, amendment_hash)`.
    pub fn votes_for(&self, basis: AmNumber, amendment_hash: &str) -> Result<Vec<Vote>, UcoinError> {
        self.scan(&self.votes, &format!("{basis:020}:{amendment_hash}:"))
    }

    /// Votes on any amendment numbered `basis`.
    pub fn votes_numbered(&self, basis: AmNumber) -> Result<Vec<Vote>, UcoinError> {
        self.scan(&self.votes, &format!("{basis:020}:"))
    }

    /// Vote counts per amendment number and hash.
    pub fn votes_index(&self) -> Result<BTreeMap<AmNumber, BTreeMap<String, u64>>, UcoinError> {
        let mut index: BTreeMap<AmNumber, BTreeMap<String, u64>> = BTreeMap::new();
        for vote in self.scan::<Vote>(&self.votes, "")? {
            *index
                .entry(vote.basis)
                .or_default()
                .entry(vote.amendment_hash)
                .or_default() += 1;
        }
        Ok(index)
    }

    // ── Key ledger ───────────────────────────────────────────────────────────

    pub fn get_key(&self, fpr: &Fingerprint) -> Result<Option<KeyEntry>, UcoinError> {
        self.get(&self.keys, fpr.as_str().as_bytes())
    }

    /// Ledger entry of `fpr`, blank if never seen.
    pub fn key_or_default(&self, fpr: &Fingerprint) -> Result<KeyEntry, UcoinError> {
        Ok(self.get_key(fpr)?.unwrap_or_else(|| KeyEntry::new(fpr.clone())))
    }

    pub fn put_key(&self, entry: &KeyEntry) -> Result<(), UcoinError> {
        self.put(&self.keys, entry.fingerprint.as_str().as_bytes(), entry)
    }

    /// Every ledger entry, ordered by fingerprint.
    pub fn keys(&self) -> Result<Vec<KeyEntry>, UcoinError> {
        self.scan(&self.keys, "")
    }

    // ── Merkle sets ──────────────────────────────────────────────────────────

    /// A named merkle set; empty if never written.
    pub fn merkle(&self, name: &str) -> Result<MerkleSet, UcoinError> {
        Ok(self.get(&self.merkles, name.as_bytes())?.unwrap_or_default())
    }

    pub fn put_merkle(&self, name: &str, set: &MerkleSet) -> Result<(), UcoinError> {
        self.put(&self.merkles, name.as_bytes(), set)
    }

    // ── Voter snapshots ──────────────────────────────────────────────────────

    pub fn put_voters_snapshot(&self, number: AmNumber, voters: &[Fingerprint]) -> Result<(), UcoinError> {
        self.put(&self.voter_snapshots, format!("{number:020}").as_bytes(), &voters.to_vec())
    }

    /// Voters of the promoted amendment `number`.
    pub fn voters_snapshot(&self, number: AmNumber) -> Result<Option<Vec<Fingerprint>>, UcoinError> {
        self.get(&self.voter_snapshots, format!("{number:020}").as_bytes())
    }

    // ── Meta ─────────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), UcoinError> {
        self.write(&self.meta, key.as_bytes(), value.to_vec())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, UcoinError> {
        self.read(&self.meta, key.as_bytes())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), UcoinError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucoin_core::membership::{Direction, Voting};

    fn key(s: &str) -> Fingerprint {
        Fingerprint::parse(s).unwrap()
    }

    const ALICE: &str = "2E69197FAB029D8669EF85E82457A1587CA0ED9C";
    const BOB: &str = "C73882B64B7E72237A2F460CE9CAB76D19A8651E";

    fn membership(issuer: &str, direction: Direction, am: AmNumber, sig: &str) -> Membership {
        let mut ms = Membership::new("beta_brousouf", key(issuer), direction, 1_403_301_700, sig);
        ms.am_number = am;
        ms
    }

    #[test]
    fn pending_and_promoted_pointers() {
        let db = StateDb::temporary().unwrap();
        assert!(db.current().unwrap().is_none());
        let mut am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        db.put_pending(&am).unwrap();
        assert_eq!(db.pending().unwrap(), Some(am.clone()));
        am.promoted = true;
        db.put_promoted(&am).unwrap();
        assert_eq!(db.current().unwrap().map(|a| a.hash), Some(am.hash.clone()));
        assert_eq!(db.promoted(0).unwrap().map(|a| a.number), Some(0));
        assert!(db.promoted(1).unwrap().is_none());
        assert_eq!(db.amendments_numbered(0).unwrap().len(), 1);
    }

    #[test]
    fn registrations_keep_creation_order() {
        let db = StateDb::temporary().unwrap();
        let first = membership(ALICE, Direction::In, 1, "-----BEGIN a\n");
        let second = membership(ALICE, Direction::Out, 1, "-----BEGIN b\n");
        let other = membership(BOB, Direction::In, 1, "-----BEGIN c\n");
        db.save_registration(&first).unwrap();
        db.save_registration(&other).unwrap();
        db.save_registration(&second).unwrap();

        let found: Vec<Membership> = db.registrations_for(&key(ALICE), 1).unwrap();
        assert_eq!(found, vec![first.clone(), second]);

        let mut updated = first.clone();
        updated.eligible = false;
        db.save_registration(&updated).unwrap();
        let again: Option<Membership> = db.registration_by_hash(&first.hash).unwrap();
        assert!(!again.unwrap().eligible);
        assert_eq!(db.eligible_registrations::<Membership>(1).unwrap().len(), 2);
        assert!(db.registrations_of::<Voting>(&key(ALICE)).unwrap().is_empty());
    }

    #[test]
    fn votes_are_indexed() {
        let db = StateDb::temporary().unwrap();
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        let vote = Vote::new(&am, key(ALICE), 1_403_301_700, "-----BEGIN x\n");
        db.put_vote(&vote).unwrap();
        db.put_vote(&Vote::new(&am, key(BOB), 1_403_301_700, "-----BEGIN y\n")).unwrap();
        assert!(db.get_vote(0, &am.hash, &key(ALICE)).unwrap().is_some());
        assert_eq!(db.votes_for(0, &am.hash).unwrap().len(), 2);
        assert_eq!(db.votes_index().unwrap()[&0][&am.hash], 2);
    }

    #[test]
    fn staged_writes_are_read_back_then_committed() {
        let db = StateDb::temporary().unwrap();
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        let vote = Vote::new(&am, key(ALICE), 1_403_301_700, "-----BEGIN x\n");
        db.put_vote(&Vote::new(&am, key(BOB), 1_403_301_700, "-----BEGIN y\n")).unwrap();

        let seen = db
            .atomically(|| {
                db.put_pending(&am)?;
                db.put_vote(&vote)?;
                db.put_merkle(PROPOSED_MEMBERS, &MerkleSet::from_leaves([ALICE]))?;
                db.atomically(|| db.put_voters_snapshot(0, &[key(ALICE)]))?;
                Ok((db.pending()?, db.votes_for(0, &am.hash)?.len(), db.voters_snapshot(0)?))
            })
            .unwrap();
        assert_eq!(seen, (Some(am.clone()), 2, Some(vec![key(ALICE)])));

        assert_eq!(db.pending().unwrap(), Some(am.clone()));
        assert!(db.get_vote(0, &am.hash, &key(ALICE)).unwrap().is_some());
        assert!(db.merkle(PROPOSED_MEMBERS).unwrap().contains(ALICE));
        assert_eq!(db.voters_snapshot(0).unwrap(), Some(vec![key(ALICE)]));
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let db = StateDb::temporary().unwrap();
        let am = Amendment::new("beta_brousouf", 0, 1_403_301_600);
        let ms = membership(ALICE, Direction::In, 0, "-----BEGIN a\n");

        let err = db
            .atomically(|| {
                db.put_promoted(&am)?;
                db.save_registration(&ms)?;
                db.put_key(&KeyEntry::new(key(BOB)))?;
                assert!(db.current()?.is_some());
                assert_eq!(db.registrations_for::<Membership>(&key(ALICE), 0)?, vec![ms.clone()]);
                Err::<(), _>(UcoinError::MonetaryOverflow(1))
            })
            .unwrap_err();
        assert!(matches!(err, UcoinError::MonetaryOverflow(1)));

        assert!(db.current().unwrap().is_none());
        assert!(db.promoted(0).unwrap().is_none());
        assert!(db.amendments_numbered(0).unwrap().is_empty());
        assert!(db.registration_by_hash::<Membership>(&ms.hash).unwrap().is_none());
        assert!(db.registrations_of::<Membership>(&key(ALICE)).unwrap().is_empty());
        assert!(db.keys().unwrap().is_empty());
    }

    #[test]
    fn merkle_and_keys() {
        let db = StateDb::temporary().unwrap();
        assert_eq!(db.merkle(PROPOSED_MEMBERS).unwrap().leaves_count(), 0);
        let set = MerkleSet::from_leaves([ALICE]);
        db.put_merkle(PROPOSED_MEMBERS, &set).unwrap();
        assert_eq!(db.merkle(PROPOSED_MEMBERS).unwrap(), set);

        let mut entry = db.key_or_default(&key(BOB)).unwrap();
        entry.is_member = true;
        db.put_key(&entry).unwrap();
        assert_eq!(db.keys().unwrap(), vec![entry]);

        db.put_voters_snapshot(3, &[key(ALICE)]).unwrap();
        assert_eq!(db.voters_snapshot(3).unwrap(), Some(vec![key(ALICE)]));
    }
}
