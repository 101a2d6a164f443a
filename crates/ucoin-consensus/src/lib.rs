pub mod builder;
pub mod context;
pub mod dividend;
pub mod engine;
pub mod indicator;
pub mod promotion;
pub mod propagation;
pub mod registry;
pub mod service;
pub mod views;
pub mod votes;

pub use builder::{AmendmentBuilder, Transition};
pub use dividend::{universal_dividend, Issuance};
pub use engine::ConsensusEngine;
pub use indicator::{MemberStatus, PendingMembership, PendingVoting};
pub use promotion::Promotion;
pub use propagation::{Broadcaster, PeerEvent};
pub use registry::Submission;
pub use service::SyncService;
pub use views::{MerkleView, VoteBundle, Views};
pub use votes::VoteReceipt;
