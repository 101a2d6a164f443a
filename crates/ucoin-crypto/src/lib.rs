pub mod hash;
pub mod merkle;
pub mod signer;

pub use hash::{leaf_hash, node_hash};
pub use merkle::MerkleSet;
pub use signer::{DetachedSigner, DigestSigner, SignatureVerifier};
