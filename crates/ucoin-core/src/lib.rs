pub mod amendment;
pub mod constants;
pub mod document;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod membership;
pub mod params;
pub mod types;
pub mod vote;

pub use amendment::*;
pub use constants::*;
pub use error::{ErrorKind, UcoinError};
pub use hash::*;
pub use ledger::*;
pub use membership::*;
pub use params::*;
pub use types::*;
pub use vote::*;
