pub mod db;

pub use db::{signatures_merkle, StateDb, PROPOSED_MEMBERS, PROPOSED_VOTERS};
