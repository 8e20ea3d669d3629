//! Timestamp proof model: ops, attestations, proof trees, merkle batching,
//! and Bitcoin anchoring.
//!
//! A [`timestamp::Timestamp`] is a tree rooted at some message (usually a
//! file's digest). Each node may carry zero or more [`notary::Attestation`]s
//! vouching for its message directly, and zero or more [`op::Op`] edges to
//! child nodes vouching for it indirectly, by transformation. Everything in
//! this crate is pure and synchronous; network access (calendars, a Bitcoin
//! node) lives in the `ots-calendar` and `ots-bitcoind` crates.

pub mod bitcoin;
pub mod calendar;
pub mod error;
pub mod log;
pub mod merkle;
pub mod notary;
pub mod op;
pub mod packet;
pub mod prune;
pub mod ser;
pub mod timestamp;
pub mod upgrade;
pub mod verify;

pub use error::{Error, Result};
pub use notary::Attestation;
pub use op::Op;
pub use timestamp::{DetachedTimestampFile, Timestamp};
