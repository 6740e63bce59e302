//! # Ports Layer
//!
//! Hexagonal architecture ports (interfaces).

pub mod inbound;
pub mod outbound;

pub use crate::domain::{PublishError, SigningError, StoreError, ZkError};
pub use inbound::SigilLedgerApi;
pub use outbound::{
    LedgerStore, LockStore, PublicationAdapter, SigningCapability, TimeSource, ZkOracle, ZkProof,
    ZkStatement, ZkStatementKind,
};
