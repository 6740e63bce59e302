//! # Application Layer
//!
//! [`SigilLedgerService`] wires the domain to its collaborators: it takes
//! the send lock, asks the signer for signatures, persists ledgers, and
//! emits bus events.

pub mod request;
pub mod send_lock;
pub mod service;

pub use request::{InhaleReceipt, SendRequest};
pub use send_lock::{LockGuard, SendLock};
pub use service::{SigilLedgerDependencies, SigilLedgerService};
