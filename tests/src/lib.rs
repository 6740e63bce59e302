//! # Sigil Ledger Test Suite
//!
//! Unified test crate for behaviour that spans crates.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/            # Criterion benchmarks (Merkle roots, proofs, transfers)
//! └── src/integration/
//!     ├── fixtures.rs     # Shared service harness
//!     ├── flows.rs        # Transfer flows through the public API
//!     ├── e2e_choreography.rs  # Event order on the bus
//!     └── persistence.rs  # File-backed stores across process restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sigil-tests
//! cargo test -p sigil-tests integration::flows
//! cargo bench -p sigil-tests
//! ```

#![allow(dead_code)]

pub mod integration;
