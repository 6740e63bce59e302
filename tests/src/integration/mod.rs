//! Cross-crate integration tests.

#[cfg(test)]
mod fixtures;

pub mod e2e_choreography;
pub mod flows;
pub mod persistence;
