//! Chain admission: configuration, error taxonomy, the chain itself, and
//! the free-standing block validator.
//!
//! The validator is a free function rather than a trait object holding a
//! back-reference into the chain, so there is no cyclic ownership between
//! `Chain` and its own validation logic.

pub mod chain;
pub mod config;
pub mod error;

pub use chain::{Chain, ChainView};
pub use config::ConsensusConfig;
pub use error::{ChainError, ValidationError};
