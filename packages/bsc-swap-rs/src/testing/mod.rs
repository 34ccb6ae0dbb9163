//! Testing Utilities Module
//!
//! In-memory doubles for the node surface, available to unit tests and, with
//! the `testing` feature, to downstream crates.
//!
//! ## Submodules
//!
//! - `mock_chain` - Scriptable `ChainRpc` implementation that decodes and records broadcasts

pub mod mock_chain;

pub use mock_chain::{MockChain, SentTransaction};
