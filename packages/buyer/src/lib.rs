//! BSC Buyer
//!
//! Configuration loading and subcommand implementations for the `bsc-buyer`
//! binary. Kept as a library so the commands can be driven against
//! `bsc_swap_rs::testing::MockChain` in tests.

pub mod commands;
pub mod config;

pub use commands::{App, Output, Replacement, Unit};
pub use config::Config;
