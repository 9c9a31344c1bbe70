//! Headless game runner for CI verification.
//!
//! This crate runs Dune scenarios without graphics or audio, with JSON
//! summaries on stdout. This enables:
//!
//! - **CI verification**: Automated testing of game logic and determinism
//! - **Save inspection**: Check what a save file contains
//!
//! # Example
//!
//! ```bash
//! # Run a scenario
//! cargo run -p dune_headless -- run --scenario scenarios/arrakeen.ron --ticks 6000
//!
//! # Verify determinism
//! cargo run -p dune_headless -- verify --scenario scenarios/arrakeen.ron --runs 3
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod summary;

pub use runner::{verify_determinism, GameRunner, HeadlessError, VerifyReport};
pub use summary::{EventCounts, GameSummary, HouseSummary, OutcomeSummary};
