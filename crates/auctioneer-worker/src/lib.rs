//! Keyword bid recalculation worker.
//!
//! This crate provides:
//! - Bid formulas and the calculator that folds them over keyword bids
//! - Keyword bid controllers (get, calculate, set)
//! - The rule runner producing a run outcome
//! - Worker configuration and logging setup

pub mod calculator;
pub mod config;
pub mod error;
pub mod formulas;
pub mod keyword_bids;
pub mod logging;
pub mod runner;

pub use calculator::BidCalculator;
pub use config::{LogFormat, TokenSource, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use formulas::{BidFormula, SearchBidFormula};
pub use logging::{init_tracing, RunLogger};
pub use keyword_bids::CalculatedBids;
pub use runner::{load_rule, obtain_token, run_rule, run_rule_with};
