//! Shared data models for keyword bid automation.
//!
//! This crate provides Serde-serializable types for:
//! - Keyword bids as returned by the ad platform
//! - Bid calculation rules (validated and stored forms)
//! - Keyword bid selection criteria
//! - Run outcome records

pub mod error;
pub mod keyword_bid;
pub mod outcome;
pub mod rule;
pub mod selection;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use keyword_bid::{AuctionBidItem, KeywordBid, KeywordBidUpdate};
pub use outcome::{RunOutcome, TaskId};
pub use rule::{BidLimits, BidRule, BidRuleRecord, TargetType};
pub use selection::{SelectionCriteria, SelectionKey};
