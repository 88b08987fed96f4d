//! Bid calculation rules.
//!
//! [`BidRule`] is the validated, read-only parameter set a pipeline run
//! works with. [`BidRuleRecord`] is the form rules are stored and edited in,
//! where percentages are whole numbers and the max bid is in major currency
//! units.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::selection::{SelectionCriteria, SelectionKey};

/// Minor currency units per major unit.
pub const CURRENCY_MICROS: i64 = 1_000_000;

/// Which platform entities a rule targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Campaign,
    AdGroup,
    Keyword,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Campaign => "campaign",
            TargetType::AdGroup => "ad_group",
            TargetType::Keyword => "keyword",
        }
    }

    /// Selection key used to read keyword bids for this target type.
    pub fn selection_key(&self) -> SelectionKey {
        match self {
            TargetType::Campaign => SelectionKey::CampaignIds,
            TargetType::AdGroup => SelectionKey::AdGroupIds,
            TargetType::Keyword => SelectionKey::KeywordIds,
        }
    }
}

/// Numeric parameters of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BidLimits {
    /// Threshold (0..=1) for the relative gap between first and second auction bid
    pub target_bid_diff: f64,
    /// Fraction the chosen baseline bid is raised by
    pub bid_increase_percentage: f64,
    /// Ceiling on the computed bid, in minor currency units
    pub max_bid: i64,
}

/// Validated bid rule.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, Validate)]
pub struct BidRule {
    id: i64,
    account: i64,
    target_type: TargetType,
    #[validate(length(min = 1, message = "at least one target id is required"))]
    target_ids: Vec<i64>,
    #[validate(range(min = 0.0, max = 1.0, message = "must be within 0..=1"))]
    target_bid_diff: f64,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    bid_increase_percentage: f64,
    #[validate(range(min = 0, message = "must not be negative"))]
    max_bid: i64,
}

impl BidRule {
    /// Build and validate a rule.
    pub fn new(
        id: i64,
        account: i64,
        target_type: TargetType,
        target_ids: Vec<i64>,
        limits: BidLimits,
    ) -> ModelResult<Self> {
        let rule = Self {
            id,
            account,
            target_type,
            target_ids,
            target_bid_diff: limits.target_bid_diff,
            bid_increase_percentage: limits.bid_increase_percentage,
            max_bid: limits.max_bid,
        };
        rule.check()?;
        Ok(rule)
    }

    fn check(&self) -> ModelResult<()> {
        self.validate()
            .map_err(|e| ModelError::invalid_rule(e.to_string()))?;

        if !self.target_bid_diff.is_finite() || !self.bid_increase_percentage.is_finite() {
            return Err(ModelError::invalid_rule(
                "target_bid_diff and bid_increase_percentage must be finite",
            ));
        }

        Ok(())
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn account(&self) -> i64 {
        self.account
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    pub fn target_ids(&self) -> &[i64] {
        &self.target_ids
    }

    pub fn target_bid_diff(&self) -> f64 {
        self.target_bid_diff
    }

    pub fn bid_increase_percentage(&self) -> f64 {
        self.bid_increase_percentage
    }

    pub fn max_bid(&self) -> i64 {
        self.max_bid
    }

    pub fn limits(&self) -> BidLimits {
        BidLimits {
            target_bid_diff: self.target_bid_diff,
            bid_increase_percentage: self.bid_increase_percentage,
            max_bid: self.max_bid,
        }
    }

    /// Selection criteria covering every target of this rule.
    pub fn selection_criteria(&self) -> SelectionCriteria {
        SelectionCriteria::new(self.target_type.selection_key(), self.target_ids.clone())
    }
}

/// Rule as stored by the rule administration collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BidRuleRecord {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub account: i64,
    pub target_type: TargetType,
    pub target_values: Vec<i64>,
    /// Percent, e.g. `10` for 10%
    pub target_bid_diff: u32,
    /// Percent, e.g. `10` for 10%
    pub bid_increase_percentage: u32,
    /// Major currency units
    pub max_bid: u32,
}

impl BidRuleRecord {
    /// Convert stored units into calculation units and validate.
    pub fn into_rule(self) -> ModelResult<BidRule> {
        BidRule::new(
            self.id,
            self.account,
            self.target_type,
            self.target_values,
            BidLimits {
                target_bid_diff: f64::from(self.target_bid_diff) / 100.0,
                bid_increase_percentage: f64::from(self.bid_increase_percentage) / 100.0,
                max_bid: i64::from(self.max_bid) * CURRENCY_MICROS,
            },
        )
    }
}
