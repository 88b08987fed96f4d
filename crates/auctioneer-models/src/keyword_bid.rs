//! Keyword bid entities.
//!
//! A [`KeywordBid`] mirrors one item of the platform's keyword bids *get*
//! response. Identity fields are fixed at construction; the `Search` and
//! `Network` mappings stay open because the platform decides which fields
//! they carry for a given request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};

/// Field holding the current bid inside `Search`/`Network`.
pub const BID_FIELD: &str = "Bid";

/// Field holding the auction forecast inside `Search`.
pub const AUCTION_BIDS_FIELD: &str = "AuctionBids";

/// List field inside [`AUCTION_BIDS_FIELD`].
pub const AUCTION_BID_ITEMS_FIELD: &str = "AuctionBidItems";

/// One auction forecast position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct AuctionBidItem {
    /// Forecast traffic volume for this position
    #[serde(default)]
    pub traffic_volume: Option<i64>,
    /// Bid needed to reach this position (minor currency units)
    pub bid: i64,
    /// Expected price at this position
    #[serde(default)]
    pub price: Option<i64>,
}

/// Keyword bid as returned by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordBid {
    campaign_id: i64,
    ad_group_id: i64,
    keyword_id: i64,
    #[serde(default)]
    serving_status: Option<String>,
    #[serde(default)]
    strategy_priority: Option<String>,
    #[serde(default)]
    search: Map<String, Value>,
    #[serde(default)]
    network: Map<String, Value>,
}

impl KeywordBid {
    /// Create a keyword bid with empty `Search`/`Network` data.
    pub fn new(campaign_id: i64, ad_group_id: i64, keyword_id: i64) -> Self {
        Self {
            campaign_id,
            ad_group_id,
            keyword_id,
            serving_status: None,
            strategy_priority: None,
            search: Map::new(),
            network: Map::new(),
        }
    }

    /// Attach search bid data.
    pub fn with_search(mut self, search: Map<String, Value>) -> Self {
        self.search = search;
        self
    }

    /// Attach network bid data.
    pub fn with_network(mut self, network: Map<String, Value>) -> Self {
        self.network = network;
        self
    }

    /// Attach serving state.
    pub fn with_state(
        mut self,
        serving_status: impl Into<String>,
        strategy_priority: impl Into<String>,
    ) -> Self {
        self.serving_status = Some(serving_status.into());
        self.strategy_priority = Some(strategy_priority.into());
        self
    }

    /// Map one raw platform record into an entity.
    pub fn from_record(record: Value) -> ModelResult<Self> {
        if !record.is_object() {
            return Err(ModelError::invalid_record(format!(
                "expected keyword bid object, got {}",
                record
            )));
        }
        let snapshot = record.to_string();
        serde_json::from_value(record).map_err(|e| {
            ModelError::invalid_record(format!("unexpected keyword bid data {}: {}", snapshot, e))
        })
    }

    pub fn campaign_id(&self) -> i64 {
        self.campaign_id
    }

    pub fn ad_group_id(&self) -> i64 {
        self.ad_group_id
    }

    pub fn keyword_id(&self) -> i64 {
        self.keyword_id
    }

    pub fn serving_status(&self) -> Option<&str> {
        self.serving_status.as_deref()
    }

    pub fn strategy_priority(&self) -> Option<&str> {
        self.strategy_priority.as_deref()
    }

    pub fn search(&self) -> &Map<String, Value> {
        &self.search
    }

    pub fn network(&self) -> &Map<String, Value> {
        &self.network
    }

    /// Current search bid, if the platform returned one.
    pub fn search_bid(&self) -> Option<i64> {
        self.search.get(BID_FIELD).and_then(Value::as_i64)
    }

    /// Overwrite the search bid. Only formulas should call this.
    pub fn set_search_bid(&mut self, bid: i64) {
        self.search.insert(BID_FIELD.to_string(), Value::from(bid));
    }

    /// Auction forecast positions in the order the platform returned them.
    ///
    /// Returns an empty list when `AuctionBids` is missing or null, and
    /// [`ModelError::InvalidRecord`] when it does not match the expected shape.
    pub fn try_auction_bid_items(&self) -> ModelResult<Vec<AuctionBidItem>> {
        let auction_bids = match self.search.get(AUCTION_BIDS_FIELD) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(auction_bids) => auction_bids,
        };

        // Older API versions returned the list directly instead of wrapping it.
        let items = match auction_bids {
            Value::Object(map) => match map.get(AUCTION_BID_ITEMS_FIELD) {
                None | Some(Value::Null) => return Ok(Vec::new()),
                Some(items) => items,
            },
            Value::Array(_) => auction_bids,
            other => {
                return Err(ModelError::invalid_record(format!(
                    "keyword {}: unexpected auction bids {}",
                    self.keyword_id, other
                )))
            }
        };

        serde_json::from_value(items.clone()).map_err(|e| {
            ModelError::invalid_record(format!(
                "keyword {}: malformed auction bid items {}: {}",
                self.keyword_id, items, e
            ))
        })
    }

    /// Like [`Self::try_auction_bid_items`], with malformed data read as empty.
    pub fn auction_bid_items(&self) -> Vec<AuctionBidItem> {
        self.try_auction_bid_items().unwrap_or_default()
    }

    /// Minimal write payload for this keyword.
    pub fn to_update(&self) -> KeywordBidUpdate {
        KeywordBidUpdate {
            keyword_id: self.keyword_id,
            search_bid: self.search_bid(),
        }
    }
}

/// Keyword bid *set* payload item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct KeywordBidUpdate {
    pub keyword_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_bid: Option<i64>,
}
