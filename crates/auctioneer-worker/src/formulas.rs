//! Bid formulas.
//!
//! A formula takes a rule and a keyword bid and returns the bid with its
//! recalculated fields. Formulas only touch the `Search`/`Network` data.

use auctioneer_models::{BidRule, KeywordBid};
use tracing::{debug, warn};

/// One step of a bid calculation.
pub trait BidFormula: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Recalculate `bid` under `rule`.
    fn apply(&self, rule: &BidRule, bid: KeywordBid) -> KeywordBid;
}

/// Search bid recalculation from the auction forecast.
///
/// Compares the first two auction positions. When the gap between them is
/// below the rule's threshold the first position is targeted, otherwise the
/// second. The chosen bid is raised by the rule's increase and capped at
/// the rule's maximum. Bids with fewer than two positions, a second
/// position bid of zero, or malformed auction data are returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBidFormula;

impl BidFormula for SearchBidFormula {
    fn name(&self) -> &'static str {
        "search_bid"
    }

    fn apply(&self, rule: &BidRule, mut bid: KeywordBid) -> KeywordBid {
        let items = match bid.try_auction_bid_items() {
            Ok(items) => items,
            Err(e) => {
                warn!(keyword_id = bid.keyword_id(), "Malformed auction data, bid unchanged: {}", e);
                return bid;
            }
        };
        let (first, second) = match items.as_slice() {
            [first, second, ..] => (first.bid as f64, second.bid as f64),
            _ => {
                debug!(
                    keyword_id = bid.keyword_id(),
                    positions = items.len(),
                    "Not enough auction positions, bid unchanged"
                );
                return bid;
            }
        };

        if second <= 0.0 {
            debug!(keyword_id = bid.keyword_id(), "Second auction position has no bid, bid unchanged");
            return bid;
        }

        let diff = (first - second) / second;
        let baseline = if diff < rule.target_bid_diff() {
            first
        } else {
            second
        };
        let target = (baseline * (1.0 + rule.bid_increase_percentage())).min(rule.max_bid() as f64);

        bid.set_search_bid(target as i64);
        bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auctioneer_models::{BidLimits, TargetType};
    use serde_json::json;

    fn rule(target_bid_diff: f64, bid_increase_percentage: f64, max_bid: i64) -> BidRule {
        BidRule::new(
            1,
            1,
            TargetType::Keyword,
            vec![33],
            BidLimits {
                target_bid_diff,
                bid_increase_percentage,
                max_bid,
            },
        )
        .unwrap()
    }

    fn bid_with_auction(items: serde_json::Value) -> KeywordBid {
        KeywordBid::from_record(json!({
            "CampaignId": 1,
            "AdGroupId": 2,
            "KeywordId": 33,
            "Search": {"Bid": 500, "AuctionBids": {"AuctionBidItems": items}}
        }))
        .unwrap()
    }

    #[test]
    fn test_wide_gap_targets_second_position() {
        let bid = bid_with_auction(json!([{"Bid": 1000}, {"Bid": 900}]));
        let bid = SearchBidFormula.apply(&rule(0.10, 0.10, 10_000_000), bid);
        assert_eq!(bid.search_bid(), Some(990));
    }

    #[test]
    fn test_narrow_gap_targets_first_position() {
        let bid = bid_with_auction(json!([{"Bid": 1000}, {"Bid": 950}]));
        let bid = SearchBidFormula.apply(&rule(0.10, 0.10, 10_000_000), bid);
        assert_eq!(bid.search_bid(), Some(1100));
    }

    #[test]
    fn test_max_bid_caps_result() {
        let bid = bid_with_auction(json!([{"Bid": 1000}, {"Bid": 900}]));
        let bid = SearchBidFormula.apply(&rule(0.10, 0.50, 1000), bid);
        assert_eq!(bid.search_bid(), Some(1000));
    }

    #[test]
    fn test_result_is_truncated() {
        let bid = bid_with_auction(json!([{"Bid": 1000}, {"Bid": 901}]));
        // 901 * 1.15 = 1036.15
        let bid = SearchBidFormula.apply(&rule(0.05, 0.15, 10_000_000), bid);
        assert_eq!(bid.search_bid(), Some(1036));
    }

    #[test]
    fn test_positions_used_in_received_order() {
        let bid = bid_with_auction(json!([{"Bid": 900}, {"Bid": 1000}]));
        // diff is negative, so the first position is kept
        let bid = SearchBidFormula.apply(&rule(0.10, 0.0, 10_000_000), bid);
        assert_eq!(bid.search_bid(), Some(900));
    }

    #[test]
    fn test_missing_or_short_auction_data_unchanged() {
        let no_auction = KeywordBid::from_record(json!({
            "CampaignId": 1, "AdGroupId": 2, "KeywordId": 3, "Search": {"Bid": 500}
        }))
        .unwrap();
        let r = rule(0.10, 0.10, 10_000_000);

        assert_eq!(SearchBidFormula.apply(&r, no_auction.clone()), no_auction);

        let single = bid_with_auction(json!([{"Bid": 1000}]));
        assert_eq!(SearchBidFormula.apply(&r, single.clone()), single);

        let zero_second = bid_with_auction(json!([{"Bid": 1000}, {"Bid": 0}]));
        assert_eq!(SearchBidFormula.apply(&r, zero_second.clone()), zero_second);
    }

    #[test]
    fn test_reapplying_keeps_auction_data() {
        let r = rule(0.10, 0.10, 10_000_000);
        let once = SearchBidFormula.apply(&r, bid_with_auction(json!([{"Bid": 1000}, {"Bid": 900}])));
        let twice = SearchBidFormula.apply(&r, once.clone());

        assert_eq!(once, twice);
        assert_eq!(twice.auction_bid_items().len(), 2);
        assert_eq!(twice.search_bid(), Some(990));
    }

    #[test]
    fn test_malformed_auction_item_leaves_bid_unchanged() {
        let r = rule(0.10, 0.10, 10_000_000);
        let malformed = bid_with_auction(json!([{"Bid": 1000}, {"Bid": "high"}, {"Bid": 800}]));
        let result = SearchBidFormula.apply(&r, malformed.clone());

        assert_eq!(result, malformed);
        assert_eq!(result.search_bid(), Some(500));
    }
}
