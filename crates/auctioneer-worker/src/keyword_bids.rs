//! Keyword bid controllers.
//!
//! Glue between the gateway's raw record streams and [`KeywordBid`]
//! entities: read, recalculate, write.

use auctioneer_gateway::{DirectGateway, KeywordBidFieldNames, RecordStream, WriteSubmission};
use auctioneer_models::{BidRule, KeywordBid, KeywordBidUpdate, SelectionCriteria};
use futures::{stream, Stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::calculator::BidCalculator;
use crate::error::{WorkerError, WorkerResult};

/// Map raw keyword bid records into entities.
pub fn map_keyword_bids(
    records: RecordStream,
) -> impl Stream<Item = WorkerResult<KeywordBid>> + Send + 'static {
    records.map(|record| -> WorkerResult<KeywordBid> { Ok(KeywordBid::from_record(record?)?) })
}

/// Stream keyword bids for a selection with the default field set.
pub fn get_keyword_bids(
    gateway: &DirectGateway,
    criteria: SelectionCriteria,
) -> impl Stream<Item = WorkerResult<KeywordBid>> + Send + 'static {
    map_keyword_bids(gateway.fetch_keyword_bids(criteria, KeywordBidFieldNames::default()))
}

/// Write payload for a bid, if it has a search bid to write.
pub fn writable_update(bid: &KeywordBid) -> Option<KeywordBidUpdate> {
    let update = bid.to_update();
    update.search_bid.is_some().then_some(update)
}

/// Submit the search bids of `bids`.
///
/// Bids without a search bid have nothing to write and are left out; when
/// none remain the submission is empty and nothing is sent.
pub fn set_keyword_bids<'a, I>(gateway: &DirectGateway, bids: I) -> WorkerResult<WriteSubmission>
where
    I: IntoIterator<Item = &'a KeywordBid>,
{
    let updates: Vec<KeywordBidUpdate> = bids.into_iter().filter_map(writable_update).collect();
    submit_updates(gateway, &updates)
}

fn submit_updates(gateway: &DirectGateway, updates: &[KeywordBidUpdate]) -> WorkerResult<WriteSubmission> {
    if updates.is_empty() {
        return Ok(WriteSubmission {
            payloads: Vec::new(),
            acks: stream::empty().boxed(),
        });
    }
    Ok(gateway.write_keyword_bids(updates)?)
}

/// Result of one read-recalculate-write pass.
#[derive(Debug, Default)]
pub struct CalculatedBids {
    /// Keyword bids read and recalculated.
    pub read: usize,
    /// Updates handed to the write.
    pub updates: Vec<KeywordBidUpdate>,
    /// Per-item write acknowledgements.
    pub acks: Vec<Value>,
}

/// Read, recalculate and write the keyword bids a rule targets.
///
/// Recalculated bids are reduced to their write payload as they stream in.
/// No write is issued when nothing was read.
pub async fn calculate_keyword_bids(
    gateway: &DirectGateway,
    calculator: &BidCalculator,
    rule: &BidRule,
) -> WorkerResult<CalculatedBids> {
    let criteria = rule.selection_criteria();
    let (read, updates) = calculator
        .apply(rule.clone(), get_keyword_bids(gateway, criteria))
        .try_fold((0usize, Vec::new()), |(read, mut updates), bid| async move {
            updates.extend(writable_update(&bid));
            Ok::<_, WorkerError>((read + 1, updates))
        })
        .await?;

    if read == 0 {
        info!(rule_id = rule.id(), "No keyword bids returned, skipping write");
        return Ok(CalculatedBids::default());
    }

    let submission = submit_updates(gateway, &updates)?;
    debug!(
        rule_id = rule.id(),
        read,
        updates = updates.len(),
        requests = submission.payloads.len(),
        "Submitting recalculated bids"
    );

    let acks: Vec<Value> = submission
        .acks
        .map_err(WorkerError::from)
        .try_collect()
        .await?;

    Ok(CalculatedBids { read, updates, acks })
}
