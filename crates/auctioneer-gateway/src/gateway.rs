//! Ad platform gateway.
//!
//! Composes chunking, the pooled transport, response normalization and
//! soft-error retry into platform operations. Read operations return lazy
//! record streams; nothing is sent until a stream is first polled.

use std::num::NonZeroUsize;

use async_stream::try_stream;
use auctioneer_models::{KeywordBidUpdate, SelectionCriteria, SelectionKey};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};

use crate::chunker::{self, chunks};
use crate::config::{GatewayConfig, SoftRetryConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::record_page;
use crate::normalize::{cursor, extract, flatten};
use crate::retry::with_soft_retry;
use crate::transport::{Credentials, RequestSpec, Transport};
use crate::types::{
    endpoints, result_keys, AdFieldNames, ApiCall, CampaignFieldNames, KeywordBidFieldNames,
    SitelinkFieldNames,
};

/// Lazy stream of normalized records.
pub type RecordStream = BoxStream<'static, GatewayResult<Value>>;

/// Operation labels used in spans and metrics.
pub mod operations {
    pub const KEYWORD_BIDS_GET: &str = "keywordbids.get";
    pub const KEYWORD_BIDS_SET: &str = "keywordbids.set";
    pub const CLIENTS_GET: &str = "clients.get";
    pub const CAMPAIGNS_GET: &str = "campaigns.get";
    pub const ADS_GET: &str = "ads.get";
    pub const SITELINKS_GET: &str = "sitelinks.get";
}

/// Items per `keywordbids.set` request.
pub const WRITE_CHUNK_LIMIT: NonZeroUsize = chunker::limit(10_000);

/// Ids per `keywordbids.get` request for a selection key.
pub fn selection_chunk_limit(key: SelectionKey) -> NonZeroUsize {
    const KEYWORD_IDS: NonZeroUsize = chunker::limit(10_000);
    const AD_GROUP_IDS: NonZeroUsize = chunker::limit(1_000);
    const CAMPAIGN_IDS: NonZeroUsize = chunker::limit(10);

    match key {
        SelectionKey::KeywordIds => KEYWORD_IDS,
        SelectionKey::AdGroupIds => AD_GROUP_IDS,
        SelectionKey::CampaignIds => CAMPAIGN_IDS,
    }
}

/// Set `params.Page.Offset` on a request body.
fn with_page_offset(mut request: RequestSpec, offset: Value) -> GatewayResult<RequestSpec> {
    let params = request
        .json_mut()
        .and_then(|body| body.get_mut("params"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| GatewayError::payload_error("paginated request has no params object"))?;
    params.insert("Page".to_string(), json!({ "Offset": offset }));
    Ok(request)
}

fn parse_client_login(result: &Value) -> GatewayResult<String> {
    let Some(map) = result.as_object() else {
        return Err(GatewayError::unexpected_result(format!(
            "expected client list, got {}",
            result
        )));
    };

    let clients = map
        .get(result_keys::CLIENTS)
        .and_then(Value::as_array)
        .filter(|clients| !clients.is_empty())
        .ok_or_else(|| {
            let reason = map
                .get("error_string")
                .map(ToString::to_string)
                .unwrap_or_else(|| result.to_string());
            GatewayError::unexpected_result(reason)
        })?;

    clients[0]
        .get("Login")
        .and_then(Value::as_str)
        .filter(|login| !login.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            GatewayError::unexpected_result(format!(
                "no login in client list {}",
                Value::Array(clients.clone())
            ))
        })
}

fn failed(err: GatewayError) -> RecordStream {
    stream::once(async move { Err(err) }).boxed()
}

/// Keyword bid write in progress.
pub struct WriteSubmission {
    /// Exact request bodies, one per chunk
    pub payloads: Vec<Value>,
    /// One acknowledgement per submitted item, in completion order
    pub acks: RecordStream,
}

impl std::fmt::Debug for WriteSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSubmission")
            .field("payloads", &self.payloads.len())
            .finish_non_exhaustive()
    }
}

/// Gateway for the ad platform's JSON API.
#[derive(Clone)]
pub struct DirectGateway {
    transport: Transport,
    api_url: String,
    soft_retry: SoftRetryConfig,
}

impl DirectGateway {
    /// Create a gateway authorized with an API token.
    pub fn new(config: &GatewayConfig, token: impl Into<String>) -> GatewayResult<Self> {
        config.validate()?;
        let transport =
            Transport::new(config.transport.clone())?.with_credentials(Credentials::bearer(token)?);

        Ok(Self {
            transport,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            soft_retry: config.soft_retry.clone(),
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.api_url, name)
    }

    // =========================================================================
    // Keyword bids
    // =========================================================================

    /// Stream keyword bid records for a selection.
    ///
    /// Ids are chunked by the selection key's limit and read concurrently;
    /// each chunk's pagination chain is followed page by page. Records
    /// arrive in completion order.
    pub fn fetch_keyword_bids(
        &self,
        criteria: SelectionCriteria,
        fields: KeywordBidFieldNames,
    ) -> RecordStream {
        let gateway = self.clone();
        with_soft_retry(
            self.soft_retry.clone(),
            operations::KEYWORD_BIDS_GET,
            move || gateway.keyword_bids_pass(criteria.clone(), fields.clone()),
        )
        .boxed()
    }

    fn keyword_bids_pass(
        &self,
        criteria: SelectionCriteria,
        fields: KeywordBidFieldNames,
    ) -> impl Stream<Item = GatewayResult<Value>> + Send + 'static {
        let gateway = self.clone();
        let operation = operations::KEYWORD_BIDS_GET;

        try_stream! {
            let url = gateway.endpoint(endpoints::KEYWORD_BIDS);
            let key = criteria.key();
            let mut params = serde_json::to_value(&fields)?;
            let pool = gateway.transport.pool();

            let mut submitted = 0usize;
            for chunk in chunks(criteria.ids(), selection_chunk_limit(key)) {
                params["SelectionCriteria"] = criteria.to_wire(chunk);
                let call = ApiCall::get(params.clone()).to_value()?;
                pool.send(RequestSpec::post_json(url.clone(), call).with_operation(operation))?;
                submitted += 1;
            }
            debug!(operation, selection = %key, chunks = submitted, "Submitted keyword bid reads");

            while let Some((response, request)) = pool.next().await {
                let result = extract(response?.into_value());
                let next_page = cursor(&result);

                for record in flatten(result, result_keys::KEYWORD_BIDS) {
                    yield record;
                }

                if let Some(offset) = next_page {
                    debug!(operation, offset = %offset, "Requesting next page");
                    record_page(operation);
                    pool.send(with_page_offset(request, offset)?)?;
                }
            }
        }
    }

    /// Submit new keyword bids.
    ///
    /// Payloads are built up front and returned alongside the acknowledgement
    /// stream; requests go out when the stream is first polled. A soft error
    /// resubmits every chunk.
    pub fn write_keyword_bids(&self, updates: &[KeywordBidUpdate]) -> GatewayResult<WriteSubmission> {
        let payloads = chunks(updates, WRITE_CHUNK_LIMIT)
            .map(|chunk| {
                let bids = serde_json::to_value(chunk)?;
                ApiCall::set(json!({ "KeywordBids": bids })).to_value()
            })
            .collect::<GatewayResult<Vec<_>>>()?;

        debug!(
            operation = operations::KEYWORD_BIDS_SET,
            items = updates.len(),
            chunks = payloads.len(),
            "Prepared keyword bid write"
        );

        let gateway = self.clone();
        let sent = payloads.clone();
        let acks = with_soft_retry(
            self.soft_retry.clone(),
            operations::KEYWORD_BIDS_SET,
            move || gateway.keyword_bids_write_pass(sent.clone()),
        )
        .boxed();

        Ok(WriteSubmission { payloads, acks })
    }

    fn keyword_bids_write_pass(
        &self,
        payloads: Vec<Value>,
    ) -> impl Stream<Item = GatewayResult<Value>> + Send + 'static {
        let gateway = self.clone();
        let operation = operations::KEYWORD_BIDS_SET;

        try_stream! {
            let url = gateway.endpoint(endpoints::KEYWORD_BIDS);
            let pool = gateway.transport.pool();
            for payload in payloads {
                pool.send(RequestSpec::post_json(url.clone(), payload).with_operation(operation))?;
            }

            while let Some((response, _)) = pool.next().await {
                let result = extract(response?.into_value());
                for ack in flatten(result, result_keys::SET_RESULTS) {
                    yield ack;
                }
            }
        }
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Login of the account the token belongs to.
    pub async fn get_client_login(&self) -> GatewayResult<String> {
        let call = ApiCall::get(json!({ "FieldNames": ["Login"] })).to_value()?;
        let request = RequestSpec::post_json(self.endpoint(endpoints::CLIENTS), call)
            .with_operation(operations::CLIENTS_GET);

        let span = info_span!("direct_client_login");
        let response = self.transport.send(&request).instrument(span).await?;
        parse_client_login(&extract(response.into_value()))
    }

    // =========================================================================
    // Campaigns, ads, sitelinks
    // =========================================================================

    /// Stream campaigns matching `selection` (e.g. `{"Ids": [...]}`).
    pub fn get_campaigns(&self, selection: Value, fields: &CampaignFieldNames) -> RecordStream {
        self.walk(
            operations::CAMPAIGNS_GET,
            endpoints::CAMPAIGNS,
            result_keys::CAMPAIGNS,
            selection,
            fields,
        )
    }

    /// Stream ads matching `selection`.
    pub fn get_ads(&self, selection: Value, fields: &AdFieldNames) -> RecordStream {
        self.walk(
            operations::ADS_GET,
            endpoints::ADS,
            result_keys::ADS,
            selection,
            fields,
        )
    }

    /// Stream sitelink sets matching `selection`.
    pub fn get_sitelinks(&self, selection: Value, fields: &SitelinkFieldNames) -> RecordStream {
        self.walk(
            operations::SITELINKS_GET,
            endpoints::SITELINKS,
            result_keys::SITELINKS_SETS,
            selection,
            fields,
        )
    }

    /// Single-request read that follows pagination cursors sequentially.
    fn walk<P: Serialize>(
        &self,
        operation: &'static str,
        endpoint: &'static str,
        key: &'static str,
        selection: Value,
        fields: &P,
    ) -> RecordStream {
        let call = serde_json::to_value(fields)
            .map_err(GatewayError::from)
            .and_then(|mut params| {
                params["SelectionCriteria"] = selection;
                ApiCall::get(params).to_value()
            });
        let call = match call {
            Ok(call) => call,
            Err(err) => return failed(err),
        };

        let gateway = self.clone();
        let url = self.endpoint(endpoint);
        with_soft_retry(self.soft_retry.clone(), operation, move || {
            gateway.walk_pass(operation, url.clone(), key, call.clone())
        })
        .boxed()
    }

    fn walk_pass(
        &self,
        operation: &'static str,
        url: String,
        key: &'static str,
        call: Value,
    ) -> impl Stream<Item = GatewayResult<Value>> + Send + 'static {
        let gateway = self.clone();

        try_stream! {
            let mut request = RequestSpec::post_json(url, call).with_operation(operation);
            loop {
                let response = gateway.transport.send(&request).await?;
                let result = extract(response.into_value());
                let next_page = cursor(&result);

                for record in flatten(result, key) {
                    yield record;
                }

                match next_page {
                    Some(offset) => {
                        record_page(operation);
                        request = with_page_offset(request, offset)?;
                    }
                    None => break,
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
