//! Authenticated HTTP transport.
//!
//! Provides:
//! - Request validation and credential injection (bearer header or OAuth
//!   form fields)
//! - HTTP-level retry for connection failures and selected status codes
//! - A bounded worker pool for fire-and-collect request batches, keyed by
//!   [`PoolId`]
//! - Lazily parsed response bodies (JSON, then text, then raw bytes)

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use futures::stream::{self, Stream};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics::{record_request, record_transport_retry};

const OAUTH_CLIENT_ID_FIELD: &str = "client_id";
const OAUTH_CLIENT_SECRET_FIELD: &str = "client_secret";

// =============================================================================
// Credentials
// =============================================================================

/// Credential material attached to outgoing requests.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>` header
    Bearer(String),
    /// Client id/secret injected into the form body
    OAuthClient {
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> GatewayResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(GatewayError::config_error("API token is required"));
        }
        Ok(Self::Bearer(token))
    }

    pub fn oauth_client(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> GatewayResult<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(GatewayError::config_error(
                "OAuth client id and client secret are required",
            ));
        }
        Ok(Self::OAuthClient {
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Bearer(***)"),
            Credentials::OAuthClient { client_id, .. } => f
                .debug_struct("OAuthClient")
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .finish(),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A request as submitted by callers; returned alongside pooled results.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Label used for spans and metrics
    pub operation: String,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            operation: "request".to_string(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_json(body)
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self::new(Method::POST, url).with_form(fields)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(body)) => Some(body),
            _ => None,
        }
    }

    pub fn json_mut(&mut self) -> Option<&mut Value> {
        match &mut self.body {
            Some(RequestBody::Json(body)) => Some(body),
            _ => None,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseData {
    fn parse(status: StatusCode, body: &[u8]) -> Self {
        // An empty body falls back to the status reason phrase.
        let content = if body.is_empty() {
            status.canonical_reason().unwrap_or_default().as_bytes()
        } else {
            body
        };

        if let Ok(json) = serde_json::from_slice(content) {
            return Self::Json(json);
        }
        match std::str::from_utf8(content) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Bytes(content.to_vec()),
        }
    }

    /// JSON view of the data; text and bytes become JSON strings.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

/// HTTP response with a lazily parsed body.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
    data: OnceLock<ResponseData>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            data: OnceLock::new(),
        }
    }

    async fn read(response: reqwest::Response) -> GatewayResult<Self> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        debug!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&body),
            "Received API response"
        );
        Ok(Self::new(status, body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn data(&self) -> &ResponseData {
        self.data
            .get_or_init(|| ResponseData::parse(self.status, &self.body))
    }

    pub fn into_value(self) -> Value {
        match self.data.into_inner() {
            Some(data) => data.into_value(),
            None => ResponseData::parse(self.status, &self.body).into_value(),
        }
    }
}

// =============================================================================
// Worker pool bookkeeping
// =============================================================================

/// Identifier grouping a batch of pooled requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(Uuid);

impl PoolId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed pooled request paired with the request that produced it.
pub type PoolItem = (GatewayResult<ApiResponse>, RequestSpec);

type Outcome = GatewayResult<ApiResponse>;

struct Pending {
    result: oneshot::Receiver<Outcome>,
    abort: AbortHandle,
    request: RequestSpec,
}

#[derive(Default)]
struct PoolState {
    pending: VecDeque<Pending>,
    notify: Arc<Notify>,
}

impl PoolState {
    /// Pop the first completed entry, requeueing the ones still running.
    fn take_ready(&mut self) -> Option<PoolItem> {
        for _ in 0..self.pending.len() {
            let mut entry = self.pending.pop_front()?;
            match entry.result.try_recv() {
                Ok(outcome) => return Some((outcome, entry.request)),
                Err(oneshot::error::TryRecvError::Empty) => self.pending.push_back(entry),
                Err(oneshot::error::TryRecvError::Closed) => {
                    let err = GatewayError::PoolFailed(format!(
                        "{} {} ended without a result",
                        entry.request.method, entry.request.url
                    ));
                    return Some((Err(err), entry.request));
                }
            }
        }
        None
    }
}

/// Delivers a worker's result and wakes the pool reader, even on panic.
struct Completion {
    tx: Option<oneshot::Sender<Outcome>>,
    notify: Arc<Notify>,
}

impl Completion {
    fn finish(mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        // Close the channel before waking the reader.
        drop(self.tx.take());
        self.notify.notify_one();
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Authenticated HTTP transport with a bounded worker pool.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    config: Arc<TransportConfig>,
    credentials: Option<Credentials>,
    workers: Arc<Semaphore>,
    pools: Arc<Mutex<HashMap<PoolId, PoolState>>>,
}

impl Transport {
    /// Create an unauthenticated transport.
    pub fn new(config: TransportConfig) -> GatewayResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.pool_size)
            .user_agent(concat!("auctioneer-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GatewayError::Network)?;

        Ok(Self {
            http,
            workers: Arc::new(Semaphore::new(config.pool_size)),
            config: Arc::new(config),
            credentials: None,
            pools: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Attach credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn is_authorized(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Check a request against the transport's credentials and config.
    ///
    /// Everything [`Transport::send`] would reject before touching the
    /// network is rejected here.
    pub fn validate_request(&self, request: &RequestSpec) -> GatewayResult<()> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            GatewayError::config_error("transport is not authorized, credentials are required")
        })?;

        if !self.config.allowed_methods.contains(&request.method) {
            return Err(GatewayError::payload_error(format!(
                "HTTP method {} is not allowed",
                request.method
            )));
        }
        parse_url(&request.url)?;
        if request.method == Method::GET && request.body.is_some() {
            return Err(GatewayError::payload_error("use query parameters with GET"));
        }
        if request.method == Method::POST && !request.query.is_empty() {
            return Err(GatewayError::payload_error(
                "use a JSON or form body with POST",
            ));
        }
        if matches!(credentials, Credentials::OAuthClient { .. })
            && !matches!(request.body, Some(RequestBody::Form(_)))
        {
            return Err(GatewayError::payload_error(
                "OAuth requests require form data",
            ));
        }

        Ok(())
    }

    /// Validate a request and build it with credentials attached.
    fn prepare(&self, request: &RequestSpec) -> GatewayResult<RequestBuilder> {
        self.validate_request(request)?;
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            GatewayError::config_error("transport is not authorized, credentials are required")
        })?;
        let url = parse_url(&request.url)?;

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let builder = match credentials {
            Credentials::Bearer(token) => {
                let builder = builder.bearer_auth(token);
                match &request.body {
                    Some(RequestBody::Json(body)) => builder.json(body),
                    Some(RequestBody::Form(fields)) => builder.form(fields),
                    None => builder,
                }
            }
            Credentials::OAuthClient {
                client_id,
                client_secret,
            } => {
                let fields: &[(String, String)] = match &request.body {
                    Some(RequestBody::Form(fields)) => fields,
                    _ => &[],
                };
                let mut fields: Vec<(String, String)> = fields
                    .iter()
                    .filter(|(key, _)| {
                        key != OAUTH_CLIENT_ID_FIELD && key != OAUTH_CLIENT_SECRET_FIELD
                    })
                    .cloned()
                    .collect();
                fields.push((OAUTH_CLIENT_ID_FIELD.to_string(), client_id.clone()));
                fields.push((OAUTH_CLIENT_SECRET_FIELD.to_string(), client_secret.clone()));
                builder.form(&fields)
            }
        };

        Ok(builder)
    }

    /// Send one request with HTTP-level retry.
    ///
    /// Any status is returned as a response once retries for it are used up;
    /// only network failures surface as errors.
    pub async fn send(&self, request: &RequestSpec) -> GatewayResult<ApiResponse> {
        let builder = self.prepare(request)?;
        let retry = &self.config.retry;
        let operation = request.operation.as_str();
        let start = Instant::now();

        let mut retries = 0u32;
        let mut status_retries = 0u32;
        let mut connect_retries = 0u32;

        loop {
            let attempt = builder.try_clone().ok_or_else(|| {
                GatewayError::payload_error("request body cannot be cloned for retries")
            })?;

            let span = info_span!(
                "direct_request",
                operation = %operation,
                method = %request.method,
                url = %request.url,
                attempt = retries + 1
            );
            debug!(operation = %operation, body = ?request.body, "Sending API request");

            match attempt.send().instrument(span).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if retry.retries_status(status)
                        && status_retries < retry.status
                        && retries < retry.total
                    {
                        status_retries += 1;
                        retries += 1;
                        let delay = retry.delay(retries);
                        warn!(
                            operation = %operation,
                            status,
                            retry = retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retryable status from ad platform, retrying"
                        );
                        record_transport_retry(operation);
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    record_request(operation, status, start.elapsed().as_millis() as f64);
                    return ApiResponse::read(response).await;
                }
                Err(err) => {
                    let err = GatewayError::from(err);
                    if err.is_retryable()
                        && connect_retries < retry.connect
                        && retries < retry.total
                    {
                        connect_retries += 1;
                        retries += 1;
                        let delay = retry.delay(retries);
                        warn!(
                            operation = %operation,
                            retry = retries,
                            delay_ms = delay.as_millis() as u64,
                            "Ad platform request failed, retrying: {}",
                            err
                        );
                        record_transport_retry(operation);
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let status = match &err {
                        GatewayError::Network(e) => e.status().map(|s| s.as_u16()).unwrap_or(0),
                        _ => 0,
                    };
                    record_request(operation, status, start.elapsed().as_millis() as f64);
                    return Err(err);
                }
            }
        }
    }

    // =========================================================================
    // Worker pool
    // =========================================================================

    fn lock_pools(&self) -> MutexGuard<'_, HashMap<PoolId, PoolState>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a pool handle that discards its outstanding requests on drop.
    pub fn pool(&self) -> Pool {
        Pool {
            transport: self.clone(),
            id: PoolId::new(),
        }
    }

    /// Submit a request to the worker pool without waiting for it.
    ///
    /// The request is validated up front so payload and configuration errors
    /// surface here. Must be called from within a Tokio runtime.
    pub fn pool_send(&self, pool: PoolId, request: RequestSpec) -> GatewayResult<()> {
        self.validate_request(&request)?;

        let (tx, rx) = oneshot::channel();
        let mut pools = self.lock_pools();
        let state = pools.entry(pool).or_default();

        let completion = Completion {
            tx: Some(tx),
            notify: Arc::clone(&state.notify),
        };
        let transport = self.clone();
        let workers = Arc::clone(&self.workers);
        let task_request = request.clone();

        let handle = tokio::spawn(async move {
            let outcome = match workers.acquire_owned().await {
                Ok(_permit) => transport.send(&task_request).await,
                Err(_) => Err(GatewayError::PoolFailed("worker pool is closed".to_string())),
            };
            completion.finish(outcome);
        });

        state.pending.push_back(Pending {
            result: rx,
            abort: handle.abort_handle(),
            request,
        });
        debug!(pool = %pool, in_flight = state.pending.len(), "Queued pooled request");

        Ok(())
    }

    /// Wait for the next completed request of a pool.
    ///
    /// Returns `None` once every submitted request has been handed out, and
    /// forgets the pool at that point.
    pub async fn pool_next(&self, pool: PoolId) -> Option<PoolItem> {
        loop {
            let notify = {
                let mut pools = self.lock_pools();
                let state = pools.get_mut(&pool)?;
                if state.pending.is_empty() {
                    pools.remove(&pool);
                    return None;
                }
                if let Some(item) = state.take_ready() {
                    return Some(item);
                }
                Arc::clone(&state.notify)
            };
            notify.notified().await;
        }
    }

    /// Completed requests of a pool, in completion order.
    pub fn pool_receive(&self, pool: PoolId) -> impl Stream<Item = PoolItem> + Send + 'static {
        stream::unfold(self.clone(), move |transport| async move {
            let item = transport.pool_next(pool).await?;
            Some((item, transport))
        })
    }

    /// Abort and forget every outstanding request of a pool.
    pub fn pool_discard(&self, pool: PoolId) -> usize {
        let Some(state) = self.lock_pools().remove(&pool) else {
            return 0;
        };
        for entry in &state.pending {
            entry.abort.abort();
        }
        state.pending.len()
    }

    /// Number of requests submitted to a pool and not yet handed out.
    pub fn pool_len(&self, pool: PoolId) -> usize {
        self.lock_pools()
            .get(&pool)
            .map(|state| state.pending.len())
            .unwrap_or(0)
    }
}

fn parse_url(raw: &str) -> GatewayResult<url::Url> {
    url::Url::parse(raw)
        .map_err(|e| GatewayError::payload_error(format!("invalid url '{}': {}", raw, e)))
}

/// Pool handle bound to one [`PoolId`].
pub struct Pool {
    transport: Transport,
    id: PoolId,
}

impl Pool {
    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn send(&self, request: RequestSpec) -> GatewayResult<()> {
        self.transport.pool_send(self.id, request)
    }

    pub async fn next(&self) -> Option<PoolItem> {
        self.transport.pool_next(self.id).await
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        let discarded = self.transport.pool_discard(self.id);
        if discarded > 0 {
            debug!(pool = %self.id, discarded, "Discarded outstanding pooled requests");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
