//! Ad platform API client.
//!
//! This crate provides:
//! - Authenticated transport with HTTP-level retry and a bounded worker pool
//! - Response normalization (envelope extraction and record flattening)
//! - Soft-error retry for in-band transient failures
//! - Chunked, paginated keyword bid reads and chunked writes
//! - Campaign, ad, sitelink and client reads
//! - OAuth authorization code exchange

pub mod chunker;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod normalize;
pub mod oauth;
pub mod retry;
pub mod transport;
pub mod types;

pub use config::{GatewayConfig, SoftRetryConfig, TransportConfig, TransportRetryConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{DirectGateway, RecordStream, WriteSubmission};
pub use oauth::OAuthGateway;
pub use transport::{ApiResponse, Credentials, Pool, PoolId, RequestSpec, ResponseData, Transport};
pub use types::{AdFieldNames, ApiCall, CampaignFieldNames, KeywordBidFieldNames, SitelinkFieldNames};
