//! OAuth authorization code exchange.

use serde_json::Value;
use tracing::{info, info_span, Instrument};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::transport::{Credentials, RequestSpec, Transport};

const OPERATION: &str = "oauth.token";

/// Exchanges authorization codes for API tokens.
#[derive(Clone)]
pub struct OAuthGateway {
    transport: Transport,
    url: String,
    token_field: String,
}

impl OAuthGateway {
    pub fn new(
        config: &GatewayConfig,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> GatewayResult<Self> {
        config.validate()?;
        let credentials = Credentials::oauth_client(client_id, client_secret)?;
        let transport = Transport::new(config.transport.clone())?.with_credentials(credentials);

        Ok(Self {
            transport,
            url: config.oauth_url.clone(),
            token_field: config.token_field.clone(),
        })
    }

    /// Post form `params` to the token endpoint and return the issued token.
    ///
    /// Client credentials are added to the form by the transport.
    pub async fn exchange_code(&self, params: Vec<(String, String)>) -> GatewayResult<String> {
        let request = RequestSpec::post_form(self.url.clone(), params).with_operation(OPERATION);

        let span = info_span!("oauth_exchange");
        let body = self.transport.send(&request).instrument(span).await?.into_value();

        let token = body
            .get(&self.token_field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GatewayError::unexpected_result(format!(
                    "no '{}' in token response: {}",
                    self.token_field, body
                ))
            })?;

        info!("OAuth token issued");
        Ok(token)
    }

    /// Exchange an authorization code obtained from the consent page.
    pub async fn exchange_authorization_code(&self, code: &str) -> GatewayResult<String> {
        self.exchange_code(vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
        ])
        .await
    }
}
