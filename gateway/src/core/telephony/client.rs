use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::core::providers::{ProviderError, ProviderResult, api_error};

pub const DEFAULT_TELEPHONY_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Request to place an outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCall {
    pub to: String,
    pub from: String,
    /// Webhook fetched when the callee answers
    pub answer_url: String,
    pub status_callback: String,
}

/// Provider acknowledgement of a placed call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacedCall {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Outbound call control.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    async fn place_call(&self, call: &OutboundCall) -> ProviderResult<PlacedCall>;
}

/// REST client for the provider's call API.
pub struct RestTelephonyClient {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl std::fmt::Debug for RestTelephonyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTelephonyClient")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .finish_non_exhaustive()
    }
}

impl RestTelephonyClient {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> ProviderResult<Self> {
        let account_sid = account_sid.into();
        let auth_token = auth_token.into();
        if account_sid.is_empty() || auth_token.is_empty() {
            return Err(ProviderError::Configuration(
                "Telephony account sid and auth token are required".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        })
    }

    fn calls_url(&self) -> String {
        format!("{}/Accounts/{}/Calls.json", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl TelephonyProvider for RestTelephonyClient {
    async fn place_call(&self, call: &OutboundCall) -> ProviderResult<PlacedCall> {
        if call.to.is_empty() || call.from.is_empty() {
            return Err(ProviderError::InvalidInput(
                "Outbound call requires both to and from numbers".to_string(),
            ));
        }

        let form = [
            ("To", call.to.as_str()),
            ("From", call.from.as_str()),
            ("Url", call.answer_url.as_str()),
            ("Method", "POST"),
            ("StatusCallback", call.status_callback.as_str()),
            ("StatusCallbackMethod", "POST"),
            ("StatusCallbackEvent", "initiated ringing answered completed"),
        ];

        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let placed: PlacedCall = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        info!(call_sid = %placed.sid, "Outbound call placed");
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn outbound() -> OutboundCall {
        OutboundCall {
            to: "+15550002222".to_string(),
            from: "+15550001111".to_string(),
            answer_url: "https://host/telephony/call-start".to_string(),
            status_callback: "https://host/telephony/status".to_string(),
        }
    }

    #[test]
    fn test_new_requires_credentials() {
        assert!(RestTelephonyClient::new(DEFAULT_TELEPHONY_API_BASE, "", "token").is_err());
        assert!(RestTelephonyClient::new(DEFAULT_TELEPHONY_API_BASE, "AC1", "").is_err());
    }

    #[tokio::test]
    async fn test_place_call_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC1/Calls.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15550002222"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"sid": "CA42", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = RestTelephonyClient::new(server.uri(), "AC1", "token").unwrap();
        let placed = client.place_call(&outbound()).await.unwrap();
        assert_eq!(placed.sid, "CA42");
        assert_eq!(placed.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn test_place_call_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad number"))
            .mount(&server)
            .await;

        let client = RestTelephonyClient::new(server.uri(), "AC1", "token").unwrap();
        let err = client.place_call(&outbound()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
    }
}
