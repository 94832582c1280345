use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use aegis_core::error::AegisError;

use crate::types::{Facilitator, PaymentRequirements, SettleOutcome, VerifyOutcome, X402_VERSION};

/// HTTP client for a remote x402 facilitator service.
///
/// `POST {base}/verify` and `POST {base}/settle`, both carrying
/// `{x402Version, paymentPayload, paymentRequirements}`. An API key, when
/// configured, travels as a bearer token.
pub struct HttpFacilitator {
    base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpFacilitator {
    pub fn new(
        base: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AegisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AegisError::Facilitator(e.to_string()))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<serde_json::Value, AegisError> {
        let url = format!("{}{path}", self.base);
        let body = json!({
            "x402Version": X402_VERSION,
            "paymentPayload": payload,
            "paymentRequirements": requirements,
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AegisError::Facilitator(format!("connecting to {url}: {e}")))?;
        let status = resp.status();
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AegisError::Facilitator(format!("parsing {path} response: {e}")))?;
        debug!(%url, %status, "facilitator call");
        if !status.is_success() {
            return Err(AegisError::Facilitator(format!("{path} returned {status}: {json}")));
        }
        Ok(json)
    }
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, AegisError> {
        let json = self.post("/verify", payload, requirements).await?;
        serde_json::from_value(json)
            .map_err(|e| AegisError::Facilitator(format!("parsing verify outcome: {e}")))
    }

    async fn settle(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, AegisError> {
        let json = self.post("/settle", payload, requirements).await?;
        serde_json::from_value(json)
            .map_err(|e| AegisError::Facilitator(format!("parsing settle outcome: {e}")))
    }
}
