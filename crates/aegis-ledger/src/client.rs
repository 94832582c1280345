use std::time::Duration;

use aegis_core::error::AegisError;

/// Simple JSON-RPC 2.0 client shared by the asset and credit-manager adapters.
///
/// Uses raw HTTP POST with serde_json; transient transport failures surface as
/// [`AegisError::Ledger`] and are never retried here — callers retry at the
/// protocol level (the chain watcher re-polls the same range, HTTP callers
/// re-submit).
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    /// Build a client for `url` with a hard per-request timeout so that
    /// start-up recovery can never block readiness indefinitely.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AegisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AegisError::Ledger(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call a JSON-RPC method and return the `result` field.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AegisError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AegisError::Ledger(format!("connecting to {}: {e}", self.url)))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AegisError::Ledger(format!("parsing {method} response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(AegisError::Ledger(format!("{method}: {err}")));
        }

        Ok(json["result"].clone())
    }
}
