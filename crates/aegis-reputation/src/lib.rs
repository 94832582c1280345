//! aegis-reputation
//!
//! Bounded reputation factors for credit-limit scaling. The reader returns an
//! integer permille clamped to `[ρ_min, ρ_max]`; a fixed stub at ρ = 1.0 is a
//! fully functioning configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use aegis_core::constants::REP_NEUTRAL_PERMILLE;
use aegis_core::error::AegisError;
use aegis_core::types::{clamp_permille, Address, AgentId, RepPermille};

/// Resolves an agent identity (preferred) or ledger address (fallback) to a
/// clamped reputation factor.
#[async_trait]
pub trait ReputationReader: Send + Sync {
    async fn factor_by_id(&self, agent_id: &AgentId) -> Result<RepPermille, AegisError>;

    async fn factor_by_address(&self, addr: &Address) -> Result<RepPermille, AegisError>;
}

// ── Fixed stub ───────────────────────────────────────────────────────────────

/// Constant-factor reader. `FixedReputation::neutral()` (ρ = 1.0) is the
/// default when no oracle is configured.
pub struct FixedReputation(RepPermille);

impl FixedReputation {
    pub fn new(permille: RepPermille) -> Self {
        Self(clamp_permille(permille))
    }

    pub fn neutral() -> Self {
        Self(REP_NEUTRAL_PERMILLE)
    }
}

#[async_trait]
impl ReputationReader for FixedReputation {
    async fn factor_by_id(&self, _agent_id: &AgentId) -> Result<RepPermille, AegisError> {
        Ok(self.0)
    }

    async fn factor_by_address(&self, _addr: &Address) -> Result<RepPermille, AegisError> {
        Ok(self.0)
    }
}

// ── HTTP oracle ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ScoreResponse {
    /// Raw factor in permille; clamped into the protocol band on our side.
    score: RepPermille,
}

/// Reputation oracle client: `GET {base}/score/{subject}` → `{ "score": permille }`.
pub struct HttpReputation {
    base: String,
    client: reqwest::Client,
}

impl HttpReputation {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, AegisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AegisError::Reputation(e.to_string()))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch(&self, subject: &str) -> Result<RepPermille, AegisError> {
        let url = format!("{}/score/{subject}", self.base);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AegisError::Reputation(format!("connecting to {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(AegisError::Reputation(format!(
                "{url} returned {}",
                resp.status()
            )));
        }
        let body: ScoreResponse = resp
            .json()
            .await
            .map_err(|e| AegisError::Reputation(format!("parsing score: {e}")))?;
        let clamped = clamp_permille(body.score);
        debug!(subject, raw = body.score, clamped, "reputation score");
        Ok(clamped)
    }
}

#[async_trait]
impl ReputationReader for HttpReputation {
    async fn factor_by_id(&self, agent_id: &AgentId) -> Result<RepPermille, AegisError> {
        self.fetch(agent_id.as_str()).await
    }

    async fn factor_by_address(&self, addr: &Address) -> Result<RepPermille, AegisError> {
        self.fetch(addr.as_str()).await
    }
}
