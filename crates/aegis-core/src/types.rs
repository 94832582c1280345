use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{REP_MAX_PERMILLE, REP_MIN_PERMILLE};
use crate::error::AegisError;

/// Amount in atomic units of the value asset (6 decimals; 1 token = 1_000_000
/// units). u128 leaves ample headroom above any realistic supply.
pub type Amount = u128;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Block height on the value ledger.
pub type BlockNumber = u64;

/// Reputation factor in permille (1000 = neutral ρ of 1.0). Integer permille is
/// used instead of a float so that `stake · ρ` is reproducible on-ledger.
pub type RepPermille = u32;

/// Clamp a raw oracle factor into the protocol band `[ρ_min, ρ_max]`.
pub fn clamp_permille(raw: RepPermille) -> RepPermille {
    raw.clamp(REP_MIN_PERMILLE, REP_MAX_PERMILLE)
}

/// Credit limit derived from locked stake and a clamped reputation factor:
/// `⌊stake · ρ⌋`, computed as `stake · permille / 1000` in u128.
pub fn credit_limit_for(stake: Amount, permille: RepPermille) -> Amount {
    stake * permille as Amount / 1_000
}

// ── Address ──────────────────────────────────────────────────────────────────

/// 20-byte ledger address, stored as a lowercase `0x`-prefixed hex string.
///
/// The constructor lowercases, so two case-variants of the same address always
/// compare (and hash) equal — the registry keys on this type directly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(s: &str) -> Result<Self, AegisError> {
        let lower = s.to_ascii_lowercase();
        let hex_part = lower
            .strip_prefix("0x")
            .ok_or_else(|| AegisError::InvalidAddress(s.to_string()))?;
        if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
            return Err(AegisError::InvalidAddress(s.to_string()));
        }
        Ok(Self(lower))
    }

    /// Build an address from raw bytes (e.g. a truncated key hash).
    pub fn from_bytes(b: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(b)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = AegisError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> String {
        a.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", &self.0[..10])
    }
}

// ── TxHash ───────────────────────────────────────────────────────────────────

/// 32-byte transaction hash on the value ledger, lowercase `0x`-prefixed hex.
/// Primary key of the payments table.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn new(s: &str) -> Result<Self, AegisError> {
        let lower = s.to_ascii_lowercase();
        let hex_part = lower
            .strip_prefix("0x")
            .ok_or_else(|| AegisError::InvalidTxHash(s.to_string()))?;
        if hex_part.len() != 64 || hex::decode(hex_part).is_err() {
            return Err(AegisError::InvalidTxHash(s.to_string()));
        }
        Ok(Self(lower))
    }

    pub fn from_bytes(b: &[u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(b)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = AegisError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<TxHash> for String {
    fn from(h: TxHash) -> String {
        h.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.0[..18])
    }
}

// ── AgentId ──────────────────────────────────────────────────────────────────

/// Opaque identifier in the external reputation namespace. `"0"` means the
/// merchant has no registered identity and reputation falls back to address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn unknown() -> Self {
        Self("0".to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── GatedPurpose ─────────────────────────────────────────────────────────────

/// What a payment-gated request is paying *for*. Travels in the `extra.purpose`
/// field of x402 payment requirements so clients can tell a stake deposit from
/// an anti-griefing bond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedPurpose {
    Stake,
    SlashBond,
}

impl GatedPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatedPurpose::Stake => "stake",
            GatedPurpose::SlashBond => "slash_bond",
        }
    }
}

// ── Amount-as-string serde helper ────────────────────────────────────────────

/// Serialize an [`Amount`] as a decimal string. JSON numbers lose precision
/// past 2^53 in common clients, so atomic-unit amounts always travel as
/// strings on the wire.
pub mod amount_str {
    use super::Amount;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(de)?;
        s.parse()
            .map_err(|_| de::Error::custom(format!("invalid amount: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_lowercases_case_variants() {
        let a = Address::new("0xAbCdEf0123456789abcdef0123456789ABCDEF01").unwrap();
        let b = Address::new("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(Address::new("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(Address::new("0x1234").is_err());
        assert!(Address::new("0xzzzdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn tx_hash_roundtrips_through_serde() {
        let h = TxHash::new(
            "0xAA11bb22cc33dd44ee55ff66aa77bb88cc99dd00ee11ff22aa33bb44cc55dd66",
        )
        .unwrap();
        let json = serde_json::to_string(&h).unwrap();
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
        assert!(json.contains("0xaa11bb22"));
    }

    #[test]
    fn permille_clamps_to_protocol_band() {
        assert_eq!(clamp_permille(100), REP_MIN_PERMILLE);
        assert_eq!(clamp_permille(1_000), 1_000);
        assert_eq!(clamp_permille(9_000), REP_MAX_PERMILLE);
    }

    #[test]
    fn credit_limit_floors() {
        // 100,000 units at ρ = 1.0
        assert_eq!(credit_limit_for(100_000, 1_000), 100_000);
        // ⌊999 · 0.5⌋ = 499
        assert_eq!(credit_limit_for(999, 500), 499);
        // 3.0 cap
        assert_eq!(credit_limit_for(100_000, 3_000), 300_000);
    }
}
