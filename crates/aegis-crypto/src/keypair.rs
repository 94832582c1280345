use ed25519_dalek::{Signer, SigningKey};
use serde::Serialize;

use aegis_core::error::AegisError;
use aegis_core::types::Address;

use crate::hash::address_from_pubkey;

/// The clearinghouse agent key: an Ed25519 signing key with its derived ledger
/// address. Exactly one of these exists per running agent; every credit-contract
/// write is signed with it on the single-writer path.
pub struct AgentKey {
    signing: SigningKey,
    address: Address,
}

impl AgentKey {
    /// Load the agent key from a 32-byte hex seed (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self, AegisError> {
        let raw = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes =
            hex::decode(raw).map_err(|e| AegisError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AegisError::InvalidKey("expected 32-byte seed".to_string()))?;
        Ok(Self::from_seed(seed))
    }

    /// Generate a fresh key. Test and demo use only.
    pub fn generate() -> Self {
        Self::from_seed(rand::random())
    }

    fn from_seed(seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        let address = address_from_pubkey(signing.verifying_key().as_bytes());
        Self { signing, address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Hex-encoded Ed25519 public key, travels alongside write signatures.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().as_bytes())
    }

    /// Detached signature over `message`, hex-encoded.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }

    /// Sign the canonical JSON encoding of a request body. serde_json maps are
    /// key-sorted, so the encoding is deterministic for both signer and verifier.
    pub fn sign_body<T: Serialize>(&self, body: &T) -> Result<String, AegisError> {
        let canonical =
            serde_json::to_vec(body).map_err(|e| AegisError::Serialization(e.to_string()))?;
        Ok(self.sign(&canonical))
    }
}

impl std::fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AgentKey {{ address: {:?} }}", self.address)
    }
}
