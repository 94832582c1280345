//! aegis-crypto
//!
//! The clearinghouse's agent key: an Ed25519 keypair with a BLAKE3-derived
//! ledger address. All credit-contract writes are authenticated by a detached
//! signature over the canonical JSON encoding of the request body.

pub mod hash;
pub mod keypair;

pub use hash::{address_from_pubkey, blake3_hash};
pub use keypair::AgentKey;
