use aegis_core::types::Address;

/// Compute BLAKE3 hash of arbitrary bytes → 32-byte array.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Derive a ledger address from raw public key bytes: the first 20 bytes of
/// BLAKE3(pubkey), hex-encoded with a `0x` prefix.
pub fn address_from_pubkey(pubkey_bytes: &[u8]) -> Address {
    let digest = blake3_hash(pubkey_bytes);
    let mut short = [0u8; 20];
    short.copy_from_slice(&digest[..20]);
    Address::from_bytes(&short)
}
