use hkdf::Hkdf;
use nostr::PublicKey;
use sha2::Sha256;

use crate::{Error, Result};

/// Salted extract-then-expand KDF: `n` independent 32-byte outputs derived
/// deterministically from `input` and `salt`. Equal `(input, salt)` yields
/// byte-identical outputs; changing either changes all outputs.
pub fn kdf(input: &[u8], salt: &[u8], n: usize) -> Vec<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), input);

    let mut outputs = Vec::with_capacity(n);
    for i in 1..=n {
        let mut okm = [0u8; 32];
        hk.expand(&[i as u8], &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        outputs.push(okm);
    }
    outputs
}

pub fn pubkey_from_hex(hex_str: &str) -> Result<PublicKey> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != 32 {
        return Err(Error::InvalidKeyMaterial(format!(
            "expected 32-byte pubkey, got {} bytes",
            bytes.len()
        )));
    }
    PublicKey::from_slice(&bytes).map_err(|e| Error::InvalidKeyMaterial(e.to_string()))
}

pub fn pubkey_to_hex(pubkey: &PublicKey) -> String {
    hex::encode(pubkey.to_bytes())
}

pub fn bytes32_from_hex(hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != 32 {
        return Err(Error::InvalidKeyMaterial(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Canonical, sorted, comma-joined author list used as the subscription
/// dedup key by `GroupManager::sync_outer_subscription`.
pub fn canonical_authors_key(authors: &[PublicKey]) -> String {
    let mut hexes: Vec<String> = authors.iter().map(pubkey_to_hex).collect();
    hexes.sort_unstable();
    hexes.join(",")
}
