//! Anonymous sealed-box encryption of secret values.
//!
//! Output layout is the libsodium `crypto_box_seal` format GitHub expects:
//! a 32-byte ephemeral public key followed by the XSalsa20-Poly1305 box. The
//! nonce is derived from both public keys and never transmitted.

use crate::provider::ApiError;
use base64::{engine::general_purpose, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::PublicKey;

const PUBLIC_KEY_LEN: usize = 32;

/// Decode a repository public key from its base64 form.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, ApiError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::PublicKey(format!("not valid base64: {e}")))?;
    let key: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|e| {
        ApiError::PublicKey(format!(
            "expected {PUBLIC_KEY_LEN} bytes, got {} ({e})",
            bytes.len()
        ))
    })?;
    Ok(PublicKey::from(key))
}

/// Seal `plaintext` for the holder of `public_key` and return it base64 encoded.
pub fn seal_secret(plaintext: &[u8], public_key: &str) -> Result<String, ApiError> {
    let key = decode_public_key(public_key)?;
    let sealed = key
        .seal(&mut OsRng, plaintext)
        .map_err(|e| ApiError::Encryption(e.to_string()))?;
    Ok(general_purpose::STANDARD.encode(sealed))
}
