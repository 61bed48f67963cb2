//! OAuth `state` nonce generation.
//!
//! A nonce is persisted under [`state_key`] with a [`STATE_TTL`] expiry and
//! consumed exactly once by the callback.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Store key prefix for pending nonces.
pub const STATE_PREFIX: &str = "oauth:state:";

/// How long a nonce stays valid.
pub const STATE_TTL: Duration = Duration::from_secs(60);

const STATE_BYTES: usize = 16;

/// Generate a URL-safe random nonce from 16 CSPRNG bytes.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Store key for a nonce.
pub fn state_key(state: &str) -> String {
    format!("{STATE_PREFIX}{state}")
}
