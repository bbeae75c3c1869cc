//! API key request signing.
//!
//! Signature = hex(HMAC-SHA256(secret, VERB + path + expires + body)), sent
//! with the `api-expires`, `api-signature` and `api-key` headers. The expiry
//! timestamp doubles as the nonce.

use crate::error::{CoreError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_EXPIRES: &str = "api-expires";
pub const HEADER_SIGNATURE: &str = "api-signature";
pub const HEADER_KEY: &str = "api-key";

/// API key pair.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Header values for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub expires: i64,
    pub signature: String,
    pub api_key: String,
}

impl SignedHeaders {
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_EXPIRES, self.expires.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_KEY, self.api_key.clone()),
        ]
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Sign `verb path` with `body`, valid until `expires` (unix seconds).
    pub fn sign(&self, verb: &str, path: &str, expires: i64, body: &str) -> Result<SignedHeaders> {
        let signature = sign(&self.api_secret, verb, path, expires, body)?;
        Ok(SignedHeaders {
            expires,
            signature,
            api_key: self.api_key.clone(),
        })
    }
}

/// Raw HMAC signature over `verb + path + expires + body`.
pub fn sign(secret: &str, verb: &str, path: &str, expires: i64, body: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    mac.update(verb.as_bytes());
    mac.update(path.as_bytes());
    mac.update(expires.to_string().as_bytes());
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Expiry timestamp `ttl_secs` from now.
pub fn expires_at(ttl_secs: i64) -> i64 {
    chrono::Utc::now().timestamp() + ttl_secs
}
