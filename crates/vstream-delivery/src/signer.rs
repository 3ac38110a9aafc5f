//! Delivery URL signing.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::error::{DeliveryError, DeliveryResult};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Query parameter that carries `<unix_ts>.<mac>`.
pub const SIGNATURE_PARAM: &str = "signature";

/// Keyed MAC over the unsigned URL and its issue timestamp.
pub(crate) fn mac_for(secret: &str, unsigned_url: &str, issued_at: i64) -> DeliveryResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DeliveryError::invalid_key(e.to_string()))?;
    mac.update(unsigned_url.as_bytes());
    mac.update(b"|");
    mac.update(issued_at.to_string().as_bytes());
    Ok(mac)
}

/// Signs URLs for time-limited access.
#[derive(Clone)]
pub struct UrlSigner {
    secret: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").field("secret", &"<redacted>").finish()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Sign a URL as issued now.
    pub fn sign(&self, url: &str) -> DeliveryResult<String> {
        self.sign_at(url, Utc::now())
    }

    /// Sign a URL as issued at `issued_at`.
    ///
    /// The URL must be absolute, carry no fragment and no existing signature.
    pub fn sign_at(&self, url: &str, issued_at: DateTime<Utc>) -> DeliveryResult<String> {
        let parsed = Url::parse(url).map_err(|e| DeliveryError::malformed(e.to_string()))?;
        if parsed.fragment().is_some() {
            return Err(DeliveryError::malformed("fragments cannot be signed"));
        }
        if parsed.query_pairs().any(|(k, _)| k == SIGNATURE_PARAM) {
            return Err(DeliveryError::malformed("URL is already signed"));
        }

        let ts = issued_at.timestamp();
        let tag = mac_for(&self.secret, url, ts)?.finalize().into_bytes();
        let separator = if url.contains('?') { '&' } else { '?' };

        Ok(format!(
            "{}{}{}={}.{}",
            url,
            separator,
            SIGNATURE_PARAM,
            ts,
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }
}
