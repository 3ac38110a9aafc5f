//! Signed URL verification.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::Mac;
use tracing::debug;
use url::Url;

use crate::error::{DeliveryError, DeliveryResult};
use crate::signer::{mac_for, SIGNATURE_PARAM};

/// Tolerated clock skew for timestamps issued in the future.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Checks signed delivery URLs.
#[derive(Clone)]
pub struct AccessGate {
    secret: String,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate").field("secret", &"<redacted>").finish()
    }
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// True only if `url` carries a valid signature for this gate's secret that
    /// is at most `expiration_minutes` old. Every failure yields false.
    pub fn check(&self, url: &str, expiration_minutes: i64) -> bool {
        self.check_at(url, expiration_minutes, Utc::now())
    }

    /// [`check`](Self::check) against an explicit clock.
    pub fn check_at(&self, url: &str, expiration_minutes: i64, now: DateTime<Utc>) -> bool {
        match self.verify(url, expiration_minutes, now) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Rejecting delivery URL: {}", e);
                false
            }
        }
    }

    fn verify(&self, url: &str, expiration_minutes: i64, now: DateTime<Utc>) -> DeliveryResult<bool> {
        let (unsigned, issued_at, tag) = split_signed(url)?;

        let Some(age) = now.timestamp().checked_sub(issued_at) else {
            debug!(issued_at, "Signature timestamp out of range");
            return Ok(false);
        };
        if age < -MAX_CLOCK_SKEW_SECS {
            debug!(issued_at, "Signature issued in the future");
            return Ok(false);
        }
        if expiration_minutes < 0 || age > expiration_minutes.saturating_mul(60) {
            debug!(issued_at, expiration_minutes, "Signature expired");
            return Ok(false);
        }

        let mac = mac_for(&self.secret, unsigned, issued_at)?;
        Ok(mac.verify_slice(&tag).is_ok())
    }
}

/// Verify a signed URL with a one-off gate.
pub fn check_signature(url: &str, expiration_minutes: i64, secret: &str) -> bool {
    AccessGate::new(secret).check(url, expiration_minutes)
}

/// Split a signed URL into the unsigned URL, the issue timestamp and the MAC.
///
/// The signature must be the last query parameter.
fn split_signed(url: &str) -> DeliveryResult<(&str, i64, Vec<u8>)> {
    let parsed = Url::parse(url).map_err(|e| DeliveryError::malformed(e.to_string()))?;
    let value = parsed
        .query_pairs()
        .find(|(k, _)| k == SIGNATURE_PARAM)
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| DeliveryError::malformed("missing signature"))?;

    let marker = format!("{}=", SIGNATURE_PARAM);
    let pos = url
        .rfind(&marker)
        .ok_or_else(|| DeliveryError::malformed("missing signature"))?;
    let unsigned = match url[..pos].strip_suffix(['?', '&']) {
        Some(prefix) => prefix,
        None => return Err(DeliveryError::malformed("signature is not a query parameter")),
    };
    if url[pos + marker.len()..].contains(['&', '#']) {
        return Err(DeliveryError::malformed("signature must be the last parameter"));
    }

    let (ts, encoded) = value
        .split_once('.')
        .ok_or_else(|| DeliveryError::malformed("signature has no timestamp"))?;
    let issued_at: i64 = ts
        .parse()
        .map_err(|_| DeliveryError::malformed("invalid signature timestamp"))?;
    let tag = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| DeliveryError::malformed(e.to_string()))?;

    Ok((unsigned, issued_at, tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::UrlSigner;
    use chrono::Duration;

    const URL: &str = "https://cdn.example.com/videos/i.m3u8?user=7";

    fn signed_minutes_ago(secret: &str, minutes: i64) -> String {
        UrlSigner::new(secret)
            .sign_at(URL, Utc::now() - Duration::minutes(minutes))
            .unwrap()
    }

    #[test]
    fn test_fresh_signature_is_accepted() {
        let url = UrlSigner::new("secret").sign(URL).unwrap();
        assert!(check_signature(&url, 5, "secret"));
    }

    #[test]
    fn test_expiration_window() {
        let url = signed_minutes_ago("secret", 10);

        assert!(!check_signature(&url, 5, "secret"));
        assert!(check_signature(&url, 15, "secret"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let url = signed_minutes_ago("secret", 1);
        assert!(!check_signature(&url, 5, "other"));
    }

    #[test]
    fn test_tampered_url_is_rejected() {
        let url = signed_minutes_ago("secret", 1).replace("user=7", "user=8");
        assert!(!check_signature(&url, 5, "secret"));

        // Moving the timestamp invalidates the MAC
        let url = signed_minutes_ago("secret", 10);
        let (head, tail) = url.split_once("signature=").unwrap();
        let (_, mac) = tail.split_once('.').unwrap();
        let forged = format!("{}signature={}.{}", head, Utc::now().timestamp(), mac);
        assert!(!check_signature(&forged, 5, "secret"));
    }

    #[test]
    fn test_unsigned_and_garbage_urls_are_rejected() {
        let gate = AccessGate::new("secret");
        assert!(!gate.check(URL, 5));
        assert!(!gate.check("not a url", 5));
        assert!(!gate.check("https://x.test/a?signature=abc", 5));
        assert!(!gate.check("https://x.test/a?signature=123.%%%", 5));
    }

    #[test]
    fn test_signature_must_be_last() {
        let url = format!("{}&extra=1", signed_minutes_ago("secret", 1));
        assert!(!check_signature(&url, 5, "secret"));
    }

    #[test]
    fn test_future_timestamp_is_rejected() {
        let url = UrlSigner::new("secret")
            .sign_at(URL, Utc::now() + Duration::minutes(10))
            .unwrap();
        assert!(!check_signature(&url, 60, "secret"));

        // Small skew is tolerated
        let url = UrlSigner::new("secret")
            .sign_at(URL, Utc::now() + Duration::seconds(20))
            .unwrap();
        assert!(check_signature(&url, 5, "secret"));
    }

    #[test]
    fn test_out_of_range_timestamps_are_rejected() {
        let gate = AccessGate::new("secret");
        assert!(!gate.check("https://x.test/a?signature=-9223372036854775808.AAAA", 5));
        assert!(!gate.check("https://x.test/a?signature=-9300000000000000.AAAA", 5));
        assert!(!gate.check("https://x.test/a?signature=9223372036854775807.AAAA", 5));
        assert!(!gate.check("https://x.test/a?signature=-9223372036854775808.AAAA", i64::MAX));
    }

    #[test]
    fn test_extreme_expiration_values() {
        let url = signed_minutes_ago("secret", 1);

        assert!(check_signature(&url, i64::MAX, "secret"));
        assert!(!check_signature(&url, i64::MIN, "secret"));
        assert!(!check_signature(&url, -1, "secret"));
    }

    #[test]
    fn test_check_at_uses_given_clock() {
        let issued = Utc::now() - Duration::hours(3);
        let url = UrlSigner::new("secret").sign_at(URL, issued).unwrap();
        let gate = AccessGate::new("secret");

        assert!(gate.check_at(&url, 5, issued + Duration::minutes(4)));
        assert!(!gate.check_at(&url, 5, issued + Duration::minutes(6)));
    }
}
