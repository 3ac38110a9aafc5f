//! Delivery configuration.

use crate::error::{DeliveryError, DeliveryResult};
use crate::gate::AccessGate;
use crate::signer::UrlSigner;

/// Default maximum age of a signed URL (30 minutes).
pub const DEFAULT_URL_EXPIRY_MINUTES: i64 = 30;

/// Maximum allowed expiry (7 days) to prevent long-lived URL leakage.
pub const MAX_URL_EXPIRY_MINUTES: i64 = 7 * 24 * 60;

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Secret key for HMAC signing.
    pub signing_secret: Option<String>,
    /// Maximum age of a signed URL, in minutes.
    pub url_expiry_minutes: i64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            url_expiry_minutes: DEFAULT_URL_EXPIRY_MINUTES,
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            signing_secret: std::env::var("VSTREAM_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            url_expiry_minutes: std::env::var("VSTREAM_URL_EXPIRY_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_URL_EXPIRY_MINUTES)
                .clamp(0, MAX_URL_EXPIRY_MINUTES),
        }
    }

    /// Whether URLs can be signed and checked with this config.
    pub fn is_configured(&self) -> bool {
        self.signing_secret.is_some()
    }

    fn secret(&self) -> DeliveryResult<&str> {
        self.signing_secret
            .as_deref()
            .ok_or_else(|| DeliveryError::invalid_key("VSTREAM_SIGNING_SECRET is not set"))
    }

    /// Signer for the configured secret.
    pub fn signer(&self) -> DeliveryResult<UrlSigner> {
        Ok(UrlSigner::new(self.secret()?))
    }

    /// Gate for the configured secret.
    pub fn gate(&self) -> DeliveryResult<AccessGate> {
        Ok(AccessGate::new(self.secret()?))
    }

    /// Check `url` against the configured secret and expiry.
    pub fn check(&self, url: &str) -> bool {
        match self.gate() {
            Ok(gate) => gate.check(url, self.url_expiry_minutes),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.url_expiry_minutes, DEFAULT_URL_EXPIRY_MINUTES);
    }

    #[test]
    fn test_unconfigured_secret_is_an_error() {
        let config = DeliveryConfig::default();

        assert!(matches!(config.signer(), Err(DeliveryError::InvalidKey(_))));
        assert!(matches!(config.gate(), Err(DeliveryError::InvalidKey(_))));
        assert!(!config.check("https://cdn.example.com/v.mp4?signature=1.AAAA"));
    }

    #[test]
    fn test_check_uses_configured_expiry() {
        let config = DeliveryConfig {
            signing_secret: Some("secret".to_string()),
            url_expiry_minutes: 5,
        };
        let signer = config.signer().unwrap();
        let url = "https://cdn.example.com/videos/v.mp4";

        assert!(config.check(&signer.sign(url).unwrap()));

        let stale = signer.sign_at(url, Utc::now() - Duration::minutes(10)).unwrap();
        assert!(!config.check(&stale));
        assert!(config.gate().unwrap().check(&stale, 15));
    }
}
