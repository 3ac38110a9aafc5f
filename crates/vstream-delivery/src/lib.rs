//! Signed delivery URLs.
//!
//! A delivery URL carries a `signature=<unix_ts>.<mac>` query parameter, where
//! the MAC is HMAC-SHA256 over the unsigned URL and the issue timestamp.
//! [`UrlSigner`] produces such URLs; [`AccessGate`] checks them against a
//! maximum age.

pub mod config;
pub mod error;
pub mod gate;
pub mod signer;

pub use config::DeliveryConfig;
pub use error::{DeliveryError, DeliveryResult};
pub use gate::{check_signature, AccessGate};
pub use signer::UrlSigner;
