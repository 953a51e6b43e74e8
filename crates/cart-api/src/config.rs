//! Cart API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_API_HOST` - Bind address (default: 127.0.0.1)
//! - `CART_API_PORT` - Listen port (default: 3100)
//! - `CART_API_BASE_URL` - Public URL, used for `Location` headers
//!   (default: http://localhost:3100)
//! - `CART_API_CURRENCY` - Store currency code (default: USD)
//! - `CART_API_QTY_SUMMARY` - Cart qty summary policy, `count` or `qty`
//!   (default: count)
//! - `CART_API_PRICES_INCL_TAX` - Display cart prices including tax
//!   (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry tracing sample rate (default: 0.0)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// How the cart-level `qty` summary attribute is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QtySummaryPolicy {
    /// Number of visible line items.
    #[default]
    ItemCount,
    /// Sum of visible item quantities.
    ItemQty,
}

/// Cart API application configuration.
#[derive(Debug, Clone)]
pub struct CartApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used for `Location` and `Content-Location` headers
    pub base_url: String,
    /// Store currency (ISO 4217)
    pub currency: String,
    /// Cart qty summary policy
    pub qty_summary: QtySummaryPolicy,
    /// Whether cart row totals display tax-inclusive amounts
    pub prices_include_tax: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry event sample rate
    pub sentry_sample_rate: f32,
    /// Sentry tracing sample rate
    pub sentry_traces_sample_rate: f32,
}

impl Default for CartApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3100,
            base_url: "http://localhost:3100".to_string(),
            currency: "USD".to_string(),
            qty_summary: QtySummaryPolicy::default(),
            prices_include_tax: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

impl CartApiConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CART_API_HOST") {
            config.host = host
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("CART_API_HOST".to_string(), host))?;
        }

        if let Ok(port) = std::env::var("CART_API_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("CART_API_PORT".to_string(), port))?;
        }

        if let Ok(base_url) = std::env::var("CART_API_BASE_URL") {
            Url::parse(&base_url).map_err(|err| {
                ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), err.to_string())
            })?;
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Ok(currency) = std::env::var("CART_API_CURRENCY") {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::InvalidEnvVar(
                    "CART_API_CURRENCY".to_string(),
                    currency,
                ));
            }
            config.currency = currency;
        }

        if let Ok(policy) = std::env::var("CART_API_QTY_SUMMARY") {
            config.qty_summary = match policy.as_str() {
                "count" => QtySummaryPolicy::ItemCount,
                "qty" => QtySummaryPolicy::ItemQty,
                _ => {
                    return Err(ConfigError::InvalidEnvVar(
                        "CART_API_QTY_SUMMARY".to_string(),
                        policy,
                    ));
                }
            };
        }

        if let Ok(incl_tax) = std::env::var("CART_API_PRICES_INCL_TAX") {
            config.prices_include_tax = matches!(incl_tax.as_str(), "1" | "true" | "yes");
        }

        config.sentry_dsn = std::env::var("SENTRY_DSN").ok();
        config.sentry_environment = std::env::var("SENTRY_ENVIRONMENT").ok();

        if let Ok(rate) = std::env::var("SENTRY_SAMPLE_RATE") {
            config.sentry_sample_rate = rate.parse().map_err(|_| {
                ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), rate)
            })?;
        }

        if let Ok(rate) = std::env::var("SENTRY_TRACES_SAMPLE_RATE") {
            config.sentry_traces_sample_rate = rate.parse().map_err(|_| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), rate)
            })?;
        }

        Ok(config)
    }

    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL for a path under the cart API.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CartApiConfig::default();
        assert_eq!(config.port, 3100);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.qty_summary, QtySummaryPolicy::ItemCount);
        assert!(!config.prices_include_tax);
    }

    #[test]
    fn test_url_for() {
        let config = CartApiConfig::default();
        assert_eq!(
            config.url_for("/cart/items/3"),
            "http://localhost:3100/cart/items/3"
        );
    }
}
