//! Application configuration

use crate::error::AppError;

/// Default entity id carrying the home coordinates
pub const DEFAULT_HOME_ZONE: &str = "zone.home";

/// Configuration for [`crate::App::new`]
///
/// Either `url` or `ip_address` must be set, along with `auth_token`. The
/// URL's scheme selects plaintext vs TLS for both the REST and WebSocket
/// transports.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Base URL of the Home Assistant instance, e.g. `http://ha.local:8123`
    pub url: String,

    /// Host fallback when no full URL is given; port 8123 and plain HTTP
    /// are assumed
    pub ip_address: String,

    /// Long-lived access token created in the Home Assistant profile
    pub auth_token: String,

    /// Entity id of the zone holding the home latitude/longitude;
    /// defaults to `zone.home`
    pub home_zone_entity_id: Option<String>,
}

impl Config {
    /// Validate required fields
    pub(crate) fn validate(&self) -> Result<(), AppError> {
        if self.url.is_empty() && self.ip_address.is_empty() {
            return Err(AppError::InvalidArgs(
                "either url or ip_address is required".to_string(),
            ));
        }
        if self.auth_token.is_empty() {
            return Err(AppError::InvalidArgs("auth_token is required".to_string()));
        }
        Ok(())
    }

    /// The base URL the transports dial
    pub(crate) fn base_url(&self) -> String {
        if !self.url.is_empty() {
            self.url.clone()
        } else {
            format!("http://{}:8123", self.ip_address)
        }
    }

    /// The configured home zone entity id, defaulted
    pub(crate) fn home_zone(&self) -> String {
        self.home_zone_entity_id
            .clone()
            .unwrap_or_else(|| DEFAULT_HOME_ZONE.to_string())
    }
}
