//! Process-wide settings for the pipeline and data modules.
//!
//! Settings are constructed once at startup (from the environment or a
//! builder) and passed by reference into the module registry and the
//! orchestrator. Core logic never reads the environment directly.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Settings validation failed.
    #[error("Settings validation failed: {0}")]
    ValidationFailed(String),
}

/// Process-wide configuration.
///
/// Credential fields are empty strings when absent; module availability
/// checks interpret an empty string as "not configured".
#[derive(Debug, Clone)]
pub struct Settings {
    // External API credentials
    /// SerpAPI key, used by the jobs and trends modules.
    pub serpapi_key: String,
    /// BLS API key. The BLS API works without a key at a lower daily quota,
    /// so this is optional even when the jobs module is enabled.
    pub bls_api_key: String,
    /// Lightcast OAuth client id, used by the skills module.
    pub lightcast_client_id: String,
    /// Lightcast OAuth client secret.
    pub lightcast_client_secret: String,

    // Pipeline execution settings
    /// Maximum number of modules running concurrently in one pipeline run.
    pub max_parallel_modules: usize,
    /// How long a cancelled or timed-out module is given to release its
    /// resources before its task is abandoned.
    pub cancel_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serpapi_key: String::new(),
            bls_api_key: String::new(),
            lightcast_client_id: String::new(),
            lightcast_client_secret: String::new(),
            max_parallel_modules: 4,
            cancel_grace: Duration::from_secs(5),
        }
    }
}

impl Settings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SERPAPI_KEY`: SerpAPI key for jobs and trends
    /// - `BLS_API_KEY`: BLS API key (optional)
    /// - `LIGHTCAST_CLIENT_ID` / `LIGHTCAST_CLIENT_SECRET`: Lightcast OAuth
    /// - `MARKETPULSE_MAX_PARALLEL`: concurrent module limit (default: 4)
    /// - `MARKETPULSE_CANCEL_GRACE_SECS`: cancellation grace period (default: 5)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(val) = std::env::var("SERPAPI_KEY") {
            settings.serpapi_key = val;
        }

        if let Ok(val) = std::env::var("BLS_API_KEY") {
            settings.bls_api_key = val;
        }

        if let Ok(val) = std::env::var("LIGHTCAST_CLIENT_ID") {
            settings.lightcast_client_id = val;
        }

        if let Ok(val) = std::env::var("LIGHTCAST_CLIENT_SECRET") {
            settings.lightcast_client_secret = val;
        }

        if let Ok(val) = std::env::var("MARKETPULSE_MAX_PARALLEL") {
            settings.max_parallel_modules = parse_env_value(&val, "MARKETPULSE_MAX_PARALLEL")?;
        }

        if let Ok(val) = std::env::var("MARKETPULSE_CANCEL_GRACE_SECS") {
            let secs: u64 = parse_env_value(&val, "MARKETPULSE_CANCEL_GRACE_SECS")?;
            settings.cancel_grace = Duration::from_secs(secs);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Sets the SerpAPI key.
    pub fn with_serpapi_key(mut self, key: impl Into<String>) -> Self {
        self.serpapi_key = key.into();
        self
    }

    /// Sets the BLS API key.
    pub fn with_bls_api_key(mut self, key: impl Into<String>) -> Self {
        self.bls_api_key = key.into();
        self
    }

    /// Sets the Lightcast OAuth credentials.
    pub fn with_lightcast_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.lightcast_client_id = client_id.into();
        self.lightcast_client_secret = client_secret.into();
        self
    }

    /// Sets the maximum number of concurrently running modules.
    pub fn with_max_parallel_modules(mut self, max: usize) -> Self {
        self.max_parallel_modules = max;
        self
    }

    /// Sets the cancellation grace period.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_modules == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_parallel_modules must be at least 1".to_string(),
            ));
        }

        if self.cancel_grace.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "cancel_grace must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parses an environment variable value into the target type.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert!(settings.serpapi_key.is_empty());
        assert_eq!(settings.max_parallel_modules, 4);
        assert_eq!(settings.cancel_grace, Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_builder() {
        let settings = Settings::new()
            .with_serpapi_key("serp-123")
            .with_bls_api_key("bls-456")
            .with_lightcast_credentials("client", "secret")
            .with_max_parallel_modules(8)
            .with_cancel_grace(Duration::from_secs(2));

        assert_eq!(settings.serpapi_key, "serp-123");
        assert_eq!(settings.bls_api_key, "bls-456");
        assert_eq!(settings.lightcast_client_id, "client");
        assert_eq!(settings.lightcast_client_secret, "secret");
        assert_eq!(settings.max_parallel_modules, 8);
        assert_eq!(settings.cancel_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_settings_validation_rejects_zero_parallelism() {
        let settings = Settings::new().with_max_parallel_modules(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_validation_rejects_zero_grace() {
        let settings = Settings::new().with_cancel_grace(Duration::ZERO);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_env_value() {
        let parsed: usize = parse_env_value("12", "TEST_KEY").expect("should parse");
        assert_eq!(parsed, 12);

        let err = parse_env_value::<usize>("not-a-number", "TEST_KEY").unwrap_err();
        assert!(err.to_string().contains("TEST_KEY"));
    }
}
