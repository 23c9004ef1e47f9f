use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_PROVIDER_VERSION: &str = "1.0.0";

/// Wallet configuration, usually embedded as `wallet.toml`
///
/// Every key is optional; missing ones take the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WalletConfig {
    pub api: ApiConfig,
    pub provider: ProviderConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    pub version: String,
    pub connect_timeout_ms: u64,
    pub balance_timeout_ms: u64,
    pub payment_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Weak sanity bound on destination length, not address validation
    pub min_destination_len: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_PROVIDER_VERSION.to_string(),
            connect_timeout_ms: 10_000,
            balance_timeout_ms: 10_000,
            payment_timeout_ms: 30_000,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_destination_len: 10,
        }
    }
}

impl ProviderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.balance_timeout_ms)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }
}

impl WalletConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let config: WalletConfig = toml::from_str(content)?;
        log::debug!("Loaded wallet config (api: {})", config.api.base_url);
        Ok(config)
    }

    /// Parse embedded configuration, falling back to defaults on a bad file
    pub fn from_toml_or_default(content: &str) -> Self {
        match Self::from_toml_str(content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid wallet config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalletConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:3001");
        assert_eq!(config.provider.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.provider.balance_timeout(), Duration::from_secs(10));
        assert_eq!(config.provider.payment_timeout(), Duration::from_secs(30));
        assert_eq!(config.validation.min_destination_len, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WalletConfig::from_toml_str(
            r#"
[api]
base_url = "https://api.example.org"

[provider]
payment_timeout_ms = 45000
"#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.example.org");
        assert_eq!(config.provider.payment_timeout_ms, 45_000);
        assert_eq!(config.provider.connect_timeout_ms, 10_000);
        assert_eq!(config.provider.version, "1.0.0");
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        let config = WalletConfig::from_toml_or_default("[api\nbase_url = 3");
        assert_eq!(config, WalletConfig::default());
    }
}
