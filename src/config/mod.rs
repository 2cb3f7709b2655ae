// Configuration module entry point
// Loads layered configuration (defaults, file, environment) and validates it

mod state;
mod types;

use std::net::SocketAddr;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

// Re-export public types
pub use state::AppState;
pub use types::{Config, LogFormat, LoggingConfig, PluginSettings, RoutesConfig, UpstreamConfig};

/// Environment variable prefix, e.g. `CATALOG_PROXY_PLUGIN__API_URL`
const ENV_PREFIX: &str = "CATALOG_PROXY";

impl Config {
    /// Load configuration from specified file path (extension optional)
    /// A missing file is not an error; defaults and environment still apply
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.backlog", 128)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.shutdown_timeout", 30)?
            .set_default("http.server_name", "catalog-proxy")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576) // 1MB
    }

    /// Check values that deserialization alone cannot enforce
    ///
    /// Normalizes `plugin.api_url` by trimming trailing slashes so handlers
    /// can append absolute API paths.
    fn validate(&mut self) -> Result<(), ConfigError> {
        let api_url = self.plugin.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(ConfigError::Message("plugin.api_url must be set".to_string()));
        }

        let parsed = url::Url::parse(&api_url)
            .map_err(|e| ConfigError::Message(format!("invalid plugin.api_url '{api_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "plugin.api_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(ConfigError::Message(
                "plugin.api_url must not contain a query or fragment".to_string(),
            ));
        }
        self.plugin.api_url = api_url;

        let base_path = self.routes.base_path.trim_end_matches('/');
        if !base_path.is_empty() && !base_path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "routes.base_path must start with '/', got '{base_path}'"
            )));
        }
        self.routes.base_path = base_path.to_string();

        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
impl Config {
    /// Build a configuration from an inline TOML document on top of the defaults
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let mut config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
