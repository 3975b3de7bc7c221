//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Role that marks a user as a customer
    #[serde(default = "default_customer_role")]
    pub customer_role: String,
    /// Deployment timezone as minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Holding any one of these lets a caller view the report
    #[serde(default = "default_report_capabilities")]
    pub report_capabilities: Vec<String>,
    /// Request header carrying the caller's capabilities, comma separated
    #[serde(default = "default_capabilities_header")]
    pub capabilities_header: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            customer_role: default_customer_role(),
            utc_offset_minutes: 0,
            report_capabilities: default_report_capabilities(),
            capabilities_header: default_capabilities_header(),
        }
    }
}

fn default_customer_role() -> String {
    "customer".to_string()
}

fn default_report_capabilities() -> Vec<String> {
    vec!["manage_woocommerce".to_string(), "manage_options".to_string()]
}

fn default_capabilities_header() -> String {
    "x-user-capabilities".to_string()
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(
                config::Environment::with_prefix("LOGIN_STATS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("stats.report_capabilities")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.http_port == 0 {
            anyhow::bail!("Invalid http_port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be at least 1");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.stats.customer_role.trim().is_empty() {
            anyhow::bail!("Customer role cannot be empty");
        }
        if self.stats.report_capabilities.iter().all(|c| c.trim().is_empty()) {
            anyhow::bail!("At least one report capability must be configured");
        }
        if self.stats.capabilities_header.trim().is_empty() {
            anyhow::bail!("Capabilities header cannot be empty");
        }
        if self.stats.utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!(
                "Invalid utc_offset_minutes {}: must be within a day of UTC",
                self.stats.utc_offset_minutes
            );
        }

        Ok(())
    }
}
