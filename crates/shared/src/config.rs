//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Invoice numbering and defaults.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Trust compliance thresholds.
    #[serde(default)]
    pub trust: TrustConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Invoice numbering and billing defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Prefix for newly allocated invoice numbers.
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
    /// Zero-padded width of the sequence part.
    #[serde(default = "default_invoice_number_width")]
    pub invoice_number_width: usize,
    /// Days between issue date and due date when none is given.
    #[serde(default = "default_due_days")]
    pub default_due_days: u32,
}

fn default_invoice_prefix() -> String {
    "FRITH".to_string()
}

fn default_invoice_number_width() -> usize {
    6
}

fn default_due_days() -> u32 {
    30
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            invoice_prefix: default_invoice_prefix(),
            invoice_number_width: default_invoice_number_width(),
            default_due_days: default_due_days(),
        }
    }
}

/// Trust compliance thresholds and reconciliation override policy.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustConfig {
    /// A funded ledger with no activity for this many days is dormant.
    #[serde(default = "default_dormant_after_days")]
    pub dormant_after_days: u32,
    /// Maximum days between approved reconciliations.
    #[serde(default = "default_reconciliation_interval_days")]
    pub reconciliation_interval_days: u32,
    /// Roles allowed to approve an unbalanced reconciliation with justification.
    #[serde(default = "default_override_roles")]
    pub override_roles: Vec<String>,
}

fn default_dormant_after_days() -> u32 {
    365
}

fn default_reconciliation_interval_days() -> u32 {
    30
}

fn default_override_roles() -> Vec<String> {
    vec!["owner".to_string(), "admin".to_string()]
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            dormant_after_days: default_dormant_after_days(),
            reconciliation_interval_days: default_reconciliation_interval_days(),
            override_roles: default_override_roles(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("FRITH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("trust.override_roles")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("FRITH__SERVER__PORT", Some("9090")),
                ("FRITH__DATABASE__URL", Some("postgres://localhost/frith_test")),
                ("FRITH__JWT__SECRET", Some("secret")),
                ("FRITH__BILLING__INVOICE_PREFIX", Some("LAW")),
                ("RUN_MODE", Some("nonexistent")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.database.url, "postgres://localhost/frith_test");
                assert_eq!(config.billing.invoice_prefix, "LAW");
                assert_eq!(config.billing.invoice_number_width, 6);
                assert_eq!(config.trust.dormant_after_days, 365);
                assert_eq!(config.trust.override_roles, vec!["owner", "admin"]);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("FRITH__DATABASE__URL", None::<&str>),
                ("FRITH__JWT__SECRET", Some("secret")),
                ("FRITH__SERVER__PORT", Some("9090")),
                ("RUN_MODE", Some("nonexistent")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
