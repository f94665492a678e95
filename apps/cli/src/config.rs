use std::env;

use watchpay_store::StoreConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub sql_logging: bool,
    pub bootstrap_schema: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingVar("DATABASE_URL"))?;

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
            None => 10,
        };

        Ok(Config {
            database_url,
            max_connections,
            sql_logging: parse_flag(&get, "DATABASE_SQL_LOGGING", false)?,
            bootstrap_schema: parse_flag(&get, "WATCHPAY_BOOTSTRAP_SCHEMA", true)?,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_connections: self.max_connections,
            sql_logging: self.sql_logging,
            bootstrap_schema: self.bootstrap_schema,
            ..StoreConfig::new(self.database_url.clone())
        }
    }
}

fn parse_flag(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(var).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue(var.to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVar(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(var) => write!(f, "Invalid value for: {}", var),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.max_connections, 10);
        assert!(!config.sql_logging);
        assert!(config.bootstrap_schema);
        assert_eq!(config.store_config().database_url, "sqlite::memory:");
    }

    #[test]
    fn test_missing_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.to_string(), "Missing environment variable: DATABASE_URL");
    }

    #[test]
    fn test_flags_and_pool_size() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/watchpay"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DATABASE_SQL_LOGGING", "TRUE"),
            ("WATCHPAY_BOOTSTRAP_SCHEMA", "0"),
        ]))
        .unwrap();
        assert_eq!(config.store_config().max_connections, 4);
        assert!(config.sql_logging);
        assert!(!config.bootstrap_schema);

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "zero"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for: DATABASE_MAX_CONNECTIONS");
    }
}
