use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::error::StoreResult;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub sql_logging: bool,
    /// Create missing tables and indexes on connect.
    pub bootstrap_schema: bool,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(8),
            sql_logging: false,
            bootstrap_schema: true,
        }
    }

    /// Private in-memory SQLite database. Every pooled connection would
    /// open its own database, so the pool is pinned to one connection.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::new("sqlite::memory:")
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.database_url.to_owned());
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .connect_timeout(self.connect_timeout)
            .sqlx_logging(self.sql_logging);
        opt
    }

    pub async fn connect(&self) -> StoreResult<DatabaseConnection> {
        let db = Database::connect(self.connect_options()).await?;
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_uses_single_connection() {
        let config = StoreConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.min_connections, 1);
        assert!(config.bootstrap_schema);
        assert_eq!(config.connect_options().get_url(), "sqlite::memory:");
    }
}
