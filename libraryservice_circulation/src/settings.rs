use anyhow::Context;
use serde::Deserialize;

use crate::library_repository::PostgresLibraryRepositoryConfig;

/// Runtime configuration read from environment variables,
/// e.g. `USE_IN_MEMORY_DB=true BIND_PORT=8081`
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
pub struct Settings {
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub bind_address: String,
    pub bind_port: u16,
    /// Export spans to a Jaeger agent in addition to the stdout logs
    pub jaeger_enabled: bool,
    pub service_name: String,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> anyhow::Result<Self> {
        config::Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("bind_address", "0.0.0.0")?
            .set_default("bind_port", 8080)?
            .set_default("jaeger_enabled", true)?
            .set_default("service_name", "libraryservice_circulation")?
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn postgres_config(&self) -> PostgresLibraryRepositoryConfig {
        PostgresLibraryRepositoryConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }
}
