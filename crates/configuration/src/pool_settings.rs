//! Settings for the shared connection pool.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

/// Settings for the PostgreSQL connection pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// maximum number of pool connections
    pub max_connections: u32,
    /// timeout for acquiring a connection from the pool (seconds)
    pub pool_timeout: u64,
    /// idle timeout for releasing a connection from the pool (seconds)
    pub idle_timeout: Option<u64>,
    /// maximum lifetime for an individual connection (seconds)
    pub connection_lifetime: Option<u64>,
}

impl PoolSettings {
    /// Pool options carrying these settings.
    /// - <https://docs.rs/sqlx/latest/sqlx/pool/struct.PoolOptions.html>
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.pool_timeout))
            .idle_timeout(self.idle_timeout.map(Duration::from_secs))
            .max_lifetime(self.connection_lifetime.map(Duration::from_secs))
    }
}

impl Default for PoolSettings {
    fn default() -> PoolSettings {
        PoolSettings {
            max_connections: 10,
            pool_timeout: 30,
            idle_timeout: Some(180),
            connection_lifetime: Some(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_carry_the_settings() {
        let settings = PoolSettings {
            max_connections: 4,
            pool_timeout: 5,
            idle_timeout: None,
            connection_lifetime: Some(60),
        };
        let options = settings.pool_options();
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(60)));
    }
}
