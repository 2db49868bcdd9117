use thiserror::Error;

/// Configuration interpretation errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid listen address {address}: {source}")]
    InvalidListenAddress {
        address: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid database url: {0}")]
    InvalidDatabaseUrl(#[from] url::ParseError),
    #[error("unsupported database url scheme {0:?}, expected postgres or postgresql")]
    UnsupportedScheme(String),
}
