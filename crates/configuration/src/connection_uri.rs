//! The backend connection string.

use std::fmt;

use url::Url;

use crate::error::ConfigurationError;

/// A validated PostgreSQL connection string.
///
/// The `Display` and `Debug` forms never include credentials, so the value can
/// be logged freely.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUri(Url);

impl ConnectionUri {
    pub fn parse(uri: &str) -> Result<ConnectionUri, ConfigurationError> {
        let url = Url::parse(uri)?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(ConnectionUri(url)),
            other => Err(ConfigurationError::UnsupportedScheme(other.to_string())),
        }
    }

    /// The full connection string, credentials included.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// `host:port/database`, for log lines.
    pub fn target(&self) -> String {
        let host = self.0.host_str().unwrap_or("localhost");
        let database = self.0.path().trim_start_matches('/');
        match self.0.port() {
            Some(port) => format!("{host}:{port}/{database}"),
            None => format!("{host}/{database}"),
        }
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target())
    }
}

impl fmt::Debug for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionUri").field(&self.target()).finish()
    }
}
