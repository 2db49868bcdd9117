//! Configuration for the server, resolved once at startup.

pub mod connection_uri;
pub mod error;
pub mod pool_settings;
pub mod server_options;

pub use connection_uri::ConnectionUri;
pub use error::ConfigurationError;
pub use pool_settings::PoolSettings;
pub use server_options::ServerOptions;
