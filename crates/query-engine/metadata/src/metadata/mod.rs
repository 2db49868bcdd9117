//! Metadata information regarding the types reported back to clients.

pub mod database;

// re-export without modules
pub use database::*;
