//! Helpers shared by the integration tests.

pub mod router;
pub mod websocket;
