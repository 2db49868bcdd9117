//! An HTTP and WebSocket front end that speaks a serverless PostgreSQL query
//! protocol and runs every statement against a regular PostgreSQL server.

pub mod error;
pub mod routes;
pub mod session;
pub mod state;
