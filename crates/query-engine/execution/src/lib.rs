//! Query execution against a PostgreSQL database.
//!
//! Statements are run exactly as the client sent them; parameters are bound
//! positionally by the driver and every returned value is decoded into a
//! [`value::RawValue`] without consulting the column types again.

pub mod array_literal;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod numeric;
pub mod params;
pub mod query;
pub mod render;
pub mod temporal;
pub mod value;

pub use error::{Diagnostics, Error};
pub use query::{execute, QueryOutput, QueryRequest};
pub use value::{RawValue, Row};
