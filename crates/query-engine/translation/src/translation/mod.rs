//! Translate executor output into the envelopes the client understands.

pub mod error;
pub mod result;
