//! Vertica wire client.
//!
//! Vertica's client protocol is derived from the PostgreSQL 3.0
//! frontend/backend protocol; this module implements the slice a
//! read-only analytics service needs: startup + cleartext password
//! authentication, the simple query cycle, and orderly termination.

pub mod connector;
pub mod protocol;
#[cfg(test)]
mod protocol_tests;

pub use connector::{VerticaConnector, VerticaSession};
