//! # `SpendWatch` Core
//!
//! Connection pooling and response caching for the `SpendWatch`
//! spend-analytics API.
//!
//! The crate owns the two stateful singletons the API server is built
//! around, plus the glue that composes them:
//!
//! - [`pool::ConnectionPool`]: a bounded pool of live Vertica sessions
//!   with acquire/validate/release discipline, per-query timeouts and
//!   retry with capped exponential backoff.
//! - [`cache::ResponseCache`]: a process-wide TTL cache keyed by
//!   deterministic request keys, bounded by key count.
//! - [`fetch::cached_fetch`]: the check-cache / live-query / populate
//!   sequence every data route runs through.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spendwatch_core::{config::SpendwatchConfig, pool::ConnectionPool};
//! use spendwatch_core::vertica::VerticaConnector;
//! use std::sync::Arc;
//!
//! let config = SpendwatchConfig::load()?;
//! config.validate()?;
//!
//! let connector = VerticaConnector::new(config.database.clone());
//! let pool = Arc::new(ConnectionPool::new(Arc::new(connector), config.pool.clone()));
//! let rows = pool.query_with_retry("SELECT 1 AS probe", 3).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod pool;
pub mod vertica;

pub use cache::{CacheHit, CacheStats, ResponseCache};
pub use config::SpendwatchConfig;
pub use error::{Error, Result};
pub use fetch::{cached_fetch, FetchOutcome};
pub use keys::cache_key;
pub use pool::{from_rows, ConnectionPool, Connector, PoolStats, QueryOutput, Row, Session};
