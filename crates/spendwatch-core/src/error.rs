//! Error types for `SpendWatch`.
//!
//! One unified error type for pool, cache and wire-client operations,
//! shaped for exposure through the API layer. Error codes follow the
//! pattern `SW-XXX` for easy grepping in logs.

use thiserror::Error;

/// Result type alias for `SpendWatch` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `SpendWatch` core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or malformed (SW-001). Fatal at startup.
    #[error("[SW-001] Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// No connection became available within the acquire timeout (SW-002).
    #[error("[SW-002] Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// A new connection could not be established (SW-003).
    #[error("[SW-003] Failed to connect: {0}")]
    ConnectionFailed(String),

    /// A query exceeded its execution timeout (SW-004). The holding
    /// connection is discarded, never returned to the pool.
    #[error("[SW-004] Query timed out after {0}ms")]
    QueryTimeout(u64),

    /// The server reported a query failure (SW-005).
    #[error("[SW-005] Query failed: {0}")]
    QueryFailed(String),

    /// The server requested an authentication method we do not speak (SW-006).
    #[error("[SW-006] Unsupported authentication method: {0}")]
    UnsupportedAuth(String),

    /// Malformed or unexpected wire traffic (SW-007).
    #[error("[SW-007] Protocol error: {0}")]
    Protocol(String),

    /// IO error on the database socket (SW-008).
    #[error("[SW-008] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (SW-009).
    #[error("[SW-009] Serialization error: {0}")]
    Serialization(String),

    /// A result row did not match the shape the caller declared (SW-010).
    #[error("[SW-010] Row shape mismatch: {0}")]
    RowShape(String),

    /// Pool drain gave up with connections still borrowed (SW-011).
    #[error("[SW-011] Pool drain incomplete: {0} connections still borrowed")]
    DrainIncomplete(usize),
}

impl Error {
    /// Returns the error code (e.g., "SW-002").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "SW-001",
            Self::PoolExhausted(_) => "SW-002",
            Self::ConnectionFailed(_) => "SW-003",
            Self::QueryTimeout(_) => "SW-004",
            Self::QueryFailed(_) => "SW-005",
            Self::UnsupportedAuth(_) => "SW-006",
            Self::Protocol(_) => "SW-007",
            Self::Io(_) => "SW-008",
            Self::Serialization(_) => "SW-009",
            Self::RowShape(_) => "SW-010",
            Self::DrainIncomplete(_) => "SW-011",
        }
    }

    /// Returns true if retrying the operation could plausibly succeed.
    ///
    /// Configuration and row-shape errors are deterministic and never
    /// retried; everything the backend or network can cause transiently is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ConfigInvalid(_)
                | Self::UnsupportedAuth(_)
                | Self::Serialization(_)
                | Self::RowShape(_)
                | Self::DrainIncomplete(_)
        )
    }
}
