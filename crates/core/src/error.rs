//! Error types for the UAP protocol library.

/// Errors that can occur in the UAP protocol library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io) — socket/network failures.
/// - **Server**: [`NotStarted`](Self::NotStarted), [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Addressing**: [`InvalidAddress`](Self::InvalidAddress).
#[derive(Debug, thiserror::Error)]
pub enum UapError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// [`Server::start`](crate::server::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::server::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// `hostname:port` (or bare port) failed to resolve to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Convenience alias for `Result<T, UapError>`.
pub type Result<T> = std::result::Result<T, UapError>;
