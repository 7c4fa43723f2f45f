//! Server-side error types.

use thiserror::Error;

/// Errors from building or running a [`crate::Server`].
#[derive(Error, Debug)]
pub enum ServerError {
    /// The requested port was outside `1..=65535`.
    #[error("port {0} is out of range (must be 1..=65535)")]
    InvalidPort(u32),

    /// Binding or listening on the socket failed.
    #[error("failed to bind listening socket: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Registering a procedure failed validation.
    #[error(transparent)]
    Registry(#[from] wirecall_core::RegistryError),
}
