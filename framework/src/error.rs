//! Framework-wide error types
//!
//! Provides a unified error type that can be used throughout the framework
//! and automatically converts to appropriate HTTP responses.
//!
//! The propagation policy is: no silent recovery. Routing misses are mapped
//! to a 404 by the kernel; every other failure propagates unchanged to the
//! caller or to the host's exception handling.

use thiserror::Error;

use crate::container::ResolutionError;
use crate::routing::RoutingError;
use crate::view::CompilationError;

/// Framework-wide error type.
///
/// Implements `From` for the subsystem error taxonomies so the `?` operator
/// works in controller bodies and middleware:
///
/// ```rust,ignore
/// fn show(container: &Container, args: CallArgs) -> Result<Value, FrameworkError> {
///     let views = args.get::<View>(0)?;      // ResolutionError converts
///     let html = views.make("users.show", data)?; // CompilationError converts
///     Ok(value(HttpResponse::html(html)))
/// }
/// ```
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// Dependency resolution failed in the container.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A route's URI template or constraint could not be compiled.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Template compilation or rendering failed.
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    /// Generic internal server error.
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// Domain/application error with a custom status code.
    #[error("{message}")]
    Domain { message: String, status_code: u16 },
}

impl FrameworkError {
    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a Domain error with a custom status code.
    pub fn domain(message: impl Into<String>, status_code: u16) -> Self {
        Self::Domain {
            message: message.into(),
            status_code,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Resolution(_) => 500,
            Self::Routing(_) => 500,
            Self::Compilation(_) => 500,
            Self::Internal { .. } => 500,
            Self::Domain { status_code, .. } => *status_code,
        }
    }
}
