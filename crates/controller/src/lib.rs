//! Core library of the *SAC Event & Registration Controller*
//!
//! Owns event and registration state and the multi-step operations around
//! them: image upload and cleanup against the object storage, database
//! writes through a pooled connection, and best-effort mail notifications
//! dispatched after the primary write committed.
//!
//! Authentication and HTTP routing are out of scope. Operations take an
//! already authenticated [`Principal`] handed in by whatever transport
//! layer embeds this crate.

use db_storage::users::{UserId, UserRole};

mod errors;

pub mod events;
pub mod registrations;
pub mod services;
pub mod settings;
pub mod storage;

pub use errors::{CoreError, FieldError};

/// Result type of all public core operations
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Authenticated actor performing an operation
///
/// Credential handling lives in the identity subsystem, the core only ever
/// sees the resolved identity and role.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Principal {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Admin gate used by every mutating event operation
    pub fn require_admin(&self) -> Result<()> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Blocking thread has panicked")]
pub struct BlockingError;

/// Runs the closure on the blocking thread pool while retaining the current tracing span
pub async fn block<F, R>(f: F) -> Result<R, BlockingError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let span = tracing::Span::current();

    let fut = tokio::task::spawn_blocking(move || span.in_scope(f));

    fut.await.map_err(|_| BlockingError)
}
