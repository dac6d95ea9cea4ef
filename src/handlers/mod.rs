//! HTTP handlers. Each handler authorizes the caller before touching the lifecycle services.
pub mod shipments;
pub mod transfer_agreements;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

use crate::errors::ServiceError;
use validator::Validate;

/// Validate request input
pub(crate) fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}
