use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Machine-readable error code (e.g. "invalid_state")
    pub code: String,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid organisation: partner organisation {organisation_id} is the initiating organisation")]
    InvalidOrganisation { organisation_id: i32 },

    #[error("Invalid base: base {base_id} is not one of {expected_base_ids:?}")]
    InvalidBase {
        base_id: i32,
        expected_base_ids: Vec<i32>,
    },

    #[error("Invalid dates: valid_from {valid_from} must lie on a date before valid_until {valid_until}")]
    InvalidDates {
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    },

    #[error("Invalid state: expected one of {expected:?}, found {actual}")]
    InvalidState {
        expected: Vec<String>,
        actual: String,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Transfer agreement {agreement_id} is outside its validity window")]
    AgreementNotInEffect { agreement_id: i32 },

    #[error("Box {label_identifier} is in state {state}")]
    InvalidBoxState {
        label_identifier: String,
        state: String,
    },

    #[error("Shipment detail {detail_id} cannot be updated")]
    InvalidShipmentDetail { detail_id: i32 },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Normalizes a sea-orm error into the database variant.
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Builds an `InvalidState` error from any displayable state values.
    pub fn invalid_state<S: ToString>(expected: &[S], actual: impl ToString) -> Self {
        ServiceError::InvalidState {
            expected: expected.iter().map(ToString::to_string).collect(),
            actual: actual.to_string(),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidOrganisation { .. }
            | Self::InvalidBase { .. }
            | Self::InvalidDates { .. }
            | Self::InvalidTimezone(_)
            | Self::AgreementNotInEffect { .. }
            | Self::InvalidBoxState { .. }
            | Self::InvalidShipmentDetail { .. }
            | Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidState { .. } => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidOrganisation { .. } => "invalid_organisation",
            Self::InvalidBase { .. } => "invalid_base",
            Self::InvalidDates { .. } => "invalid_dates",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidTimezone(_) => "invalid_timezone",
            Self::AgreementNotInEffect { .. } => "agreement_not_in_effect",
            Self::InvalidBoxState { .. } => "invalid_box_state",
            Self::InvalidShipmentDetail { .. } => "invalid_shipment_detail",
            Self::ValidationError(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            code: self.code().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
