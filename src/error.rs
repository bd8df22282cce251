//! Error taxonomy for the backend service.
//!
//! Every failure the service reports to a caller is an [`ApiError`]: an
//! immutable `{code, kind, messages}` value. The HTTP status code is never
//! chosen by the caller; it is derived from the [`ErrorKind`] through a fixed
//! lookup, so two errors of the same kind always render the same status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Boxed error used at the boundaries where arbitrary collaborators plug in
/// (health checks, shutdown cleanup callbacks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of error kinds known to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Something went wrong inside the service
    InternalServerError,
    FetchDbData,
    InsertDbData,
    UpdateDbData,
    DeleteDbData,
    /// The query succeeded but found nothing
    EmptyDbData,
    Validation,
    RequestParse,
    /// The entity already exists in a conflicting state
    Conflict,
    Unauthorized,
    /// A credential was sent but is malformed
    TokenFormat,
    MaxLimitReached,
    ServiceUnavailable,
    Duplicate,
    BadRequest,
    Forbidden,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 16] = [
        Self::InternalServerError,
        Self::FetchDbData,
        Self::InsertDbData,
        Self::UpdateDbData,
        Self::DeleteDbData,
        Self::EmptyDbData,
        Self::Validation,
        Self::RequestParse,
        Self::Conflict,
        Self::Unauthorized,
        Self::TokenFormat,
        Self::MaxLimitReached,
        Self::ServiceUnavailable,
        Self::Duplicate,
        Self::BadRequest,
        Self::Forbidden,
    ];

    /// HTTP status for this kind.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InternalServerError
            | Self::FetchDbData
            | Self::InsertDbData
            | Self::UpdateDbData
            | Self::DeleteDbData => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmptyDbData => StatusCode::NOT_FOUND,
            Self::Validation | Self::RequestParse | Self::Duplicate | Self::BadRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized | Self::TokenFormat => StatusCode::UNAUTHORIZED,
            Self::MaxLimitReached => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Wire constant sent to clients in `error_constant`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::FetchDbData => "FETCH_DB_DATA_ERROR",
            Self::InsertDbData => "INSERT_DB_DATA_ERROR",
            Self::UpdateDbData => "UPDATE_DB_DATA_ERROR",
            Self::DeleteDbData => "DELETE_DB_DATA_ERROR",
            Self::EmptyDbData => "EMPTY_DB_DATA_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::RequestParse => "REQUEST_PARSE_ERROR",
            Self::Conflict => "CONFLICT_ERROR",
            Self::Unauthorized => "UNAUTHORIZED_ERROR",
            Self::TokenFormat => "TOKEN_FORMAT_ERROR",
            Self::MaxLimitReached => "MAX_LIMIT_REACHED_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE_ERROR",
            Self::Duplicate => "DUPLICATE",
            Self::BadRequest => "BAD_REQUEST_ERROR",
            Self::Forbidden => "INVALID_KEY_OR_DATA",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Structured API error.
///
/// Fields are private so the value cannot be mutated after construction;
/// `code` always equals `kind.status()`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("API Error Code: {code} Constant: {kind}{}", render_messages(.messages))]
pub struct ApiError {
    code: u16,
    #[serde(rename = "error_constant")]
    kind: ErrorKind,
    #[serde(rename = "message")]
    messages: Vec<String>,
}

fn render_messages(messages: &[String]) -> String {
    if messages.is_empty() {
        String::new()
    } else {
        format!(" Message: {}", messages.join(", "))
    }
}

impl ApiError {
    /// Create an error of a known kind with zero or more messages.
    pub fn new<I, S>(kind: ErrorKind, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code: kind.status().as_u16(),
            kind,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an internal failure with a single message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, [message.into()])
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Return the `ApiError` behind an arbitrary error, if it is one.
    pub fn from_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a ApiError> {
        err.downcast_ref::<ApiError>()
    }

    /// Classify any error for the transport boundary.
    ///
    /// Known API errors pass through unchanged. Anything else becomes a
    /// generic internal failure; its detail is logged, not sent to clients.
    pub fn classify(err: &(dyn std::error::Error + 'static)) -> ApiError {
        match Self::from_error(err) {
            Some(api_err) => api_err.clone(),
            None => {
                tracing::error!(error = %err, "Unclassified error reached the API boundary");
                Self::internal("An internal error occurred")
            }
        }
    }
}

/// JSON body of an error response.
#[derive(Serialize)]
struct ApiErrorResponse<'a> {
    error: &'a ApiError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse { error: &self };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for operations reporting API errors.
pub type ApiResult<T> = Result<T, ApiError>;
