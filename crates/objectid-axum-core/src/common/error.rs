//! Error bodies for the HTTP binding.
//!
//! Every failed request answers with a JSON [`ErrorBody`] whose `code` names
//! the error class. The server builds it from an [`objectid::Error`] through
//! [`ApiError`], and the client turns it back into one with
//! [`ErrorBody::into_error`], so both ends see the same error classes.
//!
//! | code              | status |
//! |-------------------|--------|
//! | `not_found`       | 404    |
//! | `invalid_request` | 400    |
//! | `range_exhausted` | 409    |
//! | `consistency`     | 500    |
//! | `storage`         | 500    |
//! | `configuration`   | 500    |
//! | `internal`        | 500    |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use objectid::Error;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidRequest,
    RangeExhausted,
    Consistency,
    Storage,
    Configuration,
    Internal,
    /// A code this client does not know.
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::RangeExhausted => StatusCode::CONFLICT,
            Self::Consistency
            | Self::Storage
            | Self::Configuration
            | Self::Internal
            | Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::RangeExhausted => "range_exhausted",
            Self::Consistency => "consistency",
            Self::Storage => "storage",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

/// JSON body of every failed request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    /// The type name or id the error is about, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

impl ErrorBody {
    fn new(code: ErrorCode, err: &Error) -> Self {
        Self {
            code,
            message: err.to_string(),
            key: None,
            last_value: None,
            amount: None,
        }
    }

    /// Rebuilds the error the server reported.
    pub fn into_error(self) -> Error {
        match self.code {
            ErrorCode::NotFound => Error::NotFound {
                key: self.key.unwrap_or(self.message),
            },
            ErrorCode::InvalidRequest => Error::InvalidRequest {
                reason: self.message,
            },
            ErrorCode::RangeExhausted => match (self.key, self.last_value, self.amount) {
                (Some(type_name), Some(last_value), Some(amount)) => Error::RangeExhausted {
                    type_name,
                    last_value,
                    amount,
                },
                _ => Error::Remote {
                    code: self.code.as_str().to_string(),
                    message: self.message,
                },
            },
            code => Error::Remote {
                code: code.as_str().to_string(),
                message: self.message,
            },
        }
    }
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        match err {
            Error::NotFound { key } => Self {
                key: Some(key.clone()),
                ..Self::new(ErrorCode::NotFound, err)
            },
            Error::InvalidRequest { .. } => Self::new(ErrorCode::InvalidRequest, err),
            Error::RangeExhausted {
                type_name,
                last_value,
                amount,
            } => Self {
                key: Some(type_name.clone()),
                last_value: Some(*last_value),
                amount: Some(*amount),
                ..Self::new(ErrorCode::RangeExhausted, err)
            },
            Error::Consistency { type_name, .. } => Self {
                key: Some(type_name.clone()),
                ..Self::new(ErrorCode::Consistency, err)
            },
            Error::Storage { .. } => Self::new(ErrorCode::Storage, err),
            Error::Configuration { .. } => Self::new(ErrorCode::Configuration, err),
            _ => Self::new(ErrorCode::Internal, err),
        }
    }
}

/// An [`objectid::Error`] on its way out of an axum handler.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self.0);
        (body.code.status(), Json(body)).into_response()
    }
}
