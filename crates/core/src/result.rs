//! Uniform outcome of a cart action and the failure taxonomy behind it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;

pub const MISSING_CART_MESSAGE: &str = "Your shopping cart could not be found.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected server error occurred.";
pub const UPSTREAM_ERROR_MESSAGE: &str = "An error occurred while communicating with the commerce API.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    MissingCartId,
    ApiError,
    UnexpectedServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::MissingCartId => "MISSING_CART_ID",
            Self::ApiError => "API_ERROR",
            Self::UnexpectedServerError => "UNEXPECTED_SERVER_ERROR",
        }
    }
}

/// What a server action reports back: `{success, message?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error: Some(code),
        }
    }

    /// The message, if it carries anything a user could read.
    pub fn usable_message(&self) -> Option<&str> {
        usable(self.message.as_deref())
    }
}

/// Failure of a call across the commerce boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("missing cart id")]
    MissingCartId,

    #[error("upstream API error: {message}")]
    Api {
        message: String,
        code: Option<String>,
    },

    #[error("unexpected error: {}", .0.as_deref().unwrap_or("<no message>"))]
    Unexpected(Option<String>),
}

impl ActionError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            code: None,
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(Some(message.into()))
    }

    /// The message a user should see, or `None` if the failure carries none.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Validation(err) => match err {
                CoreError::Validation { message, .. } => Some(*message),
                CoreError::CurrencyMismatch { .. } => None,
            },
            Self::MissingCartId => Some(MISSING_CART_MESSAGE),
            Self::Api { message, .. } => usable(Some(message.as_str())),
            Self::Unexpected(message) => usable(message.as_deref()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::MissingCartId => ErrorCode::MissingCartId,
            Self::Api { .. } => ErrorCode::ApiError,
            Self::Unexpected(_) => ErrorCode::UnexpectedServerError,
        }
    }
}

impl From<&ActionError> for ActionResult {
    fn from(err: &ActionError) -> Self {
        let message = match err {
            ActionError::Validation(core) => core.to_string(),
            other => other
                .user_message()
                .unwrap_or(UNEXPECTED_ERROR_MESSAGE)
                .to_string(),
        };
        ActionResult::failure(err.code(), message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: Option<String>,
    #[serde(default)]
    pub path: Vec<String>,
    pub code: Option<String>,
}

/// Error payload returned by the upstream commerce API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub message: Option<String>,
    #[serde(default)]
    pub graphql_errors: Vec<GraphQlError>,
    pub network_status: Option<u16>,
}

impl ApiErrorResponse {
    /// First GraphQL error message, else the generic upstream message.
    pub fn top_level_message(&self) -> &str {
        self.graphql_errors
            .first()
            .and_then(|err| usable(err.message.as_deref()))
            .unwrap_or(UPSTREAM_ERROR_MESSAGE)
    }
}

impl From<ApiErrorResponse> for ActionError {
    fn from(response: ApiErrorResponse) -> Self {
        let code = response
            .graphql_errors
            .first()
            .and_then(|err| err.code.clone());
        ActionError::Api {
            message: response.top_level_message().to_string(),
            code,
        }
    }
}

fn usable(message: Option<&str>) -> Option<&str> {
    message.filter(|m| !m.trim().is_empty())
}
