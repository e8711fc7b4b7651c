use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("object already exists")]
    ObjectAlreadyExists,

    #[error("cached body missing")]
    BodyMissing,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    TooLarge(String, u64),

    #[error("canceled")]
    Canceled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::ObjectAlreadyExists => StatusCode::CONFLICT,
            Error::BodyMissing => StatusCode::NOT_FOUND,
            Error::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::UpstreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::TooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Canceled => StatusCode::REQUEST_TIMEOUT,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::ObjectAlreadyExists => "ObjectAlreadyExists",
            Error::BodyMissing => "BodyMissing",
            Error::StorageUnavailable(_) => "StorageUnavailable",
            Error::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Error::TooLarge(_, _) => "TooLarge",
            Error::Canceled => "Canceled",
            Error::Internal(_) => "Internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let max_size = match &self {
            Error::TooLarge(_, max) => Some(*max),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.error_code(),
            max_size,
        };

        (status, axum::Json(body)).into_response()
    }
}
