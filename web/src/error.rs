use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde_json::json;

use crate::controller::ApiResponse;
use domain::error::Error as DomainError;
use sse::{Error as StreamError, StreamErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// No token, or a token the authenticator did not accept.
    Unauthorized,
    /// The authenticator itself failed.
    Auth(DomainError),
    /// A request body that is not the expected JSON.
    BadRequest(String),
    Stream(StreamError),
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Unauthorized => write!(fmt, "unauthorized"),
            Error::Auth(e) => write!(fmt, "{e}"),
            Error::BadRequest(reason) => write!(fmt, "{reason}"),
            Error::Stream(e) => write!(fmt, "{e}"),
        }
    }
}

fn failure(status: StatusCode, error: String) -> Response {
    (status, Json(ApiResponse::failure(error))).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "status": "unauthorized" }))).into_response()
            }
            Error::Auth(e) => {
                error!("Authenticator failure: {e}");
                (StatusCode::UNAUTHORIZED, Json(json!({ "status": "unauthorized" }))).into_response()
            }
            Error::BadRequest(reason) => failure(StatusCode::BAD_REQUEST, reason),
            Error::Stream(e) => match &e.error_kind {
                StreamErrorKind::NoActiveSession => failure(StatusCode::UNAUTHORIZED, e.to_string()),
                StreamErrorKind::InvalidCursor(_) => failure(StatusCode::BAD_REQUEST, e.to_string()),
                StreamErrorKind::ShuttingDown => {
                    failure(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
                // Read failures leave the stream usable, so they are reported in-band.
                StreamErrorKind::LogRead | StreamErrorKind::Subscribe => {
                    warn!("Stream history read failed: {e}");
                    failure(StatusCode::OK, e.to_string())
                }
            },
        }
    }
}

impl From<DomainError> for Error {
    fn from(err: DomainError) -> Self {
        Error::Auth(err)
    }
}

impl From<StreamError> for Error {
    fn from(err: StreamError) -> Self {
        Error::Stream(err)
    }
}
