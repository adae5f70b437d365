use actix_threadpool::BlockingError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DBError};
use serde_json::json;
use std::convert::From;

use crate::bookings::BookingStatus;

#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display(fmt = "Internal Server Error")]
    InternalServerError,

    /// a field is missing, malformed or out of range
    #[display(fmt = "{}", _0)]
    Validation(String),

    /// the booking date lies outside of the booking window
    #[display(fmt = "{}", _0)]
    Horizon(String),

    /// the requested time range collides with an existing booking
    #[display(fmt = "{}", _0)]
    SlotConflict(String),

    #[display(fmt = "cannot change a {} booking to {}", from, to)]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[display(fmt = "Unauthorized")]
    Unauthorized,

    #[display(fmt = "Forbidden: {}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),
}

impl ServiceError {
    pub fn not_found() -> Self {
        ServiceError::NotFound("Not Found".to_string())
    }
}

// impl ResponseError trait allows to convert our errors into http responses with appropriate data
impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Validation(_)
            | ServiceError::Horizon(_)
            | ServiceError::SlotConflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::InternalServerError => {
                "Internal Server Error, Please try later".to_string()
            }
            ServiceError::Forbidden(ref message) => message.clone(),
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}

impl From<DBError> for ServiceError {
    fn from(error: DBError) -> ServiceError {
        match error {
            DBError::NotFound => ServiceError::not_found(),
            DBError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                debug!("serialization failure while admitting a booking");
                ServiceError::SlotConflict(
                    "Time slot was just taken by another booking, please try again".to_string(),
                )
            }
            DBError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let message = info.details().unwrap_or_else(|| info.message()).to_string();
                ServiceError::Validation(message)
            }
            other => {
                error!("db error: {}", other);
                ServiceError::InternalServerError
            }
        }
    }
}

impl From<r2d2::Error> for ServiceError {
    fn from(error: r2d2::Error) -> ServiceError {
        error!("r2d2 connection pool error: {}", error);
        ServiceError::InternalServerError
    }
}

impl From<BlockingError<ServiceError>> for ServiceError {
    fn from(error: BlockingError<ServiceError>) -> ServiceError {
        match error {
            BlockingError::Error(error) => error,
            BlockingError::Canceled => {
                error!("actix threadpool pool error: blocking operation was canceled");
                ServiceError::InternalServerError
            }
        }
    }
}

impl From<actix_multipart::MultipartError> for ServiceError {
    fn from(error: actix_multipart::MultipartError) -> ServiceError {
        debug!("malformed multipart payload: {}", error);
        ServiceError::Validation(format!("invalid form data: {}", error))
    }
}

impl From<argon2::Error> for ServiceError {
    fn from(error: argon2::Error) -> ServiceError {
        error!("argon2 error: {}", error);
        ServiceError::InternalServerError
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(error: serde_json::Error) -> ServiceError {
        error!("json (de)serialization error: {}", error);
        ServiceError::InternalServerError
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(error: std::io::Error) -> ServiceError {
        error!("io error: {}", error);
        ServiceError::InternalServerError
    }
}
