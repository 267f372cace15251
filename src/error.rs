use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};

use crate::util::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized access")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(Uri),

    #[error("{0}")]
    PasswordHash(#[from] password_hash::Error),

    #[error("{0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    BsonSer(#[from] bson::ser::Error),

    #[error("Failed to send password reset email")]
    Mail(#[source] anyhow::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(..) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::PasswordHash(..)
            | Self::Database(..)
            | Self::Jwt(..)
            | Self::BsonSer(..)
            | Self::Mail(..)
            | Self::Internal(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message the caller sees. Internal failures all collapse to one
    /// generic string; the cause goes to the log, never to the wire.
    pub fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            "An error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);

        let status = self.status();
        let envelope = Envelope::<()>::error(status.as_u16(), self.public_message());

        (status, Json(envelope)).into_response()
    }
}
