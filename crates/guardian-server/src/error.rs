//! Error type and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use guardian_core::Denial;
use guardian_store_sqlite::Error as StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden: {0}")]
  Forbidden(Denial),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("conflict: {0}")]
  Conflict(String),
  #[error("password hashing failed: {0}")]
  PasswordHash(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a storage failure. Conditions the SQLite store reports for a
  /// caller's request, rather than for the database, keep their HTTP meaning.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
    match boxed.downcast::<StoreError>() {
      Ok(e) => match *e {
        StoreError::EmailTaken(email) => {
          Self::Conflict(format!("an account for {email} already exists"))
        }
        StoreError::ProfileNotFound(id) => Self::NotFound(format!("no profile for {id}")),
        other => Self::Store(Box::new(other)),
      },
      Err(boxed) => Self::Store(boxed),
    }
  }
}

impl From<guardian_core::Error> for Error {
  fn from(e: guardian_core::Error) -> Self {
    use guardian_core::Error as Core;
    match e {
      Core::InvalidTransition { .. } => Self::Conflict(e.to_string()),
      Core::BlankContact | Core::MalformedEmail(_) => Self::BadRequest(e.to_string()),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
      Error::Forbidden(denial) => (StatusCode::FORBIDDEN, denial.to_string()),
      Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Error::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      Error::PasswordHash(_) | Error::Store(_) => {
        tracing::error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if matches!(self, Error::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"guardian\""),
      );
    }
    res
  }
}
