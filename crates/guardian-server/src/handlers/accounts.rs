//! `POST /api/accounts`: local self-registration.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use guardian_core::{
  principal::normalize_email,
  store::{AccountStore, NewAccount, ProfileStore},
};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, GuardianStore, auth::hash_password, error::Error};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub email:        String,
  pub password:     String,
  #[serde(default)]
  pub display_name: Option<String>,
}

/// Create an account and its `new`, contact-less profile. Responds `201`
/// with the principal.
pub async fn register<S: GuardianStore>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, Error> {
  let email = normalize_email(&body.email)?;
  if body.password.is_empty() {
    return Err(Error::BadRequest("password must not be empty".into()));
  }

  let existing = state.store.find_account(&email).await.map_err(Error::store)?;
  if existing.is_some() {
    return Err(Error::Conflict(format!("an account for {email} already exists")));
  }

  let display_name = body
    .display_name
    .map(|n| n.trim().to_owned())
    .filter(|n| !n.is_empty());

  let principal = state
    .store
    .create_account(NewAccount {
      email,
      display_name,
      password_hash: hash_password(&body.password)?,
    })
    .await
    .map_err(Error::store)?;

  state
    .store
    .create_profile(principal.principal_id)
    .await
    .map_err(Error::store)?;

  info!(principal = %principal.principal_id, email = %principal.email, "account registered");
  Ok((StatusCode::CREATED, Json(principal)))
}
