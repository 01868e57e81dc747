//! Handlers for the caller's own profile.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/profile` | 404 if no record exists |
//! | `PUT`  | `/api/profile/contact` | Body: `{"contact":"…"}` |

use axum::{Json, extract::State};
use guardian_core::{profile::ProfileRecord, store::ProfileStore};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, GuardianStore, auth::Authenticated, error::Error};

pub async fn get_own<S: GuardianStore>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<ProfileRecord>, Error> {
  let record = state
    .store
    .get(principal.principal_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("no profile for {}", principal.email)))?;
  Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct ContactBody {
  pub contact: String,
}

/// Profile completion. Status and role are left as they are.
pub async fn complete<S: GuardianStore>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  Json(body): Json<ContactBody>,
) -> Result<Json<ProfileRecord>, Error> {
  let contact = body.contact.trim();
  if contact.is_empty() {
    return Err(guardian_core::Error::BlankContact.into());
  }

  let record = state
    .store
    .complete_profile(principal.principal_id, contact.to_owned())
    .await
    .map_err(Error::store)?;

  info!(principal = %principal.principal_id, "profile completed");
  Ok(Json(record))
}
