//! Administrator endpoints. Every handler takes [`AdminPrincipal`], so the
//! caller has already passed the admin-view rules.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/admin/profiles` | Every record with its account |
//! | `POST` | `/api/admin/profiles/{id}/moderate` | Body: `{"action":"approve\|disable\|enable"}` |
//! | `PUT`  | `/api/admin/profiles/{id}/role` | Body: `{"role":"admin\|user"}` |

use axum::{
  Json,
  extract::{Path, State},
};
use guardian_core::{
  profile::{ModerationAction, ProfileEntry, ProfileRecord, Role},
  store::ProfileStore,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{AppState, GuardianStore, auth::AdminPrincipal, error::Error};

// ─── List ─────────────────────────────────────────────────────────────────────

pub async fn list<S: GuardianStore>(
  State(state): State<AppState<S>>,
  AdminPrincipal(_): AdminPrincipal,
) -> Result<Json<Vec<ProfileEntry>>, Error> {
  let entries = state.store.list_profiles().await.map_err(Error::store)?;
  Ok(Json(entries))
}

// ─── Moderate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ModerateBody {
  pub action: ModerationAction,
}

/// Apply a lifecycle action. `409` when the record's current status does
/// not allow it.
pub async fn moderate<S: GuardianStore>(
  State(state): State<AppState<S>>,
  AdminPrincipal(admin): AdminPrincipal,
  Path(id): Path<Uuid>,
  Json(body): Json<ModerateBody>,
) -> Result<Json<ProfileRecord>, Error> {
  let record = existing(&state, id).await?;
  let from   = record.effective_status();
  let to     = from.apply(body.action)?;

  let record = state.store.set_status(id, to).await.map_err(Error::store)?;
  info!(
    admin = %admin.principal_id,
    principal = %id,
    action = %body.action,
    %from,
    "profile moderated"
  );
  Ok(Json(record))
}

// ─── Role ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

pub async fn set_role<S: GuardianStore>(
  State(state): State<AppState<S>>,
  AdminPrincipal(admin): AdminPrincipal,
  Path(id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<ProfileRecord>, Error> {
  existing(&state, id).await?;
  let record = state.store.set_role(id, body.role).await.map_err(Error::store)?;
  info!(admin = %admin.principal_id, principal = %id, role = %body.role, "role changed");
  Ok(Json(record))
}

async fn existing<S: GuardianStore>(state: &AppState<S>, id: Uuid) -> Result<ProfileRecord, Error> {
  state
    .store
    .get(id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("no profile for {id}")))
}
