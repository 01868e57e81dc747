//! `GET /api/session`: evaluate the session gate for one request.
//!
//! The response is the [`Render`] the guarded view should show. Missing or
//! bad credentials are not an error here: they evaluate as "no session".

use axum::{
  Json,
  extract::{Query, State},
  http::{HeaderMap, header},
};
use guardian_core::{
  device::Viewport,
  render::Render,
  rules::{self, ProfileLookup, ViewAccess},
  store::ProfileStore,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{AppState, GuardianStore, auth::authenticate, error::Error};

/// Carries the client's layout width in CSS pixels.
pub const VIEWPORT_WIDTH_HEADER: &str = "x-viewport-width";

#[derive(Debug, Deserialize)]
pub struct SessionParams {
  #[serde(default)]
  pub view: ViewAccess,
}

pub async fn evaluate<S: GuardianStore>(
  State(state): State<AppState<S>>,
  Query(params): Query<SessionParams>,
  headers: HeaderMap,
) -> Result<Json<Render>, Error> {
  let view = params.view;

  let device = rules::check_device(view, viewport_from(&headers).as_ref());
  if !device.is_allow() {
    return Ok(Json(Render::from_verdict(&device)));
  }

  let principal = match authenticate(&headers, &*state.store).await {
    Ok(principal) => Some(principal),
    Err(Error::Unauthorized) => None,
    Err(e) => return Err(e),
  };

  let verdict = match &principal {
    None => rules::evaluate(None, ProfileLookup::Absent, view),
    Some(p) => match state.store.get(p.principal_id).await {
      Ok(record) => rules::evaluate(Some(p), record.as_ref().into(), view),
      Err(e) => {
        error!(error = %e, principal = %p.principal_id, "profile read failed");
        rules::evaluate(Some(p), ProfileLookup::Failed, view)
      }
    },
  };

  debug!(%view, allowed = verdict.is_allow(), "session evaluated");
  Ok(Json(Render::from_verdict(&verdict)))
}

/// Build the client's viewport from its `User-Agent` and width header.
///
/// A missing width classifies on the user agent alone. With neither header
/// there is nothing to go on and the device rule passes.
fn viewport_from(headers: &HeaderMap) -> Option<Viewport> {
  let user_agent = headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok());
  let width = headers
    .get(VIEWPORT_WIDTH_HEADER)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.trim().parse::<u32>().ok());

  match (user_agent, width) {
    (None, None) => None,
    (ua, width) => Some(Viewport::new(ua.unwrap_or_default(), width.unwrap_or(u32::MAX))),
  }
}
