//! HTTP Basic-auth against the account store, plus the extractors built on it.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use guardian_core::{
  Verdict,
  principal::{Principal, normalize_email},
  rules::{self, ProfileLookup, ViewAccess},
  store::{AccountStore, ProfileStore},
};
use rand_core::OsRng;

use crate::{AppState, GuardianStore, error::Error};

/// The signed-in principal of an authenticated request.
pub struct Authenticated(pub Principal);

/// An authenticated principal whose profile passes the admin-view rules.
pub struct AdminPrincipal(pub Principal);

/// Split a `Basic` authorization header into `(email, password)`.
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok((email.to_owned(), password.to_owned()))
}

/// Resolve the request's credentials to a principal.
///
/// Anything short of a known account with a matching password is
/// [`Error::Unauthorized`]; only store failures surface as something else.
pub async fn authenticate<S>(headers: &HeaderMap, store: &S) -> Result<Principal, Error>
where
  S: AccountStore,
{
  let (email, password) = basic_credentials(headers)?;
  let email = normalize_email(&email).map_err(|_| Error::Unauthorized)?;

  let account = store
    .find_account(&email)
    .await
    .map_err(Error::store)?
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(account.principal)
}

/// Produce an argon2 PHC string for `password` with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| Error::PasswordHash(e.to_string()))?
      .to_string(),
  )
}

impl<S: GuardianStore> FromRequestParts<AppState<S>> for Authenticated {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let principal = authenticate(&parts.headers, &*state.store).await?;
    Ok(Authenticated(principal))
  }
}

impl<S: GuardianStore> FromRequestParts<AppState<S>> for AdminPrincipal {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let principal = authenticate(&parts.headers, &*state.store).await?;

    let record = state.store.get(principal.principal_id).await;
    let verdict = match &record {
      Ok(record) => rules::evaluate(Some(&principal), record.as_ref().into(), ViewAccess::Admin),
      Err(e) => {
        tracing::error!(error = %e, principal = %principal.principal_id, "profile read failed");
        rules::evaluate(Some(&principal), ProfileLookup::Failed, ViewAccess::Admin)
      }
    };

    match verdict {
      Verdict::Allow => Ok(AdminPrincipal(principal)),
      Verdict::Deny(denial) => {
        tracing::info!(principal = %principal.principal_id, %denial, "admin request refused");
        Err(Error::Forbidden(denial))
      }
    }
  }
}
