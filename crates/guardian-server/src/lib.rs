//! HTTP service for the Guardian session gate.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`ProfileStore`] and [`AccountStore`]: account registration, profile
//! completion, stateless gate evaluation and the admin moderation endpoints.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | `POST` | `/api/accounts` | none |
//! | `GET`  | `/api/session?view=member\|admin\|admin-root` | optional |
//! | `GET`  | `/api/profile` | basic |
//! | `PUT`  | `/api/profile/contact` | basic |
//! | `GET`  | `/api/admin/profiles` | admin |
//! | `POST` | `/api/admin/profiles/{id}/moderate` | admin |
//! | `PUT`  | `/api/admin/profiles/{id}/role` | admin |

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use guardian_core::store::{AccountStore, ProfileStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{accounts, admin, profile, session};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GUARDIAN_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the service needs from storage.
pub trait GuardianStore: ProfileStore + AccountStore + Clone + 'static {}

impl<T> GuardianStore for T where T: ProfileStore + AccountStore + Clone + 'static {}

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store: Arc<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router<S: GuardianStore>(state: AppState<S>) -> Router {
  Router::new()
    .route("/api/accounts",                      post(accounts::register::<S>))
    .route("/api/session",                       get(session::evaluate::<S>))
    .route("/api/profile",                       get(profile::get_own::<S>))
    .route("/api/profile/contact",               put(profile::complete::<S>))
    .route("/api/admin/profiles",                get(admin::list::<S>))
    .route("/api/admin/profiles/{id}/moderate",  post(admin::moderate::<S>))
    .route("/api/admin/profiles/{id}/role",      put(admin::set_role::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
