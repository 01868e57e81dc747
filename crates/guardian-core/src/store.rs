//! Storage traits for profile records and local accounts.
//!
//! Implemented by storage backends (e.g. `guardian-store-sqlite`). The gate
//! and the HTTP service depend on these abstractions, not on any concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  principal::Principal,
  profile::{AccountStatus, ProfileEntry, ProfileRecord, Role},
};

// ─── Account types ───────────────────────────────────────────────────────────

/// Input for [`AccountStore::create_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
  /// Already normalised with [`normalize_email`](crate::principal::normalize_email).
  pub email:         String,
  pub display_name:  Option<String>,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// A stored local account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub principal:     Principal,
  #[serde(skip_serializing)]
  pub password_hash: String,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Keyed profile records, one per principal.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tasks and multi-threaded runtimes.
pub trait ProfileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the record for `principal_id`. `None` if none has been created.
  fn get(
    &self,
    principal_id: Uuid,
  ) -> impl Future<Output = Result<Option<ProfileRecord>, Self::Error>> + Send + '_;

  /// Create a `new`, contact-less record. Returns the existing record
  /// unchanged if one is already present.
  fn create_profile(
    &self,
    principal_id: Uuid,
  ) -> impl Future<Output = Result<ProfileRecord, Self::Error>> + Send + '_;

  /// Set the contact, creating a `new` record first if none exists.
  fn complete_profile(
    &self,
    principal_id: Uuid,
    contact: String,
  ) -> impl Future<Output = Result<ProfileRecord, Self::Error>> + Send + '_;

  /// Overwrite the status. Fails if the record does not exist.
  fn set_status(
    &self,
    principal_id: Uuid,
    status: AccountStatus,
  ) -> impl Future<Output = Result<ProfileRecord, Self::Error>> + Send + '_;

  /// Overwrite the role. Fails if the record does not exist.
  fn set_role(
    &self,
    principal_id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<ProfileRecord, Self::Error>> + Send + '_;

  /// Every record, joined with its local account where there is one.
  fn list_profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<ProfileEntry>, Self::Error>> + Send + '_;
}

/// Email/password accounts backing local sign-in.
pub trait AccountStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new account under a fresh principal id. Fails if the email is
  /// already registered.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Principal, Self::Error>> + Send + '_;

  /// Look up an account by normalised email. `None` if not registered.
  fn find_account<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;
}
