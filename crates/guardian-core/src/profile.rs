//! Profile records and the moderation lifecycle of an account.
//!
//! A record holds the three fields the gate cares about. Every field may be
//! missing in storage; the defaulting rules live here and nowhere else.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of an account.
///
/// Stored as free text, so a record can carry a value this build does not
/// know about. That value is preserved verbatim in [`Unrecognized`] rather
/// than coerced into one of the known states.
///
/// [`Unrecognized`]: AccountStatus::Unrecognized
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
  /// Registered, awaiting administrator approval.
  New,
  Enabled,
  /// Blocked by an administrator.
  Disabled,
  Unrecognized(String),
}

impl AccountStatus {
  pub fn as_str(&self) -> &str {
    match self {
      Self::New => "new",
      Self::Enabled => "enabled",
      Self::Disabled => "disabled",
      Self::Unrecognized(raw) => raw,
    }
  }

  /// Apply an administrator's moderation action.
  pub fn apply(&self, action: ModerationAction) -> Result<AccountStatus> {
    use AccountStatus::*;
    use ModerationAction::*;

    match (self, action) {
      (New, Approve) => Ok(Enabled),
      (Enabled | Unrecognized(_), Disable) => Ok(Disabled),
      (Disabled | Unrecognized(_), Enable) => Ok(Enabled),
      (from, action) => Err(Error::InvalidTransition {
        from: from.clone(),
        action,
      }),
    }
  }
}

impl From<&str> for AccountStatus {
  fn from(raw: &str) -> Self {
    match raw {
      "new" => Self::New,
      "enabled" => Self::Enabled,
      "disabled" => Self::Disabled,
      other => Self::Unrecognized(other.to_owned()),
    }
  }
}

impl From<String> for AccountStatus {
  fn from(raw: String) -> Self { Self::from(raw.as_str()) }
}

impl From<AccountStatus> for String {
  fn from(status: AccountStatus) -> Self {
    match status {
      AccountStatus::Unrecognized(raw) => raw,
      known => known.as_str().to_owned(),
    }
  }
}

impl fmt::Display for AccountStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An administrator's action on an account's status.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModerationAction {
  /// `new -> enabled`
  Approve,
  /// `enabled -> disabled`
  Disable,
  /// `disabled -> enabled`
  Enable,
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  #[default]
  User,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// The per-principal application record read by the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
  #[serde(default)]
  pub contact: Option<String>,
  #[serde(default)]
  pub status:  Option<AccountStatus>,
  #[serde(default)]
  pub role:    Option<Role>,
}

impl ProfileRecord {
  /// The status the gate acts on. A record with no status at all is enabled.
  pub fn effective_status(&self) -> AccountStatus {
    self.status.clone().unwrap_or(AccountStatus::Enabled)
  }

  /// The role the gate acts on. A record with no role is a plain user.
  pub fn effective_role(&self) -> Role { self.role.unwrap_or_default() }

  /// Whether profile completion has supplied a contact.
  pub fn has_contact(&self) -> bool {
    self
      .contact
      .as_deref()
      .is_some_and(|c| !c.trim().is_empty())
  }
}

/// A record joined with its account details, as listed to administrators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
  pub principal_id: Uuid,
  /// `None` for principals with no local account (e.g. federated sign-in).
  pub email:        Option<String>,
  pub display_name: Option<String>,
  pub record:       ProfileRecord,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}
