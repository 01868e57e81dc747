//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings and UUIDs are hyphenated lowercase
//! strings. Status and role are stored as their lowercase names.

use chrono::{DateTime, Utc};
use guardian_core::{
  principal::Principal,
  profile::{AccountStatus, ProfileEntry, ProfileRecord, Role},
  store::Account,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Status and role ──────────────────────────────────────────────────────────

pub fn encode_status(status: &AccountStatus) -> String { status.as_str().to_owned() }

/// Unknown strings survive as [`AccountStatus::Unrecognized`].
pub fn decode_status(s: Option<String>) -> Option<AccountStatus> {
  s.map(AccountStatus::from)
}

pub fn encode_role(role: Role) -> String { role.to_string() }

/// A stored role this build cannot parse is dropped, which reads as `user`.
pub fn decode_role(s: Option<String>) -> Option<Role> {
  s.and_then(|r| r.parse().ok())
}

// ─── Raw rows ─────────────────────────────────────────────────────────────────

pub struct RawProfile {
  pub contact: Option<String>,
  pub status:  Option<String>,
  pub role:    Option<String>,
}

impl RawProfile {
  pub fn into_record(self) -> ProfileRecord {
    ProfileRecord {
      contact: self.contact,
      status:  decode_status(self.status),
      role:    decode_role(self.role),
    }
  }
}

pub struct RawProfileEntry {
  pub principal_id: String,
  pub email:        Option<String>,
  pub display_name: Option<String>,
  pub profile:      RawProfile,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawProfileEntry {
  pub fn into_entry(self) -> Result<ProfileEntry> {
    Ok(ProfileEntry {
      principal_id: decode_uuid(&self.principal_id)?,
      email:        self.email,
      display_name: self.display_name,
      record:       self.profile.into_record(),
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAccount {
  pub principal_id:  String,
  pub email:         String,
  pub display_name:  Option<String>,
  pub password_hash: String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      principal:     Principal {
        principal_id: decode_uuid(&self.principal_id)?,
        email:        self.email,
        display_name: self.display_name,
      },
      password_hash: self.password_hash,
    })
  }
}
