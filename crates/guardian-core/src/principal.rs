//! Principal: the authenticated identity the gate observes.
//!
//! Principals are owned by the identity provider. Nothing in this workspace
//! mutates one after sign-in; the gate only compares and reads them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// An authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub principal_id: Uuid,
  pub email:        String,
  #[serde(default)]
  pub display_name: Option<String>,
}

impl Principal {
  pub fn new(principal_id: Uuid, email: impl Into<String>) -> Self {
    Self {
      principal_id,
      email: email.into(),
      display_name: None,
    }
  }
}

/// Canonical form used for account lookups: trimmed and lowercased.
///
/// Rejects anything without exactly one `@` separating two non-empty halves.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  match email.split_once('@') {
    Some((local, domain))
      if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
    {
      Ok(email)
    }
    _ => Err(Error::MalformedEmail(raw.to_owned())),
  }
}
