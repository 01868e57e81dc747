//! Error types for `guardian-core`.

use thiserror::Error;

use crate::profile::{AccountStatus, ModerationAction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("cannot {action} an account whose status is {from}")]
  InvalidTransition {
    from:   AccountStatus,
    action: ModerationAction,
  },

  #[error("contact must not be blank")]
  BlankContact,

  #[error("email address is malformed: {0:?}")]
  MalformedEmail(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
