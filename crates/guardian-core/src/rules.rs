//! The gate's decision rules.
//!
//! Everything here is synchronous and pure: given the current principal, the
//! outcome of reading its profile, and the kind of view being opened, decide
//! whether to render it. The live gate and the HTTP service both call into
//! these functions so the policy exists exactly once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  device::{DeviceClass, Viewport},
  principal::Principal,
  profile::{AccountStatus, ProfileRecord, Role},
};

// ─── Targets ─────────────────────────────────────────────────────────────────

/// Where a denied visitor is sent.
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Route {
  Login,
  CompleteProfile,
  PendingApproval,
  Home,
}

/// A timed denial screen shown before redirecting.
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NoticeKind {
  Disabled,
  Forbidden,
  MobileUnsupported,
  Unverifiable,
}

impl NoticeKind {
  /// Seconds the notice stays on screen.
  pub const fn duration_secs(self) -> u32 {
    match self {
      Self::Disabled | Self::Unverifiable => 3,
      Self::Forbidden | Self::MobileUnsupported => 10,
    }
  }

  /// Where the notice redirects once its countdown runs out.
  pub const fn successor(self) -> Route {
    match self {
      Self::Disabled | Self::Unverifiable => Route::Login,
      Self::Forbidden | Self::MobileUnsupported => Route::Home,
    }
  }

  /// Whether the session is ended when the notice expires. Notices that only
  /// deny the current view leave the session alone.
  pub const fn signs_out(self) -> bool {
    matches!(self, Self::Disabled | Self::Unverifiable)
  }

  pub const fn message(self) -> &'static str {
    match self {
      Self::Disabled => {
        "Your account has been disabled. Contact an administrator for help."
      }
      Self::Forbidden => "You do not have permission to view this page.",
      Self::MobileUnsupported => {
        "The admin panel is only available on a desktop browser."
      }
      Self::Unverifiable => {
        "Your account status could not be verified. Please sign in again."
      }
    }
  }
}

/// How much a view demands of its visitor.
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ViewAccess {
  /// Any enabled account with a completed profile.
  #[default]
  Member,
  /// Enabled administrators only.
  Admin,
  /// The admin panel's landing view: admin rules, plus desktop only.
  AdminRoot,
}

impl ViewAccess {
  pub const fn requires_admin(self) -> bool {
    matches!(self, Self::Admin | Self::AdminRoot)
  }

  pub const fn checks_device(self) -> bool { matches!(self, Self::AdminRoot) }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Why a view was refused. The display text is what the visitor is told.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
  #[error("not signed in")]
  NoSession,
  #[error("profile is incomplete")]
  IncompleteProfile,
  #[error("account is awaiting approval")]
  Pending,
  #[error("account is disabled")]
  Blocked,
  #[error("administrator role required")]
  Forbidden,
  #[error("account status {0:?} is not recognised")]
  UnrecognizedStatus(String),
  #[error("profile could not be read")]
  ProfileUnreadable,
  #[error("device is not supported for this view")]
  UnsupportedDevice,
}

/// What the visitor sees in place of a refused view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialAction {
  Redirect(Route),
  Notice(NoticeKind),
}

impl Denial {
  pub fn action(&self) -> DenialAction {
    use DenialAction::*;
    match self {
      Self::NoSession | Self::ProfileUnreadable => Redirect(Route::Login),
      Self::IncompleteProfile => Redirect(Route::CompleteProfile),
      Self::Pending => Redirect(Route::PendingApproval),
      Self::Blocked => Notice(NoticeKind::Disabled),
      Self::Forbidden => Notice(NoticeKind::Forbidden),
      Self::UnrecognizedStatus(_) => Notice(NoticeKind::Unverifiable),
      Self::UnsupportedDevice => Notice(NoticeKind::MobileUnsupported),
    }
  }

  /// Denials that point at a fault rather than an ordinary state of the
  /// account; these are worth a log line at warning level or above.
  pub fn is_fault(&self) -> bool {
    matches!(self, Self::UnrecognizedStatus(_) | Self::ProfileUnreadable)
  }
}

/// The result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Allow,
  Deny(Denial),
}

impl Verdict {
  pub fn is_allow(&self) -> bool { matches!(self, Self::Allow) }
}

/// The outcome of reading a principal's profile.
#[derive(Debug, Clone, Copy)]
pub enum ProfileLookup<'a> {
  Found(&'a ProfileRecord),
  Absent,
  Failed,
}

impl<'a> From<Option<&'a ProfileRecord>> for ProfileLookup<'a> {
  fn from(record: Option<&'a ProfileRecord>) -> Self {
    record.map_or(Self::Absent, Self::Found)
  }
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// The device rule. Only views that check the device can be refused here,
/// and a missing viewport is never refused.
pub fn check_device(access: ViewAccess, viewport: Option<&Viewport>) -> Verdict {
  match viewport {
    Some(vp) if access.checks_device() && vp.classify() == DeviceClass::Mobile => {
      Verdict::Deny(Denial::UnsupportedDevice)
    }
    _ => Verdict::Allow,
  }
}

/// Decide a view for `principal`, given what reading its profile produced.
pub fn evaluate(
  principal: Option<&Principal>,
  lookup: ProfileLookup<'_>,
  access: ViewAccess,
) -> Verdict {
  if principal.is_none() {
    return Verdict::Deny(Denial::NoSession);
  }
  match lookup {
    ProfileLookup::Found(record) => evaluate_profile(record, access),
    ProfileLookup::Absent => Verdict::Deny(Denial::IncompleteProfile),
    ProfileLookup::Failed => Verdict::Deny(Denial::ProfileUnreadable),
  }
}

/// Decide a view for a signed-in principal whose profile was read.
pub fn evaluate_profile(record: &ProfileRecord, access: ViewAccess) -> Verdict {
  if !record.has_contact() {
    return Verdict::Deny(Denial::IncompleteProfile);
  }
  match record.effective_status() {
    AccountStatus::New => Verdict::Deny(Denial::Pending),
    AccountStatus::Disabled => Verdict::Deny(Denial::Blocked),
    AccountStatus::Unrecognized(raw) => {
      Verdict::Deny(Denial::UnrecognizedStatus(raw))
    }
    AccountStatus::Enabled => {
      if access.requires_admin() && record.effective_role() != Role::Admin {
        Verdict::Deny(Denial::Forbidden)
      } else {
        Verdict::Allow
      }
    }
  }
}
