//! The render contract between a gate and the view it guards.
//!
//! A guarded view renders exactly one of these four things.

use serde::Serialize;

use crate::rules::{DenialAction, NoticeKind, Route, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "render", rename_all = "snake_case")]
pub enum Render {
  /// Evaluation has not finished.
  Loading,
  /// Render the protected view.
  Content,
  Redirect {
    to: Route,
  },
  Notice {
    kind:         NoticeKind,
    message:      &'static str,
    seconds_left: u32,
    /// Fraction of the countdown remaining, `1.0` down to `0.0`.
    progress:     f32,
  },
}

impl Render {
  pub fn notice(kind: NoticeKind, seconds_left: u32) -> Self {
    let total = kind.duration_secs();
    Self::Notice {
      kind,
      message: kind.message(),
      seconds_left,
      progress: seconds_left as f32 / total as f32,
    }
  }

  /// What a fresh verdict renders as, with any notice at its full duration.
  pub fn from_verdict(verdict: &Verdict) -> Self {
    match verdict {
      Verdict::Allow => Self::Content,
      Verdict::Deny(denial) => match denial.action() {
        DenialAction::Redirect(to) => Self::Redirect { to },
        DenialAction::Notice(kind) => Self::notice(kind, kind.duration_secs()),
      },
    }
  }
}
