//! Device classification for views that refuse to run on phones.

use serde::{Deserialize, Serialize};

/// Viewports narrower than this are treated as mobile.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

/// User-agent fragments that identify a mobile device. Matched
/// case-insensitively anywhere in the string.
pub const MOBILE_UA_TOKENS: &[&str] = &[
  "android",
  "webos",
  "iphone",
  "ipad",
  "ipod",
  "blackberry",
  "iemobile",
  "opera mini",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
  Mobile,
  Desktop,
}

/// What the client reports about where it is rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
  pub user_agent: String,
  pub width_px:   u32,
}

impl Viewport {
  pub fn new(user_agent: impl Into<String>, width_px: u32) -> Self {
    Self {
      user_agent: user_agent.into(),
      width_px,
    }
  }

  pub fn classify(&self) -> DeviceClass {
    let ua = self.user_agent.to_lowercase();
    let mobile_agent = MOBILE_UA_TOKENS.iter().any(|t| ua.contains(t));
    if mobile_agent || self.width_px < MOBILE_BREAKPOINT_PX {
      DeviceClass::Mobile
    } else {
      DeviceClass::Desktop
    }
  }
}
