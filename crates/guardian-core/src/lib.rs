//! Core types and the access rules for the Mangrove Guardian session gate.
//!
//! No async runtime, HTTP or database code lives here. The live gate
//! (`guardian-gate`), the SQLite store and the HTTP service build on it.

pub mod device;
pub mod error;
pub mod principal;
pub mod profile;
pub mod render;
pub mod rules;
pub mod store;

pub use error::{Error, Result};
pub use rules::{Denial, Verdict};
