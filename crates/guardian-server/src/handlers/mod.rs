//! Request handlers, one module per resource.

pub mod accounts;
pub mod admin;
pub mod profile;
pub mod session;
