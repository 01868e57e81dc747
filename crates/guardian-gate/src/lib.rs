//! The live session gate.
//!
//! A [`SessionGate`] guards one view. It listens to an [`IdentityProvider`],
//! reads the signed-in principal's profile from a
//! [`ProfileStore`](guardian_core::store::ProfileStore), applies the rules in
//! [`guardian_core::rules`], and publishes a
//! [`Render`](guardian_core::render::Render) for the view to show. Timed
//! notices count down on their own and redirect when they run out.

mod gate;
mod notice;
mod task;

pub mod identity;

pub use gate::{GateHandle, SessionGate};
pub use identity::{IdentityProvider, LocalIdentity};

#[cfg(test)]
mod tests;
