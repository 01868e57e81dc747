//! The identity provider seen by the gate.

use std::{convert::Infallible, future::Future, sync::Arc};

use guardian_core::principal::Principal;
use tokio::sync::watch;

/// Source of "who is signed in right now".
///
/// The gate only observes principals and, for some denials, ends the session.
/// Sign-in itself happens elsewhere.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Subscribe to the current principal. The receiver starts out holding the
  /// present value; dropping it unsubscribes.
  fn subscribe(&self) -> watch::Receiver<Option<Principal>>;

  /// End the current session. Subscribers observe `None` afterwards.
  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// An in-process identity provider.
///
/// Cheap to clone; clones share the same session.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
  current: Arc<watch::Sender<Option<Principal>>>,
}

impl LocalIdentity {
  pub fn new() -> Self {
    let (current, _) = watch::channel(None);
    Self {
      current: Arc::new(current),
    }
  }

  /// Make `principal` the signed-in identity. Subscribers are only notified
  /// if this changes who is signed in.
  pub fn sign_in(&self, principal: Principal) {
    self.current.send_if_modified(|current| {
      if current.as_ref() == Some(&principal) {
        return false;
      }
      *current = Some(principal);
      true
    });
  }

  pub fn current(&self) -> Option<Principal> { self.current.borrow().clone() }
}

impl Default for LocalIdentity {
  fn default() -> Self { Self::new() }
}

impl IdentityProvider for LocalIdentity {
  type Error = Infallible;

  fn subscribe(&self) -> watch::Receiver<Option<Principal>> { self.current.subscribe() }

  async fn sign_out(&self) -> Result<(), Infallible> {
    self.current.send_if_modified(|current| current.take().is_some());
    Ok(())
  }
}
