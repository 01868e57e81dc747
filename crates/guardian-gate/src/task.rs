//! Owned handles for the gate's background tasks.

use std::future::Future;

use tokio::task::JoinHandle;

/// A spawned task that is aborted when its owner drops it.
#[derive(Debug)]
pub(crate) struct TaskGuard(Option<JoinHandle<()>>);

impl TaskGuard {
  pub(crate) fn spawn<F>(future: F) -> Self
  where
    F: Future<Output = ()> + Send + 'static,
  {
    Self(Some(tokio::spawn(future)))
  }

  /// Abort the task. Safe to call any number of times.
  pub(crate) fn cancel(&mut self) {
    if let Some(handle) = self.0.take() {
      handle.abort();
    }
  }
}

impl Drop for TaskGuard {
  fn drop(&mut self) { self.cancel(); }
}
