//! Session gate state machine and its driver.

use std::sync::Arc;

use guardian_core::{
  Denial, Verdict,
  device::Viewport,
  principal::Principal,
  profile::ProfileRecord,
  render::Render,
  rules::{self, DenialAction, NoticeKind, ProfileLookup, Route, ViewAccess},
  store::ProfileStore,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{identity::IdentityProvider, notice::Countdown, task::TaskGuard};

// ─── Events ──────────────────────────────────────────────────────────────────

/// Everything that can move the gate. Applied strictly one at a time.
#[derive(Debug)]
pub(crate) enum Event {
  /// The identity provider reported a new current principal.
  Identity(Option<Principal>),
  /// A profile read finished. `epoch` is the identity epoch it was started in.
  Profile {
    epoch:  u64,
    result: Result<Option<ProfileRecord>, String>,
  },
  /// One second of notice `notice` has elapsed.
  Tick { notice: u64 },
  /// Notice `notice` has counted down to zero.
  Expired { notice: u64 },
  Viewport(Viewport),
}

// ─── State ───────────────────────────────────────────────────────────────────

/// The gate's current decision. Background work belonging to a state lives
/// inside its variant and is aborted when the variant is replaced.
#[derive(Debug)]
pub(crate) enum GateState {
  Loading {
    /// The in-flight profile read, if one has been started.
    fetch: Option<TaskGuard>,
  },
  Allow,
  Redirect(Route),
  Notice(Countdown),
}

impl GateState {
  fn render(&self) -> Render {
    match self {
      Self::Loading { .. } => Render::Loading,
      Self::Allow => Render::Content,
      Self::Redirect(to) => Render::Redirect { to: *to },
      Self::Notice(countdown) => countdown.render(),
    }
  }
}

/// What the event sources produced, resolved before any state is touched.
enum Next {
  Event(Event),
  IdentityClosed,
  ViewportClosed,
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Guards one view.
///
/// Build it, optionally attach a viewport feed, then either [`spawn`] it or
/// drive it yourself with [`run`]. The gate publishes every change of its
/// [`Render`] on a watch channel.
///
/// [`spawn`]: SessionGate::spawn
/// [`run`]: SessionGate::run
pub struct SessionGate<I, P>
where
  I: IdentityProvider + 'static,
  P: ProfileStore + 'static,
{
  access:         ViewAccess,
  identity:       Arc<I>,
  profiles:       Arc<P>,
  identity_rx:    Option<watch::Receiver<Option<Principal>>>,
  viewport_rx:    Option<watch::Receiver<Viewport>>,
  events_tx:      mpsc::UnboundedSender<Event>,
  events_rx:      mpsc::UnboundedReceiver<Event>,
  state:          GateState,
  principal:      Option<Principal>,
  /// Bumped on every identity change; profile reads tagged with an older
  /// epoch are stale.
  epoch:          u64,
  notices:        u64,
  /// Set once the device rule has refused the view. Session checks are off
  /// for the rest of the gate's life.
  device_blocked: bool,
  render_tx:      watch::Sender<Render>,
}

impl<I, P> SessionGate<I, P>
where
  I: IdentityProvider + 'static,
  P: ProfileStore + 'static,
{
  pub fn new(access: ViewAccess, identity: Arc<I>, profiles: Arc<P>) -> Self {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (render_tx, _) = watch::channel(Render::Loading);
    Self {
      access,
      identity,
      profiles,
      identity_rx: None,
      viewport_rx: None,
      events_tx,
      events_rx,
      state: GateState::Loading { fetch: None },
      principal: None,
      epoch: 0,
      notices: 0,
      device_blocked: false,
      render_tx,
    }
  }

  /// Feed the gate the client's viewport. Only consulted by views that check
  /// the device; every update is re-classified.
  pub fn with_viewport(mut self, viewport: watch::Receiver<Viewport>) -> Self {
    self.viewport_rx = Some(viewport);
    self
  }

  /// What the guarded view should show right now.
  pub fn render(&self) -> Render { self.state.render() }

  /// Subscribe to render updates.
  pub fn renders(&self) -> watch::Receiver<Render> { self.render_tx.subscribe() }

  /// Drive the gate on the current task until it is dropped.
  pub async fn run(mut self) {
    self.start();
    loop {
      let event = self.next_event().await;
      self.apply(event).await;
    }
  }

  /// Drive the gate on its own task. Dropping the returned handle tears the
  /// gate down.
  pub fn spawn(self) -> GateHandle {
    let renders = self.renders();
    GateHandle {
      renders,
      _driver: TaskGuard::spawn(self.run()),
    }
  }

  // ── Evaluation cycle ──────────────────────────────────────────────────────

  /// Run the device rule and, if it passes, subscribe to the identity
  /// provider and evaluate the current principal.
  pub(crate) fn start(&mut self) {
    if let Some(rx) = self.viewport_rx.as_mut() {
      let viewport = rx.borrow_and_update().clone();
      let verdict  = rules::check_device(self.access, Some(&viewport));
      if !verdict.is_allow() {
        self.block_device(verdict);
        self.publish();
        return;
      }
    }

    let mut rx  = self.identity.subscribe();
    let current = rx.borrow_and_update().clone();
    self.identity_rx = Some(rx);
    self.on_identity(current);
    self.publish();
  }

  /// Wait for the next event. Identity and viewport changes win over queued
  /// internal events, so a result queued for a superseded principal is
  /// only seen after the epoch has moved on.
  pub(crate) async fn next_event(&mut self) -> Event {
    loop {
      let next = tokio::select! {
        biased;
        changed = watch_next(&mut self.identity_rx) => match changed {
          Some(principal) => Next::Event(Event::Identity(principal)),
          None => Next::IdentityClosed,
        },
        changed = watch_next(&mut self.viewport_rx) => match changed {
          Some(viewport) => Next::Event(Event::Viewport(viewport)),
          None => Next::ViewportClosed,
        },
        Some(event) = self.events_rx.recv() => Next::Event(event),
      };

      match next {
        Next::Event(event) => return event,
        Next::IdentityClosed => {
          warn!("identity provider closed its stream, treating as signed out");
          self.identity_rx = None;
          return Event::Identity(None);
        }
        Next::ViewportClosed => {
          debug!("viewport feed closed");
          self.viewport_rx = None;
        }
      }
    }
  }

  pub(crate) async fn apply(&mut self, event: Event) {
    match event {
      Event::Identity(principal) => self.on_identity(principal),
      Event::Profile { epoch, result } => self.on_profile(epoch, result),
      Event::Tick { notice } => self.on_tick(notice),
      Event::Expired { notice } => self.on_expired(notice).await,
      Event::Viewport(viewport) => self.on_viewport(viewport),
    }
    self.publish();
  }

  fn on_identity(&mut self, principal: Option<Principal>) {
    self.epoch += 1;
    match principal {
      None => {
        self.principal = None;
        self.settle(Verdict::Deny(Denial::NoSession));
      }
      Some(principal) => {
        debug!(principal = %principal.principal_id, "identity changed, reading profile");
        let fetch = self.spawn_fetch(principal.principal_id);
        self.principal = Some(principal);
        self.state = GateState::Loading { fetch: Some(fetch) };
      }
    }
  }

  fn spawn_fetch(&self, principal_id: Uuid) -> TaskGuard {
    let profiles = Arc::clone(&self.profiles);
    let events   = self.events_tx.clone();
    let epoch    = self.epoch;
    TaskGuard::spawn(async move {
      let result = profiles.get(principal_id).await.map_err(|e| e.to_string());
      events.send(Event::Profile { epoch, result }).ok();
    })
  }

  fn on_profile(&mut self, epoch: u64, result: Result<Option<ProfileRecord>, String>) {
    if epoch != self.epoch || !matches!(self.state, GateState::Loading { .. }) {
      debug!(epoch, current = self.epoch, "discarding stale profile read");
      return;
    }

    let verdict = match &result {
      Ok(record) => {
        rules::evaluate(self.principal.as_ref(), record.as_ref().into(), self.access)
      }
      Err(e) => {
        error!(error = %e, "profile read failed");
        rules::evaluate(self.principal.as_ref(), ProfileLookup::Failed, self.access)
      }
    };
    self.settle(verdict);
  }

  fn on_tick(&mut self, notice: u64) {
    let GateState::Notice(countdown) = &mut self.state else {
      return;
    };
    if countdown.id() != notice {
      return;
    }
    if countdown.tick() {
      self.events_tx.send(Event::Expired { notice }).ok();
    }
  }

  async fn on_expired(&mut self, notice: u64) {
    let kind = match &self.state {
      GateState::Notice(countdown) if countdown.id() == notice => countdown.kind(),
      _ => return,
    };

    if kind.signs_out() {
      info!(%kind, "notice expired, signing out");
      if let Err(e) = self.identity.sign_out().await {
        warn!(error = %e, "sign-out failed");
      }
    }
    info!(%kind, to = %kind.successor(), "notice expired, redirecting");
    self.state = GateState::Redirect(kind.successor());
  }

  fn on_viewport(&mut self, viewport: Viewport) {
    if self.device_blocked {
      return;
    }
    let verdict = rules::check_device(self.access, Some(&viewport));
    if !verdict.is_allow() {
      info!(width = viewport.width_px, "viewport is now mobile");
      self.block_device(verdict);
    }
  }

  /// Refuse the view on device grounds. Drops the identity subscription and
  /// invalidates any profile read in flight.
  fn block_device(&mut self, verdict: Verdict) {
    self.device_blocked = true;
    self.identity_rx = None;
    self.principal = None;
    self.epoch += 1;
    self.settle(verdict);
  }

  /// Replace the state with the outcome of `verdict`.
  fn settle(&mut self, verdict: Verdict) {
    self.state = match verdict {
      Verdict::Allow => {
        debug!(view = %self.access, "view allowed");
        GateState::Allow
      }
      Verdict::Deny(denial) => {
        if denial.is_fault() {
          warn!(view = %self.access, %denial, "view denied");
        } else {
          debug!(view = %self.access, %denial, "view denied");
        }
        match denial.action() {
          DenialAction::Redirect(route) => GateState::Redirect(route),
          DenialAction::Notice(kind) => GateState::Notice(self.begin_notice(kind)),
        }
      }
    };
  }

  fn begin_notice(&mut self, kind: NoticeKind) -> Countdown {
    self.notices += 1;
    info!(%kind, seconds = kind.duration_secs(), "showing notice");
    Countdown::start(self.notices, kind, self.events_tx.clone())
  }

  fn publish(&self) {
    let next = self.state.render();
    self.render_tx.send_if_modified(|current| {
      if *current == next {
        return false;
      }
      *current = next;
      true
    });
  }

  #[cfg(test)]
  pub(crate) fn pending_event(&mut self) -> Option<Event> { self.events_rx.try_recv().ok() }
}

/// Wait for the next value on an optional watch receiver. Pends forever when
/// there is no receiver; yields `None` once the sender is gone.
async fn watch_next<T: Clone>(rx: &mut Option<watch::Receiver<T>>) -> Option<T> {
  match rx {
    Some(rx) => match rx.changed().await {
      Ok(()) => Some(rx.borrow_and_update().clone()),
      Err(_) => None,
    },
    None => std::future::pending().await,
  }
}

// ─── Handle ──────────────────────────────────────────────────────────────────

/// A spawned gate. Dropping the handle tears the gate down: the driver, its
/// countdown and any profile read are aborted, and no further render is
/// published.
pub struct GateHandle {
  renders: watch::Receiver<Render>,
  _driver: TaskGuard,
}

impl GateHandle {
  pub fn current(&self) -> Render { self.renders.borrow().clone() }

  /// An independent receiver for render updates.
  pub fn renders(&self) -> watch::Receiver<Render> { self.renders.clone() }

  /// Wait for the next render. `None` once the gate has stopped.
  pub async fn changed(&mut self) -> Option<Render> {
    self.renders.changed().await.ok()?;
    Some(self.renders.borrow_and_update().clone())
  }
}
