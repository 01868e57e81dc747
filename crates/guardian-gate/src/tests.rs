//! Behavioural tests for `SessionGate`, run on tokio's paused clock.

use std::{
  collections::HashMap,
  convert::Infallible,
  io,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use guardian_core::{
  device::Viewport,
  principal::Principal,
  profile::{AccountStatus, ProfileEntry, ProfileRecord, Role},
  render::Render,
  rules::{NoticeKind, Route, ViewAccess},
  store::ProfileStore,
};
use tokio::{
  sync::{Notify, watch},
  time::Instant,
};
use uuid::Uuid;

use crate::{
  IdentityProvider, LocalIdentity, SessionGate,
  gate::Event,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// A local identity that counts how the gate uses it.
#[derive(Default)]
struct RecordingIdentity {
  inner:      LocalIdentity,
  subscribes: AtomicUsize,
  sign_outs:  AtomicUsize,
}

impl RecordingIdentity {
  fn sign_outs(&self) -> usize { self.sign_outs.load(Ordering::SeqCst) }

  fn subscribes(&self) -> usize { self.subscribes.load(Ordering::SeqCst) }
}

impl IdentityProvider for RecordingIdentity {
  type Error = Infallible;

  fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
    self.subscribes.fetch_add(1, Ordering::SeqCst);
    self.inner.subscribe()
  }

  async fn sign_out(&self) -> Result<(), Infallible> {
    self.sign_outs.fetch_add(1, Ordering::SeqCst);
    self.inner.sign_out().await
  }
}

/// An identity provider whose stream is already closed.
struct DetachedIdentity(Principal);

impl IdentityProvider for DetachedIdentity {
  type Error = Infallible;

  fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
    let (tx, rx) = watch::channel(Some(self.0.clone()));
    drop(tx);
    rx
  }

  async fn sign_out(&self) -> Result<(), Infallible> { Ok(()) }
}

/// An in-memory profile store with switchable failure and per-principal
/// holds that keep a read pending until released.
#[derive(Default)]
struct FakeProfiles {
  records: Mutex<HashMap<Uuid, ProfileRecord>>,
  held:    Mutex<HashMap<Uuid, Arc<Notify>>>,
  failing: AtomicBool,
  reads:   AtomicUsize,
}

impl FakeProfiles {
  fn insert(&self, id: Uuid, record: ProfileRecord) {
    self.records.lock().unwrap().insert(id, record);
  }

  fn hold(&self, id: Uuid) -> Arc<Notify> {
    let notify = Arc::new(Notify::new());
    self.held.lock().unwrap().insert(id, Arc::clone(&notify));
    notify
  }

  fn reads(&self) -> usize { self.reads.load(Ordering::SeqCst) }
}

impl ProfileStore for FakeProfiles {
  type Error = io::Error;

  async fn get(&self, principal_id: Uuid) -> Result<Option<ProfileRecord>, io::Error> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    let hold = self.held.lock().unwrap().get(&principal_id).cloned();
    if let Some(notify) = hold {
      notify.notified().await;
    }
    if self.failing.load(Ordering::SeqCst) {
      return Err(io::Error::other("profile backend unavailable"));
    }
    Ok(self.records.lock().unwrap().get(&principal_id).cloned())
  }

  async fn create_profile(&self, _: Uuid) -> Result<ProfileRecord, io::Error> {
    unimplemented!()
  }

  async fn complete_profile(&self, _: Uuid, _: String) -> Result<ProfileRecord, io::Error> {
    unimplemented!()
  }

  async fn set_status(&self, _: Uuid, _: AccountStatus) -> Result<ProfileRecord, io::Error> {
    unimplemented!()
  }

  async fn set_role(&self, _: Uuid, _: Role) -> Result<ProfileRecord, io::Error> {
    unimplemented!()
  }

  async fn list_profiles(&self) -> Result<Vec<ProfileEntry>, io::Error> {
    unimplemented!()
  }
}

type TestGate = SessionGate<RecordingIdentity, FakeProfiles>;

const DESKTOP_UA: &str =
  "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

fn principal(email: &str) -> Principal { Principal::new(Uuid::new_v4(), email) }

fn record(contact: &str, status: Option<&str>, role: Option<Role>) -> ProfileRecord {
  ProfileRecord {
    contact: Some(contact.to_owned()),
    status: status.map(AccountStatus::from),
    role,
  }
}

/// A gate whose identity has a principal signed in with `profile` stored.
fn signed_in(
  access: ViewAccess,
  profile: Option<ProfileRecord>,
) -> (TestGate, Arc<RecordingIdentity>, Arc<FakeProfiles>) {
  let identity = Arc::new(RecordingIdentity::default());
  let profiles = Arc::new(FakeProfiles::default());
  let p = principal("ranger@mangrove.org");
  if let Some(profile) = profile {
    profiles.insert(p.principal_id, profile);
  }
  identity.inner.sign_in(p);
  let gate = SessionGate::new(access, Arc::clone(&identity), Arc::clone(&profiles));
  (gate, identity, profiles)
}

async fn step<I, P>(gate: &mut SessionGate<I, P>) -> Render
where
  I: IdentityProvider + 'static,
  P: ProfileStore + 'static,
{
  let event = gate.next_event().await;
  gate.apply(event).await;
  gate.render()
}

/// Start the gate and step until the first decision after loading.
async fn settle<I, P>(gate: &mut SessionGate<I, P>) -> Render
where
  I: IdentityProvider + 'static,
  P: ProfileStore + 'static,
{
  gate.start();
  let mut render = gate.render();
  while render == Render::Loading {
    render = step(gate).await;
  }
  render
}

/// Step through a running notice, returning every `seconds_left` observed
/// (starting with the current one) and the render that followed.
async fn count_down<I, P>(gate: &mut SessionGate<I, P>) -> (Vec<u32>, Render)
where
  I: IdentityProvider + 'static,
  P: ProfileStore + 'static,
{
  let mut seen   = Vec::new();
  let mut render = gate.render();
  while let Render::Notice { seconds_left, .. } = render {
    seen.push(seconds_left);
    render = step(gate).await;
  }
  (seen, render)
}

fn assert_elapsed(started: Instant, secs: u64) {
  let elapsed = started.elapsed();
  assert!(
    elapsed >= Duration::from_secs(secs)
      && elapsed < Duration::from_secs(secs) + Duration::from_millis(100),
    "expected ~{secs}s, got {elapsed:?}"
  );
}

// ─── Silent redirects ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn no_principal_redirects_to_login_without_reading() {
  let identity = Arc::new(RecordingIdentity::default());
  let profiles = Arc::new(FakeProfiles::default());
  let mut gate = SessionGate::new(ViewAccess::Member, identity, Arc::clone(&profiles));

  gate.start();
  assert_eq!(gate.render(), Render::Redirect { to: Route::Login });
  assert_eq!(profiles.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_contact_redirects_to_complete_profile() {
  let (mut gate, ..) =
    signed_in(ViewAccess::Member, Some(record("", Some("enabled"), None)));

  gate.start();
  assert_eq!(gate.render(), Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::CompleteProfile });
}

#[tokio::test(start_paused = true)]
async fn missing_record_redirects_to_complete_profile() {
  let (mut gate, ..) = signed_in(ViewAccess::Member, None);
  assert_eq!(settle(&mut gate).await, Render::Redirect { to: Route::CompleteProfile });
}

#[tokio::test(start_paused = true)]
async fn new_account_redirects_to_pending() {
  let (mut gate, ..) =
    signed_in(ViewAccess::Member, Some(record("555-1234", Some("new"), None)));
  assert_eq!(settle(&mut gate).await, Render::Redirect { to: Route::PendingApproval });
}

#[tokio::test(start_paused = true)]
async fn read_failure_redirects_to_login_without_sign_out() {
  let (mut gate, identity, profiles) =
    signed_in(ViewAccess::Member, Some(record("x", Some("enabled"), None)));
  profiles.failing.store(true, Ordering::SeqCst);

  assert_eq!(settle(&mut gate).await, Render::Redirect { to: Route::Login });
  assert_eq!(identity.sign_outs(), 0);
}

// ─── Allow ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn admin_is_allowed_on_admin_view() {
  let (mut gate, ..) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::Admin))));
  assert_eq!(settle(&mut gate).await, Render::Content);
}

#[tokio::test(start_paused = true)]
async fn absent_status_behaves_like_enabled() {
  for access in [ViewAccess::Member, ViewAccess::Admin] {
    for role in [None, Some(Role::User), Some(Role::Admin)] {
      let (mut absent, ..)  = signed_in(access, Some(record("x", None, role)));
      let (mut enabled, ..) = signed_in(access, Some(record("x", Some("enabled"), role)));
      assert_eq!(
        settle(&mut absent).await,
        settle(&mut enabled).await,
        "view {access}, role {role:?}"
      );
    }
  }
}

#[tokio::test(start_paused = true)]
async fn sign_out_after_allow_redirects_within_one_cycle() {
  let (mut gate, identity, profiles) =
    signed_in(ViewAccess::Member, Some(record("x", Some("enabled"), None)));
  assert_eq!(settle(&mut gate).await, Render::Content);

  identity.inner.sign_out().await.unwrap();
  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::Login });
  assert_eq!(profiles.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_identity_stream_counts_as_signed_out() {
  let profiles = Arc::new(FakeProfiles::default());
  let p = principal("ranger@mangrove.org");
  profiles.insert(p.principal_id, record("x", Some("enabled"), None));
  let mut gate = SessionGate::new(
    ViewAccess::Member,
    Arc::new(DetachedIdentity(p)),
    profiles,
  );

  gate.start();
  assert_eq!(gate.render(), Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::Login });
}

// ─── Timed notices ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn disabled_account_counts_down_then_signs_out() {
  let (mut gate, identity, _) =
    signed_in(ViewAccess::Member, Some(record("555-1234", Some("disabled"), None)));

  let first = settle(&mut gate).await;
  assert_eq!(first, Render::notice(NoticeKind::Disabled, 3));
  let started = Instant::now();

  let (seen, after) = count_down(&mut gate).await;
  assert_eq!(seen, vec![3, 2, 1, 0]);
  assert_eq!(after, Render::Redirect { to: Route::Login });
  assert_elapsed(started, 3);
  assert_eq!(identity.sign_outs(), 1);

  // The sign-out itself reaches the gate as a new identity event.
  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::Login });
  assert_eq!(identity.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_happens_only_at_expiry() {
  let (mut gate, identity, _) =
    signed_in(ViewAccess::Member, Some(record("555-1234", Some("disabled"), None)));
  settle(&mut gate).await;

  for expected in [2, 1, 0] {
    assert_eq!(step(&mut gate).await, Render::notice(NoticeKind::Disabled, expected));
    assert_eq!(identity.sign_outs(), 0);
  }
  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::Login });
  assert_eq!(identity.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn user_on_admin_view_is_sent_home_without_sign_out() {
  let (mut gate, identity, _) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::User))));

  assert_eq!(settle(&mut gate).await, Render::notice(NoticeKind::Forbidden, 10));
  let started = Instant::now();

  let (seen, after) = count_down(&mut gate).await;
  assert_eq!(seen, (0..=10).rev().collect::<Vec<_>>());
  assert_eq!(after, Render::Redirect { to: Route::Home });
  assert_elapsed(started, 10);
  assert_eq!(identity.sign_outs(), 0);
  assert!(identity.inner.current().is_some());
}

#[tokio::test(start_paused = true)]
async fn unrecognized_status_counts_down_then_signs_out() {
  let (mut gate, identity, _) =
    signed_in(ViewAccess::Member, Some(record("x", Some("archived"), None)));

  assert_eq!(settle(&mut gate).await, Render::notice(NoticeKind::Unverifiable, 3));
  let (seen, after) = count_down(&mut gate).await;
  assert_eq!(seen, vec![3, 2, 1, 0]);
  assert_eq!(after, Render::Redirect { to: Route::Login });
  assert_eq!(identity.sign_outs(), 1);
}

#[tokio::test(start_paused = true)]
async fn notice_progress_tracks_seconds_left() {
  let (mut gate, ..) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::User))));
  settle(&mut gate).await;

  step(&mut gate).await;
  step(&mut gate).await;
  let Render::Notice { seconds_left, progress, .. } = gate.render() else {
    panic!("expected a notice");
  };
  assert_eq!(seconds_left, 8);
  assert!((progress - 0.8).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn identity_change_cancels_running_notice() {
  let (mut gate, identity, profiles) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::User))));
  settle(&mut gate).await;
  step(&mut gate).await;

  let admin = principal("warden@mangrove.org");
  profiles.insert(admin.principal_id, record("x", Some("enabled"), Some(Role::Admin)));
  identity.inner.sign_in(admin);

  assert_eq!(step(&mut gate).await, Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Content);

  tokio::time::sleep(Duration::from_secs(15)).await;
  assert!(gate.pending_event().is_none(), "ticker outlived its notice");
  assert_eq!(gate.render(), Render::Content);
}

// ─── Device rule ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn mobile_admin_root_skips_session_checks() {
  let (mut gate, identity, profiles) =
    signed_in(ViewAccess::AdminRoot, Some(record("x", Some("enabled"), Some(Role::Admin))));
  let (_viewport_tx, viewport_rx) = watch::channel(Viewport::new(DESKTOP_UA, 400));
  gate = gate.with_viewport(viewport_rx);

  gate.start();
  assert_eq!(gate.render(), Render::notice(NoticeKind::MobileUnsupported, 10));
  assert_eq!(identity.subscribes(), 0);
  assert_eq!(profiles.reads(), 0);

  let (seen, after) = count_down(&mut gate).await;
  assert_eq!(seen.len(), 11);
  assert_eq!(after, Render::Redirect { to: Route::Home });
  assert_eq!(identity.sign_outs(), 0);
  assert_eq!(identity.subscribes(), 0);
  assert_eq!(profiles.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn desktop_admin_root_is_allowed_for_admins() {
  let (gate, ..) =
    signed_in(ViewAccess::AdminRoot, Some(record("x", Some("enabled"), Some(Role::Admin))));
  let (_viewport_tx, viewport_rx) = watch::channel(Viewport::new(DESKTOP_UA, 1280));
  let mut gate = gate.with_viewport(viewport_rx);

  assert_eq!(settle(&mut gate).await, Render::Content);
}

#[tokio::test(start_paused = true)]
async fn shrinking_viewport_trips_mobile_notice() {
  let (gate, identity, _) =
    signed_in(ViewAccess::AdminRoot, Some(record("x", Some("enabled"), Some(Role::Admin))));
  let (viewport_tx, viewport_rx) = watch::channel(Viewport::new(DESKTOP_UA, 1280));
  let mut gate = gate.with_viewport(viewport_rx);
  assert_eq!(settle(&mut gate).await, Render::Content);

  viewport_tx.send(Viewport::new(DESKTOP_UA, 500)).unwrap();
  assert_eq!(step(&mut gate).await, Render::notice(NoticeKind::MobileUnsupported, 10));

  // Session changes no longer reach the gate, and widening again does not
  // cancel the notice.
  identity.inner.sign_out().await.unwrap();
  viewport_tx.send(Viewport::new(DESKTOP_UA, 1600)).unwrap();
  assert_eq!(step(&mut gate).await, Render::notice(NoticeKind::MobileUnsupported, 10));
  assert_eq!(step(&mut gate).await, Render::notice(NoticeKind::MobileUnsupported, 9));
  assert_eq!(identity.sign_outs(), 0);
}

#[tokio::test(start_paused = true)]
async fn viewport_is_ignored_on_other_views() {
  let (gate, ..) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::Admin))));
  let (viewport_tx, viewport_rx) = watch::channel(Viewport::new(DESKTOP_UA, 400));
  let mut gate = gate.with_viewport(viewport_rx);
  assert_eq!(settle(&mut gate).await, Render::Content);

  viewport_tx.send(Viewport::new(DESKTOP_UA, 320)).unwrap();
  assert_eq!(step(&mut gate).await, Render::Content);
}

// ─── Ordering ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn finished_read_does_not_outlive_sign_out() {
  let (mut gate, identity, profiles) =
    signed_in(ViewAccess::Member, Some(record("x", Some("enabled"), None)));
  gate.start();

  // Let the read finish and queue its result before the session ends.
  tokio::time::sleep(Duration::from_millis(1)).await;
  assert_eq!(profiles.reads(), 1);
  identity.inner.sign_out().await.unwrap();

  assert_eq!(step(&mut gate).await, Render::Redirect { to: Route::Login });

  let queued = gate.pending_event().expect("profile result queued");
  assert!(matches!(queued, Event::Profile { .. }));
  gate.apply(queued).await;
  assert_eq!(gate.render(), Render::Redirect { to: Route::Login });
}

#[tokio::test(start_paused = true)]
async fn finished_read_for_previous_principal_is_discarded() {
  let identity = Arc::new(RecordingIdentity::default());
  let profiles = Arc::new(FakeProfiles::default());

  let first = principal("first@mangrove.org");
  profiles.insert(first.principal_id, record("x", Some("disabled"), None));
  let second = principal("second@mangrove.org");
  profiles.insert(second.principal_id, record("x", Some("enabled"), None));

  identity.inner.sign_in(first);
  let mut gate =
    SessionGate::new(ViewAccess::Member, Arc::clone(&identity), Arc::clone(&profiles));
  gate.start();

  tokio::time::sleep(Duration::from_millis(1)).await;
  identity.inner.sign_in(second);

  // The switch is seen first; the first principal's queued result is then
  // dropped without ever showing its notice.
  assert_eq!(step(&mut gate).await, Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Content);
  assert_eq!(profiles.reads(), 2);
  assert_eq!(identity.sign_outs(), 0);
}

#[tokio::test(start_paused = true)]
async fn in_flight_read_is_abandoned_on_identity_change() {
  let identity = Arc::new(RecordingIdentity::default());
  let profiles = Arc::new(FakeProfiles::default());

  let first = principal("first@mangrove.org");
  profiles.insert(first.principal_id, record("x", Some("disabled"), None));
  let release = profiles.hold(first.principal_id);
  let second = principal("second@mangrove.org");
  profiles.insert(second.principal_id, record("x", Some("enabled"), None));

  identity.inner.sign_in(first);
  let mut gate =
    SessionGate::new(ViewAccess::Member, Arc::clone(&identity), Arc::clone(&profiles));
  gate.start();

  identity.inner.sign_in(second);
  assert_eq!(step(&mut gate).await, Render::Loading);
  assert_eq!(step(&mut gate).await, Render::Content);

  release.notify_waiters();
  tokio::time::sleep(Duration::from_secs(1)).await;
  assert!(gate.pending_event().is_none(), "abandoned read still reported");
  assert_eq!(gate.render(), Render::Content);
}

#[tokio::test(start_paused = true)]
async fn repeated_evaluation_is_stable() {
  let (mut gate, identity, _) =
    signed_in(ViewAccess::Admin, Some(record("x", Some("enabled"), Some(Role::Admin))));
  let first = settle(&mut gate).await;

  let same = identity.inner.current().expect("signed in");
  gate.apply(Event::Identity(Some(same))).await;
  let second = step(&mut gate).await;

  assert_eq!(first, second);
}

// ─── Spawned driver ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn spawned_gate_publishes_renders() {
  let (gate, ..) =
    signed_in(ViewAccess::Member, Some(record("x", Some("enabled"), None)));
  let mut handle = gate.spawn();

  let mut render = handle.current();
  while render == Render::Loading {
    render = handle.changed().await.expect("gate stopped");
  }
  assert_eq!(render, Render::Content);
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_countdown() {
  let (gate, identity, _) =
    signed_in(ViewAccess::Member, Some(record("x", Some("disabled"), None)));
  let mut handle = gate.spawn();

  let mut render = handle.current();
  while !matches!(render, Render::Notice { .. }) {
    render = handle.changed().await.expect("gate stopped");
  }

  let renders = handle.renders();
  drop(handle);
  tokio::time::sleep(Duration::from_secs(10)).await;

  assert!(renders.has_changed().is_err(), "gate still publishing after teardown");
  assert!(matches!(*renders.borrow(), Render::Notice { .. }));
  assert_eq!(identity.sign_outs(), 0);
}
