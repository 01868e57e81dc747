//! The countdown behind a timed notice.

use std::time::Duration;

use guardian_core::{render::Render, rules::NoticeKind};
use tokio::{
  sync::mpsc,
  time::{self, Instant},
};

use crate::{gate::Event, task::TaskGuard};

/// Interval between countdown ticks.
pub(crate) const TICK: Duration = Duration::from_secs(1);

/// A running notice. Owns its ticker; dropping the countdown stops it.
#[derive(Debug)]
pub(crate) struct Countdown {
  id:        u64,
  kind:      NoticeKind,
  remaining: u32,
  ticker:    TaskGuard,
}

impl Countdown {
  /// Start counting down from `kind`'s duration. Ticks are delivered to
  /// `events` tagged with `id` so ticks from an older notice can be told
  /// apart.
  pub(crate) fn start(
    id: u64,
    kind: NoticeKind,
    events: mpsc::UnboundedSender<Event>,
  ) -> Self {
    let ticker = TaskGuard::spawn(async move {
      let mut interval = time::interval_at(Instant::now() + TICK, TICK);
      loop {
        interval.tick().await;
        if events.send(Event::Tick { notice: id }).is_err() {
          break;
        }
      }
    });

    Self {
      id,
      kind,
      remaining: kind.duration_secs(),
      ticker,
    }
  }

  pub(crate) fn id(&self) -> u64 { self.id }

  pub(crate) fn kind(&self) -> NoticeKind { self.kind }

  /// Count one second off. Returns `true` on the tick that reaches zero; the
  /// ticker is stopped at that point.
  pub(crate) fn tick(&mut self) -> bool {
    if self.remaining == 0 {
      return false;
    }
    self.remaining -= 1;
    if self.remaining == 0 {
      self.ticker.cancel();
      return true;
    }
    false
  }

  pub(crate) fn render(&self) -> Render { Render::notice(self.kind, self.remaining) }
}
