//! Progress reporting and cooperative cancellation for long collection passes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives fractional progress while a batch pass runs.
pub trait ProgressSink {
  /// Called once per processed item with a fraction in `0.0..=1.0` and the current path.
  fn report(&mut self, fraction: f32, current: &str);
}

impl<F: FnMut(f32, &str)> ProgressSink for F {
  fn report(&mut self, fraction: f32, current: &str) {
    self(fraction, current);
  }
}

/// Sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
  fn report(&mut self, _fraction: f32, _current: &str) {}
}

/// Shared flag checked once per item by batch passes.
///
/// Clones observe the same flag, so a host can keep one clone and cancel from elsewhere.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
  cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
  /// Fresh token that is not cancelled.
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation of every pass observing this token.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Relaxed);
  }

  /// Returns `true` once [`CancellationToken::cancel`] was called on any clone.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Relaxed)
  }
}

/// Fraction of `total` completed after `processed` items; an empty pass is complete.
pub(crate) fn fraction(processed: usize, total: usize) -> f32 {
  if total == 0 {
    1.0
  } else {
    processed as f32 / total as f32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn closures_act_as_sinks() {
    let mut seen = Vec::new();
    {
      let mut sink = |fraction: f32, current: &str| seen.push((fraction, current.to_string()));
      sink.report(0.5, "a.png");
    }
    assert_eq!(seen, vec![(0.5, "a.png".to_string())]);
  }

  #[test]
  fn cancellation_is_shared_between_clones() {
    let token = CancellationToken::new();
    let observer = token.clone();
    assert!(!observer.is_cancelled());
    token.cancel();
    assert!(observer.is_cancelled());
  }

  #[test]
  fn empty_passes_report_completion() {
    assert_eq!(fraction(0, 0), 1.0);
    assert_eq!(fraction(1, 4), 0.25);
  }
}
