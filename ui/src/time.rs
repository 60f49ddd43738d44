use jiff::{SignedDuration, Span, Timestamp};
use std::cell::Cell;
use std::rc::Rc;

/// Clock used for staleness and garbage collection.
///
/// The system clock in the browser; tests use a mocked clock and move it
/// forward explicitly.
#[derive(Clone, Default)]
pub struct TimeSource {
    mocked: Option<Rc<Cell<Timestamp>>>,
}

impl TimeSource {
    pub fn system() -> Self {
        Self { mocked: None }
    }

    pub fn mocked(initial_time: Timestamp) -> Self {
        Self {
            mocked: Some(Rc::new(Cell::new(initial_time))),
        }
    }

    pub fn now(&self) -> Timestamp {
        match &self.mocked {
            Some(time) => time.get(),
            None => Timestamp::now(),
        }
    }

    /// Time elapsed since `earlier`, never negative.
    pub fn since(&self, earlier: Timestamp) -> SignedDuration {
        let elapsed = self.now().duration_since(earlier);
        if elapsed.is_negative() {
            SignedDuration::ZERO
        } else {
            elapsed
        }
    }

    /// Move a mocked clock forward. No effect on the system clock.
    pub fn advance(&self, duration: Span) {
        if let Some(time) = &self.mocked {
            match time.get().checked_add(duration) {
                Ok(next) => time.set(next),
                Err(e) => tracing::warn!("Cannot advance mocked time: {e}"),
            }
        }
    }

    pub fn set(&self, now: Timestamp) {
        if let Some(time) = &self.mocked {
            time.set(now);
        }
    }
}
