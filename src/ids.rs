// Task id generation

use crate::task::TaskId;

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Monotonic id source seeded from the wall clock
///
/// Ids look like millisecond timestamps but are never reissued: each call
/// to [`IdGenerator::issue`] returns a value strictly greater than every id
/// handed out or observed before, even when called faster than the clock ticks.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    last: TaskId,
    clock: fn() -> i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_clock(now_ms)
    }

    /// Use a custom clock (tests pin or freeze time this way)
    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self { last: 0, clock }
    }

    /// Raise the floor so `id` is never handed out again
    pub fn observe(&mut self, id: TaskId) {
        if id > self.last {
            self.last = id;
        }
    }

    /// Hand out the next id, `None` once ids up to `i64::MAX` are used
    pub fn issue(&mut self) -> Option<TaskId> {
        let now = (self.clock)();
        self.last = if now > self.last { now } else { self.last.checked_add(1)? };
        Some(self.last)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
