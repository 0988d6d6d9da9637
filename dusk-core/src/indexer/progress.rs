use std::time::{Duration, Instant};

use crate::model::IndexReport;

/// Callback receiving the partially filled report of a running index
pub type ProgressFn<'a> = Box<dyn FnMut(&IndexReport) + 'a>;

/// Finished directories between two clock reads
const CHECK_EVERY_DIRS: u32 = 100;

/// Rate limiter for progress callbacks
///
/// The clock is only consulted every [`CHECK_EVERY_DIRS`] directories, and
/// a callback fires at most once per interval.
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: Duration,
    next_at: Instant,
    dirs_since_check: u32,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_at: Instant::now() + interval,
            dirs_since_check: 0,
        }
    }

    /// Record one finished directory; true when a callback is due
    pub fn dir_done(&mut self) -> bool {
        self.dirs_since_check += 1;
        if self.dirs_since_check < CHECK_EVERY_DIRS {
            return false;
        }
        self.dirs_since_check = 0;

        let now = Instant::now();
        if now >= self.next_at {
            self.next_at = now + self.interval;
            true
        } else {
            false
        }
    }
}
