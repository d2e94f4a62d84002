//! Automatic program names.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out `prefix0`, `prefix1`, ... names.
///
/// The counter is monotonic for the life of the namer and never reset.
#[derive(Debug)]
pub struct Namer {
    prefix: Cow<'static, str>,
    counter: AtomicU64,
}

impl Namer {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix: Cow::Borrowed(prefix),
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Cow::Owned(prefix.into()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}

/// Process-wide namer behind `Schedule::new`.
pub static SCHEDULE_NAMER: Namer = Namer::new("sched");

/// Process-wide namer behind `ScheduleBlock::new`.
pub static BLOCK_NAMER: Namer = Namer::new("block");
