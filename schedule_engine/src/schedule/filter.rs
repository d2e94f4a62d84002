//! Selection of leaves out of an eager schedule.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::Result;
use crate::models::{Channel, Instruction, Interval, Operation, Time};
use crate::schedule::program::{Schedule, ScheduleComponent};

type Predicate<O> = Box<dyn Fn(Time, &O) -> bool + Send + Sync>;

/// Criteria for [`Schedule::filter`] and [`Schedule::exclude`].
///
/// A leaf matches when it satisfies every predicate and every criterion that
/// was set: it occupies one of the channels, has one of the kinds, and lies
/// fully inside one of the time ranges. A filter with no criteria matches
/// everything.
pub struct Filter<O: Operation = Instruction> {
    predicates: Vec<Predicate<O>>,
    channels: Option<BTreeSet<Channel>>,
    kinds: Option<HashSet<O::Kind>>,
    ranges: Option<Vec<(Time, Time)>>,
    recurse_subroutines: bool,
}

impl<O: Operation> Default for Filter<O> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            channels: None,
            kinds: None,
            ranges: None,
            recurse_subroutines: true,
        }
    }
}

impl<O: Operation> Filter<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `predicate(time, leaf)` to hold.
    pub fn predicate(mut self, predicate: impl Fn(Time, &O) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Require a leaf to occupy at least one of `channels`.
    pub fn channels(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.channels.get_or_insert_with(BTreeSet::new).extend(channels);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = O::Kind>) -> Self {
        self.kinds.get_or_insert_with(HashSet::new).extend(kinds);
        self
    }

    /// Allow leaves lying fully inside `[start, stop]`.
    pub fn time_range(mut self, start: Time, stop: Time) -> Self {
        self.ranges.get_or_insert_with(Vec::new).push((start, stop));
        self
    }

    /// Allow leaves lying fully inside any of `intervals`.
    pub fn intervals(mut self, intervals: impl IntoIterator<Item = Interval>) -> Self {
        self.ranges
            .get_or_insert_with(Vec::new)
            .extend(intervals.into_iter().map(|iv| (iv.start(), iv.stop())));
        self
    }

    /// When disabled, nested schedules are matched and kept as whole units.
    pub fn recurse_subroutines(mut self, recurse: bool) -> Self {
        self.recurse_subroutines = recurse;
        self
    }

    /// True when no criterion was set.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
            && self.channels.is_none()
            && self.kinds.is_none()
            && self.ranges.is_none()
    }

    fn in_ranges(&self, start: Time, stop: Time) -> bool {
        self.ranges.as_ref().map_or(true, |ranges| {
            ranges.iter().any(|(lo, hi)| *lo <= start && stop <= *hi)
        })
    }

    fn on_channels(&self, channels: &[Channel]) -> bool {
        self.channels
            .as_ref()
            .map_or(true, |allowed| channels.iter().any(|ch| allowed.contains(ch)))
    }

    /// Whether the leaf `op` starting at `time` matches.
    pub fn matches(&self, time: Time, op: &O) -> bool {
        let duration = op.duration().as_time().unwrap_or(0);
        self.predicates.iter().all(|p| p(time, op))
            && self.on_channels(op.channels())
            && self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&op.kind()))
            && self.in_ranges(time, time + duration)
    }

    /// Whether a top-level child starting at `time` matches as a unit.
    fn matches_unit(&self, time: Time, component: &ScheduleComponent<O>) -> bool {
        match component {
            ScheduleComponent::Instruction(op) => self.matches(time, op),
            ScheduleComponent::Schedule(schedule) => {
                let leaves = schedule.flatten();
                self.predicates
                    .iter()
                    .all(|p| leaves.iter().all(|(t, op)| p(time + t, op)))
                    && self.on_channels(&schedule.channels())
                    && self.kinds.as_ref().map_or(true, |kinds| {
                        leaves.iter().all(|(_, op)| kinds.contains(&op.kind()))
                    })
                    && self.in_ranges(time + schedule.start_time(), time + schedule.duration())
            }
        }
    }

    /// Keep the matching leaves of `schedule` (or the others with `keep == false`).
    pub(crate) fn apply(&self, schedule: &Schedule<O>, keep: bool) -> Result<Schedule<O>> {
        let mut selected = Schedule::initialize_from(schedule, None);
        if self.is_empty() {
            if keep {
                for (time, child) in schedule.children() {
                    selected.place(*time, child.clone())?;
                }
            }
            return Ok(selected);
        }

        if self.recurse_subroutines {
            for (time, op) in schedule.flatten() {
                if self.matches(time, op) == keep {
                    selected.insert_in_place(time, op.clone())?;
                }
            }
        } else {
            for (time, child) in schedule.children() {
                if self.matches_unit(*time, child) == keep {
                    selected.place(*time, child.clone())?;
                }
            }
        }
        Ok(selected)
    }
}

impl<O: Operation> fmt::Debug for Filter<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("predicates", &self.predicates.len())
            .field("channels", &self.channels)
            .field("kinds", &self.kinds)
            .field("ranges", &self.ranges)
            .field("recurse_subroutines", &self.recurse_subroutines)
            .finish()
    }
}

impl<O: Operation> Schedule<O> {
    /// New schedule with only the leaves matching `filter`.
    ///
    /// Name and metadata are carried over. An empty filter keeps everything.
    pub fn filter(&self, filter: &Filter<O>) -> Result<Schedule<O>> {
        filter.apply(self, true)
    }

    /// New schedule with only the leaves not matching `filter`.
    ///
    /// Exact complement of [`Schedule::filter`]: an empty filter keeps nothing.
    pub fn exclude(&self, filter: &Filter<O>) -> Result<Schedule<O>> {
        filter.apply(self, false)
    }
}
