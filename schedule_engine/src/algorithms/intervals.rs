//! Interval algebra over sorted, non-overlapping interval lists.
//!
//! Lists handled here are sorted by `(start, stop)`. Non-degenerate entries
//! are pairwise disjoint, so their stop times are monotonic too; degenerate
//! (zero-length) entries may sit anywhere since they overlap nothing.

use crate::error::{Error, Result};
use crate::models::{Channel, Interval};

/// Return true iff `a` and `b` overlap.
///
/// Stop times are exclusive, so `[0, 10)` and `[10, 20)` do not overlap.
/// A zero-length interval overlaps nothing, not even another zero-length
/// interval at the same point.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    if a.is_degenerate() || b.is_degenerate() {
        return false;
    }
    let (first, second) = if a.start() <= b.start() { (a, b) } else { (b, a) };
    second.start() < first.stop()
}

/// Binary search for the index at which `target` occurs in `intervals`, or
/// would be inserted to keep the list sorted.
pub fn locate(intervals: &[Interval], target: &Interval) -> usize {
    intervals.partition_point(|iv| iv < target)
}

/// Sorted insertion index for `new_interval`.
///
/// # Returns
/// * `Ok(index)` - where `new_interval` keeps the list sorted
/// * `Err(existing)` - the interval `new_interval` collides with
pub fn find_insertion_index(
    intervals: &[Interval],
    new_interval: &Interval,
) -> std::result::Result<usize, Interval> {
    let index = locate(intervals, new_interval);
    if new_interval.is_degenerate() {
        return Ok(index);
    }

    // Only the last non-degenerate interval starting before our stop can
    // reach into us; every earlier one ends before it starts.
    let reach = intervals.partition_point(|iv| iv.start() < new_interval.stop());
    if let Some(candidate) = intervals[..reach].iter().rev().find(|iv| !iv.is_degenerate()) {
        if overlaps(candidate, new_interval) {
            return Err(*candidate);
        }
    }
    Ok(index)
}

/// Insertion indices for every interval of `incoming` against `intervals`.
///
/// `incoming` must itself be sorted and free of overlaps. Nothing is
/// mutated, so a caller can check every list before committing any of them
/// with [`insert_sorted`].
///
/// # Returns
/// * `Ok(indices)` - one non-decreasing index per incoming interval
/// * `Err((existing, incoming))` - the first collision found
pub fn insertion_indices(
    intervals: &[Interval],
    incoming: &[Interval],
) -> std::result::Result<Vec<usize>, (Interval, Interval)> {
    incoming
        .iter()
        .map(|iv| find_insertion_index(intervals, iv).map_err(|existing| (existing, *iv)))
        .collect()
}

/// Insert `incoming` at `indices` as returned by [`insertion_indices`] on
/// the same, unchanged list.
///
/// Indices past the end of the list turn into plain pushes.
pub fn insert_sorted(intervals: &mut Vec<Interval>, incoming: &[Interval], indices: &[usize]) {
    intervals.reserve(incoming.len());
    for (shift, (index, interval)) in indices.iter().zip(incoming).enumerate() {
        intervals.insert(index + shift, *interval);
    }
}

/// Latest stop time in a sorted list, 0 when empty.
pub fn max_stop(intervals: &[Interval]) -> i64 {
    intervals.iter().map(Interval::stop).max().unwrap_or(0)
}

/// Fail if any channel's earliest interval starts before 0.
pub fn check_nonnegative<'a, I>(timeslots: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a Channel, &'a Vec<Interval>)>,
{
    for (channel, intervals) in timeslots {
        if let Some(first) = intervals.first() {
            if first.start() < 0 {
                return Err(Error::timing(format!(
                    "An instruction on {} has a negative starting time {}",
                    channel,
                    first.start()
                )));
            }
        }
    }
    Ok(())
}
