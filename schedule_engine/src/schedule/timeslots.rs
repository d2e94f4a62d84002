//! Per-channel interval bookkeeping.

use log::trace;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::algorithms::intervals::{
    check_nonnegative, insert_sorted, insertion_indices, locate, max_stop,
};
use crate::error::{Error, Result};
use crate::models::{Channel, Interval, Time};

/// Sorted, non-overlapping intervals per channel.
///
/// This map is the authoritative record of what a schedule occupies. Every
/// mutation first checks all touched channel lists without changing them and
/// commits only after every check passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimeSlots {
    slots: BTreeMap<Channel, Vec<Interval>>,
}

impl TimeSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots of a single leaf occupying `channels` over `[0, duration)`.
    pub fn for_leaf(channels: &[Channel], duration: Time) -> Result<Self> {
        let interval = Interval::from_duration(0, duration)?;
        Ok(Self {
            slots: channels.iter().map(|ch| (*ch, vec![interval])).collect(),
        })
    }

    /// Rebuild slots from scratch out of flattened `(time, channels, duration)` leaves.
    pub fn from_leaves<'a, I>(leaves: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Time, &'a [Channel], Time)>,
    {
        let mut slots = Self::new();
        for (time, channels, duration) in leaves {
            slots.add(time, &Self::for_leaf(channels, duration)?)?;
        }
        Ok(slots)
    }

    /// Channels with at least one interval, sorted.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.slots.keys()
    }

    pub fn contains_channel(&self, channel: &Channel) -> bool {
        self.slots.contains_key(channel)
    }

    /// Intervals recorded on `channel`.
    pub fn get(&self, channel: &Channel) -> Option<&[Interval]> {
        self.slots.get(channel).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &[Interval])> + '_ {
        self.slots.iter().map(|(ch, ivs)| (ch, ivs.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Earliest start over `channels`, 0 when none of them is occupied.
    pub fn ch_start_time(&self, channels: &[Channel]) -> Time {
        channels
            .iter()
            .filter_map(|ch| self.slots.get(ch))
            .filter_map(|ivs| ivs.first().map(Interval::start))
            .min()
            .unwrap_or(0)
    }

    /// Latest stop over `channels`, 0 when none of them is occupied.
    pub fn ch_stop_time(&self, channels: &[Channel]) -> Time {
        channels
            .iter()
            .filter_map(|ch| self.slots.get(ch))
            .map(|ivs| max_stop(ivs))
            .max()
            .unwrap_or(0)
    }

    /// Earliest start over all channels.
    pub fn start_time(&self) -> Time {
        self.slots
            .values()
            .filter_map(|ivs| ivs.first().map(Interval::start))
            .min()
            .unwrap_or(0)
    }

    /// Latest stop over all channels.
    pub fn stop_time(&self) -> Time {
        self.slots.values().map(|ivs| max_stop(ivs)).max().unwrap_or(0)
    }

    /// Merge `other`, shifted by `offset`, into this map.
    ///
    /// Fails with an Overlap error naming the channel and both ranges on the
    /// first collision, or with a Timing error if a start would be negative.
    /// Nothing is changed on failure.
    pub fn add(&mut self, offset: Time, other: &TimeSlots) -> Result<()> {
        let mut staged: Vec<(Channel, Vec<Interval>, Vec<usize>)> =
            Vec::with_capacity(other.slots.len());
        for (channel, intervals) in &other.slots {
            let shifted = intervals
                .iter()
                .map(|iv| iv.shifted(offset))
                .collect::<Result<Vec<_>>>()?;
            let indices = match self.slots.get(channel) {
                None => vec![0; shifted.len()],
                Some(existing) => insertion_indices(existing, &shifted)
                    .map_err(|(existing, incoming)| Error::overlap(*channel, existing, incoming))?,
            };
            staged.push((*channel, shifted, indices));
        }

        check_nonnegative(staged.iter().map(|(ch, ivs, _)| (ch, ivs)))?;
        for (channel, shifted, indices) in staged {
            let list = self.slots.entry(channel).or_default();
            insert_sorted(list, &shifted, &indices);
            trace!("Merged {} intervals into channel {}", shifted.len(), channel);
        }
        Ok(())
    }

    /// Remove `other`, shifted by `offset`, from this map by exact match.
    ///
    /// Fails with a Consistency error if any shifted interval is missing.
    /// Channels left without intervals are dropped.
    pub fn remove(&mut self, offset: Time, other: &TimeSlots) -> Result<()> {
        let mut staged: Vec<(Channel, Vec<usize>)> = Vec::with_capacity(other.slots.len());
        for (channel, intervals) in &other.slots {
            let existing = self.slots.get(channel).map(Vec::as_slice).unwrap_or_default();
            let mut indices = Vec::with_capacity(intervals.len());
            let mut from = 0;
            for interval in intervals {
                let interval = interval.shifted(offset)?;
                let index = from + locate(&existing[from..], &interval);
                if existing.get(index) != Some(&interval) {
                    return Err(Error::consistency(*channel, interval));
                }
                indices.push(index);
                from = index + 1;
            }
            staged.push((*channel, indices));
        }

        for (channel, indices) in staged {
            let emptied = match self.slots.get_mut(&channel) {
                Some(list) => {
                    for index in indices.into_iter().rev() {
                        list.remove(index);
                    }
                    list.is_empty()
                }
                None => false,
            };
            if emptied {
                self.slots.remove(&channel);
            }
        }
        Ok(())
    }

    /// Translate every interval by `delta`, rejecting negative results.
    pub fn shift(&mut self, delta: Time) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let shifted: BTreeMap<Channel, Vec<Interval>> = self
            .slots
            .iter()
            .map(|(ch, ivs)| {
                let ivs = ivs.iter().map(|iv| iv.shifted(delta)).collect::<Result<Vec<_>>>()?;
                Ok((*ch, ivs))
            })
            .collect::<Result<_>>()?;
        check_nonnegative(&shifted)?;
        self.slots = shifted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn iv(start: Time, stop: Time) -> Interval {
        Interval::new(start, stop).unwrap()
    }

    #[test]
    fn test_add_new_channel_and_merge() {
        let d0 = Channel::drive(0);
        let mut slots = TimeSlots::new();
        slots.add(0, &TimeSlots::for_leaf(&[d0], 100).unwrap()).unwrap();
        slots.add(150, &TimeSlots::for_leaf(&[d0], 50).unwrap()).unwrap();
        slots.add(100, &TimeSlots::for_leaf(&[d0], 50).unwrap()).unwrap();

        assert_eq!(slots.get(&d0).unwrap(), &[iv(0, 100), iv(100, 150), iv(150, 200)]);
        assert_eq!(slots.ch_stop_time(&[d0]), 200);
    }

    #[test]
    fn test_add_is_atomic_across_channels() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let mut slots = TimeSlots::new();
        slots.add(0, &TimeSlots::for_leaf(&[d1], 100).unwrap()).unwrap();
        let before = slots.clone();

        // d0 would merge cleanly, d1 collides.
        let err = slots
            .add(50, &TimeSlots::for_leaf(&[d0, d1], 10).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overlap);
        assert!(err.to_string().contains("d1"));
        assert_eq!(slots, before);
    }

    #[test]
    fn test_add_rejects_negative_start() {
        let d0 = Channel::drive(0);
        let mut slots = TimeSlots::new();
        let err = slots.add(-5, &TimeSlots::for_leaf(&[d0], 10).unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);
        assert!(slots.is_empty());
    }

    #[test]
    fn test_remove_exact_match() {
        let d0 = Channel::drive(0);
        let leaf = TimeSlots::for_leaf(&[d0], 10).unwrap();
        let mut slots = TimeSlots::new();
        slots.add(0, &leaf).unwrap();
        slots.add(20, &leaf).unwrap();

        slots.remove(20, &leaf).unwrap();
        assert_eq!(slots.get(&d0).unwrap(), &[iv(0, 10)]);

        let err = slots.remove(5, &leaf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);

        slots.remove(0, &leaf).unwrap();
        assert!(!slots.contains_channel(&d0));
    }

    #[test]
    fn test_shift() {
        let d0 = Channel::drive(0);
        let mut slots = TimeSlots::for_leaf(&[d0], 10).unwrap();
        slots.shift(30).unwrap();
        assert_eq!(slots.start_time(), 30);
        assert_eq!(slots.stop_time(), 40);
        assert!(slots.shift(-31).is_err());
        assert_eq!(slots.start_time(), 30);
    }

    #[test]
    fn test_many_appends_stay_sorted_and_failed_add_changes_nothing() {
        let d0 = Channel::drive(0);
        let leaf = TimeSlots::for_leaf(&[d0], 10).unwrap();
        let mut slots = TimeSlots::new();
        for i in 0..20_000 {
            slots.add(i * 10, &leaf).unwrap();
        }
        let list = slots.get(&d0).unwrap();
        assert_eq!(list.len(), 20_000);
        assert_eq!(list.last(), Some(&iv(199_990, 200_000)));
        assert!(list.windows(2).all(|pair| pair[0].stop() <= pair[1].start()));

        let before = slots.clone();
        let err = slots.add(199_995, &leaf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overlap);
        assert_eq!(slots, before);
    }

    #[test]
    fn test_remove_duplicate_degenerate_intervals() {
        let d0 = Channel::drive(0);
        let marker = TimeSlots::for_leaf(&[d0], 0).unwrap();
        let mut slots = TimeSlots::new();
        slots.add(5, &marker).unwrap();
        slots.add(5, &marker).unwrap();
        slots.add(0, &TimeSlots::for_leaf(&[d0], 5).unwrap()).unwrap();
        assert_eq!(slots.get(&d0).unwrap(), &[iv(0, 5), iv(5, 5), iv(5, 5)]);

        slots.remove(5, &marker).unwrap();
        assert_eq!(slots.get(&d0).unwrap(), &[iv(0, 5), iv(5, 5)]);
    }

    #[test]
    fn test_shift_past_time_range_is_a_timing_error() {
        let d0 = Channel::drive(0);
        let mut slots = TimeSlots::for_leaf(&[d0], 10).unwrap();
        let err = slots.shift(Time::MAX - 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timing);
        assert_eq!(slots.stop_time(), 10);
    }

    #[test]
    fn test_from_leaves() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let both = [d0, d1];
        let only_d0 = [d0];
        let slots =
            TimeSlots::from_leaves([(0, &both[..], 10), (10, &only_d0[..], 5)]).unwrap();
        assert_eq!(slots.ch_stop_time(&[d0]), 15);
        assert_eq!(slots.ch_stop_time(&[d1]), 10);
        assert_eq!(slots.ch_start_time(&[Channel::drive(7)]), 0);
    }
}
