//! Alignment policies for deferred programs.
//!
//! A policy turns an ordered list of child extents into concrete start
//! offsets. It only ever sees extents (a duration plus the first start and
//! last stop on each channel), never the children themselves.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Bindings, Channel, Parameter, ParameterValue, Time};

/// Footprint of one child as seen by an alignment policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildExtent {
    /// Total duration of the child.
    pub duration: Time,
    /// Per channel, the first start and the last stop relative to the child.
    pub spans: BTreeMap<Channel, (Time, Time)>,
}

impl ChildExtent {
    /// Extent of a leaf occupying `channels` for `duration`.
    pub fn leaf(channels: &[Channel], duration: Time) -> Self {
        Self {
            duration,
            spans: channels.iter().map(|ch| (*ch, (0, duration))).collect(),
        }
    }

    /// Same footprint seen backwards in time.
    fn mirrored(&self) -> Self {
        Self {
            duration: self.duration,
            spans: self
                .spans
                .iter()
                .map(|(ch, (start, stop))| (*ch, (self.duration - stop, self.duration - start)))
                .collect(),
        }
    }
}

/// Custom placement function used by [`AlignmentKind::Func`].
///
/// Maps the 1-based index of a child to the fraction of the context duration
/// where that child is centred. Two placements are equal only when they share
/// the same function object.
#[derive(Clone)]
pub struct Placement {
    name: String,
    func: Arc<dyn Fn(usize) -> f64 + Send + Sync>,
}

impl Placement {
    pub fn new(name: impl Into<String>, func: impl Fn(usize) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self, index: usize) -> f64 {
        (self.func)(index)
    }
}

impl PartialEq for Placement {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placement").field("name", &self.name).finish()
    }
}

/// Strategy converting ordered children into concrete offsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AlignmentKind {
    /// Pack every child as early as the channels it shares allow.
    #[default]
    Left,
    /// Pack every child as late as possible, ending together.
    Right,
    /// Each child starts when the previous one stops.
    Sequential,
    /// Sequential children spread with equal gaps across `duration`.
    Equispaced { duration: ParameterValue },
    /// Children centred where `placement` says within `duration`.
    Func {
        duration: ParameterValue,
        placement: Placement,
    },
}

impl AlignmentKind {
    pub fn equispaced(duration: impl Into<ParameterValue>) -> Self {
        AlignmentKind::Equispaced {
            duration: duration.into(),
        }
    }

    pub fn func(duration: impl Into<ParameterValue>, placement: Placement) -> Self {
        AlignmentKind::Func {
            duration: duration.into(),
            placement,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlignmentKind::Left => "AlignLeft",
            AlignmentKind::Right => "AlignRight",
            AlignmentKind::Sequential => "AlignSequential",
            AlignmentKind::Equispaced { .. } => "AlignEquispaced",
            AlignmentKind::Func { .. } => "AlignFunc",
        }
    }

    /// True when the policy totally orders its children.
    ///
    /// Left and right alignment only order children that share a channel;
    /// every other policy places children in sequence.
    pub fn is_sequential(&self) -> bool {
        !matches!(self, AlignmentKind::Left | AlignmentKind::Right)
    }

    fn context_duration(&self) -> Option<&ParameterValue> {
        match self {
            AlignmentKind::Equispaced { duration } | AlignmentKind::Func { duration, .. } => {
                Some(duration)
            }
            _ => None,
        }
    }

    /// Free variables held by the policy itself.
    pub fn parameters(&self) -> Vec<Parameter> {
        self.context_duration()
            .and_then(ParameterValue::as_parameter)
            .cloned()
            .into_iter()
            .collect()
    }

    /// True when the policy has no unassigned fields.
    pub fn is_schedulable(&self) -> bool {
        self.context_duration().map_or(true, ParameterValue::is_assigned)
    }

    /// Copy of this policy with `bindings` substituted.
    pub fn assign(&self, bindings: &Bindings) -> Self {
        match self {
            AlignmentKind::Equispaced { duration } => AlignmentKind::Equispaced {
                duration: duration.resolve(bindings),
            },
            AlignmentKind::Func {
                duration,
                placement,
            } => AlignmentKind::Func {
                duration: duration.resolve(bindings),
                placement: placement.clone(),
            },
            other => other.clone(),
        }
    }

    /// Compute one start offset per child, in input order.
    ///
    /// # Arguments
    /// * `children` - Extents of the ordered children
    ///
    /// # Returns
    /// Offsets relative to the start of the deferred program
    pub fn compute_offsets(&self, children: &[ChildExtent]) -> Result<Vec<Time>> {
        match self {
            AlignmentKind::Left => Ok(align_left(children)),
            AlignmentKind::Right => Ok(align_right(children)),
            AlignmentKind::Sequential => Ok(align_sequential(children)),
            AlignmentKind::Equispaced { duration } => {
                let duration = self.concrete_context(duration)?;
                Ok(align_equispaced(children, duration))
            }
            AlignmentKind::Func {
                duration,
                placement,
            } => {
                let duration = self.concrete_context(duration)?;
                align_func(children, duration, placement)
            }
        }
    }

    fn concrete_context(&self, duration: &ParameterValue) -> Result<Time> {
        match duration {
            ParameterValue::Int(d) if *d >= 0 => Ok(*d),
            ParameterValue::Parameter(p) => Err(Error::scheduling(format!(
                "{} duration '{}' is not assigned",
                self.name(),
                p
            ))),
            other => Err(Error::timing(format!(
                "{} duration must be a non-negative integer, got {}",
                self.name(),
                other
            ))),
        }
    }
}

impl fmt::Display for AlignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentKind::Equispaced { duration } => write!(f, "{}({})", self.name(), duration),
            AlignmentKind::Func {
                duration,
                placement,
            } => write!(f, "{}({}, {})", self.name(), duration, placement.name()),
            _ => write!(f, "{}()", self.name()),
        }
    }
}

impl FromStr for AlignmentKind {
    type Err = Error;

    /// Parse one of the parameterless policies by name.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(AlignmentKind::Left),
            "right" => Ok(AlignmentKind::Right),
            "sequential" => Ok(AlignmentKind::Sequential),
            other => Err(Error::Config(format!(
                "Unknown alignment '{}', expected left, right or sequential",
                other
            ))),
        }
    }
}

fn align_left(children: &[ChildExtent]) -> Vec<Time> {
    let mut frontier: HashMap<Channel, Time> = HashMap::new();
    children
        .iter()
        .map(|child| {
            let offset = child
                .spans
                .iter()
                .filter_map(|(ch, (start, _))| frontier.get(ch).map(|stop| stop - start))
                .max()
                .unwrap_or(0)
                .max(0);
            for (ch, (_, stop)) in &child.spans {
                let reached = frontier.entry(*ch).or_insert(0);
                *reached = (*reached).max(offset + stop);
            }
            offset
        })
        .collect()
}

fn align_right(children: &[ChildExtent]) -> Vec<Time> {
    let mirrored: Vec<ChildExtent> = children.iter().rev().map(ChildExtent::mirrored).collect();
    let reversed_offsets = align_left(&mirrored);
    let total = reversed_offsets
        .iter()
        .zip(&mirrored)
        .map(|(offset, child)| offset + child.duration)
        .max()
        .unwrap_or(0);
    reversed_offsets
        .iter()
        .zip(&mirrored)
        .rev()
        .map(|(offset, child)| total - offset - child.duration)
        .collect()
}

fn align_sequential(children: &[ChildExtent]) -> Vec<Time> {
    let mut cursor = 0;
    children
        .iter()
        .map(|child| {
            let offset = cursor;
            cursor += child.duration;
            offset
        })
        .collect()
}

fn align_equispaced(children: &[ChildExtent], duration: Time) -> Vec<Time> {
    let total: Time = children.iter().map(|c| c.duration).sum();
    if children.is_empty() || duration < total {
        return align_sequential(children);
    }

    let idle = duration - total;
    let (interval, remainder) = match children.len() {
        1 => (0, idle),
        n => {
            let gaps = (n - 1) as Time;
            (idle / gaps, idle % gaps)
        }
    };

    // Leftover time goes in front of the first child, rounded up.
    let mut cursor = remainder / 2 + remainder % 2;
    children
        .iter()
        .map(|child| {
            let offset = cursor;
            cursor += child.duration + interval;
            offset
        })
        .collect()
}

fn align_func(children: &[ChildExtent], duration: Time, placement: &Placement) -> Result<Vec<Time>> {
    let total: Time = children.iter().map(|c| c.duration).sum();
    if duration < total {
        return Ok(align_sequential(children));
    }

    children
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let centre = duration as f64 * placement.position(index + 1);
            let start = (centre - 0.5 * child.duration as f64).trunc();
            if !(0.0..=duration as f64).contains(&start) {
                return Err(Error::timing(format!(
                    "Invalid schedule position t={} is specified at index={}",
                    start, index
                )));
            }
            Ok(start as Time)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(channels: &[Channel], duration: Time) -> ChildExtent {
        ChildExtent::leaf(channels, duration)
    }

    #[test]
    fn test_left_packs_per_channel() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let children = vec![leaf(&[d0], 100), leaf(&[d1], 30), leaf(&[d1], 20), leaf(&[d0, d1], 10)];
        let offsets = AlignmentKind::Left.compute_offsets(&children).unwrap();
        assert_eq!(offsets, vec![0, 0, 30, 100]);
    }

    #[test]
    fn test_left_uses_child_channel_start() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        // Nested child whose d0 activity only begins at t=40.
        let nested = ChildExtent {
            duration: 60,
            spans: [(d0, (40, 60)), (d1, (0, 40))].into_iter().collect(),
        };
        let offsets = AlignmentKind::Left
            .compute_offsets(&[leaf(&[d0], 50), nested])
            .unwrap();
        assert_eq!(offsets, vec![0, 10]);
    }

    #[test]
    fn test_right_mirrors_left() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let children = vec![leaf(&[d0], 100), leaf(&[d1], 30), leaf(&[d1], 20)];
        let offsets = AlignmentKind::Right.compute_offsets(&children).unwrap();
        assert_eq!(offsets, vec![0, 50, 80]);
    }

    #[test]
    fn test_sequential() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let offsets = AlignmentKind::Sequential
            .compute_offsets(&[leaf(&[d0], 10), leaf(&[d1], 20), leaf(&[d0], 5)])
            .unwrap();
        assert_eq!(offsets, vec![0, 10, 30]);
    }

    #[test]
    fn test_equispaced_spreads_remaining_time() {
        let d0 = Channel::drive(0);
        let children = vec![leaf(&[d0], 10), leaf(&[d0], 10), leaf(&[d0], 10)];
        let offsets = AlignmentKind::equispaced(71).compute_offsets(&children).unwrap();
        // 41 idle units over 2 gaps: interval 20, remainder 1 goes first.
        assert_eq!(offsets, vec![1, 31, 61]);
    }

    #[test]
    fn test_equispaced_single_child_is_centred() {
        let d0 = Channel::drive(0);
        let offsets = AlignmentKind::equispaced(100)
            .compute_offsets(&[leaf(&[d0], 20)])
            .unwrap();
        assert_eq!(offsets, vec![40]);
    }

    #[test]
    fn test_equispaced_falls_back_to_sequential() {
        let d0 = Channel::drive(0);
        let offsets = AlignmentKind::equispaced(15)
            .compute_offsets(&[leaf(&[d0], 10), leaf(&[d0], 10)])
            .unwrap();
        assert_eq!(offsets, vec![0, 10]);
    }

    #[test]
    fn test_func_places_centres() {
        let d0 = Channel::drive(0);
        let placement = Placement::new("thirds", |j| j as f64 / 3.0);
        let offsets = AlignmentKind::func(300, placement)
            .compute_offsets(&[leaf(&[d0], 20), leaf(&[d0], 20)])
            .unwrap();
        assert_eq!(offsets, vec![90, 190]);
    }

    #[test]
    fn test_func_rejects_positions_outside_context() {
        let d0 = Channel::drive(0);
        let placement = Placement::new("early", |_| 0.0);
        let err = AlignmentKind::func(100, placement)
            .compute_offsets(&[leaf(&[d0], 20)])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timing);
    }

    #[test]
    fn test_parametric_duration() {
        let width = Parameter::new("width");
        let policy = AlignmentKind::equispaced(&width);
        assert!(!policy.is_schedulable());
        assert_eq!(policy.parameters(), vec![width.clone()]);
        assert_eq!(
            policy.compute_offsets(&[]).unwrap_err().kind(),
            crate::error::ErrorKind::Scheduling
        );

        let assigned = policy.assign(&Bindings::new().bind(&width, 200));
        assert!(assigned.is_schedulable());
        assert_eq!(assigned, AlignmentKind::equispaced(200));
    }

    #[test]
    fn test_placement_equality_is_identity() {
        let a = Placement::new("f", |_| 0.5);
        let b = Placement::new("f", |_| 0.5);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("left".parse::<AlignmentKind>().unwrap(), AlignmentKind::Left);
        assert_eq!(" Right ".parse::<AlignmentKind>().unwrap(), AlignmentKind::Right);
        assert!("diagonal".parse::<AlignmentKind>().is_err());
        assert!(AlignmentKind::Sequential.is_sequential());
        assert!(!AlignmentKind::Left.is_sequential());
    }
}
