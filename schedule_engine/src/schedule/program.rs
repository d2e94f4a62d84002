//! Eager program tree.
//!
//! A [`Schedule`] holds `(offset, component)` children where a component is
//! either a leaf operation or another schedule. Each node keeps a
//! [`TimeSlots`] map so that overlaps are detected when a child is added,
//! not when the program is played back.
//!
//! Nested schedules are shared behind an [`Arc`]. Reusing the same
//! sub-program under several parents is cheap, and in-place edits copy a
//! shared child before touching it.

use log::debug;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, BitOr, Shl};
use std::sync::Arc;

use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::models::{
    concrete_duration, sorted_channel_names, Bindings, Channel, Instruction, Operation, Parameter,
    Time,
};
use crate::schedule::naming::SCHEDULE_NAMER;
use crate::schedule::registry::{ParameterSite, ParameterTable};
use crate::schedule::timeslots::TimeSlots;

/// Free-form user metadata attached to a program.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Number of leaves rendered by `Display` before truncating.
pub const DEFAULT_DISPLAY_LIMIT: usize = 50;

/// A child of a [`Schedule`].
#[derive(Debug, Clone)]
pub enum ScheduleComponent<O: Operation = Instruction> {
    Instruction(O),
    Schedule(Arc<Schedule<O>>),
}

impl<O: Operation> ScheduleComponent<O> {
    /// Channels occupied by this component, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            ScheduleComponent::Instruction(op) => op.channels().to_vec(),
            ScheduleComponent::Schedule(s) => s.channels(),
        }
    }

    /// Concrete duration; fails for leaves that are still parametric.
    pub fn duration(&self) -> Result<Time> {
        match self {
            ScheduleComponent::Instruction(op) => concrete_duration(op),
            ScheduleComponent::Schedule(s) => Ok(s.duration()),
        }
    }

    /// Short label used in error messages and logs.
    pub fn name(&self) -> String {
        match self {
            ScheduleComponent::Instruction(op) => format!("{:?}", op.kind()),
            ScheduleComponent::Schedule(s) => s.name().to_string(),
        }
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        match self {
            ScheduleComponent::Instruction(op) => op.parameters(),
            ScheduleComponent::Schedule(s) => s.parameters(),
        }
    }

    pub fn is_schedule(&self) -> bool {
        matches!(self, ScheduleComponent::Schedule(_))
    }

    /// Flattened leaves with absolute times, in canonical order.
    pub fn flatten(&self) -> Vec<(Time, &O)> {
        let mut leaves = Vec::new();
        self.collect_leaves(0, &mut leaves);
        sort_leaves(&mut leaves);
        leaves
    }

    pub(crate) fn timeslots(&self) -> Result<Cow<'_, TimeSlots>> {
        match self {
            ScheduleComponent::Instruction(op) => Ok(Cow::Owned(TimeSlots::for_leaf(
                op.channels(),
                concrete_duration(op)?,
            )?)),
            ScheduleComponent::Schedule(s) => Ok(Cow::Borrowed(&s.timeslots)),
        }
    }

    pub(crate) fn collect_leaves<'a>(&'a self, offset: Time, out: &mut Vec<(Time, &'a O)>) {
        match self {
            ScheduleComponent::Instruction(op) => out.push((offset, op)),
            ScheduleComponent::Schedule(s) => {
                for (time, child) in &s.children {
                    child.collect_leaves(offset + time, out);
                }
            }
        }
    }

    fn assign_in_place(&mut self, bindings: &Bindings) {
        match self {
            ScheduleComponent::Instruction(op) => *op = op.assign(bindings),
            ScheduleComponent::Schedule(s) => {
                Arc::make_mut(s).assign_parameters_in_place(bindings);
            }
        }
    }
}

impl<O: Operation> PartialEq for ScheduleComponent<O> {
    /// A leaf equals a schedule holding exactly that leaf at time 0.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScheduleComponent::Instruction(a), ScheduleComponent::Instruction(b)) => a == b,
            (ScheduleComponent::Schedule(a), ScheduleComponent::Schedule(b)) => {
                Arc::ptr_eq(a, b) || a == b
            }
            _ => self.channels() == other.channels() && self.flatten() == other.flatten(),
        }
    }
}

impl<O: Operation> From<O> for ScheduleComponent<O> {
    fn from(op: O) -> Self {
        ScheduleComponent::Instruction(op)
    }
}

impl<O: Operation> From<Schedule<O>> for ScheduleComponent<O> {
    fn from(schedule: Schedule<O>) -> Self {
        ScheduleComponent::Schedule(Arc::new(schedule))
    }
}

impl<O: Operation> From<Arc<Schedule<O>>> for ScheduleComponent<O> {
    fn from(schedule: Arc<Schedule<O>>) -> Self {
        ScheduleComponent::Schedule(schedule)
    }
}

fn leaf_duration<O: Operation>(op: &O) -> Time {
    op.duration().as_time().unwrap_or(0)
}

/// Order leaves by time, then duration, then sorted channel names.
fn sort_leaves<O: Operation>(leaves: &mut [(Time, &O)]) {
    leaves.sort_by_cached_key(|(time, op)| {
        (*time, leaf_duration(*op), sorted_channel_names(op.channels()))
    });
}

/// Eager program tree with concrete child offsets.
#[derive(Debug, Clone)]
pub struct Schedule<O: Operation = Instruction> {
    name: String,
    metadata: Metadata,
    timeslots: TimeSlots,
    children: Vec<(Time, ScheduleComponent<O>)>,
    duration: Time,
    parameters: ParameterTable,
}

impl<O: Operation> Default for Schedule<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operation> Schedule<O> {
    /// Empty schedule with an automatically generated name.
    pub fn new() -> Self {
        Self::with_name(SCHEDULE_NAMER.next_name())
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            timeslots: TimeSlots::new(),
            children: Vec::new(),
            duration: 0,
            parameters: ParameterTable::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build a schedule by inserting every `(offset, component)` pair.
    pub fn from_children<C, I>(children: I) -> Result<Self>
    where
        C: Into<ScheduleComponent<O>>,
        I: IntoIterator<Item = (Time, C)>,
    {
        let mut schedule = Self::new();
        for (time, component) in children {
            schedule.insert_in_place(time, component)?;
        }
        Ok(schedule)
    }

    /// Empty schedule carrying `other`'s name (or `name`) and metadata.
    pub fn initialize_from(other: &Schedule<O>, name: Option<&str>) -> Self {
        Self::with_name(name.unwrap_or(&other.name)).with_metadata(other.metadata.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Read-only view of the per-channel intervals.
    pub fn timeslots(&self) -> &TimeSlots {
        &self.timeslots
    }

    pub fn duration(&self) -> Time {
        self.duration
    }

    pub fn start_time(&self) -> Time {
        self.timeslots.start_time()
    }

    pub fn stop_time(&self) -> Time {
        self.timeslots.stop_time()
    }

    /// Occupied channels, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        self.timeslots.channels().copied().collect()
    }

    pub fn children(&self) -> &[(Time, ScheduleComponent<O>)] {
        &self.children
    }

    /// Earliest start over `channels`.
    pub fn ch_start_time(&self, channels: &[Channel]) -> Time {
        self.timeslots.ch_start_time(channels)
    }

    /// Latest stop over `channels`.
    pub fn ch_stop_time(&self, channels: &[Channel]) -> Time {
        self.timeslots.ch_stop_time(channels)
    }

    /// Time from 0 until `channels` are done.
    pub fn ch_duration(&self, channels: &[Channel]) -> Time {
        self.ch_stop_time(channels)
    }

    /// All leaves with their absolute start times.
    ///
    /// Nested schedules are expanded. Leaves are ordered by time, then
    /// duration, then their sorted channel names, so output is reproducible
    /// when several leaves start together.
    pub fn flatten(&self) -> Vec<(Time, &O)> {
        let mut leaves = Vec::new();
        for (time, child) in &self.children {
            child.collect_leaves(*time, &mut leaves);
        }
        sort_leaves(&mut leaves);
        leaves
    }

    /// Number of flattened leaves.
    pub fn len(&self) -> usize {
        self.children
            .iter()
            .map(|(_, child)| match child {
                ScheduleComponent::Instruction(_) => 1,
                ScheduleComponent::Schedule(s) => s.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn context(&self, operation: &str, component: &ScheduleComponent<O>, time: Time) -> ErrorContext {
        ErrorContext::new(operation)
            .with_target(self.name.clone())
            .with_component(component.name())
            .with_details(format!("at time {}", time))
    }

    /// Insert `component` at `start_time`, mutating `self`.
    ///
    /// Fails with a Timing error for a negative `start_time` and with an
    /// Overlap error if the component collides with an existing child. On
    /// failure `self` is unchanged.
    pub fn insert_in_place(
        &mut self,
        start_time: Time,
        component: impl Into<ScheduleComponent<O>>,
    ) -> Result<&mut Self> {
        let component = component.into();
        if start_time < 0 {
            return Err(Error::timing(format!(
                "Schedule start time must be non-negative, got {}",
                start_time
            ))
            .with_context(self.context("insert", &component, start_time)));
        }
        self.place(start_time, component)
    }

    /// Insert `component` at an offset that may be negative.
    ///
    /// Offsets of children already placed in a valid tree can go below 0
    /// after a shift, as long as nothing the child occupies does. The
    /// timeslot map still rejects any interval starting before 0.
    pub(crate) fn place(
        &mut self,
        start_time: Time,
        component: ScheduleComponent<O>,
    ) -> Result<&mut Self> {
        let duration = {
            let slots = component
                .timeslots()
                .map_err(|e| e.with_context(self.context("insert", &component, start_time)))?;
            let stop = start_time.checked_add(component.duration()?).ok_or_else(|| {
                Error::timing(format!(
                    "{} at {} ends beyond the time range",
                    component.name(),
                    start_time
                ))
                .with_context(self.context("insert", &component, start_time))
            })?;
            self.timeslots
                .add(start_time, &slots)
                .map_err(|e| e.with_context(self.context("insert", &component, start_time)))?;
            self.duration.max(stop)
        };
        self.duration = duration;

        let index = self.children.len();
        self.parameters
            .register(ParameterSite::Child(index), component.parameters());
        debug!(
            "Inserted {} into {} at {} (duration {})",
            component.name(),
            self.name,
            start_time,
            self.duration
        );
        self.children.push((start_time, component));
        Ok(self)
    }

    /// Copy of `self` with `component` inserted at `start_time`.
    pub fn insert(
        &self,
        start_time: Time,
        component: impl Into<ScheduleComponent<O>>,
    ) -> Result<Self> {
        let mut schedule = self.clone();
        schedule.insert_in_place(start_time, component)?;
        Ok(schedule)
    }

    /// Like [`Schedule::insert`], naming the result `name`.
    pub fn insert_named(
        &self,
        start_time: Time,
        component: impl Into<ScheduleComponent<O>>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let mut schedule = self.insert(start_time, component)?;
        schedule.name = name.into();
        Ok(schedule)
    }

    /// Translate every child by `delta`, mutating `self`.
    ///
    /// Fails with a Timing error, leaving `self` unchanged, if any occupied
    /// interval would start before 0. Child offsets themselves may go
    /// negative.
    pub fn shift_in_place(&mut self, delta: Time) -> Result<&mut Self> {
        let context = || {
            ErrorContext::new("shift")
                .with_target(self.name.clone())
                .with_details(format!("by {}", delta))
        };
        let overflow = || {
            Error::timing(format!("Shifting {} by {} exceeds the time range", self.name, delta))
                .with_context(context())
        };
        let duration = if self.children.is_empty() {
            self.duration
        } else {
            self.duration.checked_add(delta).ok_or_else(overflow)?
        };
        let times = self
            .children
            .iter()
            .map(|(time, _)| time.checked_add(delta).ok_or_else(overflow))
            .collect::<Result<Vec<_>>>()?;
        self.timeslots
            .shift(delta)
            .map_err(|e| e.with_context(context()))?;

        for ((time, _), shifted) in self.children.iter_mut().zip(times) {
            *time = shifted;
        }
        self.duration = duration;
        debug!("Shifted {} by {}", self.name, delta);
        Ok(self)
    }

    /// Copy of `self` translated by `delta`.
    pub fn shift(&self, delta: Time) -> Result<Self> {
        let mut schedule = self.clone();
        schedule.shift_in_place(delta)?;
        Ok(schedule)
    }

    pub fn shift_named(&self, delta: Time, name: impl Into<String>) -> Result<Self> {
        let mut schedule = self.shift(delta)?;
        schedule.name = name.into();
        Ok(schedule)
    }

    /// Insert `component` once every channel it shares with `self` is free.
    ///
    /// With no shared channel the component goes in at time 0.
    pub fn append_in_place(
        &mut self,
        component: impl Into<ScheduleComponent<O>>,
    ) -> Result<&mut Self> {
        let component = component.into();
        let common: Vec<Channel> = component
            .channels()
            .into_iter()
            .filter(|ch| self.timeslots.contains_channel(ch))
            .collect();
        let time = self.ch_stop_time(&common);
        self.insert_in_place(time, component)
    }

    pub fn append(&self, component: impl Into<ScheduleComponent<O>>) -> Result<Self> {
        let mut schedule = self.clone();
        schedule.append_in_place(component)?;
        Ok(schedule)
    }

    pub fn append_named(
        &self,
        component: impl Into<ScheduleComponent<O>>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let mut schedule = self.append(component)?;
        schedule.name = name.into();
        Ok(schedule)
    }

    fn replacement_error(&self, old: &ScheduleComponent<O>, new: &ScheduleComponent<O>, cause: Error) -> Error {
        if cause.kind() != ErrorKind::Overlap {
            return cause;
        }
        Error::replacement(
            format!(
                "Replacing {} with {} in {} creates an overlap",
                old.name(),
                new.name(),
                self.name
            ),
            cause,
        )
    }

    fn replaced_children(
        &self,
        old: &ScheduleComponent<O>,
        new: &ScheduleComponent<O>,
    ) -> Vec<(Time, ScheduleComponent<O>)> {
        self.children
            .iter()
            .map(|(time, child)| {
                let child = if child == old { new.clone() } else { child.clone() };
                (*time, child)
            })
            .collect()
    }

    /// Replace every top-level child structurally equal to `old` with `new`.
    ///
    /// Only immediate children are considered. The timeslot map is rebuilt
    /// from the resulting leaves before anything is committed, so an
    /// overlapping replacement leaves `self` untouched.
    pub fn replace_in_place(
        &mut self,
        old: impl Into<ScheduleComponent<O>>,
        new: impl Into<ScheduleComponent<O>>,
    ) -> Result<&mut Self> {
        let old = old.into();
        let new = new.into();
        let children = self.replaced_children(&old, &new);

        let mut leaves = Vec::new();
        for (time, child) in &children {
            child.collect_leaves(*time, &mut leaves);
        }
        let leaves = leaves
            .into_iter()
            .map(|(time, op)| Ok((time, op.channels(), concrete_duration(op)?)))
            .collect::<Result<Vec<_>>>()?;
        let timeslots =
            TimeSlots::from_leaves(leaves).map_err(|e| self.replacement_error(&old, &new, e))?;

        let mut duration = 0;
        let mut parameters = ParameterTable::new();
        for (index, (time, child)) in children.iter().enumerate() {
            duration = duration.max(time + child.duration()?);
            parameters.register(ParameterSite::Child(index), child.parameters());
        }

        self.children = children;
        self.timeslots = timeslots;
        self.duration = duration;
        self.parameters = parameters;
        debug!("Replaced {} with {} in {}", old.name(), new.name(), self.name);
        Ok(self)
    }

    /// Copy of `self` with top-level `old` children replaced by `new`.
    ///
    /// Every child is re-inserted at its original offset.
    pub fn replace(
        &self,
        old: impl Into<ScheduleComponent<O>>,
        new: impl Into<ScheduleComponent<O>>,
    ) -> Result<Self> {
        let old = old.into();
        let new = new.into();
        let mut schedule = Self::initialize_from(self, None);
        for (time, child) in self.replaced_children(&old, &new) {
            schedule
                .place(time, child)
                .map_err(|e| self.replacement_error(&old, &new, e))?;
        }
        Ok(schedule)
    }

    pub fn replace_named(
        &self,
        old: impl Into<ScheduleComponent<O>>,
        new: impl Into<ScheduleComponent<O>>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let mut schedule = self.replace(old, new)?;
        schedule.name = name.into();
        Ok(schedule)
    }

    /// Free variables anywhere in the tree, ordered by identity.
    pub fn parameters(&self) -> Vec<Parameter> {
        self.parameters.parameters().cloned().collect()
    }

    pub fn is_parameterized(&self) -> bool {
        self.parameters.is_parameterized()
    }

    /// Free variables with the given display name.
    pub fn get_parameters(&self, name: &str) -> Vec<Parameter> {
        self.parameters.get_parameters(name)
    }

    /// Substitute `bindings` into every child referencing a bound parameter.
    ///
    /// Children not referencing any bound parameter are left alone. Shared
    /// nested schedules are copied before being rewritten.
    pub fn assign_parameters_in_place(&mut self, bindings: &Bindings) -> &mut Self {
        for site in self.parameters.sites_for(bindings) {
            if let ParameterSite::Child(index) = site {
                if let Some((_, child)) = self.children.get_mut(index) {
                    child.assign_in_place(bindings);
                    self.parameters.reregister(site, child.parameters());
                }
            }
        }
        self
    }

    pub fn assign_parameters(&self, bindings: &Bindings) -> Self {
        let mut schedule = self.clone();
        schedule.assign_parameters_in_place(bindings);
        schedule
    }

    /// Text form showing at most `limit` leaves.
    pub fn render(&self, limit: usize) -> String
    where
        O: fmt::Display,
    {
        let leaves = self.flatten();
        let mut parts: Vec<String> = leaves
            .iter()
            .take(limit)
            .map(|(time, op)| format!("({}, {})", time, op))
            .collect();
        if leaves.len() > limit {
            parts.push("...".to_string());
        }
        parts.push(format!("name=\"{}\"", self.name));
        format!("Schedule({})", parts.join(", "))
    }
}

impl<O: Operation> PartialEq for Schedule<O> {
    /// Structural equality over the flattened leaves.
    ///
    /// Two back-to-back delays of 10 are not equal to one delay of 20.
    fn eq(&self, other: &Self) -> bool {
        if self.channels() != other.channels() || self.len() != other.len() {
            return false;
        }
        self.flatten() == other.flatten()
    }
}

impl<O: Operation + fmt::Display> fmt::Display for Schedule<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_DISPLAY_LIMIT))
    }
}

/// `&a | b` inserts `b` into a copy of `a` at time 0.
impl<O: Operation, C: Into<ScheduleComponent<O>>> BitOr<C> for &Schedule<O> {
    type Output = Result<Schedule<O>>;

    fn bitor(self, rhs: C) -> Self::Output {
        self.insert(0, rhs)
    }
}

/// `&a + b` appends `b` to a copy of `a`.
impl<O: Operation, C: Into<ScheduleComponent<O>>> Add<C> for &Schedule<O> {
    type Output = Result<Schedule<O>>;

    fn add(self, rhs: C) -> Self::Output {
        self.append(rhs)
    }
}

/// `&a << t` shifts a copy of `a` by `t`.
impl<O: Operation> Shl<Time> for &Schedule<O> {
    type Output = Result<Schedule<O>>;

    fn shl(self, rhs: Time) -> Self::Output {
        self.shift(rhs)
    }
}
