//! Deferred program tree.
//!
//! A [`ScheduleBlock`] keeps its children in order without start times. The
//! alignment policy decides the offsets when the block is converted with
//! [`ScheduleBlock::to_schedule`], which requires every duration to be
//! concrete.

use log::debug;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use crate::algorithms::{dependency_equivalent, AlignmentKind, ChildExtent};
use crate::error::{Error, ErrorContext, Result};
use crate::models::{concrete_duration, Bindings, Channel, Instruction, Operation, Parameter, Time};
use crate::schedule::filter::Filter;
use crate::schedule::naming::BLOCK_NAMER;
use crate::schedule::program::{Metadata, Schedule, ScheduleComponent, DEFAULT_DISPLAY_LIMIT};
use crate::schedule::registry::{ParameterSite, ParameterTable};

/// A child of a [`ScheduleBlock`].
#[derive(Debug, Clone)]
pub enum BlockComponent<O: Operation = Instruction> {
    Instruction(O),
    Block(Arc<ScheduleBlock<O>>),
}

impl<O: Operation> BlockComponent<O> {
    /// Channels occupied by this component, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            BlockComponent::Instruction(op) => op.channels().to_vec(),
            BlockComponent::Block(block) => block.channels(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            BlockComponent::Instruction(op) => format!("{:?}", op.kind()),
            BlockComponent::Block(block) => block.name().to_string(),
        }
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        match self {
            BlockComponent::Instruction(op) => op.parameters(),
            BlockComponent::Block(block) => block.parameters(),
        }
    }

    fn collect_unassigned(&self, out: &mut Vec<String>) {
        match self {
            BlockComponent::Instruction(op) => {
                if let Some(p) = op.duration().as_parameter() {
                    out.push(p.name().to_string());
                }
            }
            BlockComponent::Block(block) => block.collect_unassigned(out),
        }
    }

    fn contains(&self, target: &BlockComponent<O>) -> bool {
        match self {
            BlockComponent::Instruction(_) => false,
            BlockComponent::Block(block) => block
                .blocks
                .iter()
                .any(|child| child == target || child.contains(target)),
        }
    }

    fn assign_in_place(&mut self, bindings: &Bindings) {
        match self {
            BlockComponent::Instruction(op) => *op = op.assign(bindings),
            BlockComponent::Block(block) => {
                Arc::make_mut(block).assign_parameters_in_place(bindings);
            }
        }
    }

    /// Footprint and eager form of this child.
    fn to_eager(&self) -> Result<(ChildExtent, ScheduleComponent<O>)> {
        match self {
            BlockComponent::Instruction(op) => {
                let duration = concrete_duration(op)?;
                Ok((
                    ChildExtent::leaf(op.channels(), duration),
                    ScheduleComponent::Instruction(op.clone()),
                ))
            }
            BlockComponent::Block(block) => {
                let schedule = block.to_schedule()?;
                let extent = ChildExtent {
                    duration: schedule.duration(),
                    spans: schedule
                        .channels()
                        .into_iter()
                        .map(|ch| (ch, (schedule.ch_start_time(&[ch]), schedule.ch_stop_time(&[ch]))))
                        .collect(),
                };
                Ok((extent, ScheduleComponent::from(schedule)))
            }
        }
    }
}

impl<O: Operation> PartialEq for BlockComponent<O> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BlockComponent::Instruction(a), BlockComponent::Instruction(b)) => a == b,
            (BlockComponent::Block(a), BlockComponent::Block(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl<O: Operation> From<O> for BlockComponent<O> {
    fn from(op: O) -> Self {
        BlockComponent::Instruction(op)
    }
}

impl<O: Operation> From<ScheduleBlock<O>> for BlockComponent<O> {
    fn from(block: ScheduleBlock<O>) -> Self {
        BlockComponent::Block(Arc::new(block))
    }
}

impl<O: Operation> From<Arc<ScheduleBlock<O>>> for BlockComponent<O> {
    fn from(block: Arc<ScheduleBlock<O>>) -> Self {
        BlockComponent::Block(block)
    }
}

/// Ordered children whose timing is settled by an alignment policy.
#[derive(Debug, Clone)]
pub struct ScheduleBlock<O: Operation = Instruction> {
    name: String,
    metadata: Metadata,
    alignment: AlignmentKind,
    blocks: Vec<BlockComponent<O>>,
    parameters: ParameterTable,
}

impl<O: Operation> Default for ScheduleBlock<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operation> ScheduleBlock<O> {
    /// Empty left-aligned block with an automatically generated name.
    pub fn new() -> Self {
        Self::with_name(BLOCK_NAMER.next_name())
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata::new(),
            alignment: AlignmentKind::default(),
            blocks: Vec::new(),
            parameters: ParameterTable::new(),
        }
    }

    pub fn with_alignment(mut self, alignment: AlignmentKind) -> Self {
        self.parameters
            .reregister(ParameterSite::Alignment, alignment.parameters());
        self.alignment = alignment;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Empty block carrying `other`'s name (or `name`), metadata and alignment.
    pub fn initialize_from(other: &ScheduleBlock<O>, name: Option<&str>) -> Self {
        Self::with_name(name.unwrap_or(&other.name))
            .with_metadata(other.metadata.clone())
            .with_alignment(other.alignment.clone())
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

    pub fn alignment(&self) -> &AlignmentKind {
        &self.alignment
    }

    pub fn blocks(&self) -> &[BlockComponent<O>] {
        &self.blocks
    }

    /// Union of the children's channels, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        let channels: BTreeSet<Channel> = self.blocks.iter().flat_map(|b| b.channels()).collect();
        channels.into_iter().collect()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn append_in_place(&mut self, component: impl Into<BlockComponent<O>>) -> &mut Self {
        let component = component.into();
        self.parameters
            .register(ParameterSite::Child(self.blocks.len()), component.parameters());
        self.blocks.push(component);
        self
    }

    pub fn append(&self, component: impl Into<BlockComponent<O>>) -> Self {
        let mut block = self.clone();
        block.append_in_place(component);
        block
    }

    pub fn append_named(
        &self,
        component: impl Into<BlockComponent<O>>,
        name: impl Into<String>,
    ) -> Self {
        let mut block = self.append(component);
        block.name = name.into();
        block
    }

    fn collect_unassigned(&self, out: &mut Vec<String>) {
        out.extend(self.alignment.parameters().iter().map(|p| p.name().to_string()));
        for block in &self.blocks {
            block.collect_unassigned(out);
        }
    }

    /// True when the alignment and every leaf duration, recursively, are assigned.
    pub fn is_schedulable(&self) -> bool {
        let mut unassigned = Vec::new();
        self.collect_unassigned(&mut unassigned);
        unassigned.is_empty()
    }

    /// Convert to an eager [`Schedule`] using the alignment policy.
    ///
    /// Nested blocks become nested schedules. Fails with a Scheduling error
    /// while a duration or alignment parameter is unassigned.
    pub fn to_schedule(&self) -> Result<Schedule<O>> {
        let context = || ErrorContext::new("to_schedule").with_target(self.name.clone());

        let mut unassigned = Vec::new();
        self.collect_unassigned(&mut unassigned);
        if !unassigned.is_empty() {
            unassigned.sort();
            unassigned.dedup();
            return Err(Error::scheduling(format!(
                "Block {} is not schedulable, unassigned durations: {}",
                self.name,
                unassigned.join(", ")
            ))
            .with_context(context()));
        }

        let mut extents = Vec::with_capacity(self.blocks.len());
        let mut components = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (extent, component) = block.to_eager()?;
            extents.push(extent);
            components.push(component);
        }
        let offsets = self
            .alignment
            .compute_offsets(&extents)
            .map_err(|e| e.with_context(context()))?;

        let mut schedule = Schedule::with_name(self.name.clone()).with_metadata(self.metadata.clone());
        for (offset, component) in offsets.into_iter().zip(components) {
            schedule.insert_in_place(offset, component)?;
        }
        debug!(
            "Converted {} with {} to a schedule of duration {}",
            self.name,
            self.alignment,
            schedule.duration()
        );
        Ok(schedule)
    }

    /// Duration once aligned.
    pub fn duration(&self) -> Result<Time> {
        Ok(self.to_schedule()?.duration())
    }

    /// Time from 0 until `channels` are done, once aligned.
    pub fn ch_duration(&self, channels: &[Channel]) -> Result<Time> {
        Ok(self.to_schedule()?.ch_duration(channels))
    }

    /// Flattened leaves with absolute times, once aligned.
    pub fn flatten(&self) -> Result<Vec<(Time, O)>> {
        let schedule = self.to_schedule()?;
        Ok(schedule
            .flatten()
            .into_iter()
            .map(|(time, op)| (time, op.clone()))
            .collect())
    }

    fn unsupported(&self, operation: &str) -> Error {
        Error::unsupported(format!(
            "{} is not supported on a ScheduleBlock, convert it with to_schedule first",
            operation
        ))
        .with_context(ErrorContext::new(operation).with_target(self.name.clone()))
    }

    /// Always fails: leaves of a block have no start time to filter on.
    pub fn filter(&self, _filter: &Filter<O>) -> Result<ScheduleBlock<O>> {
        Err(self.unsupported("filter"))
    }

    /// Always fails, see [`ScheduleBlock::filter`].
    pub fn exclude(&self, _filter: &Filter<O>) -> Result<ScheduleBlock<O>> {
        Err(self.unsupported("exclude"))
    }

    fn rebuild_parameters(&mut self) {
        let mut parameters = ParameterTable::new();
        parameters.register(ParameterSite::Alignment, self.alignment.parameters());
        for (index, block) in self.blocks.iter().enumerate() {
            parameters.register(ParameterSite::Child(index), block.parameters());
        }
        self.parameters = parameters;
    }

    fn replace_matching(&mut self, old: &BlockComponent<O>, new: &BlockComponent<O>) {
        for block in &mut self.blocks {
            if block == old {
                *block = new.clone();
            } else if block.contains(old) {
                if let BlockComponent::Block(inner) = block {
                    Arc::make_mut(inner).replace_matching(old, new);
                }
            }
        }
        self.rebuild_parameters();
    }

    /// Replace every child equal to `old` with `new`, descending into nested blocks.
    pub fn replace_in_place(
        &mut self,
        old: impl Into<BlockComponent<O>>,
        new: impl Into<BlockComponent<O>>,
    ) -> &mut Self {
        let old = old.into();
        let new = new.into();
        self.replace_matching(&old, &new);
        debug!("Replaced {} with {} in {}", old.name(), new.name(), self.name);
        self
    }

    pub fn replace(
        &self,
        old: impl Into<BlockComponent<O>>,
        new: impl Into<BlockComponent<O>>,
    ) -> Self {
        let mut block = self.clone();
        block.replace_in_place(old, new);
        block
    }

    pub fn replace_named(
        &self,
        old: impl Into<BlockComponent<O>>,
        new: impl Into<BlockComponent<O>>,
        name: impl Into<String>,
    ) -> Self {
        let mut block = self.replace(old, new);
        block.name = name.into();
        block
    }

    /// Free variables of the children and of the alignment, ordered by identity.
    pub fn parameters(&self) -> Vec<Parameter> {
        self.parameters.parameters().cloned().collect()
    }

    pub fn is_parameterized(&self) -> bool {
        self.parameters.is_parameterized()
    }

    pub fn get_parameters(&self, name: &str) -> Vec<Parameter> {
        self.parameters.get_parameters(name)
    }

    /// Substitute `bindings` into the sites referencing a bound parameter.
    pub fn assign_parameters_in_place(&mut self, bindings: &Bindings) -> &mut Self {
        for site in self.parameters.sites_for(bindings) {
            match site {
                ParameterSite::Alignment => {
                    self.alignment = self.alignment.assign(bindings);
                    self.parameters.reregister(site, self.alignment.parameters());
                }
                ParameterSite::Child(index) => {
                    if let Some(block) = self.blocks.get_mut(index) {
                        block.assign_in_place(bindings);
                        self.parameters.reregister(site, block.parameters());
                    }
                }
            }
        }
        self
    }

    pub fn assign_parameters(&self, bindings: &Bindings) -> Self {
        let mut block = self.clone();
        block.assign_parameters_in_place(bindings);
        block
    }

    /// Substitute `bindings` and convert to an eager schedule.
    ///
    /// Fails with an Unbound error if any free variable remains afterwards.
    pub fn resolve(&self, bindings: &Bindings) -> Result<Schedule<O>> {
        let assigned = self.assign_parameters(bindings);
        let remaining = assigned.parameters();
        if !remaining.is_empty() {
            return Err(
                Error::unbound(remaining.iter().map(|p| p.name().to_string()).collect())
                    .with_context(ErrorContext::new("resolve").with_target(self.name.clone())),
            );
        }
        assigned.to_schedule()
    }

    /// Text form showing at most `limit` children.
    pub fn render(&self, limit: usize) -> String
    where
        O: fmt::Display,
    {
        let mut parts: Vec<String> = self
            .blocks
            .iter()
            .take(limit)
            .map(|block| match block {
                BlockComponent::Instruction(op) => op.to_string(),
                BlockComponent::Block(inner) => inner.render(limit),
            })
            .collect();
        if self.blocks.len() > limit {
            parts.push("...".to_string());
        }
        parts.push(format!("name=\"{}\"", self.name));
        parts.push(format!("transform={}", self.alignment));
        format!("ScheduleBlock({})", parts.join(", "))
    }
}

impl<O: Operation> PartialEq for ScheduleBlock<O> {
    /// Equal under the reordering freedom the alignment allows.
    ///
    /// Left and right aligned blocks compare children as dependency graphs
    /// over shared channels; every other policy compares them in order.
    fn eq(&self, other: &Self) -> bool {
        self.alignment == other.alignment
            && self.channels() == other.channels()
            && dependency_equivalent(
                &self.blocks,
                &other.blocks,
                self.alignment.is_sequential(),
                BlockComponent::channels,
                |a, b| a == b,
            )
    }
}

impl<O: Operation + fmt::Display> fmt::Display for ScheduleBlock<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(DEFAULT_DISPLAY_LIMIT))
    }
}

/// `&a + b` appends `b` to a copy of `a`.
impl<O: Operation, C: Into<BlockComponent<O>>> Add<C> for &ScheduleBlock<O> {
    type Output = ScheduleBlock<O>;

    fn add(self, rhs: C) -> Self::Output {
        self.append(rhs)
    }
}
