//! Leaf operations.
//!
//! The engine only needs a narrow capability from its leaves, captured by the
//! [`Operation`] trait. [`Instruction`] is a ready-made implementation covering
//! the usual control-hardware vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::models::{Bindings, Channel, Parameter, ParameterValue, Time};

/// Capability required from an atomic leaf of a program.
///
/// Equality is structural: two leaves with equivalent effects but different
/// representations compare unequal.
pub trait Operation: Clone + PartialEq + fmt::Debug {
    /// Leaf type used by kind filters.
    type Kind: Copy + Eq + Hash + fmt::Debug;

    /// Channels this leaf occupies, sorted and without duplicates.
    fn channels(&self) -> &[Channel];

    /// Duration, possibly still parametric.
    fn duration(&self) -> &ParameterValue;

    fn kind(&self) -> Self::Kind;

    /// Free variables referenced anywhere in this leaf.
    fn parameters(&self) -> Vec<Parameter>;

    /// Copy of this leaf with `bindings` substituted.
    fn assign(&self, bindings: &Bindings) -> Self;
}

/// Validate and extract a leaf's concrete duration.
///
/// Fails with a Timing error for negative or non-integral durations and with a
/// Scheduling error while the duration is still a free parameter.
pub fn concrete_duration<O: Operation>(op: &O) -> Result<Time> {
    match op.duration() {
        ParameterValue::Int(d) if *d >= 0 => Ok(*d),
        ParameterValue::Int(d) => Err(Error::timing(format!(
            "Instruction duration must be a non-negative integer, got {}",
            d
        ))),
        ParameterValue::Float(d) => Err(Error::timing(format!(
            "Instruction duration must be an integer, got {}",
            d
        ))),
        ParameterValue::Parameter(p) => Err(Error::scheduling(format!(
            "Instruction duration '{}' is not assigned",
            p
        ))),
    }
}

/// Kinds of [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Play,
    Delay,
    Acquire,
    ShiftPhase,
    SetFrequency,
    Barrier,
}

impl InstructionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionKind::Play => "Play",
            InstructionKind::Delay => "Delay",
            InstructionKind::Acquire => "Acquire",
            InstructionKind::ShiftPhase => "ShiftPhase",
            InstructionKind::SetFrequency => "SetFrequency",
            InstructionKind::Barrier => "Barrier",
        }
    }
}

/// Default leaf implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    kind: InstructionKind,
    duration: ParameterValue,
    channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    operands: BTreeMap<String, ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Instruction {
    /// Build an instruction; channels are sorted and deduplicated.
    pub fn new(
        kind: InstructionKind,
        duration: impl Into<ParameterValue>,
        channels: impl IntoIterator<Item = Channel>,
    ) -> Self {
        let mut channels: Vec<Channel> = channels.into_iter().collect();
        channels.sort();
        channels.dedup();
        Self {
            kind,
            duration: duration.into(),
            channels,
            operands: BTreeMap::new(),
            name: None,
        }
    }

    pub fn play(duration: impl Into<ParameterValue>, channel: Channel) -> Self {
        Self::new(InstructionKind::Play, duration, [channel])
    }

    pub fn delay(duration: impl Into<ParameterValue>, channel: Channel) -> Self {
        Self::new(InstructionKind::Delay, duration, [channel])
    }

    pub fn acquire(duration: impl Into<ParameterValue>, channel: Channel, slot: Channel) -> Self {
        Self::new(InstructionKind::Acquire, duration, [channel, slot])
    }

    pub fn shift_phase(phase: impl Into<ParameterValue>, channel: Channel) -> Self {
        Self::new(InstructionKind::ShiftPhase, 0, [channel]).with_operand("phase", phase)
    }

    pub fn set_frequency(frequency: impl Into<ParameterValue>, channel: Channel) -> Self {
        Self::new(InstructionKind::SetFrequency, 0, [channel]).with_operand("frequency", frequency)
    }

    pub fn barrier(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self::new(InstructionKind::Barrier, 0, channels)
    }

    /// Attach a named operand (amplitude, phase, ...).
    pub fn with_operand(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.operands.insert(key.into(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn operand(&self, key: &str) -> Option<&ParameterValue> {
        self.operands.get(key)
    }

    pub fn operands(&self) -> &BTreeMap<String, ParameterValue> {
        &self.operands
    }
}

impl Operation for Instruction {
    type Kind = InstructionKind;

    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn duration(&self) -> &ParameterValue {
        &self.duration
    }

    fn kind(&self) -> InstructionKind {
        self.kind
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params: Vec<Parameter> = std::iter::once(&self.duration)
            .chain(self.operands.values())
            .filter_map(|v| v.as_parameter().cloned())
            .collect();
        params.sort();
        params.dedup();
        params
    }

    fn assign(&self, bindings: &Bindings) -> Self {
        Self {
            kind: self.kind,
            duration: self.duration.resolve(bindings),
            channels: self.channels.clone(),
            operands: self
                .operands
                .iter()
                .map(|(k, v)| (k.clone(), v.resolve(bindings)))
                .collect(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind.as_str(), self.duration)?;
        for channel in &self.channels {
            write!(f, ", {}", channel)?;
        }
        for (key, value) in &self.operands {
            write!(f, ", {}={}", key, value)?;
        }
        if let Some(name) = &self.name {
            write!(f, ", name={}", name)?;
        }
        write!(f, ")")
    }
}
