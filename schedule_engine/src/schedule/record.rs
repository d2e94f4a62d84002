//! JSON persistence of program trees.
//!
//! A record is the plain serializable image of a tree: name, metadata and
//! children, recursively. Loading a record rebuilds the tree through the
//! regular insert and append paths, so every invariant is checked again.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::algorithms::AlignmentKind;
use crate::error::{Error, ErrorContext, Result};
use crate::models::{Operation, ParameterValue, Time};
use crate::schedule::block::{BlockComponent, ScheduleBlock};
use crate::schedule::program::{Metadata, Schedule, ScheduleComponent};

/// Serializable image of a [`Schedule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>"))]
pub struct ScheduleRecord<O> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default)]
    pub children: Vec<ChildRecord<O>>,
}

/// One `(offset, component)` pair of a [`ScheduleRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>"))]
pub struct ChildRecord<O> {
    pub offset: Time,
    pub component: ComponentRecord<O>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "O: Deserialize<'de>"))]
pub enum ComponentRecord<O> {
    Instruction(O),
    Schedule(ScheduleRecord<O>),
}

/// Serializable state of an alignment policy.
///
/// Custom placement functions have no serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentRecord {
    Left,
    Right,
    Sequential,
    Equispaced { duration: ParameterValue },
}

impl TryFrom<&AlignmentKind> for AlignmentRecord {
    type Error = Error;

    fn try_from(alignment: &AlignmentKind) -> Result<Self> {
        match alignment {
            AlignmentKind::Left => Ok(AlignmentRecord::Left),
            AlignmentKind::Right => Ok(AlignmentRecord::Right),
            AlignmentKind::Sequential => Ok(AlignmentRecord::Sequential),
            AlignmentKind::Equispaced { duration } => Ok(AlignmentRecord::Equispaced {
                duration: duration.clone(),
            }),
            AlignmentKind::Func { placement, .. } => Err(Error::unsupported(format!(
                "Placement function '{}' cannot be serialized",
                placement.name()
            ))
            .with_context(ErrorContext::new("to_record"))),
        }
    }
}

impl From<AlignmentRecord> for AlignmentKind {
    fn from(record: AlignmentRecord) -> Self {
        match record {
            AlignmentRecord::Left => AlignmentKind::Left,
            AlignmentRecord::Right => AlignmentKind::Right,
            AlignmentRecord::Sequential => AlignmentKind::Sequential,
            AlignmentRecord::Equispaced { duration } => AlignmentKind::Equispaced { duration },
        }
    }
}

/// Serializable image of a [`ScheduleBlock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>"))]
pub struct BlockRecord<O> {
    pub name: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub alignment: AlignmentRecord,
    #[serde(default)]
    pub blocks: Vec<BlockComponentRecord<O>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "O: Deserialize<'de>"))]
pub enum BlockComponentRecord<O> {
    Instruction(O),
    Block(BlockRecord<O>),
}

impl<O: Operation> Schedule<O> {
    pub fn to_record(&self) -> ScheduleRecord<O> {
        ScheduleRecord {
            name: self.name().to_string(),
            metadata: self.metadata().clone(),
            children: self
                .children()
                .iter()
                .map(|(offset, child)| ChildRecord {
                    offset: *offset,
                    component: match child {
                        ScheduleComponent::Instruction(op) => ComponentRecord::Instruction(op.clone()),
                        ScheduleComponent::Schedule(s) => ComponentRecord::Schedule(s.to_record()),
                    },
                })
                .collect(),
        }
    }

    /// Rebuild a schedule, re-validating every insertion.
    pub fn from_record(record: ScheduleRecord<O>) -> Result<Self> {
        let mut schedule = Schedule::with_name(record.name).with_metadata(record.metadata);
        for child in record.children {
            let component = match child.component {
                ComponentRecord::Instruction(op) => ScheduleComponent::Instruction(op),
                ComponentRecord::Schedule(nested) => {
                    ScheduleComponent::Schedule(Arc::new(Schedule::from_record(nested)?))
                }
            };
            schedule.place(child.offset, component)?;
        }
        Ok(schedule)
    }

    pub fn to_json(&self) -> Result<String>
    where
        O: Serialize,
    {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    pub fn from_json(json: &str) -> Result<Self>
    where
        O: DeserializeOwned,
    {
        let record: ScheduleRecord<O> = serde_json::from_str(json)?;
        Self::from_record(record)
    }
}

impl<O: Operation> ScheduleBlock<O> {
    /// Fails with an Unsupported error if any alignment uses a placement function.
    pub fn to_record(&self) -> Result<BlockRecord<O>> {
        let blocks = self
            .blocks()
            .iter()
            .map(|block| {
                Ok(match block {
                    BlockComponent::Instruction(op) => BlockComponentRecord::Instruction(op.clone()),
                    BlockComponent::Block(inner) => BlockComponentRecord::Block(inner.to_record()?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BlockRecord {
            name: self.name().to_string(),
            metadata: self.metadata().clone(),
            alignment: AlignmentRecord::try_from(self.alignment())?,
            blocks,
        })
    }

    pub fn from_record(record: BlockRecord<O>) -> Self {
        let mut block = ScheduleBlock::with_name(record.name)
            .with_metadata(record.metadata)
            .with_alignment(record.alignment.into());
        for child in record.blocks {
            match child {
                BlockComponentRecord::Instruction(op) => block.append_in_place(op),
                BlockComponentRecord::Block(nested) => {
                    block.append_in_place(ScheduleBlock::from_record(nested))
                }
            };
        }
        block
    }

    pub fn to_json(&self) -> Result<String>
    where
        O: Serialize,
    {
        Ok(serde_json::to_string_pretty(&self.to_record()?)?)
    }

    pub fn from_json(json: &str) -> Result<Self>
    where
        O: DeserializeOwned,
    {
        let record: BlockRecord<O> = serde_json::from_str(json)?;
        Ok(Self::from_record(record))
    }
}
