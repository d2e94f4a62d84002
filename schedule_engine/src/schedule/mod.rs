//! Program trees.
//!
//! - [`Schedule`]: eager tree with concrete offsets and overlap checking
//! - [`ScheduleBlock`]: deferred tree aligned on conversion
//! - [`TimeSlots`]: per-channel interval map backing a schedule
//! - [`ParameterTable`]: free-variable locations inside a tree
//! - [`Filter`]: leaf selection for `filter`/`exclude`
//! - [`Composer`]: configured factory with its own naming counters

pub mod block;
pub mod composer;
pub mod filter;
pub mod naming;
pub mod program;
pub mod record;
pub mod registry;
pub mod timeslots;

pub use block::{BlockComponent, ScheduleBlock};
pub use composer::Composer;
pub use filter::Filter;
pub use naming::Namer;
pub use program::{Metadata, Schedule, ScheduleComponent, DEFAULT_DISPLAY_LIMIT};
pub use record::{
    AlignmentRecord, BlockComponentRecord, BlockRecord, ChildRecord, ComponentRecord,
    ScheduleRecord,
};
pub use registry::{ParameterSite, ParameterTable};
pub use timeslots::TimeSlots;
