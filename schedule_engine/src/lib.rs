//! # Schedule Engine
//!
//! Temporal composition engine for channel-scoped timed operations.
//!
//! Every operation occupies a half-open interval `[start, stop)` on one or
//! more channels. The engine guarantees that no two operations ever overlap on
//! the same channel, while letting whole sub-programs be composed into larger
//! ones at arbitrary offsets.
//!
//! ## Features
//!
//! - **Eager programs**: [`Schedule`] keeps concrete offsets and rejects
//!   overlaps on insertion, with copy-on-write and in-place editing
//! - **Deferred programs**: [`ScheduleBlock`] keeps ordered children and
//!   settles their timing through an alignment policy
//! - **Parameters**: free variables in durations, operands and policies,
//!   tracked per site and substituted in bulk
//! - **Persistence**: JSON records rebuilt through the validating paths
//!
//! ## Architecture
//!
//! - [`models`]: Channels, intervals, parameters and leaf operations
//! - [`algorithms`]: Interval algebra, alignment policies, block comparison
//! - [`schedule`]: Program trees, timeslot maps, filters and naming
//! - [`config`]: TOML engine configuration
//! - [`error`]: Error kinds shared by every operation
//!
//! ## Example
//!
//! ```
//! use schedule_engine::models::{Channel, Instruction};
//! use schedule_engine::Schedule;
//!
//! let d0 = Channel::drive(0);
//! let mut sched: Schedule = Schedule::with_name("example");
//! sched.insert_in_place(0, Instruction::play(100, d0)).unwrap();
//! sched.append_in_place(Instruction::play(50, d0)).unwrap();
//! assert_eq!(sched.duration(), 150);
//!
//! assert!(sched.insert(50, Instruction::play(50, d0)).is_err());
//! ```

// Overlap errors carry both ranges and a full context for debugging.
#![allow(clippy::result_large_err)]

pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod schedule;

pub use algorithms::AlignmentKind;
pub use config::EngineConfig;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use schedule::{Composer, Filter, Schedule, ScheduleBlock, ScheduleComponent, TimeSlots};
