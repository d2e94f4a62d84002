//! Scheduling algorithms.
//!
//! This module provides the interval bookkeeping, alignment and comparison
//! algorithms the schedule representations are built on.
//!
//! # Components
//!
//! - [`intervals`]: Overlap detection and staged sorted insertion over interval lists
//! - [`alignment`]: Alignment policies turning ordered children into offsets
//! - [`ordering`]: Dependency-ordered comparison of deferred children
//!
//! # Example
//!
//! ```
//! use schedule_engine::algorithms::{AlignmentKind, ChildExtent};
//! use schedule_engine::models::Channel;
//!
//! let d0 = Channel::drive(0);
//! let children = vec![ChildExtent::leaf(&[d0], 40), ChildExtent::leaf(&[d0], 20)];
//! let offsets = AlignmentKind::Sequential.compute_offsets(&children).unwrap();
//! assert_eq!(offsets, vec![0, 40]);
//! ```

pub mod alignment;
pub mod intervals;
pub mod ordering;

pub use alignment::{AlignmentKind, ChildExtent, Placement};
pub use intervals::{
    check_nonnegative, find_insertion_index, insert_sorted, insertion_indices, locate, overlaps,
};
pub use ordering::dependency_equivalent;
