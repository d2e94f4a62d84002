//! Value types shared by the schedule representations.

pub mod channel;
pub mod instruction;
pub mod interval;
pub mod macros;
pub mod parameter;

pub use channel::*;
pub use instruction::*;
pub use interval::*;
pub use parameter::*;
