//! Stack map frames
//!
//! Class files of version 50 and up carry a `StackMapTable` describing the types of locals and
//! stack entries at every branch target. Method bodies keep absolute frames keyed by label (see
//! [`CodeFrame`]) and only compress them into the delta-encoded table when serialized.

mod frame;
mod interpret;
mod types;

pub use frame::*;
pub use interpret::*;
pub use types::*;
