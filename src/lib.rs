pub mod header;
pub mod jvm;
pub mod matching;
pub mod transform;
mod util;
