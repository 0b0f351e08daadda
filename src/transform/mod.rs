mod class_info;
mod constructor_routing;
mod context;
mod errors;
mod module;
mod rewriter;
mod runtime;
mod settings;
mod solution;
mod stages;
mod static_init;

pub use class_info::*;
pub use constructor_routing::emit_routing_chain;
pub use context::*;
pub use errors::*;
pub use module::*;
pub use rewriter::*;
pub use runtime::*;
pub use settings::*;
pub use solution::*;
pub use stages::ReservedSlot;
