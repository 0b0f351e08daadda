//! Bytecode representation, decoding, encoding and generation
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is the part of the class file that matters most when rewriting submissions. We
//! split up the [list of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may branch
//!
//! A method body ([`MethodCode`]) is a flat sequence of both, interleaved with labels. Byte
//! offsets only exist in the serialized form: [`MethodCode::decode`] turns every offset into a
//! label and [`MethodCode::encode`] lays the body back out, widening jumps that no longer fit.
//!
//! ### Code generation
//!
//! Since the JVM also needs frames at branch targets (see [`crate::jvm::verifier`]), generating
//! valid bytecode by hand is tedious and error prone. [`CodeBuilder`] provides an interface for
//! generating method code from top to bottom while tracking frames incrementally.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod code;
mod code_builder;
mod code_builder_exts;
mod decode;
mod encode;
mod instructions;
pub mod jump_encoding;
mod label;

pub use code::*;
pub use code_builder::*;
pub use code_builder_exts::*;
pub use instructions::*;
pub use label::*;
