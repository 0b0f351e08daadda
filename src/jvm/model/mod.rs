//! Semantic representations of classes
//!
//! This is the representation to use while rewriting classes. Everything the class file stores
//! as constant pool indices is resolved into symbolic names, descriptors, and constants, and
//! method bodies are decoded into [`MethodCode`](crate::jvm::code::MethodCode).
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`]
//!   - __Field__ is represented using [`Field`]
//!
//! Converting back into a [`ClassFile`](crate::jvm::class_file::ClassFile) builds a fresh
//! constant pool (including the `BootstrapMethods` table), so the model can be freely edited in
//! between.

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
