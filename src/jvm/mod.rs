//! Read, manipulate, and write JVM classes
//!
//! ### Layers
//!
//!   - [`class_file`] mirrors the binary format: constant pool indices everywhere and attributes
//!     as opaque byte blobs until decoded
//!   - [`model`] resolves all of that into symbolic names and descriptors, with method bodies
//!     decoded into [`code::MethodCode`]
//!   - [`code`] is where instructions live, along with the decoder, the encoder, and a
//!     [`code::CodeBuilder`] for generating new bytecode
//!
//! ### Simple example
//!
//! Consider the following simple Java class:
//!
//! ```java,ignore,no_run
//! public class Point {
//!     public final int x;
//!
//!     public Point(int x) {
//!         this.x = x;
//!     }
//! }
//! ```
//!
//! Generating an analogous class file can be done as follows:
//!
//! ```
//! use gradejar::jvm::class_file::Version;
//! use gradejar::jvm::code::{BranchInstruction::*, CodeBuilder, Instruction::*, InvokeType};
//! use gradejar::jvm::model::{Class, Field, Method};
//! use gradejar::jvm::references::{FieldRef, MethodRef};
//! use gradejar::jvm::*;
//!
//! # fn generate_class() -> Result<Vec<u8>, Error> {
//! let point = BinaryName::from_string(String::from("me/alec/Point")).unwrap();
//! let x = UnqualifiedName::from_string(String::from("x")).unwrap();
//! let mut class = Class::new(
//!     class_file::Version::JAVA8,
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//!     point.clone(),
//!     Some(BinaryName::OBJECT),
//! );
//! class.fields.push(Field::new(
//!     FieldAccessFlags::PUBLIC | FieldAccessFlags::FINAL,
//!     x.clone(),
//!     FieldType::int(),
//! ));
//!
//! let mut constructor = Method::new(
//!     MethodAccessFlags::PUBLIC,
//!     UnqualifiedName::INIT,
//!     MethodDescriptor {
//!         parameters: vec![FieldType::int()],
//!         return_type: None,
//!     },
//! );
//! let object_init = MethodRef::new(
//!     BinaryName::OBJECT,
//!     UnqualifiedName::INIT,
//!     MethodDescriptor { parameters: vec![], return_type: None },
//! );
//! let field_x = FieldRef { class: point.clone(), name: x, descriptor: FieldType::int() };
//!
//! let mut code = CodeBuilder::new(&constructor.code_context(&point, Version::JAVA8));
//! code.push_instruction(ALoad(0))?;
//! code.push_instruction(Invoke(InvokeType::Special, object_init))?;
//! code.push_instruction(ALoad(0))?;
//! code.push_instruction(ILoad(1))?;
//! code.push_instruction(PutField(field_x))?;
//! code.push_branch_instruction(Return)?;
//! constructor.code = Some(code.result()?);
//! class.methods.push(constructor);
//!
//! // Finally, encode the class into bytes
//! class.to_bytes()
//! # }
//! # generate_class().unwrap();
//! ```

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
pub mod model;
mod names;
pub mod references;
pub mod signatures;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
