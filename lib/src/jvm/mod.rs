//! Editable model of JVM classes
//!
//! This is the substrate the weaver operates on: classes, their members, and method bodies as
//! streams of instructions. Compared to a class file, everything is resolved and inlined (no
//! constant pool, no byte offsets), which makes it easy to inspect and rewrite.
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
//! Building an analogous model and encoding it into a unit image can be done as follows:
//!
//! ```
//! use qualweave::jvm::model::{ClassModel, FieldModel, MethodModel};
//! use qualweave::jvm::code::{BranchInstruction::*, CodeBuilder, FieldRef, Instruction::*, InvokeType, MethodRef};
//! use qualweave::jvm::codec::{ClassCodec, UnitImageCodec};
//! use qualweave::jvm::*;
//!
//! # fn generate_class() -> Result<(), Error> {
//! let name = BinaryName::from_string(String::from("com/example/Point")).unwrap();
//! let mut class = ClassModel::new(name.clone(), Some(BinaryName::OBJECT), ClassAccessFlags::PUBLIC);
//!
//! let x = UnqualifiedName::from_string(String::from("x")).unwrap();
//! class.add_field(FieldModel::new(x.clone(), FieldType::int(), FieldAccessFlags::PUBLIC));
//!
//! let descriptor = MethodDescriptor {
//!     parameters: vec![FieldType::int()],
//!     return_type: None,
//! };
//! let mut constructor = MethodModel::new(UnqualifiedName::INIT, descriptor, MethodAccessFlags::PUBLIC);
//!
//! // Generate the constructor method body
//! let mut code = CodeBuilder::new(2);
//! code.push_instruction(ALoad(0));
//! code.push_instruction(Invoke(
//!     InvokeType::Special,
//!     MethodRef {
//!         owner: BinaryName::OBJECT,
//!         name: UnqualifiedName::INIT,
//!         descriptor: MethodDescriptor { parameters: vec![], return_type: None },
//!     },
//! ));
//! code.push_instruction(ALoad(0));
//! code.push_instruction(ILoad(1));
//! code.push_instruction(PutField(FieldRef { owner: name, name: x, descriptor: FieldType::int() }));
//! code.push_branch_instruction(Return);
//! constructor.code = Some(code.result(vec![])?);
//! class.add_method(constructor);
//!
//! // Finally, encode the class into bytes
//! let bytes: Vec<u8> = UnitImageCodec.emit(&class)?;
//! # assert_eq!(UnitImageCodec.parse(&bytes)?, class);
//! # Ok(())
//! # }
//! # generate_class().unwrap();
//! ```

mod access_flags;
pub mod annotations;
mod binary_format;
pub mod code;
pub mod codec;
mod descriptors;
mod errors;
pub mod model;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use binary_format::*;
pub use code::SynLabel;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
