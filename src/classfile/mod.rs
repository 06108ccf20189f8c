//! The class file structural model.
//!
//! This module holds the in-memory representation of JVM classes that transformation passes
//! operate on:
//!
//! - [`crate::classfile::ConstantPool`] - Tagged, deduplicated constants with typed accessors
//! - [`crate::classfile::Class`] and [`crate::classfile::Member`] - The class and its fields
//!   and methods
//! - [`crate::classfile::Attribute`] and [`crate::classfile::CodeAttribute`] - Attributes,
//!   with method bodies as the richest variant
//! - [`crate::classfile::ClassPool`] and [`crate::classfile::Linker`] - The set of loaded
//!   classes and the population of resolved references
//!
//! Binary decoding and encoding of whole classes happens outside this crate; decoders build
//! the model through [`crate::classfile::ConstantPool::from_entries`],
//! [`crate::classfile::Class::new`] and [`crate::classfile::CodeAttribute::from_bytes`].

mod attribute;
mod class;
mod classpool;
mod code;
mod constpool;
pub mod descriptor;
mod flags;
mod linker;
mod member;
mod resolved;

pub use attribute::{
    Attribute, BootstrapMethod, IndexSite, IndexUse, InnerClass, LineNumber, LocalVariable,
    LOADABLE_KINDS,
};
pub use class::{Class, DEFAULT_MAJOR_VERSION};
pub use classpool::ClassPool;
pub use code::{CodeAttribute, CodeEntry, ExceptionEntry};
pub use constpool::{
    Constant, ConstantKey, ConstantKind, ConstantPool, MemberRef, PoolEntry, PrimitiveArray,
    PrimitiveKind, ReferenceKind, MAX_POOL_ENTRIES,
};
pub use flags::{ClassAccessFlags, MemberAccessFlags, ProcessingFlags};
pub use linker::Linker;
pub use member::{Member, MemberKind};
pub use resolved::{ClassKey, MemberKey, ResolvedRef};
