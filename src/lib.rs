// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # classforge
//!
//! An in-memory model and editing engine for JVM class files. `classforge` is the layer that
//! bytecode transformation passes (shrinking, optimization, obfuscation, desugaring) are built
//! on: it holds classes in a structured form and provides the primitives to change them while
//! keeping every cross-reference consistent.
//!
//! ## Features
//!
//! - **Typed constant pool** - Tagged constants with automatic deduplication and checked
//!   indices
//! - **Constant transplanting** - Memoized copying of constants, including their transitive
//!   children and bootstrap methods, between classes
//! - **Code composition** - Method bodies assembled from fragments with old-to-new offset
//!   translation, branch widening to a fix-point and exception table translation
//! - **Reference rewriting** - Redirection of class and member references, member copying
//!   with renaming, and reference queries
//! - **Diagnostics** - Policy decisions reported to a shared, thread-safe sink rather than
//!   logged
//!
//! ## Quick Start
//!
//! ```rust
//! use classforge::prelude::*;
//!
//! let mut pool = ConstantPool::new();
//! let mut editor = ConstantPoolEditor::new(&mut pool);
//!
//! let first = editor.add_method_ref("demo/Api", "run", "()V")?;
//! let second = editor.add_method_ref("demo/Api", "run", "()V")?;
//! assert_eq!(first, second);
//! # Ok::<(), classforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `classforge` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`classfile`] - The class, member, attribute and constant pool model
//! - [`assembly`] - Opcodes, canonical instructions, encoding and decoding
//! - [`classedit`] - The editing components
//! - [`diagnostics`] - The reporting sink shared by the editing components
//! - [`Error`] and [`Result`] - Error handling
//!
//! Reading and writing whole class files, control-flow analysis, stack map frame
//! computation and the transformation passes themselves live outside this crate.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use classforge::prelude::*;
///
/// let config = EditorConfig::default().with_collision_policy(CollisionPolicy::Reject);
/// assert_eq!(config.collision_policy, CollisionPolicy::Reject);
/// ```
pub mod prelude;

/// JVM instruction set support: opcodes, canonical instructions, encoding and decoding.
///
/// # Example
///
/// ```rust
/// use classforge::assembly::{Instruction, Opcode};
///
/// let load = Instruction::variable(Opcode::Aload, 0);
/// assert_eq!(load.opcode(), Opcode::Aload);
/// ```
pub mod assembly;

/// The structural class file model.
///
/// See [`classfile::Class`], [`classfile::ConstantPool`] and [`classfile::CodeAttribute`].
pub mod classfile;

/// Editing components operating on the class model.
pub mod classedit;

/// Limits and policies of the editing components.
pub mod config;

/// Reporting sink for policy decisions taken during editing.
pub mod diagnostics;

/// Low-level byte stream parsing.
pub mod file;

#[cfg(test)]
mod test;

/// `classforge` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use classforge::{classfile::ConstantPool, Result};
///
/// fn string_value(pool: &ConstantPool, index: u16) -> Result<&str> {
///     pool.utf8(index)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `classforge` Error type
///
/// The main error type for all operations in this crate. Structural violations abort the
/// operation that raised them; policy decisions are reported through
/// [`diagnostics::Diagnostics`] instead.
///
/// # Examples
///
/// ```rust
/// use classforge::{classfile::ConstantPool, Error};
///
/// let pool = ConstantPool::new();
/// match pool.constant(7) {
///     Err(Error::DanglingReference { index, .. }) => assert_eq!(index, 7),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;

/// Configuration of the editing components.
pub use config::{CollisionPolicy, EditorConfig};

/// Provides access to low-level byte stream parsing.
///
/// The [`Parser`] type is used for decoding instruction streams.
///
/// # Example
///
/// ```rust
/// use classforge::{assembly::decode_instruction, Parser};
///
/// let code = [0xb1]; // return
/// let mut parser = Parser::new(&code);
/// let instruction = decode_instruction(&mut parser)?;
/// assert_eq!(instruction.opcode().to_string(), "return");
/// # Ok::<(), classforge::Error>(())
/// ```
pub use file::parser::Parser;
