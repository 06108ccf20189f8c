//! Editing operations on the class model.
//!
//! Every transformation pass is built from the components of this module:
//!
//! - [`crate::classedit::ConstantPoolEditor`] - Deduplicating insertion of constants
//! - [`crate::classedit::ConstantTransplanter`] - Memoized copying of constants between
//!   classes
//! - [`crate::classedit::CodeComposer`] - Assembly of method bodies from fragments, with
//!   offset translation, branch widening and exception table translation
//! - [`crate::classedit::ConstantRemapper`] - Substitution of constants throughout a class
//! - [`crate::classedit::redirect_class_references`] and
//!   [`crate::classedit::redirect_member_references`] - Redirection of resolved references
//! - [`crate::classedit::MemberCopier`] - Copying fields and methods, including their bodies,
//!   between classes
//! - [`crate::classedit::ReferenceFinder`] - Queries for references to a class or member
//! - [`crate::classedit::ClassValidator`] - Structural checks after editing
//!
//! Components that resolve a condition by a default policy (dropping a handler, renaming a
//! member) report it to a shared [`crate::diagnostics::Diagnostics`] sink.
//!
//! # Thread Safety
//!
//! Components operate on one `&mut Class` at a time and are not shared between threads.
//! Passes parallelize over classes, giving each worker its own components while sharing one
//! `Arc<Diagnostics>`.

mod composer;
mod editor;
mod finder;
mod members;
mod naming;
mod redirect;
mod remap;
pub mod stack;
mod transplant;
mod validation;

pub use composer::{CodeComposer, ComposerPhase};
pub use editor::ConstantPoolEditor;
pub use finder::{wildcard_match, ReferenceFinder};
pub use members::{rename_member, MemberCopier};
pub use naming::{NamingPolicy, PreserveNames, SuffixNames};
pub use redirect::{redirect_class_references, redirect_member_references};
pub use remap::ConstantRemapper;
pub use transplant::ConstantTransplanter;
pub use validation::ClassValidator;
