//! # classforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the classforge library. Import it to get quick access to the class model and the
//! editing components a transformation pass is built from.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classforge operations
pub use crate::Error;

/// The result type used throughout classforge
pub use crate::Result;

/// Limits and policies shared by the editing components
pub use crate::{CollisionPolicy, EditorConfig};

/// Sink for policy decisions reported by editing operations
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Class Model
// ================================================================================================

/// Classes, members and the set of loaded classes
pub use crate::classfile::{
    Class, ClassAccessFlags, ClassPool, Linker, Member, MemberAccessFlags, MemberKind,
    ProcessingFlags,
};

/// Constants and resolved references
pub use crate::classfile::{
    ClassKey, Constant, ConstantKind, ConstantPool, MemberKey, ReferenceKind, ResolvedRef,
};

/// Attributes and method bodies
pub use crate::classfile::{Attribute, CodeAttribute, CodeEntry, ExceptionEntry};

// ================================================================================================
// Instructions
// ================================================================================================

/// Canonical instructions and the opcode table
pub use crate::assembly::{Instruction, Opcode};

// ================================================================================================
// Editing
// ================================================================================================

/// Constant pool editing and transplanting
pub use crate::classedit::{ConstantPoolEditor, ConstantRemapper, ConstantTransplanter};

/// Method body composition
pub use crate::classedit::{CodeComposer, ComposerPhase};

/// Reference rewriting and member copying
pub use crate::classedit::{
    redirect_class_references, redirect_member_references, rename_member, MemberCopier,
    NamingPolicy, PreserveNames, ReferenceFinder, SuffixNames,
};

/// Structural checks after editing
pub use crate::classedit::ClassValidator;
