//! Class, member and code attributes.
//!
//! Attributes the editing engine has to keep consistent are modelled structurally; anything
//! else is carried as [`Attribute::Unknown`] with its raw bytes. Attribute names are not
//! stored for the known variants: the encoder adds the name constants when it writes a class.

use crate::classfile::{CodeAttribute, ConstantKind};

/// Pool kinds that `ldc` and bootstrap method arguments may reference.
pub const LOADABLE_KINDS: &[ConstantKind] = &[
    ConstantKind::Integer,
    ConstantKind::Float,
    ConstantKind::Long,
    ConstantKind::Double,
    ConstantKind::String,
    ConstantKind::PrimitiveArray,
    ConstantKind::Class,
    ConstantKind::MethodHandle,
    ConstantKind::MethodType,
    ConstantKind::Dynamic,
];

const UTF8: &[ConstantKind] = &[ConstantKind::Utf8];
const CLASS: &[ConstantKind] = &[ConstantKind::Class];
const VALUE: &[ConstantKind] = &[
    ConstantKind::Integer,
    ConstantKind::Float,
    ConstantKind::Long,
    ConstantKind::Double,
    ConstantKind::String,
];

/// An entry of the `InnerClasses` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClass {
    /// `Class` constant of the inner class
    pub inner_class_index: u16,
    /// `Class` constant of the outer class, 0 for local and anonymous classes
    pub outer_class_index: u16,
    /// `Utf8` simple name, 0 for anonymous classes
    pub inner_name_index: u16,
    /// Access flags as declared in source
    pub access_flags: u16,
}

/// An entry of the `BootstrapMethods` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootstrapMethod {
    /// `MethodHandle` constant of the bootstrap method
    pub method_ref: u16,
    /// Loadable constants passed as static arguments
    pub arguments: Vec<u16>,
}

/// An entry of the `LineNumberTable` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    /// Offset of the first instruction of the line
    pub start: u32,
    /// Source line number
    pub line: u16,
}

/// An entry of the `LocalVariableTable` or `LocalVariableTypeTable` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    /// Offset where the variable's scope starts
    pub start: u32,
    /// Length of the scope in bytes
    pub length: u32,
    /// `Utf8` variable name
    pub name_index: u16,
    /// `Utf8` descriptor, or generic signature in a type table
    pub descriptor_index: u16,
    /// Local variable slot
    pub slot: u16,
}

/// An attribute of a class, member or Code attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A method body
    Code(CodeAttribute),
    /// Initial value of a static field
    ConstantValue {
        /// Loadable value constant
        value_index: u16,
    },
    /// Checked exceptions a method declares
    Exceptions {
        /// `Class` constants
        exception_indices: Vec<u16>,
    },
    /// Generic signature
    Signature {
        /// `Utf8` signature
        signature_index: u16,
    },
    /// Source file name
    SourceFile {
        /// `Utf8` file name
        source_file_index: u16,
    },
    /// Nesting information
    InnerClasses(Vec<InnerClass>),
    /// Enclosing method of a local or anonymous class
    EnclosingMethod {
        /// `Class` constant of the enclosing class
        class_index: u16,
        /// `NameAndType` of the enclosing method, 0 outside a method
        method_index: u16,
    },
    /// Bootstrap methods of `Dynamic` and `InvokeDynamic` constants
    BootstrapMethods(Vec<BootstrapMethod>),
    /// Marks a compiler generated class or member
    Synthetic,
    /// Marks a deprecated class or member
    Deprecated,
    /// Offset to source line mapping
    LineNumberTable(Vec<LineNumber>),
    /// Local variable names and descriptors
    LocalVariableTable(Vec<LocalVariable>),
    /// Local variable generic signatures
    LocalVariableTypeTable(Vec<LocalVariable>),
    /// Verification frames, kept as raw bytes
    StackMapTable(Vec<u8>),
    /// Any attribute without structural support
    Unknown {
        /// `Utf8` attribute name
        name_index: u16,
        /// Raw attribute payload
        info: Vec<u8>,
    },
}

/// A pool index stored in the class model, with the kinds it may name.
pub struct IndexSite<'a> {
    /// The stored index
    pub index: &'a mut u16,
    /// Kinds the index may name
    pub kinds: &'static [ConstantKind],
    /// Whether 0 is a legal value
    pub optional: bool,
}

/// A pool index stored in the class model, read-only counterpart of [`IndexSite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexUse {
    /// The stored index
    pub index: u16,
    /// Kinds the index may name
    pub kinds: &'static [ConstantKind],
    /// Whether 0 is a legal value
    pub optional: bool,
}

impl From<IndexSite<'_>> for IndexUse {
    fn from(site: IndexSite<'_>) -> Self {
        IndexUse {
            index: *site.index,
            kinds: site.kinds,
            optional: site.optional,
        }
    }
}

impl<'a> IndexSite<'a> {
    pub(crate) fn required(index: &'a mut u16, kinds: &'static [ConstantKind]) -> Self {
        IndexSite {
            index,
            kinds,
            optional: false,
        }
    }

    pub(crate) fn optional(index: &'a mut u16, kinds: &'static [ConstantKind]) -> Self {
        IndexSite {
            index,
            kinds,
            optional: true,
        }
    }
}

impl Attribute {
    /// The attribute name as written in a class file.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        let name = match self {
            Attribute::Code(_) => "Code",
            Attribute::ConstantValue { .. } => "ConstantValue",
            Attribute::Exceptions { .. } => "Exceptions",
            Attribute::Signature { .. } => "Signature",
            Attribute::SourceFile { .. } => "SourceFile",
            Attribute::InnerClasses(_) => "InnerClasses",
            Attribute::EnclosingMethod { .. } => "EnclosingMethod",
            Attribute::BootstrapMethods(_) => "BootstrapMethods",
            Attribute::Synthetic => "Synthetic",
            Attribute::Deprecated => "Deprecated",
            Attribute::LineNumberTable(_) => "LineNumberTable",
            Attribute::LocalVariableTable(_) => "LocalVariableTable",
            Attribute::LocalVariableTypeTable(_) => "LocalVariableTypeTable",
            Attribute::StackMapTable(_) => "StackMapTable",
            Attribute::Unknown { .. } => return None,
        };
        Some(name)
    }

    /// Read-only view of [`Attribute::index_sites`].
    #[must_use]
    #[allow(clippy::let_and_return)]
    pub fn index_uses(&self) -> Vec<IndexUse> {
        let mut scratch = self.clone();
        let uses = scratch.index_sites().into_iter().map(IndexUse::from).collect();
        uses
    }

    /// Every pool index stored in this attribute, including nested Code content.
    pub fn index_sites(&mut self) -> Vec<IndexSite<'_>> {
        let mut sites = Vec::new();
        match self {
            Attribute::Code(code) => sites.extend(code.index_sites()),
            Attribute::ConstantValue { value_index } => {
                sites.push(IndexSite::required(value_index, VALUE));
            }
            Attribute::Exceptions { exception_indices } => {
                sites.extend(
                    exception_indices
                        .iter_mut()
                        .map(|index| IndexSite::required(index, CLASS)),
                );
            }
            Attribute::Signature { signature_index } => {
                sites.push(IndexSite::required(signature_index, UTF8));
            }
            Attribute::SourceFile { source_file_index } => {
                sites.push(IndexSite::required(source_file_index, UTF8));
            }
            Attribute::InnerClasses(classes) => {
                for inner in classes {
                    sites.push(IndexSite::required(&mut inner.inner_class_index, CLASS));
                    sites.push(IndexSite::optional(&mut inner.outer_class_index, CLASS));
                    sites.push(IndexSite::optional(&mut inner.inner_name_index, UTF8));
                }
            }
            Attribute::EnclosingMethod {
                class_index,
                method_index,
            } => {
                sites.push(IndexSite::required(class_index, CLASS));
                sites.push(IndexSite::optional(
                    method_index,
                    &[ConstantKind::NameAndType],
                ));
            }
            Attribute::BootstrapMethods(methods) => {
                for method in methods {
                    sites.push(IndexSite::required(
                        &mut method.method_ref,
                        &[ConstantKind::MethodHandle],
                    ));
                    sites.extend(
                        method
                            .arguments
                            .iter_mut()
                            .map(|index| IndexSite::required(index, LOADABLE_KINDS)),
                    );
                }
            }
            Attribute::LocalVariableTable(variables) | Attribute::LocalVariableTypeTable(variables) => {
                for variable in variables {
                    sites.push(IndexSite::required(&mut variable.name_index, UTF8));
                    sites.push(IndexSite::required(&mut variable.descriptor_index, UTF8));
                }
            }
            Attribute::Unknown { name_index, .. } => {
                sites.push(IndexSite::required(name_index, UTF8));
            }
            Attribute::Synthetic
            | Attribute::Deprecated
            | Attribute::LineNumberTable(_)
            | Attribute::StackMapTable(_) => {}
        }
        sites
    }
}
