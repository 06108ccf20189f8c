//! Resolved references of constant pool entries.
//!
//! A resolved reference names the class or member a `Class`, `Fieldref`, `Methodref` or
//! `InterfaceMethodref` constant ultimately points at, after lookup through the class
//! hierarchy. References are plain keys into the set of loaded classes rather than pointers,
//! so they stay meaningful when a class is replaced and can be copied between pools as-is.

use std::{fmt, sync::Arc};

/// Identifies a class by its internal name (`java/lang/String`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey(Arc<str>);

impl ClassKey {
    /// Create a key from an internal class name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassKey(Arc::from(name))
    }

    /// The internal class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a field or method by its declaring class, name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    /// The class that declares the member
    pub class: ClassKey,
    /// Member name
    pub name: Arc<str>,
    /// Member descriptor
    pub descriptor: Arc<str>,
}

impl MemberKey {
    /// Create a member key.
    #[must_use]
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        MemberKey {
            class: ClassKey::new(class),
            name: Arc::from(name),
            descriptor: Arc::from(descriptor),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor)
    }
}

/// The target a constant resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedRef {
    /// A loaded class
    Class(ClassKey),
    /// A field, keyed by the class that actually declares it
    Field(MemberKey),
    /// A method, keyed by the class that actually declares it
    Method(MemberKey),
}

impl ResolvedRef {
    /// The class key, for class references.
    #[must_use]
    pub fn as_class(&self) -> Option<&ClassKey> {
        match self {
            ResolvedRef::Class(key) => Some(key),
            _ => None,
        }
    }

    /// The member key, for field and method references.
    #[must_use]
    pub fn as_member(&self) -> Option<&MemberKey> {
        match self {
            ResolvedRef::Field(key) | ResolvedRef::Method(key) => Some(key),
            ResolvedRef::Class(_) => None,
        }
    }
}

impl fmt::Display for ResolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedRef::Class(key) => write!(f, "class {key}"),
            ResolvedRef::Field(key) => write!(f, "field {key}"),
            ResolvedRef::Method(key) => write!(f, "method {key}"),
        }
    }
}
