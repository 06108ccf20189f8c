//! The constant pool model.
//!
//! A [`ConstantPool`] is the per-class table of tagged constants addressed by 1-based 16-bit
//! indices. Entries are immutable once written: the pool only ever grows, through
//! [`crate::classedit::ConstantPoolEditor`], and never reorders or removes an entry.
//!
//! # Typed indices
//!
//! Every index stored elsewhere in the class model must be in range and must name an entry of
//! the kind its consuming site expects. The typed accessors ([`ConstantPool::utf8`],
//! [`ConstantPool::class_name`], [`ConstantPool::name_and_type`], [`ConstantPool::member_ref`],
//! [`ConstantPool::expect`]) perform that validation at the point of use and fail with
//! [`crate::Error::DanglingReference`].
//!
//! # Deduplication
//!
//! The pool owns a value-keyed index ([`ConstantKey`]) that is kept in step with every
//! append. Keys of composite constants carry the *strings* their children resolve to rather
//! than the child indices, so two entries are considered equal when they denote the same
//! value, even if a decoded pool holds duplicate `Utf8` entries. The first occurrence of a
//! value is its canonical index.
//!
//! # Examples
//!
//! ```rust
//! use classforge::classfile::{Constant, ConstantPool};
//!
//! let pool = ConstantPool::from_entries(vec![
//!     Constant::Utf8("java/lang/Object".into()),
//!     Constant::Class { name_index: 1 },
//!     Constant::Long(42),
//!     Constant::Unusable,
//! ])?;
//!
//! assert_eq!(pool.len(), 5);
//! assert_eq!(pool.class_name(2)?, "java/lang/Object");
//! assert!(pool.utf8(2).is_err());
//! # Ok::<(), classforge::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use strum::{EnumCount, EnumIter};

use crate::{classfile::ResolvedRef, Error, Result};

/// The maximum number of slots a constant pool can hold, including slot 0.
pub const MAX_POOL_ENTRIES: usize = 65535;

/// The kind (tag) of a constant pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, strum::Display)]
#[allow(missing_docs)]
pub enum ConstantKind {
    Unusable,
    Utf8,
    Integer,
    Float,
    Long,
    Double,
    String,
    PrimitiveArray,
    Class,
    NameAndType,
    Fieldref,
    Methodref,
    InterfaceMethodref,
    MethodHandle,
    MethodType,
    Dynamic,
    InvokeDynamic,
    Module,
    Package,
}

impl ConstantKind {
    /// The tag byte of this kind in the class file format.
    ///
    /// `PrimitiveArray` has no standard tag and uses the value 21 reserved for it by
    /// optimizing tool chains; `Unusable` reports 0.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            ConstantKind::Unusable => 0,
            ConstantKind::Utf8 => 1,
            ConstantKind::Integer => 3,
            ConstantKind::Float => 4,
            ConstantKind::Long => 5,
            ConstantKind::Double => 6,
            ConstantKind::Class => 7,
            ConstantKind::String => 8,
            ConstantKind::Fieldref => 9,
            ConstantKind::Methodref => 10,
            ConstantKind::InterfaceMethodref => 11,
            ConstantKind::NameAndType => 12,
            ConstantKind::MethodHandle => 15,
            ConstantKind::MethodType => 16,
            ConstantKind::Dynamic => 17,
            ConstantKind::InvokeDynamic => 18,
            ConstantKind::Module => 19,
            ConstantKind::Package => 20,
            ConstantKind::PrimitiveArray => 21,
        }
    }

    /// Field, method and interface method references.
    #[must_use]
    pub fn is_member_ref(self) -> bool {
        matches!(
            self,
            ConstantKind::Fieldref | ConstantKind::Methodref | ConstantKind::InterfaceMethodref
        )
    }
}

/// The kind of a method handle, as stored in a `MethodHandle` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, strum::Display)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl ReferenceKind {
    /// Decode a reference kind byte.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<ReferenceKind> {
        match value {
            1 => Some(ReferenceKind::GetField),
            2 => Some(ReferenceKind::GetStatic),
            3 => Some(ReferenceKind::PutField),
            4 => Some(ReferenceKind::PutStatic),
            5 => Some(ReferenceKind::InvokeVirtual),
            6 => Some(ReferenceKind::InvokeStatic),
            7 => Some(ReferenceKind::InvokeSpecial),
            8 => Some(ReferenceKind::NewInvokeSpecial),
            9 => Some(ReferenceKind::InvokeInterface),
            _ => None,
        }
    }

    /// The constant kinds a method handle of this kind may reference.
    #[must_use]
    pub fn referenced_kinds(self) -> &'static [ConstantKind] {
        match self {
            ReferenceKind::GetField
            | ReferenceKind::GetStatic
            | ReferenceKind::PutField
            | ReferenceKind::PutStatic => &[ConstantKind::Fieldref],
            ReferenceKind::InvokeVirtual | ReferenceKind::NewInvokeSpecial => {
                &[ConstantKind::Methodref]
            }
            ReferenceKind::InvokeStatic | ReferenceKind::InvokeSpecial => {
                &[ConstantKind::Methodref, ConstantKind::InterfaceMethodref]
            }
            ReferenceKind::InvokeInterface => &[ConstantKind::InterfaceMethodref],
        }
    }
}

/// Element type of a primitive array constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, strum::Display)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Float,
    Long,
    Double,
}

/// The values of a primitive array constant.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum PrimitiveArray {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
}

impl PrimitiveArray {
    /// The element type.
    #[must_use]
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveArray::Boolean(_) => PrimitiveKind::Boolean,
            PrimitiveArray::Byte(_) => PrimitiveKind::Byte,
            PrimitiveArray::Char(_) => PrimitiveKind::Char,
            PrimitiveArray::Short(_) => PrimitiveKind::Short,
            PrimitiveArray::Int(_) => PrimitiveKind::Int,
            PrimitiveArray::Float(_) => PrimitiveKind::Float,
            PrimitiveArray::Long(_) => PrimitiveKind::Long,
            PrimitiveArray::Double(_) => PrimitiveKind::Double,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            PrimitiveArray::Boolean(values) => values.len(),
            PrimitiveArray::Byte(values) => values.len(),
            PrimitiveArray::Char(values) => values.len(),
            PrimitiveArray::Short(values) => values.len(),
            PrimitiveArray::Int(values) => values.len(),
            PrimitiveArray::Float(values) => values.len(),
            PrimitiveArray::Long(values) => values.len(),
            PrimitiveArray::Double(values) => values.len(),
        }
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element bit patterns, used for value comparison (floating point values compare by
    /// their bits, so `NaN` payloads and signed zeros stay distinct).
    fn bits(&self) -> Vec<u64> {
        match self {
            PrimitiveArray::Boolean(values) => values.iter().map(|v| u64::from(*v)).collect(),
            PrimitiveArray::Byte(values) => values.iter().map(|v| *v as u8 as u64).collect(),
            PrimitiveArray::Char(values) => values.iter().map(|v| u64::from(*v)).collect(),
            PrimitiveArray::Short(values) => values.iter().map(|v| *v as u16 as u64).collect(),
            PrimitiveArray::Int(values) => values.iter().map(|v| *v as u32 as u64).collect(),
            PrimitiveArray::Float(values) => {
                values.iter().map(|v| u64::from(v.to_bits())).collect()
            }
            PrimitiveArray::Long(values) => values.iter().map(|v| *v as u64).collect(),
            PrimitiveArray::Double(values) => values.iter().map(|v| v.to_bits()).collect(),
        }
    }
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Constant {
    /// The slot following a `Long` or `Double`, and slot 0.
    Unusable,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String {
        string_index: u16,
    },
    PrimitiveArray(PrimitiveArray),
    Class {
        name_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodHandle {
        kind: ReferenceKind,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    /// `bootstrap_method_index` indexes the class's `BootstrapMethods` attribute, not the pool.
    Dynamic {
        bootstrap_method_index: u16,
        name_and_type_index: u16,
    },
    /// `bootstrap_method_index` indexes the class's `BootstrapMethods` attribute, not the pool.
    InvokeDynamic {
        bootstrap_method_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

const UTF8: &[ConstantKind] = &[ConstantKind::Utf8];
const CLASS: &[ConstantKind] = &[ConstantKind::Class];
const NAME_AND_TYPE: &[ConstantKind] = &[ConstantKind::NameAndType];

impl Constant {
    /// The kind of this constant.
    #[must_use]
    pub fn kind(&self) -> ConstantKind {
        match self {
            Constant::Unusable => ConstantKind::Unusable,
            Constant::Utf8(_) => ConstantKind::Utf8,
            Constant::Integer(_) => ConstantKind::Integer,
            Constant::Float(_) => ConstantKind::Float,
            Constant::Long(_) => ConstantKind::Long,
            Constant::Double(_) => ConstantKind::Double,
            Constant::String { .. } => ConstantKind::String,
            Constant::PrimitiveArray(_) => ConstantKind::PrimitiveArray,
            Constant::Class { .. } => ConstantKind::Class,
            Constant::NameAndType { .. } => ConstantKind::NameAndType,
            Constant::Fieldref { .. } => ConstantKind::Fieldref,
            Constant::Methodref { .. } => ConstantKind::Methodref,
            Constant::InterfaceMethodref { .. } => ConstantKind::InterfaceMethodref,
            Constant::MethodHandle { .. } => ConstantKind::MethodHandle,
            Constant::MethodType { .. } => ConstantKind::MethodType,
            Constant::Dynamic { .. } => ConstantKind::Dynamic,
            Constant::InvokeDynamic { .. } => ConstantKind::InvokeDynamic,
            Constant::Module { .. } => ConstantKind::Module,
            Constant::Package { .. } => ConstantKind::Package,
        }
    }

    /// Number of pool slots the constant occupies.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    /// Pool indices this constant references, each with the kinds it may name.
    #[must_use]
    pub fn children(&self) -> Vec<(u16, &'static [ConstantKind])> {
        match self {
            Constant::String { string_index } => vec![(*string_index, UTF8)],
            Constant::Class { name_index }
            | Constant::Module { name_index }
            | Constant::Package { name_index } => vec![(*name_index, UTF8)],
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => vec![(*name_index, UTF8), (*descriptor_index, UTF8)],
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => vec![(*class_index, CLASS), (*name_and_type_index, NAME_AND_TYPE)],
            Constant::MethodHandle {
                kind,
                reference_index,
            } => vec![(*reference_index, kind.referenced_kinds())],
            Constant::MethodType { descriptor_index } => vec![(*descriptor_index, UTF8)],
            Constant::Dynamic {
                name_and_type_index,
                ..
            }
            | Constant::InvokeDynamic {
                name_and_type_index,
                ..
            } => vec![(*name_and_type_index, NAME_AND_TYPE)],
            _ => Vec::new(),
        }
    }

    /// A copy of this constant with every child index passed through `map`, in the order
    /// returned by [`Constant::children`].
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `map`.
    pub fn map_children<F>(&self, mut map: F) -> Result<Constant>
    where
        F: FnMut(u16) -> Result<u16>,
    {
        let mapped = match self {
            Constant::String { string_index } => Constant::String {
                string_index: map(*string_index)?,
            },
            Constant::Class { name_index } => Constant::Class {
                name_index: map(*name_index)?,
            },
            Constant::Module { name_index } => Constant::Module {
                name_index: map(*name_index)?,
            },
            Constant::Package { name_index } => Constant::Package {
                name_index: map(*name_index)?,
            },
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Constant::NameAndType {
                name_index: map(*name_index)?,
                descriptor_index: map(*descriptor_index)?,
            },
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            } => Constant::Fieldref {
                class_index: map(*class_index)?,
                name_and_type_index: map(*name_and_type_index)?,
            },
            Constant::Methodref {
                class_index,
                name_and_type_index,
            } => Constant::Methodref {
                class_index: map(*class_index)?,
                name_and_type_index: map(*name_and_type_index)?,
            },
            Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => Constant::InterfaceMethodref {
                class_index: map(*class_index)?,
                name_and_type_index: map(*name_and_type_index)?,
            },
            Constant::MethodHandle {
                kind,
                reference_index,
            } => Constant::MethodHandle {
                kind: *kind,
                reference_index: map(*reference_index)?,
            },
            Constant::MethodType { descriptor_index } => Constant::MethodType {
                descriptor_index: map(*descriptor_index)?,
            },
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type_index,
            } => Constant::Dynamic {
                bootstrap_method_index: *bootstrap_method_index,
                name_and_type_index: map(*name_and_type_index)?,
            },
            Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type_index,
            } => Constant::InvokeDynamic {
                bootstrap_method_index: *bootstrap_method_index,
                name_and_type_index: map(*name_and_type_index)?,
            },
            other => other.clone(),
        };
        Ok(mapped)
    }
}

/// Value identity of a constant, independent of the indices used to express it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantKey {
    /// A `Utf8` string
    Utf8(Arc<str>),
    /// An `Integer` value
    Integer(i32),
    /// A `Float` bit pattern
    Float(u32),
    /// A `Long` value
    Long(i64),
    /// A `Double` bit pattern
    Double(u64),
    /// A `String` by its text
    String(Arc<str>),
    /// A `PrimitiveArray` by element type and bit patterns
    PrimitiveArray(PrimitiveKind, Vec<u64>),
    /// A `Class` by internal name
    Class(Arc<str>),
    /// A `NameAndType` by name and descriptor
    NameAndType(Arc<str>, Arc<str>),
    /// A member reference by kind, class name, name and descriptor
    MemberRef(ConstantKind, Arc<str>, Arc<str>, Arc<str>),
    /// A `MethodHandle` by reference kind and the key of its reference
    MethodHandle(ReferenceKind, Box<ConstantKey>),
    /// A `MethodType` by descriptor
    MethodType(Arc<str>),
    /// A `Dynamic` or `InvokeDynamic` by kind, bootstrap method index, name and descriptor
    Dynamic(ConstantKind, u16, Arc<str>, Arc<str>),
    /// A `Module` by name
    Module(Arc<str>),
    /// A `Package` by name
    Package(Arc<str>),
}

/// A constant together with its lazily populated resolved reference.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    constant: Constant,
    resolved: Option<ResolvedRef>,
}

impl PoolEntry {
    /// The constant stored in this slot.
    #[must_use]
    pub fn constant(&self) -> &Constant {
        &self.constant
    }

    /// The resolved reference, once the linker has populated it.
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedRef> {
        self.resolved.as_ref()
    }
}

/// A member reference with its names resolved to strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// `Fieldref`, `Methodref` or `InterfaceMethodref`
    pub kind: ConstantKind,
    /// Pool index of the `Class` constant
    pub class_index: u16,
    /// Internal name of the referenced class
    pub class_name: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
}

fn dangling(index: u16, expected: &'static str, found: Option<&Constant>) -> Error {
    Error::DanglingReference {
        index,
        expected,
        found: found.map(Constant::kind),
    }
}

/// A class's constant pool.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
    lookup: HashMap<ConstantKey, u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create a pool holding only the reserved slot 0.
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![PoolEntry {
                constant: Constant::Unusable,
                resolved: None,
            }],
            lookup: HashMap::new(),
        }
    }

    /// Build a pool from decoded constants, given in index order starting at index 1.
    ///
    /// `Long` and `Double` constants must be followed by [`Constant::Unusable`]. Duplicate
    /// values are kept; the first occurrence becomes the canonical entry for lookups.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the constants need more than
    /// [`MAX_POOL_ENTRIES`] slots and [`crate::Error::Malformed`] if a wide constant is not
    /// followed by its placeholder slot.
    pub fn from_entries(constants: Vec<Constant>) -> Result<Self> {
        if constants.len() + 1 > MAX_POOL_ENTRIES {
            return Err(Error::PoolOverflow {
                limit: MAX_POOL_ENTRIES,
            });
        }

        for (position, constant) in constants.iter().enumerate() {
            if constant.width() == 2 && constants.get(position + 1) != Some(&Constant::Unusable) {
                return Err(malformed_error!(
                    "{} constant at index {} is not followed by an unusable slot",
                    constant.kind(),
                    position + 1
                ));
            }
        }

        let mut pool = ConstantPool::new();
        pool.entries.extend(constants.into_iter().map(|constant| PoolEntry {
            constant,
            resolved: None,
        }));

        for index in 1..pool.entries.len() {
            if let Some(key) = pool.key_of(&pool.entries[index].constant) {
                pool.lookup.entry(key).or_insert(index as u16);
            }
        }

        Ok(pool)
    }

    /// Number of slots, including slot 0 and the placeholders after wide constants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the pool holds no constants besides slot 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// The entry at `index`, if it is in range.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&PoolEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    /// The kind of the entry at `index`, if it is in range.
    #[must_use]
    pub fn kind(&self, index: u16) -> Option<ConstantKind> {
        self.get(index).map(|entry| entry.constant.kind())
    }

    /// Iterate over all usable entries with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &PoolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, entry)| entry.constant != Constant::Unusable)
            .map(|(index, entry)| (index as u16, entry))
    }

    /// The constant at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `index` is 0, out of range or a
    /// placeholder slot.
    pub fn constant(&self, index: u16) -> Result<&Constant> {
        match self.get(index) {
            Some(entry) if entry.constant != Constant::Unusable => Ok(&entry.constant),
            entry => Err(dangling(index, "a usable constant", entry.map(PoolEntry::constant))),
        }
    }

    /// The constant at `index`, validated against the kinds the consuming site accepts.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] naming `expected` if the index is out of
    /// range or the entry has another kind.
    pub fn expect(
        &self,
        index: u16,
        kinds: &[ConstantKind],
        expected: &'static str,
    ) -> Result<&Constant> {
        match self.get(index) {
            Some(entry) if kinds.contains(&entry.constant.kind()) => Ok(&entry.constant),
            entry => Err(dangling(index, expected, entry.map(PoolEntry::constant))),
        }
    }

    /// The string of the `Utf8` constant at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the entry is not a `Utf8`.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index).map(PoolEntry::constant) {
            Some(Constant::Utf8(value)) => Ok(value),
            other => Err(dangling(index, "Utf8", other)),
        }
    }

    /// The internal name of the `Class` constant at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the entry is not a `Class` or its name
    /// is not a `Utf8`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index).map(PoolEntry::constant) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            other => Err(dangling(index, "Class", other)),
        }
    }

    /// Name and descriptor of the `NameAndType` constant at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the entry or its children have the
    /// wrong kind.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index).map(PoolEntry::constant) {
            Some(Constant::NameAndType {
                name_index,
                descriptor_index,
            }) => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(dangling(index, "NameAndType", other)),
        }
    }

    /// The `Fieldref`, `Methodref` or `InterfaceMethodref` at `index`, with names resolved.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the entry or its children have the
    /// wrong kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let constant = self.get(index).map(PoolEntry::constant);
        let (class_index, name_and_type_index) = match constant {
            Some(
                Constant::Fieldref {
                    class_index,
                    name_and_type_index,
                }
                | Constant::Methodref {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                },
            ) => (*class_index, *name_and_type_index),
            other => {
                return Err(dangling(
                    index,
                    "Fieldref, Methodref or InterfaceMethodref",
                    other,
                ))
            }
        };

        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MemberRef {
            kind: self.entries[index as usize].constant.kind(),
            class_index,
            class_name: self.class_name(class_index)?,
            name,
            descriptor,
        })
    }

    /// The resolved reference of the entry at `index`.
    #[must_use]
    pub fn resolved(&self, index: u16) -> Option<&ResolvedRef> {
        self.get(index).and_then(PoolEntry::resolved)
    }

    /// Populate the resolved reference of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `index` does not name a usable entry.
    pub fn set_resolved(&mut self, index: u16, resolved: ResolvedRef) -> Result<()> {
        self.constant(index)?;
        self.entries[index as usize].resolved = Some(resolved);
        Ok(())
    }

    /// The index of an entry structurally equal to `constant`, if the pool holds one.
    #[must_use]
    pub fn find(&self, constant: &Constant) -> Option<u16> {
        self.key_of(constant)
            .and_then(|key| self.lookup.get(&key).copied())
    }

    /// The value key of `constant`, with child indices resolved against this pool.
    ///
    /// Returns `None` for placeholders and for composites whose children do not resolve.
    #[must_use]
    pub fn key_of(&self, constant: &Constant) -> Option<ConstantKey> {
        let text = |index: u16| self.utf8(index).ok().map(Arc::from);
        let key = match constant {
            Constant::Unusable => return None,
            Constant::Utf8(value) => ConstantKey::Utf8(Arc::from(value.as_str())),
            Constant::Integer(value) => ConstantKey::Integer(*value),
            Constant::Float(value) => ConstantKey::Float(value.to_bits()),
            Constant::Long(value) => ConstantKey::Long(*value),
            Constant::Double(value) => ConstantKey::Double(value.to_bits()),
            Constant::String { string_index } => ConstantKey::String(text(*string_index)?),
            Constant::PrimitiveArray(array) => ConstantKey::PrimitiveArray(array.kind(), array.bits()),
            Constant::Class { name_index } => ConstantKey::Class(text(*name_index)?),
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => ConstantKey::NameAndType(text(*name_index)?, text(*descriptor_index)?),
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                let class_name = self.class_name(*class_index).ok()?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index).ok()?;
                ConstantKey::MemberRef(
                    constant.kind(),
                    Arc::from(class_name),
                    Arc::from(name),
                    Arc::from(descriptor),
                )
            }
            Constant::MethodHandle {
                kind,
                reference_index,
            } => {
                let reference = self
                    .expect(*reference_index, kind.referenced_kinds(), "method handle target")
                    .ok()?;
                ConstantKey::MethodHandle(*kind, Box::new(self.key_of(reference)?))
            }
            Constant::MethodType { descriptor_index } => {
                ConstantKey::MethodType(text(*descriptor_index)?)
            }
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type_index,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index).ok()?;
                ConstantKey::Dynamic(
                    constant.kind(),
                    *bootstrap_method_index,
                    Arc::from(name),
                    Arc::from(descriptor),
                )
            }
            Constant::Module { name_index } => ConstantKey::Module(text(*name_index)?),
            Constant::Package { name_index } => ConstantKey::Package(text(*name_index)?),
        };
        Some(key)
    }

    /// Append `constant` without looking for an equal entry, keeping the value index in step.
    ///
    /// Only the editor calls this; it performs the lookup first.
    pub(crate) fn push(&mut self, constant: Constant, limit: usize) -> Result<u16> {
        let limit = limit.min(MAX_POOL_ENTRIES);
        let width = constant.width();
        if self.entries.len() + width > limit {
            return Err(Error::PoolOverflow { limit });
        }

        let index = self.entries.len() as u16;
        let key = self.key_of(&constant);
        self.entries.push(PoolEntry {
            constant,
            resolved: None,
        });
        if width == 2 {
            self.entries.push(PoolEntry {
                constant: Constant::Unusable,
                resolved: None,
            });
        }
        if let Some(key) = key {
            self.lookup.entry(key).or_insert(index);
        }

        Ok(index)
    }
}
