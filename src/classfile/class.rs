use crate::{
    classfile::{
        attribute::{IndexSite, IndexUse},
        Attribute, BootstrapMethod, ClassAccessFlags, ClassKey, ConstantKind, ConstantPool,
        Member, MemberKind, ProcessingFlags,
    },
    Result,
};

/// Class file version 52.0 (Java 8), the version new classes are created with.
pub const DEFAULT_MAJOR_VERSION: u16 = 52;

/// A class together with its constant pool.
///
/// The class exclusively owns its pool and all of its members and attributes. Every pool
/// index stored anywhere in the class refers to [`Class::constant_pool`].
#[derive(Debug, Clone)]
pub struct Class {
    /// Minor class file version
    pub minor_version: u16,
    /// Major class file version
    pub major_version: u16,
    /// Access flags
    pub access_flags: ClassAccessFlags,
    /// The constant pool
    pub constant_pool: ConstantPool,
    /// `Class` constant naming this class
    pub this_class: u16,
    /// `Class` constant naming the superclass, 0 for `java/lang/Object` and modules
    pub super_class: u16,
    /// `Class` constants naming the implemented interfaces
    pub interfaces: Vec<u16>,
    /// Fields and methods in declaration order
    pub members: Vec<Member>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
    /// Marks set by transformation passes
    pub processing_flags: ProcessingFlags,
}

impl Class {
    /// Create a class without members or attributes.
    #[must_use]
    pub fn new(
        constant_pool: ConstantPool,
        access_flags: ClassAccessFlags,
        this_class: u16,
        super_class: u16,
    ) -> Self {
        Class {
            minor_version: 0,
            major_version: DEFAULT_MAJOR_VERSION,
            access_flags,
            constant_pool,
            this_class,
            super_class,
            interfaces: Vec::new(),
            members: Vec::new(),
            attributes: Vec::new(),
            processing_flags: ProcessingFlags::empty(),
        }
    }

    /// Internal name of this class.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `this_class` is not a valid `Class`.
    pub fn name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    /// The key identifying this class.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `this_class` is not a valid `Class`.
    pub fn key(&self) -> Result<ClassKey> {
        Ok(ClassKey::new(self.name()?))
    }

    /// Internal name of the superclass, `None` for `java/lang/Object` and modules.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `super_class` is not a valid `Class`.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    /// Internal names of the implemented interfaces.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if an interface index is not a valid `Class`.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.constant_pool.class_name(*index))
            .collect()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Field)
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(|member| member.kind == MemberKind::Method)
    }

    /// Position of the member with the exact name and descriptor.
    #[must_use]
    pub fn find_member(&self, kind: MemberKind, name: &str, descriptor: &str) -> Option<usize> {
        self.members.iter().position(|member| {
            member.kind == kind
                && member.name(&self.constant_pool).ok() == Some(name)
                && member.descriptor(&self.constant_pool).ok() == Some(descriptor)
        })
    }

    /// Positions of all members of `kind` named `name`, whatever their descriptor.
    #[must_use]
    pub fn members_named(&self, kind: MemberKind, name: &str) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, member)| {
                member.kind == kind && member.name(&self.constant_pool).ok() == Some(name)
            })
            .map(|(position, _)| position)
            .collect()
    }

    /// Entries of the `BootstrapMethods` attribute, empty if the class has none.
    #[must_use]
    pub fn bootstrap_methods(&self) -> &[BootstrapMethod] {
        self.attributes
            .iter()
            .find_map(|attribute| match attribute {
                Attribute::BootstrapMethods(methods) => Some(methods.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Add a bootstrap method, reusing an identical existing entry, and return its index
    /// into the `BootstrapMethods` attribute (created if the class has none).
    pub fn add_bootstrap_method(&mut self, method: BootstrapMethod) -> u16 {
        for attribute in &mut self.attributes {
            if let Attribute::BootstrapMethods(methods) = attribute {
                if let Some(existing) = methods.iter().position(|m| *m == method) {
                    return existing as u16;
                }
                methods.push(method);
                return (methods.len() - 1) as u16;
            }
        }

        self.attributes.push(Attribute::BootstrapMethods(vec![method]));
        0
    }

    /// Every pool index stored in the class header, its members and its attributes.
    pub fn index_sites(&mut self) -> Vec<IndexSite<'_>> {
        const CLASS: &[ConstantKind] = &[ConstantKind::Class];

        let mut sites = vec![
            IndexSite::required(&mut self.this_class, CLASS),
            IndexSite::optional(&mut self.super_class, CLASS),
        ];
        sites.extend(
            self.interfaces
                .iter_mut()
                .map(|index| IndexSite::required(index, CLASS)),
        );
        for member in &mut self.members {
            sites.extend(member.index_sites());
        }
        for attribute in &mut self.attributes {
            sites.extend(attribute.index_sites());
        }
        sites
    }

    /// Read-only view of [`Class::index_sites`], without the class constant pool.
    #[must_use]
    pub fn index_uses(&self) -> Vec<IndexUse> {
        let mut uses = vec![
            IndexUse {
                index: self.this_class,
                kinds: &[ConstantKind::Class],
                optional: false,
            },
            IndexUse {
                index: self.super_class,
                kinds: &[ConstantKind::Class],
                optional: true,
            },
        ];
        uses.extend(self.interfaces.iter().map(|index| IndexUse {
            index: *index,
            kinds: &[ConstantKind::Class],
            optional: false,
        }));
        for member in &self.members {
            uses.push(IndexUse {
                index: member.name_index,
                kinds: &[ConstantKind::Utf8],
                optional: false,
            });
            uses.push(IndexUse {
                index: member.descriptor_index,
                kinds: &[ConstantKind::Utf8],
                optional: false,
            });
            uses.extend(member.attributes.iter().flat_map(Attribute::index_uses));
        }
        uses.extend(self.attributes.iter().flat_map(Attribute::index_uses));
        uses
    }
}
