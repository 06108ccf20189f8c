use crate::{
    classfile::{
        attribute::IndexSite, Attribute, CodeAttribute, ConstantKind, ConstantPool,
        MemberAccessFlags, ProcessingFlags,
    },
    Result,
};

/// Distinguishes fields from methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MemberKind {
    /// A field
    Field,
    /// A method
    Method,
}

/// A field or method of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Field or method
    pub kind: MemberKind,
    /// Access flags
    pub access_flags: MemberAccessFlags,
    /// `Utf8` constant of the name
    pub name_index: u16,
    /// `Utf8` constant of the descriptor
    pub descriptor_index: u16,
    /// Attributes, including the method body
    pub attributes: Vec<Attribute>,
    /// Marks set by transformation passes
    pub processing_flags: ProcessingFlags,
}

impl Member {
    /// Create a member without attributes.
    #[must_use]
    pub fn new(
        kind: MemberKind,
        access_flags: MemberAccessFlags,
        name_index: u16,
        descriptor_index: u16,
    ) -> Self {
        Member {
            kind,
            access_flags,
            name_index,
            descriptor_index,
            attributes: Vec::new(),
            processing_flags: ProcessingFlags::empty(),
        }
    }

    /// The member name, looked up in the owning class's pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the name index is not a `Utf8`.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    /// The member descriptor, looked up in the owning class's pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the descriptor index is not a `Utf8`.
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// Returns true for static members.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MemberAccessFlags::STATIC)
    }

    /// The method body, if any.
    #[must_use]
    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Mutable access to the method body, if any.
    pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
        self.attributes.iter_mut().find_map(|attribute| match attribute {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Install `code` as the method body, replacing an existing one in place.
    pub fn set_code(&mut self, code: CodeAttribute) {
        match self.code_mut() {
            Some(existing) => *existing = code,
            None => self.attributes.insert(0, Attribute::Code(code)),
        }
    }

    /// Every pool index stored in this member.
    pub fn index_sites(&mut self) -> Vec<IndexSite<'_>> {
        let mut sites = vec![
            IndexSite::required(&mut self.name_index, &[ConstantKind::Utf8]),
            IndexSite::required(&mut self.descriptor_index, &[ConstantKind::Utf8]),
        ];
        for attribute in &mut self.attributes {
            sites.extend(attribute.index_sites());
        }
        sites
    }
}
