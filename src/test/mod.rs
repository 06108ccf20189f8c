//! Shared factories for unit tests.
//!
//! [`ClassBuilder`] assembles small classes with a consistent constant pool so that tests
//! can focus on the operation under test instead of on pool bookkeeping.
#![allow(dead_code)]

use crate::{
    classedit::ConstantPoolEditor,
    classfile::{
        Attribute, Class, ClassAccessFlags, CodeAttribute, ConstantPool, Member,
        MemberAccessFlags, MemberKind,
    },
};

/// Builds a [`Class`] for tests.
pub struct ClassBuilder {
    class: Class,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);
        let this_class = editor.add_class(name).unwrap();
        let super_class = editor.add_class("java/lang/Object").unwrap();

        ClassBuilder {
            class: Class::new(
                pool,
                ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
                this_class,
                super_class,
            ),
        }
    }

    fn editor(&mut self) -> ConstantPoolEditor<'_> {
        ConstantPoolEditor::new(&mut self.class.constant_pool)
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.class.super_class = self.class_ref(name);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class_ref(name);
        self.class.interfaces.push(index);
        self
    }

    /// A private instance field.
    pub fn field(self, name: &str, descriptor: &str) -> Self {
        self.member(
            MemberKind::Field,
            MemberAccessFlags::PRIVATE,
            name,
            descriptor,
            Vec::new(),
        )
    }

    pub fn static_field(self, name: &str, descriptor: &str) -> Self {
        self.member(
            MemberKind::Field,
            MemberAccessFlags::PRIVATE | MemberAccessFlags::STATIC,
            name,
            descriptor,
            Vec::new(),
        )
    }

    /// A public instance method with a body.
    pub fn method(self, name: &str, descriptor: &str, code: CodeAttribute) -> Self {
        self.member(
            MemberKind::Method,
            MemberAccessFlags::PUBLIC,
            name,
            descriptor,
            vec![Attribute::Code(code)],
        )
    }

    pub fn static_method(self, name: &str, descriptor: &str, code: CodeAttribute) -> Self {
        self.member(
            MemberKind::Method,
            MemberAccessFlags::PUBLIC | MemberAccessFlags::STATIC,
            name,
            descriptor,
            vec![Attribute::Code(code)],
        )
    }

    pub fn abstract_method(self, name: &str, descriptor: &str) -> Self {
        self.member(
            MemberKind::Method,
            MemberAccessFlags::PUBLIC | MemberAccessFlags::ABSTRACT,
            name,
            descriptor,
            Vec::new(),
        )
    }

    pub fn member(
        mut self,
        kind: MemberKind,
        access_flags: MemberAccessFlags,
        name: &str,
        descriptor: &str,
        attributes: Vec<Attribute>,
    ) -> Self {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut member = Member::new(kind, access_flags, name_index, descriptor_index);
        member.attributes = attributes;
        self.class.members.push(member);
        self
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.editor().add_utf8(value).unwrap()
    }

    pub fn class_ref(&mut self, name: &str) -> u16 {
        self.editor().add_class(name).unwrap()
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.editor().add_field_ref(owner, name, descriptor).unwrap()
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.editor()
            .add_method_ref(owner, name, descriptor)
            .unwrap()
    }

    pub fn string(&mut self, value: &str) -> u16 {
        self.editor().add_string(value).unwrap()
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.class.attributes.push(attribute);
        self
    }

    /// Direct access for tests that need to add constants the helpers do not cover.
    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut self.class.constant_pool
    }

    pub fn build(self) -> Class {
        self.class
    }
}
