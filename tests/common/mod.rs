//! Shared helpers for the integration tests.
#![allow(dead_code)]

use classforge::prelude::*;

/// A public class named `name` extending `java/lang/Object`.
pub fn class(name: &str) -> Result<Class> {
    let mut pool = ConstantPool::new();
    let mut editor = ConstantPoolEditor::new(&mut pool);
    let this_class = editor.add_class(name)?;
    let super_class = editor.add_class("java/lang/Object")?;
    Ok(Class::new(
        pool,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
    ))
}

/// Append a member to `class` and return its position.
pub fn add_member(
    class: &mut Class,
    kind: MemberKind,
    access_flags: MemberAccessFlags,
    name: &str,
    descriptor: &str,
    code: Option<CodeAttribute>,
) -> Result<usize> {
    let mut editor = ConstantPoolEditor::new(&mut class.constant_pool);
    let name_index = editor.add_utf8(name)?;
    let descriptor_index = editor.add_utf8(descriptor)?;

    let mut member = Member::new(kind, access_flags, name_index, descriptor_index);
    if let Some(code) = code {
        member.set_code(code);
    }
    class.members.push(member);
    Ok(class.members.len() - 1)
}

/// Append a private instance field.
pub fn add_field(class: &mut Class, name: &str, descriptor: &str) -> Result<usize> {
    add_member(
        class,
        MemberKind::Field,
        MemberAccessFlags::PRIVATE,
        name,
        descriptor,
        None,
    )
}

/// Append a public instance method with a body.
pub fn add_method(
    class: &mut Class,
    name: &str,
    descriptor: &str,
    code: CodeAttribute,
) -> Result<usize> {
    add_member(
        class,
        MemberKind::Method,
        MemberAccessFlags::PUBLIC,
        name,
        descriptor,
        Some(code),
    )
}

/// Serialized offsets of every instruction of `code`.
pub fn offsets(code: &CodeAttribute) -> Vec<u32> {
    code.instructions.iter().map(|entry| entry.offset).collect()
}

/// Absolute branch and switch targets of every instruction of `code`, in stream order.
pub fn targets(code: &CodeAttribute) -> Vec<u32> {
    code.instructions
        .iter()
        .flat_map(|entry| {
            entry
                .instruction
                .deltas()
                .into_iter()
                .map(move |delta| (i64::from(entry.offset) + i64::from(delta)) as u32)
        })
        .collect()
}
