//! Redirection of class and member references.
//!
//! Both redirections work on resolved references: a constant is redirected only if the
//! linker resolved it to the class or member being replaced. Constants without a resolved
//! reference are left alone. The rewriting itself is a [`ConstantRemapper`] pass, so
//! constants shared with other holders are never modified in place.

use std::collections::HashMap;

use crate::{
    classedit::{ConstantPoolEditor, ConstantRemapper},
    classfile::{
        descriptor, Attribute, Class, ClassKey, Constant, ConstantPool, MemberKey, ResolvedRef,
    },
    EditorConfig, Result,
};

/// Repoint every reference of `class` to `original` at `replacement`.
///
/// `Class` constants resolved to `original` are replaced by a `Class` constant naming
/// `replacement`. With [`EditorConfig::rewrite_descriptors`], `L<original>;` is also
/// replaced in `NameAndType` and `MethodType` descriptors, in array class names, in member
/// descriptors and in local variable descriptors, and class types naming `original` are
/// replaced in `Signature` attributes and local variable type signatures. Returns the number
/// of index sites that changed.
///
/// # Errors
///
/// Returns [`crate::Error::DanglingReference`] if the class holds an invalid index and
/// [`crate::Error::PoolOverflow`] if the new constants do not fit.
pub fn redirect_class_references(
    class: &mut Class,
    original: &ClassKey,
    replacement: &ClassKey,
    config: &EditorConfig,
) -> Result<usize> {
    let limit = config.max_pool_entries;
    let rewrite_descriptors = config.rewrite_descriptors;
    let from = original.name();
    let to = replacement.name();

    let mut remapper = ConstantRemapper::with_config(
        |pool: &mut ConstantPool, index| {
            let redirected = pool.resolved(index).and_then(ResolvedRef::as_class) == Some(original);
            let constant = pool.constant(index)?.clone();

            match constant {
                Constant::Class { .. } if redirected => {
                    let new_index = ConstantPoolEditor::with_limit(pool, limit).add_class(to)?;
                    if pool.resolved(new_index).is_none() {
                        pool.set_resolved(new_index, ResolvedRef::Class(replacement.clone()))?;
                    }
                    Ok(Some(new_index))
                }
                Constant::Class { name_index } if rewrite_descriptors => {
                    let name = pool.utf8(name_index)?;
                    match descriptor::replace_class(name, from, to) {
                        Some(name) if name.starts_with('[') => {
                            ConstantPoolEditor::with_limit(pool, limit)
                                .add_class(&name)
                                .map(Some)
                        }
                        _ => Ok(None),
                    }
                }
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                } if rewrite_descriptors => {
                    let rewritten = descriptor::replace_class(pool.utf8(descriptor_index)?, from, to);
                    match rewritten {
                        Some(rewritten) => {
                            let name = pool.utf8(name_index)?.to_string();
                            ConstantPoolEditor::with_limit(pool, limit)
                                .add_name_and_type(&name, &rewritten)
                                .map(Some)
                        }
                        None => Ok(None),
                    }
                }
                Constant::MethodType { descriptor_index } if rewrite_descriptors => {
                    let rewritten = descriptor::replace_class(pool.utf8(descriptor_index)?, from, to);
                    match rewritten {
                        Some(rewritten) => ConstantPoolEditor::with_limit(pool, limit)
                            .add_method_type(&rewritten)
                            .map(Some),
                        None => Ok(None),
                    }
                }
                _ => Ok(None),
            }
        },
        config,
    );
    let mut changed = remapper.remap(class)?;

    if rewrite_descriptors {
        changed += rewrite_member_descriptors(class, from, to, limit)?;
    }
    Ok(changed)
}

fn rewrite_member_descriptors(
    class: &mut Class,
    original: &str,
    replacement: &str,
    limit: usize,
) -> Result<usize> {
    let pool = &mut class.constant_pool;
    let mut rewrite = |index: &mut u16, generic: bool| -> Result<bool> {
        let text = pool.utf8(*index)?;
        let rewritten = if generic {
            descriptor::replace_class_in_signature(text, original, replacement)
        } else {
            descriptor::replace_class(text, original, replacement)
        };
        let Some(rewritten) = rewritten else {
            return Ok(false);
        };
        *index = ConstantPoolEditor::with_limit(pool, limit).add_utf8(&rewritten)?;
        Ok(true)
    };

    let mut changed = 0;
    for attribute in &mut class.attributes {
        if let Attribute::Signature { signature_index } = attribute {
            changed += usize::from(rewrite(signature_index, true)?);
        }
    }

    for member in &mut class.members {
        changed += usize::from(rewrite(&mut member.descriptor_index, false)?);

        for attribute in &mut member.attributes {
            match attribute {
                Attribute::Signature { signature_index } => {
                    changed += usize::from(rewrite(signature_index, true)?);
                }
                Attribute::Code(code) => {
                    for attribute in &mut code.attributes {
                        match attribute {
                            Attribute::LocalVariableTable(variables) => {
                                for variable in variables {
                                    changed +=
                                        usize::from(rewrite(&mut variable.descriptor_index, false)?);
                                }
                            }
                            Attribute::LocalVariableTypeTable(variables) => {
                                for variable in variables {
                                    changed +=
                                        usize::from(rewrite(&mut variable.descriptor_index, true)?);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Ok(changed)
}

/// Repoint every field and method reference of `class` whose resolved member is a key of
/// `redirections` at the member it maps to. Returns the number of index sites that changed.
///
/// The rebuilt reference keeps the constant kind of the original reference and carries the
/// new member as its resolved reference.
///
/// # Errors
///
/// Returns [`crate::Error::DanglingReference`] if the class holds an invalid index and
/// [`crate::Error::PoolOverflow`] if the new constants do not fit.
pub fn redirect_member_references(
    class: &mut Class,
    redirections: &HashMap<MemberKey, MemberKey>,
    config: &EditorConfig,
) -> Result<usize> {
    let limit = config.max_pool_entries;

    let mut remapper = ConstantRemapper::with_config(
        |pool: &mut ConstantPool, index| {
            let Some(resolved) = pool.resolved(index) else {
                return Ok(None);
            };
            let Some(target) = resolved.as_member().and_then(|key| redirections.get(key)) else {
                return Ok(None);
            };
            let redirected = match resolved {
                ResolvedRef::Field(_) => ResolvedRef::Field(target.clone()),
                _ => ResolvedRef::Method(target.clone()),
            };

            let kind = pool.constant(index)?.kind();
            if !kind.is_member_ref() {
                return Ok(None);
            }
            let new_index = ConstantPoolEditor::with_limit(pool, limit).add_member_ref(
                kind,
                target.class.name(),
                &target.name,
                &target.descriptor,
            )?;
            if pool.resolved(new_index).is_none() {
                pool.set_resolved(new_index, redirected)?;
            }
            Ok(Some(new_index))
        },
        config,
    );
    remapper.remap(class)
}
