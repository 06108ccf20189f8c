//! Substitution of constants throughout a class.
//!
//! A [`ConstantRemapper`] asks a substitution callback about every constant reachable from
//! the index sites of a class. A substituted constant is replaced by the index the callback
//! returns. A composite constant whose children changed is rebuilt through the
//! [`ConstantPoolEditor`] and the rebuilt entry takes its place; the original entry is left
//! untouched for any other holder of its index, and the rebuilt entry inherits its resolved
//! reference, following a redirected `Class` child. Finally every index site of the class is
//! repointed.
//!
//! A repointed `ldc` may need the wide `ldc_w` form. Method bodies whose instruction lengths
//! changed are laid out again through the [`CodeComposer`].

use std::{collections::HashMap, sync::Arc};

use crate::{
    classedit::{CodeComposer, ConstantPoolEditor},
    classfile::{
        Class, ClassKey, CodeAttribute, ConstantKind, ConstantPool, MemberKey, ResolvedRef,
    },
    diagnostics::Diagnostics,
    EditorConfig, Result,
};

/// Memoizing constant substitution over one class.
pub struct ConstantRemapper<F> {
    substitute: F,
    config: EditorConfig,
    diagnostics: Arc<Diagnostics>,
    mapped: HashMap<u16, u16>,
}

impl<F> ConstantRemapper<F>
where
    F: FnMut(&mut ConstantPool, u16) -> Result<Option<u16>>,
{
    /// Create a remapper. `substitute` receives the pool and an index and returns the
    /// replacement index, or `None` to keep the constant (and remap its children).
    pub fn new(substitute: F) -> Self {
        Self::with_config(substitute, &EditorConfig::default())
    }

    /// Create a remapper that respects the limits of `config`.
    pub fn with_config(substitute: F, config: &EditorConfig) -> Self {
        ConstantRemapper {
            substitute,
            config: *config,
            diagnostics: Arc::new(Diagnostics::new()),
            mapped: HashMap::new(),
        }
    }

    /// Report to `diagnostics` when method bodies are laid out again.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The replacement of `index`, once it has been visited.
    #[must_use]
    pub fn mapped(&self, index: u16) -> Option<u16> {
        self.mapped.get(&index).copied()
    }

    /// Resolve the replacement of a single index in `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] for indices that do not name a constant,
    /// [`crate::Error::PoolOverflow`] if a rebuilt constant does not fit and any error of
    /// the substitution callback.
    pub fn remap_index(&mut self, pool: &mut ConstantPool, index: u16) -> Result<u16> {
        if index == 0 {
            return Ok(0);
        }
        if let Some(mapped) = self.mapped.get(&index) {
            return Ok(*mapped);
        }

        let mapped = match (self.substitute)(pool, index)? {
            Some(replacement) => replacement,
            None => {
                let constant = pool.constant(index)?.clone();
                let children = constant.children();

                let mut replacements = Vec::with_capacity(children.len());
                for (child, _) in &children {
                    replacements.push(self.remap_index(pool, *child)?);
                }

                let changed = children
                    .iter()
                    .zip(&replacements)
                    .any(|((child, _), replacement)| child != replacement);
                if changed {
                    let mut replacements = replacements.into_iter();
                    let rebuilt = constant.map_children(|child| {
                        replacements
                            .next()
                            .ok_or_else(|| malformed_error!("Child {} has no replacement", child))
                    })?;
                    let rebuilt =
                        ConstantPoolEditor::with_config(pool, &self.config).add_constant(rebuilt)?;
                    if let Some(resolved) = derived_resolution(pool, index, rebuilt)? {
                        pool.set_resolved(rebuilt, resolved)?;
                    }
                    rebuilt
                } else {
                    index
                }
            }
        };

        self.mapped.insert(index, mapped);
        Ok(mapped)
    }

    /// Remap every index site of `class`. Returns the number of sites that changed.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`ConstantRemapper::remap_index`], in which case no site
    /// is changed, or an error of the composer while laying out a method body again.
    pub fn remap(&mut self, class: &mut Class) -> Result<usize> {
        let indices: Vec<u16> = class
            .index_uses()
            .into_iter()
            .filter(|site| !(site.optional && site.index == 0))
            .map(|site| site.index)
            .collect();
        for index in indices {
            self.remap_index(&mut class.constant_pool, index)?;
        }

        let lengths: Vec<Option<u32>> = class
            .members
            .iter()
            .map(|member| member.code().map(CodeAttribute::code_length))
            .collect();

        let mut changed = 0;
        for site in class.index_sites() {
            if let Some(replacement) = self.mapped.get(&*site.index) {
                if *replacement != *site.index {
                    *site.index = *replacement;
                    changed += 1;
                }
            }
        }

        for (position, length) in lengths.into_iter().enumerate() {
            if let Some(length) = length {
                self.relayout(class, position, length)?;
            }
        }
        Ok(changed)
    }

    fn relayout(&self, class: &mut Class, position: usize, old_length: u32) -> Result<()> {
        let Some(code) = class.members[position].code() else {
            return Ok(());
        };
        if is_laid_out(code) {
            return Ok(());
        }

        let code = code.clone();
        let mut composer = CodeComposer::new(self.config, Arc::clone(&self.diagnostics));
        composer.begin_fragment(code.instructions.len())?;
        composer.append_code(&code)?;
        composer.append_label(old_length)?;
        composer.end_fragment()?;
        composer.commit(class, position)
    }
}

/// The resolved reference a rebuilt entry inherits from the entry it replaces.
///
/// A member reference whose `Class` child was replaced takes the class the new child
/// resolves to, or its name if that child is unresolved. Entries that already carry a
/// resolved reference keep it.
fn derived_resolution(
    pool: &ConstantPool,
    original: u16,
    rebuilt: u16,
) -> Result<Option<ResolvedRef>> {
    let Some(resolved) = pool.resolved(original) else {
        return Ok(None);
    };
    if pool.resolved(rebuilt).is_some() {
        return Ok(None);
    }
    let Some(kind) = pool.kind(rebuilt) else {
        return Ok(None);
    };

    let derived = match resolved {
        ResolvedRef::Class(_) if kind == ConstantKind::Class => {
            Some(ResolvedRef::Class(ClassKey::new(pool.class_name(rebuilt)?)))
        }
        ResolvedRef::Field(key) | ResolvedRef::Method(key) if kind.is_member_ref() => {
            let before = pool.member_ref(original)?;
            let after = pool.member_ref(rebuilt)?;
            let class = if before.class_index == after.class_index {
                key.class.clone()
            } else {
                pool.resolved(after.class_index)
                    .and_then(ResolvedRef::as_class)
                    .cloned()
                    .unwrap_or_else(|| ClassKey::new(after.class_name))
            };
            let member = MemberKey {
                class,
                name: Arc::from(after.name),
                descriptor: Arc::from(after.descriptor),
            };
            Some(match resolved {
                ResolvedRef::Field(_) => ResolvedRef::Field(member),
                _ => ResolvedRef::Method(member),
            })
        }
        _ => None,
    };
    Ok(derived)
}

/// Returns true if every cached instruction offset matches the encoded stream.
fn is_laid_out(code: &CodeAttribute) -> bool {
    let mut offset = 0;
    for entry in &code.instructions {
        if entry.offset != offset {
            return false;
        }
        offset = entry.end();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, Opcode},
        test::ClassBuilder,
    };

    #[test]
    fn test_substitution_rebuilds_parents() {
        let mut builder = ClassBuilder::new("demo/Client");
        let old_ref = builder.method_ref("demo/Old", "run", "()V");
        let old_class = builder.class_ref("demo/Old");
        let code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Invokevirtual, old_ref),
                Instruction::simple(Opcode::Return),
            ],
        );
        let mut class = builder.method("call", "()V", code).build();
        let size = class.constant_pool.len();

        let mut remapper = ConstantRemapper::new(|pool: &mut ConstantPool, index| {
            if index == old_class {
                return ConstantPoolEditor::new(pool).add_class("demo/New").map(Some);
            }
            Ok(None)
        });
        assert_eq!(remapper.remap(&mut class).unwrap(), 1);

        let new_ref = remapper.mapped(old_ref).unwrap();
        assert_ne!(new_ref, old_ref);
        let code = class.members[0].code().unwrap();
        assert_eq!(code.instructions[1].instruction.constant_index(), Some(new_ref));

        let member = class.constant_pool.member_ref(new_ref).unwrap();
        assert_eq!(member.class_name, "demo/New");
        assert_eq!(member.name, "run");

        // The original constant stays in place.
        assert_eq!(
            class.constant_pool.member_ref(old_ref).unwrap().class_name,
            "demo/Old"
        );
        // New Utf8, Class and Methodref; the NameAndType is shared.
        assert_eq!(class.constant_pool.len(), size + 3);
    }

    #[test]
    fn test_rebuilt_reference_follows_the_new_class() {
        let mut builder = ClassBuilder::new("demo/Client");
        let old_ref = builder.method_ref("demo/Old", "run", "()V");
        let kept_ref = builder.field_ref("demo/Client", "value", "I");
        let old_class = builder.class_ref("demo/Old");
        let code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Invokevirtual, old_ref),
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Getfield, kept_ref),
                Instruction::simple(Opcode::Ireturn),
            ],
        );
        let mut class = builder.method("call", "()I", code).build();
        // Inherited from a superclass of demo/Old.
        class
            .constant_pool
            .set_resolved(
                old_ref,
                ResolvedRef::Method(MemberKey::new("demo/Base", "run", "()V")),
            )
            .unwrap();
        class
            .constant_pool
            .set_resolved(kept_ref, ResolvedRef::Field(MemberKey::new("demo/Client", "value", "I")))
            .unwrap();

        let mut remapper = ConstantRemapper::new(|pool: &mut ConstantPool, index| {
            if index != old_class {
                return Ok(None);
            }
            let new_class = ConstantPoolEditor::new(pool).add_class("demo/New")?;
            pool.set_resolved(new_class, ResolvedRef::Class(ClassKey::new("demo/New")))?;
            Ok(Some(new_class))
        });
        remapper.remap(&mut class).unwrap();

        let new_ref = remapper.mapped(old_ref).unwrap();
        assert_eq!(
            class.constant_pool.resolved(new_ref),
            Some(&ResolvedRef::Method(MemberKey::new("demo/New", "run", "()V")))
        );
        assert_eq!(remapper.mapped(kept_ref), Some(kept_ref));
    }

    #[test]
    fn test_untouched_class_is_unchanged() {
        let mut builder = ClassBuilder::new("demo/Plain");
        builder.string("hello");
        let mut class = builder.field("value", "I").build();
        let before = class.clone();

        let mut remapper = ConstantRemapper::new(|_: &mut ConstantPool, _| Ok(None));
        assert_eq!(remapper.remap(&mut class).unwrap(), 0);
        assert_eq!(class.constant_pool.len(), before.constant_pool.len());
        assert_eq!(class.members, before.members);
    }

    #[test]
    fn test_dangling_site_fails() {
        let mut class = ClassBuilder::new("demo/Broken").build();
        class.interfaces.push(300);

        let mut remapper = ConstantRemapper::new(|_: &mut ConstantPool, _| Ok(None));
        assert!(remapper.remap(&mut class).is_err());
        assert_eq!(class.interfaces, [300]);
    }

    #[test]
    fn test_grown_ldc_is_laid_out_again() {
        let mut builder = ClassBuilder::new("demo/Constants");
        let old = builder.string("old");
        // 0: iload_0, 1: ifeq -> 6, 4: ldc, 6: areturn
        let mut code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Iload, 0),
                Instruction::branch(Opcode::Ifeq, 5),
                Instruction::constant_ref(Opcode::Ldc, old),
                Instruction::simple(Opcode::Areturn),
            ],
        );
        code.exception_table
            .push(crate::classfile::ExceptionEntry::new(4, 7, 6, 0));
        let mut class = builder
            .static_method("pick", "(Z)Ljava/lang/Object;", code)
            .build();
        for filler in 0..300 {
            ConstantPoolEditor::new(&mut class.constant_pool)
                .add_integer(filler)
                .unwrap();
        }

        let mut remapper = ConstantRemapper::new(|pool: &mut ConstantPool, index| {
            if index == old {
                return ConstantPoolEditor::new(pool).add_string("new").map(Some);
            }
            Ok(None)
        });
        assert_eq!(remapper.remap(&mut class).unwrap(), 1);

        let code = class.members[0].code().unwrap();
        let offsets: Vec<u32> = code.instructions.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 1, 4, 7]);
        assert_eq!(code.instructions[1].instruction.deltas(), [6]);
        assert_eq!(code.exception_table[0].end, 8);
        assert_eq!(code.code_length(), 8);
    }
}
