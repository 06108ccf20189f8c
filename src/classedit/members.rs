//! Copying and renaming of fields and methods.
//!
//! [`MemberCopier`] copies members of one source class into destination classes. Names go
//! through a [`NamingPolicy`]; a copy whose name and descriptor already exist in the
//! destination reuses the existing member, and a name that exists with another descriptor is
//! resolved by the configured [`CollisionPolicy`]. Method bodies are rebuilt through the
//! [`CodeComposer`], so instructions whose constant indices grow (`ldc` to `ldc_w`) keep
//! their branch targets and exception ranges intact.
//!
//! Field accesses inside a copied body that target a field of the source class itself are
//! redirected to a copy of that field in the destination, which is created on first use.
//!
//! The copier remembers its copies per destination class. Asking for a member that was
//! already copied into the same destination returns the earlier copy and reports it.

use std::{collections::HashMap, sync::Arc};

use crate::{
    assembly::Instruction,
    classedit::{CodeComposer, ConstantPoolEditor, ConstantRemapper, ConstantTransplanter, NamingPolicy},
    classfile::{
        Attribute, Class, ClassKey, ConstantKind, ConstantPool, Member, MemberKey, MemberKind,
        ProcessingFlags, ResolvedRef,
    },
    diagnostics::{DiagnosticCategory, Diagnostics},
    CollisionPolicy, EditorConfig, Error, Result,
};

enum Placement {
    Existing(usize),
    New(String),
    Replace(usize),
}

/// Copies members from one source class, remembering what it has copied.
pub struct MemberCopier<'a, N> {
    transplanter: ConstantTransplanter<'a>,
    naming: N,
    config: EditorConfig,
    diagnostics: Arc<Diagnostics>,
    copied: HashMap<(ClassKey, usize), usize>,
}

impl<'a, N: NamingPolicy> MemberCopier<'a, N> {
    /// Create a copier reading from `source`.
    pub fn new(
        source: &'a Class,
        naming: N,
        config: EditorConfig,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        MemberCopier {
            transplanter: ConstantTransplanter::with_config(source, &config),
            naming,
            config,
            diagnostics,
            copied: HashMap::new(),
        }
    }

    /// The class members are copied from.
    #[must_use]
    pub fn source(&self) -> &'a Class {
        self.transplanter.source()
    }

    /// The naming policy.
    pub fn naming(&self) -> &N {
        &self.naming
    }

    /// Position in class `destination` of a source member copied there earlier.
    #[must_use]
    pub fn copied(&self, destination: &str, member_index: usize) -> Option<usize> {
        self.copied
            .get(&(ClassKey::new(destination), member_index))
            .copied()
    }

    /// Copy source member `member_index` into `destination` and return its position there.
    ///
    /// The naming policy is asked once per call that is not answered from memory; a call
    /// answered from memory is reported as an info diagnostic. A member
    /// with the resulting name and the same descriptor is reused as is. New members keep
    /// the access flags and descriptor of the source and are marked
    /// [`ProcessingFlags::INJECTED`]. `ConstantValue`, `Signature`, `Exceptions`,
    /// `Synthetic` and `Deprecated` attributes are transplanted, unknown attributes are
    /// dropped with a warning unless [`EditorConfig::copy_unknown_attributes`] is set, and a
    /// method body is copied with [`MemberCopier::copy_method_body`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MemberCollision`] under [`CollisionPolicy::Reject`], any
    /// error of the transplanter or the composer, and [`crate::Error::Malformed`] if
    /// `member_index` does not name a source member. A failed copy is not rolled back.
    pub fn copy_member(&mut self, destination: &mut Class, member_index: usize) -> Result<usize> {
        let key = (ClassKey::new(destination.name()?), member_index);
        if let Some(&position) = self.copied.get(&key) {
            self.diagnostics.info(
                DiagnosticCategory::Member,
                format!(
                    "Source member {member_index} was already copied into {} at {position}",
                    key.0
                ),
            );
            return Ok(position);
        }
        self.copy_new_member(destination, key)
    }

    fn copy_new_member(&mut self, destination: &mut Class, key: (ClassKey, usize)) -> Result<usize> {
        let member_index = key.1;
        let source: &'a Class = self.transplanter.source();
        let member = source
            .members
            .get(member_index)
            .ok_or_else(|| malformed_error!("Source class has no member {}", member_index))?;
        let name = member.name(&source.constant_pool)?;
        let descriptor = member.descriptor(&source.constant_pool)?;
        let candidate = self.naming.candidate_name(name, descriptor);

        let position = match self.place(destination, member.kind, candidate, descriptor)? {
            Placement::Existing(position) => {
                self.diagnostics.info(
                    DiagnosticCategory::Member,
                    format!("Reused existing member for copy of {name}{descriptor}"),
                );
                self.copied.insert(key, position);
                return Ok(position);
            }
            Placement::New(name) => {
                let name_index = self.transplanter.add_utf8(destination, &name)?;
                let descriptor_index = self.transplanter.add_utf8(destination, descriptor)?;
                let mut copy =
                    Member::new(member.kind, member.access_flags, name_index, descriptor_index);
                copy.processing_flags = ProcessingFlags::INJECTED;
                destination.members.push(copy);
                destination.members.len() - 1
            }
            Placement::Replace(position) => {
                let descriptor_index = self.transplanter.add_utf8(destination, descriptor)?;
                let existing = &mut destination.members[position];
                existing.access_flags = member.access_flags;
                existing.descriptor_index = descriptor_index;
                existing.attributes.clear();
                existing.processing_flags |= ProcessingFlags::INJECTED | ProcessingFlags::MODIFIED;
                position
            }
        };
        // Recorded before the body is copied, so recursive references find the copy.
        self.copied.insert(key, position);

        let mut attributes = Vec::with_capacity(member.attributes.len());
        let mut has_code = false;
        for attribute in &member.attributes {
            match attribute {
                Attribute::Code(_) => has_code = true,
                Attribute::Unknown { .. } if !self.config.copy_unknown_attributes => {
                    self.diagnostics.warning(
                        DiagnosticCategory::Member,
                        format!("Dropped unknown attribute of copied member {name}{descriptor}"),
                    );
                }
                other => attributes.push(self.transplanter.copy_attribute(destination, other)?),
            }
        }
        destination.members[position].attributes = attributes;

        if has_code {
            self.copy_method_body(destination, member_index, position)?;
        }
        Ok(position)
    }

    /// Copy source method `member_index` with its body. See [`MemberCopier::copy_member`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the source member is not a method, and any
    /// error of [`MemberCopier::copy_member`].
    pub fn copy_method(&mut self, destination: &mut Class, member_index: usize) -> Result<usize> {
        match self.source().members.get(member_index) {
            Some(member) if member.kind == MemberKind::Method => {
                self.copy_member(destination, member_index)
            }
            _ => Err(malformed_error!("Source member {} is not a method", member_index)),
        }
    }

    /// Compose the body of source method `member_index` into destination method
    /// `destination_method`, replacing its Code attribute.
    ///
    /// Constants are transplanted, except field references to the source class itself,
    /// which point at a copy of the field in the destination.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the source method has no body and any error
    /// of the transplanter or the composer.
    pub fn copy_method_body(
        &mut self,
        destination: &mut Class,
        member_index: usize,
        destination_method: usize,
    ) -> Result<()> {
        let source: &'a Class = self.transplanter.source();
        let mut code = source
            .members
            .get(member_index)
            .and_then(Member::code)
            .ok_or_else(|| malformed_error!("Source member {} has no code", member_index))?
            .clone();

        for handler in &mut code.exception_table {
            handler.catch_type = self
                .transplanter
                .copy_optional(destination, handler.catch_type)?;
        }
        for attribute in &mut code.attributes {
            if let Attribute::LocalVariableTable(variables)
            | Attribute::LocalVariableTypeTable(variables) = attribute
            {
                for variable in variables {
                    variable.name_index = self
                        .transplanter
                        .copy_constant(destination, variable.name_index)?;
                    variable.descriptor_index = self
                        .transplanter
                        .copy_constant(destination, variable.descriptor_index)?;
                }
            }
        }

        let mut composer = CodeComposer::new(self.config, Arc::clone(&self.diagnostics));
        composer.begin_fragment(code.instructions.len())?;
        composer.append_code_with(&code, |instruction| {
            if let Instruction::ConstantRef { index, .. } = instruction {
                *index = self.copy_code_constant(destination, *index)?;
            }
            Ok(())
        })?;
        composer.end_fragment()?;
        composer.commit(destination, destination_method)
    }

    fn copy_code_constant(&mut self, destination: &mut Class, index: u16) -> Result<u16> {
        let source: &'a Class = self.transplanter.source();
        if source.constant_pool.kind(index) == Some(ConstantKind::Fieldref) {
            let field = source.constant_pool.member_ref(index)?;
            if field.class_name == source.name()? {
                if let Some(position) =
                    source.find_member(MemberKind::Field, field.name, field.descriptor)
                {
                    let owner = destination.name()?.to_string();
                    let key = (ClassKey::new(&owner), position);
                    let copied = match self.copied.get(&key) {
                        Some(&copied) => copied,
                        None => self.copy_new_member(destination, key)?,
                    };
                    let copy = &destination.members[copied];
                    let name = copy.name(&destination.constant_pool)?.to_string();
                    let descriptor = copy.descriptor(&destination.constant_pool)?.to_string();

                    let pool = &mut destination.constant_pool;
                    let index = ConstantPoolEditor::with_config(pool, &self.config)
                        .add_field_ref(&owner, &name, &descriptor)?;
                    if pool.resolved(index).is_none() {
                        pool.set_resolved(
                            index,
                            ResolvedRef::Field(MemberKey::new(&owner, &name, &descriptor)),
                        )?;
                    }
                    return Ok(index);
                }
            }
        }
        self.transplanter.copy_constant(destination, index)
    }

    fn place(
        &self,
        destination: &Class,
        kind: MemberKind,
        candidate: String,
        descriptor: &str,
    ) -> Result<Placement> {
        if let Some(position) = destination.find_member(kind, &candidate, descriptor) {
            return Ok(Placement::Existing(position));
        }
        let Some(&first) = destination.members_named(kind, &candidate).first() else {
            return Ok(Placement::New(candidate));
        };
        let existing = destination.members[first]
            .descriptor(&destination.constant_pool)?
            .to_string();

        match self.config.collision_policy {
            CollisionPolicy::Rename => {
                let mut renamed = None;
                for name in (1..=u32::MAX).map(|n| format!("{candidate}${n}")) {
                    // An earlier rename of the same member is reused.
                    if let Some(position) = destination.find_member(kind, &name, descriptor) {
                        return Ok(Placement::Existing(position));
                    }
                    if destination.members_named(kind, &name).is_empty() {
                        renamed = Some(name);
                        break;
                    }
                }
                let renamed =
                    renamed.ok_or_else(|| malformed_error!("No free name for {}", candidate))?;
                self.diagnostics.warning(
                    DiagnosticCategory::Naming,
                    format!(
                        "Copy of {candidate}{descriptor} renamed to {renamed}; the destination declares {candidate}{existing}"
                    ),
                );
                Ok(Placement::New(renamed))
            }
            CollisionPolicy::Overload => {
                self.diagnostics.info(
                    DiagnosticCategory::Naming,
                    format!("Copy of {candidate}{descriptor} overloads {candidate}{existing}"),
                );
                Ok(Placement::New(candidate))
            }
            CollisionPolicy::Replace => {
                self.diagnostics.warning(
                    DiagnosticCategory::Naming,
                    format!("Copy of {candidate}{descriptor} replaces {candidate}{existing}"),
                );
                Ok(Placement::Replace(first))
            }
            CollisionPolicy::Reject => Err(Error::MemberCollision {
                name: candidate,
                existing,
            }),
        }
    }
}

/// Rename member `member_index` of `class` to `new_name` and repoint the class's own field
/// or method references to it. Returns the number of index sites that were redirected.
///
/// The old name constant is left in the pool for any other holder.
///
/// # Errors
///
/// Returns [`crate::Error::MemberCollision`] if the class already declares `new_name` with
/// the same descriptor, [`crate::Error::Malformed`] if `member_index` does not name a
/// member, and [`crate::Error::PoolOverflow`] if the new constants do not fit.
pub fn rename_member(
    class: &mut Class,
    member_index: usize,
    new_name: &str,
    config: &EditorConfig,
) -> Result<usize> {
    let member = class
        .members
        .get(member_index)
        .ok_or_else(|| malformed_error!("Class has no member {}", member_index))?;
    let kind = member.kind;
    let old_name = member.name(&class.constant_pool)?.to_string();
    let descriptor = member.descriptor(&class.constant_pool)?.to_string();
    let owner = class.name()?.to_string();

    if old_name == new_name {
        return Ok(0);
    }
    if class.find_member(kind, new_name, &descriptor).is_some() {
        return Err(Error::MemberCollision {
            name: new_name.to_string(),
            existing: descriptor,
        });
    }

    let name_index =
        ConstantPoolEditor::with_config(&mut class.constant_pool, config).add_utf8(new_name)?;
    class.members[member_index].name_index = name_index;

    let limit = config.max_pool_entries;
    let renamed = MemberKey::new(&owner, new_name, &descriptor);
    let mut remapper = ConstantRemapper::with_config(
        |pool: &mut ConstantPool, index| {
            let Some(constant_kind) = pool.kind(index).filter(|k| k.is_member_ref()) else {
                return Ok(None);
            };
            if (constant_kind == ConstantKind::Fieldref) != (kind == MemberKind::Field) {
                return Ok(None);
            }
            let reference = pool.member_ref(index)?;
            if reference.class_name != owner.as_str()
                || reference.name != old_name.as_str()
                || reference.descriptor != descriptor.as_str()
            {
                return Ok(None);
            }

            let was_resolved = pool.resolved(index).is_some();
            let new_index = ConstantPoolEditor::with_limit(pool, limit).add_member_ref(
                constant_kind,
                &owner,
                new_name,
                &descriptor,
            )?;
            if was_resolved && pool.resolved(new_index).is_none() {
                let resolved = match kind {
                    MemberKind::Field => ResolvedRef::Field(renamed.clone()),
                    MemberKind::Method => ResolvedRef::Method(renamed.clone()),
                };
                pool.set_resolved(new_index, resolved)?;
            }
            Ok(Some(new_index))
        },
        config,
    );
    remapper.remap(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::Opcode,
        classedit::{PreserveNames, SuffixNames},
        classfile::{CodeAttribute, ExceptionEntry, MemberAccessFlags},
        diagnostics::DiagnosticSeverity,
        test::ClassBuilder,
    };

    fn counter() -> Class {
        let mut builder = ClassBuilder::new("demo/Counter");
        let count = builder.field_ref("demo/Counter", "count", "I");
        let code = CodeAttribute::new(
            3,
            1,
            vec![
                Instruction::variable(Opcode::Aload, 0),
                Instruction::simple(Opcode::Dup),
                Instruction::constant_ref(Opcode::Getfield, count),
                Instruction::simple(Opcode::Iconst1),
                Instruction::simple(Opcode::Iadd),
                Instruction::constant_ref(Opcode::Putfield, count),
                Instruction::simple(Opcode::Return),
            ],
        );
        builder
            .field("count", "I")
            .method("increment", "()V", code)
            .build()
    }

    fn copier(source: &Class, config: EditorConfig) -> (MemberCopier<'_, PreserveNames>, Arc<Diagnostics>) {
        let diagnostics = Arc::new(Diagnostics::new());
        (
            MemberCopier::new(source, PreserveNames, config, Arc::clone(&diagnostics)),
            diagnostics,
        )
    }

    #[test]
    fn test_method_copy_brings_its_field() {
        let source = counter();
        let mut destination = ClassBuilder::new("demo/Target").build();
        let (mut copier, _) = copier(&source, EditorConfig::default());

        let position = copier.copy_method(&mut destination, 1).unwrap();
        assert_eq!(destination.members.len(), 2);

        let pool = &destination.constant_pool;
        let field = destination.find_member(MemberKind::Field, "count", "I").unwrap();
        assert_eq!(copier.copied("demo/Target", 0), Some(field));
        assert_eq!(copier.copied("demo/Target", 1), Some(position));

        let method = &destination.members[position];
        assert_eq!(method.name(pool).unwrap(), "increment");
        assert!(method.processing_flags.contains(ProcessingFlags::INJECTED));
        assert!(destination.members[field]
            .processing_flags
            .contains(ProcessingFlags::INJECTED));

        let code = method.code().unwrap();
        let get = code.instructions[2].instruction.constant_index().unwrap();
        let reference = pool.member_ref(get).unwrap();
        assert_eq!(reference.class_name, "demo/Target");
        assert_eq!(reference.name, "count");
        assert_eq!(
            pool.resolved(get),
            Some(&ResolvedRef::Field(MemberKey::new("demo/Target", "count", "I")))
        );
        assert_eq!(code.max_stack, 3);
        assert_eq!(code.max_locals, 1);
    }

    #[test]
    fn test_copy_reuses_identical_member() {
        let source = counter();
        let mut destination = ClassBuilder::new("demo/Target").build();

        let (mut first, _) = copier(&source, EditorConfig::default());
        assert_eq!(first.copy_member(&mut destination, 1).unwrap(), 0);
        assert_eq!(first.copy_member(&mut destination, 1).unwrap(), 0);
        let members = destination.members.len();

        let (mut second, diagnostics) = copier(&source, EditorConfig::default());
        assert_eq!(second.copy_member(&mut destination, 1).unwrap(), 0);
        assert_eq!(destination.members.len(), members);
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Info), 1);
    }

    #[test]
    fn test_repeated_copy_is_reported() {
        let source = counter();
        let mut destination = ClassBuilder::new("demo/Target").build();
        let (mut copier, diagnostics) = copier(&source, EditorConfig::default());

        let field = copier.copy_member(&mut destination, 0).unwrap();
        assert!(!diagnostics.has_any());
        assert_eq!(copier.copy_member(&mut destination, 0).unwrap(), field);

        let reports = diagnostics.by_category(DiagnosticCategory::Member);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, DiagnosticSeverity::Info);
        assert!(reports[0].message.contains("already copied"));
    }

    #[test]
    fn test_copier_serves_several_destinations() {
        let source = counter();
        let mut first = ClassBuilder::new("demo/First").build();
        let mut second = ClassBuilder::new("demo/Second").field("other", "J").build();
        let (mut copier, _) = copier(&source, EditorConfig::default());

        assert_eq!(copier.copy_member(&mut first, 0).unwrap(), 0);
        let position = copier.copy_member(&mut second, 0).unwrap();

        assert_eq!(position, 1);
        assert_eq!(
            second.members[position].name(&second.constant_pool).unwrap(),
            "count"
        );
        assert_eq!(
            second.members[0].descriptor(&second.constant_pool).unwrap(),
            "J"
        );
        assert_eq!(copier.copied("demo/First", 0), Some(0));
        assert_eq!(copier.copied("demo/Second", 0), Some(1));
    }

    #[test]
    fn test_rename_reuses_earlier_renamed_copy() {
        let source = ClassBuilder::new("demo/Source").field("value", "I").build();
        let mut destination = ClassBuilder::new("demo/Target").field("value", "J").build();

        let (mut first, _) = copier(&source, EditorConfig::default());
        let renamed = first.copy_member(&mut destination, 0).unwrap();

        let (mut second, diagnostics) = copier(&source, EditorConfig::default());
        assert_eq!(second.copy_member(&mut destination, 0).unwrap(), renamed);
        assert_eq!(destination.members.len(), 2);
        assert!(destination.members_named(MemberKind::Field, "value$2").is_empty());
        assert!(diagnostics.by_category(DiagnosticCategory::Naming).is_empty());
    }

    #[test]
    fn test_collision_policies() {
        let source = ClassBuilder::new("demo/Source").field("value", "I").build();
        let target = || ClassBuilder::new("demo/Target").field("value", "J").build();

        let mut renamed = target();
        let (mut copier_rename, diagnostics) = copier(&source, EditorConfig::default());
        let position = copier_rename.copy_member(&mut renamed, 0).unwrap();
        assert_eq!(
            renamed.members[position].name(&renamed.constant_pool).unwrap(),
            "value$1"
        );
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Naming).len(), 1);

        let mut overloaded = target();
        let config = EditorConfig::default().with_collision_policy(CollisionPolicy::Overload);
        copier(&source, config).0.copy_member(&mut overloaded, 0).unwrap();
        assert_eq!(overloaded.members_named(MemberKind::Field, "value").len(), 2);

        let mut replaced = target();
        let config = EditorConfig::default().with_collision_policy(CollisionPolicy::Replace);
        assert_eq!(copier(&source, config).0.copy_member(&mut replaced, 0).unwrap(), 0);
        assert_eq!(replaced.members.len(), 1);
        assert_eq!(
            replaced.members[0].descriptor(&replaced.constant_pool).unwrap(),
            "I"
        );

        let mut rejected = target();
        let result = copier(&source, EditorConfig::strict())
            .0
            .copy_member(&mut rejected, 0);
        assert!(matches!(
            result,
            Err(Error::MemberCollision { ref name, ref existing }) if name == "value" && existing == "J"
        ));
    }

    #[test]
    fn test_naming_policy_numbers_copies() {
        let source = counter();
        let mut destination = ClassBuilder::new("demo/Target").build();
        let mut copier = MemberCopier::new(
            &source,
            SuffixNames::new(),
            EditorConfig::default(),
            Arc::new(Diagnostics::new()),
        );

        let method = copier.copy_member(&mut destination, 1).unwrap();
        let pool = &destination.constant_pool;
        // The field is named second, when the method body reaches it.
        assert_eq!(destination.members[method].name(pool).unwrap(), "increment$0");
        assert!(destination
            .find_member(MemberKind::Field, "count$1", "I")
            .is_some());
        assert_eq!(copier.naming().next_value(), 2);
    }

    #[test]
    fn test_body_copy_widens_ldc() {
        let mut builder = ClassBuilder::new("demo/Source");
        let text = builder.string("text");
        let thrown = builder.class_ref("java/lang/RuntimeException");
        // 0: iload_0, 1: ifeq -> 7, 4: ldc, 6: areturn, 7: aconst_null, 8: areturn
        let mut code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Iload, 0),
                Instruction::branch(Opcode::Ifeq, 6),
                Instruction::constant_ref(Opcode::Ldc, text),
                Instruction::simple(Opcode::Areturn),
                Instruction::simple(Opcode::AconstNull),
                Instruction::simple(Opcode::Areturn),
            ],
        );
        code.exception_table
            .push(ExceptionEntry::new(4, 7, 7, thrown));
        let source = builder
            .static_method("pick", "(Z)Ljava/lang/Object;", code)
            .build();

        let mut builder = ClassBuilder::new("demo/Target");
        for filler in 0..300 {
            builder.utf8(&format!("filler{filler}"));
        }
        let mut destination = builder.build();

        let (mut copier, _) = copier(&source, EditorConfig::default());
        let position = copier.copy_member(&mut destination, 0).unwrap();

        let method = &destination.members[position];
        assert!(method.access_flags.contains(MemberAccessFlags::STATIC));
        let code = method.code().unwrap();
        let offsets: Vec<u32> = code.instructions.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 1, 4, 7, 8, 9]);
        assert_eq!(code.instructions[1].instruction.deltas(), [7]);
        assert_eq!(code.code_bytes().unwrap()[4], 0x13);

        let handler = code.exception_table[0];
        assert_eq!((handler.start, handler.end, handler.handler), (4, 8, 8));
        assert_eq!(
            destination.constant_pool.class_name(handler.catch_type).unwrap(),
            "java/lang/RuntimeException"
        );
    }

    #[test]
    fn test_rename_redirects_own_references() {
        let mut builder = ClassBuilder::new("demo/Self");
        let helper = builder.method_ref("demo/Self", "helper", "()V");
        let other = builder.method_ref("demo/Other", "helper", "()V");
        let code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Invokevirtual, helper),
                Instruction::constant_ref(Opcode::Invokestatic, other),
                Instruction::simple(Opcode::Return),
            ],
        );
        let mut class = builder
            .method("helper", "()V", CodeAttribute::new(0, 1, vec![Instruction::simple(Opcode::Return)]))
            .method("caller", "()V", code)
            .build();

        let config = EditorConfig::default();
        assert_eq!(rename_member(&mut class, 0, "assist", &config).unwrap(), 1);
        assert_eq!(
            class.members[0].name(&class.constant_pool).unwrap(),
            "assist"
        );

        let code = class.members[1].code().unwrap();
        let call = code.instructions[1].instruction.constant_index().unwrap();
        assert_eq!(class.constant_pool.member_ref(call).unwrap().name, "assist");
        assert_eq!(code.instructions[2].instruction.constant_index(), Some(other));

        assert!(matches!(
            rename_member(&mut class, 0, "caller", &config),
            Err(Error::MemberCollision { .. })
        ));
    }
}
