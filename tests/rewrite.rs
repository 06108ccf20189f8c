//! Integration tests for the reference rewriters.
//!
//! A small class pool is linked, then members are copied, renamed and redirected between
//! its classes. Every edited class is checked with the class validator afterwards.

mod common;

use std::{collections::HashMap, sync::Arc};

use classforge::prelude::*;

/// `demo/Counter { int count; void increment() { count++; } }`
fn counter() -> Result<Class> {
    let mut class = common::class("demo/Counter")?;
    common::add_field(&mut class, "count", "I")?;
    let count = ConstantPoolEditor::new(&mut class.constant_pool)
        .add_field_ref("demo/Counter", "count", "I")?;
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
    common::add_method(&mut class, "increment", "()V", code)?;
    Ok(class)
}

/// `demo/Client { Counter get(Counter c) { c.increment(); return (Counter) c; } }`
fn client() -> Result<Class> {
    let mut class = common::class("demo/Client")?;
    let (call, cast) = {
        let mut editor = ConstantPoolEditor::new(&mut class.constant_pool);
        (
            editor.add_method_ref("demo/Counter", "increment", "()V")?,
            editor.add_class("demo/Counter")?,
        )
    };
    let code = CodeAttribute::new(
        1,
        2,
        vec![
            Instruction::variable(Opcode::Aload, 1),
            Instruction::constant_ref(Opcode::Invokevirtual, call),
            Instruction::variable(Opcode::Aload, 1),
            Instruction::constant_ref(Opcode::Checkcast, cast),
            Instruction::simple(Opcode::Areturn),
        ],
    );
    common::add_method(&mut class, "get", "(Ldemo/Counter;)Ldemo/Counter;", code)?;
    Ok(class)
}

fn linked_pool() -> Result<ClassPool> {
    let mut pool = ClassPool::from_classes(vec![
        counter()?,
        client()?,
        common::class("demo/Other")?,
    ])?;
    pool.link_all();
    Ok(pool)
}

fn validate(class: &Class) -> Result<()> {
    ClassValidator::new(Arc::new(Diagnostics::new())).validate(class)
}

#[test]
fn copying_an_existing_field_reuses_it() -> Result<()> {
    let source = counter()?;
    let mut destination = common::class("demo/Holder")?;
    let existing = common::add_field(&mut destination, "count", "I")?;

    let diagnostics = Arc::new(Diagnostics::new());
    let mut copier = MemberCopier::new(
        &source,
        PreserveNames,
        EditorConfig::default(),
        Arc::clone(&diagnostics),
    );

    let position = copier.copy_member(&mut destination, 0)?;
    assert_eq!(position, existing);
    assert_eq!(destination.members.len(), 1);
    assert!(!diagnostics.has_warnings());
    Ok(())
}

#[test]
fn copied_method_brings_the_fields_it_uses() -> Result<()> {
    let source = counter()?;
    let mut destination = common::class("demo/Holder")?;

    let diagnostics = Arc::new(Diagnostics::new());
    let mut copier = MemberCopier::new(
        &source,
        SuffixNames::new(),
        EditorConfig::default(),
        Arc::clone(&diagnostics),
    );
    let method = copier.copy_method(&mut destination, 1)?;

    let pool = &destination.constant_pool;
    let names: Vec<&str> = destination
        .members
        .iter()
        .map(|member| member.name(pool))
        .collect::<Result<_>>()?;
    // The method is named first, the field on first use inside its body.
    assert_eq!(names, ["increment$0", "count$1"]);
    assert_eq!(copier.naming().next_value(), 2);
    assert_eq!(copier.copied("demo/Holder", 0), Some(1));

    let code = destination.members[method].code().unwrap();
    let field = code.instructions[2].instruction.constant_index().unwrap();
    let reference = pool.member_ref(field)?;
    assert_eq!(reference.class_name, "demo/Holder");
    assert_eq!(reference.name, "count$1");
    assert_eq!(code.instructions[5].instruction.constant_index(), Some(field));

    assert!(destination.members[method]
        .processing_flags
        .contains(ProcessingFlags::INJECTED));
    validate(&destination)?;

    // A second copy of the same method is answered from memory.
    assert_eq!(copier.copy_method(&mut destination, 1)?, method);
    assert_eq!(destination.members.len(), 2);
    Ok(())
}

#[test]
fn copied_field_accesses_are_found_after_linking() -> Result<()> {
    let pool = linked_pool()?;
    let source = pool.get("demo/Counter").unwrap();
    let mut destination = common::class("demo/Holder")?;

    let mut copier = MemberCopier::new(
        source,
        PreserveNames,
        EditorConfig::default(),
        Arc::new(Diagnostics::new()),
    );
    copier.copy_method(&mut destination, 1)?;

    let copied = ReferenceFinder::new(ResolvedRef::Field(MemberKey::new(
        "demo/Holder",
        "count",
        "I",
    )));
    assert!(copied.references(&destination));
    // getfield and putfield
    assert_eq!(copied.count_uses(&destination), 2);

    let original = ReferenceFinder::new(ResolvedRef::Field(MemberKey::new(
        "demo/Counter",
        "count",
        "I",
    )));
    assert_eq!(original.count_uses(&destination), 0);
    Ok(())
}

#[test]
fn one_copier_feeds_several_destinations() -> Result<()> {
    let source = counter()?;
    let mut first = common::class("demo/First")?;
    let mut second = common::class("demo/Second")?;
    common::add_field(&mut second, "other", "J")?;

    let mut copier = MemberCopier::new(
        &source,
        PreserveNames,
        EditorConfig::default(),
        Arc::new(Diagnostics::new()),
    );
    let in_first = copier.copy_method(&mut first, 1)?;
    let in_second = copier.copy_method(&mut second, 1)?;

    for (class, method) in [(&first, in_first), (&second, in_second)] {
        let pool = &class.constant_pool;
        assert_eq!(class.members[method].name(pool)?, "increment");
        let code = class.members[method].code().unwrap();
        let field = code.instructions[2].instruction.constant_index().unwrap();
        let reference = pool.member_ref(field)?;
        assert_eq!(reference.class_name, class.name()?);
        assert_eq!((reference.name, reference.descriptor), ("count", "I"));
        validate(class)?;
    }
    // other, increment, count
    assert_eq!(second.members.len(), 3);
    Ok(())
}

#[test]
fn rejected_collision_leaves_the_destination_alone() -> Result<()> {
    let source = counter()?;
    let mut destination = common::class("demo/Holder")?;
    common::add_field(&mut destination, "count", "J")?;

    let config = EditorConfig::strict();
    let mut copier = MemberCopier::new(
        &source,
        PreserveNames,
        config,
        Arc::new(Diagnostics::new()),
    );
    match copier.copy_member(&mut destination, 0) {
        Err(Error::MemberCollision { name, existing }) => {
            assert_eq!(name, "count");
            assert_eq!(existing, "J");
        }
        other => panic!("expected a collision, got {other:?}"),
    }
    assert_eq!(destination.members.len(), 1);
    Ok(())
}

#[test]
fn linking_resolves_references_across_the_pool() -> Result<()> {
    let pool = linked_pool()?;
    let client = pool.get("demo/Client").unwrap();

    let increment = ReferenceFinder::new(ResolvedRef::Method(MemberKey::new(
        "demo/Counter",
        "increment",
        "()V",
    )));
    assert!(increment.references(client));
    assert_eq!(increment.count_uses(client), 1);

    let referencing = ReferenceFinder::members_of("demo/Counter")
        .with_name_pattern("inc*")
        .classes_referencing(&pool)?;
    assert_eq!(referencing, ["demo/Client"]);
    Ok(())
}

#[test]
fn class_redirection_rewrites_resolved_references() -> Result<()> {
    let mut pool = linked_pool()?;
    let client = pool.get_mut("demo/Client").unwrap();

    let changed = redirect_class_references(
        client,
        &ClassKey::new("demo/Counter"),
        &ClassKey::new("demo/Other"),
        &EditorConfig::default(),
    )?;
    assert!(changed > 0);

    let pool_of = &client.constant_pool;
    assert_eq!(
        client.members[0].descriptor(pool_of)?,
        "(Ldemo/Other;)Ldemo/Other;"
    );
    let code = client.members[0].code().unwrap();
    let cast = code.instructions[3].instruction.constant_index().unwrap();
    assert_eq!(pool_of.class_name(cast)?, "demo/Other");
    let call = code.instructions[1].instruction.constant_index().unwrap();
    assert_eq!(pool_of.member_ref(call)?.class_name, "demo/Other");

    // The original constant stays in the pool, but nothing uses it any more.
    let original = ReferenceFinder::new(ResolvedRef::Class(ClassKey::new("demo/Counter")));
    assert!(original.references(client));
    assert_eq!(original.count_uses(client), 0);
    validate(client)?;
    Ok(())
}

#[test]
fn member_redirection_and_rename_keep_the_class_valid() -> Result<()> {
    let mut pool = linked_pool()?;

    let counter = pool.get_mut("demo/Counter").unwrap();
    let redirected = rename_member(counter, 0, "total", &EditorConfig::default())?;
    // getfield and putfield share one Fieldref.
    assert_eq!(redirected, 2);
    let code = counter.members[1].code().unwrap();
    let field = code.instructions[2].instruction.constant_index().unwrap();
    assert_eq!(counter.constant_pool.member_ref(field)?.name, "total");
    assert_eq!(
        counter.constant_pool.resolved(field),
        Some(&ResolvedRef::Field(MemberKey::new("demo/Counter", "total", "I")))
    );
    validate(counter)?;

    let client = pool.get_mut("demo/Client").unwrap();
    let redirections = HashMap::from([(
        MemberKey::new("demo/Counter", "increment", "()V"),
        MemberKey::new("demo/Counter", "step", "()V"),
    )]);
    assert_eq!(
        redirect_member_references(client, &redirections, &EditorConfig::default())?,
        1
    );
    let code = client.members[0].code().unwrap();
    let call = code.instructions[1].instruction.constant_index().unwrap();
    assert_eq!(client.constant_pool.member_ref(call)?.name, "step");
    validate(client)?;
    Ok(())
}
