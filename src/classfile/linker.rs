//! Population of resolved references.
//!
//! The [`Linker`] snapshots the class hierarchy and member tables of a [`ClassPool`] and
//! then fills the resolved-reference cache of `Class`, `Fieldref`, `Methodref` and
//! `InterfaceMethodref` constants. Field and method references resolve to the class that
//! actually declares the member, following the lookup order of the JVM: fields search the
//! class, then its superinterfaces, then its superclass; methods search the superclass chain
//! first and the superinterfaces afterwards.
//!
//! References to classes outside the pool (library classes) stay unresolved. Editing
//! operations treat unresolved references as "nothing to redirect".
//!
//! # Examples
//!
//! ```rust
//! use classforge::classfile::{ClassKey, ClassPool, Linker, MemberKey, ResolvedRef};
//! # use classforge::classfile::{Class, ClassAccessFlags, ConstantPool};
//! # use classforge::classedit::ConstantPoolEditor;
//! # let mut pool = ConstantPool::new();
//! # let this_class = ConstantPoolEditor::new(&mut pool).add_class("demo/Main")?;
//! # let class = Class::new(pool, ClassAccessFlags::PUBLIC, this_class, 0);
//! let mut classes = ClassPool::from_classes(vec![class])?;
//! let linked = classes.link_all();
//!
//! let main = classes.get("demo/Main").unwrap();
//! assert_eq!(linked, 1);
//! assert_eq!(
//!     main.constant_pool.resolved(main.this_class),
//!     Some(&ResolvedRef::Class(ClassKey::new("demo/Main")))
//! );
//! # Ok::<(), classforge::Error>(())
//! ```

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    classfile::{
        Class, ClassKey, ClassPool, Constant, ConstantKind, MemberKey, MemberKind, ResolvedRef,
    },
    Result,
};

#[derive(Debug)]
struct ClassInfo {
    super_name: Option<Arc<str>>,
    interfaces: Vec<Arc<str>>,
    fields: HashSet<(Arc<str>, Arc<str>)>,
    methods: HashSet<(Arc<str>, Arc<str>)>,
}

impl ClassInfo {
    fn from_class(class: &Class) -> Result<Self> {
        let pool = &class.constant_pool;
        let mut info = ClassInfo {
            super_name: class.super_name()?.map(Arc::from),
            interfaces: class
                .interface_names()?
                .into_iter()
                .map(Arc::from)
                .collect(),
            fields: HashSet::new(),
            methods: HashSet::new(),
        };

        for member in &class.members {
            let signature = (
                Arc::from(member.name(pool)?),
                Arc::from(member.descriptor(pool)?),
            );
            match member.kind {
                MemberKind::Field => info.fields.insert(signature),
                MemberKind::Method => info.methods.insert(signature),
            };
        }

        Ok(info)
    }
}

/// Resolves class and member references against a snapshot of a [`ClassPool`].
#[derive(Debug, Default)]
pub struct Linker {
    classes: DashMap<Arc<str>, Arc<ClassInfo>>,
}

impl Linker {
    /// Snapshot the hierarchy and member tables of `pool`.
    ///
    /// Classes whose header or member names do not resolve are left out of the snapshot.
    #[must_use]
    pub fn new(pool: &ClassPool) -> Self {
        let linker = Linker::default();
        pool.classes().par_iter().for_each(|class| {
            if let (Ok(name), Ok(info)) = (class.name(), ClassInfo::from_class(class)) {
                linker.classes.insert(Arc::from(name), Arc::new(info));
            }
        });
        linker
    }

    fn info(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns true if `name` is part of the snapshot.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Resolve a class by internal name.
    #[must_use]
    pub fn resolve_class(&self, name: &str) -> Option<ClassKey> {
        self.contains(name).then(|| ClassKey::new(name))
    }

    /// Resolve a field, returning the key of its declaring class.
    #[must_use]
    pub fn resolve_field(&self, class: &str, name: &str, descriptor: &str) -> Option<MemberKey> {
        // Depth-first: the class, its superinterfaces, then its superclass.
        let mut visited = HashSet::new();
        let mut stack: Vec<Arc<str>> = vec![Arc::from(class)];

        while let Some(current) = stack.pop() {
            if !visited.insert(Arc::clone(&current)) {
                continue;
            }
            let Some(info) = self.info(&current) else {
                continue;
            };
            if info.fields.contains(&(Arc::from(name), Arc::from(descriptor))) {
                return Some(MemberKey::new(&current, name, descriptor));
            }
            if let Some(super_name) = &info.super_name {
                stack.push(Arc::clone(super_name));
            }
            stack.extend(info.interfaces.iter().rev().cloned());
        }

        None
    }

    /// Resolve a method, returning the key of its declaring class.
    #[must_use]
    pub fn resolve_method(&self, class: &str, name: &str, descriptor: &str) -> Option<MemberKey> {
        let signature = (Arc::<str>::from(name), Arc::<str>::from(descriptor));
        let mut interfaces = VecDeque::new();
        let mut visited = HashSet::new();

        let mut current = Some(Arc::<str>::from(class));
        while let Some(name_in_chain) = current {
            let Some(info) = self.info(&name_in_chain) else {
                break;
            };
            if info.methods.contains(&signature) {
                return Some(MemberKey::new(&name_in_chain, name, descriptor));
            }
            interfaces.extend(info.interfaces.iter().cloned());
            current = info.super_name.clone();
        }

        while let Some(interface) = interfaces.pop_front() {
            if !visited.insert(Arc::clone(&interface)) {
                continue;
            }
            let Some(info) = self.info(&interface) else {
                continue;
            };
            if info.methods.contains(&signature) {
                return Some(MemberKey::new(&interface, name, descriptor));
            }
            interfaces.extend(info.interfaces.iter().cloned());
        }

        None
    }

    /// Fill the empty resolved-reference caches of `class`'s constant pool. Entries that
    /// already carry a resolved reference are left as they are, so linking can be re-run
    /// after edits. Returns the number of entries newly resolved.
    pub fn link_class(&self, class: &mut Class) -> usize {
        let pool = &class.constant_pool;
        let mut resolved = Vec::new();

        for (index, entry) in pool.iter() {
            if entry.resolved().is_some() {
                continue;
            }

            let target = match entry.constant() {
                Constant::Class { .. } => pool
                    .class_name(index)
                    .ok()
                    .and_then(|name| self.resolve_class(name))
                    .map(ResolvedRef::Class),
                constant if constant.kind().is_member_ref() => {
                    pool.member_ref(index).ok().and_then(|member| {
                        if member.kind == ConstantKind::Fieldref {
                            self.resolve_field(member.class_name, member.name, member.descriptor)
                                .map(ResolvedRef::Field)
                        } else {
                            self.resolve_method(member.class_name, member.name, member.descriptor)
                                .map(ResolvedRef::Method)
                        }
                    })
                }
                _ => None,
            };

            if let Some(target) = target {
                resolved.push((index, target));
            }
        }

        let count = resolved.len();
        for (index, target) in resolved {
            // Indices come from iterating the same pool.
            let _ = class.constant_pool.set_resolved(index, target);
        }
        count
    }
}
