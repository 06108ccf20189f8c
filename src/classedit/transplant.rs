//! Copying constants between the pools of two classes.
//!
//! A [`ConstantTransplanter`] pulls a constant and everything it depends on from a source
//! class into a destination class. Leaf constants are copied by value; composite constants
//! first transplant the entries they reference and are then rebuilt in the destination with
//! the new indices. All additions go through [`ConstantPoolEditor`], so an equal constant
//! already present in the destination is reused.
//!
//! A transplanter reads from one source and remembers every index it has mapped, so copying
//! many members from the same source collapses repeated references onto a single destination
//! entry. The memory is kept per destination class, identified by its name, so one
//! transplanter may feed several destinations.
//!
//! `Dynamic` and `InvokeDynamic` constants reference the source class's
//! `BootstrapMethods` attribute rather than its pool. The transplanter copies the bootstrap
//! method (handle and static arguments) into the destination's attribute and rewrites the
//! index accordingly.

use std::collections::HashMap;

use crate::{
    classedit::ConstantPoolEditor,
    classfile::{
        Attribute, BootstrapMethod, Class, ClassKey, Constant, ConstantKind, MAX_POOL_ENTRIES,
    },
    EditorConfig, Error, Result,
};

#[derive(Default)]
struct Memo {
    constants: HashMap<u16, u16>,
    bootstrap_methods: HashMap<u16, u16>,
}

/// Memoizing copier of constants from one class into others.
pub struct ConstantTransplanter<'a> {
    source: &'a Class,
    limit: usize,
    destination: Option<ClassKey>,
    memo: Memo,
    parked: HashMap<ClassKey, Memo>,
}

impl<'a> ConstantTransplanter<'a> {
    /// Create a transplanter reading from `source`.
    #[must_use]
    pub fn new(source: &'a Class) -> Self {
        ConstantTransplanter {
            source,
            limit: MAX_POOL_ENTRIES,
            destination: None,
            memo: Memo::default(),
            parked: HashMap::new(),
        }
    }

    /// Create a transplanter that respects the pool limit of `config`.
    #[must_use]
    pub fn with_config(source: &'a Class, config: &EditorConfig) -> Self {
        ConstantTransplanter {
            limit: config.max_pool_entries,
            ..Self::new(source)
        }
    }

    /// The class constants are copied from.
    #[must_use]
    pub fn source(&self) -> &'a Class {
        self.source
    }

    /// The destination the memo currently answers for.
    #[must_use]
    pub fn destination(&self) -> Option<&ClassKey> {
        self.destination.as_ref()
    }

    /// Number of source indices mapped into the current destination.
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.memo.constants.len()
    }

    /// The index previously produced for `source_index` in the current destination.
    #[must_use]
    pub fn mapped(&self, source_index: u16) -> Option<u16> {
        self.memo.constants.get(&source_index).copied()
    }

    /// Switch the memo to `destination`, keeping what was mapped into other classes.
    fn bind(&mut self, destination: &Class) -> Result<()> {
        let name = destination.name()?;
        if self.destination.as_ref().is_some_and(|key| key.name() == name) {
            return Ok(());
        }

        let key = ClassKey::new(name);
        let memo = self.parked.remove(&key).unwrap_or_default();
        let previous = std::mem::replace(&mut self.memo, memo);
        if let Some(previous_key) = self.destination.replace(key) {
            self.parked.insert(previous_key, previous);
        }
        Ok(())
    }

    /// Copy the constant at `source_index` and its dependencies into `destination`,
    /// returning its index there.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if the source entry or one of its
    /// dependencies is invalid and [`crate::Error::PoolOverflow`] if the destination pool
    /// is full.
    pub fn copy_constant(&mut self, destination: &mut Class, source_index: u16) -> Result<u16> {
        self.bind(destination)?;
        if let Some(&index) = self.memo.constants.get(&source_index) {
            return Ok(index);
        }

        let source: &'a Class = self.source;
        let source_pool = &source.constant_pool;
        let constant = source_pool.constant(source_index)?.clone();
        let rebuilt = match &constant {
            Constant::Dynamic {
                bootstrap_method_index,
                name_and_type_index,
            } => Constant::Dynamic {
                bootstrap_method_index: self
                    .copy_bootstrap_method(destination, *bootstrap_method_index)?,
                name_and_type_index: self.copy_constant(destination, *name_and_type_index)?,
            },
            Constant::InvokeDynamic {
                bootstrap_method_index,
                name_and_type_index,
            } => Constant::InvokeDynamic {
                bootstrap_method_index: self
                    .copy_bootstrap_method(destination, *bootstrap_method_index)?,
                name_and_type_index: self.copy_constant(destination, *name_and_type_index)?,
            },
            other => {
                for (child, kinds) in other.children() {
                    source_pool.expect(child, kinds, "a dependency of the copied constant")?;
                }
                other.map_children(|child| self.copy_constant(destination, child))?
            }
        };

        let index = ConstantPoolEditor::with_limit(&mut destination.constant_pool, self.limit)
            .add_constant(rebuilt)?;

        if let Some(resolved) = source_pool.resolved(source_index) {
            if destination.constant_pool.resolved(index).is_none() {
                destination
                    .constant_pool
                    .set_resolved(index, resolved.clone())?;
            }
        }

        self.memo.constants.insert(source_index, index);
        Ok(index)
    }

    /// Copy a possibly absent index: 0 stays 0.
    ///
    /// # Errors
    ///
    /// See [`ConstantTransplanter::copy_constant`].
    pub fn copy_optional(&mut self, destination: &mut Class, source_index: u16) -> Result<u16> {
        if source_index == 0 {
            Ok(0)
        } else {
            self.copy_constant(destination, source_index)
        }
    }

    /// Copy entry `source_index` of the source's `BootstrapMethods` attribute into the
    /// destination's, returning its index there.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the source has no such bootstrap method and
    /// any error of [`ConstantTransplanter::copy_constant`].
    pub fn copy_bootstrap_method(
        &mut self,
        destination: &mut Class,
        source_index: u16,
    ) -> Result<u16> {
        self.bind(destination)?;
        if let Some(&index) = self.memo.bootstrap_methods.get(&source_index) {
            return Ok(index);
        }

        let source: &'a Class = self.source;
        let source_method = source
            .bootstrap_methods()
            .get(source_index as usize)
            .ok_or_else(|| {
                malformed_error!("Bootstrap method {} does not exist in the source", source_index)
            })?;

        let method = BootstrapMethod {
            method_ref: self.copy_constant(destination, source_method.method_ref)?,
            arguments: source_method
                .arguments
                .iter()
                .map(|argument| self.copy_constant(destination, *argument))
                .collect::<Result<Vec<_>>>()?,
        };

        let index = destination.add_bootstrap_method(method);
        self.memo.bootstrap_methods.insert(source_index, index);
        Ok(index)
    }

    /// A copy of a member attribute whose pool indices refer to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] for Code attributes, whose instruction
    /// lengths may change with the new indices and which must be copied through
    /// [`crate::classedit::CodeComposer`], and any error of
    /// [`ConstantTransplanter::copy_constant`].
    pub fn copy_attribute(
        &mut self,
        destination: &mut Class,
        attribute: &Attribute,
    ) -> Result<Attribute> {
        if matches!(attribute, Attribute::Code(_)) {
            return Err(Error::ComposerState(
                "Code attributes are copied through the code composer".to_string(),
            ));
        }

        let mut copy = attribute.clone();
        for site in copy.index_sites() {
            if *site.index == 0 && site.optional {
                continue;
            }
            self.source
                .constant_pool
                .expect(*site.index, site.kinds, "a constant of the attribute's kind")?;
            *site.index = self.copy_constant(destination, *site.index)?;
        }
        Ok(copy)
    }

    /// Copy a `Utf8` by value, used for names that are not copied from a source index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the destination pool is full.
    pub fn add_utf8(&self, destination: &mut Class, value: &str) -> Result<u16> {
        ConstantPoolEditor::with_limit(&mut destination.constant_pool, self.limit).add_utf8(value)
    }

    /// The kind of the source entry at `source_index`.
    #[must_use]
    pub fn source_kind(&self, source_index: u16) -> Option<ConstantKind> {
        self.source.constant_pool.kind(source_index)
    }
}
