//! Constant pool growth with value deduplication.
//!
//! [`ConstantPoolEditor`] is the only way the crate adds entries to a
//! [`crate::classfile::ConstantPool`]. Every `add_*` operation first looks up a structurally
//! equal entry (same kind, same values, nested names and descriptors compared as strings,
//! floating point values compared by bit pattern) and returns its index; only when none
//! exists is a new entry appended. Lookups go through the pool's value index and are O(1).
//!
//! # Examples
//!
//! ```rust
//! use classforge::{classedit::ConstantPoolEditor, classfile::ConstantPool};
//!
//! let mut pool = ConstantPool::new();
//! let mut editor = ConstantPoolEditor::new(&mut pool);
//!
//! let first = editor.add_method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V")?;
//! let size = editor.pool().len();
//! let second = editor.add_method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V")?;
//!
//! assert_eq!(first, second);
//! assert_eq!(editor.pool().len(), size);
//! # Ok::<(), classforge::Error>(())
//! ```

use crate::{
    classfile::{
        Constant, ConstantKind, ConstantPool, PrimitiveArray, ReferenceKind, MAX_POOL_ENTRIES,
    },
    EditorConfig, Result,
};

/// Appends deduplicated constants to a pool.
pub struct ConstantPoolEditor<'a> {
    pool: &'a mut ConstantPool,
    limit: usize,
}

impl<'a> ConstantPoolEditor<'a> {
    /// Edit `pool` up to the format limit of 65535 slots.
    pub fn new(pool: &'a mut ConstantPool) -> Self {
        Self::with_limit(pool, MAX_POOL_ENTRIES)
    }

    /// Edit `pool` with a lower slot limit (counting slot 0).
    pub fn with_limit(pool: &'a mut ConstantPool, limit: usize) -> Self {
        ConstantPoolEditor {
            pool,
            limit: limit.min(MAX_POOL_ENTRIES),
        }
    }

    /// Edit `pool` with the limit of `config`.
    pub fn with_config(pool: &'a mut ConstantPool, config: &EditorConfig) -> Self {
        Self::with_limit(pool, config.max_pool_entries)
    }

    /// The pool being edited.
    #[must_use]
    pub fn pool(&self) -> &ConstantPool {
        self.pool
    }

    /// Add a constant whose child indices already refer to this pool.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if a child index does not name an entry of
    /// the kind the constant requires, and [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_constant(&mut self, constant: Constant) -> Result<u16> {
        if constant == Constant::Unusable {
            return Err(malformed_error!("Placeholder slots cannot be added explicitly"));
        }

        for (index, kinds) in constant.children() {
            self.pool.expect(index, kinds, kind_description(kinds))?;
        }

        if let Some(existing) = self.pool.find(&constant) {
            return Ok(existing);
        }
        self.pool.push(constant, self.limit)
    }

    /// Add a `Utf8` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.add_constant(Constant::Utf8(value.to_string()))
    }

    /// Add an `Integer` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.add_constant(Constant::Integer(value))
    }

    /// Add a `Float` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_float(&mut self, value: f32) -> Result<u16> {
        self.add_constant(Constant::Float(value))
    }

    /// Add a `Long` constant, occupying two slots.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_long(&mut self, value: i64) -> Result<u16> {
        self.add_constant(Constant::Long(value))
    }

    /// Add a `Double` constant, occupying two slots.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_double(&mut self, value: f64) -> Result<u16> {
        self.add_constant(Constant::Double(value))
    }

    /// Add a `String` constant and its `Utf8`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.add_utf8(value)?;
        self.add_constant(Constant::String { string_index })
    }

    /// Add a `PrimitiveArray` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_primitive_array(&mut self, values: PrimitiveArray) -> Result<u16> {
        self.add_constant(Constant::PrimitiveArray(values))
    }

    /// Add a `Class` constant for an internal class name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.add_constant(Constant::Class { name_index })
    }

    /// Add a `NameAndType` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add_constant(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Add a `Fieldref`, `Methodref` or `InterfaceMethodref` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `kind` is not a member reference kind and
    /// [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_member_ref(
        &mut self,
        kind: ConstantKind,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        let constant = match kind {
            ConstantKind::Fieldref => Constant::Fieldref {
                class_index,
                name_and_type_index,
            },
            ConstantKind::Methodref => Constant::Methodref {
                class_index,
                name_and_type_index,
            },
            ConstantKind::InterfaceMethodref => Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
            other => return Err(malformed_error!("{} is not a member reference kind", other)),
        };
        self.add_constant(constant)
    }

    /// Add a `Fieldref` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        self.add_member_ref(ConstantKind::Fieldref, class, name, descriptor)
    }

    /// Add a `Methodref` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        self.add_member_ref(ConstantKind::Methodref, class, name, descriptor)
    }

    /// Add an `InterfaceMethodref` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        self.add_member_ref(ConstantKind::InterfaceMethodref, class, name, descriptor)
    }

    /// Add a `MethodHandle` constant for an existing member reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if `reference_index` does not name a
    /// member reference allowed for `kind`, and [`crate::Error::PoolOverflow`] if the pool
    /// is full.
    pub fn add_method_handle(&mut self, kind: ReferenceKind, reference_index: u16) -> Result<u16> {
        self.add_constant(Constant::MethodHandle {
            kind,
            reference_index,
        })
    }

    /// Add a `MethodType` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_method_type(&mut self, descriptor: &str) -> Result<u16> {
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add_constant(Constant::MethodType { descriptor_index })
    }

    /// Add a `Dynamic` constant. `bootstrap_method_index` indexes the class's
    /// `BootstrapMethods` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_dynamic(
        &mut self,
        bootstrap_method_index: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add_constant(Constant::Dynamic {
            bootstrap_method_index,
            name_and_type_index,
        })
    }

    /// Add an `InvokeDynamic` constant. `bootstrap_method_index` indexes the class's
    /// `BootstrapMethods` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method_index: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add_constant(Constant::InvokeDynamic {
            bootstrap_method_index,
            name_and_type_index,
        })
    }

    /// Add a `Module` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_module(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.add_constant(Constant::Module { name_index })
    }

    /// Add a `Package` constant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PoolOverflow`] if the pool is full.
    pub fn add_package(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.add_constant(Constant::Package { name_index })
    }
}

fn kind_description(kinds: &[ConstantKind]) -> &'static str {
    match kinds {
        [ConstantKind::Utf8] => "Utf8",
        [ConstantKind::Class] => "Class",
        [ConstantKind::NameAndType] => "NameAndType",
        [ConstantKind::Fieldref] => "Fieldref",
        [ConstantKind::Methodref] => "Methodref",
        [ConstantKind::InterfaceMethodref] => "InterfaceMethodref",
        _ => "Methodref or InterfaceMethodref",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_dedup_is_idempotent() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);

        let a = editor.add_field_ref("demo/Point", "x", "I").unwrap();
        let size = editor.pool().len();
        let b = editor.add_field_ref("demo/Point", "x", "I").unwrap();

        assert_eq!(a, b);
        assert_eq!(editor.pool().len(), size);
        // Utf8, Class, Utf8 x2, NameAndType, Fieldref
        assert_eq!(size, 1 + 6);
    }

    #[test]
    fn test_long_and_double_take_two_slots() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);

        assert_eq!(editor.add_long(1).unwrap(), 1);
        assert_eq!(editor.add_double(1.0).unwrap(), 3);
        assert_eq!(editor.add_integer(1).unwrap(), 5);
        assert_eq!(editor.add_long(1).unwrap(), 1);
        assert_eq!(editor.pool().len(), 6);
    }

    #[test]
    fn test_kind_distinguishes_entries() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);

        let method = editor.add_method_ref("demo/Api", "run", "()V").unwrap();
        let interface = editor.add_interface_method_ref("demo/Api", "run", "()V").unwrap();
        let class = editor.add_class("demo/Api").unwrap();
        let module = editor.add_module("demo/Api").unwrap();

        assert_ne!(method, interface);
        assert_ne!(class, module);
    }

    #[test]
    fn test_add_constant_validates_children() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);
        let class = editor.add_class("demo/Api").unwrap();

        let result = editor.add_constant(Constant::String {
            string_index: class,
        });
        assert!(matches!(
            result,
            Err(Error::DanglingReference {
                expected: "Utf8",
                found: Some(ConstantKind::Class),
                ..
            })
        ));

        let method = editor.add_method_ref("demo/Api", "run", "()V").unwrap();
        assert!(editor
            .add_method_handle(ReferenceKind::InvokeInterface, method)
            .is_err());
        assert!(editor
            .add_method_handle(ReferenceKind::InvokeStatic, method)
            .is_ok());
    }

    #[test]
    fn test_overflow() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::with_limit(&mut pool, 4);

        editor.add_integer(1).unwrap();
        editor.add_integer(2).unwrap();
        editor.add_integer(3).unwrap();
        assert!(matches!(
            editor.add_integer(4),
            Err(Error::PoolOverflow { limit: 4 })
        ));
        // Existing values are still found when the pool is full.
        assert_eq!(editor.add_integer(2).unwrap(), 2);
    }

    #[test]
    fn test_float_bits() {
        let mut pool = ConstantPool::new();
        let mut editor = ConstantPoolEditor::new(&mut pool);

        let zero = editor.add_float(0.0).unwrap();
        let negative_zero = editor.add_float(-0.0).unwrap();
        let nan = editor.add_float(f32::NAN).unwrap();

        assert_ne!(zero, negative_zero);
        assert_eq!(editor.add_float(f32::NAN).unwrap(), nan);
    }
}
