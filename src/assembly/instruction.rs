//! Instruction representation.
//!
//! [`Instruction`] is a closed sum type mirroring the operand shapes of the JVM instruction
//! set. Byte offsets are not part of an instruction; they belong to the
//! [`crate::classfile::CodeEntry`] that places it in a Code attribute. Branch and switch
//! operands are deltas relative to the offset of their own instruction, exactly as in the
//! serialized form.
//!
//! Local variable instructions are kept in a canonical form: `iload_2` is represented as
//! `Variable { opcode: Iload, slot: 2 }` and `ldc_w` as `ConstantRef { opcode: Ldc }`. The
//! encoder picks the most compact encoding for the operands, so the serialized length of a
//! canonical instruction follows from its operands alone.

use crate::{assembly::Opcode, classfile::ConstantKind};

const LDC_KINDS: &[ConstantKind] = &[
    ConstantKind::Integer,
    ConstantKind::Float,
    ConstantKind::String,
    ConstantKind::PrimitiveArray,
    ConstantKind::Class,
    ConstantKind::MethodHandle,
    ConstantKind::MethodType,
    ConstantKind::Dynamic,
];

/// A single JVM instruction with its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// An instruction without pool or local operands.
    ///
    /// `constant` carries the immediate of `bipush`, `sipush` and the array type of
    /// `newarray`; it is 0 for everything else.
    Simple {
        /// The opcode
        opcode: Opcode,
        /// Immediate operand, if the opcode has one
        constant: i32,
    },

    /// A local variable access: loads, stores, `ret` and `iinc`.
    Variable {
        /// The canonical opcode (`iload`, `astore`, `ret`, `iinc`, ...)
        opcode: Opcode,
        /// Local variable slot
        slot: u16,
        /// Increment of `iinc`; 0 for everything else
        constant: i32,
    },

    /// An instruction referencing a constant pool entry.
    ///
    /// `constant` carries the argument count of `invokeinterface` and the dimension count of
    /// `multianewarray`; it is 0 for everything else.
    ConstantRef {
        /// The opcode
        opcode: Opcode,
        /// Constant pool index of the operand
        index: u16,
        /// Extra unsigned operand, if the opcode has one
        constant: u8,
    },

    /// A branch with a signed delta relative to the branch instruction.
    Branch {
        /// The opcode
        opcode: Opcode,
        /// Jump delta in bytes
        delta: i32,
    },

    /// A `tableswitch` over the contiguous key range `low..=high`.
    TableSwitch {
        /// Delta taken when the key is out of range
        default: i32,
        /// Lowest key
        low: i32,
        /// Highest key
        high: i32,
        /// One delta per key, in key order
        jumps: Vec<i32>,
    },

    /// A `lookupswitch` over sorted `(key, delta)` pairs.
    LookupSwitch {
        /// Delta taken when no key matches
        default: i32,
        /// `(key, delta)` pairs sorted by key
        pairs: Vec<(i32, i32)>,
    },
}

impl Instruction {
    /// An operand-less instruction.
    #[must_use]
    pub fn simple(opcode: Opcode) -> Self {
        Instruction::Simple {
            opcode,
            constant: 0,
        }
    }

    /// `bipush`, `sipush` or `newarray` with its immediate.
    #[must_use]
    pub fn simple_with(opcode: Opcode, constant: i32) -> Self {
        Instruction::Simple { opcode, constant }
    }

    /// The most compact instruction pushing the int `value` without a pool constant.
    ///
    /// Returns `None` outside the `sipush` range; such values are loaded with `ldc` from an
    /// `Integer` constant.
    #[must_use]
    pub fn push_int(value: i32) -> Option<Self> {
        match value {
            -1..=5 => Opcode::from_u8((Opcode::Iconst0.value() as i32 + value) as u8)
                .map(Instruction::simple),
            v if i8::try_from(v).is_ok() => Some(Instruction::simple_with(Opcode::Bipush, v)),
            v if i16::try_from(v).is_ok() => Some(Instruction::simple_with(Opcode::Sipush, v)),
            _ => None,
        }
    }

    /// A local variable load, store or `ret`, normalized to its canonical opcode.
    #[must_use]
    pub fn variable(opcode: Opcode, slot: u16) -> Self {
        let (opcode, implicit) = canonical_variable(opcode);
        Instruction::Variable {
            opcode,
            slot: implicit.unwrap_or(slot),
            constant: 0,
        }
    }

    /// `iinc slot, increment`.
    #[must_use]
    pub fn iinc(slot: u16, increment: i32) -> Self {
        Instruction::Variable {
            opcode: Opcode::Iinc,
            slot,
            constant: increment,
        }
    }

    /// An instruction referencing pool entry `index`, normalized to its canonical opcode.
    #[must_use]
    pub fn constant_ref(opcode: Opcode, index: u16) -> Self {
        let opcode = if opcode == Opcode::LdcW {
            Opcode::Ldc
        } else {
            opcode
        };
        let constant = match opcode {
            Opcode::Multianewarray => 1,
            _ => 0,
        };
        Instruction::ConstantRef {
            opcode,
            index,
            constant,
        }
    }

    /// `invokeinterface` with its argument slot count (including the receiver).
    #[must_use]
    pub fn invokeinterface(index: u16, count: u8) -> Self {
        Instruction::ConstantRef {
            opcode: Opcode::Invokeinterface,
            index,
            constant: count,
        }
    }

    /// `multianewarray` with its dimension count.
    #[must_use]
    pub fn multianewarray(index: u16, dimensions: u8) -> Self {
        Instruction::ConstantRef {
            opcode: Opcode::Multianewarray,
            index,
            constant: dimensions,
        }
    }

    /// A branch with the given delta.
    #[must_use]
    pub fn branch(opcode: Opcode, delta: i32) -> Self {
        Instruction::Branch { opcode, delta }
    }

    /// The opcode this instruction is identified by.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Simple { opcode, .. }
            | Instruction::Variable { opcode, .. }
            | Instruction::ConstantRef { opcode, .. }
            | Instruction::Branch { opcode, .. } => *opcode,
            Instruction::TableSwitch { .. } => Opcode::Tableswitch,
            Instruction::LookupSwitch { .. } => Opcode::Lookupswitch,
        }
    }

    /// Returns true for branches and switches.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
        )
    }

    /// Jump deltas of this instruction; the switch default comes first.
    #[must_use]
    pub fn deltas(&self) -> Vec<i32> {
        match self {
            Instruction::Branch { delta, .. } => vec![*delta],
            Instruction::TableSwitch { default, jumps, .. } => {
                let mut deltas = Vec::with_capacity(jumps.len() + 1);
                deltas.push(*default);
                deltas.extend_from_slice(jumps);
                deltas
            }
            Instruction::LookupSwitch { default, pairs } => {
                let mut deltas = Vec::with_capacity(pairs.len() + 1);
                deltas.push(*default);
                deltas.extend(pairs.iter().map(|(_, delta)| *delta));
                deltas
            }
            _ => Vec::new(),
        }
    }

    /// Replace the jump deltas, in the order returned by [`Instruction::deltas`].
    ///
    /// Extra values are ignored and missing values leave the original delta in place.
    pub fn set_deltas(&mut self, deltas: &[i32]) {
        match self {
            Instruction::Branch { delta, .. } => {
                if let Some(new) = deltas.first() {
                    *delta = *new;
                }
            }
            Instruction::TableSwitch { default, jumps, .. } => {
                if let Some((new_default, rest)) = deltas.split_first() {
                    *default = *new_default;
                    for (jump, new) in jumps.iter_mut().zip(rest) {
                        *jump = *new;
                    }
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                if let Some((new_default, rest)) = deltas.split_first() {
                    *default = *new_default;
                    for ((_, jump), new) in pairs.iter_mut().zip(rest) {
                        *jump = *new;
                    }
                }
            }
            _ => {}
        }
    }

    /// The constant pool index referenced by this instruction, if any.
    #[must_use]
    pub fn constant_index(&self) -> Option<u16> {
        match self {
            Instruction::ConstantRef { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Pool kinds the constant operand of this instruction may name.
    ///
    /// Empty for instructions without a constant operand.
    #[must_use]
    pub fn constant_kinds(&self) -> &'static [ConstantKind] {
        let Instruction::ConstantRef { opcode, .. } = self else {
            return &[];
        };
        match opcode {
            Opcode::Ldc | Opcode::LdcW => LDC_KINDS,
            Opcode::Ldc2W => &[
                ConstantKind::Long,
                ConstantKind::Double,
                ConstantKind::Dynamic,
            ],
            Opcode::Getstatic | Opcode::Putstatic | Opcode::Getfield | Opcode::Putfield => {
                &[ConstantKind::Fieldref]
            }
            Opcode::Invokevirtual => &[ConstantKind::Methodref],
            Opcode::Invokespecial | Opcode::Invokestatic => {
                &[ConstantKind::Methodref, ConstantKind::InterfaceMethodref]
            }
            Opcode::Invokeinterface => &[ConstantKind::InterfaceMethodref],
            Opcode::Invokedynamic => &[ConstantKind::InvokeDynamic],
            _ => &[ConstantKind::Class],
        }
    }

    /// Number of local variable slots touched by a variable instruction, counted from its
    /// slot (`long` and `double` occupy two).
    #[must_use]
    pub fn local_slots(&self) -> Option<(u16, u16)> {
        match self {
            Instruction::Variable { opcode, slot, .. } => {
                let size = match opcode {
                    Opcode::Lload | Opcode::Dload | Opcode::Lstore | Opcode::Dstore => 2,
                    _ => 1,
                };
                Some((*slot, size))
            }
            _ => None,
        }
    }
}

/// Map a load/store opcode (including the `xload_n` shortcuts) to its canonical opcode and
/// the slot implied by a shortcut.
pub(crate) fn canonical_variable(opcode: Opcode) -> (Opcode, Option<u16>) {
    let value = opcode.value();
    match value {
        0x1a..=0x2d => {
            let relative = value - 0x1a;
            let base = Opcode::from_u8(Opcode::Iload.value() + relative / 4).unwrap_or(opcode);
            (base, Some(u16::from(relative % 4)))
        }
        0x3b..=0x4e => {
            let relative = value - 0x3b;
            let base = Opcode::from_u8(Opcode::Istore.value() + relative / 4).unwrap_or(opcode);
            (base, Some(u16::from(relative % 4)))
        }
        _ => (opcode, None),
    }
}

/// The `xload_n` / `xstore_n` shortcut for a canonical opcode and slot, if one exists.
pub(crate) fn variable_shortcut(opcode: Opcode, slot: u16) -> Option<Opcode> {
    if slot > 3 {
        return None;
    }
    let slot = slot as u8;
    let value = opcode.value();
    match value {
        0x15..=0x19 => Opcode::from_u8(0x1a + (value - 0x15) * 4 + slot),
        0x36..=0x3a => Opcode::from_u8(0x3b + (value - 0x36) * 4 + slot),
        _ => None,
    }
}
