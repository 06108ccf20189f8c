//! Instruction encoding.
//!
//! The serialized length of an instruction depends only on its operands and, for switches,
//! on its own offset (the operands are padded to a 4-byte boundary relative to the start of
//! the code array). [`Instruction::length`] computes that length without producing bytes so
//! that the code composer can lay out a stream before any byte is written.
//!
//! # Usage Examples
//!
//! ```rust
//! use classforge::assembly::{Instruction, Opcode};
//!
//! let load = Instruction::variable(Opcode::Aload, 2);
//! assert_eq!(load.length(0), 1); // aload_2
//!
//! let mut bytes = Vec::new();
//! load.write(0, &mut bytes)?;
//! assert_eq!(bytes, [0x2c]);
//! # Ok::<(), classforge::Error>(())
//! ```

use crate::{
    assembly::{instruction::variable_shortcut, Instruction, Opcode},
    classfile::CodeEntry,
    Error, Result,
};

/// Number of padding bytes following a switch opcode located at `offset`.
#[must_use]
pub fn switch_padding(offset: u32) -> usize {
    (3 - (offset as usize % 4)) % 4
}

fn iinc_is_narrow(slot: u16, constant: i32) -> bool {
    slot <= 0xff && i8::try_from(constant).is_ok()
}

impl Instruction {
    /// Serialized length in bytes of this instruction when placed at `offset`.
    #[must_use]
    pub fn length(&self, offset: u32) -> usize {
        match self {
            Instruction::Simple { opcode, .. } => match opcode {
                Opcode::Bipush | Opcode::Newarray => 2,
                Opcode::Sipush => 3,
                _ => 1,
            },
            Instruction::Variable {
                opcode,
                slot,
                constant,
            } => match opcode {
                Opcode::Iinc if iinc_is_narrow(*slot, *constant) => 3,
                Opcode::Iinc => 6,
                _ if variable_shortcut(*opcode, *slot).is_some() => 1,
                _ if *slot <= 0xff => 2,
                _ => 4,
            },
            Instruction::ConstantRef { opcode, index, .. } => match opcode {
                Opcode::Ldc if *index <= 0xff => 2,
                Opcode::Invokeinterface | Opcode::Invokedynamic => 5,
                Opcode::Multianewarray => 4,
                _ => 3,
            },
            Instruction::Branch { opcode, .. } => {
                if opcode.is_wide_branch() {
                    5
                } else {
                    3
                }
            }
            Instruction::TableSwitch { jumps, .. } => {
                1 + switch_padding(offset) + 12 + 4 * jumps.len()
            }
            Instruction::LookupSwitch { pairs, .. } => {
                1 + switch_padding(offset) + 8 + 8 * pairs.len()
            }
        }
    }

    /// Append the serialized form of this instruction, placed at `offset`, to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnencodableOffset`] if a branch delta does not fit the
    /// encoding of its opcode, and [`crate::Error::Malformed`] for operands the instruction
    /// set cannot express (an oversized `iinc` increment, an inconsistent switch table, a
    /// canonical opcode used with the wrong operand shape).
    pub fn write(&self, offset: u32, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Instruction::Simple { opcode, constant } => {
                out.push(opcode.value());
                match opcode {
                    Opcode::Bipush => {
                        let value = i8::try_from(*constant).map_err(|_| {
                            malformed_error!("bipush operand {} out of range", constant)
                        })?;
                        out.extend_from_slice(&value.to_be_bytes());
                    }
                    Opcode::Newarray => {
                        let value = u8::try_from(*constant).map_err(|_| {
                            malformed_error!("newarray type {} out of range", constant)
                        })?;
                        out.push(value);
                    }
                    Opcode::Sipush => {
                        let value = i16::try_from(*constant).map_err(|_| {
                            malformed_error!("sipush operand {} out of range", constant)
                        })?;
                        out.extend_from_slice(&value.to_be_bytes());
                    }
                    _ => {}
                }
            }
            Instruction::Variable {
                opcode,
                slot,
                constant,
            } => {
                if *opcode == Opcode::Iinc {
                    if iinc_is_narrow(*slot, *constant) {
                        out.push(Opcode::Iinc.value());
                        out.push(*slot as u8);
                        out.extend_from_slice(&(*constant as i8).to_be_bytes());
                    } else {
                        let increment = i16::try_from(*constant).map_err(|_| {
                            malformed_error!("iinc increment {} out of range", constant)
                        })?;
                        out.push(Opcode::Wide.value());
                        out.push(Opcode::Iinc.value());
                        out.extend_from_slice(&slot.to_be_bytes());
                        out.extend_from_slice(&increment.to_be_bytes());
                    }
                } else if let Some(shortcut) = variable_shortcut(*opcode, *slot) {
                    out.push(shortcut.value());
                } else if !matches!(opcode.value(), 0x15..=0x19 | 0x36..=0x3a | 0xa9) {
                    return Err(malformed_error!(
                        "{} is not a local variable instruction",
                        opcode
                    ));
                } else if *slot <= 0xff {
                    out.push(opcode.value());
                    out.push(*slot as u8);
                } else {
                    out.push(Opcode::Wide.value());
                    out.push(opcode.value());
                    out.extend_from_slice(&slot.to_be_bytes());
                }
            }
            Instruction::ConstantRef {
                opcode,
                index,
                constant,
            } => match opcode {
                Opcode::Ldc if *index <= 0xff => {
                    out.push(Opcode::Ldc.value());
                    out.push(*index as u8);
                }
                Opcode::Ldc => {
                    out.push(Opcode::LdcW.value());
                    out.extend_from_slice(&index.to_be_bytes());
                }
                Opcode::Invokeinterface => {
                    out.push(opcode.value());
                    out.extend_from_slice(&index.to_be_bytes());
                    out.push(*constant);
                    out.push(0);
                }
                Opcode::Invokedynamic => {
                    out.push(opcode.value());
                    out.extend_from_slice(&index.to_be_bytes());
                    out.extend_from_slice(&[0, 0]);
                }
                Opcode::Multianewarray => {
                    out.push(opcode.value());
                    out.extend_from_slice(&index.to_be_bytes());
                    out.push(*constant);
                }
                _ => {
                    out.push(opcode.value());
                    out.extend_from_slice(&index.to_be_bytes());
                }
            },
            Instruction::Branch { opcode, delta } => {
                out.push(opcode.value());
                if opcode.is_wide_branch() {
                    out.extend_from_slice(&delta.to_be_bytes());
                } else {
                    let narrow = i16::try_from(*delta).map_err(|_| Error::UnencodableOffset {
                        offset,
                        delta: i64::from(*delta),
                    })?;
                    out.extend_from_slice(&narrow.to_be_bytes());
                }
            }
            Instruction::TableSwitch {
                default,
                low,
                high,
                jumps,
            } => {
                let expected = i64::from(*high) - i64::from(*low) + 1;
                if expected < 1 || expected != jumps.len() as i64 {
                    return Err(malformed_error!(
                        "tableswitch range {}..={} does not match {} jumps",
                        low,
                        high,
                        jumps.len()
                    ));
                }
                out.push(Opcode::Tableswitch.value());
                out.resize(out.len() + switch_padding(offset), 0);
                out.extend_from_slice(&default.to_be_bytes());
                out.extend_from_slice(&low.to_be_bytes());
                out.extend_from_slice(&high.to_be_bytes());
                for jump in jumps {
                    out.extend_from_slice(&jump.to_be_bytes());
                }
            }
            Instruction::LookupSwitch { default, pairs } => {
                if pairs.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
                    return Err(malformed_error!("lookupswitch keys are not strictly sorted"));
                }
                out.push(Opcode::Lookupswitch.value());
                out.resize(out.len() + switch_padding(offset), 0);
                out.extend_from_slice(&default.to_be_bytes());
                out.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                for (key, jump) in pairs {
                    out.extend_from_slice(&key.to_be_bytes());
                    out.extend_from_slice(&jump.to_be_bytes());
                }
            }
        }

        Ok(())
    }
}

/// Serialize an instruction stream.
///
/// Every entry must sit at the offset produced by the lengths of its predecessors.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if an entry offset disagrees with the serialized
/// length of the entries before it, or any error of [`Instruction::write`].
pub fn encode_stream(entries: &[CodeEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        if out.len() != entry.offset as usize {
            return Err(malformed_error!(
                "instruction {} recorded at offset {} but serializes at {}",
                entry.instruction.opcode(),
                entry.offset,
                out.len()
            ));
        }
        entry.instruction.write(entry.offset, &mut out)?;
    }
    Ok(out)
}
