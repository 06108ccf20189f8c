//! Instruction decoding.
//!
//! Turns the raw bytes of a Code attribute into [`crate::classfile::CodeEntry`] values. The
//! decoder produces canonical instructions: `xload_n` shortcuts, `wide` prefixes and `ldc_w`
//! all fold into their canonical opcode with explicit operands, so that the encoder alone
//! decides the byte form when the stream is written back.
//!
//! # Usage Examples
//!
//! ```rust
//! use classforge::{assembly::{decode_stream, Instruction, Opcode}};
//!
//! // iload_1; iconst_1; iadd; ireturn
//! let code = [0x1b, 0x04, 0x60, 0xac];
//! let entries = decode_stream(&code)?;
//!
//! assert_eq!(entries.len(), 4);
//! assert_eq!(entries[0].instruction, Instruction::variable(Opcode::Iload, 1));
//! assert_eq!(entries[3].offset, 3);
//! # Ok::<(), classforge::Error>(())
//! ```

use crate::{
    assembly::{Instruction, Opcode},
    classfile::CodeEntry,
    file::parser::Parser,
    Result,
};

/// Decode the instruction at the current position of `parser`.
///
/// The parser must span the complete code array, as switch padding is computed relative to
/// its start.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for unassigned opcodes and inconsistent switch
/// tables, and [`crate::Error::OutOfBounds`] for truncated operands.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let byte = parser.read_u8()?;
    let opcode = Opcode::from_u8(byte)
        .ok_or_else(|| malformed_error!("Invalid opcode 0x{:02x} at offset {}", byte, start))?;

    let instruction = match opcode.value() {
        // bipush, sipush, newarray
        0x10 => Instruction::simple_with(opcode, i32::from(parser.read_i8()?)),
        0x11 => Instruction::simple_with(opcode, i32::from(parser.read_i16()?)),
        0xbc => Instruction::simple_with(opcode, i32::from(parser.read_u8()?)),

        // ldc, ldc_w, ldc2_w
        0x12 => Instruction::constant_ref(opcode, u16::from(parser.read_u8()?)),
        0x13 | 0x14 => Instruction::constant_ref(opcode, parser.read_u16()?),

        // loads, stores and ret with an explicit slot
        0x15..=0x19 | 0x36..=0x3a | 0xa9 => {
            Instruction::variable(opcode, u16::from(parser.read_u8()?))
        }
        // xload_n and xstore_n
        0x1a..=0x2d | 0x3b..=0x4e => Instruction::variable(opcode, 0),

        0x84 => {
            let slot = u16::from(parser.read_u8()?);
            let increment = i32::from(parser.read_i8()?);
            Instruction::iinc(slot, increment)
        }

        0x99..=0xa8 | 0xc6 | 0xc7 => Instruction::branch(opcode, i32::from(parser.read_i16()?)),
        0xc8 | 0xc9 => Instruction::branch(opcode, parser.read_i32()?),

        0xaa => {
            parser.align(4)?;
            let default = parser.read_i32()?;
            let low = parser.read_i32()?;
            let high = parser.read_i32()?;
            let count = i64::from(high) - i64::from(low) + 1;
            if count < 1 || count as usize > parser.remaining() / 4 {
                return Err(malformed_error!(
                    "tableswitch at offset {} has invalid range {}..={}",
                    start,
                    low,
                    high
                ));
            }

            let mut jumps = Vec::with_capacity(count as usize);
            for _ in 0..count {
                jumps.push(parser.read_i32()?);
            }
            Instruction::TableSwitch {
                default,
                low,
                high,
                jumps,
            }
        }
        0xab => {
            parser.align(4)?;
            let default = parser.read_i32()?;
            let npairs = parser.read_i32()?;
            if npairs < 0 || npairs as usize > parser.remaining() / 8 {
                return Err(malformed_error!(
                    "lookupswitch at offset {} has invalid pair count {}",
                    start,
                    npairs
                ));
            }

            let mut pairs = Vec::with_capacity(npairs as usize);
            for _ in 0..npairs {
                let key = parser.read_i32()?;
                let jump = parser.read_i32()?;
                pairs.push((key, jump));
            }
            Instruction::LookupSwitch { default, pairs }
        }

        // field access, invocations, new, anewarray, checkcast, instanceof
        0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 => {
            Instruction::constant_ref(opcode, parser.read_u16()?)
        }
        0xb9 => {
            let index = parser.read_u16()?;
            let count = parser.read_u8()?;
            let _zero = parser.read_u8()?;
            Instruction::invokeinterface(index, count)
        }
        0xba => {
            let index = parser.read_u16()?;
            let _zero = parser.read_u16()?;
            Instruction::constant_ref(opcode, index)
        }
        0xc5 => {
            let index = parser.read_u16()?;
            let dimensions = parser.read_u8()?;
            Instruction::multianewarray(index, dimensions)
        }

        0xc4 => decode_wide(parser, start)?,

        _ => Instruction::simple(opcode),
    };

    Ok(instruction)
}

fn decode_wide(parser: &mut Parser, start: usize) -> Result<Instruction> {
    let byte = parser.read_u8()?;
    match Opcode::from_u8(byte) {
        Some(Opcode::Iinc) => {
            let slot = parser.read_u16()?;
            let increment = i32::from(parser.read_i16()?);
            Ok(Instruction::iinc(slot, increment))
        }
        Some(opcode) if matches!(byte, 0x15..=0x19 | 0x36..=0x3a | 0xa9) => {
            Ok(Instruction::variable(opcode, parser.read_u16()?))
        }
        _ => Err(malformed_error!(
            "wide prefix at offset {} modifies invalid opcode 0x{:02x}",
            start,
            byte
        )),
    }
}

/// Decode a complete code array into offset-tagged instructions.
///
/// # Errors
///
/// Returns any error of [`decode_instruction`].
pub fn decode_stream(code: &[u8]) -> Result<Vec<CodeEntry>> {
    let mut parser = Parser::new(code);
    let mut entries = Vec::with_capacity(code.len() / 2);

    while parser.has_more_data() {
        let offset = parser.pos() as u32;
        let instruction = decode_instruction(&mut parser)?;
        entries.push(CodeEntry::new(offset, instruction));
    }

    Ok(entries)
}
