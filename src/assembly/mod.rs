//! JVM instruction set support.
//!
//! This module holds everything that deals with individual bytecode instructions:
//!
//! - [`crate::assembly::Opcode`] - The opcode table with mnemonics, stack effects and branch
//!   helpers
//! - [`crate::assembly::Instruction`] - The canonical instruction representation used in Code
//!   attributes
//! - [`crate::assembly::encoder`] - Serialized lengths and byte encoding
//! - [`crate::assembly::decoder`] - Decoding of Code attribute bytes
//!
//! # Examples
//!
//! ```rust
//! use classforge::assembly::{decode_stream, encode_stream};
//!
//! let code = [0x2a, 0xb7, 0x00, 0x01, 0xb1]; // aload_0; invokespecial #1; return
//! let entries = decode_stream(&code)?;
//! assert_eq!(encode_stream(&entries)?, code);
//! # Ok::<(), classforge::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
mod opcode;

pub use decoder::{decode_instruction, decode_stream};
pub use encoder::{encode_stream, switch_padding};
pub use instruction::Instruction;
pub use opcode::Opcode;
