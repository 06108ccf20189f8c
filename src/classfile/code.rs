//! The Code attribute.
//!
//! Instructions are stored in order together with their byte offsets. Offsets are a cached
//! property of the stream: after any edit through [`crate::classedit::CodeComposer`] they
//! equal the running sum of the serialized instruction lengths, which is what the encoder
//! checks before writing.

use crate::{
    assembly::{decode_stream, encode_stream, Instruction},
    classfile::{attribute::IndexSite, Attribute, ConstantKind},
    Result,
};

/// An instruction placed at a byte offset of its Code attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    /// Byte offset from the start of the code array
    pub offset: u32,
    /// The instruction
    pub instruction: Instruction,
}

impl CodeEntry {
    /// Place `instruction` at `offset`.
    #[must_use]
    pub fn new(offset: u32, instruction: Instruction) -> Self {
        CodeEntry {
            offset,
            instruction,
        }
    }

    /// Offset of the first byte after this instruction.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.offset + self.instruction.length(self.offset) as u32
    }
}

/// An entry of the exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionEntry {
    /// First offset covered by the handler
    pub start: u32,
    /// First offset no longer covered
    pub end: u32,
    /// Offset of the handler code
    pub handler: u32,
    /// `Class` constant of the caught type, 0 to catch everything
    pub catch_type: u16,
}

impl ExceptionEntry {
    /// Create an exception table entry.
    #[must_use]
    pub fn new(start: u32, end: u32, handler: u32, catch_type: u16) -> Self {
        ExceptionEntry {
            start,
            end,
            handler,
            catch_type,
        }
    }

    /// Returns true for `finally`-style entries catching every throwable.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.catch_type == 0
    }
}

/// A method body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeAttribute {
    /// Maximum operand stack depth in slots
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Instructions in offset order
    pub instructions: Vec<CodeEntry>,
    /// Exception handlers in priority order
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Create a Code attribute from instructions, assigning their offsets.
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, instructions: Vec<Instruction>) -> Self {
        let mut offset = 0u32;
        let entries = instructions
            .into_iter()
            .map(|instruction| {
                let entry = CodeEntry::new(offset, instruction);
                offset = entry.end();
                entry
            })
            .collect();

        CodeAttribute {
            max_stack,
            max_locals,
            instructions: entries,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Create a Code attribute by decoding a code array.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] if the bytes do
    /// not decode into a sequence of instructions.
    pub fn from_bytes(max_stack: u16, max_locals: u16, code: &[u8]) -> Result<Self> {
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            instructions: decode_stream(code)?,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Serialized length of the code array.
    #[must_use]
    pub fn code_length(&self) -> u32 {
        self.instructions.last().map_or(0, CodeEntry::end)
    }

    /// Encode the instruction stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the stored offsets are stale and any encoding
    /// error of [`crate::assembly::Instruction::write`].
    pub fn code_bytes(&self) -> Result<Vec<u8>> {
        encode_stream(&self.instructions)
    }

    /// Position in [`CodeAttribute::instructions`] of the instruction starting at `offset`.
    #[must_use]
    pub fn position(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |entry| entry.offset)
            .ok()
    }

    /// Returns true if `offset` starts an instruction or equals the code length.
    #[must_use]
    pub fn is_boundary(&self, offset: u32) -> bool {
        offset == self.code_length() || self.position(offset).is_some()
    }

    /// The nested `LineNumberTable`, if present.
    #[must_use]
    pub fn line_numbers(&self) -> Option<&[crate::classfile::LineNumber]> {
        self.attributes.iter().find_map(|attribute| match attribute {
            Attribute::LineNumberTable(lines) => Some(lines.as_slice()),
            _ => None,
        })
    }

    /// Every pool index stored in the instructions, the exception table and the nested
    /// attributes.
    pub fn index_sites(&mut self) -> Vec<IndexSite<'_>> {
        let mut sites = Vec::new();
        for entry in &mut self.instructions {
            let kinds = entry.instruction.constant_kinds();
            if let Instruction::ConstantRef { index, .. } = &mut entry.instruction {
                sites.push(IndexSite::required(index, kinds));
            }
        }
        for handler in &mut self.exception_table {
            sites.push(IndexSite::optional(
                &mut handler.catch_type,
                &[ConstantKind::Class],
            ));
        }
        for attribute in &mut self.attributes {
            sites.extend(attribute.index_sites());
        }
        sites
    }
}
