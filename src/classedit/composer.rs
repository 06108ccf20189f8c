//! Composition of method bodies from code fragments.
//!
//! A [`CodeComposer`] builds a new instruction stream from one or more *fragments*. Each
//! fragment has its own "old" offset space: instructions copied from an existing method keep
//! the offsets they had there, and their branch and switch deltas keep pointing into that
//! space. Synthesized instructions are placed in the same space, after the copied ones or at
//! offsets the caller chooses. Closing a fragment resolves every target through the
//! fragment's old-offset translation table; laying out the finished stream then picks the
//! final encodings and offsets.
//!
//! # Protocol
//!
//! ```text
//! Idle --begin_fragment--> Composing --end_fragment (outermost)--> Composed --finish/commit--> Idle
//!                           |    ^                                   |
//!                           +----+ begin/end nested fragments        +--begin_fragment--> Composing
//! ```
//!
//! # Layout
//!
//! Layout is a bounded fix-point: offsets are computed with the current encodings, every
//! branch whose delta overflows its 16-bit operand is widened (`goto` to `goto_w`, `jsr` to
//! `jsr_w`, a conditional branch to the inverted condition jumping over a `goto_w`), and the
//! process repeats until no branch widens. Widening only grows the stream, so each branch
//! widens at most once and the loop runs at most `n + 1` times.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use classforge::{
//!     assembly::{Instruction, Opcode},
//!     classedit::CodeComposer,
//!     diagnostics::Diagnostics,
//!     EditorConfig,
//! };
//!
//! let mut composer = CodeComposer::new(EditorConfig::default(), Arc::new(Diagnostics::new()));
//!
//! composer.begin_fragment(3)?;
//! composer.append_instruction(0, Instruction::simple(Opcode::Iconst0))?;
//! composer.append_instruction(1, Instruction::branch(Opcode::Ifeq, 6))?;
//! composer.append_instruction(4, Instruction::branch(Opcode::Goto, 3))?;
//! composer.end_fragment()?;
//!
//! composer.begin_fragment(1)?;
//! composer.append_instruction(0, Instruction::simple(Opcode::Ireturn))?;
//! composer.end_fragment()?;
//!
//! let code = composer.finish()?;
//! assert_eq!(code.code_length(), 8);
//! assert_eq!(code.instructions[1].instruction, Instruction::branch(Opcode::Ifeq, 6));
//! # Ok::<(), classforge::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    assembly::{Instruction, Opcode},
    classedit::stack,
    classfile::{
        Attribute, Class, CodeAttribute, CodeEntry, ExceptionEntry, LineNumber, LocalVariable,
        MemberKind, ProcessingFlags,
    },
    diagnostics::{DiagnosticCategory, Diagnostics},
    EditorConfig, Error, Result,
};

/// The state of a [`CodeComposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ComposerPhase {
    /// Nothing appended
    Idle,
    /// At least one fragment is open
    Composing,
    /// All fragments are closed and the stream can be finished
    Composed,
}

#[derive(Debug)]
struct Item {
    instruction: Instruction,
    /// Targets in the old offset space of the item's fragment
    old_targets: Vec<i64>,
    /// Targets as item positions, once the fragment is closed
    targets: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingException {
    start: usize,
    end: usize,
    handler: usize,
    catch_type: u16,
}

#[derive(Debug, Clone, Copy)]
struct PendingLocal {
    start: usize,
    end: usize,
    variable: LocalVariable,
    typed: bool,
}

#[derive(Debug, Default)]
struct Fragment {
    first: usize,
    translation: HashMap<i64, usize>,
    end: i64,
    exceptions: Vec<ExceptionEntry>,
    line_numbers: Vec<LineNumber>,
    local_variables: Vec<(LocalVariable, bool)>,
}

/// Builds Code attributes from fragments of old and new instructions.
pub struct CodeComposer {
    config: EditorConfig,
    diagnostics: Arc<Diagnostics>,
    phase: ComposerPhase,
    items: Vec<Item>,
    fragments: Vec<Fragment>,
    exceptions: Vec<PendingException>,
    line_numbers: Vec<(usize, u16)>,
    local_variables: Vec<PendingLocal>,
}

impl CodeComposer {
    /// Create an idle composer reporting to `diagnostics`.
    #[must_use]
    pub fn new(config: EditorConfig, diagnostics: Arc<Diagnostics>) -> Self {
        CodeComposer {
            config,
            diagnostics,
            phase: ComposerPhase::Idle,
            items: Vec::new(),
            fragments: Vec::new(),
            exceptions: Vec::new(),
            line_numbers: Vec::new(),
            local_variables: Vec::new(),
        }
    }

    /// The current state.
    #[must_use]
    pub fn phase(&self) -> ComposerPhase {
        self.phase
    }

    /// Nesting depth of open fragments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.fragments.len()
    }

    /// Number of instructions appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no instruction has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discard everything appended and return to [`ComposerPhase::Idle`].
    pub fn reset(&mut self) {
        self.phase = ComposerPhase::Idle;
        self.items.clear();
        self.fragments.clear();
        self.exceptions.clear();
        self.line_numbers.clear();
        self.local_variables.clear();
    }

    fn fragment(&mut self) -> Result<&mut Fragment> {
        self.fragments
            .last_mut()
            .ok_or_else(|| Error::ComposerState("no fragment is open".to_string()))
    }

    /// Open a fragment with its own old offset space. Fragments nest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if the nesting depth exceeds
    /// [`crate::EditorConfig::max_fragment_depth`].
    pub fn begin_fragment(&mut self, estimated_length: usize) -> Result<()> {
        if self.fragments.len() >= self.config.max_fragment_depth {
            return Err(Error::ComposerState(format!(
                "fragments nest deeper than {}",
                self.config.max_fragment_depth
            )));
        }

        self.items.reserve(estimated_length);
        self.fragments.push(Fragment {
            first: self.items.len(),
            translation: HashMap::with_capacity(estimated_length + 1),
            ..Fragment::default()
        });
        self.phase = ComposerPhase::Composing;
        Ok(())
    }

    /// Append `instruction`, which was located at `old_offset` in the fragment's offset
    /// space. Branch and switch deltas are relative to `old_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_instruction(&mut self, old_offset: u32, instruction: Instruction) -> Result<()> {
        let position = self.items.len();
        let old_end = i64::from(old_offset) + instruction.length(old_offset) as i64;
        let instruction = match instruction {
            Instruction::Branch { opcode, delta } => Instruction::Branch {
                opcode: self.config.initial_branch(opcode),
                delta,
            },
            other => other,
        };

        let fragment = self.fragment()?;
        fragment
            .translation
            .entry(i64::from(old_offset))
            .or_insert(position);
        fragment.end = fragment.end.max(old_end);

        let old_targets = instruction
            .deltas()
            .into_iter()
            .map(|delta| i64::from(old_offset) + i64::from(delta))
            .collect();
        self.items.push(Item {
            instruction,
            old_targets,
            targets: Vec::new(),
        });
        Ok(())
    }

    /// Append an instruction directly after everything appended to the fragment so far.
    /// Its branch deltas are relative to that position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_synthetic(&mut self, instruction: Instruction) -> Result<()> {
        let end = self.fragment()?.end;
        let old_offset = u32::try_from(end)
            .map_err(|_| Error::ComposerState(format!("fragment offset {end} is out of range")))?;
        self.append_instruction(old_offset, instruction)
    }

    /// Map `old_offset` to the position of the next appended instruction.
    ///
    /// An offset that is already mapped keeps its first mapping.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_label(&mut self, old_offset: u32) -> Result<()> {
        let position = self.items.len();
        let fragment = self.fragment()?;
        fragment
            .translation
            .entry(i64::from(old_offset))
            .or_insert(position);
        fragment.end = fragment.end.max(i64::from(old_offset));
        Ok(())
    }

    /// Add an exception table entry in the fragment's old offsets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_exception(&mut self, entry: ExceptionEntry) -> Result<()> {
        self.fragment()?.exceptions.push(entry);
        Ok(())
    }

    /// Add a line number entry starting at `old_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_line_number(&mut self, old_offset: u32, line: u16) -> Result<()> {
        self.fragment()?.line_numbers.push(LineNumber {
            start: old_offset,
            line,
        });
        Ok(())
    }

    /// Add a `LocalVariableTable` entry in the fragment's old offsets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_local_variable(&mut self, variable: LocalVariable) -> Result<()> {
        self.fragment()?.local_variables.push((variable, false));
        Ok(())
    }

    /// Add a `LocalVariableTypeTable` entry in the fragment's old offsets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_local_variable_type(&mut self, variable: LocalVariable) -> Result<()> {
        self.fragment()?.local_variables.push((variable, true));
        Ok(())
    }

    /// Append the whole content of `code` to the open fragment, using its offsets as the
    /// old offsets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open.
    pub fn append_code(&mut self, code: &CodeAttribute) -> Result<()> {
        self.append_code_with(code, |_| Ok(()))
    }

    /// Like [`CodeComposer::append_code`], passing every instruction through `rewrite`
    /// before it is appended.
    ///
    /// The old end offset is taken from `code` before rewriting, so rewrites that change
    /// instruction lengths (for example a larger `ldc` index) keep targets at the end of
    /// the code resolvable. `StackMapTable` and unknown nested attributes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if no fragment is open and any error
    /// returned by `rewrite`.
    pub fn append_code_with<F>(&mut self, code: &CodeAttribute, mut rewrite: F) -> Result<()>
    where
        F: FnMut(&mut Instruction) -> Result<()>,
    {
        let code_length = code.code_length();

        for entry in &code.instructions {
            let mut instruction = entry.instruction.clone();
            rewrite(&mut instruction)?;
            self.append_instruction(entry.offset, instruction)?;
        }
        self.append_label(code_length)?;

        for handler in &code.exception_table {
            self.append_exception(*handler)?;
        }

        for attribute in &code.attributes {
            match attribute {
                Attribute::LineNumberTable(lines) => {
                    for line in lines {
                        self.append_line_number(line.start, line.line)?;
                    }
                }
                Attribute::LocalVariableTable(variables) => {
                    for variable in variables {
                        self.append_local_variable(*variable)?;
                    }
                }
                Attribute::LocalVariableTypeTable(variables) => {
                    for variable in variables {
                        self.append_local_variable_type(*variable)?;
                    }
                }
                other => self.diagnostics.info(
                    DiagnosticCategory::Code,
                    format!(
                        "Dropped {} attribute of copied code; it cannot be kept offset-consistent",
                        other.name().unwrap_or("unknown")
                    ),
                ),
            }
        }
        Ok(())
    }

    /// Close the innermost fragment, resolving the targets of its instructions and
    /// translating its side tables.
    ///
    /// The fragment's old end offset (the highest end of an appended instruction or label)
    /// maps to the position after the fragment. Exception entries that cannot be translated,
    /// or whose translated range is empty, are dropped with a warning; line numbers and local
    /// variables that cannot be translated are dropped with an info diagnostic.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTarget`] if a branch or switch target has no mapping
    /// and [`crate::Error::ComposerState`] if no fragment is open.
    pub fn end_fragment(&mut self) -> Result<()> {
        let mut fragment = self
            .fragments
            .pop()
            .ok_or_else(|| Error::ComposerState("no fragment is open".to_string()))?;
        let next = self.items.len();
        fragment.translation.entry(fragment.end).or_insert(next);
        let translate = |offset: i64| fragment.translation.get(&offset).copied();

        for item in &mut self.items[fragment.first..] {
            // Items of nested fragments are already resolved.
            if !item.targets.is_empty() || item.old_targets.is_empty() {
                continue;
            }
            item.targets = item
                .old_targets
                .iter()
                .map(|&old| translate(old).ok_or(Error::InvalidTarget { offset: old }))
                .collect::<Result<_>>()?;
        }

        for entry in &fragment.exceptions {
            let translated = (
                translate(i64::from(entry.start)),
                translate(i64::from(entry.end)),
                translate(i64::from(entry.handler)),
            );
            match translated {
                (Some(start), Some(end), Some(handler)) if start < end => {
                    self.exceptions.push(PendingException {
                        start,
                        end,
                        handler,
                        catch_type: entry.catch_type,
                    });
                }
                (Some(_), Some(_), Some(_)) => self.diagnostics.warning(
                    DiagnosticCategory::ExceptionTable,
                    format!(
                        "Dropped exception handler {}..{} -> {}: the copied range is empty",
                        entry.start, entry.end, entry.handler
                    ),
                ),
                _ => self.diagnostics.warning(
                    DiagnosticCategory::ExceptionTable,
                    format!(
                        "Dropped exception handler {}..{} -> {}: it covers code outside the fragment",
                        entry.start, entry.end, entry.handler
                    ),
                ),
            }
        }

        for line in &fragment.line_numbers {
            match translate(i64::from(line.start)) {
                Some(position) => self.line_numbers.push((position, line.line)),
                None => self.diagnostics.info(
                    DiagnosticCategory::Code,
                    format!("Dropped line {} at untranslatable offset {}", line.line, line.start),
                ),
            }
        }

        for (variable, typed) in &fragment.local_variables {
            let end = i64::from(variable.start) + i64::from(variable.length);
            match (translate(i64::from(variable.start)), translate(end)) {
                (Some(start), Some(end)) if start <= end => self.local_variables.push(PendingLocal {
                    start,
                    end,
                    variable: *variable,
                    typed: *typed,
                }),
                _ => self.diagnostics.info(
                    DiagnosticCategory::Code,
                    format!(
                        "Dropped local variable in slot {} with untranslatable scope {}..{}",
                        variable.slot, variable.start, end
                    ),
                ),
            }
        }

        if self.fragments.is_empty() {
            self.phase = ComposerPhase::Composed;
        }
        Ok(())
    }

    /// Lay out the composed stream and return it as a Code attribute with `max_stack` and
    /// `max_locals` left at 0. The composer returns to [`ComposerPhase::Idle`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] unless all fragments are closed,
    /// [`crate::Error::InvalidTarget`] if a branch targets the end of the code,
    /// [`crate::Error::UnencodableOffset`] if an operand does not fit even its wide
    /// encoding and [`crate::Error::CodeTooLarge`] if the stream exceeds
    /// [`crate::EditorConfig::max_code_length`].
    pub fn finish(&mut self) -> Result<CodeAttribute> {
        if self.phase != ComposerPhase::Composed {
            return Err(Error::ComposerState(format!(
                "cannot finish while {}",
                self.phase
            )));
        }

        let result = self.layout();
        self.reset();
        result
    }

    /// Finish the composition and install it as the body of method `method_index` of
    /// `class`, with `max_stack` and `max_locals` recomputed. The method is marked
    /// [`ProcessingFlags::MODIFIED`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ComposerState`] if `method_index` does not name a method and
    /// any error of [`CodeComposer::finish`] or of the stack computation.
    pub fn commit(&mut self, class: &mut Class, method_index: usize) -> Result<()> {
        let (descriptor, is_static) = match class.members.get(method_index) {
            Some(member) if member.kind == MemberKind::Method => (
                member.descriptor(&class.constant_pool)?.to_string(),
                member.is_static(),
            ),
            _ => {
                return Err(Error::ComposerState(format!(
                    "member {method_index} is not a method"
                )))
            }
        };

        let mut code = self.finish()?;
        code.max_stack = stack::max_stack(&code, &class.constant_pool)?;
        code.max_locals = stack::max_locals(&code, &descriptor, is_static)?;

        let method = &mut class.members[method_index];
        method.set_code(code);
        method.processing_flags |= ProcessingFlags::MODIFIED;
        Ok(())
    }

    fn layout(&self) -> Result<CodeAttribute> {
        let count = self.items.len();

        for item in &self.items {
            if !item.instruction.has_targets() {
                continue;
            }
            if let Some(position) = item.targets.iter().position(|target| *target >= count) {
                return Err(Error::InvalidTarget {
                    offset: item.old_targets[position],
                });
            }
        }

        let mut instructions: Vec<Instruction> = self
            .items
            .iter()
            .map(|item| item.instruction.clone())
            .collect();
        let mut expanded = vec![false; count];
        let mut offsets = vec![0u32; count + 1];

        let mut converged = false;
        for _ in 0..=count {
            let mut offset = 0u64;
            for position in 0..count {
                offsets[position] = u32::try_from(offset).map_err(|_| Error::CodeTooLarge {
                    length: offset as usize,
                    limit: self.config.max_code_length,
                })?;
                offset += if expanded[position] {
                    8
                } else {
                    instructions[position].length(offsets[position]) as u64
                };
            }
            offsets[count] = u32::try_from(offset).map_err(|_| Error::CodeTooLarge {
                length: offset as usize,
                limit: self.config.max_code_length,
            })?;

            let mut widened = false;
            for position in 0..count {
                let Instruction::Branch { opcode, .. } = instructions[position] else {
                    continue;
                };
                if opcode.is_wide_branch() || expanded[position] {
                    continue;
                }

                let target = self.items[position].targets[0];
                let delta = i64::from(offsets[target]) - i64::from(offsets[position]);
                if i16::try_from(delta).is_ok() {
                    continue;
                }

                if opcode.is_conditional_branch() {
                    expanded[position] = true;
                } else {
                    instructions[position] = Instruction::branch(opcode.widened(), 0);
                }
                widened = true;
            }

            if !widened {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(Error::ComposerState(
                "branch widening did not settle".to_string(),
            ));
        }

        let length = offsets[count] as usize;
        if length > self.config.max_code_length {
            return Err(Error::CodeTooLarge {
                length,
                limit: self.config.max_code_length,
            });
        }

        let mut entries = Vec::with_capacity(count);
        for (position, mut instruction) in instructions.into_iter().enumerate() {
            let offset = offsets[position];
            let targets = &self.items[position].targets;

            if expanded[position] {
                let Instruction::Branch { opcode, .. } = instruction else {
                    return Err(Error::ComposerState(
                        "only branches can be expanded".to_string(),
                    ));
                };
                let inverted = opcode.inverted().ok_or_else(|| {
                    malformed_error!("{} has no inverted condition", opcode)
                })?;
                let goto_offset = offset + 3;
                let delta = i64::from(offsets[targets[0]]) - i64::from(goto_offset);
                entries.push(CodeEntry::new(offset, Instruction::branch(inverted, 8)));
                entries.push(CodeEntry::new(
                    goto_offset,
                    Instruction::branch(Opcode::GotoW, encode_delta(goto_offset, delta)?),
                ));
                continue;
            }

            if !targets.is_empty() {
                let deltas = targets
                    .iter()
                    .map(|target| {
                        encode_delta(offset, i64::from(offsets[*target]) - i64::from(offset))
                    })
                    .collect::<Result<Vec<_>>>()?;
                instruction.set_deltas(&deltas);

                if let Instruction::Branch { opcode, delta } = &instruction {
                    if !opcode.is_wide_branch() && i16::try_from(*delta).is_err() {
                        return Err(Error::UnencodableOffset {
                            offset,
                            delta: i64::from(*delta),
                        });
                    }
                }
            }
            entries.push(CodeEntry::new(offset, instruction));
        }

        let mut code = CodeAttribute {
            max_stack: 0,
            max_locals: 0,
            instructions: entries,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };

        for pending in &self.exceptions {
            if pending.handler >= count {
                self.diagnostics.warning(
                    DiagnosticCategory::ExceptionTable,
                    "Dropped exception handler located past the end of the code",
                );
                continue;
            }
            code.exception_table.push(ExceptionEntry::new(
                offsets[pending.start],
                offsets[pending.end],
                offsets[pending.handler],
                pending.catch_type,
            ));
        }

        let lines: Vec<LineNumber> = self
            .line_numbers
            .iter()
            .filter(|(position, _)| *position < count)
            .map(|(position, line)| LineNumber {
                start: offsets[*position],
                line: *line,
            })
            .collect();
        if !lines.is_empty() {
            code.attributes.push(Attribute::LineNumberTable(lines));
        }

        let mut variables = Vec::new();
        let mut variable_types = Vec::new();
        for pending in &self.local_variables {
            if pending.start >= count {
                continue;
            }
            let variable = LocalVariable {
                start: offsets[pending.start],
                length: offsets[pending.end] - offsets[pending.start],
                ..pending.variable
            };
            if pending.typed {
                variable_types.push(variable);
            } else {
                variables.push(variable);
            }
        }
        if !variables.is_empty() {
            code.attributes.push(Attribute::LocalVariableTable(variables));
        }
        if !variable_types.is_empty() {
            code.attributes
                .push(Attribute::LocalVariableTypeTable(variable_types));
        }

        Ok(code)
    }
}

fn encode_delta(offset: u32, delta: i64) -> Result<i32> {
    i32::try_from(delta).map_err(|_| Error::UnencodableOffset { offset, delta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::ConstantKind, diagnostics::DiagnosticSeverity, test::ClassBuilder,
    };

    fn composer() -> (CodeComposer, Arc<Diagnostics>) {
        let diagnostics = Arc::new(Diagnostics::new());
        (
            CodeComposer::new(EditorConfig::default(), Arc::clone(&diagnostics)),
            diagnostics,
        )
    }

    fn target(code: &CodeAttribute, position: usize) -> i64 {
        let entry = &code.instructions[position];
        i64::from(entry.offset) + i64::from(entry.instruction.deltas()[0])
    }

    #[test]
    fn test_forward_branch_into_next_fragment() {
        let (mut composer, _) = composer();

        composer.begin_fragment(3).unwrap();
        composer
            .append_instruction(0, Instruction::simple(Opcode::Iconst0))
            .unwrap();
        composer
            .append_instruction(1, Instruction::branch(Opcode::Ifeq, 6))
            .unwrap();
        composer
            .append_instruction(4, Instruction::branch(Opcode::Goto, 3))
            .unwrap();
        composer.end_fragment().unwrap();
        assert_eq!(composer.phase(), ComposerPhase::Composed);

        composer.begin_fragment(1).unwrap();
        composer
            .append_instruction(0, Instruction::simple(Opcode::Ireturn))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(composer.phase(), ComposerPhase::Idle);

        let offsets: Vec<u32> = code.instructions.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, [0, 1, 4, 7]);
        assert_eq!(target(&code, 1), 7);
        assert_eq!(target(&code, 2), 7);
        assert_eq!(code.code_length(), 1 + 3 + 3 + 1);
        assert_eq!(code.code_bytes().unwrap().len(), 8);
    }

    #[test]
    fn test_inserted_instruction_shifts_targets() {
        let (mut composer, _) = composer();

        // Copy `iload_1; ifne -> 5; iconst_0; ireturn` while inserting a nop before the
        // branch target.
        composer.begin_fragment(4).unwrap();
        composer
            .append_instruction(0, Instruction::variable(Opcode::Iload, 1))
            .unwrap();
        composer
            .append_instruction(1, Instruction::branch(Opcode::Ifne, 4))
            .unwrap();
        composer
            .append_instruction(4, Instruction::simple(Opcode::Iconst0))
            .unwrap();
        composer.append_label(5).unwrap();
        composer.append_synthetic(Instruction::simple(Opcode::Nop)).unwrap();
        composer
            .append_instruction(5, Instruction::simple(Opcode::Ireturn))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        // The label maps old offset 5 to the inserted nop.
        assert_eq!(target(&code, 1), 5);
        assert_eq!(code.instructions[3].instruction.opcode(), Opcode::Nop);
        assert_eq!(code.instructions[4].offset, 6);
    }

    #[test]
    fn test_unmapped_target_is_invalid() {
        let (mut composer, _) = composer();

        composer.begin_fragment(1).unwrap();
        composer
            .append_instruction(0, Instruction::branch(Opcode::Goto, 2))
            .unwrap();
        assert!(matches!(
            composer.end_fragment(),
            Err(Error::InvalidTarget { offset: 2 })
        ));
    }

    #[test]
    fn test_target_past_end_is_invalid() {
        let (mut composer, _) = composer();

        composer.begin_fragment(1).unwrap();
        composer
            .append_instruction(0, Instruction::branch(Opcode::Goto, 3))
            .unwrap();
        composer.end_fragment().unwrap();
        assert!(matches!(
            composer.finish(),
            Err(Error::InvalidTarget { offset: 3 })
        ));
    }

    #[test]
    fn test_state_errors() {
        let (mut composer, _) = composer();

        assert!(matches!(
            composer.append_instruction(0, Instruction::simple(Opcode::Nop)),
            Err(Error::ComposerState(_))
        ));
        assert!(matches!(composer.end_fragment(), Err(Error::ComposerState(_))));
        assert!(matches!(composer.finish(), Err(Error::ComposerState(_))));

        composer.begin_fragment(0).unwrap();
        assert!(matches!(composer.finish(), Err(Error::ComposerState(_))));
    }

    #[test]
    fn test_fragment_depth_limit() {
        let diagnostics = Arc::new(Diagnostics::new());
        let config = EditorConfig {
            max_fragment_depth: 2,
            ..EditorConfig::default()
        };
        let mut composer = CodeComposer::new(config, diagnostics);

        composer.begin_fragment(0).unwrap();
        composer.begin_fragment(0).unwrap();
        assert_eq!(composer.depth(), 2);
        assert!(composer.begin_fragment(0).is_err());
    }

    #[test]
    fn test_nested_fragments_keep_separate_offset_spaces() {
        let (mut composer, _) = composer();

        composer.begin_fragment(3).unwrap();
        composer
            .append_instruction(0, Instruction::branch(Opcode::Goto, 4))
            .unwrap();
        composer.append_label(3).unwrap();

        // Inlined body with its own offsets: a self-contained loop back to 0.
        composer.begin_fragment(2).unwrap();
        composer
            .append_instruction(0, Instruction::simple(Opcode::Nop))
            .unwrap();
        composer
            .append_instruction(1, Instruction::branch(Opcode::Goto, -1))
            .unwrap();
        composer.end_fragment().unwrap();
        assert_eq!(composer.phase(), ComposerPhase::Composing);

        composer
            .append_instruction(3, Instruction::simple(Opcode::Return))
            .unwrap();
        composer
            .append_instruction(4, Instruction::simple(Opcode::Return))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        // goto(0) nop(3) goto(4) return(7) return(8)
        assert_eq!(target(&code, 0), 8);
        assert_eq!(target(&code, 2), 3);
    }

    #[test]
    fn test_exception_translation_and_reporting() {
        let (mut composer, diagnostics) = composer();

        composer.begin_fragment(4).unwrap();
        composer
            .append_instruction(10, Instruction::simple(Opcode::Iconst1))
            .unwrap();
        composer
            .append_instruction(11, Instruction::simple(Opcode::Ireturn))
            .unwrap();
        composer
            .append_instruction(12, Instruction::variable(Opcode::Astore, 1))
            .unwrap();
        composer
            .append_instruction(13, Instruction::simple(Opcode::Iconst0))
            .unwrap();
        composer
            .append_instruction(14, Instruction::simple(Opcode::Ireturn))
            .unwrap();
        composer
            .append_exception(ExceptionEntry::new(10, 12, 12, 7))
            .unwrap();
        // Starts before the copied code.
        composer
            .append_exception(ExceptionEntry::new(2, 12, 12, 0))
            .unwrap();
        // Empty range.
        composer
            .append_exception(ExceptionEntry::new(11, 11, 12, 0))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(code.exception_table, [ExceptionEntry::new(0, 2, 2, 7)]);
        assert_eq!(
            diagnostics.by_category(DiagnosticCategory::ExceptionTable).len(),
            2
        );
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Warning), 2);
    }

    #[test]
    fn test_goto_widens_and_shrinks() {
        let (mut composer, _) = composer();

        composer.begin_fragment(40_002).unwrap();
        composer
            .append_instruction(0, Instruction::branch(Opcode::GotoW, 40_005))
            .unwrap();
        composer
            .append_instruction(5, Instruction::branch(Opcode::GotoW, 5))
            .unwrap();
        for offset in 10..40_005 {
            composer
                .append_instruction(offset, Instruction::simple(Opcode::Nop))
                .unwrap();
        }
        composer
            .append_instruction(40_005, Instruction::simple(Opcode::Return))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(code.instructions[0].instruction.opcode(), Opcode::GotoW);
        assert_eq!(code.instructions[1].instruction.opcode(), Opcode::Goto);
        assert_eq!(code.instructions[1].offset, 5);
        assert_eq!(target(&code, 0), i64::from(code.code_length() - 1));
        assert_eq!(target(&code, 1), 8);
    }

    #[test]
    fn test_strict_config_keeps_wide_branches() {
        let mut composer = CodeComposer::new(EditorConfig::strict(), Arc::new(Diagnostics::new()));

        composer.begin_fragment(2).unwrap();
        composer
            .append_instruction(0, Instruction::branch(Opcode::GotoW, 5))
            .unwrap();
        composer
            .append_instruction(5, Instruction::simple(Opcode::Return))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(code.instructions[0].instruction.opcode(), Opcode::GotoW);
        assert_eq!(code.code_length(), 6);
    }

    #[test]
    fn test_conditional_branch_is_expanded() {
        let (mut composer, _) = composer();

        composer.begin_fragment(40_003).unwrap();
        composer
            .append_instruction(0, Instruction::variable(Opcode::Iload, 0))
            .unwrap();
        composer
            .append_instruction(1, Instruction::branch(Opcode::Ifeq, 40_002))
            .unwrap();
        for offset in 4..40_003 {
            composer
                .append_instruction(offset, Instruction::simple(Opcode::Nop))
                .unwrap();
        }
        composer
            .append_instruction(40_003, Instruction::simple(Opcode::Return))
            .unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(
            code.instructions[1].instruction,
            Instruction::branch(Opcode::Ifne, 8)
        );
        assert_eq!(code.instructions[2].instruction.opcode(), Opcode::GotoW);
        assert_eq!(code.instructions[2].offset, 4);
        assert_eq!(code.instructions[3].offset, 9);
        assert_eq!(target(&code, 2), i64::from(code.code_length() - 1));
        assert_eq!(code.code_length() as usize, code.code_bytes().unwrap().len());
    }

    #[test]
    fn test_code_too_large() {
        let config = EditorConfig {
            max_code_length: 4,
            ..EditorConfig::default()
        };
        let mut composer = CodeComposer::new(config, Arc::new(Diagnostics::new()));

        composer.begin_fragment(5).unwrap();
        for _ in 0..5 {
            composer.append_synthetic(Instruction::simple(Opcode::Nop)).unwrap();
        }
        composer.end_fragment().unwrap();

        assert!(matches!(
            composer.finish(),
            Err(Error::CodeTooLarge {
                length: 5,
                limit: 4
            })
        ));
    }

    #[test]
    fn test_switch_targets_follow_padding() {
        let (mut composer, _) = composer();

        // Source: tableswitch at 0 (padding 3), default -> 24, 0 -> 24, 1 -> 25
        let switch = Instruction::TableSwitch {
            default: 24,
            low: 0,
            high: 1,
            jumps: vec![24, 25],
        };
        assert_eq!(switch.length(0), 24);

        composer.begin_fragment(4).unwrap();
        composer.append_synthetic(Instruction::simple(Opcode::Iconst0)).unwrap();
        composer.begin_fragment(3).unwrap();
        composer.append_instruction(0, switch).unwrap();
        composer
            .append_instruction(24, Instruction::simple(Opcode::Return))
            .unwrap();
        composer
            .append_instruction(25, Instruction::simple(Opcode::Return))
            .unwrap();
        composer.end_fragment().unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        // At offset 1 the switch needs 2 padding bytes and is one byte shorter.
        assert_eq!(code.instructions[1].offset, 1);
        assert_eq!(code.instructions[2].offset, 24);
        assert_eq!(
            code.instructions[1].instruction.deltas(),
            vec![23, 23, 24]
        );
    }

    #[test]
    fn test_side_tables_are_translated() {
        let (mut composer, diagnostics) = composer();
        let source = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            attributes: vec![
                Attribute::LineNumberTable(vec![
                    LineNumber { start: 0, line: 10 },
                    LineNumber { start: 2, line: 11 },
                ]),
                Attribute::LocalVariableTable(vec![LocalVariable {
                    start: 0,
                    length: 3,
                    name_index: 5,
                    descriptor_index: 6,
                    slot: 0,
                }]),
                Attribute::StackMapTable(vec![0]),
            ],
            ..CodeAttribute::new(
                0,
                0,
                vec![
                    Instruction::variable(Opcode::Aload, 0),
                    Instruction::simple(Opcode::Pop),
                    Instruction::simple(Opcode::Return),
                ],
            )
        };

        composer.begin_fragment(3).unwrap();
        composer.append_synthetic(Instruction::simple(Opcode::Nop)).unwrap();
        composer.begin_fragment(3).unwrap();
        composer.append_code(&source).unwrap();
        composer.end_fragment().unwrap();
        composer.end_fragment().unwrap();

        let code = composer.finish().unwrap();
        assert_eq!(
            code.line_numbers().unwrap(),
            [
                LineNumber { start: 1, line: 10 },
                LineNumber { start: 3, line: 11 }
            ]
        );
        assert!(code.attributes.iter().any(|attribute| matches!(
            attribute,
            Attribute::LocalVariableTable(variables)
                if variables[0].start == 1 && variables[0].length == 3
        )));
        assert!(!code
            .attributes
            .iter()
            .any(|attribute| matches!(attribute, Attribute::StackMapTable(_))));
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Info), 1);
    }

    #[test]
    fn test_commit_recomputes_limits() {
        let mut builder = ClassBuilder::new("demo/Counter");
        let count = builder.field_ref("demo/Counter", "count", "J");
        let mut class = builder
            .field("count", "J")
            .abstract_method("bump", "(J)V")
            .build();
        assert_eq!(class.constant_pool.kind(count), Some(ConstantKind::Fieldref));

        let (mut composer, _) = composer();
        composer.begin_fragment(6).unwrap();
        for instruction in [
            Instruction::variable(Opcode::Aload, 0),
            Instruction::variable(Opcode::Aload, 0),
            Instruction::constant_ref(Opcode::Getfield, count),
            Instruction::variable(Opcode::Lload, 1),
            Instruction::simple(Opcode::Ladd),
            Instruction::constant_ref(Opcode::Putfield, count),
            Instruction::simple(Opcode::Return),
        ] {
            composer.append_synthetic(instruction).unwrap();
        }
        composer.end_fragment().unwrap();
        composer.commit(&mut class, 1).unwrap();

        let method = &class.members[1];
        let code = method.code().unwrap();
        assert_eq!(code.max_stack, 5);
        assert_eq!(code.max_locals, 3);
        assert!(method.processing_flags.contains(ProcessingFlags::MODIFIED));
    }
}
