//! Structural validation of edited classes.
//!
//! Editing operations keep a class consistent as long as their inputs are. The
//! [`ClassValidator`] checks that claim after the fact, typically at the end of a pass or in
//! tests. It verifies:
//!
//! 1. **Pool references** - every index held by a constant or by the class model names a
//!    constant of an accepted kind
//! 2. **Deduplication** - no constant is stored twice in a pool
//! 3. **Branch targets** - every branch and switch target starts an instruction
//! 4. **Exception ranges** - handler ranges are non-empty and lie on instruction boundaries
//! 5. **Layout** - cached instruction offsets are contiguous and agree with the encoded
//!    code length
//!
//! Duplicates are reported as warnings. All other violations are reported as errors in the
//! [`DiagnosticCategory::Validation`] category and make [`ClassValidator::validate`] fail.

use std::sync::Arc;

use crate::{
    classfile::{Class, CodeAttribute, ConstantKind, ConstantPool},
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    Result,
};

/// Checks the structural invariants of a [`Class`].
pub struct ClassValidator {
    diagnostics: Arc<Diagnostics>,
}

impl ClassValidator {
    /// Creates a validator that reports to `diagnostics`.
    #[must_use]
    pub fn new(diagnostics: Arc<Diagnostics>) -> Self {
        ClassValidator { diagnostics }
    }

    /// Validates `class`, reporting every violation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] naming the number of violations if any check
    /// failed. Duplicate constants alone do not fail validation.
    pub fn validate(&self, class: &Class) -> Result<()> {
        let name = class
            .name()
            .map_or_else(|_| "<unnamed>".to_string(), str::to_string);

        let mut violations = self.validate_pool(&name, &class.constant_pool);
        violations += self.validate_index_uses(&name, class);
        for member in &class.members {
            if let Some(code) = member.code() {
                violations += self.validate_code(&name, code);
            }
        }

        if violations > 0 {
            return Err(malformed_error!(
                "{} invariant violations in {}",
                violations,
                name
            ));
        }
        Ok(())
    }

    fn report(&self, class: &str, message: String) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::Error,
            DiagnosticCategory::Validation,
            message,
        )
        .with_class(class)
    }

    fn validate_pool(&self, class: &str, pool: &ConstantPool) -> usize {
        let mut violations = 0;
        for (index, entry) in pool.iter() {
            let constant = entry.constant();
            for (child, kinds) in constant.children() {
                if let Some(message) = check_reference(pool, child, kinds) {
                    self.diagnostics.push(
                        self.report(class, format!("{} at {index}: {message}", constant.kind()))
                            .with_index(index),
                    );
                    violations += 1;
                }
            }

            if let Some(first) = pool.find(constant).filter(|first| *first != index) {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticSeverity::Warning,
                        DiagnosticCategory::Validation,
                        format!("{} at {index} duplicates {first}", constant.kind()),
                    )
                    .with_class(class)
                    .with_index(index),
                );
            }
        }
        violations
    }

    fn validate_index_uses(&self, name: &str, class: &Class) -> usize {
        let mut violations = 0;
        for site in class.index_uses() {
            if site.optional && site.index == 0 {
                continue;
            }
            if let Some(message) = check_reference(&class.constant_pool, site.index, site.kinds) {
                self.diagnostics
                    .push(self.report(name, message).with_index(site.index));
                violations += 1;
            }
        }
        violations
    }

    fn validate_code(&self, class: &str, code: &CodeAttribute) -> usize {
        let mut violations = 0;
        let mut violation = |message: String, offset: u32| {
            self.diagnostics
                .push(self.report(class, message).with_offset(offset));
            violations += 1;
        };

        let mut expected = 0;
        for entry in &code.instructions {
            if entry.offset != expected {
                violation(
                    format!("Instruction at {} should start at {expected}", entry.offset),
                    entry.offset,
                );
            }
            expected = entry.end();

            for delta in entry.instruction.deltas() {
                let target = i64::from(entry.offset) + i64::from(delta);
                let lands = u32::try_from(target)
                    .ok()
                    .is_some_and(|target| code.position(target).is_some());
                if !lands {
                    violation(
                        format!(
                            "{} at {} targets {target}, which is no instruction boundary",
                            entry.instruction.opcode(),
                            entry.offset
                        ),
                        entry.offset,
                    );
                }
            }
        }

        match code.code_bytes() {
            Ok(bytes) if bytes.len() == code.code_length() as usize => {}
            Ok(bytes) => violation(
                format!(
                    "Encoded length {} differs from code length {}",
                    bytes.len(),
                    code.code_length()
                ),
                0,
            ),
            Err(error) => violation(format!("Code does not encode: {error}"), 0),
        }

        for handler in &code.exception_table {
            let range = format!("[{}, {}) -> {}", handler.start, handler.end, handler.handler);
            if handler.start >= handler.end {
                violation(format!("Empty handler range {range}"), handler.start);
            }
            if code.position(handler.start).is_none() || !code.is_boundary(handler.end) {
                violation(
                    format!("Handler range {range} splits an instruction"),
                    handler.start,
                );
            }
            if code.position(handler.handler).is_none() {
                violation(
                    format!("Handler {range} does not start an instruction"),
                    handler.handler,
                );
            }
        }

        violations
    }
}

fn check_reference(pool: &ConstantPool, index: u16, kinds: &[ConstantKind]) -> Option<String> {
    match pool.kind(index) {
        None | Some(ConstantKind::Unusable) => Some(format!("index {index} names no constant")),
        Some(kind) if !kinds.is_empty() && !kinds.contains(&kind) => {
            Some(format!("index {index} names a {kind}, expected one of {kinds:?}"))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, Opcode},
        classedit::ConstantPoolEditor,
        classfile::{CodeEntry, Constant, ExceptionEntry},
        test::ClassBuilder,
    };

    fn looping() -> Class {
        let mut builder = ClassBuilder::new("demo/Loop");
        let field = builder.field_ref("demo/Loop", "count", "I");
        // 0: aload_0, 1: getfield, 4: ifne -> 0, 7: return
        let mut code = CodeAttribute::new(
            1,
            1,
            vec![
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Getfield, field),
                Instruction::branch(Opcode::Ifne, -4),
                Instruction::simple(Opcode::Return),
            ],
        );
        code.exception_table.push(ExceptionEntry::new(0, 7, 7, 0));
        builder.field("count", "I").method("spin", "()V", code).build()
    }

    #[test]
    fn test_valid_class() {
        let diagnostics = Arc::new(Diagnostics::new());
        let validator = ClassValidator::new(Arc::clone(&diagnostics));
        validator.validate(&looping()).unwrap();
        assert!(!diagnostics.has_any());
    }

    #[test]
    fn test_branch_into_operand() {
        let mut class = looping();
        let code = class.members[1].code_mut().unwrap();
        code.instructions[2].instruction = Instruction::branch(Opcode::Ifne, -2);

        let diagnostics = Arc::new(Diagnostics::new());
        let validator = ClassValidator::new(Arc::clone(&diagnostics));
        assert!(validator.validate(&class).is_err());

        let errors = diagnostics.with_severity(DiagnosticSeverity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, Some(4));
    }

    #[test]
    fn test_exception_ranges() {
        let mut class = looping();
        let code = class.members[1].code_mut().unwrap();
        code.exception_table = vec![
            ExceptionEntry::new(4, 4, 7, 0),
            ExceptionEntry::new(2, 7, 7, 0),
            ExceptionEntry::new(0, 8, 8, 0),
        ];

        let diagnostics = Arc::new(Diagnostics::new());
        assert!(ClassValidator::new(Arc::clone(&diagnostics))
            .validate(&class)
            .is_err());
        // Empty range, split start and a handler at the code end.
        assert_eq!(diagnostics.count_of(DiagnosticSeverity::Error), 3);
    }

    #[test]
    fn test_stale_offsets() {
        let mut class = looping();
        let code = class.members[1].code_mut().unwrap();
        code.instructions.insert(1, CodeEntry::new(1, Instruction::simple(Opcode::Nop)));

        let diagnostics = Arc::new(Diagnostics::new());
        assert!(ClassValidator::new(Arc::clone(&diagnostics))
            .validate(&class)
            .is_err());
        assert!(diagnostics
            .iter()
            .any(|entry| entry.message.contains("should start at 2")));
    }

    #[test]
    fn test_pool_references() {
        let mut class = looping();
        let utf8 = ConstantPoolEditor::new(&mut class.constant_pool)
            .add_utf8("count")
            .unwrap();
        class.interfaces.push(utf8);

        let diagnostics = Arc::new(Diagnostics::new());
        assert!(ClassValidator::new(Arc::clone(&diagnostics))
            .validate(&class)
            .is_err());
        let errors = diagnostics.with_severity(DiagnosticSeverity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, Some(utf8));
    }

    #[test]
    fn test_duplicates_are_warnings() {
        let pool = ConstantPool::from_entries(vec![
            Constant::Utf8("demo/Dup".into()),
            Constant::Class { name_index: 1 },
            Constant::Utf8("demo/Dup".into()),
            Constant::Utf8("java/lang/Object".into()),
            Constant::Class { name_index: 4 },
        ])
        .unwrap();
        let class = Class::new(
            pool,
            crate::classfile::ClassAccessFlags::PUBLIC,
            2,
            5,
        );

        let diagnostics = Arc::new(Diagnostics::new());
        ClassValidator::new(Arc::clone(&diagnostics))
            .validate(&class)
            .unwrap();
        assert_eq!(diagnostics.warnings().len(), 1);
        assert_eq!(diagnostics.warnings()[0].index, Some(3));
    }
}
