//! Operand stack and local variable sizing.
//!
//! [`max_stack`] runs a worklist over the control flow of an instruction stream, propagating
//! the stack depth along fall-through edges, branch and switch edges and into exception
//! handlers (entered with the thrown exception as their only operand). Stack effects come
//! from the opcode table; field accesses, invocations and `ldc` derive theirs from the
//! descriptor or kind of their constant operand.
//!
//! [`max_locals`] counts the parameter slots of a method (plus the receiver of instance
//! methods) and every slot a variable instruction touches.

use crate::{
    assembly::{Instruction, Opcode},
    classfile::{descriptor, CodeAttribute, Constant, ConstantPool},
    Result,
};

/// `(popped, pushed)` slot counts of `instruction`.
///
/// # Errors
///
/// Returns [`crate::Error::DanglingReference`] if a constant operand does not resolve and
/// [`crate::Error::Malformed`] for invalid descriptors.
pub fn stack_effect(instruction: &Instruction, pool: &ConstantPool) -> Result<(u16, u16)> {
    let opcode = instruction.opcode();
    if let Some(effect) = opcode.stack_effect() {
        return Ok(effect);
    }

    let Instruction::ConstantRef {
        index, constant, ..
    } = instruction
    else {
        return Err(malformed_error!("{} requires a constant operand", opcode));
    };

    let effect = match opcode {
        Opcode::Ldc | Opcode::LdcW => match pool.constant(*index)? {
            Constant::Long(_) | Constant::Double(_) => (0, 2),
            Constant::Dynamic {
                name_and_type_index,
                ..
            } => {
                let (_, field_type) = pool.name_and_type(*name_and_type_index)?;
                (0, descriptor::field_slots(field_type)?)
            }
            _ => (0, 1),
        },
        Opcode::Getstatic | Opcode::Putstatic | Opcode::Getfield | Opcode::Putfield => {
            let field = pool.member_ref(*index)?;
            let size = descriptor::field_slots(field.descriptor)?;
            match opcode {
                Opcode::Getstatic => (0, size),
                Opcode::Putstatic => (size, 0),
                Opcode::Getfield => (1, size),
                _ => (1 + size, 0),
            }
        }
        Opcode::Invokevirtual
        | Opcode::Invokespecial
        | Opcode::Invokestatic
        | Opcode::Invokeinterface => {
            let method = pool.member_ref(*index)?;
            let (parameters, returns) = descriptor::method_slots(method.descriptor)?;
            if opcode == Opcode::Invokestatic {
                (parameters, returns)
            } else {
                (parameters + 1, returns)
            }
        }
        Opcode::Invokedynamic => match pool.constant(*index)? {
            Constant::InvokeDynamic {
                name_and_type_index,
                ..
            } => {
                let (_, method_type) = pool.name_and_type(*name_and_type_index)?;
                descriptor::method_slots(method_type)?
            }
            other => {
                return Err(malformed_error!(
                    "invokedynamic references a {} constant",
                    other.kind()
                ))
            }
        },
        Opcode::Multianewarray => (u16::from(*constant), 1),
        other => return Err(malformed_error!("No stack effect known for {}", other)),
    };
    Ok(effect)
}

/// Maximum operand stack depth of `code`, in slots.
///
/// Unreachable instructions do not contribute. Branch targets that do not start an
/// instruction are ignored here; the validator reports them.
///
/// # Errors
///
/// Returns any error of [`stack_effect`].
pub fn max_stack(code: &CodeAttribute, pool: &ConstantPool) -> Result<u16> {
    let instructions = &code.instructions;
    if instructions.is_empty() {
        return Ok(0);
    }

    let mut depths: Vec<Option<u32>> = vec![None; instructions.len()];
    let mut worklist = vec![(0usize, 0u32)];
    for handler in &code.exception_table {
        if let Some(position) = code.position(handler.handler) {
            worklist.push((position, 1));
        }
    }

    let mut max = 0u32;
    while let Some((position, depth)) = worklist.pop() {
        // Unbalanced loops would otherwise grow the depth forever.
        if depth > u32::from(u16::MAX) {
            continue;
        }
        match depths[position] {
            Some(known) if known >= depth => continue,
            _ => depths[position] = Some(depth),
        }

        let entry = &instructions[position];
        let (pops, pushes) = stack_effect(&entry.instruction, pool)?;
        let after = depth.saturating_sub(u32::from(pops)) + u32::from(pushes);
        max = max.max(depth).max(after);

        let opcode = entry.instruction.opcode();
        for delta in entry.instruction.deltas() {
            let target = i64::from(entry.offset) + i64::from(delta);
            let Ok(target) = u32::try_from(target) else {
                continue;
            };
            if let Some(target) = code.position(target) {
                worklist.push((target, after));
            }
        }

        if !opcode.ends_flow() && position + 1 < instructions.len() {
            // A subroutine returns to the instruction after `jsr` without its return
            // address on the stack.
            let next = if matches!(opcode, Opcode::Jsr | Opcode::JsrW) {
                depth
            } else {
                after
            };
            worklist.push((position + 1, next));
        }
    }

    Ok(u16::try_from(max).unwrap_or(u16::MAX))
}

/// Number of local variable slots `code` needs for a method with `descriptor`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for an invalid descriptor.
pub fn max_locals(code: &CodeAttribute, descriptor: &str, is_static: bool) -> Result<u16> {
    let (parameters, _) = descriptor::method_slots(descriptor)?;
    let mut max = u32::from(parameters) + u32::from(!is_static);

    for entry in &code.instructions {
        if let Some((slot, size)) = entry.instruction.local_slots() {
            max = max.max(u32::from(slot) + u32::from(size));
        }
    }

    Ok(u16::try_from(max).unwrap_or(u16::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::ExceptionEntry, test::ClassBuilder};

    #[test]
    fn test_straight_line() {
        let mut builder = ClassBuilder::new("demo/Calc");
        let add = builder.method_ref("demo/Calc", "add", "(JJ)J");
        let pool = builder.build().constant_pool;

        // lload_1; lload_3; invokestatic add; lreturn
        let code = CodeAttribute::new(
            0,
            0,
            vec![
                Instruction::variable(Opcode::Lload, 1),
                Instruction::variable(Opcode::Lload, 3),
                Instruction::constant_ref(Opcode::Invokestatic, add),
                Instruction::simple(Opcode::Lreturn),
            ],
        );

        assert_eq!(max_stack(&code, &pool).unwrap(), 4);
        assert_eq!(max_locals(&code, "(JJ)J", true).unwrap(), 5);
        assert_eq!(max_locals(&code, "(JJ)J", false).unwrap(), 5);
    }

    #[test]
    fn test_branches_and_handlers() {
        let mut builder = ClassBuilder::new("demo/Flow");
        let value = builder.field_ref("demo/Flow", "value", "D");
        let pool = builder.build().constant_pool;

        // 0: iload_1, 1: ifeq -> 9, 4: aload_0, 5: getfield, 8: dreturn,
        // 9: dconst_0, 10: dreturn, 11: astore_2 (handler), 12: dconst_1, 13: dreturn
        let mut code = CodeAttribute::new(
            0,
            0,
            vec![
                Instruction::variable(Opcode::Iload, 1),
                Instruction::branch(Opcode::Ifeq, 8),
                Instruction::variable(Opcode::Aload, 0),
                Instruction::constant_ref(Opcode::Getfield, value),
                Instruction::simple(Opcode::Dreturn),
                Instruction::simple(Opcode::Dconst0),
                Instruction::simple(Opcode::Dreturn),
                Instruction::variable(Opcode::Astore, 2),
                Instruction::simple(Opcode::Dconst1),
                Instruction::simple(Opcode::Dreturn),
            ],
        );
        code.exception_table.push(ExceptionEntry::new(4, 8, 11, 0));

        assert_eq!(code.instructions[5].offset, 9);
        assert_eq!(max_stack(&code, &pool).unwrap(), 2);
        assert_eq!(max_locals(&code, "(Z)D", false).unwrap(), 3);
    }

    #[test]
    fn test_unknown_constant_fails() {
        let pool = ConstantPool::new();
        let code = CodeAttribute::new(
            0,
            0,
            vec![Instruction::constant_ref(Opcode::Getstatic, 9)],
        );

        assert!(max_stack(&code, &pool).is_err());
    }
}
