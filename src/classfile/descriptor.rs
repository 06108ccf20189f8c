//! Field and method descriptor helpers.
//!
//! Only the parts of the descriptor grammar the editing engine needs: slot counting for
//! stack and local sizing, and class name substitution in descriptors and generic signatures
//! for reference redirection.

use crate::Result;

/// Slot size of a single field type at the start of `descriptor`, and the length of that
/// type in bytes.
fn field_type(descriptor: &[u8], position: usize) -> Result<(u16, usize)> {
    let mut cursor = position;
    while descriptor.get(cursor) == Some(&b'[') {
        cursor += 1;
    }
    let array = cursor > position;

    let size = match descriptor.get(cursor) {
        Some(b'J' | b'D') => {
            if array {
                1
            } else {
                2
            }
        }
        Some(b'B' | b'C' | b'F' | b'I' | b'S' | b'Z') => 1,
        Some(b'L') => {
            let end = descriptor[cursor..]
                .iter()
                .position(|&b| b == b';')
                .ok_or_else(|| malformed_error!("Unterminated class name in descriptor"))?;
            cursor += end;
            1
        }
        Some(other) => {
            return Err(malformed_error!(
                "Invalid descriptor character '{}'",
                char::from(*other)
            ))
        }
        None => return Err(malformed_error!("Truncated descriptor")),
    };

    Ok((size, cursor + 1 - position))
}

/// Number of stack slots a value of the field type `descriptor` occupies.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for an invalid descriptor.
pub fn field_slots(descriptor: &str) -> Result<u16> {
    let bytes = descriptor.as_bytes();
    let (size, length) = field_type(bytes, 0)?;
    if length != bytes.len() {
        return Err(malformed_error!("Trailing data in field descriptor {}", descriptor));
    }
    Ok(size)
}

/// Parameter and return slot counts of the method descriptor `descriptor`.
///
/// The receiver of instance methods is not included.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for an invalid descriptor.
pub fn method_slots(descriptor: &str) -> Result<(u16, u16)> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(malformed_error!("Method descriptor {} lacks '('", descriptor));
    }

    let mut cursor = 1;
    let mut parameters = 0u16;
    while bytes.get(cursor) != Some(&b')') {
        let (size, length) = field_type(bytes, cursor)?;
        parameters = parameters.saturating_add(size);
        cursor += length;
    }
    cursor += 1;

    let returns = match &bytes[cursor..] {
        b"V" => 0,
        rest => {
            let (size, length) = field_type(rest, 0)?;
            if length != rest.len() {
                return Err(malformed_error!(
                    "Trailing data in method descriptor {}",
                    descriptor
                ));
            }
            size
        }
    };

    Ok((parameters, returns))
}

/// Replace every `L<original>;` class type in `descriptor` with `L<replacement>;`.
///
/// Returns `None` if the descriptor does not mention `original`.
#[must_use]
pub fn replace_class(descriptor: &str, original: &str, replacement: &str) -> Option<String> {
    let mut result = String::with_capacity(descriptor.len());
    let mut changed = false;
    let mut rest = descriptor;

    while let Some(start) = rest.find('L') {
        result.push_str(&rest[..=start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find(';') else {
            result.push_str(after);
            rest = "";
            break;
        };

        let name = &after[..end];
        if name == original {
            result.push_str(replacement);
            changed = true;
        } else {
            result.push_str(name);
        }
        result.push(';');
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    changed.then_some(result)
}

/// Replace class `original` with `replacement` wherever the generic `signature` names it as
/// a class type, including type arguments, bounds and thrown types.
///
/// Type variables and type parameter names are never touched. Returns `None` if the
/// signature does not mention `original` or does not parse.
#[must_use]
pub fn replace_class_in_signature(
    signature: &str,
    original: &str,
    replacement: &str,
) -> Option<String> {
    let mut rewriter = SignatureRewriter {
        input: signature,
        position: 0,
        original,
        replacement,
        output: String::with_capacity(signature.len()),
        changed: false,
    };
    rewriter.signature()?;
    rewriter.changed.then_some(rewriter.output)
}

struct SignatureRewriter<'a> {
    input: &'a str,
    position: usize,
    original: &'a str,
    replacement: &'a str,
    output: String,
    changed: bool,
}

impl<'a> SignatureRewriter<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn copy(&mut self, expected: u8) -> Option<()> {
        if self.peek()? != expected {
            return None;
        }
        self.output.push(char::from(expected));
        self.position += 1;
        Some(())
    }

    /// The text up to the first of `stops`, which is not consumed.
    fn identifier(&mut self, stops: &[u8]) -> Option<&'a str> {
        let input: &'a str = self.input;
        let start = self.position;
        let length = input.as_bytes()[start..]
            .iter()
            .position(|b| stops.contains(b))?;
        self.position += length;
        Some(&input[start..start + length])
    }

    fn copy_identifier(&mut self, stops: &[u8]) -> Option<()> {
        let identifier = self.identifier(stops)?;
        self.output.push_str(identifier);
        Some(())
    }

    fn signature(&mut self) -> Option<()> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.copy(b'(')?;
            while self.peek()? != b')' {
                self.java_type()?;
            }
            self.copy(b')')?;
            if self.peek()? == b'V' {
                self.copy(b'V')?;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.copy(b'^')?;
                self.reference_type()?;
            }
        } else {
            while self.peek().is_some() {
                self.java_type()?;
            }
        }
        (self.position == self.input.len()).then_some(())
    }

    fn type_parameters(&mut self) -> Option<()> {
        self.copy(b'<')?;
        while self.peek()? != b'>' {
            self.copy_identifier(b":")?;
            while self.peek() == Some(b':') {
                self.copy(b':')?;
                if matches!(self.peek()?, b'L' | b'T' | b'[') {
                    self.reference_type()?;
                }
            }
        }
        self.copy(b'>')
    }

    fn java_type(&mut self) -> Option<()> {
        match self.peek()? {
            base @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => self.copy(base),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Option<()> {
        match self.peek()? {
            b'L' => self.class_type(),
            b'T' => {
                self.copy(b'T')?;
                self.copy_identifier(b";")?;
                self.copy(b';')
            }
            b'[' => {
                self.copy(b'[')?;
                self.java_type()
            }
            _ => None,
        }
    }

    fn class_type(&mut self) -> Option<()> {
        self.copy(b'L')?;
        let name = self.identifier(b"<.;")?;
        if name == self.original {
            self.output.push_str(self.replacement);
            self.changed = true;
        } else {
            self.output.push_str(name);
        }

        loop {
            match self.peek()? {
                b'<' => self.type_arguments()?,
                b'.' => {
                    self.copy(b'.')?;
                    self.copy_identifier(b"<.;")?;
                }
                b';' => return self.copy(b';'),
                _ => return None,
            }
        }
    }

    fn type_arguments(&mut self) -> Option<()> {
        self.copy(b'<')?;
        while self.peek()? != b'>' {
            match self.peek()? {
                b'*' => self.copy(b'*')?,
                wildcard @ (b'+' | b'-') => {
                    self.copy(wildcard)?;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.copy(b'>')
    }
}
