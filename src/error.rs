use thiserror::Error;

use crate::classfile::ConstantKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two groups. Structural errors abort the single operation that raised them
/// (one constant addition, one method composition, one member copy) and are never swallowed.
/// Policy ambiguities are *not* errors: they are resolved by a documented default and reported
/// through [`crate::diagnostics::Diagnostics`] instead.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::PoolOverflow`] - The constant pool would exceed its maximum entry count
/// - [`Error::UnencodableOffset`] - A branch operand does not fit even the wide encoding
/// - [`Error::DanglingReference`] - An index failed range or tag validation at its point of use
/// - [`Error::InvalidTarget`] - A branch target does not resolve to an instruction boundary
/// - [`Error::CodeTooLarge`] - A composed instruction stream exceeds the code size limit
/// - [`Error::MemberCollision`] - A member copy collided and the collision policy rejects it
///
/// ## Usage Errors
/// - [`Error::ComposerState`] - A composer operation was called in the wrong state
///
/// ## Decoding Errors
/// - [`Error::Malformed`] - Corrupted or invalid instruction bytes
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
///
/// # Examples
///
/// ```rust
/// use classforge::{classfile::ConstantPool, classedit::ConstantPoolEditor, Error};
///
/// let mut pool = ConstantPool::new();
/// let mut editor = ConstantPoolEditor::with_limit(&mut pool, 2);
/// editor.add_utf8("first")?;
/// match editor.add_utf8("second") {
///     Err(Error::PoolOverflow { limit }) => assert_eq!(limit, 2),
///     other => panic!("unexpected {other:?}"),
/// }
/// # Ok::<(), classforge::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The constant pool would grow beyond its maximum entry count.
    ///
    /// The class file format addresses pool entries with 16-bit indices, so a pool holds at
    /// most 65535 slots (including the unusable slot 0). The limit can be lowered through
    /// [`crate::EditorConfig::max_pool_entries`].
    #[error("Constant pool overflow - the pool cannot hold more than {limit} entries")]
    PoolOverflow {
        /// The slot limit that would have been exceeded
        limit: usize,
    },

    /// A branch or switch operand cannot be encoded, not even in its wide form.
    ///
    /// Raised by the code composer once its widening fix-point has settled. The composition
    /// of that one method is aborted.
    #[error("Branch at offset {offset} cannot encode delta {delta}")]
    UnencodableOffset {
        /// Output offset of the instruction that carries the operand
        offset: u32,
        /// The delta that did not fit
        delta: i64,
    },

    /// An index failed range or tag validation at the point where it is used.
    ///
    /// `found` is `None` when the index is out of range (or 0), otherwise it names the kind
    /// of the entry that was actually found.
    #[error("Dangling constant pool reference #{index} - expected {expected}, found {}", found.map_or("nothing".to_string(), |k| k.to_string()))]
    DanglingReference {
        /// The offending pool index
        index: u16,
        /// Human-readable description of what the consuming site expected
        expected: &'static str,
        /// The kind of the entry that was found, if the index was in range
        found: Option<ConstantKind>,
    },

    /// A branch, switch or exception-table target cannot be resolved.
    ///
    /// Either the original offset was never appended to the enclosing code fragment, or the
    /// target resolves past the last instruction of the composed code.
    #[error("Invalid branch target - original offset {offset} has no counterpart in the composed code")]
    InvalidTarget {
        /// The offset, in the fragment's original offset space, that could not be resolved
        offset: i64,
    },

    /// The composed instruction stream exceeds the maximum code length.
    #[error("Code length {length} exceeds the maximum of {limit} bytes")]
    CodeTooLarge {
        /// Serialized length of the composed stream
        length: usize,
        /// The configured maximum
        limit: usize,
    },

    /// A copied member collided with an existing member of the same name but a different
    /// descriptor, and [`crate::CollisionPolicy::Reject`] is in effect.
    #[error("Member {name} collides with an existing member of descriptor {existing}")]
    MemberCollision {
        /// The colliding member name
        name: String,
        /// The descriptor of the member already present in the destination
        existing: String,
    },

    /// A code composer operation was invoked in a state that does not permit it.
    #[error("Composer state error - {0}")]
    ComposerState(String),

    /// The input is damaged and could not be decoded.
    ///
    /// Carries the source location where the malformation was detected for debugging
    /// purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a buffer.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
