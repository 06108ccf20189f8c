//! Editing configuration.
//!
//! [`EditorConfig`] bundles the limits and policy switches shared by the constant pool
//! editor, the code composer and the member copier. The defaults follow the class file
//! format limits; [`EditorConfig::strict`] rejects every ambiguity instead of resolving it.

use crate::assembly::Opcode;

/// How a member copy resolves a name that already exists in the destination with a
/// different descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum CollisionPolicy {
    /// Pick `name$N` with the smallest free `N` and report a warning.
    #[default]
    Rename,
    /// Add the copy alongside the existing member. Legal for methods and, in the class file
    /// format, for fields.
    Overload,
    /// Overwrite the descriptor and attributes of the existing member.
    Replace,
    /// Fail with [`crate::Error::MemberCollision`].
    Reject,
}

/// Configuration of the editing components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct EditorConfig {
    /// Maximum number of constant pool slots, including slot 0 (format limit: 65535)
    pub max_pool_entries: usize,

    /// Maximum length in bytes of a composed code array (format limit: 65535)
    pub max_code_length: usize,

    /// Maximum nesting depth of code fragments
    pub max_fragment_depth: usize,

    /// Restart copied `goto_w`/`jsr_w` in their narrow form and let layout widen them again
    /// only where needed
    pub shrink_instructions: bool,

    /// Resolution of same-name, different-descriptor member copies
    pub collision_policy: CollisionPolicy,

    /// Also rewrite `L<class>;` occurrences in descriptors when redirecting class references
    pub rewrite_descriptors: bool,

    /// Copy attributes without structural support (as raw bytes) when copying members;
    /// otherwise they are dropped with a warning
    pub copy_unknown_attributes: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_pool_entries: crate::classfile::MAX_POOL_ENTRIES,
            max_code_length: 65535,
            max_fragment_depth: 16,
            shrink_instructions: true,
            collision_policy: CollisionPolicy::Rename,
            rewrite_descriptors: true,
            copy_unknown_attributes: false,
        }
    }
}

impl EditorConfig {
    /// Creates a configuration that turns every policy ambiguity into an error.
    ///
    /// Member collisions are rejected and copied wide branches keep their encoding.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            shrink_instructions: false,
            collision_policy: CollisionPolicy::Reject,
            ..Self::default()
        }
    }

    /// Returns a copy with a different collision policy.
    #[must_use]
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Initial encoding of a branch opcode at the start of layout.
    pub(crate) fn initial_branch(&self, opcode: Opcode) -> Opcode {
        if self.shrink_instructions {
            opcode.narrowed()
        } else {
            opcode
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let default = EditorConfig::default();
        assert_eq!(default.max_pool_entries, 65535);
        assert_eq!(default.collision_policy, CollisionPolicy::Rename);
        assert!(default.shrink_instructions);

        let strict = EditorConfig::strict();
        assert_eq!(strict.collision_policy, CollisionPolicy::Reject);
        assert!(!strict.shrink_instructions);
        assert_eq!(strict.max_code_length, default.max_code_length);
    }

    #[test]
    fn test_initial_branch() {
        assert_eq!(
            EditorConfig::default().initial_branch(Opcode::GotoW),
            Opcode::Goto
        );
        assert_eq!(
            EditorConfig::strict().initial_branch(Opcode::GotoW),
            Opcode::GotoW
        );
    }
}
