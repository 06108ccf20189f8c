//! Queries for constants that reference a given class or member.

use rayon::prelude::*;

use crate::{
    classfile::{Class, ClassKey, ClassPool, ConstantPool, ResolvedRef},
    Result,
};

#[derive(Debug, Clone)]
enum Target {
    Exact(ResolvedRef),
    MembersOf(ClassKey),
}

/// Finds constants whose resolved reference names a target class or member.
///
/// Only resolved constants are considered; run the [`crate::classfile::Linker`] first.
///
/// # Examples
///
/// ```rust
/// use classforge::{
///     classedit::{ConstantPoolEditor, ReferenceFinder},
///     classfile::{ConstantPool, MemberKey, ResolvedRef},
/// };
///
/// let mut pool = ConstantPool::new();
/// let call = ConstantPoolEditor::new(&mut pool).add_interface_method_ref("demo/Api", "run", "()V")?;
/// pool.set_resolved(call, ResolvedRef::Method(MemberKey::new("demo/Api", "run", "()V")))?;
///
/// let finder = ReferenceFinder::members_of("demo/Api").with_name_pattern("r?n*");
/// assert_eq!(finder.find_in_pool(&pool), vec![call]);
/// # Ok::<(), classforge::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReferenceFinder {
    target: Target,
    pattern: Option<String>,
}

impl ReferenceFinder {
    /// Match constants resolved to exactly `target`.
    #[must_use]
    pub fn new(target: ResolvedRef) -> Self {
        ReferenceFinder {
            target: Target::Exact(target),
            pattern: None,
        }
    }

    /// Match field and method references resolved to any member declared by `class`.
    #[must_use]
    pub fn members_of(class: &str) -> Self {
        ReferenceFinder {
            target: Target::MembersOf(ClassKey::new(class)),
            pattern: None,
        }
    }

    /// Only match member references whose resolved name matches `pattern`, where `*`
    /// matches any run of characters and `?` exactly one. Class references never match a
    /// pattern.
    #[must_use]
    pub fn with_name_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Returns true if `resolved` is a match.
    #[must_use]
    pub fn matches(&self, resolved: &ResolvedRef) -> bool {
        let target = match &self.target {
            Target::Exact(target) => target == resolved,
            Target::MembersOf(class) => resolved
                .as_member()
                .is_some_and(|member| member.class == *class),
        };

        match &self.pattern {
            None => target,
            Some(pattern) => {
                target
                    && resolved
                        .as_member()
                        .is_some_and(|member| wildcard_match(pattern, &member.name))
            }
        }
    }

    /// Indices of matching constants in `pool`.
    #[must_use]
    pub fn find_in_pool(&self, pool: &ConstantPool) -> Vec<u16> {
        pool.iter()
            .filter(|(_, entry)| entry.resolved().is_some_and(|resolved| self.matches(resolved)))
            .map(|(index, _)| index)
            .collect()
    }

    /// Returns true if any constant of `class` is a match.
    #[must_use]
    pub fn references(&self, class: &Class) -> bool {
        class
            .constant_pool
            .iter()
            .any(|(_, entry)| entry.resolved().is_some_and(|resolved| self.matches(resolved)))
    }

    /// Number of index sites in `class` (instructions, attributes, header) that use a
    /// matching constant directly.
    #[must_use]
    pub fn count_uses(&self, class: &Class) -> usize {
        let matching = self.find_in_pool(&class.constant_pool);
        if matching.is_empty() {
            return 0;
        }
        class
            .index_uses()
            .iter()
            .filter(|site| matching.contains(&site.index))
            .count()
    }

    /// Names of the classes of `pool` that reference a match, in pool order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DanglingReference`] if a matching class has an invalid name.
    pub fn classes_referencing(&self, pool: &ClassPool) -> Result<Vec<String>> {
        pool.classes()
            .par_iter()
            .filter(|class| self.references(class))
            .map(|class| class.name().map(str::to_string))
            .collect()
    }
}

/// Glob-style match of `text` against `pattern` (`*` and `?`).
#[must_use]
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(c) if *c == '?' || *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
