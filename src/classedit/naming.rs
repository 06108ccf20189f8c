//! Naming policies for copied members.
//!
//! A [`NamingPolicy`] proposes the name a copied member gets in its destination class. The
//! member copier asks once per copy, in call order, so a counting policy numbers copies
//! deterministically. The proposal is a hint: when it collides with an existing member the
//! collision policy may still pick another name.

/// Proposes destination names for copied members.
pub trait NamingPolicy {
    /// Candidate name for a copy of the member `name` with `descriptor`.
    fn candidate_name(&mut self, name: &str, descriptor: &str) -> String;
}

impl<F> NamingPolicy for F
where
    F: FnMut(&str, &str) -> String,
{
    fn candidate_name(&mut self, name: &str, descriptor: &str) -> String {
        self(name, descriptor)
    }
}

/// Keeps the source name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveNames;

impl NamingPolicy for PreserveNames {
    fn candidate_name(&mut self, name: &str, _descriptor: &str) -> String {
        name.to_string()
    }
}

/// Appends a separator and a running counter: `run` becomes `run$0`, then `run$1`, ...
#[derive(Debug, Clone)]
pub struct SuffixNames {
    separator: String,
    next: u32,
}

impl SuffixNames {
    /// Count from 0 with `$` as separator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_separator("$")
    }

    /// Count from 0 with a custom separator.
    #[must_use]
    pub fn with_separator(separator: &str) -> Self {
        SuffixNames {
            separator: separator.to_string(),
            next: 0,
        }
    }

    /// The counter value the next name will carry.
    #[must_use]
    pub fn next_value(&self) -> u32 {
        self.next
    }
}

impl Default for SuffixNames {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingPolicy for SuffixNames {
    fn candidate_name(&mut self, name: &str, _descriptor: &str) -> String {
        let candidate = format!("{name}{}{}", self.separator, self.next);
        self.next += 1;
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_counter_follows_call_order() {
        let mut naming = SuffixNames::new();
        assert_eq!(naming.candidate_name("run", "()V"), "run$0");
        assert_eq!(naming.candidate_name("run", "()V"), "run$1");
        assert_eq!(naming.candidate_name("value", "I"), "value$2");
        assert_eq!(naming.next_value(), 3);

        let mut lambdas = SuffixNames::with_separator("_lambda_");
        assert_eq!(lambdas.candidate_name("apply", "()V"), "apply_lambda_0");
    }

    #[test]
    fn test_closure_policy() {
        let mut naming = |name: &str, descriptor: &str| format!("{name}_{}", descriptor.len());
        assert_eq!(NamingPolicy::candidate_name(&mut naming, "f", "(I)V"), "f_4");
        assert_eq!(PreserveNames.candidate_name("keep", "J"), "keep");
    }
}
