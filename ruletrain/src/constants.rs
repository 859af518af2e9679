//! Reserved marker texts shared between the symbol model and the two
//! textual emitters. The quoted forms are part of the marker text.

/// Epsilon symbol text as it appears in alignment and feature records.
pub const EPSILON_TEXT: &str = "@_EPSILON_SYMBOL_@";

/// Padding symbol text bracketing every aligned sequence.
pub const PAD_TEXT: &str = "\"<P>\"";

/// Separator marker between substitution slots in rule regexes.
pub const SEPARATOR_MARK: &str = "\"<S>\"";

/// Epsilon marker in rule regexes.
pub const EPSILON_MARK: &str = "\"<E>\"";

/// Continuation marker gluing a slot to its output tail in rule regexes.
pub const DOT_MARK: &str = "\"<.>\"";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_distinct() {
        let all = [EPSILON_TEXT, PAD_TEXT, SEPARATOR_MARK, EPSILON_MARK, DOT_MARK];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
