//! Symbol escaping for the textual specifications handed to the
//! transducer engine.
//!
//! The cost-model format and the rule format escape epsilon differently,
//! so the table is an explicitly constructed value passed to whichever
//! emitter needs it rather than process-wide state. Fixed escapes: a
//! literal quote becomes `%"`, a backslash becomes `"\\"`, the padding
//! marker keeps its quoted form, epsilon becomes the table's epsilon
//! text. Every other symbol is wrapped in braces.

use crate::constants::{EPSILON_MARK, PAD_TEXT};
use crate::symbol::Symbol;

/// Escape configuration for one textual format.
#[derive(Debug, Clone, Copy)]
pub struct EscapeTable {
    epsilon: &'static str,
}

impl EscapeTable {
    /// Table for the aligner's cost-model format: epsilon is `0`.
    pub const fn aligner() -> EscapeTable {
        EscapeTable { epsilon: "0" }
    }

    /// Table for the rule format: epsilon is the `"<E>"` marker.
    pub const fn rules() -> EscapeTable {
        EscapeTable {
            epsilon: EPSILON_MARK,
        }
    }

    /// Escapes one symbol for this format.
    pub fn escape(&self, symbol: &Symbol) -> String {
        match symbol {
            Symbol::Epsilon => self.epsilon.to_string(),
            Symbol::Pad => PAD_TEXT.to_string(),
            Symbol::Sym(s) if s == "\"" => "%\"".to_string(),
            Symbol::Sym(s) if s == "\\" => "\"\\\\\"".to_string(),
            Symbol::Sym(s) => format!("{{{}}}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_escapes() {
        let esc = EscapeTable::rules();
        assert_eq!(esc.escape(&Symbol::Epsilon), "\"<E>\"");
        assert_eq!(esc.escape(&Symbol::Pad), "\"<P>\"");
        assert_eq!(esc.escape(&Symbol::Sym("\"".into())), "%\"");
        assert_eq!(esc.escape(&Symbol::Sym("\\".into())), "\"\\\\\"");
        assert_eq!(esc.escape(&Symbol::Sym("ž".into())), "{ž}");
    }

    #[test]
    fn aligner_epsilon() {
        assert_eq!(EscapeTable::aligner().escape(&Symbol::Epsilon), "0");
    }
}
