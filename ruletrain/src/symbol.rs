//! Symbols, symbol pairs and aligned sequences.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::constants::{EPSILON_TEXT, PAD_TEXT};

/// An atomic alphabet unit: a character, a designated multi-character
/// token, or one of the two reserved markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    /// "Nothing" on one side of an alignment edge.
    Epsilon,
    /// Brackets every aligned sequence on both ends.
    Pad,
    /// An ordinary symbol. May span several characters (compound
    /// insertion outputs are space-joined).
    Sym(SmolStr),
}

impl Symbol {
    /// Creates a symbol from its textual form, mapping the reserved
    /// marker texts back to their variants.
    pub fn new(text: &str) -> Symbol {
        match text {
            EPSILON_TEXT => Symbol::Epsilon,
            PAD_TEXT => Symbol::Pad,
            _ => Symbol::Sym(text.into()),
        }
    }

    /// The textual form of this symbol, as used in records.
    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Epsilon => EPSILON_TEXT,
            Symbol::Pad => PAD_TEXT,
            Symbol::Sym(s) => s,
        }
    }

    /// Whether this is the epsilon symbol.
    #[inline(always)]
    pub fn is_epsilon(&self) -> bool {
        matches!(self, Symbol::Epsilon)
    }

    /// Whether this is the padding symbol.
    #[inline(always)]
    pub fn is_pad(&self) -> bool {
        matches!(self, Symbol::Pad)
    }
}

impl From<char> for Symbol {
    fn from(ch: char) -> Symbol {
        let mut buf = [0u8; 4];
        Symbol::Sym(SmolStr::new(ch.encode_utf8(&mut buf)))
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alignment edge: an input-side and an output-side symbol.
///
/// Alignments never contain an epsilon–epsilon edge; the feature
/// extractor inserts the epsilon pair deliberately as a separator
/// marker during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolPair {
    /// Input-level symbol.
    pub input: Symbol,
    /// Output-level symbol.
    pub output: Symbol,
}

impl SymbolPair {
    /// Creates an alignment edge.
    pub fn new(input: Symbol, output: Symbol) -> SymbolPair {
        SymbolPair { input, output }
    }

    /// The padding pair bracketing aligned sequences.
    pub fn pad() -> SymbolPair {
        SymbolPair::new(Symbol::Pad, Symbol::Pad)
    }

    /// The synthetic separator pair inserted between adjacent
    /// substitutions during feature normalization.
    pub fn separator() -> SymbolPair {
        SymbolPair::new(Symbol::Epsilon, Symbol::Epsilon)
    }

    /// Whether this edge inserts output without consuming input.
    #[inline(always)]
    pub fn is_insertion(&self) -> bool {
        self.input.is_epsilon()
    }

    /// Whether this is the padding pair.
    #[inline(always)]
    pub fn is_pad(&self) -> bool {
        self.input.is_pad() && self.output.is_pad()
    }
}

/// An ordered sequence of symbol pairs, always beginning and ending
/// with the padding pair. Immutable once produced by the aligner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedSequence(Vec<SymbolPair>);

impl AlignedSequence {
    /// Brackets a raw alignment path with padding pairs.
    pub fn bracketed(path: Vec<SymbolPair>) -> AlignedSequence {
        let mut pairs = Vec::with_capacity(path.len() + 2);
        pairs.push(SymbolPair::pad());
        pairs.extend(path);
        pairs.push(SymbolPair::pad());
        AlignedSequence(pairs)
    }

    /// Wraps an already-bracketed pair sequence, as read back from an
    /// alignment record.
    pub(crate) fn from_pairs(pairs: Vec<SymbolPair>) -> AlignedSequence {
        AlignedSequence(pairs)
    }

    /// The pairs, padding included.
    pub fn pairs(&self) -> &[SymbolPair] {
        &self.0
    }

    /// Number of pairs, padding included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence has no pairs at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tokenizes a string into one symbol per character.
pub fn tokenize(s: &str) -> Vec<Symbol> {
    s.chars().map(Symbol::from).collect()
}
