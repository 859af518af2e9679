//! Context-feature extraction from aligned string pairs.
//!
//! Before windowing, every aligned sequence is normalized: runs of
//! consecutive insertions are collapsed into a single compound
//! insertion, and a synthetic epsilon separator pair is inserted
//! between any two adjacent pairs that both consume input, so context
//! windows never treat adjacent substitutions as directly abutting
//! without an explicit boundary.

use log::info;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::symbol::{AlignedSequence, Symbol, SymbolPair};

/// One context window shape: how many input symbols to gather on each
/// side of the substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowShape {
    /// Length of the left-hand context.
    pub left: usize,
    /// Length of the right-hand context.
    pub right: usize,
}

impl WindowShape {
    /// Creates a window shape.
    pub const fn new(left: usize, right: usize) -> WindowShape {
        WindowShape { left, right }
    }
}

/// The six window shapes used by the trainer.
pub const DEFAULT_WINDOWS: [WindowShape; 6] = [
    WindowShape::new(0, 0),
    WindowShape::new(1, 0),
    WindowShape::new(1, 1),
    WindowShape::new(1, 2),
    WindowShape::new(2, 1),
    WindowShape::new(0, 1),
];

/// Configuration for feature extraction.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// The window shapes to slide over each sequence.
    pub windows: Vec<WindowShape>,
}

impl Default for FeatureConfig {
    fn default() -> FeatureConfig {
        FeatureConfig {
            windows: DEFAULT_WINDOWS.to_vec(),
        }
    }
}

/// One (substitution, left context, right context) observation.
/// Contexts hold input-side symbols only.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Feature {
    /// The observed substitution edge.
    pub pair: SymbolPair,
    /// Nearest input symbols to the left, innermost last.
    pub left: Vec<Symbol>,
    /// Nearest input symbols to the right, innermost first.
    pub right: Vec<Symbol>,
}

/// Collapses each run of consecutive insertions into its final pair,
/// whose output becomes one compound space-joined symbol.
pub fn collapse_insertions(pairs: &[SymbolPair]) -> Vec<SymbolPair> {
    if pairs.is_empty() {
        return Vec::new();
    }
    let mut collapsed = Vec::with_capacity(pairs.len());
    let mut pending = String::new();
    for i in 0..pairs.len() - 1 {
        let pair = &pairs[i];
        if pair.input.is_epsilon() && pairs[i + 1].input.is_epsilon() {
            pending.push_str(pair.output.as_str());
            pending.push(' ');
        } else if pending.is_empty() {
            collapsed.push(pair.clone());
        } else {
            pending.push_str(pair.output.as_str());
            collapsed.push(SymbolPair::new(
                pair.input.clone(),
                Symbol::Sym(SmolStr::new(&pending)),
            ));
            pending.clear();
        }
    }
    collapsed.push(pairs[pairs.len() - 1].clone());
    collapsed
}

/// Inserts the epsilon separator pair between adjacent pairs that both
/// consume input.
pub fn add_separators(pairs: &[SymbolPair]) -> Vec<SymbolPair> {
    if pairs.is_empty() {
        return Vec::new();
    }
    let mut separated = Vec::with_capacity(pairs.len() * 2);
    for i in 0..pairs.len() - 1 {
        separated.push(pairs[i].clone());
        if !pairs[i].input.is_epsilon() && !pairs[i + 1].input.is_epsilon() {
            separated.push(SymbolPair::separator());
        }
    }
    separated.push(pairs[pairs.len() - 1].clone());
    separated
}

/// Normalizes an aligned sequence for windowing.
pub fn normalize(sequence: &AlignedSequence) -> Vec<SymbolPair> {
    add_separators(&collapse_insertions(sequence.pairs()))
}

/// Slides every window shape over the interior of a normalized
/// sequence. A feature is emitted when both sides have enough
/// non-epsilon-input neighbors; a zero-length side always yields the
/// empty context.
pub fn extract(pairs: &[SymbolPair], windows: &[WindowShape]) -> Vec<Feature> {
    let mut features = Vec::new();
    for i in 1..pairs.len().saturating_sub(1) {
        let left_pool: Vec<&SymbolPair> = pairs[..i]
            .iter()
            .filter(|p| !p.input.is_epsilon())
            .collect();
        let right_pool: Vec<&SymbolPair> = pairs[i + 1..]
            .iter()
            .filter(|p| !p.input.is_epsilon())
            .collect();
        for window in windows {
            if left_pool.len() < window.left || right_pool.len() < window.right {
                continue;
            }
            let left = left_pool[left_pool.len() - window.left..]
                .iter()
                .map(|p| p.input.clone())
                .collect();
            let right = right_pool[..window.right]
                .iter()
                .map(|p| p.input.clone())
                .collect();
            features.push(Feature {
                pair: pairs[i].clone(),
                left,
                right,
            });
        }
    }
    features
}

/// Extracts the corpus-wide feature multiset, sorted for deterministic
/// downstream processing.
pub fn extract_corpus(aligned: &[AlignedSequence], config: &FeatureConfig) -> Vec<Feature> {
    info!("Extracting features...");
    let mut features = Vec::new();
    for sequence in aligned {
        features.extend(extract(&normalize(sequence), &config.windows));
    }
    features.sort();
    info!("{} features extracted in total.", features.len());
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn pair(input: &str, output: &str) -> SymbolPair {
        SymbolPair::new(sym(input), sym(output))
    }

    fn eps_pair(output: &str) -> SymbolPair {
        SymbolPair::new(Symbol::Epsilon, sym(output))
    }

    #[test]
    fn collapses_insertion_runs() {
        let pairs = vec![
            SymbolPair::pad(),
            eps_pair("x"),
            eps_pair("y"),
            pair("a", "b"),
            SymbolPair::pad(),
        ];
        let collapsed = collapse_insertions(&pairs);
        assert_eq!(
            collapsed,
            vec![
                SymbolPair::pad(),
                SymbolPair::new(Symbol::Epsilon, sym("x y")),
                pair("a", "b"),
                SymbolPair::pad(),
            ]
        );
    }

    #[test]
    fn separators_between_substitutions() {
        let pairs = vec![SymbolPair::pad(), pair("a", "b"), pair("c", "d"), SymbolPair::pad()];
        let separated = add_separators(&pairs);
        assert_eq!(separated.len(), 7);
        assert_eq!(separated[1], SymbolPair::separator());
        assert_eq!(separated[3], SymbolPair::separator());
        assert_eq!(separated[5], SymbolPair::separator());
        // No separator next to an insertion.
        let pairs = vec![SymbolPair::pad(), pair("a", "b"), eps_pair("x"), SymbolPair::pad()];
        let separated = add_separators(&pairs);
        assert_eq!(
            separated,
            vec![
                SymbolPair::pad(),
                SymbolPair::separator(),
                pair("a", "b"),
                eps_pair("x"),
                SymbolPair::pad(),
            ]
        );
    }

    #[test]
    fn context_free_window_on_cat_kat() {
        let seq = AlignedSequence::bracketed(vec![
            pair("c", "k"),
            pair("a", "a"),
            pair("t", "t"),
        ]);
        let features = extract(&normalize(&seq), &[WindowShape::new(0, 0)]);
        assert!(features.contains(&Feature {
            pair: pair("c", "k"),
            left: vec![],
            right: vec![],
        }));
    }

    #[test]
    fn windows_skip_epsilon_neighbors_and_count_pads() {
        let seq = AlignedSequence::bracketed(vec![
            pair("c", "k"),
            eps_pair("x"),
            pair("t", "t"),
        ]);
        let features = extract(&normalize(&seq), &[WindowShape::new(1, 1)]);
        // The insertion's neighbors skip the separator and reach the
        // real input symbols; pads are ordinary context symbols.
        assert!(features.contains(&Feature {
            pair: eps_pair("x"),
            left: vec![sym("c")],
            right: vec![sym("t")],
        }));
        assert!(features.contains(&Feature {
            pair: pair("c", "k"),
            left: vec![Symbol::Pad],
            right: vec![sym("t")],
        }));
    }

    #[test]
    fn zero_side_never_blocks() {
        let seq = AlignedSequence::bracketed(vec![pair("c", "k")]);
        let features = extract(&normalize(&seq), &[WindowShape::new(0, 1)]);
        assert!(features.contains(&Feature {
            pair: pair("c", "k"),
            left: vec![],
            right: vec![Symbol::Pad],
        }));
        // Separator positions observe features too.
        assert!(features.contains(&Feature {
            pair: SymbolPair::separator(),
            left: vec![],
            right: vec![sym("c")],
        }));
    }

    #[test]
    fn insufficient_context_emits_nothing() {
        let seq = AlignedSequence::bracketed(vec![pair("c", "k")]);
        // Two symbols of left context don't exist left of the
        // substitution inside a single pad.
        let features = extract(&normalize(&seq), &[WindowShape::new(2, 1)]);
        assert!(!features.iter().any(|f| f.pair == pair("c", "k")));
    }

    #[test]
    fn corpus_output_is_sorted() {
        let seqs = vec![
            AlignedSequence::bracketed(vec![pair("t", "t")]),
            AlignedSequence::bracketed(vec![pair("a", "a")]),
        ];
        let features = extract_corpus(&seqs, &FeatureConfig::default());
        let mut sorted = features.clone();
        sorted.sort();
        assert_eq!(features, sorted);
    }
}
