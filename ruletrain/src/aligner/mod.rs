//! Iterative character-level alignment of string pairs.
//!
//! Alignment quality depends on the substitution cost model, and the
//! cost model can only be estimated from alignments, so the two are
//! bootstrapped: the first pass aligns under plain edit distance, every
//! later pass re-estimates per-pair substitution weights from the
//! previous pass's alignments and realigns the whole corpus. The
//! cost-model rebuild is the synchronization barrier between passes;
//! within a pass, per-pair alignment is read-only with respect to the
//! model.

use hashbrown::HashMap;
use log::info;

use crate::corpus::StringPair;
use crate::engine::{EngineError, TransducerEngine};
use crate::escape::EscapeTable;
use crate::symbol::{tokenize, AlignedSequence, Symbol, SymbolPair};
use crate::types::{fmt_weight, round_to, Weight};

/// Substitution pairs costlier than this are left to the fallback
/// terms.
const MAX_WEIGHT: Weight = 0.95;

/// Configuration for the alignment loop.
#[derive(Debug, Clone, Copy)]
pub struct AlignerConfig {
    /// Number of re-estimation passes over the corpus.
    pub iterations: usize,
    /// Minimum corpus support for a substitution pair to be costed.
    pub smoothing: u64,
}

impl AlignerConfig {
    /// The defaults used by the training pipeline.
    pub const fn default() -> AlignerConfig {
        AlignerConfig {
            iterations: 6,
            smoothing: 3,
        }
    }
}

/// Aligns a corpus of string pairs under an iteratively re-estimated
/// substitution cost model.
pub struct Aligner<E: TransducerEngine> {
    engine: E,
    config: AlignerConfig,
    escapes: EscapeTable,
}

impl<E: TransducerEngine> Aligner<E> {
    /// Creates an aligner with default configuration.
    pub fn new(engine: E) -> Aligner<E> {
        Aligner::with_config(engine, AlignerConfig::default())
    }

    /// Creates an aligner with the given configuration.
    pub fn with_config(engine: E, config: AlignerConfig) -> Aligner<E> {
        Aligner {
            engine,
            config,
            escapes: EscapeTable::aligner(),
        }
    }

    /// The engine this aligner drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Aligns every pair, re-estimating the cost model between passes,
    /// and returns the alignments from the final pass.
    pub fn align_corpus(
        &self,
        pairs: &[StringPair],
    ) -> Result<Vec<AlignedSequence>, EngineError> {
        let mut spec = initial_cost_model();
        let mut aligned = Vec::new();
        for iteration in 0..self.config.iterations.max(1) {
            info!("Aligning strings, iteration {}...", iteration + 1);
            let model = self.engine.compile_cost_model(&spec)?;
            aligned = pairs
                .iter()
                .map(|(input, output)| self.align_pair(&model, input, output))
                .collect::<Result<Vec<_>, _>>()?;
            let weights = estimate_weights(&aligned, self.config.smoothing);
            spec = cost_model_spec(&weights, &self.escapes);
        }
        info!("{} string pairs aligned in total.", aligned.len());
        Ok(aligned)
    }

    fn align_pair(
        &self,
        model: &E::Fst,
        input: &str,
        output: &str,
    ) -> Result<AlignedSequence, EngineError> {
        let tr1 = self.engine.compile_string(&tokenize(input))?;
        let tr2 = self.engine.compile_string(&tokenize(output))?;
        let lattice = self.engine.compose(&self.engine.compose(&tr1, model)?, &tr2)?;
        let path = self.engine.best_path(&lattice)?;
        Ok(AlignedSequence::bracketed(path))
    }
}

/// Estimates substitution weights from one pass's alignments:
/// `w(s1,s2) = 1 - freq(s1,s2)/freq(s1)`. A pair is accepted as an
/// explicit cost term only with weight below [`MAX_WEIGHT`], corpus
/// support of at least `smoothing`, and a non-epsilon input (insertions
/// are never costed context-free). Sorted for deterministic emission.
pub(crate) fn estimate_weights(
    aligned: &[AlignedSequence],
    smoothing: u64,
) -> Vec<(SymbolPair, Weight)> {
    let mut freqs: HashMap<&SymbolPair, u64> = HashMap::new();
    let mut totals: HashMap<&Symbol, u64> = HashMap::new();
    for sequence in aligned {
        for pair in sequence.pairs() {
            *freqs.entry(pair).or_insert(0) += 1;
            *totals.entry(&pair.input).or_insert(0) += 1;
        }
    }

    let mut weights: Vec<(SymbolPair, Weight)> = freqs
        .into_iter()
        .filter_map(|(pair, freq)| {
            let weight = 1.0 - freq as Weight / totals[&pair.input] as Weight;
            if weight < MAX_WEIGHT && freq >= smoothing && !pair.input.is_epsilon() {
                Some((pair.clone(), weight))
            } else {
                None
            }
        })
        .collect();
    weights.sort_by(|a, b| a.0.cmp(&b.0));
    weights
}

/// Renders a cost model as the parallel-substitution specification the
/// engine compiles: the explicit weighted pairs followed by the default
/// fallback terms (identity free, substitution and insertion/deletion
/// at cost one).
pub(crate) fn cost_model_spec(weights: &[(SymbolPair, Weight)], escapes: &EscapeTable) -> String {
    let mut regex = String::from("[ ");
    for (pair, weight) in weights {
        regex.push_str(&format!(
            "{}:{}::{} | ",
            escapes.escape(&pair.input),
            escapes.escape(&pair.output),
            fmt_weight(round_to(*weight, 4)),
        ));
    }
    regex.push_str("?::0.00 | ?:?::1.00 | ?:0::1.00 | 0:?::1.00 | 0:0::0.00 ]*");
    regex
}

/// The alignment-free prior: plain edit distance.
pub fn initial_cost_model() -> String {
    cost_model_spec(&[], &EscapeTable::aligner())
}
