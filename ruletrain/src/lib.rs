/*! Training of weighted rewrite rules for finite-state transduction.

Learns a weighted, context-sensitive character-substitution model from a
corpus of paired strings (spelling variants, transliteration pairs,
grapheme–phoneme pairs). Produces two artifacts for a weighted
finite-state engine such as [`HFST`]:

* character-level alignments between each string pair, and
* a compact set of weighted, context-conditioned parallel replace rules
  generalizing those alignments.

The pipeline has three corpus-level stages plus a scheduling step:

1. [`aligner`] — iterative re-estimation of substitution costs and
   lowest-cost alignment of every string pair,
2. [`features`] — windowed context-feature extraction from the aligned
   pairs,
3. [`rules`] — induction of a minimal, mutually exclusive weighted rule
   set from the feature multiset,
4. [`compose`] — a greedy smallest-first schedule for composing the
   independently compiled rule transducers into one.

Automaton internals stay behind the [`engine::TransducerEngine`]
capability trait; [`engine::mem`] provides an in-memory reference
implementation good enough to drive the alignment loop and to test the
composition scheduler without an external engine.

[`HFST`]: https://hfst.github.io
*/

#![warn(missing_docs)]

pub mod aligner;
pub mod compose;
pub mod corpus;
pub mod engine;
pub mod escape;
pub mod features;
pub mod record;
pub mod rules;
pub mod symbol;
pub mod types;

pub(crate) mod constants;
