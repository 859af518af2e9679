//! Composition scheduling for compiled rule transducers.
//!
//! Rules are serialized so that they can be compiled separately and
//! composed afterwards, which is cheaper than compiling one monolithic
//! rule set. The scheduler always merges the two currently smallest
//! automata, keeping intermediate results small.

use log::{debug, info};

use crate::constants::EPSILON_MARK;
use crate::engine::{EngineError, TransducerEngine};

/// A compiled rule transducer tagged with its batch.
#[derive(Debug)]
pub struct CompiledRule<F> {
    /// The compiled rule automaton.
    pub fst: F,
    /// Whether the rule rewrites the epsilon slot and therefore needs
    /// the slot-expansion transducer applied before it.
    pub insertion: bool,
}

/// Whether a serialized rule rewrites the epsilon slot. The rule
/// serializer always leads with the substituted symbol.
pub fn is_insertion_rule(regex: &str) -> bool {
    regex.starts_with(EPSILON_MARK)
}

/// Greedily composes a batch into a single automaton, merging the two
/// currently smallest and trimming each intermediate. Returns `None`
/// for an empty batch.
pub fn schedule<E: TransducerEngine>(
    engine: &E,
    mut batch: Vec<E::Fst>,
) -> Result<Option<E::Fst>, EngineError> {
    while batch.len() > 1 {
        batch.sort_by_key(|fst| engine.state_count(fst));
        let first = batch.remove(0);
        let second = batch.remove(0);
        debug!(
            "Composing transducers with {} and {} states...",
            engine.state_count(&first),
            engine.state_count(&second)
        );
        let merged = engine.minimize(engine.compose(&first, &second)?)?;
        batch.push(merged);
    }
    Ok(batch.pop())
}

/// Applies a compiled rule set to `base`: the plain substitution rules
/// first, then, when insertion rules exist, the caller's
/// slot-expansion transducer followed by the insertion rules.
pub fn compose_rules<E: TransducerEngine>(
    engine: &E,
    base: E::Fst,
    rules: Vec<CompiledRule<E::Fst>>,
    expander: Option<&E::Fst>,
) -> Result<E::Fst, EngineError> {
    let (insertions, substitutions): (Vec<_>, Vec<_>) =
        rules.into_iter().partition(|rule| rule.insertion);
    info!(
        "Composing {} substitution and {} insertion rules...",
        substitutions.len(),
        insertions.len()
    );

    let mut result = base;
    let batch = substitutions.into_iter().map(|rule| rule.fst).collect();
    if let Some(merged) = schedule(engine, batch)? {
        result = engine.compose(&result, &merged)?;
    }
    if !insertions.is_empty() {
        if let Some(expander) = expander {
            result = engine.compose(&result, expander)?;
        }
        let batch = insertions.into_iter().map(|rule| rule.fst).collect();
        if let Some(merged) = schedule(engine, batch)? {
            result = engine.compose(&result, &merged)?;
        }
    }
    engine.minimize(result)
}
