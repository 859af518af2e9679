//! The transducer-engine boundary.
//!
//! The training core never manipulates automaton internals. Everything
//! it needs from a weighted finite-state engine is expressed by the
//! [`TransducerEngine`] capability trait, so a full external engine and
//! the in-memory reference implementation in [`mem`] are
//! interchangeable. Engine failures are fatal to a run: rule sets are
//! only meaningful if fully compiled, so there is no partial-result
//! recovery.

pub mod mem;

use crate::symbol::{Symbol, SymbolPair};

/// Error from the transducer engine. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A textual specification the engine cannot compile.
    #[error("cannot compile specification: {0}")]
    BadSpec(String),
    /// The automaton accepts nothing, so no best path exists.
    #[error("automaton has no accepting path")]
    NoPath,
    /// A best path still carried an unbound wildcard label.
    #[error("best path contains an unresolved wildcard label")]
    UnresolvedWildcard,
}

/// Capabilities the training core requires of a weighted finite-state
/// engine over the tropical (min-plus) semiring.
pub trait TransducerEngine {
    /// The engine's automaton handle.
    type Fst;

    /// Compiles a textual weighted parallel-substitution cost model.
    fn compile_cost_model(&self, spec: &str) -> Result<Self::Fst, EngineError>;

    /// Compiles a single-path automaton accepting exactly the given
    /// symbol sequence.
    fn compile_string(&self, symbols: &[Symbol]) -> Result<Self::Fst, EngineError>;

    /// Standard automaton composition. Associative, not commutative.
    fn compose(&self, a: &Self::Fst, b: &Self::Fst) -> Result<Self::Fst, EngineError>;

    /// Extracts the single lowest-total-weight accepting path. Ties are
    /// broken by the engine's internal deterministic order.
    fn best_path(&self, fst: &Self::Fst) -> Result<Vec<SymbolPair>, EngineError>;

    /// Minimizes (or at least trims) an automaton.
    fn minimize(&self, fst: Self::Fst) -> Result<Self::Fst, EngineError>;

    /// Number of states, used by the composition scheduler to order
    /// merges.
    fn state_count(&self, fst: &Self::Fst) -> usize;
}
