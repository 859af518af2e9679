//! In-memory reference engine.
//!
//! A small weighted automaton implementation that understands exactly
//! as much as the training core needs: the parallel-substitution
//! cost-model format emitted by the aligner, single-path string
//! automata, epsilon-aware composition with wildcard binding, and
//! 1-best path extraction over non-negative tropical weights. It is not
//! a general finite-state library; a production deployment points the
//! same trait at a full engine.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};

use crate::symbol::{Symbol, SymbolPair};
use crate::types::Weight;

use super::{EngineError, TransducerEngine};

/// Arc label: a concrete symbol, epsilon, or an unbound wildcard
/// (written `?` in the cost-model format). Wildcards are bound to
/// concrete symbols during composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Label {
    Epsilon,
    Any,
    Sym(Symbol),
}

impl Label {
    fn from_symbol(symbol: Symbol) -> Label {
        if symbol.is_epsilon() {
            Label::Epsilon
        } else {
            Label::Sym(symbol)
        }
    }

    fn to_symbol(&self) -> Result<Symbol, EngineError> {
        match self {
            Label::Epsilon => Ok(Symbol::Epsilon),
            Label::Sym(s) => Ok(s.clone()),
            Label::Any => Err(EngineError::UnresolvedWildcard),
        }
    }
}

#[derive(Debug, Clone)]
struct Arc {
    input: Label,
    output: Label,
    weight: Weight,
    /// Input and output wildcards must bind to the same symbol
    /// (the `?::w` identity term).
    identity: bool,
    target: usize,
}

/// A weighted automaton over symbol-pair arcs.
#[derive(Debug, Clone)]
pub struct Fst {
    arcs: Vec<Vec<Arc>>,
    finals: Vec<Option<Weight>>,
    start: usize,
}

impl Fst {
    /// An automaton with `states` arc-less states.
    pub fn new(states: usize, start: usize) -> Fst {
        Fst {
            arcs: vec![Vec::new(); states],
            finals: vec![None; states],
            start,
        }
    }

    /// Adds an arc with concrete (or epsilon) labels.
    pub fn add_arc(&mut self, from: usize, input: Symbol, output: Symbol, weight: Weight, to: usize) {
        self.arcs[from].push(Arc {
            input: Label::from_symbol(input),
            output: Label::from_symbol(output),
            weight,
            identity: false,
            target: to,
        });
    }

    /// Marks a state as accepting with the given final weight.
    pub fn set_final(&mut self, state: usize, weight: Weight) {
        self.finals[state] = Some(weight);
    }

    fn add_state(&mut self) -> usize {
        self.arcs.push(Vec::new());
        self.finals.push(None);
        self.arcs.len() - 1
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.arcs.len()
    }
}

/// The reference engine. Stateless; all data lives in the automata.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryEngine;

impl MemoryEngine {
    /// Creates a reference engine.
    pub fn new() -> MemoryEngine {
        MemoryEngine
    }
}

// ---- cost-model parsing ----

fn parse_token(term: &str) -> Result<(Label, &str), EngineError> {
    let bad = || EngineError::BadSpec(term.to_string());
    let mut chars = term.chars();
    match chars.next().ok_or_else(bad)? {
        '?' => Ok((Label::Any, &term[1..])),
        '0' => Ok((Label::Epsilon, &term[1..])),
        '%' => match chars.next() {
            Some('"') => Ok((Label::Sym(Symbol::Sym("\"".into())), &term[2..])),
            _ => Err(bad()),
        },
        '"' => {
            let end = term[1..].find('"').ok_or_else(bad)? + 1;
            let content = &term[1..end];
            let symbol = match content {
                "\\\\" => Symbol::Sym("\\".into()),
                _ => Symbol::new(&format!("\"{}\"", content)),
            };
            Ok((Label::Sym(symbol), &term[end + 1..]))
        }
        '{' => {
            let end = term.find('}').ok_or_else(bad)?;
            Ok((Label::Sym(Symbol::new(&term[1..end])), &term[end + 1..]))
        }
        _ => Err(bad()),
    }
}

fn parse_term(term: &str) -> Result<(Label, Label, bool, Weight), EngineError> {
    let bad = || EngineError::BadSpec(term.to_string());
    let (first, rest) = parse_token(term)?;
    let (input, output, identity, rest) = if let Some(rest) = rest.strip_prefix("::") {
        // `X::w` keeps both sides identical; with a wildcard the
        // binding is deferred to composition.
        let identity = first == Label::Any;
        (first.clone(), first, identity, rest)
    } else if let Some(rest) = rest.strip_prefix(':') {
        let (second, rest) = parse_token(rest)?;
        let rest = rest.strip_prefix("::").ok_or_else(bad)?;
        (first, second, false, rest)
    } else {
        return Err(bad());
    };
    let weight: Weight = rest.trim().parse().map_err(|_| bad())?;
    Ok((input, output, identity, weight))
}

fn parse_cost_model(spec: &str) -> Result<Fst, EngineError> {
    let inner = spec
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix("]*"))
        .ok_or_else(|| EngineError::BadSpec(spec.to_string()))?
        .trim();

    let mut fst = Fst::new(1, 0);
    fst.set_final(0, 0.0);

    for term in inner.split(" | ") {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let (input, output, identity, weight) = parse_term(term)?;
        // The epsilon-epsilon term is a no-op loop and is forbidden in
        // alignments, so it never becomes an arc.
        if input == Label::Epsilon && output == Label::Epsilon {
            continue;
        }
        fst.arcs[0].push(Arc {
            input,
            output,
            weight,
            identity,
            target: 0,
        });
    }
    Ok(fst)
}

// ---- composition ----

fn match_labels(a_out: &Label, b_in: &Label) -> Option<Option<Symbol>> {
    match (a_out, b_in) {
        (Label::Sym(x), Label::Sym(y)) if x == y => Some(Some(x.clone())),
        (Label::Sym(x), Label::Any) => Some(Some(x.clone())),
        (Label::Any, Label::Sym(y)) => Some(Some(y.clone())),
        (Label::Any, Label::Any) => Some(None),
        _ => None,
    }
}

fn resolve(label: &Label, identity: bool, binding: &Option<Symbol>) -> Label {
    match (label, binding) {
        (Label::Any, Some(symbol)) if identity => Label::Sym(symbol.clone()),
        _ => label.clone(),
    }
}

fn intern(
    index: &mut HashMap<(usize, usize), usize>,
    queue: &mut Vec<(usize, usize)>,
    fst: &mut Fst,
    pair: (usize, usize),
) -> usize {
    if let Some(&id) = index.get(&pair) {
        return id;
    }
    let id = fst.add_state();
    index.insert(pair, id);
    queue.push(pair);
    id
}

fn compose_fst(a: &Fst, b: &Fst) -> Fst {
    let mut fst = Fst::new(0, 0);
    let mut index: HashMap<(usize, usize), usize> = HashMap::new();
    let mut queue: Vec<(usize, usize)> = Vec::new();

    if a.arcs.is_empty() || b.arcs.is_empty() {
        return fst;
    }

    let start = intern(&mut index, &mut queue, &mut fst, (a.start, b.start));
    fst.start = start;

    while let Some((i, j)) = queue.pop() {
        let state = index[&(i, j)];

        if let (Some(wa), Some(wb)) = (a.finals[i], b.finals[j]) {
            fst.finals[state] = Some(wa + wb);
        }

        // A moves alone on epsilon output.
        for arc in &a.arcs[i] {
            if arc.output == Label::Epsilon {
                let target = intern(&mut index, &mut queue, &mut fst, (arc.target, j));
                fst.arcs[state].push(Arc {
                    input: arc.input.clone(),
                    output: Label::Epsilon,
                    weight: arc.weight,
                    identity: false,
                    target,
                });
            }
        }

        // B moves alone on epsilon input.
        for arc in &b.arcs[j] {
            if arc.input == Label::Epsilon {
                let target = intern(&mut index, &mut queue, &mut fst, (i, arc.target));
                fst.arcs[state].push(Arc {
                    input: Label::Epsilon,
                    output: arc.output.clone(),
                    weight: arc.weight,
                    identity: false,
                    target,
                });
            }
        }

        // Matched moves.
        for a_arc in &a.arcs[i] {
            if a_arc.output == Label::Epsilon {
                continue;
            }
            for b_arc in &b.arcs[j] {
                if b_arc.input == Label::Epsilon {
                    continue;
                }
                let binding = match match_labels(&a_arc.output, &b_arc.input) {
                    Some(binding) => binding,
                    None => continue,
                };
                let input = resolve(&a_arc.input, a_arc.identity, &binding);
                let output = resolve(&b_arc.output, b_arc.identity, &binding);
                let identity = a_arc.identity
                    && b_arc.identity
                    && input == Label::Any
                    && output == Label::Any;
                let target = intern(&mut index, &mut queue, &mut fst, (a_arc.target, b_arc.target));
                fst.arcs[state].push(Arc {
                    input,
                    output,
                    weight: a_arc.weight + b_arc.weight,
                    identity,
                    target,
                });
            }
        }
    }

    fst
}

// ---- best path ----

#[derive(Debug, PartialEq)]
struct QueueEntry {
    weight: Weight,
    state: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .partial_cmp(&other.weight)
            .unwrap_or(Ordering::Equal)
            .then(self.state.cmp(&other.state))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn best_path_fst(fst: &Fst) -> Result<Vec<SymbolPair>, EngineError> {
    let n = fst.state_count();
    if n == 0 {
        return Err(EngineError::NoPath);
    }

    let mut dist = vec![Weight::INFINITY; n];
    let mut prev: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    dist[fst.start] = 0.0;
    heap.push(std::cmp::Reverse(QueueEntry {
        weight: 0.0,
        state: fst.start,
    }));

    while let Some(std::cmp::Reverse(entry)) = heap.pop() {
        if entry.weight > dist[entry.state] {
            continue;
        }
        for (idx, arc) in fst.arcs[entry.state].iter().enumerate() {
            let next = entry.weight + arc.weight;
            if next < dist[arc.target] {
                dist[arc.target] = next;
                prev[arc.target] = Some((entry.state, idx));
                heap.push(std::cmp::Reverse(QueueEntry {
                    weight: next,
                    state: arc.target,
                }));
            }
        }
    }

    let mut best: Option<(Weight, usize)> = None;
    for state in 0..n {
        if let Some(final_weight) = fst.finals[state] {
            if dist[state].is_finite() {
                let total = dist[state] + final_weight;
                let better = match best {
                    None => true,
                    Some((w, _)) => total < w,
                };
                if better {
                    best = Some((total, state));
                }
            }
        }
    }

    let (_, mut state) = best.ok_or(EngineError::NoPath)?;
    let mut path = Vec::new();
    while let Some((from, idx)) = prev[state] {
        let arc = &fst.arcs[from][idx];
        path.push(SymbolPair::new(
            arc.input.to_symbol()?,
            arc.output.to_symbol()?,
        ));
        state = from;
    }
    path.reverse();
    Ok(path)
}

// ---- trimming ----

fn trim(fst: Fst) -> Fst {
    let n = fst.state_count();
    if n == 0 {
        return fst;
    }

    let mut forward = HashSet::new();
    let mut stack = vec![fst.start];
    while let Some(state) = stack.pop() {
        if forward.insert(state) {
            for arc in &fst.arcs[state] {
                stack.push(arc.target);
            }
        }
    }

    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (state, arcs) in fst.arcs.iter().enumerate() {
        for arc in arcs {
            reverse[arc.target].push(state);
        }
    }
    let mut backward = HashSet::new();
    let mut stack: Vec<usize> = (0..n).filter(|s| fst.finals[*s].is_some()).collect();
    while let Some(state) = stack.pop() {
        if backward.insert(state) {
            for &source in &reverse[state] {
                stack.push(source);
            }
        }
    }

    let keep: Vec<usize> = (0..n)
        .filter(|s| forward.contains(s) && backward.contains(s))
        .collect();
    if !keep.contains(&fst.start) {
        return Fst::new(0, 0);
    }

    let remap: HashMap<usize, usize> = keep.iter().enumerate().map(|(new, &old)| (old, new)).collect();
    let mut out = Fst::new(keep.len(), remap[&fst.start]);
    for &old in &keep {
        let new = remap[&old];
        out.finals[new] = fst.finals[old];
        for arc in &fst.arcs[old] {
            if let Some(&target) = remap.get(&arc.target) {
                let mut arc = arc.clone();
                arc.target = target;
                out.arcs[new].push(arc);
            }
        }
    }
    out
}

impl TransducerEngine for MemoryEngine {
    type Fst = Fst;

    fn compile_cost_model(&self, spec: &str) -> Result<Fst, EngineError> {
        parse_cost_model(spec)
    }

    fn compile_string(&self, symbols: &[Symbol]) -> Result<Fst, EngineError> {
        let mut fst = Fst::new(symbols.len() + 1, 0);
        for (i, symbol) in symbols.iter().enumerate() {
            fst.add_arc(i, symbol.clone(), symbol.clone(), 0.0, i + 1);
        }
        fst.set_final(symbols.len(), 0.0);
        Ok(fst)
    }

    fn compose(&self, a: &Fst, b: &Fst) -> Result<Fst, EngineError> {
        Ok(compose_fst(a, b))
    }

    fn best_path(&self, fst: &Fst) -> Result<Vec<SymbolPair>, EngineError> {
        best_path_fst(fst)
    }

    fn minimize(&self, fst: Fst) -> Result<Fst, EngineError> {
        Ok(trim(fst))
    }

    fn state_count(&self, fst: &Fst) -> usize {
        fst.state_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::initial_cost_model;
    use crate::symbol::tokenize;

    fn align(engine: &MemoryEngine, model: &Fst, a: &str, b: &str) -> Vec<SymbolPair> {
        let tr1 = engine.compile_string(&tokenize(a)).unwrap();
        let tr2 = engine.compile_string(&tokenize(b)).unwrap();
        let lattice = engine
            .compose(&engine.compose(&tr1, model).unwrap(), &tr2)
            .unwrap();
        engine.best_path(&lattice).unwrap()
    }

    #[test]
    fn parses_initial_model() {
        let fst = parse_cost_model(&initial_cost_model()).unwrap();
        assert_eq!(fst.state_count(), 1);
        // Four live terms; the epsilon-epsilon term is dropped.
        assert_eq!(fst.arcs[0].len(), 4);
    }

    #[test]
    fn identity_alignment_is_free() {
        let engine = MemoryEngine::new();
        let model = engine.compile_cost_model(&initial_cost_model()).unwrap();
        let path = align(&engine, &model, "cat", "cat");
        assert_eq!(path.len(), 3);
        for pair in path {
            assert_eq!(pair.input, pair.output);
        }
    }

    #[test]
    fn deletion_and_insertion() {
        let engine = MemoryEngine::new();
        let model = engine.compile_cost_model(&initial_cost_model()).unwrap();
        let path = align(&engine, &model, "abc", "ac");
        assert!(path
            .iter()
            .any(|p| p.input == Symbol::Sym("b".into()) && p.output.is_epsilon()));
        let path = align(&engine, &model, "ac", "abc");
        assert!(path
            .iter()
            .any(|p| p.input.is_epsilon() && p.output == Symbol::Sym("b".into())));
    }

    #[test]
    fn weighted_substitution_wins() {
        let engine = MemoryEngine::new();
        let model = engine
            .compile_cost_model(
                "[ {c}:{k}::0.1 | ?::0.00 | ?:?::1.00 | ?:0::1.00 | 0:?::1.00 | 0:0::0.00 ]*",
            )
            .unwrap();
        let path = align(&engine, &model, "cat", "kat");
        assert_eq!(
            path,
            vec![
                SymbolPair::new(Symbol::Sym("c".into()), Symbol::Sym("k".into())),
                SymbolPair::new(Symbol::Sym("a".into()), Symbol::Sym("a".into())),
                SymbolPair::new(Symbol::Sym("t".into()), Symbol::Sym("t".into())),
            ]
        );
    }

    #[test]
    fn no_accepting_path() {
        let engine = MemoryEngine::new();
        let tr1 = engine.compile_string(&tokenize("a")).unwrap();
        let tr2 = engine.compile_string(&tokenize("b")).unwrap();
        let composed = engine.compose(&tr1, &tr2).unwrap();
        assert!(matches!(
            engine.best_path(&composed),
            Err(EngineError::NoPath)
        ));
    }

    #[test]
    fn trim_removes_dead_states() {
        let mut fst = Fst::new(3, 0);
        fst.add_arc(0, Symbol::Sym("a".into()), Symbol::Sym("a".into()), 0.0, 1);
        // State 2 is unreachable.
        fst.add_arc(2, Symbol::Sym("b".into()), Symbol::Sym("b".into()), 0.0, 1);
        fst.set_final(1, 0.0);
        let engine = MemoryEngine::new();
        let trimmed = engine.minimize(fst).unwrap();
        assert_eq!(trimmed.state_count(), 2);
    }

    #[test]
    fn bad_spec_is_fatal() {
        let engine = MemoryEngine::new();
        assert!(engine.compile_cost_model("not a model").is_err());
        assert!(engine.compile_cost_model("[ x::nope ]*").is_err());
    }
}
