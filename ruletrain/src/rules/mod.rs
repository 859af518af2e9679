//! Induction of weighted parallel replace rules from context features.
//!
//! The target representation applies every rule in one simultaneous,
//! non-ordered rewrite pass, so priority between overlapping rules
//! cannot be expressed by ordering. Instead, each rule's trigger is
//! made mutually exclusive with every more specific rule's trigger:
//! identically-behaving specializations are eliminated outright
//! (generalization), and where a more specific rule behaves
//! differently, its one-symbol context excess becomes a negative
//! context of the general rule.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
use itertools::Itertools;
use log::{debug, info};
use smol_str::SmolStr;

use crate::constants::{DOT_MARK, EPSILON_MARK, SEPARATOR_MARK};
use crate::escape::EscapeTable;
use crate::features::Feature;
use crate::symbol::Symbol;
use crate::types::{fmt_weight, round_to, Weight};

/// Configuration for rule induction.
#[derive(Debug, Clone, Copy)]
pub struct InductionConfig {
    /// Minimum corpus frequency for a feature to be kept.
    pub threshold: u64,
}

impl InductionConfig {
    /// The default threshold accepts every observed feature.
    pub const fn default() -> InductionConfig {
        InductionConfig { threshold: 1 }
    }
}

/// The positive trigger of a rule: input symbol plus its left and
/// right input-side contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    /// Substituted input symbol.
    pub input: Symbol,
    /// Left-hand context, innermost last.
    pub left: Vec<Symbol>,
    /// Right-hand context, innermost first.
    pub right: Vec<Symbol>,
}

impl RuleKey {
    /// Context signature used for textual subsumption tests: left
    /// context, substituted symbol and right context concatenated with
    /// explicit boundary markers around the substitution point.
    fn signature(&self) -> String {
        let mut text = String::new();
        for symbol in &self.left {
            text.push_str(symbol.as_str());
        }
        text.push('|');
        text.push_str(self.input.as_str());
        text.push('|');
        for symbol in &self.right {
            text.push_str(symbol.as_str());
        }
        text
    }

    fn context_len(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

/// Output alternatives of one rule: candidate output symbol to
/// information cost, `-log10(p)` rounded to three decimals. Weight 0
/// means the context deterministically yields that output.
pub type Distribution = BTreeMap<Symbol, Weight>;

/// A weighted, context-conditioned rewrite rule with negative
/// contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRule {
    /// Positive trigger.
    pub key: RuleKey,
    /// Weighted output alternatives.
    pub outputs: Distribution,
    /// Symbol texts that must not appear immediately left of the
    /// trigger. Deduplicated, sorted.
    pub exclude_left: Vec<SmolStr>,
    /// Symbol texts that must not appear immediately right of the
    /// trigger. Deduplicated, sorted.
    pub exclude_right: Vec<SmolStr>,
}

/// A pairwise non-redundant set of weighted rules, sorted by key.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<WeightedRule>,
}

impl RuleSet {
    /// The rules, in key order.
    pub fn rules(&self) -> &[WeightedRule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Serializes the set as parallel replace-rule regexes for the
    /// engine, one rule per line joined with the continuation mark,
    /// sorted for determinism.
    pub fn to_regex(&self, escapes: &EscapeTable) -> String {
        let mut rules: Vec<String> = self
            .rules
            .iter()
            .map(|rule| rule_regex(rule, escapes))
            .collect();
        rules.sort();
        info!("Total number of rules: {}", rules.len());
        let regex = rules.join(" ,,\n") + " ;";
        // A trailing context slot before a rule boundary is vacuous.
        let vacuous = format!("{} [? - {}]* ,,", DOT_MARK, SEPARATOR_MARK);
        regex.replace(&vacuous, ",,")
    }
}

/// Induces a rule set from the corpus-wide feature multiset.
pub fn induce(features: &[Feature], config: &InductionConfig) -> RuleSet {
    debug!("Writing replace rules, threshold: {}...", config.threshold);
    let weights = weight_groups(features, config.threshold);
    // Generalization can cascade: removing one rule can expose a
    // second-order subsumption, so the pass runs twice.
    let weights = generalize(generalize(weights));
    let exclusions = derive_exclusions(&weights);
    let weights = remove_retentions(weights);

    let rules = weights
        .into_iter()
        .map(|(key, outputs)| {
            let (exclude_left, exclude_right) =
                exclusions.get(&key).cloned().unwrap_or_default();
            WeightedRule {
                key,
                outputs,
                exclude_left,
                exclude_right,
            }
        })
        .collect();
    RuleSet { rules }
}

fn rule_key(feature: &Feature) -> RuleKey {
    RuleKey {
        input: feature.pair.input.clone(),
        left: feature.left.clone(),
        right: feature.right.clone(),
    }
}

/// Counts features, prunes below-threshold and context-free-insertion
/// features, and converts each surviving context group into a weighted
/// output distribution.
fn weight_groups(features: &[Feature], threshold: u64) -> BTreeMap<RuleKey, Distribution> {
    let mut freqs: HashMap<&Feature, u64> = HashMap::new();
    for feature in features {
        *freqs.entry(feature).or_insert(0) += 1;
    }
    freqs.retain(|feature, freq| {
        *freq >= threshold
            // An insertion with zero context is not a reproducible
            // rule.
            && !(feature.pair.input.is_epsilon()
                && feature.left.is_empty()
                && feature.right.is_empty())
    });

    let mut sums: HashMap<RuleKey, u64> = HashMap::new();
    for (feature, freq) in &freqs {
        *sums.entry(rule_key(feature)).or_insert(0) += freq;
    }

    let mut weights: BTreeMap<RuleKey, Distribution> = BTreeMap::new();
    for (feature, freq) in &freqs {
        let key = rule_key(feature);
        let weight = -((*freq as Weight) / (sums[&key] as Weight)).log10();
        weights
            .entry(key)
            .or_default()
            .insert(feature.pair.output.clone(), round_to(weight, 3).abs());
    }
    weights
}

/// Eliminates every rule whose context strictly contains another
/// rule's context around the same substitution point while yielding an
/// identical output distribution: the less specific rule already
/// covers it.
fn generalize(weights: BTreeMap<RuleKey, Distribution>) -> BTreeMap<RuleKey, Distribution> {
    let mut doomed: BTreeSet<RuleKey> = BTreeSet::new();
    for (general, dist1) in &weights {
        let sig1 = general.signature();
        for (specific, dist2) in &weights {
            let sig2 = specific.signature();
            if sig2 != sig1 && sig2.contains(&sig1) && dist1 == dist2 {
                doomed.insert(specific.clone());
            }
        }
    }
    weights
        .into_iter()
        .filter(|(key, _)| !doomed.contains(key))
        .collect()
}

/// The non-overlapping parts of `specific`'s context relative to
/// `general`'s, when `specific` extends it by exactly one
/// symbol/segment on one side. Larger context-length gaps are
/// non-interacting.
fn excess(general: &RuleKey, specific: &RuleKey) -> Option<(String, String)> {
    if specific.context_len() != general.context_len() + 1 {
        return None;
    }
    let sig = general.signature();
    specific
        .signature()
        .split_once(&sig)
        .map(|(left, right)| (left.to_string(), right.to_string()))
}

/// For every rule, collects the one-symbol context excesses of every
/// more specific rule over the same input symbol as negative contexts:
/// the general rule must not fire next to that symbol, because the
/// specific rule is the correct one there.
fn derive_exclusions(
    weights: &BTreeMap<RuleKey, Distribution>,
) -> BTreeMap<RuleKey, (Vec<SmolStr>, Vec<SmolStr>)> {
    let mut exclusions = BTreeMap::new();
    for general in weights.keys() {
        let mut left: BTreeSet<SmolStr> = BTreeSet::new();
        let mut right: BTreeSet<SmolStr> = BTreeSet::new();
        for specific in weights.keys() {
            if let Some((excess_left, excess_right)) = excess(general, specific) {
                if !excess_left.is_empty() {
                    left.insert(excess_left.into());
                }
                if !excess_right.is_empty() {
                    right.insert(excess_right.into());
                }
            }
        }
        exclusions.insert(
            general.clone(),
            (left.into_iter().collect(), right.into_iter().collect()),
        );
    }
    exclusions
}

/// Drops pure retention rules, whose entire distribution maps the
/// input to itself at cost zero. Once negative contexts exist they are
/// implied by the absence of a positive rule.
fn remove_retentions(
    weights: BTreeMap<RuleKey, Distribution>,
) -> BTreeMap<RuleKey, Distribution> {
    weights
        .into_iter()
        .filter(|(key, dist)| {
            !(dist.len() == 1 && dist.get(&key.input) == Some(&0.0))
        })
        .collect()
}

fn excl_regex(excluded: &[SmolStr], escapes: &EscapeTable) -> String {
    format!(
        "[? - [{}]]",
        excluded
            .iter()
            .map(|s| escapes.escape(&Symbol::new(s)))
            .join("|")
    )
}

fn rule_regex(rule: &WeightedRule, escapes: &EscapeTable) -> String {
    let mut left: Vec<String> = rule.key.left.iter().map(|s| escapes.escape(s)).collect();
    let mut right: Vec<String> = rule.key.right.iter().map(|s| escapes.escape(s)).collect();
    if !rule.exclude_left.is_empty() {
        left.insert(0, excl_regex(&rule.exclude_left, escapes));
    }
    if !rule.exclude_right.is_empty() {
        right.push(excl_regex(&rule.exclude_right, escapes));
    }

    let input = escapes.escape(&rule.key.input);
    // Insertion rules duplicate the boundary markers so that the
    // engine's structural expansion step can land an epsilon slot
    // between them.
    let joiner = if rule.key.input.is_epsilon() {
        format!(
            " [ {} {} {} {} {} ] ",
            SEPARATOR_MARK, EPSILON_MARK, DOT_MARK, EPSILON_MARK, SEPARATOR_MARK
        )
    } else {
        format!(" {} ", SEPARATOR_MARK)
    };
    let slot = |symbol: &String| format!("{} {} [? - {}]*", symbol, DOT_MARK, SEPARATOR_MARK);
    let context_left = format!(
        "{} {} {} {} ",
        left.iter().map(slot).join(&joiner),
        SEPARATOR_MARK,
        input,
        DOT_MARK
    );
    let context_right = format!(" {} {}", SEPARATOR_MARK, right.iter().map(slot).join(&joiner));

    let outputs = rule
        .outputs
        .iter()
        .map(|(output, weight)| format!("{}::{}", escapes.escape(output), fmt_weight(*weight)))
        .join(" | ");

    format!(
        "{} -> [ {} ] || {} _ {}",
        input,
        outputs,
        context_left.trim(),
        context_right.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolPair;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn feature(input: &str, output: &str, left: &[&str], right: &[&str]) -> Feature {
        Feature {
            pair: SymbolPair::new(sym(input), sym(output)),
            left: left.iter().map(|s| sym(s)).collect(),
            right: right.iter().map(|s| sym(s)).collect(),
        }
    }

    fn repeat(feature: Feature, n: usize) -> Vec<Feature> {
        std::iter::repeat(feature).take(n).collect()
    }

    #[test]
    fn weights_are_information_costs() {
        let mut features = repeat(feature("c", "k", &[], &[]), 3);
        features.extend(repeat(feature("c", "s", &[], &[]), 1));
        let weights = weight_groups(&features, 1);
        let key = RuleKey {
            input: sym("c"),
            left: vec![],
            right: vec![],
        };
        let dist = &weights[&key];
        assert_eq!(dist[&sym("k")], 0.125);
        assert_eq!(dist[&sym("s")], 0.602);
        // All weights non-negative; no negative zero from -log10(1).
        let sole = weight_groups(&repeat(feature("a", "a", &[], &[]), 2), 1);
        let key = RuleKey {
            input: sym("a"),
            left: vec![],
            right: vec![],
        };
        assert_eq!(sole[&key][&sym("a")], 0.0);
        assert!(sole[&key][&sym("a")].is_sign_positive());
    }

    #[test]
    fn threshold_prunes_rare_features() {
        let mut features = repeat(feature("c", "k", &[], &[]), 3);
        features.extend(repeat(feature("c", "s", &[], &[]), 1));
        let weights = weight_groups(&features, 2);
        let key = RuleKey {
            input: sym("c"),
            left: vec![],
            right: vec![],
        };
        assert_eq!(weights[&key].len(), 1);
        // The group total excludes the pruned feature, so the kept
        // output is certain.
        assert_eq!(weights[&key][&sym("k")], 0.0);
    }

    #[test]
    fn context_free_insertions_are_forbidden() {
        let features = repeat(feature("@_EPSILON_SYMBOL_@", "x", &[], &[]), 5);
        assert!(weight_groups(&features, 1).is_empty());
        // With context the insertion survives.
        let features = repeat(feature("@_EPSILON_SYMBOL_@", "x", &["a"], &[]), 5);
        assert_eq!(weight_groups(&features, 1).len(), 1);
    }

    #[test]
    fn generalization_drops_identical_specializations() {
        let mut features = repeat(feature("c", "k", &["a"], &[]), 3);
        features.extend(repeat(feature("c", "k", &["a"], &["t"]), 3));
        let weights = weight_groups(&features, 1);
        assert_eq!(weights.len(), 2);
        let generalized = generalize(weights);
        assert_eq!(generalized.len(), 1);
        let survivor = generalized.keys().next().unwrap();
        assert_eq!(survivor.left, vec![sym("a")]);
        assert!(survivor.right.is_empty());
    }

    #[test]
    fn generalization_is_idempotent() {
        let mut features = repeat(feature("c", "k", &[], &[]), 2);
        features.extend(repeat(feature("c", "k", &["a"], &[]), 2));
        features.extend(repeat(feature("c", "k", &["a"], &["t"]), 2));
        let weights = weight_groups(&features, 1);
        let twice = generalize(generalize(weights));
        let thrice = generalize(twice.clone());
        assert_eq!(twice, thrice);
    }

    #[test]
    fn exclusions_record_one_symbol_excess() {
        // The general rule rewrites c to k; before a, c is retained by
        // a more specific rule, so the general rule must not fire
        // right of an a... the excess lands on the left side.
        let mut features = repeat(feature("c", "k", &[], &[]), 4);
        features.extend(repeat(feature("c", "c", &["a"], &[]), 4));
        let weights = weight_groups(&features, 1);
        let exclusions = derive_exclusions(&weights);
        let general = RuleKey {
            input: sym("c"),
            left: vec![],
            right: vec![],
        };
        let (left, right) = &exclusions[&general];
        assert_eq!(left.as_slice(), &[SmolStr::new("a")]);
        assert!(right.is_empty());
    }

    #[test]
    fn distant_contexts_are_non_interacting() {
        let mut features = repeat(feature("c", "k", &[], &[]), 2);
        features.extend(repeat(feature("c", "c", &["a"], &["t"]), 2));
        let weights = weight_groups(&features, 1);
        let exclusions = derive_exclusions(&weights);
        let general = RuleKey {
            input: sym("c"),
            left: vec![],
            right: vec![],
        };
        let (left, right) = &exclusions[&general];
        assert!(left.is_empty());
        assert!(right.is_empty());
    }

    #[test]
    fn retentions_are_removed() {
        let mut features = repeat(feature("a", "a", &[], &[]), 3);
        features.extend(repeat(feature("c", "k", &[], &[]), 3));
        let rules = induce(&features, &InductionConfig::default());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].key.input, sym("c"));
    }

    #[test]
    fn cat_kat_induces_deterministic_rule() {
        let features = repeat(feature("c", "k", &[], &[]), 3);
        let rules = induce(&features, &InductionConfig::default());
        assert_eq!(rules.len(), 1);
        let rule = &rules.rules()[0];
        assert_eq!(rule.outputs[&sym("k")], 0.0);
    }

    #[test]
    fn regex_serialization() {
        let features = repeat(feature("c", "k", &["a"], &[]), 2);
        let rules = induce(&features, &InductionConfig::default());
        let regex = rules.to_regex(&EscapeTable::rules());
        assert_eq!(
            regex,
            "{c} -> [ {k}::0.0 ] || {a} \"<.>\" [? - \"<S>\"]* \"<S>\" {c} \"<.>\" _ \"<S>\" ;"
        );
    }

    #[test]
    fn regex_serialization_with_exclusion() {
        let mut features = repeat(feature("c", "k", &[], &[]), 4);
        features.extend(repeat(feature("c", "s", &["a"], &[]), 4));
        let rules = induce(&features, &InductionConfig::default());
        let regex = rules.to_regex(&EscapeTable::rules());
        assert!(regex.contains("[? - [{a}]]"));
        // Two rules joined by the continuation mark.
        assert!(regex.contains(" ,,\n"));
        assert!(regex.ends_with(" ;"));
    }

    #[test]
    fn insertion_rule_uses_expanded_joiner() {
        let features = repeat(
            feature("@_EPSILON_SYMBOL_@", "x", &["a", "b"], &["t"]),
            3,
        );
        let rules = induce(&features, &InductionConfig::default());
        let regex = rules.to_regex(&EscapeTable::rules());
        assert!(regex.starts_with("\"<E>\" -> [ {x}::0.0 ]"));
        assert!(regex.contains("[ \"<S>\" \"<E>\" \"<.>\" \"<E>\" \"<S>\" ]"));
    }
}
