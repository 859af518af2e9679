//! Reading pair corpora.
//!
//! A corpus line holds an input string and an output string separated
//! by tabs; when a line has more than two fields, the last two are
//! taken (leading annotation columns are common in source data).

use std::io::{self, BufRead};

use log::warn;

/// One input/output string pair, cleaned and ready for alignment.
pub type StringPair = (String, String);

/// Scrub characters that break tokenization or the engine's regex
/// syntax: double every backslash, drop the stray C1 control artifact
/// some corpora carry.
pub(crate) fn clean(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\u{0084}', "")
}

/// Reads string pairs from a corpus, one pair per line.
///
/// A line missing one of the two required fields is skipped with a
/// warning naming its 1-based line number; empty lines are skipped
/// silently.
pub fn read_pairs<R: BufRead>(reader: R) -> io::Result<Vec<StringPair>> {
    let mut pairs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 2 {
            warn!("Line {} is missing fields, skipping...", i + 1);
            continue;
        }
        let output = clean(fields[fields.len() - 1]);
        let input = clean(fields[fields.len() - 2]);
        pairs.push((input, output));
    }
    Ok(pairs)
}
