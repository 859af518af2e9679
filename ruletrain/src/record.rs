//! Textual records exchanged between pipeline stages.
//!
//! An aligned-sequence record is a literal tuple of `(input, output)`
//! pairs, one sequence per line; a feature record is a literal
//! `((input, output), left_context, right_context)` tuple, one feature
//! per line. Both parse back into the exact structured value that was
//! written. These files are the sole contract between stages, so an
//! ill-formed record on read-back is fatal for the stage.

use std::fmt;

use smol_str::SmolStr;

use crate::features::Feature;
use crate::symbol::{AlignedSequence, Symbol, SymbolPair};

/// Error reading a record line back into its structured value.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A character that cannot start or continue a literal.
    #[error("unexpected character {1:?} at byte {0}")]
    Unexpected(usize, char),
    /// A string literal with no closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// The line ended inside a tuple.
    #[error("unterminated tuple")]
    UnterminatedTuple,
    /// The record parsed, but not into the expected tuple shape.
    #[error("record does not have the expected shape")]
    Shape,
}

#[derive(Debug, PartialEq)]
enum Literal {
    Str(SmolStr),
    Seq(Vec<Literal>),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Parser<'a> {
        Parser { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    fn parse(&mut self) -> Result<Literal, RecordError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => self.parse_seq(')'),
            Some('[') => self.parse_seq(']'),
            Some('\'') => self.parse_str('\''),
            Some('"') => self.parse_str('"'),
            Some(ch) => Err(RecordError::Unexpected(self.pos, ch)),
            None => Err(RecordError::UnterminatedTuple),
        }
    }

    fn parse_seq(&mut self, close: char) -> Result<Literal, RecordError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(ch) if ch == close => {
                    self.bump();
                    return Ok(Literal::Seq(items));
                }
                Some(_) => {
                    items.push(self.parse()?);
                    self.skip_whitespace();
                    match self.peek() {
                        Some(',') => {
                            self.bump();
                        }
                        Some(ch) if ch == close => {}
                        Some(ch) => return Err(RecordError::Unexpected(self.pos, ch)),
                        None => return Err(RecordError::UnterminatedTuple),
                    }
                }
                None => return Err(RecordError::UnterminatedTuple),
            }
        }
    }

    fn parse_str(&mut self, quote: char) -> Result<Literal, RecordError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(ch @ ('\\' | '\'' | '"')) => value.push(ch),
                    Some(ch) => {
                        value.push('\\');
                        value.push(ch);
                    }
                    None => return Err(RecordError::UnterminatedString),
                },
                Some(ch) if ch == quote => return Ok(Literal::Str(value.into())),
                Some(ch) => value.push(ch),
                None => return Err(RecordError::UnterminatedString),
            }
        }
    }
}

fn parse_line(line: &str) -> Result<Literal, RecordError> {
    let mut parser = Parser::new(line);
    let value = parser.parse()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(value),
        Some(ch) => Err(RecordError::Unexpected(parser.pos, ch)),
    }
}

fn as_symbol(literal: &Literal) -> Result<Symbol, RecordError> {
    match literal {
        Literal::Str(s) => Ok(Symbol::new(s)),
        Literal::Seq(_) => Err(RecordError::Shape),
    }
}

fn as_pair(literal: &Literal) -> Result<SymbolPair, RecordError> {
    match literal {
        Literal::Seq(items) if items.len() == 2 => Ok(SymbolPair::new(
            as_symbol(&items[0])?,
            as_symbol(&items[1])?,
        )),
        _ => Err(RecordError::Shape),
    }
}

fn as_context(literal: &Literal) -> Result<Vec<Symbol>, RecordError> {
    match literal {
        Literal::Seq(items) => items.iter().map(as_symbol).collect(),
        Literal::Str(_) => Err(RecordError::Shape),
    }
}

/// Parses one aligned-sequence record line.
pub fn parse_alignment(line: &str) -> Result<AlignedSequence, RecordError> {
    match parse_line(line)? {
        Literal::Seq(items) => Ok(AlignedSequence::from_pairs(
            items.iter().map(as_pair).collect::<Result<_, _>>()?,
        )),
        Literal::Str(_) => Err(RecordError::Shape),
    }
}

/// Parses one feature record line.
pub fn parse_feature(line: &str) -> Result<Feature, RecordError> {
    match parse_line(line)? {
        Literal::Seq(items) if items.len() == 3 => Ok(Feature {
            pair: as_pair(&items[0])?,
            left: as_context(&items[1])?,
            right: as_context(&items[2])?,
        }),
        _ => Err(RecordError::Shape),
    }
}

/// Writes a string the way Python `repr` would.
fn py_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        if ch == '\\' || ch == quote {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push(quote);
    out
}

fn py_tuple(items: &[String]) -> String {
    match items.len() {
        0 => "()".to_string(),
        1 => format!("({},)", items[0]),
        _ => format!("({})", items.join(", ")),
    }
}

fn pair_text(pair: &SymbolPair) -> String {
    py_tuple(&[py_str(pair.input.as_str()), py_str(pair.output.as_str())])
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pair_text(self))
    }
}

impl fmt::Display for AlignedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.pairs().iter().map(pair_text).collect();
        f.write_str(&py_tuple(&items))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left: Vec<String> = self.left.iter().map(|s| py_str(s.as_str())).collect();
        let right: Vec<String> = self.right.iter().map(|s| py_str(s.as_str())).collect();
        f.write_str(&py_tuple(&[
            pair_text(&self.pair),
            py_tuple(&left),
            py_tuple(&right),
        ]))
    }
}
