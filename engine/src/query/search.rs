//! Full-text search (`q`).
//!
//! Text splits on whitespace and punctuation (underscore is part of a word,
//! and so is a decimal point between digits), then each word splits further
//! into script runs. Latin runs match whole
//! terms, ASCII case-insensitively. CJK runs match as substrings of CJK runs.
//! All query terms must match.

use crate::{
    error::Result,
    value::{FieldValue, Scalar},
    Error, Limits, Record,
};

const OPTION: &str = "q";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Cjk,
}

/// A single indexed or queried term.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    text: String,
    script: Script,
}

fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF       // hiragana, katakana
            | 0x31F0..=0x31FF // katakana extensions
            | 0x3400..=0x4DBF // CJK extension A
            | 0x4E00..=0x9FFF // CJK unified ideographs
            | 0xAC00..=0xD7AF // hangul syllables
            | 0xF900..=0xFAFF // CJK compatibility ideographs
            | 0xFF10..=0xFF19 // fullwidth digits
            | 0xFF21..=0xFF3A // fullwidth upper
            | 0xFF41..=0xFF5A // fullwidth lower
            | 0xFF66..=0xFF9F // halfwidth katakana
    )
}

fn script_of(c: char) -> Option<Script> {
    if is_cjk(c) {
        Some(Script::Cjk)
    } else if c.is_alphanumeric() || c == '_' {
        Some(Script::Latin)
    } else {
        None
    }
}

fn tokenize(text: &str) -> Vec<Term> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut current_script = None;

    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        // A decimal point between digits stays inside the number.
        if c == '.'
            && current.ends_with(|p: char| p.is_ascii_digit())
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
        {
            current.push(c);
            continue;
        }
        let script = script_of(c);
        if script != current_script && !current.is_empty() {
            if let Some(s) = current_script {
                terms.push(Term {
                    text: std::mem::take(&mut current),
                    script: s,
                });
            }
        }
        current_script = script;
        if script.is_some() {
            current.push(c.to_ascii_lowercase());
        } else {
            current.clear();
        }
    }
    if let Some(s) = current_script {
        if !current.is_empty() {
            terms.push(Term {
                text: current,
                script: s,
            });
        }
    }
    terms
}

fn collect_text(value: &FieldValue, out: &mut Vec<String>) {
    match value {
        FieldValue::Null => {}
        FieldValue::Scalar(Scalar::String(s)) => out.push(s.clone()),
        FieldValue::Scalar(Scalar::Int(i)) => out.push(i.to_string()),
        FieldValue::Scalar(Scalar::Float(f)) => out.push(f.to_string()),
        FieldValue::Scalar(Scalar::Bool(b)) => out.push(b.to_string()),
        FieldValue::Object(fields) => fields.values().for_each(|v| collect_text(v, out)),
        FieldValue::List(items) => items.iter().for_each(|v| collect_text(v, out)),
    }
}

/// A parsed full-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<Term>,
}

impl SearchQuery {
    /// Parse a raw `q` value.
    pub fn parse(raw: &str, limits: &Limits) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::syntax(OPTION, "search query is empty"));
        }
        if raw.len() > limits.search_max_bytes {
            return Err(Error::limit(
                OPTION,
                format!(
                    "{} bytes exceeds limit of {}",
                    raw.len(),
                    limits.search_max_bytes
                ),
            ));
        }
        let terms = tokenize(raw);
        if terms.is_empty() {
            return Err(Error::syntax(OPTION, "search query has no terms"));
        }
        Ok(Self { terms })
    }

    /// Whether every term occurs in the record's field values.
    pub fn matches(&self, record: &Record) -> bool {
        let mut texts = Vec::new();
        record
            .fields
            .values()
            .for_each(|v| collect_text(v, &mut texts));
        let indexed: Vec<Term> = texts.iter().flat_map(|t| tokenize(t)).collect();

        self.terms.iter().all(|term| {
            indexed.iter().any(|candidate| match term.script {
                Script::Latin => candidate.script == Script::Latin && candidate.text == term.text,
                Script::Cjk => candidate.script == Script::Cjk && candidate.text.contains(&term.text),
            })
        })
    }
}
