//! Merging of token spans into single tokens.
//!
//! After merging, entity ranges are remapped onto the new token indices.

use log::debug;

use crate::{
    schema::{AttributeId, LabelId},
    types::{Document, Token},
    utils, Error,
};

/// A maximal run of contiguous tokens sharing one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub end: usize,
    pub label: LabelId,
}

/// Finds maximal runs of tokens whose `attribute` holds the same label.
pub fn find_runs(tokens: &[Token], attribute: AttributeId) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Option<Run> = None;

    for (i, token) in tokens.iter().enumerate() {
        let label = token.get(attribute).label();

        match (current, label) {
            (Some(run), Some(label)) if run.label == label => {}
            (run, label) => {
                if let Some(mut run) = run {
                    run.end = i;
                    runs.push(run);
                }
                current = label.map(|label| Run {
                    start: i,
                    end: i + 1,
                    label,
                });
            }
        }
    }

    if let Some(mut run) = current {
        debug!(
            "run {}..{} reaches the end of the document, closing it",
            run.start,
            tokens.len()
        );
        run.end = tokens.len();
        runs.push(run);
    }

    runs
}

/// The lemma of a merged token. Lemmas are joined with a space where the member had trailing
/// whitespace, except after a lemma ending with `#` so hashtags stay one unit.
pub fn merged_lemma(tokens: &[Token]) -> String {
    let mut lemma = String::new();

    for (i, token) in tokens.iter().enumerate() {
        lemma.push_str(&token.lemma);
        if i + 1 < tokens.len() && token.whitespace && !token.lemma.ends_with('#') {
            lemma.push(' ');
        }
    }

    lemma
}

fn merge_tokens(tokens: &[Token]) -> Token {
    let mut text = String::new();
    for (i, token) in tokens.iter().enumerate() {
        text.push_str(&token.text);
        if i + 1 < tokens.len() {
            text.push_str(token.whitespace_str());
        }
    }

    let mut merged = tokens[0].clone();
    merged.lower = text.to_lowercase();
    merged.like_url = utils::like_url(&text);
    merged.lemma = merged_lemma(tokens);
    merged.whitespace = tokens[tokens.len() - 1].whitespace;
    merged.text = text;
    merged
}

/// Merges every `start..end` span into one token. Spans must be in bounds and must not overlap.
/// Single token spans are left as they are.
pub fn merge_spans(doc: &mut Document, spans: &[(usize, usize)]) -> Result<(), Error> {
    let len = doc.tokens.len();
    let mut spans = spans.to_vec();
    spans.sort_unstable();

    let mut prev_end = 0;
    for &(start, end) in &spans {
        if start >= end || end > len || start < prev_end {
            return Err(Error::InvalidSpan { start, end, len });
        }
        prev_end = end;
    }

    if spans.iter().all(|(start, end)| end - start == 1) {
        return Ok(());
    }

    let old = std::mem::take(&mut doc.tokens);
    let mut tokens = Vec::with_capacity(len);
    // new index of each old token
    let mut new_index = Vec::with_capacity(len);
    let mut spans = spans.into_iter().peekable();
    let mut i = 0;

    while i < len {
        match spans.peek() {
            Some(&(start, end)) if start == i => {
                tokens.push(merge_tokens(&old[start..end]));
                new_index.extend(std::iter::repeat(tokens.len() - 1).take(end - start));
                spans.next();
                i = end;
            }
            _ => {
                tokens.push(old[i].clone());
                new_index.push(tokens.len() - 1);
                i += 1;
            }
        }
    }

    debug!("merged {} tokens into {}", len, tokens.len());

    doc.tokens = tokens;
    doc.entities
        .remap(|start, end| (new_index[start], new_index[end - 1] + 1));

    Ok(())
}

/// Merges every run of tokens sharing a `MENTION` label into one token.
pub fn merge_mentions(doc: &mut Document) -> Result<(), Error> {
    let mention = doc.schema.mention();
    let spans: Vec<_> = find_runs(&doc.tokens, mention)
        .into_iter()
        .map(|run| (run.start, run.end))
        .collect();

    merge_spans(doc, &spans)
}
