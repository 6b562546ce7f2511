//! Splitting of raw text into [TokenInput]s.
//!
//! Documents normally arrive already tokenized and tagged. The tokenizer here is used to split
//! phrase lexicon terms the same way the documents were split, and for quick experiments on raw
//! text. It does not lemmatize or tag: lemmas are the lowercased text and POS tags are empty.

use crate::{types::TokenInput, utils};

/// Something that splits text into tokens.
pub trait Tokenize {
    fn tokenize(&self, text: &str) -> Vec<TokenInput>;
}

fn split<F>(text: &str, split_func: F) -> Vec<&str>
where
    F: Fn(char) -> bool,
{
    let mut result = Vec::new();
    let mut last = 0;
    for (index, matched) in text.match_indices(split_func) {
        if last != index {
            result.push(&text[last..index]);
        }
        result.push(matched);
        last = index + matched.len();
    }
    if last < text.len() {
        result.push(&text[last..]);
    }

    result
}

fn trim_punctuation_end(text: &str) -> &str {
    text.trim_end_matches(|c| utils::splitting_chars().contains(c))
}

/// Splits `text` into byte ranges. URLs and bare domains are kept whole without trailing
/// punctuation, everything else splits at whitespace and punctuation. Whitespace pieces are
/// included.
fn get_token_ranges(text: &str) -> Vec<(usize, usize)> {
    let split_func = |c: char| c.is_whitespace() || utils::splitting_chars().contains(c);
    let mut ranges = Vec::new();
    let mut prev = 0;

    let push_split = |from: usize, to: usize, ranges: &mut Vec<(usize, usize)>| {
        let mut offset = from;
        for chunk in split(&text[from..to], char::is_whitespace) {
            let domain = trim_punctuation_end(chunk);
            let rest = if !domain.is_empty() && utils::like_url(domain) {
                ranges.push((offset, offset + domain.len()));
                offset += domain.len();
                &chunk[domain.len()..]
            } else {
                chunk
            };

            for piece in split(rest, split_func) {
                ranges.push((offset, offset + piece.len()));
                offset += piece.len();
            }
        }
    };

    for (start, end) in utils::URL_REGEX.find_iter(text) {
        let end = start + trim_punctuation_end(&text[start..end]).len();

        push_split(prev, start, &mut ranges);
        ranges.push((start, end));
        prev = end;
    }
    push_split(prev, text.len(), &mut ranges);

    ranges
}

/// A rule-based tokenizer splitting on whitespace and punctuation while keeping URLs intact.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenizer;

impl Tokenize for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<TokenInput> {
        let mut tokens: Vec<TokenInput> = Vec::new();
        let mut char_offset = 0;
        let mut byte_offset = 0;

        for (start, end) in get_token_ranges(text) {
            char_offset += utils::char_len(&text[byte_offset..start]);
            byte_offset = start;

            let piece = &text[start..end];

            if piece.trim().is_empty() {
                if let Some(last) = tokens.last_mut() {
                    last.whitespace = true;
                }
            } else {
                let lower = piece.to_lowercase();
                let mut token = TokenInput::new(piece, lower.as_str(), "", "", char_offset, false);
                token.lower = Some(lower);
                tokens.push(token);
            }
        }

        tokens
    }
}
