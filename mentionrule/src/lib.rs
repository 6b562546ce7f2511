//! Rule-based annotation of online activity mentions in clinical text.
//! # Overview
//!
//! mentionrule has the following core abstractions:
//! - A [Document][types::Document] wrapping an already tokenized and tagged token sequence. Every token carries
//!   a fixed set of attribute slots declared in a [Schema][schema::Schema].
//! - [LexicalAnnotator][matcher::LexicalAnnotator]s which mark phrases or lemma sequences from a lexicon.
//! - [SequenceAnnotator][rule::SequenceAnnotator]s which apply ordered token sequence rules that can set
//!   and retract classifications.
//! - The [merge] step which joins contiguous tokens with the same `MENTION` into single tokens.
//! - The [StandoffExporter][export::StandoffExporter] writing eHOST stand-off XML.
//!
//! An [Annotator][pipeline::Annotator] ties these together as an ordered list of named stages.
//!
//! # Examples
//!
//! Annotate a pre-tokenized document:
//!
//! ```no_run
//! use mentionrule::pipeline::Annotator;
//! use mentionrule::types::TokenInput;
//!
//! let annotator = Annotator::from_config("resources/config.json")?;
//!
//! let tokens: Vec<TokenInput> = serde_json::from_str(&std::fs::read_to_string("doc.json")?)?;
//! let doc = annotator.process(tokens)?;
//!
//! for record in mentionrule::export::mention_records(&doc) {
//!     println!("{} {}..{} {}", record.class, record.start, record.end, record.text);
//! }
//! # Ok::<(), mentionrule::Error>(())
//! ```

use std::io;

use thiserror::Error;

pub mod config;
pub mod export;
pub mod lexicon;
pub mod matcher;
pub mod merge;
pub mod pipeline;
pub mod resolve;
pub mod rule;
pub mod schema;
pub mod tokenizer;
pub mod types;
pub(crate) mod utils;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    /// (De)serialization error. Can have occured during deserialization or during serialization.
    #[error(transparent)]
    Serialization(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Regex(#[from] onig::Error),
    #[error(transparent)]
    Export(#[from] export::Error),
    #[error("syntax error in lexicon file {path} at line {line}: {content:?}")]
    LexiconSyntax {
        path: String,
        line: usize,
        content: String,
    },
    #[error("invalid rule '{rule}': {reason}")]
    RuleStructure { rule: String, reason: String },
    #[error("rule '{rule}' uses unknown token attribute '{attribute}'")]
    UnknownAttribute { rule: String, attribute: String },
    #[error("document has {chars} characters, the limit is {max}")]
    DocumentTooLarge { chars: usize, max: usize },
    #[error("invalid span {start}..{end} for a document with {len} tokens")]
    InvalidSpan { start: usize, end: usize, len: usize },
}
