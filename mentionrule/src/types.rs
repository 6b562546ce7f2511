//! Fundamental types used by this crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    resolve::EntitySet,
    schema::{AttributeId, LabelId, Schema},
    utils, Error,
};

/// The value of a custom attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Unset,
    Label(LabelId),
}

impl Default for Value {
    fn default() -> Self {
        Value::Unset
    }
}

impl Value {
    pub fn is_set(&self) -> bool {
        matches!(self, Value::Label(_))
    }

    pub fn label(&self) -> Option<LabelId> {
        match self {
            Value::Label(label) => Some(*label),
            Value::Unset => None,
        }
    }
}

/// Tense copied onto lexically matched spans from the verb they contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tense {
    Unset,
    /// The span contains no verb.
    Unknown,
    Tag(String),
}

impl Default for Tense {
    fn default() -> Self {
        Tense::Unset
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tense::Unset => write!(f, "_"),
            Tense::Unknown => write!(f, "unknown"),
            Tense::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

/// A token as produced by an external tokenizer / tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInput {
    pub text: String,
    #[serde(default)]
    pub lower: Option<String>,
    pub lemma: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub tag: String,
    /// Character offset of the token in the source text.
    pub idx: usize,
    /// Whether the token is followed by whitespace.
    #[serde(default)]
    pub whitespace: bool,
    #[serde(default)]
    pub like_url: Option<bool>,
}

impl TokenInput {
    pub fn new<S: Into<String>>(text: S, lemma: S, pos: S, tag: S, idx: usize, whitespace: bool) -> Self {
        TokenInput {
            text: text.into(),
            lower: None,
            lemma: lemma.into(),
            pos: pos.into(),
            tag: tag.into(),
            idx,
            whitespace,
            like_url: None,
        }
    }
}

/// A token of a [Document]. Linguistic fields are immutable, attribute slots are written by annotators.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub(crate) text: String,
    pub(crate) lower: String,
    pub(crate) lemma: String,
    pub(crate) pos: String,
    pub(crate) tag: String,
    pub(crate) idx: usize,
    pub(crate) whitespace: bool,
    pub(crate) like_url: bool,
    pub(crate) values: Vec<Value>,
    pub(crate) tense: Tense,
}

impl Token {
    pub(crate) fn from_input(input: TokenInput, n_attributes: usize) -> Self {
        let lower = input.lower.unwrap_or_else(|| input.text.to_lowercase());
        let like_url = input.like_url.unwrap_or_else(|| utils::like_url(&input.text));

        Token {
            text: input.text,
            lower,
            lemma: input.lemma,
            pos: input.pos,
            tag: input.tag,
            idx: input.idx,
            whitespace: input.whitespace,
            like_url,
            values: vec![Value::Unset; n_attributes],
            tense: Tense::Unset,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn pos(&self) -> &str {
        &self.pos
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The character offset of this token.
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// The character offset right after this token.
    pub fn end(&self) -> usize {
        self.idx + utils::char_len(&self.text)
    }

    pub fn whitespace(&self) -> bool {
        self.whitespace
    }

    pub fn whitespace_str(&self) -> &'static str {
        if self.whitespace {
            " "
        } else {
            ""
        }
    }

    pub fn like_url(&self) -> bool {
        self.like_url
    }

    pub fn is_verb(&self) -> bool {
        self.pos == "VERB"
    }

    pub fn get(&self, attribute: AttributeId) -> Value {
        self.values
            .get(attribute.index())
            .copied()
            .unwrap_or(Value::Unset)
    }

    pub fn set(&mut self, attribute: AttributeId, value: Value) {
        if let Some(slot) = self.values.get_mut(attribute.index()) {
            *slot = value;
        }
    }

    pub fn tense(&self) -> &Tense {
        &self.tense
    }

    pub(crate) fn to_input(&self) -> TokenInput {
        TokenInput {
            text: self.text.clone(),
            lower: Some(self.lower.clone()),
            lemma: self.lemma.clone(),
            pos: self.pos.clone(),
            tag: self.tag.clone(),
            idx: self.idx,
            whitespace: self.whitespace,
            like_url: Some(self.like_url),
        }
    }
}

/// Where a [Match] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// A lexicon entry with this label.
    Lexicon(LabelId),
    /// The sequence rule at this index of its annotator.
    Rule(usize),
}

/// A half-open token range `[start, end)` plus the rule or lexicon which produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    pub source: Source,
    pub start: usize,
    pub end: usize,
}

impl Match {
    pub fn new(source: Source, start: usize, end: usize) -> Self {
        Match { source, start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Match) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An ordered token sequence with its entities.
#[derive(Debug, Clone)]
pub struct Document<'s> {
    pub(crate) schema: &'s Schema,
    pub(crate) tokens: Vec<Token>,
    pub(crate) entities: EntitySet,
}

impl<'s> Document<'s> {
    pub fn new(inputs: Vec<TokenInput>, schema: &'s Schema) -> Self {
        let tokens = inputs
            .into_iter()
            .map(|input| Token::from_input(input, schema.len()))
            .collect();

        Document {
            schema,
            tokens,
            entities: EntitySet::default(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// The number of characters from the document start to the end of the last token.
    pub fn char_len(&self) -> usize {
        self.tokens.last().map_or(0, |token| token.end())
    }

    /// Sets the value of an attribute for every token in `start..end`.
    pub fn set_span(
        &mut self,
        start: usize,
        end: usize,
        attribute: AttributeId,
        value: Value,
    ) -> Result<(), Error> {
        if start >= end || end > self.tokens.len() {
            return Err(Error::InvalidSpan {
                start,
                end,
                len: self.tokens.len(),
            });
        }

        for token in &mut self.tokens[start..end] {
            token.set(attribute, value);
        }
        Ok(())
    }

    /// The label string of an attribute on the token at `index`, if it is set.
    pub fn label(&self, index: usize, attribute: &str) -> Option<&'s str> {
        let attribute = self.schema.attribute(attribute)?;
        let schema = self.schema;

        self.tokens
            .get(index)?
            .get(attribute)
            .label()
            .map(|label| schema.label_str(label))
    }

    /// The `MENTION` label of the token at `index`, if it is set.
    pub fn mention(&self, index: usize) -> Option<&'s str> {
        let schema = self.schema;

        self.tokens
            .get(index)?
            .get(schema.mention())
            .label()
            .map(|label| schema.label_str(label))
    }
}

impl<'s> fmt::Display for Document<'s> {
    /// CoNLL-style table with one row per token and one column per custom attribute.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attributes: Vec<_> = self.schema.attributes().collect();

        write!(
            f,
            "{:<10}{:<10}{:<10}{:<10}{:<10}{:<10}{:<10}",
            "INDEX", "WORD", "LEMMA", "LOWER", "POS1", "POS2", "TENSE"
        )?;
        for (_, name) in &attributes {
            write!(f, "{:<10}", name)?;
        }
        writeln!(f)?;

        for (i, token) in self.tokens.iter().enumerate() {
            write!(
                f,
                "{:<10}{:<10}{:<10}{:<10}{:<10}{:<10}{:<10}",
                i,
                token.text,
                token.lemma,
                token.lower,
                token.tag,
                token.pos,
                token.tense.to_string()
            )?;
            for (id, _) in &attributes {
                let value = token
                    .get(*id)
                    .label()
                    .map_or("_", |label| self.schema.label_str(label));
                write!(f, "{:<10}", value)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> Vec<TokenInput> {
        vec![
            TokenInput::new("She", "she", "PRON", "PRP", 0, true),
            TokenInput::new("uses", "use", "VERB", "VBZ", 4, true),
            TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 9, false),
        ]
    }

    #[test]
    fn derives_lowercase_and_offsets() {
        let schema = Schema::new();
        let doc = Document::new(inputs(), &schema);

        assert_eq!(doc.tokens()[2].lower(), "facebook");
        assert_eq!(doc.tokens()[2].end(), 17);
        assert_eq!(doc.char_len(), 17);
        assert!(doc.tokens().iter().all(|x| !x.get(schema.mention()).is_set()));
    }

    #[test]
    fn rejects_invalid_spans() {
        let mut schema = Schema::new();
        let label = Value::Label(schema.intern_label("SOCIAL_MEDIA"));
        let mut doc = Document::new(inputs(), &schema);

        assert!(doc.set_span(2, 4, schema.mention(), label).is_err());
        assert!(doc.set_span(1, 1, schema.mention(), label).is_err());

        doc.set_span(2, 3, schema.mention(), label).unwrap();
        assert_eq!(doc.mention(2), Some("SOCIAL_MEDIA"));
        assert_eq!(doc.mention(1), None);
    }

    #[test]
    fn displays_attribute_columns() {
        let mut schema = Schema::new();
        schema.declare_attribute("LA");
        let doc = Document::new(inputs(), &schema);

        let table = doc.to_string();
        assert!(table.lines().next().unwrap().contains("MENTION"));
        assert!(table.lines().next().unwrap().contains("LA"));
        assert_eq!(table.lines().count(), 4);
    }
}
