//! Phrase and lemma matching of lexicon terms against a document.

use fnv::FnvHashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    merge,
    resolve::{longest_matches, Entity},
    schema::{AttributeId, LabelId},
    tokenizer::Tokenize,
    types::{Document, Match, Source, Tense, Token, Value},
    Error,
};

/// The token attribute lexicon terms are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceAttribute {
    Orth,
    Lower,
    Lemma,
}

impl Default for SourceAttribute {
    fn default() -> Self {
        SourceAttribute::Lower
    }
}

impl SourceAttribute {
    pub fn value<'t>(&self, token: &'t Token) -> &'t str {
        match self {
            SourceAttribute::Orth => token.text(),
            SourceAttribute::Lower => token.lower(),
            SourceAttribute::Lemma => token.lemma(),
        }
    }
}

/// Finds all occurrences of token sequences from a lexicon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalMatcher {
    source: SourceAttribute,
    label: LabelId,
    patterns: Vec<Vec<String>>,
    /// Maps the first element of each pattern to the pattern indices starting with it.
    first: FnvHashMap<String, Vec<usize>>,
}

impl LexicalMatcher {
    fn new(source: SourceAttribute, label: LabelId, patterns: Vec<Vec<String>>) -> Self {
        let mut first: FnvHashMap<String, Vec<usize>> = FnvHashMap::default();
        let patterns: Vec<_> = patterns.into_iter().filter(|x| !x.is_empty()).collect();

        for (i, pattern) in patterns.iter().enumerate() {
            first.entry(pattern[0].clone()).or_default().push(i);
        }

        LexicalMatcher {
            source,
            label,
            patterns,
            first,
        }
    }

    /// Creates a matcher from surface phrases. Each phrase is split with `tokenizer` so it aligns
    /// with the tokens of documents split the same way.
    pub fn phrase<S: AsRef<str>, T: Tokenize>(
        terms: &[S],
        source: SourceAttribute,
        label: LabelId,
        tokenizer: &T,
    ) -> Self {
        let patterns = terms
            .iter()
            .map(|term| {
                tokenizer
                    .tokenize(term.as_ref())
                    .into_iter()
                    .map(|token| match source {
                        SourceAttribute::Orth => token.text,
                        SourceAttribute::Lower => {
                            token.lower.unwrap_or_else(|| token.text.to_lowercase())
                        }
                        SourceAttribute::Lemma => token.lemma,
                    })
                    .collect()
            })
            .collect();

        LexicalMatcher::new(source, label, patterns)
    }

    /// Creates a matcher from whitespace separated lemma sequences.
    pub fn lemma<S: AsRef<str>>(terms: &[S], label: LabelId) -> Self {
        let patterns = terms
            .iter()
            .map(|term| {
                term.as_ref()
                    .split_whitespace()
                    .map(|x| x.to_string())
                    .collect()
            })
            .collect();

        LexicalMatcher::new(SourceAttribute::Lemma, label, patterns)
    }

    pub fn label(&self) -> LabelId {
        self.label
    }

    pub fn source(&self) -> SourceAttribute {
        self.source
    }

    /// All matches of any pattern, ordered by start position and then by pattern order.
    pub fn find_all(&self, tokens: &[Token]) -> Vec<Match> {
        let mut matches = Vec::new();

        for start in 0..tokens.len() {
            let candidates = match self.first.get(self.source.value(&tokens[start])) {
                Some(candidates) => candidates,
                None => continue,
            };

            for &i in candidates {
                let pattern = &self.patterns[i];
                let end = start + pattern.len();

                if end <= tokens.len()
                    && pattern
                        .iter()
                        .zip(&tokens[start..end])
                        .all(|(expected, token)| expected == self.source.value(token))
                {
                    matches.push(Match::new(Source::Lexicon(self.label), start, end));
                }
            }
        }

        matches
    }
}

/// A pipeline stage marking the matches of one lexicon label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalAnnotator {
    name: String,
    matcher: LexicalMatcher,
    target: AttributeId,
    merge: bool,
}

impl LexicalAnnotator {
    pub fn new<S: Into<String>>(
        name: S,
        matcher: LexicalMatcher,
        target: AttributeId,
        merge: bool,
    ) -> Self {
        LexicalAnnotator {
            name: name.into(),
            matcher,
            target,
            merge,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> LabelId {
        self.matcher.label()
    }

    pub fn target(&self) -> AttributeId {
        self.target
    }

    /// Sets the target attribute and tense of every token in the longest matches, adds the
    /// matches as entities and optionally merges the entities of this label.
    pub fn annotate(&self, doc: &mut Document) -> Result<(), Error> {
        let label = self.matcher.label();
        let resolution = longest_matches(&self.matcher.find_all(doc.tokens()));

        debug!(
            "{}: {} matches, {} ambiguities",
            self.name,
            resolution.kept.len(),
            resolution.ambiguities.len()
        );

        for m in &resolution.kept {
            doc.set_span(m.start, m.end, self.target, Value::Label(label))?;

            let tense = doc.tokens[m.start..m.end]
                .iter()
                .filter(|token| token.is_verb())
                .last()
                .map_or(Tense::Unknown, |token| Tense::Tag(token.tag.clone()));

            for token in &mut doc.tokens[m.start..m.end] {
                token.tense = tense.clone();
            }

            doc.add_entity(Entity::new(m.start, m.end, label))?;
        }

        if self.merge {
            let spans: Vec<_> = doc
                .entities()
                .iter()
                .filter(|entity| entity.label == label)
                .map(|entity| (entity.start, entity.end))
                .collect();

            merge::merge_spans(doc, &spans)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::Schema, tokenizer::SimpleTokenizer, types::TokenInput};

    fn tokens() -> Vec<TokenInput> {
        vec![
            TokenInput::new("She", "she", "PRON", "PRP", 0, true),
            TokenInput::new("watched", "watch", "VERB", "VBD", 4, true),
            TokenInput::new("videos", "video", "NOUN", "NNS", 12, true),
            TokenInput::new("on", "on", "ADP", "IN", 19, true),
            TokenInput::new("You", "you", "PROPN", "NNP", 22, true),
            TokenInput::new("Tube", "tube", "PROPN", "NNP", 26, false),
        ]
    }

    #[test]
    fn matches_retokenized_phrases() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let doc = Document::new(tokens(), &schema);

        let matcher = LexicalMatcher::phrase(
            &["you tube", "tube", "facebook"],
            SourceAttribute::Lower,
            label,
            &SimpleTokenizer,
        );

        assert_eq!(
            matcher.find_all(doc.tokens()),
            vec![
                Match::new(Source::Lexicon(label), 4, 6),
                Match::new(Source::Lexicon(label), 5, 6)
            ]
        );
    }

    #[test]
    fn matches_bare_domain_terms() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let doc = Document::new(
            vec![
                TokenInput::new("Uses", "use", "VERB", "VBZ", 0, true),
                TokenInput::new("Facebook.com", "facebook.com", "X", "ADD", 5, false),
            ],
            &schema,
        );

        let matcher = LexicalMatcher::phrase(
            &["facebook.com"],
            SourceAttribute::Lower,
            label,
            &SimpleTokenizer,
        );

        assert_eq!(
            matcher.find_all(doc.tokens()),
            vec![Match::new(Source::Lexicon(label), 1, 2)]
        );
    }

    struct WhitespaceTokenizer;

    impl Tokenize for WhitespaceTokenizer {
        fn tokenize(&self, text: &str) -> Vec<TokenInput> {
            text.split_whitespace()
                .map(|x| TokenInput::new(x, x, "", "", 0, true))
                .collect()
        }
    }

    #[test]
    fn splits_terms_with_the_given_tokenizer() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let doc = Document::new(
            vec![
                TokenInput::new("What's", "what's", "PRON", "WP", 0, true),
                TokenInput::new("app", "app", "NOUN", "NN", 7, false),
            ],
            &schema,
        );

        let simple =
            LexicalMatcher::phrase(&["what's app"], SourceAttribute::Lower, label, &SimpleTokenizer);
        let whitespace = LexicalMatcher::phrase(
            &["what's app"],
            SourceAttribute::Lower,
            label,
            &WhitespaceTokenizer,
        );

        assert!(simple.find_all(doc.tokens()).is_empty());
        assert_eq!(
            whitespace.find_all(doc.tokens()),
            vec![Match::new(Source::Lexicon(label), 0, 2)]
        );
    }

    #[test]
    fn orth_matching_is_case_sensitive() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let doc = Document::new(tokens(), &schema);

        let matcher =
            LexicalMatcher::phrase(&["you tube"], SourceAttribute::Orth, label, &SimpleTokenizer);
        assert!(matcher.find_all(doc.tokens()).is_empty());
    }

    #[test]
    fn annotates_longest_match_with_tense() {
        let mut schema = Schema::new();
        let label = schema.intern_label("INTERNET");
        let target = schema.mention();
        let mut doc = Document::new(tokens(), &schema);

        let matcher = LexicalMatcher::lemma(&["watch video", "video", "you tube"], label);
        let annotator = LexicalAnnotator::new("lex_INTERNET", matcher, target, false);
        annotator.annotate(&mut doc).unwrap();

        let mentions: Vec<_> = (0..doc.len()).map(|i| doc.mention(i)).collect();
        assert_eq!(
            mentions,
            vec![
                None,
                Some("INTERNET"),
                Some("INTERNET"),
                None,
                Some("INTERNET"),
                Some("INTERNET")
            ]
        );

        assert_eq!(doc.tokens()[1].tense(), &Tense::Tag("VBD".to_string()));
        assert_eq!(doc.tokens()[2].tense(), &Tense::Tag("VBD".to_string()));
        assert_eq!(doc.tokens()[4].tense(), &Tense::Unknown);
        assert_eq!(doc.tokens()[0].tense(), &Tense::Unset);
        assert_eq!(doc.entities().len(), 2);
    }

    #[test]
    fn merges_entities_of_its_label() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let target = schema.mention();
        let mut doc = Document::new(tokens(), &schema);

        let matcher = LexicalMatcher::lemma(&["you tube"], label);
        LexicalAnnotator::new("lex_SOCIAL_MEDIA", matcher, target, true)
            .annotate(&mut doc)
            .unwrap();

        assert_eq!(doc.len(), 5);
        assert_eq!(doc.tokens()[4].text(), "You Tube");
        assert_eq!(doc.tokens()[4].lemma(), "you tube");
        assert_eq!(doc.tokens()[4].idx(), 22);
        assert_eq!(doc.mention(4), Some("SOCIAL_MEDIA"));
        assert_eq!(
            doc.entities().iter().collect::<Vec<_>>(),
            vec![&Entity::new(4, 5, label)]
        );
    }
}
