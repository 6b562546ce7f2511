//! An ordered list of annotation stages plus the [Annotator] running them on documents.

use enum_dispatch::enum_dispatch;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use fs_err::File;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    io::{BufReader, Read, Write},
    path::Path,
};

use crate::{
    config::{AnnotatorConfig, AnnotatorOptions},
    export::{mention_records, MentionRecord},
    lexicon::{Lexicon, LexiconKind},
    matcher::{LexicalAnnotator, LexicalMatcher},
    merge,
    rule::SequenceAnnotator,
    schema::{AttributeId, LabelId, Schema, TIME},
    tokenizer::{SimpleTokenizer, Tokenize},
    types::{Document, TokenInput, Value},
    utils::{self, parallelism::MaybeParallelIterator, regex::SerializeRegex},
    Error,
};

/// A pipeline stage.
#[enum_dispatch]
pub trait Annotate {
    fn name(&self) -> &str;

    fn annotate(&self, doc: &mut Document) -> Result<(), Error>;
}

impl Annotate for LexicalAnnotator {
    fn name(&self) -> &str {
        LexicalAnnotator::name(self)
    }

    fn annotate(&self, doc: &mut Document) -> Result<(), Error> {
        LexicalAnnotator::annotate(self, doc)
    }
}

impl Annotate for SequenceAnnotator {
    fn name(&self) -> &str {
        SequenceAnnotator::name(self)
    }

    fn annotate(&self, doc: &mut Document) -> Result<(), Error> {
        SequenceAnnotator::annotate(self, doc)
    }
}

/// Years and numeric day/month/year dates.
const DATE_REGEX: &str = r"((19[0-9][0-9]|20[0-9])|(0?[1-9]|[12][0-9]|3[01])\/(0[1-9]|1[012])\/([0-9][0-9])|(0?[1-9]|[12][0-9]|3[01])\/(0[1-9]|1[012])\/(19[0-9][0-9]|20[0-9])|(0?[1-9]|[12][0-9]|3[01])\.(0[1-9]|1[012])\.([0-9][0-9])|(0?[1-9]|[12][0-9]|3[01])\.(0[1-9]|1[012])\.(19[0-9][0-9]|20[0-9]))";

/// Sets `TIME` on every token whose lemma contains a date.
#[derive(Debug, Serialize, Deserialize)]
pub struct DateTokenAnnotator {
    regex: SerializeRegex,
    attribute: AttributeId,
    label: LabelId,
}

impl DateTokenAnnotator {
    /// Creates the annotator, declaring the `TIME` attribute and label.
    pub fn new(schema: &mut Schema) -> Result<Self, Error> {
        Ok(DateTokenAnnotator {
            regex: SerializeRegex::new(DATE_REGEX)?,
            attribute: schema.declare_attribute(TIME),
            label: schema.intern_label(TIME),
        })
    }
}

impl Annotate for DateTokenAnnotator {
    fn name(&self) -> &str {
        "date_token_annotator"
    }

    fn annotate(&self, doc: &mut Document) -> Result<(), Error> {
        for token in &mut doc.tokens {
            if self.regex.is_search_match(&token.lemma) {
                token.set(self.attribute, Value::Label(self.label));
            }
        }

        Ok(())
    }
}

#[enum_dispatch(Annotate)]
#[derive(Debug, Serialize, Deserialize)]
pub enum Stage {
    LexicalAnnotator,
    SequenceAnnotator,
    DateTokenAnnotator,
}

/// Stages in the order they run. Stage names are unique.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|x| x.name() == name)
    }

    /// `name` if it is free, else `name` with `_` appended if that is free.
    pub fn free_name(&self, name: &str) -> Option<String> {
        if !self.contains(name) {
            return Some(name.to_string());
        }

        let alternative = format!("{}_", name);
        if !self.contains(&alternative) {
            return Some(alternative);
        }

        None
    }

    /// Appends a stage. Returns `false` and leaves the pipeline unchanged if a stage with the
    /// same name exists.
    pub fn push<S: Into<Stage>>(&mut self, stage: S) -> bool {
        let stage = stage.into();

        if self.contains(stage.name()) {
            warn!("{} exists already, stage not added", stage.name());
            return false;
        }

        self.stages.push(stage);
        true
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|x| x.name())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The outcome of processing one document of a batch.
#[derive(Debug)]
pub struct DocumentRecord {
    pub name: String,
    pub result: Result<Vec<MentionRecord>, Error>,
}

/// Annotates documents with a fixed [Schema] and [Pipeline].
#[derive(Debug, Serialize, Deserialize)]
pub struct Annotator {
    schema: Schema,
    pipeline: Pipeline,
    options: AnnotatorOptions,
}

impl Annotator {
    /// Creates an annotator from a finished schema and pipeline.
    pub fn from_parts(schema: Schema, pipeline: Pipeline, options: AnnotatorOptions) -> Self {
        Annotator {
            schema,
            pipeline,
            options,
        }
    }

    /// Builds an annotator from a JSON config file.
    pub fn from_config<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Annotator::build(&AnnotatorConfig::from_path(path)?)
    }

    /// Builds an annotator from a JSON config file, splitting phrase terms with `tokenizer`.
    pub fn from_config_with<P: AsRef<Path>, T: Tokenize>(
        path: P,
        tokenizer: &T,
    ) -> Result<Self, Error> {
        Annotator::build_with(&AnnotatorConfig::from_path(path)?, tokenizer)
    }

    /// Builds an annotator whose phrase terms are split with the [SimpleTokenizer].
    pub fn build(config: &AnnotatorConfig) -> Result<Self, Error> {
        Annotator::build_with(config, &SimpleTokenizer)
    }

    /// Loads all lexicons and rule tables of `config` and builds the pipeline: one lexical stage
    /// per label, then the date annotator, then the rule tables. Phrase terms are split with
    /// `tokenizer`, which should be the one the documents were tokenized with.
    pub fn build_with<T: Tokenize>(config: &AnnotatorConfig, tokenizer: &T) -> Result<Self, Error> {
        let mut schema = Schema::new();
        let mut pipeline = Pipeline::new();

        for lexicon_config in &config.lexicons {
            let lexicon = Lexicon::from_path(&lexicon_config.path, lexicon_config.kind)?;
            let target = schema.declare_attribute(&lexicon_config.target);

            for (label, terms) in lexicon.iter() {
                let name = match pipeline.free_name(&format!("lex_{}", label)) {
                    Some(name) => name,
                    None => {
                        warn!("lex_{} exists already, stage not added", label);
                        continue;
                    }
                };

                let label = schema.intern_label(label);
                let matcher = match lexicon.kind() {
                    LexiconKind::Phrase => LexicalMatcher::phrase(
                        terms,
                        lexicon_config.source,
                        label,
                        tokenizer,
                    ),
                    LexiconKind::Lemma => LexicalMatcher::lemma(terms, label),
                };

                pipeline.push(LexicalAnnotator::new(
                    name,
                    matcher,
                    target,
                    lexicon_config.merge,
                ));
            }
        }

        if config.date_annotator {
            pipeline.push(DateTokenAnnotator::new(&mut schema)?);
        }

        for path in &config.rules {
            pipeline.push(SequenceAnnotator::from_path(path, &mut schema)?);
        }

        info!(
            "pipeline: {}",
            pipeline.names().collect::<Vec<_>>().join(", ")
        );

        Ok(Annotator::from_parts(
            schema,
            pipeline,
            config.options.clone(),
        ))
    }

    /// Loads an annotator from a binary created with [Annotator::to_writer].
    pub fn new<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(p.as_ref())?);
        Annotator::from_reader(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Ok(bincode::deserialize_from(reader)?)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), Error> {
        Ok(bincode::serialize_into(writer, self)?)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn options(&self) -> &AnnotatorOptions {
        &self.options
    }

    /// Wraps tokens in a [Document] without annotating them.
    pub fn document(&self, tokens: Vec<TokenInput>) -> Result<Document, Error> {
        let chars = tokens
            .last()
            .map_or(0, |x| x.idx + utils::char_len(&x.text));

        if chars >= self.options.max_chars {
            return Err(Error::DocumentTooLarge {
                chars,
                max: self.options.max_chars,
            });
        }

        Ok(Document::new(tokens, &self.schema))
    }

    /// Runs every stage on the tokens and merges runs of equal `MENTION` labels.
    pub fn process(&self, tokens: Vec<TokenInput>) -> Result<Document, Error> {
        let mut doc = self.document(tokens)?;

        for stage in &self.pipeline.stages {
            debug!("running {}", stage.name());
            stage.annotate(&mut doc)?;
        }

        merge::merge_mentions(&mut doc)?;

        Ok(doc)
    }

    /// Splits raw text with the [SimpleTokenizer] and processes it. Lemmas and POS tags are not
    /// available, so only surface based stages are meaningful.
    pub fn process_text(&self, text: &str) -> Result<Document, Error> {
        self.process(SimpleTokenizer.tokenize(text))
    }

    /// Processes independent documents, in parallel with the `parallel` feature. A failing
    /// document does not affect the others.
    pub fn process_batch(&self, documents: Vec<(String, Vec<TokenInput>)>) -> Vec<DocumentRecord> {
        documents
            .into_maybe_par_iter()
            .map(|(name, tokens)| {
                let result = self.process(tokens).map(|doc| mention_records(&doc));

                if let Err(error) = &result {
                    warn!("unable to process {}: {}", name, error);
                }

                DocumentRecord { name, result }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::structure::RuleTableStructure;

    #[test]
    fn stage_names_are_unique() {
        let mut schema = Schema::new();
        let label = schema.intern_label("SOCIAL_MEDIA");
        let lexical = |name: &str| {
            LexicalAnnotator::new(
                name,
                LexicalMatcher::lemma(&["facebook"], label),
                schema.mention(),
                false,
            )
        };

        let mut pipeline = Pipeline::new();
        assert!(pipeline.push(lexical("lex_SOCIAL_MEDIA")));
        assert_eq!(
            pipeline.free_name("lex_SOCIAL_MEDIA").as_deref(),
            Some("lex_SOCIAL_MEDIA_")
        );
        assert!(pipeline.push(lexical("lex_SOCIAL_MEDIA_")));
        assert_eq!(pipeline.free_name("lex_SOCIAL_MEDIA"), None);
        assert!(!pipeline.push(lexical("lex_SOCIAL_MEDIA")));
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn marks_dates() {
        let mut schema = Schema::new();
        let annotator = DateTokenAnnotator::new(&mut schema).unwrap();

        let inputs = vec![
            TokenInput::new("since", "since", "ADP", "IN", 0, true),
            TokenInput::new("12/03/2019", "12/03/2019", "NUM", "CD", 6, true),
            TokenInput::new("1987", "1987", "NUM", "CD", 17, true),
            TokenInput::new("42", "42", "NUM", "CD", 22, false),
        ];
        let mut doc = Document::new(inputs, &schema);
        Annotate::annotate(&annotator, &mut doc).unwrap();

        let times: Vec<_> = (0..doc.len()).map(|i| doc.label(i, TIME)).collect();
        assert_eq!(times, vec![None, Some("TIME"), Some("TIME"), None]);
    }

    #[test]
    fn rejects_large_documents() {
        let annotator = Annotator::from_parts(
            Schema::new(),
            Pipeline::new(),
            AnnotatorOptions { max_chars: 10 },
        );

        let small = vec![TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 0, false)];
        assert!(annotator.process(small).is_ok());

        let large = vec![TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 2, false)];
        assert!(matches!(
            annotator.process(large),
            Err(Error::DocumentTooLarge { chars: 10, max: 10 })
        ));
    }

    #[test]
    fn batch_isolates_failures() {
        let mut schema = Schema::new();
        let table: RuleTableStructure = serde_json::from_str(
            r#"[{"name": "FB", "pattern": [{"LOWER": "facebook"}], "avm": {"ALL": {"MENTION": "SOCIAL_MEDIA"}}}]"#,
        )
        .unwrap();
        let rules = SequenceAnnotator::from_structure("rules", table, &mut schema).unwrap();

        let mut pipeline = Pipeline::new();
        pipeline.push(rules);
        let annotator =
            Annotator::from_parts(schema, pipeline, AnnotatorOptions { max_chars: 100 });

        let records = annotator.process_batch(vec![
            (
                "a".into(),
                vec![TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 0, false)],
            ),
            (
                "b".into(),
                vec![TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 200, false)],
            ),
        ]);

        assert_eq!(records[0].name, "a");
        assert_eq!(records[0].result.as_ref().unwrap().len(), 1);
        assert!(records[1].result.is_err());
    }

    #[test]
    fn roundtrips_through_bincode() {
        let mut schema = Schema::new();
        let mut pipeline = Pipeline::new();
        pipeline.push(DateTokenAnnotator::new(&mut schema).unwrap());
        let annotator = Annotator::from_parts(schema, pipeline, AnnotatorOptions::default());

        let mut buffer = Vec::new();
        annotator.to_writer(&mut buffer).unwrap();
        let loaded = Annotator::from_reader(buffer.as_slice()).unwrap();

        assert_eq!(loaded.pipeline().names().collect::<Vec<_>>(), vec!["date_token_annotator"]);
        let doc = loaded
            .process(vec![TokenInput::new("2019", "2019", "NUM", "CD", 0, false)])
            .unwrap();
        assert_eq!(doc.label(0, TIME), Some("TIME"));
    }
}
