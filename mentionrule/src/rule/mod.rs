//! Ordered token sequence rules which set and retract custom attribute values.

use fs_err::File;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{io::BufReader, path::Path};

use crate::{
    merge,
    resolve::{longest_matches, Resolution},
    schema::{AttributeId, Schema},
    types::{Document, Match, Source, Value},
    Error,
};

pub mod composition;
pub mod structure;

use composition::Composition;
use structure::RuleTableStructure;

/// A pattern of quantified token predicates plus the attribute values applied to every token
/// of its matches.
#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceRule {
    pub(crate) name: String,
    pub(crate) composition: Composition,
    pub(crate) avm: Vec<(AttributeId, Value)>,
    pub(crate) merge: bool,
}

impl SequenceRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finds the match starting at every token. Empty matches are dropped.
    pub fn find_matches(&self, doc: &Document, index: usize) -> Vec<Match> {
        (0..doc.len())
            .filter_map(|start| {
                self.composition
                    .apply(doc, start)
                    .filter(|end| *end > start)
                    .map(|end| Match::new(Source::Rule(index), start, end))
            })
            .collect()
    }

    /// Applies the rule to a document. `Value::Unset` in the AVM clears previous values.
    pub fn apply(&self, doc: &mut Document, index: usize) -> Result<Resolution, Error> {
        let resolution = longest_matches(&self.find_matches(doc, index));

        for m in &resolution.kept {
            for (attribute, value) in &self.avm {
                doc.set_span(m.start, m.end, *attribute, *value)?;
            }
        }

        if self.merge && !resolution.kept.is_empty() {
            let spans: Vec<_> = resolution.kept.iter().map(|m| (m.start, m.end)).collect();
            merge::merge_spans(doc, &spans)?;
        }

        Ok(resolution)
    }
}

/// A pipeline stage applying a rule table in order.
#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceAnnotator {
    name: String,
    rules: Vec<SequenceRule>,
}

impl SequenceAnnotator {
    /// Compiles a rule table, registering its attributes and labels with `schema`.
    pub fn from_structure<S: Into<String>>(
        name: S,
        table: RuleTableStructure,
        schema: &mut Schema,
    ) -> Result<Self, Error> {
        for attribute in table.attributes() {
            schema.declare_attribute(attribute);
        }

        let rules = table
            .into_rules()
            .into_iter()
            .map(|rule| rule.compile(schema))
            .collect::<Result<Vec<_>, Error>>()?;

        let name = name.into();
        info!("compiled {} sequence rules for {}", rules.len(), name);

        Ok(SequenceAnnotator { name, rules })
    }

    /// Loads a JSON rule table.
    pub fn from_path<P: AsRef<Path>>(path: P, schema: &mut Schema) -> Result<Self, Error> {
        let path = path.as_ref();
        let table: RuleTableStructure = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let name = path
            .file_stem()
            .map_or_else(|| "rules".to_string(), |x| x.to_string_lossy().into_owned());

        SequenceAnnotator::from_structure(name, table, schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[SequenceRule] {
        &self.rules
    }

    /// Applies every rule in order. Later rules see and may overwrite the values set by earlier ones.
    pub fn annotate(&self, doc: &mut Document) -> Result<(), Error> {
        for (i, rule) in self.rules.iter().enumerate() {
            let resolution = rule.apply(doc, i)?;

            if !resolution.kept.is_empty() {
                debug!(
                    "{}: rule {} matched {} spans",
                    self.name,
                    rule.name,
                    resolution.kept.len()
                );
            }
        }

        Ok(())
    }
}
