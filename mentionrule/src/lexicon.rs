//! Tab-separated `term<TAB>label` lexicons.

use fs_err::File;
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    io::{BufRead, BufReader},
    path::Path,
};

use crate::Error;

/// How the terms of a lexicon are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexiconKind {
    /// Terms are phrases tokenized like documents. Malformed lines are skipped with a warning.
    Phrase,
    /// Terms are whitespace separated lemma sequences. Lines starting with `#` are comments,
    /// malformed lines are an error.
    Lemma,
}

/// Terms grouped by label, in the order labels first appear in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexicon {
    name: String,
    kind: LexiconKind,
    entries: IndexMap<String, Vec<String>>,
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split('\t');

    let term = parts.next()?.trim();
    let label = parts.next()?.trim();

    if parts.next().is_some() || term.is_empty() || label.is_empty() {
        return None;
    }

    Some((term, label))
}

impl Lexicon {
    /// Loads a lexicon file.
    pub fn from_path<P: AsRef<Path>>(path: P, kind: LexiconKind) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        Lexicon::from_reader(reader, path.display().to_string(), kind)
    }

    /// Reads a lexicon. `name` is used in diagnostics.
    pub fn from_reader<R: BufRead, S: Into<String>>(
        reader: R,
        name: S,
        kind: LexiconKind,
    ) -> Result<Self, Error> {
        let name = name.into();
        let mut entries: IndexMap<String, Vec<String>> = IndexMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }
            if kind == LexiconKind::Lemma && line.starts_with('#') {
                continue;
            }

            match parse_line(&line) {
                Some((term, label)) => entries
                    .entry(label.to_string())
                    .or_default()
                    .push(term.to_string()),
                None => match kind {
                    LexiconKind::Phrase => {
                        warn!(
                            "syntax error in lexicon file {} at line {}, skipping: {:?}",
                            name,
                            i + 1,
                            line
                        );
                    }
                    LexiconKind::Lemma => {
                        return Err(Error::LexiconSyntax {
                            path: name,
                            line: i + 1,
                            content: line,
                        })
                    }
                },
            }
        }

        info!(
            "loaded {} labels with {} terms from {}",
            entries.len(),
            entries.values().map(|x| x.len()).sum::<usize>(),
            name
        );

        Ok(Lexicon {
            name,
            kind,
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LexiconKind {
        self.kind
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|x| x.as_str())
    }

    pub fn terms(&self, label: &str) -> &[String] {
        self.entries.get(label).map_or(&[], |x| x.as_slice())
    }

    /// Iterates over `(label, terms)` in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(label, terms)| (label.as_str(), terms.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn groups_terms_by_label() {
        let text = "Facebook\tSOCIAL_MEDIA\n\ntwitter \t SOCIAL_MEDIA\nwebsite\tINTERNET\n";
        let lexicon =
            Lexicon::from_reader(Cursor::new(text), "sm.txt", LexiconKind::Phrase).unwrap();

        assert_eq!(
            lexicon.labels().collect::<Vec<_>>(),
            vec!["SOCIAL_MEDIA", "INTERNET"]
        );
        assert_eq!(lexicon.terms("SOCIAL_MEDIA"), &["Facebook", "twitter"]);
        assert!(lexicon.terms("GAMING").is_empty());
    }

    #[test]
    fn phrase_lexicon_skips_malformed_lines() {
        let text = "Facebook\tSOCIAL_MEDIA\nno label here\nweb\tsite\tINTERNET\nFB\tSOCIAL_MEDIA";
        let lexicon =
            Lexicon::from_reader(Cursor::new(text), "sm.txt", LexiconKind::Phrase).unwrap();

        assert_eq!(lexicon.len(), 1);
        assert_eq!(lexicon.terms("SOCIAL_MEDIA"), &["Facebook", "FB"]);
    }

    #[test]
    fn phrase_lexicon_has_no_comments() {
        let text = "#selfcare\tSOCIAL_MEDIA\n";
        let lexicon =
            Lexicon::from_reader(Cursor::new(text), "sm.txt", LexiconKind::Phrase).unwrap();

        assert_eq!(lexicon.terms("SOCIAL_MEDIA"), &["#selfcare"]);
    }

    #[test]
    fn lemma_lexicon_fails_on_malformed_lines() {
        let text = "# comment\nplay game\tGAMING\nbroken line\n";
        let error = Lexicon::from_reader(Cursor::new(text), "lemmas.txt", LexiconKind::Lemma)
            .unwrap_err();

        match error {
            Error::LexiconSyntax { path, line, .. } => {
                assert_eq!(path, "lemmas.txt");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
