//! JSON configuration of an [Annotator][crate::pipeline::Annotator].

use fs_err::File;
use serde::{Deserialize, Serialize};
use std::{
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{lexicon::LexiconKind, matcher::SourceAttribute, Error};

fn default_target() -> String {
    "LA".into()
}

fn default_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    1_000_000
}

/// One lexicon file. Every label in it becomes a separate pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconConfig {
    pub path: PathBuf,
    pub kind: LexiconKind,
    /// The token attribute phrases are matched on. Ignored for lemma lexicons.
    #[serde(default)]
    pub source: SourceAttribute,
    /// The custom attribute matches are written to.
    #[serde(default = "default_target")]
    pub target: String,
    /// Whether to merge the matched spans into single tokens.
    #[serde(default)]
    pub merge: bool,
}

/// Options applied to every processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorOptions {
    /// Documents with this many characters or more are rejected.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        AnnotatorOptions {
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    #[serde(default)]
    pub lexicons: Vec<LexiconConfig>,
    /// Rule tables, applied in order after the lexicons.
    #[serde(default)]
    pub rules: Vec<PathBuf>,
    /// Whether to mark date-like lemmas with `TIME`.
    #[serde(default = "default_true")]
    pub date_annotator: bool,
    #[serde(default)]
    pub options: AnnotatorOptions,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        AnnotatorConfig {
            lexicons: Vec::new(),
            rules: Vec::new(),
            date_annotator: true,
            options: AnnotatorOptions::default(),
        }
    }
}

impl AnnotatorConfig {
    /// Reads a config file. Relative paths in it are resolved against the directory of the file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config: AnnotatorConfig =
            serde_json::from_reader(BufReader::new(File::open(path)?))?;

        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }

        Ok(config)
    }

    /// Makes every relative path absolute with respect to `dir`.
    pub fn resolve_paths<P: AsRef<Path>>(&mut self, dir: P) {
        let dir = dir.as_ref();

        for lexicon in &mut self.lexicons {
            if lexicon.path.is_relative() {
                lexicon.path = dir.join(&lexicon.path);
            }
        }
        for rules in &mut self.rules {
            if rules.is_relative() {
                *rules = dir.join(&*rules);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults() {
        let mut config: AnnotatorConfig = serde_json::from_str(
            r#"{
                "lexicons": [{"path": "lex/sm.txt", "kind": "phrase"}, {"path": "/abs/lemmas.txt", "kind": "lemma", "target": "MENTION"}],
                "rules": ["rules.json"]
            }"#,
        )
        .unwrap();

        assert!(config.date_annotator);
        assert_eq!(config.options.max_chars, 1_000_000);
        assert_eq!(config.lexicons[0].source, SourceAttribute::Lower);
        assert_eq!(config.lexicons[0].target, "LA");
        assert!(!config.lexicons[0].merge);
        assert_eq!(config.lexicons[1].target, "MENTION");

        config.resolve_paths("/data/config");
        assert_eq!(config.lexicons[0].path, Path::new("/data/config/lex/sm.txt"));
        assert_eq!(config.lexicons[1].path, Path::new("/abs/lemmas.txt"));
        assert_eq!(config.rules[0], Path::new("/data/config/rules.json"));
    }
}
