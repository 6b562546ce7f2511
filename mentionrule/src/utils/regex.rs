use onig::{Regex, RegexOptions};
use serde::{Deserialize, Serialize, Serializer};
use std::ops::Deref;
use std::{
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
};

impl TryFrom<String> for SerializeRegex {
    type Error = onig::Error;

    fn try_from(string: String) -> Result<Self, onig::Error> {
        Ok(SerializeRegex {
            regex: SerializeRegex::compile(&string)?,
            string,
        })
    }
}

/// An oniguruma regex which (de)serializes as its source string and is recompiled on load.
#[derive(Deserialize)]
#[serde(try_from = "String")]
pub struct SerializeRegex {
    pub(crate) string: String,
    pub(crate) regex: Regex,
}

impl Serialize for SerializeRegex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.string)
    }
}

impl Hash for SerializeRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.string.hash(state);
    }
}

impl fmt::Debug for SerializeRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializeRegex({:?})", self.string)
    }
}

impl SerializeRegex {
    pub fn new(regex_str: &str) -> Result<Self, onig::Error> {
        SerializeRegex::try_from(regex_str.to_string())
    }

    pub fn compile(regex_str: &str) -> Result<Regex, onig::Error> {
        Regex::with_options(
            regex_str,
            RegexOptions::REGEX_OPTION_NONE,
            onig::Syntax::java(),
        )
    }

    /// Whether the regex matches anywhere in `text`.
    pub fn is_search_match(&self, text: &str) -> bool {
        self.regex.find(text).is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Deref for SerializeRegex {
    type Target = Regex;

    fn deref(&self) -> &Self::Target {
        &self.regex
    }
}
