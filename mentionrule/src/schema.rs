//! The fixed set of custom token attributes and labels known to an annotator.
//!
//! All lexicons and rule tables are registered before any document is processed, so every token
//! carries a fixed-size vector of attribute slots and every label is an interned [LabelId].

use bimap::BiMap;
use serde::{Deserialize, Serialize};

/// Attribute holding the final mention classification.
pub const MENTION: &str = "MENTION";
/// Attribute written by the date token annotator.
pub const TIME: &str = "TIME";

/// Index of a custom attribute slot on a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub(crate) u16);

impl AttributeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// An interned label string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub(crate) u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    attributes: BiMap<String, AttributeId>,
    labels: BiMap<String, LabelId>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

impl Schema {
    /// Creates a schema with the `MENTION` attribute declared.
    pub fn new() -> Self {
        let mut schema = Schema {
            attributes: BiMap::new(),
            labels: BiMap::new(),
        };
        schema.declare_attribute(MENTION);
        schema
    }

    /// Declares an attribute and returns its id. Declaring an attribute twice returns the existing id.
    pub fn declare_attribute<S: AsRef<str>>(&mut self, name: S) -> AttributeId {
        let name = name.as_ref();
        if let Some(id) = self.attributes.get_by_left(name) {
            return *id;
        }

        let id = AttributeId(self.attributes.len() as u16);
        self.attributes.insert(name.to_string(), id);
        id
    }

    /// Interns a label and returns its id.
    pub fn intern_label<S: AsRef<str>>(&mut self, label: S) -> LabelId {
        let label = label.as_ref();
        if let Some(id) = self.labels.get_by_left(label) {
            return *id;
        }

        let id = LabelId(self.labels.len() as u32);
        self.labels.insert(label.to_string(), id);
        id
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeId> {
        self.attributes.get_by_left(name).copied()
    }

    pub fn attribute_name(&self, id: AttributeId) -> &str {
        self.attributes
            .get_by_right(&id)
            .map_or("", |name| name.as_str())
    }

    pub fn mention(&self) -> AttributeId {
        // declared in `Schema::new`
        AttributeId(0)
    }

    pub fn label(&self, label: &str) -> Option<LabelId> {
        self.labels.get_by_left(label).copied()
    }

    pub fn label_str(&self, id: LabelId) -> &str {
        self.labels.get_by_right(&id).map_or("", |label| label.as_str())
    }

    /// Iterates over all labels in interning order.
    pub fn labels(&self) -> impl Iterator<Item = (LabelId, &str)> {
        (0..self.labels.len() as u32).map(move |i| (LabelId(i), self.label_str(LabelId(i))))
    }

    /// Iterates over all attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeId, &str)> {
        (0..self.attributes.len() as u16)
            .map(move |i| (AttributeId(i), self.attribute_name(AttributeId(i))))
    }

    /// The number of attribute slots every token carries.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_is_always_declared() {
        let schema = Schema::new();

        assert_eq!(schema.attribute(MENTION), Some(schema.mention()));
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn interning_is_idempotent() {
        let mut schema = Schema::new();

        let la = schema.declare_attribute("LA");
        assert_eq!(schema.declare_attribute("LA"), la);
        assert_eq!(schema.attribute_name(la), "LA");

        let sm = schema.intern_label("SOCIAL_MEDIA");
        let internet = schema.intern_label("INTERNET");
        assert_eq!(schema.intern_label("SOCIAL_MEDIA"), sm);
        assert_ne!(sm, internet);
        assert_eq!(schema.label_str(internet), "INTERNET");
        assert_eq!(
            schema.labels().map(|(_, x)| x).collect::<Vec<_>>(),
            vec!["SOCIAL_MEDIA", "INTERNET"]
        );
    }
}
