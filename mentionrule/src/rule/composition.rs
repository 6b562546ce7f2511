use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::{schema::AttributeId, types::Document, utils::regex::SerializeRegex};

/// Matches a string against a set of alternatives or a regex.
#[derive(Debug, Serialize, Deserialize)]
pub struct Matcher {
    matcher: either::Either<Vec<String>, SerializeRegex>,
    negate: bool,
}

impl Matcher {
    pub fn new_regex(regex: SerializeRegex, negate: bool) -> Self {
        Matcher {
            matcher: either::Right(regex),
            negate,
        }
    }

    pub fn new_strings(strings: Vec<String>, negate: bool) -> Self {
        Matcher {
            matcher: either::Left(strings),
            negate,
        }
    }

    pub fn is_match(&self, input: &str) -> bool {
        let matches = match &self.matcher {
            either::Left(strings) => strings.iter().any(|x| x == input),
            either::Right(regex) => regex.is_search_match(input),
        };

        matches != self.negate
    }

    /// Like [Matcher::is_match], but for a value which may be unset. An unset value only
    /// satisfies negated matchers.
    pub fn is_value_match(&self, input: Option<&str>) -> bool {
        match input {
            Some(input) => self.is_match(input),
            None => self.negate,
        }
    }
}

/// A linguistic field of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenField {
    Orth,
    Lower,
    Lemma,
    Pos,
    Tag,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Quantifier {
    pub min: usize,
    pub max: usize,
}

impl Quantifier {
    pub fn new(min: usize, max: usize) -> Self {
        assert!(max >= min);
        Quantifier { min, max }
    }

    pub fn one() -> Self {
        Quantifier::new(1, 1)
    }
}

#[enum_dispatch]
pub trait Atomable: Send + Sync {
    fn is_match(&self, doc: &Document, position: usize) -> bool;
}

#[enum_dispatch(Atomable)]
#[derive(Debug, Serialize, Deserialize)]
pub enum Atom {
    TextAtom(concrete::TextAtom),
    AttributeAtom(concrete::AttributeAtom),
    UnsetAtom(concrete::UnsetAtom),
    LikeUrlAtom(concrete::LikeUrlAtom),
    TrueAtom,
    AndAtom,
    NotAtom,
}

pub mod concrete {
    use super::{Atomable, AttributeId, Document, Matcher, TokenField};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TextAtom {
        field: TokenField,
        matcher: Matcher,
    }

    impl Atomable for TextAtom {
        fn is_match(&self, doc: &Document, position: usize) -> bool {
            let token = &doc.tokens()[position];
            let value = match self.field {
                TokenField::Orth => token.text(),
                TokenField::Lower => token.lower(),
                TokenField::Lemma => token.lemma(),
                TokenField::Pos => token.pos(),
                TokenField::Tag => token.tag(),
            };

            self.matcher.is_match(value)
        }
    }

    impl TextAtom {
        pub fn new(field: TokenField, matcher: Matcher) -> Self {
            TextAtom { field, matcher }
        }
    }

    /// Matches the label of a custom attribute.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AttributeAtom {
        attribute: AttributeId,
        matcher: Matcher,
    }

    impl Atomable for AttributeAtom {
        fn is_match(&self, doc: &Document, position: usize) -> bool {
            let schema = doc.schema();
            let label = doc.tokens()[position]
                .get(self.attribute)
                .label()
                .map(|label| schema.label_str(label));

            self.matcher.is_value_match(label)
        }
    }

    impl AttributeAtom {
        pub fn new(attribute: AttributeId, matcher: Matcher) -> Self {
            AttributeAtom { attribute, matcher }
        }
    }

    /// Matches tokens on which a custom attribute is not set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UnsetAtom {
        attribute: AttributeId,
    }

    impl Atomable for UnsetAtom {
        fn is_match(&self, doc: &Document, position: usize) -> bool {
            !doc.tokens()[position].get(self.attribute).is_set()
        }
    }

    impl UnsetAtom {
        pub fn new(attribute: AttributeId) -> Self {
            UnsetAtom { attribute }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LikeUrlAtom {
        value: bool,
    }

    impl Atomable for LikeUrlAtom {
        fn is_match(&self, doc: &Document, position: usize) -> bool {
            doc.tokens()[position].like_url() == self.value
        }
    }

    impl LikeUrlAtom {
        pub fn new(value: bool) -> Self {
            LikeUrlAtom { value }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrueAtom {}

impl Atomable for TrueAtom {
    fn is_match(&self, _doc: &Document, _position: usize) -> bool {
        true
    }
}

impl TrueAtom {
    pub fn new() -> Self {
        TrueAtom {}
    }
}

impl Default for TrueAtom {
    fn default() -> Self {
        TrueAtom::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AndAtom {
    atoms: Vec<Atom>,
}

impl AndAtom {
    pub fn and(atoms: Vec<Atom>) -> Atom {
        let mut atoms: Vec<_> = atoms
            .into_iter()
            .filter(|x| !matches!(x, Atom::TrueAtom { .. }))
            .collect();

        if atoms.is_empty() {
            (TrueAtom {}).into()
        } else if atoms.len() == 1 {
            atoms.remove(0)
        } else {
            (AndAtom { atoms }).into()
        }
    }
}

impl Atomable for AndAtom {
    fn is_match(&self, doc: &Document, position: usize) -> bool {
        self.atoms.iter().all(|x| x.is_match(doc, position))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotAtom {
    atom: Box<Atom>,
}

impl NotAtom {
    pub fn not(atom: Atom) -> Atom {
        (NotAtom {
            atom: Box::new(atom),
        })
        .into()
    }
}

impl Atomable for NotAtom {
    fn is_match(&self, doc: &Document, position: usize) -> bool {
        !self.atom.is_match(doc, position)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    pub atom: Atom,
    pub quantifier: Quantifier,
}

/// A sequence of quantified token predicates.
///
/// Matching is greedy without backtracking: every part consumes as many consecutive tokens as
/// satisfy its atom, up to its maximum, and fails if fewer than its minimum were consumed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Composition {
    pub(crate) parts: Vec<Part>,
}

impl Composition {
    pub fn new(parts: Vec<Part>) -> Self {
        Composition { parts }
    }

    /// Matches the composition starting at token `start`. Returns the exclusive end of the match.
    pub fn apply(&self, doc: &Document, start: usize) -> Option<usize> {
        let mut position = start;

        for part in &self.parts {
            let mut count = 0;

            while count < part.quantifier.max
                && position < doc.len()
                && part.atom.is_match(doc, position)
            {
                position += 1;
                count += 1;
            }

            if count < part.quantifier.min {
                return None;
            }
        }

        Some(position)
    }
}
