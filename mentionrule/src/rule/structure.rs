//! The JSON structure of sequence rule tables and its compilation into [SequenceRule]s.

use indexmap::IndexMap;
use serde::Deserialize;

use super::composition::{
    concrete::*, AndAtom, Atom, Composition, Matcher, NotAtom, Part, Quantifier, TokenField,
};
use super::SequenceRule;
use crate::{
    schema::{AttributeId, Schema},
    types::Value,
    utils::regex::SerializeRegex,
    Error,
};

/// A rule table: either a bare list of rules or a list of rules with declared custom attributes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RuleTableStructure {
    Rules(Vec<RuleStructure>),
    Declared {
        #[serde(default)]
        attributes: Vec<String>,
        rules: Vec<RuleStructure>,
    },
}

impl RuleTableStructure {
    pub fn attributes(&self) -> &[String] {
        match self {
            RuleTableStructure::Rules(_) => &[],
            RuleTableStructure::Declared { attributes, .. } => attributes,
        }
    }

    pub fn into_rules(self) -> Vec<RuleStructure> {
        match self {
            RuleTableStructure::Rules(rules) => rules,
            RuleTableStructure::Declared { rules, .. } => rules,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RuleStructure {
    pub name: String,
    pub pattern: Vec<StepStructure>,
    #[serde(default)]
    pub avm: IndexMap<String, IndexMap<String, AvmValue>>,
    #[serde(default)]
    pub merge: bool,
}

/// One token of a pattern. An empty step matches any token.
#[derive(Debug, Deserialize)]
pub struct StepStructure {
    #[serde(rename = "OP", default)]
    pub op: Option<String>,
    #[serde(rename = "_", default)]
    pub custom: IndexMap<String, ConstraintStructure>,
    #[serde(flatten)]
    pub token: IndexMap<String, ConstraintStructure>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConstraintStructure {
    Exact(String),
    Flag(bool),
    Predicate(PredicateStructure),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateStructure {
    #[serde(rename = "IN")]
    pub in_: Option<Vec<String>>,
    #[serde(rename = "NOT_IN")]
    pub not_in: Option<Vec<String>>,
    #[serde(rename = "REGEX")]
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AvmValue {
    Label(String),
    Flag(bool),
}

fn structure_error(rule: &str, reason: String) -> Error {
    Error::RuleStructure {
        rule: rule.to_string(),
        reason,
    }
}

fn parse_quantifier(rule: &str, op: Option<&str>) -> Result<(Quantifier, bool), Error> {
    Ok(match op {
        None => (Quantifier::one(), false),
        Some("?") => (Quantifier::new(0, 1), false),
        Some("+") => (Quantifier::new(1, usize::MAX), false),
        Some("*") => (Quantifier::new(0, usize::MAX), false),
        Some("!") => (Quantifier::one(), true),
        Some(x) => return Err(structure_error(rule, format!("unknown OP '{}'", x))),
    })
}

fn parse_predicate(predicate: PredicateStructure) -> Result<Vec<Matcher>, Error> {
    let mut matchers = Vec::new();

    if let Some(values) = predicate.in_ {
        matchers.push(Matcher::new_strings(values, false));
    }
    if let Some(values) = predicate.not_in {
        matchers.push(Matcher::new_strings(values, true));
    }
    if let Some(regex) = predicate.regex {
        matchers.push(Matcher::new_regex(SerializeRegex::new(&regex)?, false));
    }

    Ok(matchers)
}

fn parse_token_constraint(
    rule: &str,
    key: &str,
    constraint: ConstraintStructure,
) -> Result<Vec<Atom>, Error> {
    if key == "LIKE_URL" {
        return match constraint {
            ConstraintStructure::Flag(value) => Ok(vec![LikeUrlAtom::new(value).into()]),
            _ => Err(structure_error(rule, "LIKE_URL takes a boolean".into())),
        };
    }

    let field = match key {
        "ORTH" | "TEXT" => TokenField::Orth,
        "LOWER" => TokenField::Lower,
        "LEMMA" => TokenField::Lemma,
        "POS" => TokenField::Pos,
        "TAG" => TokenField::Tag,
        _ => {
            return Err(Error::UnknownAttribute {
                rule: rule.to_string(),
                attribute: key.to_string(),
            })
        }
    };

    let matchers = match constraint {
        ConstraintStructure::Exact(value) => vec![Matcher::new_strings(vec![value], false)],
        ConstraintStructure::Predicate(predicate) => parse_predicate(predicate)?,
        ConstraintStructure::Flag(_) => {
            return Err(structure_error(
                rule,
                format!("{} does not take a boolean", key),
            ))
        }
    };

    Ok(matchers
        .into_iter()
        .map(|matcher| TextAtom::new(field, matcher).into())
        .collect())
}

fn parse_custom_constraint(
    attribute: AttributeId,
    constraint: ConstraintStructure,
) -> Result<Vec<Atom>, Error> {
    Ok(match constraint {
        ConstraintStructure::Exact(value) => vec![AttributeAtom::new(
            attribute,
            Matcher::new_strings(vec![value], false),
        )
        .into()],
        ConstraintStructure::Flag(false) => vec![UnsetAtom::new(attribute).into()],
        ConstraintStructure::Flag(true) => vec![NotAtom::not(UnsetAtom::new(attribute).into())],
        ConstraintStructure::Predicate(predicate) => parse_predicate(predicate)?
            .into_iter()
            .map(|matcher| AttributeAtom::new(attribute, matcher).into())
            .collect(),
    })
}

impl RuleStructure {
    /// Compiles the rule, declaring every custom attribute and interning every label it uses.
    pub fn compile(self, schema: &mut Schema) -> Result<SequenceRule, Error> {
        let name = self.name;

        if self.pattern.is_empty() {
            return Err(structure_error(&name, "empty pattern".into()));
        }

        let mut parts = Vec::new();
        for step in self.pattern {
            let (quantifier, negate) = parse_quantifier(&name, step.op.as_deref())?;
            let mut atoms = Vec::new();

            for (key, constraint) in step.token {
                atoms.extend(parse_token_constraint(&name, &key, constraint)?);
            }
            for (key, constraint) in step.custom {
                let attribute = schema.declare_attribute(&key);
                atoms.extend(parse_custom_constraint(attribute, constraint)?);
            }

            let atom = AndAtom::and(atoms);
            let atom = if negate { NotAtom::not(atom) } else { atom };

            parts.push(Part { atom, quantifier });
        }

        let mut avm = Vec::new();
        for (scope, values) in self.avm {
            if scope != "ALL" {
                return Err(structure_error(
                    &name,
                    format!("unsupported AVM key '{}', only 'ALL' is allowed", scope),
                ));
            }

            for (attribute, value) in values {
                let attribute = schema.declare_attribute(&attribute);
                let value = match value {
                    AvmValue::Label(label) => Value::Label(schema.intern_label(label)),
                    AvmValue::Flag(false) => Value::Unset,
                    AvmValue::Flag(true) => {
                        return Err(structure_error(
                            &name,
                            "AVM values must be a label or false".into(),
                        ))
                    }
                };
                avm.push((attribute, value));
            }
        }

        Ok(SequenceRule {
            name,
            composition: Composition::new(parts),
            avm,
            merge: self.merge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RuleStructure {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_rule_tables() {
        let bare: RuleTableStructure = serde_json::from_str(
            r#"[{"name": "A", "pattern": [{"LEMMA": "play"}], "avm": {"ALL": {"MENTION": "ONLINE_GAMING"}}}]"#,
        )
        .unwrap();
        assert!(bare.attributes().is_empty());
        assert_eq!(bare.into_rules().len(), 1);

        let declared: RuleTableStructure = serde_json::from_str(
            r#"{"attributes": ["LA"], "rules": [{"name": "A", "pattern": [{}]}]}"#,
        )
        .unwrap();
        assert_eq!(declared.attributes(), &["LA".to_string()]);
    }

    #[test]
    fn parses_steps() {
        let rule = parse(
            r#"{
                "name": "CHAT",
                "pattern": [
                    {"LEMMA": {"IN": ["talk", "chat"]}, "OP": "+"},
                    {"_": {"LA": false}, "POS": {"NOT_IN": ["PUNCT"]}},
                    {"ORTH": {"REGEX": "^[Oo]nline$"}}
                ],
                "avm": {"ALL": {"MENTION": "CHAT", "LA": false}},
                "merge": true
            }"#,
        );

        assert_eq!(rule.pattern[0].op.as_deref(), Some("+"));
        assert!(rule.pattern[1].custom.contains_key("LA"));
        assert!(rule.pattern[1].token.contains_key("POS"));
        assert!(!rule.pattern[1].token.contains_key("_"));

        let mut schema = Schema::new();
        let compiled = rule.compile(&mut schema).unwrap();

        assert!(schema.attribute("LA").is_some());
        assert_eq!(compiled.avm.len(), 2);
        assert_eq!(compiled.avm[1].1, Value::Unset);
        assert!(compiled.merge);
    }

    #[test]
    fn rejects_unknown_attributes_and_ops() {
        let mut schema = Schema::new();

        let unknown = parse(r#"{"name": "X", "pattern": [{"SHAPE": "Xxxx"}]}"#);
        assert!(matches!(
            unknown.compile(&mut schema),
            Err(Error::UnknownAttribute { .. })
        ));

        let op = parse(r#"{"name": "X", "pattern": [{"LEMMA": "a", "OP": "{2}"}]}"#);
        assert!(matches!(
            op.compile(&mut schema),
            Err(Error::RuleStructure { .. })
        ));

        let avm = parse(r#"{"name": "X", "pattern": [{}], "avm": {"FIRST": {"MENTION": "A"}}}"#);
        assert!(matches!(
            avm.compile(&mut schema),
            Err(Error::RuleStructure { .. })
        ));
    }
}
