//! Namespace Selectors
//!
//! Queues restrict which tenant namespaces may attach to them through a label selector. The
//! configured form, `[LabelSelector]`, is validated and converted into a `[Selector]` once per
//! spec update. A selector that fails validation is a configuration error and must leave the
//! queue in its previous state, so conversion happens before anything is modified.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// Configured label selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// A single configured selector expression.
///
/// The operator is kept as text so that unknown operators are reported as configuration errors
/// rather than failing deserialization of the whole spec.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

/// A validated label selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    // `None` selects nothing; an empty list selects everything.
    requirements: Option<Vec<Requirement>>,
}

fn is_alnum(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

// Name part of a label key, and label values: at most 63 characters, alphanumeric at both ends,
// with `-`, `_` and `.` allowed in between.
fn is_qualified_name_part(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(&first), Some(&last)) => {
            bytes.len() <= 63
                && is_alnum(first)
                && is_alnum(last)
                && bytes.iter().all(|&b| is_alnum(b) || b == b'-' || b == b'_' || b == b'.')
        }
        _ => false,
    }
}

// RFC-1123 subdomain, used as label key prefix.
fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            let bytes = label.as_bytes();
            match (bytes.first(), bytes.last()) {
                (Some(&first), Some(&last)) => {
                    bytes.len() <= 63
                        && (first.is_ascii_lowercase() || first.is_ascii_digit())
                        && (last.is_ascii_lowercase() || last.is_ascii_digit())
                        && bytes.iter().all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
                }
                _ => false,
            }
        })
}

fn validate_key(key: &str) -> Result<()> {
    let valid = match key.rfind('/') {
        Some(i) => is_dns_subdomain(&key[..i]) && is_qualified_name_part(&key[i + 1..]),
        None => is_qualified_name_part(key),
    };

    if valid {
        Ok(())
    } else {
        Err(Error::invalid_selector(format!("invalid label key {:?}", key)))
    }
}

fn validate_value(value: &str) -> Result<()> {
    if value.is_empty() || is_qualified_name_part(value) {
        Ok(())
    } else {
        Err(Error::invalid_selector(format!("invalid label value {:?}", value)))
    }
}

impl Requirement {
    fn new(key: &str, operator: &str, values: &[String]) -> Result<Self> {
        validate_key(key)?;

        let operator = match operator {
            "In" => Operator::In,
            "NotIn" => Operator::NotIn,
            "Exists" => Operator::Exists,
            "DoesNotExist" => Operator::DoesNotExist,
            _ => {
                return Err(Error::invalid_selector(format!("{:?} is not a valid selector operator", operator)));
            }
        };

        match operator {
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(Error::invalid_selector(format!("values for key {:?} must be non-empty", key)));
            }
            Operator::Exists | Operator::DoesNotExist if !values.is_empty() => {
                return Err(Error::invalid_selector(format!("values for key {:?} must be empty", key)));
            }
            _ => {}
        }

        for value in values {
            validate_value(value)?;
        }

        Ok(Requirement {
            key: key.to_owned(),
            operator: operator,
            values: values.iter().cloned().collect(),
        })
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);

        match self.operator {
            Operator::In => value.map_or(false, |v| self.values.contains(v)),
            Operator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl Selector {
    /// A selector that selects nothing.
    pub fn nothing() -> Self {
        Selector {
            requirements: None,
        }
    }

    /// A selector that selects everything.
    pub fn everything() -> Self {
        Selector {
            requirements: Some(Vec::new()),
        }
    }

    /// Validate and convert a configured selector.
    ///
    /// A missing selector selects nothing, while an empty selector selects everything.
    pub fn parse(selector: Option<&LabelSelector>) -> Result<Self> {
        let selector = match selector {
            Some(v) => v,
            None => return Ok(Selector::nothing()),
        };

        let mut requirements = Vec::with_capacity(
            selector.match_labels.len() + selector.match_expressions.len(),
        );
        for (key, value) in &selector.match_labels {
            requirements.push(Requirement::new(key, "In", std::slice::from_ref(value))?);
        }
        for expr in &selector.match_expressions {
            requirements.push(Requirement::new(&expr.key, &expr.operator, &expr.values)?);
        }

        Ok(Selector {
            requirements: Some(requirements),
        })
    }

    /// Check whether the selector matches a set of labels.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match &self.requirements {
            None => false,
            Some(requirements) => requirements.iter().all(|r| r.matches(labels)),
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::nothing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v.to_owned())).collect()
    }

    fn expr(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_owned(),
            operator: operator.to_owned(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn nothing_and_everything() {
        let team = labels(&[("team", "a")]);

        assert!{!Selector::parse(None).unwrap().matches(&team)};
        assert!{Selector::parse(Some(&LabelSelector::default())).unwrap().matches(&team)};
        assert!{Selector::parse(Some(&LabelSelector::default())).unwrap().matches(&labels(&[]))};
    }

    #[test]
    fn match_labels_and_expressions() {
        let selector = LabelSelector {
            match_labels: labels(&[("team", "a")]),
            match_expressions: vec![
                expr("env", "In", &["prod", "staging"]),
                expr("example.com/tier", "NotIn", &["batch"]),
                expr("owner", "Exists", &[]),
                expr("legacy", "DoesNotExist", &[]),
            ],
        };
        let s = Selector::parse(Some(&selector)).unwrap();

        assert!{s.matches(&labels(&[("team", "a"), ("env", "prod"), ("owner", "x")]))};
        assert!{s.matches(&labels(&[("team", "a"), ("env", "staging"), ("owner", "x"), ("example.com/tier", "web")]))};
        assert!{!s.matches(&labels(&[("team", "b"), ("env", "prod"), ("owner", "x")]))};
        assert!{!s.matches(&labels(&[("team", "a"), ("env", "dev"), ("owner", "x")]))};
        assert!{!s.matches(&labels(&[("team", "a"), ("env", "prod"), ("owner", "x"), ("example.com/tier", "batch")]))};
        assert!{!s.matches(&labels(&[("team", "a"), ("env", "prod")]))};
        assert!{!s.matches(&labels(&[("team", "a"), ("env", "prod"), ("owner", "x"), ("legacy", "")]))};
    }

    #[test]
    fn malformed() {
        let cases = vec![
            expr("env", "Matches", &["prod"]),
            expr("env", "In", &[]),
            expr("env", "NotIn", &[]),
            expr("env", "Exists", &["prod"]),
            expr("env", "DoesNotExist", &["prod"]),
            expr("", "Exists", &[]),
            expr("-env", "Exists", &[]),
            expr("Example.com/env", "Exists", &[]),
            expr("example.com/", "Exists", &[]),
            expr(&"x".repeat(64), "Exists", &[]),
            expr("env", "In", &["not valid"]),
        ];

        for case in cases {
            let selector = LabelSelector {
                match_labels: BTreeMap::new(),
                match_expressions: vec![case.clone()],
            };

            match Selector::parse(Some(&selector)) {
                Err(Error::InvalidSelector { .. }) => {}
                r => panic!("unexpected result for {:?}: {:?}", case, r),
            }
        }

        let selector = LabelSelector {
            match_labels: labels(&[("team", "a b")]),
            match_expressions: Vec::new(),
        };
        assert!{Selector::parse(Some(&selector)).is_err()};
    }

    #[test]
    fn deserialize() {
        let selector: LabelSelector = serde_json::from_str(r#"{
            "matchLabels": { "team": "a" },
            "matchExpressions": [ { "key": "env", "operator": "In", "values": ["prod"] } ]
        }"#).unwrap();
        let s = Selector::parse(Some(&selector)).unwrap();

        assert!{s.matches(&labels(&[("team", "a"), ("env", "prod")]))};
        assert!{!s.matches(&labels(&[("team", "a")]))};
    }
}
