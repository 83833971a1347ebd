//! Kubernetes label selectors
//!
//! Parses selector expressions (`app=web,tier in (a,b),!legacy`), matches
//! them against label or annotation maps, and normalizes structured
//! `LabelSelector`s into the same expression form.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use pest::Parser;
use pest_derive::Parser;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, Result};

#[derive(Parser)]
#[grammar = "selector.pest"]
struct SelectorParser;

/// Selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

/// A single `key <op> values` requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    /// Sorted for `In` / `NotIn`
    pub values: Vec<String>,
}

impl Requirement {
    pub fn new(key: impl Into<String>, operator: Operator, mut values: Vec<String>) -> Self {
        if matches!(operator, Operator::In | Operator::NotIn) {
            values.sort();
            values.dedup();
        }
        Self {
            key: key.into(),
            operator,
            values,
        }
    }

    /// Does the label map satisfy this requirement?
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        let first = self.values.first();
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals => value.is_some() && value == first,
            Operator::NotEquals => value.is_none() || value != first,
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::GreaterThan | Operator::LessThan => {
                let (Some(actual), Some(bound)) = (
                    value.and_then(|v| v.parse::<i64>().ok()),
                    first.and_then(|v| v.parse::<i64>().ok()),
                ) else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.values.first().map(String::as_str).unwrap_or("");
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, first),
            Operator::NotEquals => write!(f, "{}!={}", self.key, first),
            Operator::In => write!(f, "{} in ({})", self.key, self.values.join(",")),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, self.values.join(",")),
            Operator::GreaterThan => write!(f, "{}>{}", self.key, first),
            Operator::LessThan => write!(f, "{}<{}", self.key, first),
        }
    }
}

/// A conjunction of requirements; the empty selector matches everything
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// The match-all selector
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    /// Parse a selector expression
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Self::everything());
        }

        let invalid = |message: String| CoreError::InvalidSelector {
            selector: input.to_string(),
            message,
        };

        let pairs = SelectorParser::parse(Rule::selector, input)
            .map_err(|e| invalid(e.variant.message().to_string()))?;

        let mut requirements = Vec::new();
        for pair in pairs.flatten().filter(|p| p.as_rule() == Rule::requirement) {
            let Some(inner) = pair.into_inner().next() else {
                continue;
            };
            let rule = inner.as_rule();
            let mut parts = inner.into_inner();
            let key = parts
                .next()
                .map(|p| p.as_str().to_string())
                .ok_or_else(|| invalid("missing key".to_string()))?;

            let requirement = match rule {
                Rule::exists => Requirement::new(key, Operator::Exists, vec![]),
                Rule::not_exists => Requirement::new(key, Operator::DoesNotExist, vec![]),
                Rule::set_requirement => {
                    let op = parts.next().map(|p| p.as_str()).unwrap_or("in");
                    let values = parts.map(|p| p.as_str().to_string()).collect();
                    let operator = if op == "notin" {
                        Operator::NotIn
                    } else {
                        Operator::In
                    };
                    Requirement::new(key, operator, values)
                }
                Rule::equality_requirement => {
                    let op = parts.next().map(|p| p.as_str()).unwrap_or("=");
                    let value = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                    let operator = match op {
                        "!=" => Operator::NotEquals,
                        ">" => Operator::GreaterThan,
                        "<" => Operator::LessThan,
                        _ => Operator::Equals,
                    };
                    Requirement::new(key, operator, vec![value])
                }
                other => return Err(invalid(format!("unexpected {:?}", other))),
            };
            requirements.push(requirement);
        }

        Ok(Self { requirements })
    }

    /// Normalize a structured `LabelSelector` into a selector
    ///
    /// `matchLabels` become `key=value` (sorted by key), followed by the
    /// `matchExpressions` in declaration order.
    pub fn from_label_selector(label_selector: &LabelSelector) -> Result<Self> {
        let mut requirements = Vec::new();

        if let Some(match_labels) = &label_selector.match_labels {
            for (key, value) in match_labels {
                requirements.push(Requirement::new(key, Operator::Equals, vec![value.clone()]));
            }
        }

        for expr in label_selector.match_expressions.iter().flatten() {
            let values = expr.values.clone().unwrap_or_default();
            let operator = match expr.operator.as_str() {
                "In" => Operator::In,
                "NotIn" => Operator::NotIn,
                "Exists" => Operator::Exists,
                "DoesNotExist" => Operator::DoesNotExist,
                other => {
                    return Err(CoreError::InvalidSelector {
                        selector: expr.key.clone(),
                        message: format!("unknown operator '{}'", other),
                    });
                }
            };
            if matches!(operator, Operator::In | Operator::NotIn) && values.is_empty() {
                return Err(CoreError::InvalidSelector {
                    selector: expr.key.clone(),
                    message: format!("operator '{}' requires values", expr.operator),
                });
            }
            let values = if matches!(operator, Operator::Exists | Operator::DoesNotExist) {
                vec![]
            } else {
                values
            };
            requirements.push(Requirement::new(&expr.key, operator, values));
        }

        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Does the map satisfy every requirement?
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl std::str::FromStr for Selector {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Normalize a `LabelSelector` into its expression string
pub fn normalize(label_selector: &LabelSelector) -> Result<String> {
    Ok(Selector::from_label_selector(label_selector)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_all_operators() {
        let selector = Selector::parse(
            "app=web, tier!=db,env in (prod, dev),zone notin (b,a),managed,!legacy,rev>2,gen<9",
        )
        .unwrap();
        assert_eq!(selector.requirements().len(), 8);
        assert_eq!(
            selector.to_string(),
            "app=web,tier!=db,env in (dev,prod),zone notin (a,b),managed,!legacy,rev>2,gen<9"
        );
    }

    #[test]
    fn test_double_equals_normalizes() {
        let selector = Selector::parse("app.kubernetes.io/name==mysql").unwrap();
        assert_eq!(selector.to_string(), "app.kubernetes.io/name=mysql");
    }

    #[test]
    fn test_empty_matches_everything() {
        let selector = Selector::parse("  ").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            Selector::parse("app=web,,"),
            Err(CoreError::InvalidSelector { .. })
        ));
        assert!(Selector::parse("a b").is_err());
    }

    #[test]
    fn test_matching() {
        let l = labels(&[("app", "web"), ("env", "prod"), ("rev", "3")]);

        assert!(Selector::parse("app=web").unwrap().matches(&l));
        assert!(!Selector::parse("app=db").unwrap().matches(&l));
        assert!(Selector::parse("tier!=db").unwrap().matches(&l));
        assert!(Selector::parse("env in (prod,dev)").unwrap().matches(&l));
        assert!(!Selector::parse("env notin (prod)").unwrap().matches(&l));
        assert!(Selector::parse("missing notin (x)").unwrap().matches(&l));
        assert!(Selector::parse("app,!legacy").unwrap().matches(&l));
        assert!(Selector::parse("rev>2").unwrap().matches(&l));
        assert!(!Selector::parse("rev<2").unwrap().matches(&l));
        assert!(!Selector::parse("missing in (x)").unwrap().matches(&l));
    }

    #[test]
    fn test_normalize_label_selector() {
        let ls = LabelSelector {
            match_labels: Some(
                [("b", "2"), ("a", "1")]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            match_expressions: Some(vec![
                LabelSelectorRequirement {
                    key: "env".into(),
                    operator: "In".into(),
                    values: Some(vec!["prod".into(), "dev".into()]),
                },
                LabelSelectorRequirement {
                    key: "tier".into(),
                    operator: "NotIn".into(),
                    values: Some(vec!["z".into(), "y".into()]),
                },
                LabelSelectorRequirement {
                    key: "managed".into(),
                    operator: "Exists".into(),
                    values: None,
                },
                LabelSelectorRequirement {
                    key: "legacy".into(),
                    operator: "DoesNotExist".into(),
                    values: None,
                },
            ]),
        };

        let normalized = normalize(&ls).unwrap();
        assert_eq!(
            normalized,
            "a=1,b=2,env in (dev,prod),tier notin (y,z),managed,!legacy"
        );

        // Normalizing is a fixed point through the expression form
        let reparsed = Selector::parse(&normalized).unwrap();
        assert_eq!(reparsed.to_string(), normalized);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let ls = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "a".into(),
                operator: "Near".into(),
                values: None,
            }]),
        };
        assert!(normalize(&ls).is_err());
    }
}
