//! # Structural Patterns
//!
//! A small declarative matching language over elements: tag name, attribute
//! tests, class tokens, and "has an ancestor matching" composed with
//! all/any/not. Patterns are plain data so tables of them can live in config.
//!
//! Attribute and class tests are case-sensitive, as in CSS. Prefix and
//! substring tests against an empty value never match.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Node;

/// Errors raised while evaluating a malformed pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty {0} in pattern")]
    Empty(&'static str),

    #[error("invalid attribute name: {0:?}")]
    InvalidAttributeName(String),

    #[error("combinator has no operands")]
    EmptyCombinator,
}

/// How an attribute value is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrOp {
    /// `[name]`
    #[default]
    Exists,
    /// `[name="value"]`
    Equals,
    /// `[name^="value"]`
    Prefix,
    /// `[name*="value"]`
    Contains,
}

/// A structural predicate over elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Tag name, ASCII case-insensitive.
    Tag(String),
    /// Attribute test.
    Attr {
        name: String,
        #[serde(default)]
        op: AttrOp,
        #[serde(default)]
        value: String,
    },
    /// Class token.
    Class(String),
    /// Some proper ancestor element matches.
    Within(Box<Pattern>),
    /// Every operand matches.
    All(Vec<Pattern>),
    /// At least one operand matches.
    Any(Vec<Pattern>),
    /// The operand does not match.
    Not(Box<Pattern>),
}

impl Pattern {
    pub fn tag(name: &str) -> Self {
        Pattern::Tag(name.to_string())
    }

    pub fn class(name: &str) -> Self {
        Pattern::Class(name.to_string())
    }

    pub fn attr_exists(name: &str) -> Self {
        Self::attr(name, AttrOp::Exists, "")
    }

    pub fn attr_equals(name: &str, value: &str) -> Self {
        Self::attr(name, AttrOp::Equals, value)
    }

    pub fn attr_prefix(name: &str, value: &str) -> Self {
        Self::attr(name, AttrOp::Prefix, value)
    }

    pub fn attr_contains(name: &str, value: &str) -> Self {
        Self::attr(name, AttrOp::Contains, value)
    }

    fn attr(name: &str, op: AttrOp, value: &str) -> Self {
        Pattern::Attr {
            name: name.to_string(),
            op,
            value: value.to_string(),
        }
    }

    /// This pattern, additionally requiring an ancestor matching `ancestor`.
    pub fn within(self, ancestor: Pattern) -> Self {
        Pattern::All(vec![self, Pattern::Within(Box::new(ancestor))])
    }

    /// This pattern and `other`.
    pub fn and(self, other: Pattern) -> Self {
        match self {
            Pattern::All(mut operands) => {
                operands.push(other);
                Pattern::All(operands)
            }
            first => Pattern::All(vec![first, other]),
        }
    }

    /// Negation.
    pub fn negate(self) -> Self {
        Pattern::Not(Box::new(self))
    }

    /// Check the pattern for malformed parts without evaluating it.
    pub fn validate(&self) -> Result<(), PatternError> {
        match self {
            Pattern::Tag(name) if name.trim().is_empty() => Err(PatternError::Empty("tag")),
            Pattern::Class(name) if name.trim().is_empty() => Err(PatternError::Empty("class")),
            Pattern::Tag(_) | Pattern::Class(_) => Ok(()),
            Pattern::Attr { name, .. } => check_attribute_name(name),
            Pattern::Within(inner) | Pattern::Not(inner) => inner.validate(),
            Pattern::All(operands) | Pattern::Any(operands) => {
                if operands.is_empty() {
                    return Err(PatternError::EmptyCombinator);
                }
                operands.iter().try_for_each(Pattern::validate)
            }
        }
    }

    /// Evaluate against one node. Non-elements never match.
    pub fn matches(&self, node: &Node) -> Result<bool, PatternError> {
        if !node.is_element() {
            return Ok(false);
        }

        match self {
            Pattern::Tag(name) => {
                if name.trim().is_empty() {
                    return Err(PatternError::Empty("tag"));
                }
                Ok(node.is_tag(name))
            }
            Pattern::Attr { name, op, value } => {
                check_attribute_name(name)?;
                let Some(actual) = node.get_attribute(name) else {
                    return Ok(false);
                };
                Ok(match op {
                    AttrOp::Exists => true,
                    AttrOp::Equals => actual == *value,
                    AttrOp::Prefix => !value.is_empty() && actual.starts_with(value.as_str()),
                    AttrOp::Contains => !value.is_empty() && actual.contains(value.as_str()),
                })
            }
            Pattern::Class(name) => {
                if name.trim().is_empty() {
                    return Err(PatternError::Empty("class"));
                }
                Ok(node.has_class(name))
            }
            Pattern::Within(inner) => {
                for ancestor in node.ancestors() {
                    if inner.matches(&ancestor)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pattern::All(operands) => {
                if operands.is_empty() {
                    return Err(PatternError::EmptyCombinator);
                }
                for operand in operands {
                    if !operand.matches(node)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Pattern::Any(operands) => {
                if operands.is_empty() {
                    return Err(PatternError::EmptyCombinator);
                }
                for operand in operands {
                    if operand.matches(node)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pattern::Not(inner) => Ok(!inner.matches(node)?),
        }
    }
}

fn check_attribute_name(name: &str) -> Result<(), PatternError> {
    let bad = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '[' | ']'));
    if bad {
        Err(PatternError::InvalidAttributeName(name.to_string()))
    } else {
        Ok(())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Tag(name) => write!(f, "{name}"),
            Pattern::Attr { name, op, value } => match op {
                AttrOp::Exists => write!(f, "[{name}]"),
                AttrOp::Equals => write!(f, "[{name}=\"{value}\"]"),
                AttrOp::Prefix => write!(f, "[{name}^=\"{value}\"]"),
                AttrOp::Contains => write!(f, "[{name}*=\"{value}\"]"),
            },
            Pattern::Class(name) => write!(f, ".{name}"),
            Pattern::Within(inner) => write!(f, ":within({inner})"),
            Pattern::All(operands) => operands.iter().try_for_each(|p| write!(f, "{p}")),
            Pattern::Any(operands) => {
                write!(f, ":is(")?;
                for (i, p) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            Pattern::Not(inner) => write!(f, ":not({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn doc() -> Document {
        Document::parse_html(
            r#"<html><body>
                <div data-testid="UserAvatar-Container-jack" id="zone">
                    <img id="avatar" src="profile.jpg">
                </div>
                <article id="post">
                    <div data-testid="card.wrapper"><img id="card-img" class="thumb big"></div>
                </article>
            </body></html>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_attribute_ops() {
        let doc = doc();
        let zone = doc.get_element_by_id("zone").unwrap();

        assert!(Pattern::attr_prefix("data-testid", "UserAvatar-Container")
            .matches(&zone)
            .unwrap());
        assert!(Pattern::attr_contains("data-testid", "Avatar")
            .matches(&zone)
            .unwrap());
        assert!(!Pattern::attr_equals("data-testid", "UserAvatar")
            .matches(&zone)
            .unwrap());
        assert!(Pattern::attr_exists("data-testid").matches(&zone).unwrap());
        assert!(!Pattern::attr_contains("data-testid", "").matches(&zone).unwrap());
    }

    #[test]
    fn test_within_is_descendant_combinator() {
        let doc = doc();
        let card_img = doc.get_element_by_id("card-img").unwrap();
        let avatar = doc.get_element_by_id("avatar").unwrap();

        let card_images = Pattern::tag("img").within(Pattern::attr_contains("data-testid", "card"));
        assert!(card_images.matches(&card_img).unwrap());
        assert!(!card_images.matches(&avatar).unwrap());

        let article_images = Pattern::tag("img").within(Pattern::tag("article"));
        assert!(article_images.matches(&card_img).unwrap());
        let article = doc.get_element_by_id("post").unwrap();
        assert!(!article_images.matches(&article).unwrap());
    }

    #[test]
    fn test_class_and_negation() {
        let doc = doc();
        let card_img = doc.get_element_by_id("card-img").unwrap();

        assert!(Pattern::class("thumb").matches(&card_img).unwrap());
        assert!(!Pattern::class("thu").matches(&card_img).unwrap());
        assert!(Pattern::tag("IMG")
            .and(Pattern::class("big").negate())
            .negate()
            .matches(&card_img)
            .unwrap());
    }

    #[test]
    fn test_malformed_patterns_error() {
        let doc = doc();
        let zone = doc.get_element_by_id("zone").unwrap();

        let bad_name = Pattern::attr_equals("data testid", "x");
        assert!(matches!(
            bad_name.matches(&zone),
            Err(PatternError::InvalidAttributeName(_))
        ));
        assert_eq!(Pattern::Any(vec![]).matches(&zone), Err(PatternError::EmptyCombinator));
        assert_eq!(Pattern::tag(" ").validate(), Err(PatternError::Empty("tag")));
        assert!(Pattern::tag("img").within(Pattern::class("x")).validate().is_ok());
    }

    #[test]
    fn test_non_elements_never_match() {
        let doc = doc();
        assert!(!Pattern::attr_exists("id").matches(doc.root()).unwrap());
    }

    #[test]
    fn test_display() {
        let p = Pattern::tag("img").within(Pattern::attr_contains("data-testid", "card"));
        assert_eq!(p.to_string(), r#"img:within([data-testid*="card"])"#);
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"{"attr": {"name": "data-testid", "op": "prefix", "value": "UserAvatar"}}"#;
        let p: Pattern = serde_json::from_str(json).unwrap();
        assert_eq!(p, Pattern::attr_prefix("data-testid", "UserAvatar"));

        let json = r#"{"all": [{"tag": "img"}, {"within": {"tag": "article"}}]}"#;
        let p: Pattern = serde_json::from_str(json).unwrap();
        assert_eq!(p, Pattern::tag("img").within(Pattern::tag("article")));
    }
}
