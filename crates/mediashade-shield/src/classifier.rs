//! Element classification.
//!
//! Pure predicates: answers depend only on an element's attributes, its
//! ancestry and its rendered box. This is a heuristic subsystem with known
//! misses; small content images read as icons, and media whose markup
//! carries none of the keywords reads as plain content.

use std::rc::Rc;

use mediashade_core::{PatternTables, ShieldConfig};
use mediashade_dom::{Node, Pattern};
use tracing::trace;

const TEST_ID: &str = "data-testid";

/// What the classifier decided about one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Inside an avatar zone; never concealed.
    Protected,
    /// Icon, emoji or tiny image; never concealed.
    Decorative,
    /// Content media; concealed while enabled.
    Media,
    /// Anything else.
    Other,
}

/// Heuristic element classifier driven by pattern tables and keyword lists.
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: PatternTables,
    marker_class: String,
    min_dimension: f32,
    decorative_keywords: Vec<String>,
    media_keywords: Vec<String>,
    container_keywords: Vec<String>,
}

impl Classifier {
    pub fn from_config(config: &ShieldConfig) -> Self {
        Self {
            tables: config.patterns.clone(),
            marker_class: config.marker_class.clone(),
            min_dimension: config.min_media_dimension,
            decorative_keywords: lowercase(&config.decorative_keywords),
            media_keywords: config.media_keywords.clone(),
            container_keywords: config.container_keywords.clone(),
        }
    }

    pub fn tables(&self) -> &PatternTables {
        &self.tables
    }

    /// Single-step decision, protected first.
    pub fn classify(&self, el: &Rc<Node>) -> Classification {
        if self.is_protected(el) {
            Classification::Protected
        } else if self.is_decorative(el) {
            Classification::Decorative
        } else if self.is_media_content(el) {
            Classification::Media
        } else {
            Classification::Other
        }
    }

    /// `!protected && !decorative && media`. Protection is an absolute veto.
    pub fn should_conceal(&self, el: &Rc<Node>) -> bool {
        self.classify(el) == Classification::Media
    }

    /// Whether `el` itself roots a protected zone.
    pub fn is_zone_root(&self, el: &Node) -> bool {
        matches_any(&self.tables.protected_zones, el)
    }

    /// Closest protected zone root, inclusive of `el`.
    pub fn protected_zone(&self, el: &Rc<Node>) -> Option<Rc<Node>> {
        std::iter::once(el.clone())
            .chain(el.ancestors())
            .find(|n| self.is_zone_root(n))
    }

    /// `el` or any ancestor roots a protected zone.
    pub fn is_protected(&self, el: &Rc<Node>) -> bool {
        self.protected_zone(el).is_some()
    }

    /// Icons, emoji, avatars by naming convention; images by size.
    pub fn is_decorative(&self, el: &Node) -> bool {
        for attr in [TEST_ID, "alt", "src"] {
            if let Some(value) = el.get_attribute(attr) {
                if contains_keyword(&value, &self.decorative_keywords) {
                    return true;
                }
            }
        }

        if el.is_tag("img") {
            if let Some(rect) = el.layout_box() {
                return rect.width < self.min_dimension || rect.height < self.min_dimension;
            }
        }
        false
    }

    /// Image/video tags, media-named test IDs, or anything holding such.
    pub fn is_media_content(&self, el: &Node) -> bool {
        if el.is_tag("img") || el.is_tag("video") {
            return true;
        }
        if self.has_media_test_id(el) {
            return true;
        }
        self.has_media_descendant(el)
    }

    /// Ancestors that exist to host media. Used only by the container walk.
    pub fn is_media_container(&self, el: &Node) -> bool {
        if self.has_media_test_id(el) {
            return true;
        }

        let classes = el
            .class_list()
            .into_iter()
            .filter(|c| *c != self.marker_class)
            .collect::<Vec<_>>()
            .join(" ");
        if contains_exact(&classes, &self.container_keywords) {
            return true;
        }

        self.has_media_descendant(el)
    }

    fn has_media_test_id(&self, el: &Node) -> bool {
        el.get_attribute(TEST_ID)
            .map(|id| contains_exact(&id, &self.media_keywords))
            .unwrap_or(false)
    }

    fn has_media_descendant(&self, el: &Node) -> bool {
        el.descendants()
            .iter()
            .any(|d| matches_any(&self.tables.media_descendants, d))
    }

    /// Elements in the inclusive subtree of `root` matching `pattern`, in
    /// document order. Evaluation failures skip the element.
    pub fn select(&self, root: &Rc<Node>, pattern: &Pattern) -> Vec<Rc<Node>> {
        root.inclusive_descendants()
            .into_iter()
            .filter(|n| evaluate(pattern, n))
            .collect()
    }

    /// Elements in the inclusive subtree matching any of `patterns`.
    pub fn select_any(&self, root: &Rc<Node>, patterns: &[Pattern]) -> Vec<Rc<Node>> {
        root.inclusive_descendants()
            .into_iter()
            .filter(|n| matches_any(patterns, n))
            .collect()
    }

    /// Whether a protected zone root sits anywhere in the inclusive subtree.
    pub fn holds_zone(&self, el: &Rc<Node>) -> bool {
        el.inclusive_descendants()
            .iter()
            .any(|n| self.is_zone_root(n))
    }

    /// Every protected zone root in the inclusive subtree of `root`.
    pub fn zones_in(&self, root: &Rc<Node>) -> Vec<Rc<Node>> {
        self.select_any(root, &self.tables.protected_zones)
    }
}

fn evaluate(pattern: &Pattern, node: &Node) -> bool {
    match pattern.matches(node) {
        Ok(matched) => matched,
        Err(e) => {
            trace!(pattern = %pattern, node = node.id.raw(), error = %e, "Pattern evaluation failed");
            false
        }
    }
}

fn matches_any(patterns: &[Pattern], node: &Node) -> bool {
    patterns.iter().any(|p| evaluate(p, node))
}

/// Case-insensitive; `keywords` are already lowercase.
fn contains_keyword(value: &str, keywords: &[String]) -> bool {
    contains_exact(&value.to_lowercase(), keywords)
}

fn contains_exact(value: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && value.contains(k.as_str()))
}

fn lowercase(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
