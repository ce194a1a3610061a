//! Site vocabulary: the structural pattern tables the engine classifies with.
//!
//! These track the feed's current markup and are expected to need edits when
//! it changes. Every table can be replaced from the config file.

use mediashade_dom::Pattern;
use serde::{Deserialize, Serialize};

/// Revision of the built-in tables, bumped whenever they change.
pub const TABLES_REVISION: u32 = 1;

const TEST_ID: &str = "data-testid";

/// The pattern sets used for classification and sweeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternTables {
    /// Revision these tables correspond to.
    pub revision: u32,
    /// Roots of avatar/profile regions. Nothing at or below a match is ever concealed.
    pub protected_zones: Vec<Pattern>,
    /// Candidates visited by the light sweep and by scoped sweeps.
    pub media_candidates: Vec<Pattern>,
    /// Everything the aggressive sweep re-evaluates.
    pub aggressive_candidates: Vec<Pattern>,
    /// Descendants that make an element count as media-bearing.
    pub media_descendants: Vec<Pattern>,
}

impl PatternTables {
    /// The built-in tables.
    pub fn builtin() -> Self {
        Self {
            revision: TABLES_REVISION,
            protected_zones: vec![
                // wrapper around each post's avatar
                Pattern::attr_equals(TEST_ID, "Tweet-User-Avatar"),
                // avatar container, suffixed with the handle
                Pattern::attr_prefix(TEST_ID, "UserAvatar-Container"),
                Pattern::attr_equals(TEST_ID, "UserAvatar"),
                Pattern::attr_contains(TEST_ID, "Avatar"),
                // account switcher in the side nav
                Pattern::attr_equals(TEST_ID, "SideNav_AccountSwitcher_Button"),
            ],
            media_candidates: vec![
                Pattern::tag("img").and(Pattern::attr_contains("src", "twimg.com")),
                Pattern::tag("video"),
                Pattern::attr_equals(TEST_ID, "tweetPhoto"),
                Pattern::tag("img").within(card()),
                Pattern::tag("video").within(card()),
                Pattern::attr_contains(TEST_ID, "media").within(card()),
                Pattern::attr_equals(TEST_ID, "mediaContainer"),
                Pattern::attr_equals(TEST_ID, "mediaGrid"),
                Pattern::attr_equals(TEST_ID, "mediaItem"),
                Pattern::attr_equals(TEST_ID, "mediaWrapper"),
                Pattern::attr_equals(TEST_ID, "gif"),
                Pattern::attr_equals(TEST_ID, "gifContainer"),
                Pattern::tag("img").within(Pattern::tag("article")),
                Pattern::tag("img").within(Pattern::attr_equals(TEST_ID, "tweet")),
                Pattern::attr_equals("role", "img"),
            ],
            aggressive_candidates: vec![
                Pattern::tag("img"),
                Pattern::tag("video"),
                Pattern::attr_contains(TEST_ID, "media"),
            ],
            media_descendants: vec![
                Pattern::tag("img"),
                Pattern::tag("video"),
                Pattern::attr_contains(TEST_ID, "media"),
            ],
        }
    }

    /// The first malformed pattern, if any, with the table it sits in.
    pub fn first_invalid(&self) -> Option<(&'static str, &Pattern)> {
        let tables: [(&'static str, &Vec<Pattern>); 4] = [
            ("protected_zones", &self.protected_zones),
            ("media_candidates", &self.media_candidates),
            ("aggressive_candidates", &self.aggressive_candidates),
            ("media_descendants", &self.media_descendants),
        ];
        tables.into_iter().find_map(|(name, patterns)| {
            patterns
                .iter()
                .find(|p| p.validate().is_err())
                .map(|p| (name, p))
        })
    }
}

impl Default for PatternTables {
    fn default() -> Self {
        Self::builtin()
    }
}

fn card() -> Pattern {
    Pattern::attr_contains(TEST_ID, "card")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid() {
        let tables = PatternTables::builtin();
        assert!(tables.first_invalid().is_none());
        assert_eq!(tables.protected_zones.len(), 5);
        assert_eq!(tables.media_candidates.len(), 15);
    }

    #[test]
    fn test_first_invalid_names_the_table() {
        let mut tables = PatternTables::builtin();
        tables.aggressive_candidates.push(Pattern::attr_exists(""));
        let (table, _) = tables.first_invalid().unwrap();
        assert_eq!(table, "aggressive_candidates");
    }

    #[test]
    fn test_partial_override_keeps_other_tables() {
        let tables: PatternTables =
            serde_json::from_str(r#"{"aggressive_candidates": [{"tag": "picture"}]}"#).unwrap();
        assert_eq!(tables.aggressive_candidates, vec![Pattern::tag("picture")]);
        assert_eq!(tables.protected_zones, PatternTables::builtin().protected_zones);
    }
}
