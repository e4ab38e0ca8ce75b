//! Localization table with placeholder substitution.
//!
//! The table maps dot-joined keys to display text, loaded from a JSON
//! document that may be flat (`"npc.elder.name": "Elder Maren"`) or
//! nested (`"npc": {"elder": {"name": ...}}`); nesting flattens at load
//! time. Missing keys resolve to the key itself so broken content shows
//! up on screen instead of crashing or vanishing.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::content::{ContentError, ContentResult};

/// Key→text table for one language.
#[derive(Debug, Clone, Default)]
pub struct Localization {
    table: HashMap<String, String>,
}

impl Localization {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Replaces the whole table from a JSON document.
    ///
    /// Nested objects flatten to dot-joined keys; non-string leaves are
    /// skipped with a warning. On a malformed document the table keeps
    /// its previous contents. Returns the number of keys loaded.
    pub fn load_json(&mut self, json: &str) -> ContentResult<usize> {
        let value: Value = serde_json::from_str(json)
            .map_err(|error| ContentError::Json(error.to_string()))?;
        let Value::Object(root) = value else {
            return Err(ContentError::NotAnObject);
        };

        let mut table = HashMap::new();
        for (key, value) in root {
            flatten(&key, &value, &mut table);
        }
        let count = table.len();
        self.table = table;
        Ok(count)
    }

    /// Resolves a key to display text. Missing keys return the key
    /// itself.
    #[must_use]
    pub fn text<'a>(&'a self, key: &'a str) -> &'a str {
        self.table.get(key).map_or(key, String::as_str)
    }

    /// Resolves a key and substitutes `{name}` placeholders from the
    /// given argument pairs.
    #[must_use]
    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.text(key).to_owned();
        for (name, value) in args {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}

fn flatten(prefix: &str, value: &Value, table: &mut HashMap<String, String>) {
    match value {
        Value::String(text) => {
            table.insert(prefix.to_owned(), text.clone());
        }
        Value::Object(object) => {
            for (key, nested) in object {
                flatten(&format!("{prefix}.{key}"), nested, table);
            }
        }
        _ => {
            warn!(key = prefix, "localization value is not a string, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_document() {
        let mut localization = Localization::new();
        let count = localization
            .load_json(r#"{ "npc.elder.name": "Elder Maren" }"#)
            .expect("load");
        assert_eq!(count, 1);
        assert_eq!(localization.text("npc.elder.name"), "Elder Maren");
    }

    #[test]
    fn test_nested_document_flattens() {
        let mut localization = Localization::new();
        localization
            .load_json(
                r#"{
                    "npc": {
                        "elder": { "name": "Elder Maren", "refuse": "Come back later." }
                    },
                    "dlg": { "bye": "Farewell." }
                }"#,
            )
            .expect("load");
        assert_eq!(localization.len(), 3);
        assert_eq!(localization.text("npc.elder.name"), "Elder Maren");
        assert_eq!(localization.text("npc.elder.refuse"), "Come back later.");
        assert_eq!(localization.text("dlg.bye"), "Farewell.");
    }

    #[test]
    fn test_missing_key_returns_key() {
        let localization = Localization::new();
        assert_eq!(localization.text("dlg.unknown"), "dlg.unknown");
    }

    #[test]
    fn test_non_string_leaves_are_skipped() {
        let mut localization = Localization::new();
        localization
            .load_json(r#"{ "a": "text", "b": 7, "c": [1, 2] }"#)
            .expect("load");
        assert_eq!(localization.len(), 1);
        assert_eq!(localization.text("a"), "text");
    }

    #[test]
    fn test_malformed_document_keeps_old_table() {
        let mut localization = Localization::new();
        localization
            .load_json(r#"{ "greeting": "Hello" }"#)
            .expect("load");
        assert!(localization.load_json("not json").is_err());
        assert_eq!(localization.text("greeting"), "Hello");

        assert_eq!(
            localization.load_json("[1, 2]"),
            Err(ContentError::NotAnObject)
        );
        assert_eq!(localization.text("greeting"), "Hello");
    }

    #[test]
    fn test_reload_replaces_wholesale() {
        let mut localization = Localization::new();
        localization
            .load_json(r#"{ "old": "value" }"#)
            .expect("load");
        localization
            .load_json(r#"{ "new": "value" }"#)
            .expect("reload");
        assert_eq!(localization.text("old"), "old");
        assert_eq!(localization.text("new"), "value");
    }

    #[test]
    fn test_placeholder_substitution() {
        let mut localization = Localization::new();
        localization
            .load_json(r#"{ "dlg.greet": "Well met, {name}! You carry {count} gems." }"#)
            .expect("load");
        assert_eq!(
            localization.format("dlg.greet", &[("name", "Wren"), ("count", "5")]),
            "Well met, Wren! You carry 5 gems."
        );
    }

    #[test]
    fn test_format_missing_key_still_substitutes() {
        let localization = Localization::new();
        assert_eq!(localization.format("plain.key", &[]), "plain.key");
    }
}
