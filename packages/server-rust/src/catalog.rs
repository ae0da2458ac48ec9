//! Localized failure messages and failure-code statuses.
//!
//! Templates use positional slots (`{0}`, `{1}`, ...) filled from a failure's
//! arguments. Lookup order for a key: the requested language, the default
//! language, English (the language of the built-in templates), then the
//! engine's generic key for the same failure family, and finally the key
//! itself.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use dashmap::{DashMap, DashSet};
use gantry_core::mapping::codes;
use gantry_core::{KeyCatalog, MappingFailure, Value};

/// Marker separating a schema namespace from the engine's key families.
const MAPPING_SEGMENT: &str = ".mapping.";

/// Language of the built-in templates, tried after the default language.
const FALLBACK_LANGUAGE: &str = "en";

pub struct MessageCatalog {
    default_language: String,
    templates: DashMap<(String, String), String>,
    keys: DashSet<String>,
    statuses: DashMap<String, StatusCode>,
}

impl MessageCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new(default_language: impl Into<String>) -> Self {
        let catalog = Self {
            default_language: default_language.into(),
            templates: DashMap::new(),
            keys: DashSet::new(),
            statuses: DashMap::new(),
        };
        catalog.set_status(codes::MISSING_ARGUMENT, StatusCode::BAD_REQUEST);
        catalog.set_status(codes::INVALID_ARGUMENT, StatusCode::BAD_REQUEST);
        catalog
    }

    /// A catalog carrying English messages for the engine's generic keys.
    #[must_use]
    pub fn with_defaults(default_language: impl Into<String>) -> Self {
        let catalog = Self::new(default_language);
        catalog.insert(FALLBACK_LANGUAGE, ".mapping.empty", "{0} is required");
        catalog.insert(FALLBACK_LANGUAGE, ".mapping.error", "{0} is invalid");
        catalog.insert(
            FALLBACK_LANGUAGE,
            ".mapping.depth",
            "input nested deeper than {0} levels",
        );
        catalog
    }

    #[must_use]
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn insert(&self, language: &str, key: &str, template: &str) {
        self.keys.insert(key.to_string());
        self.templates
            .insert((language.to_string(), key.to_string()), template.to_string());
    }

    /// Loads a flat `{ "key": "template" }` document for `language`.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed documents.
    pub fn load_json(&self, language: &str, text: &str) -> Result<usize, serde_json::Error> {
        let entries: BTreeMap<String, String> = serde_json::from_str(text)?;
        for (key, template) in &entries {
            self.insert(language, key, template);
        }
        Ok(entries.len())
    }

    pub fn set_status(&self, code: &str, status: StatusCode) {
        self.statuses.insert(code.to_string(), status);
    }

    /// HTTP status for a failure code; unknown codes are client errors.
    #[must_use]
    pub fn status(&self, code: &str) -> StatusCode {
        self.statuses
            .get(code)
            .map_or(StatusCode::BAD_REQUEST, |entry| *entry.value())
    }

    fn template(&self, language: &str, key: &str) -> Option<String> {
        self.templates
            .get(&(language.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    fn lookup(&self, language: Option<&str>, key: &str) -> Option<String> {
        language
            .and_then(|lang| self.template(lang, key))
            .or_else(|| self.template(&self.default_language, key))
            .or_else(|| self.template(FALLBACK_LANGUAGE, key))
    }

    /// Message for `key` in `language`, with `args` substituted.
    #[must_use]
    pub fn message(&self, language: Option<&str>, key: &str, args: &[Value]) -> String {
        let template = self
            .lookup(language, key)
            .or_else(|| generic_key(key).and_then(|generic| self.lookup(language, generic)))
            .unwrap_or_else(|| key.to_string());
        render(&template, args)
    }

    /// Message for a mapping failure.
    #[must_use]
    pub fn resolve(&self, language: Option<&str>, failure: &MappingFailure) -> String {
        self.message(language, &failure.key, &failure.args)
    }
}

impl KeyCatalog for MessageCatalog {
    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// `user.mapping.empty.email` → `.mapping.empty`.
fn generic_key(key: &str) -> Option<&str> {
    let start = key.find(MAPPING_SEGMENT)?;
    let tail = &key[start + MAPPING_SEGMENT.len()..];
    let family_len = tail.find('.').unwrap_or(tail.len());
    Some(&key[start..start + MAPPING_SEGMENT.len() + family_len])
}

/// Fills `{n}` slots in one pass; argument text is never rescanned. Slots
/// without a matching argument are left as written.
fn render(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let arg = tail.find('}').and_then(|close| {
            let index: usize = tail[1..close].parse().ok()?;
            args.get(index).map(|arg| (close, arg))
        });
        match arg {
            Some((close, arg)) => {
                out.push_str(&arg.to_string());
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> MessageCatalog {
        let catalog = MessageCatalog::with_defaults("en");
        catalog.insert("de", ".mapping.empty", "{0} fehlt");
        catalog.insert("en", "user.mapping.empty.email", "Please enter your email");
        catalog
    }

    #[test]
    fn requested_language_wins() {
        let failure = MappingFailure::empty(".mapping.empty").with_arg("Name");
        assert_eq!(catalog().resolve(Some("de"), &failure), "Name fehlt");
        assert_eq!(catalog().resolve(Some("en"), &failure), "Name is required");
    }

    #[test]
    fn falls_back_to_default_language() {
        let failure = MappingFailure::invalid(".mapping.error").with_arg("Age");
        assert_eq!(catalog().resolve(Some("fr"), &failure), "Age is invalid");
        assert_eq!(catalog().resolve(None, &failure), "Age is invalid");
    }

    #[test]
    fn namespaced_keys_fall_back_to_generic_family() {
        let catalog = catalog();
        let coded = MappingFailure::empty("user.mapping.empty.email").with_arg("email");
        assert_eq!(catalog.resolve(Some("de"), &coded), "Please enter your email");

        let generic = MappingFailure::empty("user.mapping.empty.name").with_arg("name");
        assert_eq!(catalog.resolve(Some("de"), &generic), "name fehlt");

        let namespaced = MappingFailure::invalid("order.mapping.error").with_arg("qty");
        assert_eq!(catalog.resolve(None, &namespaced), "qty is invalid");
    }

    #[test]
    fn unknown_key_renders_itself() {
        assert_eq!(catalog().message(None, "custom.key", &[]), "custom.key");
    }

    #[test]
    fn contains_reports_registered_keys() {
        let catalog = catalog();
        assert!(catalog.contains("user.mapping.empty.email"));
        assert!(!catalog.contains("user.mapping.empty.name"));
    }

    #[test]
    fn statuses_default_to_bad_request() {
        let catalog = catalog();
        assert_eq!(catalog.status(codes::INVALID_ARGUMENT), StatusCode::BAD_REQUEST);
        assert_eq!(catalog.status("whatever"), StatusCode::BAD_REQUEST);
        catalog.set_status("conflict", StatusCode::CONFLICT);
        assert_eq!(catalog.status("conflict"), StatusCode::CONFLICT);
    }

    #[test]
    fn load_json_registers_templates() {
        let catalog = MessageCatalog::new("en");
        let count = catalog
            .load_json("en", r#"{ ".mapping.empty": "{0} missing", "a.b": "x" }"#)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(catalog.message(None, ".mapping.empty", &[Value::from("id")]), "id missing");
        assert!(catalog.load_json("en", "[1, 2]").is_err());
    }

    #[test]
    fn built_in_templates_serve_non_english_default() {
        let catalog = MessageCatalog::with_defaults("de");
        let failure = MappingFailure::empty(".mapping.empty").with_arg("Name");
        assert_eq!(catalog.resolve(None, &failure), "Name is required");
        assert_eq!(catalog.resolve(Some("fr"), &failure), "Name is required");

        catalog.insert("de", ".mapping.empty", "{0} fehlt");
        assert_eq!(catalog.resolve(None, &failure), "Name fehlt");
        assert_eq!(catalog.resolve(Some("en"), &failure), "Name is required");

        let namespaced = MappingFailure::invalid("user.mapping.error.age").with_arg("age");
        assert_eq!(catalog.resolve(None, &namespaced), "age is invalid");
    }

    #[test]
    fn arguments_are_substituted_once() {
        let args = [Value::from("{1}"), Value::from("b")];
        assert_eq!(render("{0} and {1}", &args), "{1} and b");
        assert_eq!(render("{1}{0}", &args), "b{1}");
    }

    #[test]
    fn unmatched_slots_stay_verbatim() {
        let args = [Value::from("a")];
        assert_eq!(render("{0} {2} {x} {", &args), "a {2} {x} {");
        assert_eq!(render("{}", &args), "{}");
        assert_eq!(render("plain", &[]), "plain");
    }

    #[test]
    fn generic_key_extraction() {
        assert_eq!(generic_key("user.mapping.empty.email"), Some(".mapping.empty"));
        assert_eq!(generic_key(".mapping.error"), Some(".mapping.error"));
        assert_eq!(generic_key("plain.key"), None);
    }
}
