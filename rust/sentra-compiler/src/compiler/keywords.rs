//! The process-wide keyword table (§3, §6 "Configuration resource: keyword list").

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Deserialize, Default)]
struct KeywordDocument {
    #[serde(default)]
    verbs: Vec<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    special: Vec<String>,
}

/// The minimum keyword set required by §3, used when no configuration
/// resource is supplied or when it fails to parse.
fn builtin_keywords() -> HashSet<String> {
    const WORDS: &[&str] = &[
        "Open", "workbook", "In", "sheet", "treat", "range", "as", "table", "Set", "to", "Add",
        "column", "Filter", "where", "Sort", "by", "ascending", "descending", "Group", "Export",
        "Use", "system", "version", "Log", "in", "out", "credential", "Go", "page", "Enter",
        "Click", "Extract", "from", "field", "element", "For", "each", "Call", "result", "date",
        "row", "If", "Then", "Else", "On", "error", "retry", "skip", "stop", "continue",
        "escalate", "and", "or", "not", "USD", "EUR", "GBP",
    ];
    WORDS.iter().map(|s| s.to_string()).collect()
}

static KEYWORDS: OnceLock<HashSet<String>> = OnceLock::new();

/// Returns the process-wide keyword table, loading it from `path` on first
/// use. Subsequent calls (regardless of `path`) return the table first
/// loaded, matching the "immutable after first load" invariant in §3.
pub fn keyword_table(path: Option<&std::path::Path>) -> &'static HashSet<String> {
    KEYWORDS.get_or_init(|| load_keyword_table(path))
}

fn load_keyword_table(path: Option<&std::path::Path>) -> HashSet<String> {
    let Some(path) = path else {
        return builtin_keywords();
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!(?path, %err, "keyword config missing, falling back to built-in set");
            return builtin_keywords();
        }
    };
    let doc: KeywordDocument = match toml::from_str(&contents) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(?path, %err, "keyword config failed to parse, falling back to built-in set");
            return builtin_keywords();
        }
    };
    let mut set = builtin_keywords();
    set.extend(doc.verbs);
    set.extend(doc.types);
    set.extend(doc.special);
    set
}

/// Test-only helper: checks membership against the built-in set directly,
/// without touching the process-wide `OnceLock` (so unit tests of the
/// lexer don't depend on load order across the test binary).
#[cfg(test)]
pub(crate) fn is_builtin_keyword(word: &str) -> bool {
    builtin_keywords().contains(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_covers_required_minimum() {
        for word in ["Open", "workbook", "Filter", "where", "USD", "and", "not"] {
            assert!(is_builtin_keyword(word), "{word} should be a builtin keyword");
        }
    }

    #[test]
    fn unrecognized_word_is_not_a_keyword() {
        assert!(!is_builtin_keyword("Balance"));
    }
}
