//! Cross-module dependents table
//!
//! Advisory metadata answering "if this module changes, who should refresh".
//! The registry never pushes changes along these edges.

use std::collections::BTreeSet;

const DEPENDENTS: &[(&str, &[&str])] = &[
    ("ui_theme", &["editor", "terminal", "file_browser"]),
    ("editor", &["lsp"]),
    ("debugger", &["lsp"]),
    ("lsp", &["debugger", "editor"]),
    ("git", &["file_browser"]),
    ("build", &["debugger"]),
];

/// Modules that should refresh when `module_id` changes
pub fn dependents_of(module_id: &str) -> BTreeSet<&'static str> {
    DEPENDENTS
        .iter()
        .find(|(id, _)| *id == module_id)
        .map(|(_, deps)| deps.iter().copied().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_affects_presentation_modules() {
        let deps = dependents_of("ui_theme");
        assert_eq!(
            deps,
            ["editor", "file_browser", "terminal"].into_iter().collect()
        );
    }

    #[test]
    fn test_debugger_and_lsp_are_mutual() {
        assert!(dependents_of("debugger").contains("lsp"));
        assert!(dependents_of("lsp").contains("debugger"));
    }

    #[test]
    fn test_unknown_module_has_no_dependents() {
        assert!(dependents_of("nope").is_empty());
    }
}
