//! Integration coverage for the `edit_code` matcher (§4.7): realistic
//! multi-line source edits run through the real strategy fallback chain,
//! rather than single-line snippets chosen to hit one strategy directly.

use loom_core::action::apply_edit;

const SOURCE: &str = r#"use std::collections::HashMap;

pub struct Cache {
    entries: HashMap<String, String>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }
}
"#;

#[test]
fn exact_match_replaces_a_single_method_body() {
    let old = "    pub fn get(&self, key: &str) -> Option<&String> {\n        self.entries.get(key)\n    }";
    let new = "    pub fn get(&self, key: &str) -> Option<&String> {\n        self.entries.get(key).cloned().as_ref()\n    }";
    let result = apply_edit(SOURCE, old, new);
    assert!(result.ok);
    assert_eq!(result.strategy, "exact");
    assert!(result.new_content.contains("get(key).cloned()"));
    assert!(result.new_content.contains("pub struct Cache"), "the rest of the file must survive unchanged");
}

#[test]
fn a_model_supplied_patch_with_trailing_whitespace_still_matches_via_line_trimmed() {
    // Agents commonly emit old_text copied from a rendered diff, which can
    // carry trailing spaces the real file doesn't have.
    let old = "    pub fn new() -> Self {   \n        Self {   \n            entries: HashMap::new(),\n        }\n    }";
    let new = "    pub fn new() -> Self {\n        Self {\n            entries: HashMap::with_capacity(16),\n        }\n    }";
    let result = apply_edit(SOURCE, old, new);
    assert!(result.ok);
    assert_eq!(result.strategy, "line_trimmed");
    assert!(result.new_content.contains("with_capacity(16)"));
}

#[test]
fn reindented_replacement_is_fit_to_the_surrounding_block_indentation() {
    // old_text given with zero leading indentation (as if copy-pasted from
    // a chat window); the matcher must still find it via whitespace
    // normalization and reindent the replacement to the original's depth.
    let old = "pub fn get(&self, key: &str) -> Option<&String> {\nself.entries.get(key)\n}";
    let new = "pub fn get(&self, key: &str) -> Option<&String> {\nself.entries.get(key).map(|v| v)\n}";
    let result = apply_edit(SOURCE, old, new);
    assert!(result.ok);
    assert_eq!(result.strategy, "whitespace_normalized");
    assert!(result.new_content.contains("    self.entries.get(key).map(|v| v)"));
}

#[test]
fn an_edit_that_matches_nowhere_leaves_the_file_byte_for_byte_unchanged() {
    let result = apply_edit(SOURCE, "fn this_function_does_not_exist() {}", "fn replaced() {}");
    assert!(!result.ok);
    assert_eq!(result.new_content, SOURCE);
}

#[test]
fn an_ambiguous_old_text_that_appears_twice_is_rejected_rather_than_guessed() {
    let content = "fn a() {\n    todo!();\n}\n\nfn b() {\n    todo!();\n}\n";
    let result = apply_edit(content, "todo!();", "unimplemented!();");
    assert!(!result.ok, "two exact matches for the same old_text must not be silently disambiguated");
}
