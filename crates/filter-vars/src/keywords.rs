//! Tables of builtin variable names.

use std::sync::LazyLock;

use rustc_hash::FxHashSet;

/// Prefixes under which the per-page variables are generated.
pub const TITLE_PREFIXES: &[&str] = &["page", "moved_from", "moved_to"];

/// Per-page variables, generated once for every entry of [`TITLE_PREFIXES`].
pub const TITLE_SUFFIXES: &[&str] = &[
    "id",
    "namespace",
    "title",
    "prefixedtitle",
    "restrictions_edit",
    "restrictions_move",
    "restrictions_create",
    "restrictions_upload",
    "recent_contributors",
    "first_contributor",
    "age",
    "last_edit_age",
];

pub const ACTIVE_VARS: &[&str] = &[
    "action",
    "accountname",
    "timestamp",
    "user_name",
    "user_type",
    "user_unnamed_ip",
    "user_editcount",
    "user_age",
    "user_groups",
    "user_rights",
    "user_blocked",
    "user_emailconfirm",
    "summary",
    "new_content_model",
    "old_content_model",
    "old_wikitext",
    "new_wikitext",
    "new_html",
    "new_text",
    "new_size",
    "old_size",
    "edit_delta",
    "edit_diff",
    "added_lines",
    "removed_lines",
    "all_links",
    "old_links",
    "added_links",
    "removed_links",
    "wiki_name",
    "wiki_language",
    "file_sha1",
    "file_size",
    "file_mime",
    "file_mediatype",
    "file_width",
    "file_height",
    "file_bits_per_channel",
];

/// Old name to current name.
pub const DEPRECATED_VARS: &[(&str, &str)] = &[
    ("article_text", "page_title"),
    ("article_prefixedtext", "page_prefixedtitle"),
    ("article_namespace", "page_namespace"),
    ("article_articleid", "page_id"),
    ("article_restrictions_edit", "page_restrictions_edit"),
    ("article_restrictions_move", "page_restrictions_move"),
    ("article_restrictions_create", "page_restrictions_create"),
    ("article_restrictions_upload", "page_restrictions_upload"),
    ("article_recent_contributors", "page_recent_contributors"),
    ("article_first_contributor", "page_first_contributor"),
    ("moved_from_text", "moved_from_title"),
    ("moved_from_prefixedtext", "moved_from_prefixedtitle"),
    ("moved_from_articleid", "moved_from_id"),
    ("moved_to_text", "moved_to_title"),
    ("moved_to_prefixedtext", "moved_to_prefixedtitle"),
    ("moved_to_articleid", "moved_to_id"),
];

/// Names that are no longer generated but may appear in stored dumps.
pub const DISABLED_VARS: &[&str] = &["old_text", "old_html", "minor_edit"];

static KNOWN_VARS: LazyLock<FxHashSet<String>> = LazyLock::new(|| {
    let mut known = FxHashSet::default();
    known.extend(ACTIVE_VARS.iter().map(|name| name.to_string()));
    known.extend(
        TITLE_PREFIXES.iter().flat_map(|prefix| {
            TITLE_SUFFIXES
                .iter()
                .map(move |suffix| format!("{prefix}_{suffix}"))
        }),
    );
    known.extend(DEPRECATED_VARS.iter().map(|(old, _)| old.to_string()));
    known.extend(DISABLED_VARS.iter().map(|name| name.to_string()));
    known
});

/// Whether `name` is an active, deprecated or disabled builtin variable.
pub fn is_known(name: &str) -> bool {
    KNOWN_VARS.contains(name.to_lowercase().as_str())
}

pub fn deprecated_replacement(name: &str) -> Option<&'static str> {
    let name = name.to_lowercase();
    DEPRECATED_VARS
        .iter()
        .find(|(old, _)| *old == name)
        .map(|(_, new)| *new)
}

/// All known names, sorted.
pub fn known_vars() -> Vec<&'static str> {
    let mut names = KNOWN_VARS.iter().map(String::as_str).collect::<Vec<_>>();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::active("user_name", true)]
    #[case::title_var("moved_to_recent_contributors", true)]
    #[case::deprecated("article_text", true)]
    #[case::disabled("old_html", true)]
    #[case::case_insensitive("USER_NAME", true)]
    #[case::user_defined("my_custom_var", false)]
    fn test_is_known(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_known(name), expected);
    }

    #[rstest]
    #[case::article("article_text", Some("page_title"))]
    #[case::upper("MOVED_TO_ARTICLEID", Some("moved_to_id"))]
    #[case::current("page_title", None)]
    fn test_deprecated_replacement(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(deprecated_replacement(name), expected);
    }

    #[test]
    fn test_deprecated_targets_are_active() {
        for (_, new) in DEPRECATED_VARS {
            assert!(is_known(new), "{new} should be a known variable");
        }
    }

    #[test]
    fn test_known_vars_sorted() {
        let names = known_vars();
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert!(names.contains(&"page_age"));
    }
}
