// src/utils/slug.rs

use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lowercases and collapses every run of non-alphanumerics into a single '-'.
pub fn slugify(input: &str) -> String {
    let lower = input.to_lowercase();
    NON_SLUG
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Slug for a lesson: chapter position plus name, e.g. "3-ownership-rules".
pub fn lesson_slug(position: i16, name: &str) -> String {
    slugify(&format!("{} {}", position, name))
}
