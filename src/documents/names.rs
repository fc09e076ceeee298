use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};

/// Suffixes a document name may end with. Order is the order shown to users.
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".txt", ".md"];

/// Maximum document name length, counted in characters after trimming.
pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Markdown,
    Plain,
}

/// Validate a candidate name for a new document.
///
/// The candidate is trimmed first; the trimmed string is what gets checked and
/// what is returned as the name to store. Rules are evaluated in order and the
/// first failure wins:
/// - length between 1 and [`MAX_NAME_LEN`] characters
/// - not already present in `existing`
/// - ends with one of [`ALLOWED_EXTENSIONS`]
/// - usable as a single directory entry (see [`is_plain_entry_name`])
pub fn validate_new_name(candidate: &str, existing: &BTreeSet<String>) -> AppResult<String> {
    let name = candidate.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AppError::InvalidLength);
    }
    if existing.contains(name) {
        return Err(AppError::AlreadyExists);
    }
    if recognized_extension(name).is_none() {
        return Err(AppError::InvalidExtension);
    }
    if !is_plain_entry_name(name) {
        return Err(AppError::InvalidName);
    }
    Ok(name.to_string())
}

/// True when `name` can only ever address one entry directly inside the
/// document directory: no separators, no NUL, not hidden, not `.`/`..`.
pub fn is_plain_entry_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.chars().any(|c| c == '/' || c == '\\' || c == '\u{0000}')
}

fn recognized_extension(name: &str) -> Option<&'static str> {
    ALLOWED_EXTENSIONS.iter().copied().find(|ext| name.ends_with(ext))
}

pub fn classify_extension(name: &str) -> RenderMode {
    if name.ends_with(".md") { RenderMode::Markdown } else { RenderMode::Plain }
}

/// `report.md` -> `report_copy.md`. None when the name carries no allowed extension.
pub fn derive_copy_name(name: &str) -> Option<String> {
    let ext = recognized_extension(name)?;
    let stem = &name[..name.len() - ext.len()];
    Some(format!("{stem}_copy{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn length_is_checked_first() {
        let existing = listing(&[]);
        assert!(matches!(validate_new_name("", &existing), Err(AppError::InvalidLength)));
        assert!(matches!(validate_new_name("    ", &existing), Err(AppError::InvalidLength)));
        let long = format!("{}.txt", "a".repeat(97));
        assert!(matches!(validate_new_name(&long, &existing), Err(AppError::InvalidLength)));
        let max = format!("{}.txt", "a".repeat(96));
        assert_eq!(validate_new_name(&max, &existing).unwrap().chars().count(), 100);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let name = format!("{}.md", "é".repeat(97));
        assert_eq!(validate_new_name(&name, &listing(&[])).unwrap(), name);
    }

    #[test]
    fn existing_name_wins_over_bad_extension() {
        let existing = listing(&["setup.exe", "notes.txt"]);
        assert!(matches!(validate_new_name("setup.exe", &existing), Err(AppError::AlreadyExists)));
        assert!(matches!(validate_new_name("  notes.txt ", &existing), Err(AppError::AlreadyExists)));
    }

    #[test]
    fn extension_must_be_allowed_and_case_sensitive() {
        let existing = listing(&[]);
        assert!(matches!(validate_new_name("test.exe", &existing), Err(AppError::InvalidExtension)));
        assert!(matches!(validate_new_name("README.MD", &existing), Err(AppError::InvalidExtension)));
        assert!(matches!(validate_new_name("notes", &existing), Err(AppError::InvalidExtension)));
        assert_eq!(validate_new_name("about.md", &existing).unwrap(), "about.md");
    }

    #[test]
    fn trims_before_storing() {
        assert_eq!(validate_new_name("        new_file.txt    ", &listing(&[])).unwrap(), "new_file.txt");
    }

    #[test]
    fn rejects_names_that_leave_the_directory() {
        let existing = listing(&[]);
        assert!(matches!(validate_new_name("../etc.txt", &existing), Err(AppError::InvalidName)));
        assert!(matches!(validate_new_name("a\\b.md", &existing), Err(AppError::InvalidName)));
        assert!(matches!(validate_new_name(".hidden.md", &existing), Err(AppError::InvalidName)));
    }

    #[test]
    fn classify_and_copy_names() {
        assert_eq!(classify_extension("about.md"), RenderMode::Markdown);
        assert_eq!(classify_extension("changes.txt"), RenderMode::Plain);
        assert_eq!(derive_copy_name("report.md").as_deref(), Some("report_copy.md"));
        assert_eq!(derive_copy_name("a.b.txt").as_deref(), Some("a.b_copy.txt"));
        assert_eq!(derive_copy_name("binary.exe"), None);
    }
}
