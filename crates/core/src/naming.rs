//! Output artifact naming convention.
//!
//! Approved videos land in the permanent output directory under a
//! deterministic filename: the caller-supplied name (slugified) when
//! one was given, otherwise a run-id-derived default.

use crate::run::RunId;

/// Maximum length of a slugified caller-supplied name.
const MAX_SLUG_LEN: usize = 64;

/// Compute the output filename (including extension) for an approved run.
pub fn output_filename(custom_name: Option<&str>, run_id: &RunId) -> String {
    match custom_name.map(slugify) {
        Some(slug) if !slug.is_empty() => format!("{slug}.mp4"),
        _ => format!("reel_{run_id}.mp4"),
    }
}

/// Reduce a free-form name to a filesystem-safe slug: lowercase, spaces
/// to underscores, everything but alphanumerics / `-` / `_` dropped,
/// truncated to [`MAX_SLUG_LEN`].
fn slugify(name: &str) -> String {
    let mut slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    slug.truncate(MAX_SLUG_LEN);
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn run_id() -> RunId {
        RunId::generate(Utc::now())
    }

    #[test]
    fn custom_name_is_slugified() {
        assert_eq!(
            output_filename(Some("Morning Routine!"), &run_id()),
            "morning_routine.mp4"
        );
    }

    #[test]
    fn default_uses_run_id() {
        let id = run_id();
        assert_eq!(output_filename(None, &id), format!("reel_{id}.mp4"));
    }

    #[test]
    fn empty_custom_name_falls_back_to_default() {
        let id = run_id();
        assert_eq!(output_filename(Some("  !!  "), &id), format!("reel_{id}.mp4"));
    }

    #[test]
    fn hyphens_and_underscores_survive() {
        assert_eq!(
            output_filename(Some("glimpzo-reel_v2"), &run_id()),
            "glimpzo-reel_v2.mp4"
        );
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "a".repeat(200);
        let name = output_filename(Some(&long), &run_id());
        assert_eq!(name.len(), MAX_SLUG_LEN + ".mp4".len());
    }

    #[test]
    fn path_separators_are_stripped() {
        assert_eq!(
            output_filename(Some("../etc/passwd"), &run_id()),
            "etcpasswd.mp4"
        );
    }
}
