//! URL slug generation.

/// Derive a URL-safe slug from a human-readable title.
///
/// The transform lowercases the input, drops every character outside
/// `[a-z0-9]`, space and `-`, turns each run of spaces or hyphens into a
/// single `-`, and trims hyphens from both ends. The output only
/// contains `[a-z0-9-]` with no leading, trailing or doubled hyphen, so
/// applying it twice changes nothing.
///
/// ```
/// use canopy_core::slugify;
///
/// assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
/// assert_eq!(slugify("  Pre-Rolls -- 3 Pack "), "pre-rolls-3-pack");
/// assert_eq!(slugify("!!!"), "");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else if c == ' ' || c == '-' {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_with_punctuation() {
        assert_eq!(slugify("Hello, World! 2024"), "hello-world-2024");
    }

    #[test]
    fn test_collapses_whitespace_and_hyphens() {
        assert_eq!(slugify("Blue   Dream -  Sativa"), "blue-dream-sativa");
        assert_eq!(slugify("a - - b"), "a-b");
        assert_eq!(slugify("--leading and trailing--"), "leading-and-trailing");
    }

    #[test]
    fn test_strips_non_ascii_and_symbols() {
        assert_eq!(slugify("Crème Brûlée #1"), "crme-brle-1");
        assert_eq!(slugify("THC: 20% / CBD: 1%"), "thc-20-cbd-1");
        assert_eq!(slugify("under_score"), "underscore");
    }

    #[test]
    fn test_only_space_and_hyphen_separate() {
        assert_eq!(slugify("Blue\tDream"), "bluedream");
        assert_eq!(slugify("Blue\nDream"), "bluedream");
        assert_eq!(slugify("Blue\u{a0}Dream"), "bluedream");
        assert_eq!(slugify("Blue Dream"), "blue-dream");
    }

    #[test]
    fn test_empty_when_nothing_survives() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("  --  "), "");
        assert_eq!(slugify("🌿🌿"), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Hello, World! 2024",
            "  Pre-Rolls -- 3 Pack ",
            "already-a-slug",
            "Mixed CASE and 123 numbers",
            "- x -",
            "Indica/Sativa Hybrid (1g)",
        ];
        for input in inputs {
            let once = slugify(input);
            assert_eq!(slugify(&once), once, "not idempotent for {input:?}");
        }
    }
}
