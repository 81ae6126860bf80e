//! # Name Formatter
//!
//! Maps a job's raw identifier and title to the canonical folder name
//! `"{identifier} - {NORMALIZED TITLE}"`.
//!
//! Title normalisation, in order:
//!
//! 1. decode `&amp; &lt; &gt; &quot; &#39;`
//! 2. drop every `(...)` group, shortest match first
//! 3. `_` becomes `" - "`
//! 4. uppercase
//! 5. collapse whitespace runs and trim
//!
//! The identifier is used verbatim.
//!
//! ```
//! use core_sync::naming::format_name;
//!
//! assert_eq!(
//!     format_name("9000549_1", "Smith &amp; Sons (Lot 4) Survey_Job"),
//!     "9000549_1 - SMITH & SONS SURVEY - JOB"
//! );
//! ```

/// Separator between identifier and title, and the replacement for `_`
pub const NAME_SEPARATOR: &str = " - ";

/// Marks a variant of an earlier job (`9000549_1` is a variant of `9000549`)
pub const SUFFIX_DELIMITER: char = '_';

const ENTITIES: [(&str, &str); 5] = [
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// Build the canonical folder name for a job. Total and deterministic.
pub fn format_name(identifier: &str, title: &str) -> String {
    let decoded = ENTITIES
        .iter()
        .fold(title.to_string(), |acc, (entity, ch)| acc.replace(entity, ch));

    let normalized = strip_parentheticals(&decoded)
        .replace(SUFFIX_DELIMITER, NAME_SEPARATOR)
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    format!("{}{}{}", identifier, NAME_SEPARATOR, normalized)
}

/// The identifier with its variant suffix removed, or `None` if it has none.
pub fn base_identifier(identifier: &str) -> Option<&str> {
    identifier
        .split_once(SUFFIX_DELIMITER)
        .map(|(base, _)| base)
}

/// Remove `(...)` groups. An opening parenthesis only pairs with the next
/// closing one on the same line; unpaired parentheses are kept.
fn strip_parentheticals(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        match after.find([')', '\n']) {
            Some(close) if after[close..].starts_with(')') => {
                out.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        assert_eq!(
            format_name("9000549_1", "Smith &amp; Sons (Lot 4) Survey_Job"),
            "9000549_1 - SMITH & SONS SURVEY - JOB"
        );
    }

    #[test]
    fn test_all_entities_decoded() {
        assert_eq!(
            format_name("2001", "a &lt;b&gt; &quot;c&quot; d&#39;s &amp; e"),
            "2001 - A <B> \"C\" D'S & E"
        );
    }

    #[test]
    fn test_multiple_parentheticals() {
        assert_eq!(
            format_name("3002", "(Draft) Main St (North) Fitout (v2)"),
            "3002 - MAIN ST FITOUT"
        );
    }

    #[test]
    fn test_parenthesis_matching_is_non_greedy() {
        assert_eq!(strip_parentheticals("a (b) c (d) e"), "a  c  e");
        assert_eq!(strip_parentheticals("a (b (c) d) e"), "a  d) e");
        assert_eq!(strip_parentheticals("open ( never closed"), "open ( never closed");
        assert_eq!(strip_parentheticals("x (line\nbreak) y"), "x (line\nbreak) y");
    }

    #[test]
    fn test_identifier_is_not_transformed() {
        assert_eq!(format_name("ab_c", "title"), "ab_c - TITLE");
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(format_name("4", "  lots\t of   space \n"), "4 - LOTS OF SPACE");
    }

    #[test]
    fn test_empty_title_keeps_separator() {
        assert_eq!(format_name("5001", ""), "5001 - ");
        assert_eq!(format_name("5001", " (only a note) "), "5001 - ");
    }

    #[test]
    fn test_underscore_spacing() {
        assert_eq!(format_name("7", "Stage_1_Design"), "7 - STAGE - 1 - DESIGN");
        assert_eq!(format_name("7", "Stage _ Design"), "7 - STAGE - DESIGN");
    }

    #[test]
    fn test_deterministic() {
        let title = "Smith &amp; Sons (Lot 4) Survey_Job";
        assert_eq!(format_name("9", title), format_name("9", title));
    }

    #[test]
    fn test_base_identifier() {
        assert_eq!(base_identifier("9000549_1"), Some("9000549"));
        assert_eq!(base_identifier("9000549_1_2"), Some("9000549"));
        assert_eq!(base_identifier("9000549"), None);
    }
}
