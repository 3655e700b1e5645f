//! Page text cleanup applied before chunking.

use std::sync::LazyLock;

use regex::Regex;

/// Lines with fewer tokens than this are treated as headers, footers, or noise.
const MIN_LINE_TOKENS: usize = 4;

static HYPHEN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\s+").expect("static regex is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Normalize the raw text of one PDF page.
///
/// Drops purely numeric lines (page numbers) and lines with fewer than four
/// tokens, joins the surviving lines with spaces, re-joins words hyphenated
/// across a line break, and collapses whitespace.
///
/// Returns an empty string when nothing survives; such a page contributes no
/// chunks.
pub fn clean_page_text(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !is_page_number(line))
        .filter(|line| line.split_whitespace().count() >= MIN_LINE_TOKENS)
        .collect();

    let joined = kept.join(" ");
    let dehyphenated = HYPHEN_BREAK.replace_all(&joined, "");
    WHITESPACE.replace_all(&dehyphenated, " ").trim().to_string()
}

fn is_page_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_page_numbers_and_short_lines() {
        let raw = "Chapter Two\n12\nThe coastal towns offer excellent seafood markets.\nFooter text";
        assert_eq!(clean_page_text(raw), "The coastal towns offer excellent seafood markets.");
    }

    #[test]
    fn rejoins_hyphenated_words() {
        let raw = "Travellers should book accommo-\ndation early in the summer season.";
        // The first line has four tokens, the second line has six.
        assert_eq!(
            clean_page_text(raw),
            "Travellers should book accommodation early in the summer season."
        );
    }

    #[test]
    fn collapses_whitespace() {
        let raw = "  many    spaces\tbetween   these   words  ";
        assert_eq!(clean_page_text(raw), "many spaces between these words");
    }

    #[test]
    fn degenerate_page_is_empty() {
        assert_eq!(clean_page_text(""), "");
        assert_eq!(clean_page_text("1\n\n2\nTitle Only\n"), "");
    }
}
