//! Text canonicalization used before any similarity comparison.

use unicode_normalization::char::is_combining_mark;

/// Letters that the catalog writes with more than one code point.
///
/// Arabic yeh and kaf are folded onto their Persian forms so that labels typed
/// on different keyboard layouts compare equal.
const LOOKALIKE_FOLDS: &[(char, char)] = &[('\u{064A}', '\u{06CC}'), ('\u{0643}', '\u{06A9}')];

/// Zero-width non-joiner and joiner.
const ZERO_WIDTH_JOINERS: &[char] = &['\u{200C}', '\u{200D}'];

/// Canonicalize free text for comparison.
///
/// Lower-cases, folds look-alike letters, turns zero-width joiners and every
/// character that is not a letter, digit or whitespace into a space, then
/// collapses whitespace runs and trims. Combining marks (vowel signs,
/// accents) are not letters and split words too. Total and idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.to_lowercase().chars() {
        let c = fold_lookalike(c);
        let keep = c.is_alphanumeric() && !is_combining_mark(c) && !ZERO_WIDTH_JOINERS.contains(&c);

        if keep {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

fn fold_lookalike(c: char) -> char {
    LOOKALIKE_FOLDS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(normalize("  Model X  "), "model x");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_punctuation_becomes_separator() {
        assert_eq!(normalize("Model-X (Deluxe)"), "model x deluxe");
        assert_eq!(normalize("a,b"), "a b");
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(normalize("a \t\n  b"), "a b");
    }

    #[test]
    fn test_folds_lookalike_letters() {
        // Arabic yeh/kaf vs Persian yeh/keheh
        assert_eq!(normalize("\u{064A}\u{0643}"), normalize("\u{06CC}\u{06A9}"));
        assert_eq!(normalize("\u{0643}"), "\u{06A9}");
    }

    #[test]
    fn test_zero_width_joiners_become_spaces() {
        assert_eq!(normalize("ab\u{200C}cd"), "ab cd");
        assert_eq!(normalize("ab\u{200D}cd"), "ab cd");
    }

    #[test]
    fn test_keeps_non_latin_letters_and_digits() {
        assert_eq!(normalize("دنا پلاس ۱۴۰۳"), "دنا پلاس ۱۴۰۳");
        assert_eq!(normalize("Peugeot 207i"), "peugeot 207i");
    }

    #[test]
    fn test_combining_marks_become_separators() {
        // meem, damma, hah, meem, dal
        let n = normalize("\u{0645}\u{064F}\u{062D}\u{0645}\u{062F}");
        assert!(!n.contains('\u{064F}'));
        assert_eq!(n, "\u{0645} \u{062D}\u{0645}\u{062F}");

        // Decomposed accent on a Latin letter.
        assert_eq!(normalize("cafe\u{0301} noir"), "cafe noir");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Model X Deluxe",
            "  --Model__Y//Base--  ",
            "\u{064A}\u{200C}\u{0643}!",
            "İstanbul ÄÖÜ ß",
            "tab\tnew\nline",
            "١٢٣ abc",
            "\u{0645}\u{064F}\u{062D}\u{0645}\u{064E}\u{062F}",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }
}
