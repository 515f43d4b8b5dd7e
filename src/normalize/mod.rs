//! # Normalize Module
//!
//! Canonicalizes character names and queries into one comparable form:
//! NFC composition, full Unicode case folding, then whitespace trimming.
//!
//! - [`cache`] - Bounded LRU memo in front of [`normalize`]

pub mod cache;

use unicode_casefold::UnicodeCaseFold;
use unicode_normalization::UnicodeNormalization;

pub use cache::{CacheStats, LruMemo, NormalizationCache};

/// Normalize `text` for matching.
///
/// Case folding can emit decomposed sequences (`ǰ` folds to `j` + U+030C), so
/// the folded output is recomposed once more. The result is always NFC, which
/// keeps the function idempotent.
pub fn normalize(text: &str) -> String {
    let folded: String = text.nfc().case_fold().nfc().collect();
    let trimmed = folded.trim();
    if trimmed.len() == folded.len() {
        folded
    } else {
        trimmed.to_string()
    }
}

/// Whitespace tokens of an already normalized string
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PROPTEST_CASES: u32 = 256;

    /// Letters mixed with combining marks and characters whose folding
    /// expands or decomposes
    const MARK_HEAVY: &str =
        "[a-zA-Z\u{300}-\u{36f}\u{345}\u{1f0}\u{df}\u{130}\u{3a3}\u{3c2}\u{212b}\u{fb03} ]{0,24}";

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "SNOWMAN",
        "  heavy Black HEART ",
        "Cafe\u{301}",
        "Caf\u{e9}",
        "Stra\u{df}e",
        "\u{1f0}",
        "J\u{30c}",
        "\u{fb03}",
        "\u{3a3}\u{391}\u{3a3}",
        "\u{212b}ngstr\u{f6}m",
        "A\u{30a}",
        " \u{301}a",
        "LATIN CAPITAL LETTER A WITH RING ABOVE",
        "\u{1e9e}",
        "\u{130}stanbul",
        "\tgrinning\nface\u{3000}",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_canonically_equivalent_inputs_normalize_identically() {
        assert_eq!(normalize("e\u{301}"), normalize("\u{e9}"));
        assert_eq!(normalize("A\u{30a}"), normalize("\u{c5}"));
        assert_eq!(normalize("\u{212b}"), normalize("\u{c5}"));
        assert_eq!(normalize("J\u{30c}"), normalize("\u{1f0}"));
    }

    #[test]
    fn test_case_is_folded_and_whitespace_trimmed() {
        assert_eq!(normalize("  HEAVY Black heart\t"), "heavy black heart");
        assert_eq!(normalize("Stra\u{df}e"), "strasse");
        assert_eq!(normalize("SNOWMAN"), normalize("snowman"));
    }

    #[test]
    fn test_interior_whitespace_is_preserved() {
        assert_eq!(normalize("BLACK  HEART"), "black  heart");
        assert_eq!(tokens(&normalize("BLACK  HEART")).collect::<Vec<_>>(), ["black", "heart"]);
    }

    #[test]
    fn test_empty_and_blank_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \u{3000}\t"), "");
        assert_eq!(tokens("").count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: PROPTEST_CASES,
            .. ProptestConfig::default()
        })]

        #[test]
        fn normalize_is_idempotent_for_any_string(text in any::<String>()) {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_around_combining_marks(text in MARK_HEAVY) {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn decomposed_and_composed_forms_normalize_identically(text in any::<String>()) {
            let decomposed: String = text.nfd().collect();
            let composed: String = text.nfc().collect();
            prop_assert_eq!(normalize(&decomposed), normalize(&composed));
        }

        #[test]
        fn canonical_forms_agree_around_combining_marks(text in MARK_HEAVY) {
            let decomposed: String = text.nfd().collect();
            let composed: String = text.nfc().collect();
            prop_assert_eq!(normalize(&decomposed), normalize(&composed));
        }
    }
}
