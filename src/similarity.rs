/*!
 * String similarity based on Levenshtein edit distance.
 *
 * Similarity is `(max_len - distance) / max_len`, measured in Unicode scalar
 * values, with two empty strings being identical.
 */

/// Normalized similarity between two strings (0.0-1.0).
///
/// The comparison is exact: callers that want case-insensitive matching
/// normalize their inputs first (see [`normalize_text`]).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let max_len = a_len.max(b_len);

    if max_len == 0 {
        return 1.0;
    }

    let distance = levenshtein_distance(a, b);
    (max_len - distance) as f64 / max_len as f64
}

/// Classic Levenshtein distance with unit insert/delete/substitute costs.
///
/// Runs in O(|a|·|b|) time and keeps a single row sized to the shorter input.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // Inner loop runs over the shorter string
    let (long, short) = if a_chars.len() >= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if short.is_empty() {
        return long.len();
    }

    let mut row: Vec<usize> = (0..=short.len()).collect();

    for (i, long_char) in long.iter().enumerate() {
        // row[0] holds the value of the previous row before it is overwritten
        let mut diagonal = row[0];
        row[0] = i + 1;

        for (j, short_char) in short.iter().enumerate() {
            let cost = if long_char == short_char { 0 } else { 1 };
            let above = row[j + 1];

            row[j + 1] = (above + 1)                 // deletion
                .min(row[j] + 1)                     // insertion
                .min(diagonal + cost);               // substitution

            diagonal = above;
        }
    }

    row[short.len()]
}

/// Canonical form used for TM keys: trimmed, lowercased, inner whitespace collapsed.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshteinDistance_identical_shouldBeZero() {
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshteinDistance_oneDifferent_shouldBeOne() {
        assert_eq!(levenshtein_distance("hello", "hallo"), 1);
        assert_eq!(levenshtein_distance("cat", "hat"), 1);
    }

    #[test]
    fn test_levenshteinDistance_classicPair_shouldBeThree() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("sitting", "kitten"), 3);
    }

    #[test]
    fn test_levenshteinDistance_empty_shouldReturnLength() {
        assert_eq!(levenshtein_distance("", "hello"), 5);
        assert_eq!(levenshtein_distance("hello", ""), 5);
        assert_eq!(levenshtein_distance("", ""), 0);
    }

    #[test]
    fn test_levenshteinDistance_multibyte_shouldCountChars() {
        assert_eq!(levenshtein_distance("niño", "nino"), 1);
    }

    #[test]
    fn test_similarity_emptyStrings_shouldBeOne() {
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_similarity_oneEmpty_shouldBeZero() {
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_similarity_identical_shouldBeOne() {
        for text in ["a", "hello world", "Buenos días", "日本語"] {
            assert_eq!(similarity(text, text), 1.0);
        }
    }

    #[test]
    fn test_similarity_isSymmetric() {
        let pairs = [
            ("kitten", "sitting"),
            ("good morning", "good evening"),
            ("", "x"),
            ("abc", "cba"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_similarity_oneEditInFive_shouldBePointEight() {
        assert!((similarity("hello", "hallo") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_isCaseSensitive() {
        assert!(similarity("Hello", "hello") < 1.0);
    }

    #[test]
    fn test_normalizeText_shouldTrimLowercaseAndCollapse() {
        assert_eq!(normalize_text("  Good   Morning \n"), "good morning");
    }
}
