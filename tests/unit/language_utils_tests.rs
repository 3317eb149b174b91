/*!
 * Tests for language utility functions
 */

use locflow::language_utils::{get_language_name, language_codes_match, normalize_language_code, normalize_to_part2t};
use locflow::service::validate_language;

/// Test normalization of language codes to ISO 639-2/T format
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("fra").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t(" EN ").unwrap(), "eng");
}

#[test]
fn test_normalize_language_code_shouldPreferTwoLetterCodes() {
    assert_eq!(normalize_language_code("spa").unwrap(), "es");
    assert_eq!(normalize_language_code("ES").unwrap(), "es");
    assert_eq!(normalize_language_code("ger").unwrap(), "de");
    assert!(normalize_language_code("xx").is_err());
}

/// Test matching of different language code formats
#[test]
fn test_language_codes_match_withMatchingCodes_shouldReturnTrue() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fr", "fre"));
    assert!(!language_codes_match("en", "fr"));
}

#[test]
fn test_get_language_name_shouldReturnEnglishName() {
    assert_eq!(get_language_name("es").unwrap(), "Spanish");
}

#[test]
fn test_validate_language_invalidCode_shouldBeValidationFailure() {
    let err = validate_language("klingon").unwrap_err();

    assert!(matches!(err, locflow::WorkflowError::ValidationFailure(_)));
}
