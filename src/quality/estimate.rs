/*!
 * Heuristic quality estimate of a leverage draft.
 */

/// Penalty per issue reported by the MT provider
const ISSUE_PENALTY: f64 = 5.0;
/// Penalty when the draft is just the source text
const UNTRANSLATED_PENALTY: f64 = 30.0;
/// Penalty when the length ratio looks implausible
const LENGTH_RATIO_PENALTY: f64 = 10.0;
const MIN_LENGTH_RATIO: f64 = 0.3;
const MAX_LENGTH_RATIO: f64 = 3.0;
const GLOSSARY_BONUS: f64 = 2.0;
const MAX_GLOSSARY_BONUS: f64 = 6.0;

/// Inputs of the draft quality estimate
#[derive(Debug, Clone, Copy)]
pub struct EstimateInput<'a> {
    pub source_text: &'a str,
    pub draft_text: &'a str,
    pub source_language: &'a str,
    pub target_language: &'a str,
    /// Confidence of the candidate translation (0-100)
    pub confidence: f64,
    pub provider_issues: usize,
    pub glossary_terms_applied: usize,
}

/// Estimate the quality (0-100) of a draft
pub fn estimate_quality(input: &EstimateInput<'_>) -> f64 {
    let draft = input.draft_text.trim();
    if draft.is_empty() {
        return 0.0;
    }

    let mut score = input.confidence;
    score -= ISSUE_PENALTY * input.provider_issues as f64;

    let languages_differ = !crate::language_utils::language_codes_match(
        input.source_language,
        input.target_language,
    );
    if languages_differ && draft.to_lowercase() == input.source_text.trim().to_lowercase() {
        score -= UNTRANSLATED_PENALTY;
    }

    let source_len = input.source_text.trim().chars().count();
    if source_len > 0 {
        let ratio = draft.chars().count() as f64 / source_len as f64;
        if !(MIN_LENGTH_RATIO..=MAX_LENGTH_RATIO).contains(&ratio) {
            score -= LENGTH_RATIO_PENALTY;
        }
    }

    score += (GLOSSARY_BONUS * input.glossary_terms_applied as f64).min(MAX_GLOSSARY_BONUS);

    score.clamp(0.0, 100.0)
}
