/*!
 * Target-language post-processing of drafts.
 *
 * Two lookup tables drive this step:
 * - punctuation and spacing rules keyed by target language
 * - contraction pairs used by style normalization (formal expands,
 *   informal contracts)
 */

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::language_utils::normalize_language_code;

/// Rules applied to every target language
const ANY_LANGUAGE: &str = "*";

/// (language, pattern, replacement)
const DEFAULT_RULES: &[(&str, &str, &str)] = &[
    (ANY_LANGUAGE, r"[ \t]{2,}", " "),
    (ANY_LANGUAGE, r"\s+$", ""),
    ("en", r"\s+([,.;:!?])", "$1"),
    ("es", r"\s+([,.;:!?])", "$1"),
    ("de", r"\s+([,.;:!?])", "$1"),
    ("it", r"\s+([,.;:!?])", "$1"),
    ("pt", r"\s+([,.;:!?])", "$1"),
    // French puts a no-break space before two-part punctuation
    ("fr", r"(\w)[ \u{00A0}]?([!?;:])", "$1\u{00A0}$2"),
    ("de", r#""([^"]*)""#, "„$1“"),
];

/// (expanded, contracted) pairs per language
const CONTRACTIONS: &[(&str, &[(&str, &str)])] = &[(
    "en",
    &[
        ("do not", "don't"),
        ("does not", "doesn't"),
        ("did not", "didn't"),
        ("cannot", "can't"),
        ("will not", "won't"),
        ("is not", "isn't"),
        ("are not", "aren't"),
        ("was not", "wasn't"),
        ("have not", "haven't"),
        ("should not", "shouldn't"),
        ("would not", "wouldn't"),
        ("could not", "couldn't"),
        ("it is", "it's"),
        ("that is", "that's"),
        ("I am", "I'm"),
        ("you are", "you're"),
        ("we are", "we're"),
        ("they are", "they're"),
        ("let us", "let's"),
    ],
)];

/// Style normalization applied after the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleNormalization {
    #[default]
    None,
    /// Expand contractions
    Formal,
    /// Contract expanded forms
    Informal,
}

impl fmt::Display for StyleNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleNormalization::None => "none",
            StyleNormalization::Formal => "formal",
            StyleNormalization::Informal => "informal",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for StyleNormalization {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(StyleNormalization::None),
            "formal" => Ok(StyleNormalization::Formal),
            "informal" => Ok(StyleNormalization::Informal),
            _ => Err(anyhow::anyhow!("Invalid style normalization: {}", s)),
        }
    }
}

/// Compiled contraction table of one language
struct StyleTable {
    /// Matches any expanded form
    expanded: Regex,
    /// Matches any contracted form
    contracted: Regex,
    to_contracted: HashMap<String, &'static str>,
    to_expanded: HashMap<String, &'static str>,
}

static STYLE_TABLES: Lazy<HashMap<&'static str, StyleTable>> = Lazy::new(|| {
    CONTRACTIONS
        .iter()
        .map(|(language, pairs)| {
            let alternation = |forms: Vec<&str>| {
                let joined = forms.into_iter().map(regex::escape).collect::<Vec<_>>().join("|");
                RegexBuilder::new(&format!(r"\b(?:{})\b", joined))
                    .case_insensitive(true)
                    .build()
                    .expect("Invalid contraction regex")
            };
            let table = StyleTable {
                expanded: alternation(pairs.iter().map(|(e, _)| *e).collect()),
                contracted: alternation(pairs.iter().map(|(_, c)| *c).collect()),
                to_contracted: pairs.iter().map(|(e, c)| (e.to_lowercase(), *c)).collect(),
                to_expanded: pairs.iter().map(|(e, c)| (c.to_lowercase(), *e)).collect(),
            };
            (*language, table)
        })
        .collect()
});

/// One regex replacement
#[derive(Debug, Clone)]
pub struct PostProcessRule {
    pattern: Regex,
    replacement: String,
}

/// Language-keyed rule table
#[derive(Debug, Clone)]
pub struct PostProcessRules {
    rules: HashMap<String, Vec<PostProcessRule>>,
}

impl Default for PostProcessRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        for (language, pattern, replacement) in DEFAULT_RULES {
            if let Err(e) = rules.add_rule(language, pattern, replacement) {
                log::warn!("Skipping built-in post-processing rule: {:#}", e);
            }
        }
        rules
    }
}

impl PostProcessRules {
    /// Table without any rule
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Register a rule for `language` ("*" for every language)
    pub fn add_rule(&mut self, language: &str, pattern: &str, replacement: &str) -> Result<()> {
        let compiled = Regex::new(pattern)
            .with_context(|| format!("Invalid post-processing pattern: {}", pattern))?;
        self.rules
            .entry(language_key(language))
            .or_default()
            .push(PostProcessRule {
                pattern: compiled,
                replacement: replacement.to_string(),
            });
        Ok(())
    }

    /// Apply the generic rules, then the rules of `language`
    pub fn apply(&self, text: &str, language: &str) -> String {
        let mut output = text.trim_start().to_string();
        for key in [ANY_LANGUAGE.to_string(), language_key(language)] {
            if let Some(rules) = self.rules.get(&key) {
                for rule in rules {
                    output = rule
                        .pattern
                        .replace_all(&output, rule.replacement.as_str())
                        .into_owned();
                }
            }
        }
        output
    }
}

/// Apply a style normalization; languages without a table are unchanged
pub fn normalize_style(text: &str, language: &str, style: StyleNormalization) -> String {
    let key = language_key(language);
    let Some(table) = STYLE_TABLES.get(key.as_str()) else {
        return text.to_string();
    };

    let (pattern, lookup) = match style {
        StyleNormalization::None => return text.to_string(),
        StyleNormalization::Formal => (&table.contracted, &table.to_expanded),
        StyleNormalization::Informal => (&table.expanded, &table.to_contracted),
    };

    pattern
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            match lookup.get(&matched.to_lowercase()) {
                Some(replacement) => keep_initial_case(matched, replacement),
                None => matched.to_string(),
            }
        })
        .into_owned()
}

fn keep_initial_case(matched: &str, replacement: &str) -> String {
    if matched.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

fn language_key(language: &str) -> String {
    if language == ANY_LANGUAGE {
        return language.to_string();
    }
    normalize_language_code(language).unwrap_or_else(|_| language.trim().to_lowercase())
}
