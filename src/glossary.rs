/*!
 * Glossary store and whole-word term substitution.
 *
 * Terms are keyed by source language and domain. Substitution replaces every
 * occurrence of a term (or one of its synonyms) with the verified
 * target-language translation, in a single pass over the draft so that a
 * replacement is never substituted again.
 */

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use parking_lot::RwLock;
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::Repository;
use crate::language_utils::language_codes_match;

/// Domain whose terms apply to every request
pub const GENERAL_DOMAIN: &str = "general";

fn new_term_id() -> String {
    Uuid::new_v4().to_string()
}

/// Translation of a glossary term into one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTranslation {
    pub language: String,
    pub term: String,
    #[serde(default)]
    pub verified: bool,
}

/// Controlled vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    #[serde(default = "new_term_id")]
    pub id: String,
    pub term: String,
    pub source_language: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub translations: Vec<GlossaryTranslation>,
}

fn default_domain() -> String {
    GENERAL_DOMAIN.to_string()
}

impl GlossaryTerm {
    pub fn new(term: &str, source_language: &str, domain: &str) -> Self {
        Self {
            id: new_term_id(),
            term: term.to_string(),
            source_language: source_language.to_string(),
            domain: domain.to_string(),
            synonyms: Vec::new(),
            translations: Vec::new(),
        }
    }

    pub fn with_synonym(mut self, synonym: &str) -> Self {
        self.synonyms.push(synonym.to_string());
        self
    }

    pub fn with_translation(mut self, language: &str, term: &str, verified: bool) -> Self {
        self.translations.push(GlossaryTranslation {
            language: language.to_string(),
            term: term.to_string(),
            verified,
        });
        self
    }

    /// Verified translation into `language`, if any
    pub fn verified_translation(&self, language: &str) -> Option<&str> {
        self.translations
            .iter()
            .find(|t| t.verified && language_codes_match(&t.language, language))
            .map(|t| t.term.as_str())
    }

    fn applies_to_domain(&self, domain: Option<&str>) -> bool {
        self.domain.eq_ignore_ascii_case(GENERAL_DOMAIN)
            || domain.is_some_and(|d| self.domain.eq_ignore_ascii_case(d))
    }
}

/// Record of one substituted term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTerm {
    pub term_id: String,
    pub source_term: String,
    pub target_term: String,
    pub occurrences: u32,
}

/// Result of a substitution pass
#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryApplication {
    pub text: String,
    pub applied: Vec<AppliedTerm>,
}

/// Lookup key of a compiled pattern: source, target, domain
type PatternKey = (String, String, String);

/// Glossary store
#[derive(Clone)]
pub struct GlossaryStore {
    terms: Arc<RwLock<HashMap<String, GlossaryTerm>>>,
    /// Compiled substitution patterns, dropped on every change
    patterns: Arc<RwLock<HashMap<PatternKey, Arc<CompiledTerms>>>>,
    /// Bumped with every change to `terms`
    generation: Arc<AtomicU64>,
    repo: Option<Repository>,
    write_gate: Arc<Mutex<()>>,
    open: Arc<AtomicBool>,
}

impl GlossaryStore {
    /// Store without persistence
    pub fn in_memory() -> Self {
        Self {
            terms: Arc::new(RwLock::new(HashMap::new())),
            patterns: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            repo: None,
            write_gate: Arc::new(Mutex::new(())),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Open the store and load the persisted terms
    pub async fn open(repo: Repository) -> Result<Self> {
        let terms = repo.load_glossary_terms().await?;
        let mut store = Self::in_memory();
        {
            let mut map = store.terms.write();
            for term in terms {
                map.insert(term.id.clone(), term);
            }
        }
        store.repo = Some(repo);
        info!("Glossary opened with {} terms", store.len());
        Ok(store)
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Glossary closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Insert or replace a term once storage has accepted it
    pub async fn upsert(&self, term: GlossaryTerm) -> Result<()> {
        if term.term.trim().is_empty() {
            bail!("glossary term must not be empty");
        }

        let _gate = self.write_gate.lock().await;
        if !self.is_open() {
            bail!("glossary is closed");
        }

        if let Some(repo) = &self.repo {
            repo.upsert_glossary_term(&term).await?;
        }

        {
            let mut patterns = self.patterns.write();
            self.terms.write().insert(term.id.clone(), term.clone());
            self.generation.fetch_add(1, Ordering::SeqCst);
            patterns.clear();
        }
        debug!("Glossary term '{}' ({}) stored", term.term, term.domain);
        Ok(())
    }

    /// Import a JSON array of terms
    pub async fn import_json_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
        let terms: Vec<GlossaryTerm> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse glossary file: {}", path.display()))?;

        let count = terms.len();
        for term in terms {
            self.upsert(term).await?;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.terms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Terms of the request domain and the general domain that have a
    /// verified translation into the target language
    pub fn terms_for(
        &self,
        source_language: &str,
        target_language: &str,
        domain: Option<&str>,
    ) -> Vec<GlossaryTerm> {
        if !self.is_open() {
            return Vec::new();
        }

        let mut terms: Vec<GlossaryTerm> = self
            .terms
            .read()
            .values()
            .filter(|t| language_codes_match(&t.source_language, source_language))
            .filter(|t| t.applies_to_domain(domain))
            .filter(|t| t.verified_translation(target_language).is_some())
            .cloned()
            .collect();
        terms.sort_by(|a, b| a.term.cmp(&b.term));
        terms
    }

    /// Replace every whole-word, case-insensitive occurrence of a term or
    /// synonym with the verified target term
    pub fn apply(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        domain: Option<&str>,
    ) -> GlossaryApplication {
        match self.compiled(source_language, target_language, domain) {
            Some(compiled) => substitute(text, &compiled, target_language),
            None => GlossaryApplication {
                text: text.to_string(),
                applied: Vec::new(),
            },
        }
    }

    fn compiled(
        &self,
        source_language: &str,
        target_language: &str,
        domain: Option<&str>,
    ) -> Option<Arc<CompiledTerms>> {
        if !self.is_open() {
            return None;
        }

        let key = (
            source_language.trim().to_lowercase(),
            target_language.trim().to_lowercase(),
            domain.unwrap_or_default().to_lowercase(),
        );
        if let Some(compiled) = self.patterns.read().get(&key) {
            return Some(compiled.clone());
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let compiled = Arc::new(compile(self.terms_for(source_language, target_language, domain))?);

        let mut patterns = self.patterns.write();
        if self.generation.load(Ordering::SeqCst) == generation {
            patterns.insert(key, compiled.clone());
        }
        Some(compiled)
    }
}

/// Source form to match and the term it belongs to
struct Form {
    text: String,
    term_index: usize,
}

/// Word-boundary pattern over every form of a set of terms
struct CompiledTerms {
    terms: Vec<GlossaryTerm>,
    pattern: Regex,
    /// Lowercased form to index into `terms`
    lookup: HashMap<String, usize>,
}

fn compile(terms: Vec<GlossaryTerm>) -> Option<CompiledTerms> {
    let mut forms: Vec<Form> = Vec::new();
    for (term_index, term) in terms.iter().enumerate() {
        for form in std::iter::once(&term.term).chain(term.synonyms.iter()) {
            let form = form.trim();
            if !form.is_empty() {
                forms.push(Form {
                    text: form.to_string(),
                    term_index,
                });
            }
        }
    }

    if forms.is_empty() {
        return None;
    }

    // Longest forms first so multi-word terms win over their parts
    forms.sort_by(|a, b| b.text.chars().count().cmp(&a.text.chars().count()));

    let alternation = forms
        .iter()
        .map(|f| regex::escape(&f.text))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = match RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!("Failed to build glossary pattern: {}", e);
            return None;
        }
    };

    let lookup = forms
        .iter()
        .map(|f| (f.text.to_lowercase(), f.term_index))
        .collect();

    Some(CompiledTerms { terms, pattern, lookup })
}

fn substitute(text: &str, compiled: &CompiledTerms, target_language: &str) -> GlossaryApplication {
    let CompiledTerms { terms, pattern, lookup } = compiled;

    let mut applied: Vec<AppliedTerm> = Vec::new();
    let mut applied_index: HashMap<usize, usize> = HashMap::new();

    let replaced = replace_terms(pattern, text, |matched| {
        let term_index = *lookup.get(&matched.to_lowercase())?;
        let term = &terms[term_index];
        let target = term.verified_translation(target_language)?;

        match applied_index.get(&term_index) {
            Some(&i) => applied[i].occurrences += 1,
            None => {
                applied_index.insert(term_index, applied.len());
                applied.push(AppliedTerm {
                    term_id: term.id.clone(),
                    source_term: term.term.clone(),
                    target_term: target.to_string(),
                    occurrences: 1,
                });
            }
        }
        Some(match_capitalization(matched, target))
    });

    GlossaryApplication {
        text: replaced,
        applied,
    }
}

fn replace_terms<F>(pattern: &Regex, text: &str, mut replacement: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    pattern
        .replace_all(text, |caps: &Captures| {
            let matched = &caps[0];
            replacement(matched).unwrap_or_else(|| matched.to_string())
        })
        .into_owned()
}

/// Carry an initial capital of the matched text over to the replacement
fn match_capitalization(matched: &str, replacement: &str) -> String {
    let starts_upper = matched.chars().next().is_some_and(char::is_uppercase);
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
