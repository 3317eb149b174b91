/*!
 * In-memory translation memory store with write-through persistence.
 */

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::app_config::MemoryConfig;
use crate::database::Repository;
use crate::language_utils::normalize_language_code;
use crate::similarity::similarity;

use super::{source_key, FuzzyMatch, MemoryEntry, NewMemoryEntry};

/// Language pair key, both codes normalized
type PairKey = (String, String);

/// Entry plus its precomputed lookup key
#[derive(Debug, Clone)]
struct Slot {
    key: String,
    entry: MemoryEntry,
}

/// Result of an insertion
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The entry was stored
    Inserted {
        entry_id: String,
        /// Unverified entries for the same source that were replaced
        superseded: usize,
        /// Oldest entries dropped to respect the per-pair cap
        evicted: usize,
    },
    /// A verified entry already covers this source; nothing was stored
    KeptVerified { entry_id: String },
}

impl InsertOutcome {
    pub fn entry_id(&self) -> &str {
        match self {
            InsertOutcome::Inserted { entry_id, .. } | InsertOutcome::KeptVerified { entry_id } => entry_id,
        }
    }
}

/// How a new entry lands in its language pair
enum Placement {
    /// A verified entry for the same source and domain stays in place
    Blocked { verified_id: String },
    Placed { superseded: Vec<String>, evicted: Vec<String> },
}

/// Apply the precedence, supersede and cap rules to `shard`
fn place(shard: &mut VecDeque<Slot>, slot: Slot, cap: usize) -> Placement {
    let same_source = |other: &Slot| other.key == slot.key && other.entry.same_domain(slot.entry.domain.as_deref());

    if !slot.entry.verified {
        if let Some(existing) = shard.iter().rev().find(|other| other.entry.verified && same_source(other)) {
            return Placement::Blocked {
                verified_id: existing.entry.id.clone(),
            };
        }
    }

    let mut superseded = Vec::new();
    shard.retain(|other| {
        let replace = !other.entry.verified && same_source(other);
        if replace {
            superseded.push(other.entry.id.clone());
        }
        !replace
    });

    shard.push_back(slot);

    let mut evicted = Vec::new();
    while shard.len() > cap {
        if let Some(old) = shard.pop_front() {
            evicted.push(old.entry.id);
        }
    }
    Placement::Placed { superseded, evicted }
}

/// Per language pair statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PairStats {
    pub source_language: String,
    pub target_language: String,
    pub entries: usize,
    pub verified: usize,
}

/// Store statistics
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    pub pairs: Vec<PairStats>,
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl MemoryStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Translation memory store
#[derive(Clone)]
pub struct TranslationMemory {
    /// Entries per language pair, oldest first
    pairs: Arc<RwLock<HashMap<PairKey, VecDeque<Slot>>>>,

    /// Optional write-through persistence
    repo: Option<Repository>,

    config: MemoryConfig,

    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,

    /// Serializes writers so memory and storage change in the same order
    write_gate: Arc<Mutex<()>>,

    open: Arc<AtomicBool>,
}

impl TranslationMemory {
    /// Store without persistence
    pub fn in_memory(config: MemoryConfig) -> Self {
        Self {
            pairs: Arc::new(RwLock::new(HashMap::new())),
            repo: None,
            config,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
            write_gate: Arc::new(Mutex::new(())),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Open the store and load every persisted entry
    ///
    /// Rows are replayed in insertion order through the same rules as
    /// `insert`; rows those rules reject are deleted from storage.
    pub async fn open(config: MemoryConfig, repo: Repository) -> Result<Self> {
        let entries = repo.load_memory_entries().await?;
        let mut store = Self::in_memory(config);

        let mut stale = Vec::new();
        {
            let mut pairs = store.pairs.write();
            for entry in entries {
                let shard = pairs.entry(pair_key(&entry.source_language, &entry.target_language)).or_default();
                let id = entry.id.clone();
                let slot = Slot {
                    key: entry.source_key(),
                    entry,
                };
                match place(shard, slot, store.config.max_entries_per_pair) {
                    Placement::Blocked { .. } => stale.push(id),
                    Placement::Placed { superseded, evicted } => {
                        stale.extend(superseded);
                        stale.extend(evicted);
                    }
                }
            }
        }

        if !stale.is_empty() {
            debug!("Dropping {} superseded or over-cap persisted TM entries", stale.len());
            repo.delete_memory_entries(stale).await?;
        }

        store.repo = Some(repo);
        info!("Translation memory opened with {} entries", store.len());
        Ok(store)
    }

    /// Close the store; later insertions fail and lookups return nothing
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Translation memory closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Best entry whose normalized source equals `source_text`
    ///
    /// Verified entries win over unverified ones, then higher confidence,
    /// then the most recent entry.
    pub fn exact_match(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        domain: Option<&str>,
    ) -> Option<MemoryEntry> {
        if !self.is_open() {
            return None;
        }

        let key = source_key(source_text);
        if key.is_empty() {
            return None;
        }

        let found = {
            let pairs = self.pairs.read();
            pairs
                .get(&pair_key(source_language, target_language))
                .and_then(|shard| {
                    shard
                        .iter()
                        .enumerate()
                        .filter(|(_, slot)| slot.key == key && slot.entry.matches_domain(domain))
                        .max_by(|(ia, a), (ib, b)| {
                            a.entry
                                .verified
                                .cmp(&b.entry.verified)
                                .then(a.entry.confidence.total_cmp(&b.entry.confidence))
                                .then(ia.cmp(ib))
                        })
                        .map(|(_, slot)| slot.entry.clone())
                })
        };

        match &found {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "TM exact hit for '{}' ({} -> {}): {}",
                    truncate_text(source_text, 30),
                    source_language,
                    target_language,
                    entry.id
                );
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        found
    }

    /// Entries whose normalized source is similar but not identical,
    /// sorted by similarity then confidence, both descending
    pub fn fuzzy_matches(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        domain: Option<&str>,
        min_similarity: f64,
        limit: usize,
    ) -> Vec<FuzzyMatch> {
        if !self.is_open() || limit == 0 {
            return Vec::new();
        }

        let key = source_key(source_text);
        let mut matches: Vec<FuzzyMatch> = {
            let pairs = self.pairs.read();
            match pairs.get(&pair_key(source_language, target_language)) {
                Some(shard) => shard
                    .iter()
                    .filter(|slot| slot.key != key && slot.entry.matches_domain(domain))
                    .filter_map(|slot| {
                        let score = similarity(&key, &slot.key);
                        (score >= min_similarity).then(|| FuzzyMatch {
                            entry: slot.entry.clone(),
                            similarity: score,
                        })
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(b.entry.confidence.total_cmp(&a.entry.confidence))
        });
        matches.truncate(limit);
        matches
    }

    /// Store a new pair
    ///
    /// An existing verified entry for the same source and domain is never
    /// replaced by an unverified one. Unverified entries for the same source
    /// are superseded. The oldest entries of the pair are evicted above the
    /// configured cap. Nothing changes in memory unless storage accepted
    /// the write.
    pub async fn insert(&self, new: NewMemoryEntry) -> Result<InsertOutcome> {
        if new.source_text.trim().is_empty() || new.target_text.trim().is_empty() {
            bail!("translation memory entries need a source and a target text");
        }

        let _gate = self.write_gate.lock().await;
        if !self.is_open() {
            bail!("translation memory is closed");
        }

        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            source_text: new.source_text,
            target_text: new.target_text,
            source_language: new.source_language,
            target_language: new.target_language,
            domain: new.domain,
            context: new.context,
            confidence: new.confidence.clamp(0.0, 100.0),
            verified: new.verified,
            usage_count: 0,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        let pair = pair_key(&entry.source_language, &entry.target_language);

        let mut shard = self.pairs.read().get(&pair).cloned().unwrap_or_default();
        let slot = Slot {
            key: entry.source_key(),
            entry: entry.clone(),
        };
        let (superseded, evicted) = match place(&mut shard, slot, self.config.max_entries_per_pair) {
            Placement::Blocked { verified_id } => {
                debug!("Keeping verified TM entry {} over new unverified pair", verified_id);
                return Ok(InsertOutcome::KeptVerified { entry_id: verified_id });
            }
            Placement::Placed { superseded, evicted } => (superseded, evicted),
        };

        if let Some(repo) = &self.repo {
            let removed: Vec<String> = superseded.iter().chain(evicted.iter()).cloned().collect();
            repo.store_memory_entry(&entry, removed).await?;
        }

        self.pairs.write().insert(pair, shard);
        self.evictions.fetch_add(evicted.len() as u64, Ordering::Relaxed);

        debug!(
            "Stored TM entry {} ({} -> {}, verified: {})",
            entry.id, entry.source_language, entry.target_language, entry.verified
        );

        Ok(InsertOutcome::Inserted {
            entry_id: entry.id,
            superseded: superseded.len(),
            evicted: evicted.len(),
        })
    }

    /// Increment the usage counter of an entry
    pub async fn record_usage(&self, entry_id: &str) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        if self.get(entry_id).is_none() {
            return Err(anyhow!("Unknown translation memory entry: {}", entry_id));
        }

        if let Some(repo) = &self.repo {
            repo.increment_memory_usage(entry_id).await?;
        }

        let mut pairs = self.pairs.write();
        if let Some(slot) = pairs
            .values_mut()
            .flat_map(|shard| shard.iter_mut())
            .find(|slot| slot.entry.id == entry_id)
        {
            slot.entry.usage_count += 1;
        }
        Ok(())
    }

    /// Entries of a language pair, oldest first
    pub fn entries(&self, source_language: &str, target_language: &str) -> Vec<MemoryEntry> {
        self.pairs
            .read()
            .get(&pair_key(source_language, target_language))
            .map(|shard| shard.iter().map(|slot| slot.entry.clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, entry_id: &str) -> Option<MemoryEntry> {
        self.pairs
            .read()
            .values()
            .flat_map(|shard| shard.iter())
            .find(|slot| slot.entry.id == entry_id)
            .map(|slot| slot.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.pairs.read().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoryStats {
        let pairs = self.pairs.read();
        let mut per_pair: Vec<PairStats> = pairs
            .iter()
            .map(|((src, tgt), shard)| PairStats {
                source_language: src.clone(),
                target_language: tgt.clone(),
                entries: shard.len(),
                verified: shard.iter().filter(|slot| slot.entry.verified).count(),
            })
            .collect();
        per_pair.sort_by(|a, b| {
            (&a.source_language, &a.target_language).cmp(&(&b.source_language, &b.target_language))
        });

        MemoryStats {
            total_entries: per_pair.iter().map(|p| p.entries).sum(),
            pairs: per_pair,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

fn pair_key(source_language: &str, target_language: &str) -> PairKey {
    (normalize_code(source_language), normalize_code(target_language))
}

fn normalize_code(code: &str) -> String {
    normalize_language_code(code).unwrap_or_else(|_| code.trim().to_lowercase())
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
