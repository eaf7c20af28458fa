//! Indexed metadata store with a result cache and snapshot persistence.
//!
//! One `RwLock` guards records and indexes together. A write mutates the
//! record, moves index memberships and clears the result cache inside a
//! single write-guard scope; searches fill the cache while still holding the
//! read guard, so a stale result can never be cached after an invalidation.
//! Saves are serialized by a separate mutex and only hold the state lock
//! long enough to clone the records.

mod autosave;
mod cache;
mod codec;
mod index;
mod persist;
pub mod record;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::{Datelike, Utc};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{LensResult, StorageError, ValidationError};
use crate::filter::FilterResult;
use crate::normalize::{normalize_identity, normalize_text};
use crate::year::YearSpec;

pub use autosave::AutoSaver;
pub use persist::LoadSource;
pub use record::{Field, FieldClass, FieldValue, MetadataRecord};

use cache::{CacheKey, ResultCache, ResultSet};
use index::FieldIndex;
use persist::Snapshot;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::PoisonedLock(context)
}

/// How per-criterion results combine in [`MetadataStore::multi_field_search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Intersection: every criterion must match.
    #[default]
    All,
    /// Union: any criterion may match.
    Any,
}

/// Outcome of one document write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Document key.
    pub key: String,
    /// Whether the record was created by this write.
    pub created: bool,
    /// Fields stored, including a `year` derived from `date`.
    pub applied: Vec<Field>,
    /// Fields dropped by validation, with the reason.
    pub rejected: Vec<(Field, ValidationError)>,
}

/// Outcome of [`MetadataStore::bulk_update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// One report per accepted document key.
    pub written: Vec<WriteReport>,
    /// Keys rejected outright (empty keys).
    pub rejected_keys: Vec<String>,
    /// Whether the flush after the update wrote a file.
    pub saved: bool,
}

/// Store counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records.
    pub records: usize,
    /// Index bucket count per field name.
    pub index_buckets: BTreeMap<String, usize>,
    /// Live cached result sets.
    pub cache_entries: u64,
    /// Whether there are unsaved writes.
    pub dirty: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, MetadataRecord>,
    index: FieldIndex,
}

/// Thread-safe metadata store keyed by document filename.
///
/// # Examples
///
/// ```
/// use doclens::{MetadataStore, StoreConfig};
///
/// let store = MetadataStore::new(StoreConfig::in_memory()).unwrap();
/// store
///     .add_document("예산안.hwp", [("drafter", "최새름"), ("date", "2024-03-05")])
///     .unwrap();
///
/// assert_eq!(store.search_by_identity("최새름", false).unwrap(), vec!["예산안.hwp"]);
/// assert_eq!(store.search_by_field("year", "2024", false).unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct MetadataStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
    cache: ResultCache,
    persist_lock: Mutex<()>,
    dirty: AtomicBool,
    last_save: Mutex<Instant>,
}

impl MetadataStore {
    /// Create an empty store. Nothing is read from disk.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn new(config: StoreConfig) -> LensResult<Self> {
        let config = config.validate()?;
        let cache = ResultCache::new(config.cache_ttl(), config.cache_max_entries);
        Ok(Self {
            config,
            state: RwLock::new(StoreState::default()),
            cache,
            persist_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
            last_save: Mutex::new(Instant::now()),
        })
    }

    /// Create a store and load its file (or backup) if it has one.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is invalid.
    pub fn open(config: StoreConfig) -> LensResult<Self> {
        let store = Self::new(config)?;
        let source = store.load()?;
        let records = store.len()?;
        info!(?source, records, "metadata store opened");
        Ok(store)
    }

    /// Store file, if persistent.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Merge `fields` into the record for `key`, creating it if needed.
    ///
    /// Field names resolve through [`Field::parse`]. Invalid fields are
    /// dropped and listed in the report; the rest are written. A valid
    /// `date` also sets `year` unless the same call carries a `year`.
    ///
    /// # Errors
    ///
    /// `ValidationError::EmptyKey` for a blank key, or a poisoned lock.
    pub fn add_document<I, N, V>(&self, key: &str, fields: I) -> LensResult<WriteReport>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<Field>,
        V: AsRef<str>,
    {
        let fields = collect_fields(fields);
        let report = {
            let mut state = self.state.write().map_err(|_| lock_err("store.add_document"))?;
            let report = self.apply(&mut state, key, fields)?;
            self.cache.clear();
            self.dirty.store(true, Ordering::SeqCst);
            report
        };
        self.maybe_auto_save();
        Ok(report)
    }

    /// Apply many writes under one lock acquisition, then flush to disk.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock. Blank keys are reported
    /// in [`BulkReport::rejected_keys`]; a failed flush is logged and leaves
    /// the store dirty.
    pub fn bulk_update<I, K, F, N, V>(&self, updates: I) -> LensResult<BulkReport>
    where
        I: IntoIterator<Item = (K, F)>,
        K: AsRef<str>,
        F: IntoIterator<Item = (N, V)>,
        N: Into<Field>,
        V: AsRef<str>,
    {
        let mut report = BulkReport::default();
        {
            let mut state = self.state.write().map_err(|_| lock_err("store.bulk_update"))?;
            for (key, fields) in updates {
                match self.apply(&mut state, key.as_ref(), collect_fields(fields)) {
                    Ok(written) => report.written.push(written),
                    Err(err) => {
                        warn!(key = %key.as_ref(), error = %err, "bulk update entry rejected");
                        report.rejected_keys.push(key.as_ref().to_string());
                    }
                }
            }
            self.cache.clear();
            if !report.written.is_empty() {
                self.dirty.store(true, Ordering::SeqCst);
            }
        }

        report.saved = match self.save(true) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "flush after bulk update failed");
                false
            }
        };
        debug!(written = report.written.len(), saved = report.saved, "bulk update applied");
        Ok(report)
    }

    fn apply(
        &self,
        state: &mut StoreState,
        key: &str,
        fields: Vec<(Field, String)>,
    ) -> Result<WriteReport, ValidationError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }

        let bounds = self.config.name_length_bounds;
        let mut valid = Vec::with_capacity(fields.len() + 1);
        let mut rejected = Vec::new();
        for (field, raw) in fields {
            match field.canonicalize(&raw, bounds) {
                Ok(value) => valid.push((field, value)),
                Err(err) => {
                    warn!(key, field = %field, error = %err, "dropping invalid field");
                    rejected.push((field, err));
                }
            }
        }

        let has_year = valid.iter().any(|(f, _)| *f == Field::Year);
        let derived_year = valid.iter().find_map(|(f, v)| match (f, v) {
            (Field::Date, FieldValue::Date(d)) => Some(d.year()),
            _ => None,
        });
        if let (false, Some(year)) = (has_year, derived_year) {
            valid.push((Field::Year, FieldValue::Year(year)));
        }

        let StoreState { records, index } = state;
        let created = !records.contains_key(key);
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| MetadataRecord::new(key));

        let mut applied = Vec::with_capacity(valid.len());
        for (field, value) in valid {
            let indexed = value.index_key();
            let previous = record.set(&field, value);
            index.update(&field, previous.as_deref(), &indexed, key);
            applied.push(field);
        }
        record.last_updated = Utc::now();

        Ok(WriteReport {
            key: key.to_string(),
            created,
            applied,
            rejected,
        })
    }

    fn maybe_auto_save(&self) {
        if self.config.path.is_none() {
            return;
        }
        let due = match self.last_save.lock() {
            Ok(last) => last.elapsed() >= self.config.auto_save_interval(),
            Err(_) => false,
        };
        if due {
            if let Err(err) = self.save(false) {
                warn!(error = %err, "auto-save failed");
            }
        }
    }

    /// Documents whose `field` equals `value`, plus substring matches if
    /// `fuzzy`. Results are sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn search_by_field(
        &self,
        field: impl Into<Field>,
        value: &str,
        fuzzy: bool,
    ) -> LensResult<Vec<String>> {
        let field = field.into();
        let state = self.state.read().map_err(|_| lock_err("store.search_by_field"))?;
        Ok(to_vec(&self.field_matches(&state, &field, value, fuzzy)))
    }

    /// Documents drafted by `name`, compared in normalized form. With
    /// `fuzzy`, also documents whose drafter contains `name` or is
    /// contained in it.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn search_by_identity(&self, name: &str, fuzzy: bool) -> LensResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("store.search_by_identity"))?;
        Ok(to_vec(&self.identity_matches(&state, name, fuzzy)))
    }

    /// Documents whose `year` falls within `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn search_by_year(&self, spec: YearSpec) -> LensResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("store.search_by_year"))?;
        Ok(to_vec(&self.year_matches(&state, spec)))
    }

    /// Exact matches for each `(field, value)` criterion, combined per `mode`.
    /// No criteria yields no documents.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn multi_field_search<I, N, V>(&self, criteria: I, mode: MatchMode) -> LensResult<Vec<String>>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<Field>,
        V: AsRef<str>,
    {
        let criteria = collect_fields(criteria);
        let state = self.state.read().map_err(|_| lock_err("store.multi_field_search"))?;
        Ok(self
            .criteria_matches(&state, &criteria, mode)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default())
    }

    /// Apply an extracted query filter on top of `criteria`.
    ///
    /// The filter's year and identity are additional constraints that must
    /// all hold; a missing dimension does not constrain. With no criteria
    /// and an empty filter every document matches.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn search_filtered<I, N, V>(
        &self,
        filter: &FilterResult,
        criteria: I,
        mode: MatchMode,
    ) -> LensResult<Vec<String>>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<Field>,
        V: AsRef<str>,
    {
        let criteria = collect_fields(criteria);
        let state = self.state.read().map_err(|_| lock_err("store.search_filtered"))?;

        let mut constraints: Vec<BTreeSet<String>> = Vec::new();
        if let Some(set) = self.criteria_matches(&state, &criteria, mode) {
            constraints.push(set);
        }
        if let Some(spec) = filter.year {
            constraints.push(self.year_matches(&state, spec).as_ref().clone());
        }
        if let Some(identity) = filter.identity.as_deref() {
            constraints.push(self.identity_matches(&state, identity, false).as_ref().clone());
        }

        let Some(first) = constraints.pop() else {
            return Ok(state.records.keys().cloned().collect());
        };
        let result = constraints
            .iter()
            .fold(first, |acc, set| acc.intersection(set).cloned().collect());
        Ok(result.into_iter().collect())
    }

    /// `None` when there are no criteria.
    fn criteria_matches(
        &self,
        state: &StoreState,
        criteria: &[(Field, String)],
        mode: MatchMode,
    ) -> Option<BTreeSet<String>> {
        let mut sets = criteria
            .iter()
            .map(|(field, value)| self.field_matches(state, field, value, false));
        let first = sets.next()?.as_ref().clone();
        Some(sets.fold(first, |acc, set| match mode {
            MatchMode::All => acc.intersection(&set).cloned().collect(),
            MatchMode::Any => acc.union(&set).cloned().collect(),
        }))
    }

    fn cached(&self, key: CacheKey, compute: impl FnOnce() -> BTreeSet<String>) -> ResultSet {
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }
        let results = Arc::new(compute());
        self.cache.insert(key, Arc::clone(&results));
        results
    }

    fn field_matches(&self, state: &StoreState, field: &Field, value: &str, fuzzy: bool) -> ResultSet {
        let canonical = field
            .canonicalize(value, self.config.name_length_bounds)
            .map_or_else(|_| normalize_text(value), |v| v.index_key());
        let key = CacheKey::Field {
            field: field.clone(),
            value: canonical.clone(),
            fuzzy,
        };
        self.cached(key, || {
            let mut results = state.index.lookup(field, &canonical);
            let needle = canonical.to_lowercase();
            if fuzzy && !needle.is_empty() {
                results.extend(state.index.scan(field, |v| v.to_lowercase().contains(&needle)));
            }
            results
        })
    }

    fn identity_matches(&self, state: &StoreState, name: &str, fuzzy: bool) -> ResultSet {
        let normalized = normalize_identity(name);
        let key = CacheKey::Identity {
            name: normalized.clone(),
            fuzzy,
        };
        self.cached(key, || {
            if normalized.is_empty() {
                return BTreeSet::new();
            }
            let mut results = state.index.lookup(&Field::Drafter, &normalized);
            if fuzzy {
                results.extend(state.index.scan(&Field::Drafter, |v| {
                    v.contains(normalized.as_str()) || normalized.contains(v)
                }));
            }
            results
        })
    }

    fn year_matches(&self, state: &StoreState, spec: YearSpec) -> ResultSet {
        self.cached(CacheKey::Year(spec), || {
            spec.years()
                .flat_map(|year| state.index.lookup(&Field::Year, &year.to_string()))
                .collect()
        })
    }

    /// Record for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn get(&self, key: &str) -> LensResult<Option<MetadataRecord>> {
        let state = self.state.read().map_err(|_| lock_err("store.get"))?;
        Ok(state.records.get(key.trim()).cloned())
    }

    /// Whether a record exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn contains(&self, key: &str) -> LensResult<bool> {
        let state = self.state.read().map_err(|_| lock_err("store.contains"))?;
        Ok(state.records.contains_key(key.trim()))
    }

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn len(&self) -> LensResult<usize> {
        let state = self.state.read().map_err(|_| lock_err("store.len"))?;
        Ok(state.records.len())
    }

    /// Whether the store has no records.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn is_empty(&self) -> LensResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All document keys, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn keys(&self) -> LensResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("store.keys"))?;
        Ok(state.records.keys().cloned().collect())
    }

    /// Index values under which `key` is filed for `field`. A consistent
    /// store returns at most one value, equal to the record's.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn indexed_values(&self, field: impl Into<Field>, key: &str) -> LensResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("store.indexed_values"))?;
        Ok(state.index.memberships(&field.into(), key))
    }

    /// Whether there are writes not yet saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn stats(&self) -> LensResult<StoreStats> {
        let state = self.state.read().map_err(|_| lock_err("store.stats"))?;
        Ok(StoreStats {
            records: state.records.len(),
            index_buckets: state.index.bucket_counts(),
            cache_entries: self.cache.len(),
            dirty: self.is_dirty(),
        })
    }

    /// Write a snapshot if there are unsaved writes, or always if `force`.
    ///
    /// Returns whether a file was written; a memory-only store never writes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be written. The store
    /// stays dirty and the previous file is left in place.
    pub fn save(&self, force: bool) -> LensResult<bool> {
        let Some(path) = self.config.path.as_deref() else {
            return Ok(false);
        };
        let _guard = self.persist_lock.lock().map_err(|_| lock_err("store.save"))?;
        if !force && !self.is_dirty() {
            return Ok(false);
        }

        let snapshot = {
            let state = self.state.read().map_err(|_| lock_err("store.save.snapshot"))?;
            self.dirty.store(false, Ordering::SeqCst);
            Snapshot::new(state.records.values().cloned().collect())
        };

        if let Err(err) = persist::write_snapshot(path, &snapshot) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(err.into());
        }
        if let Ok(mut last) = self.last_save.lock() {
            *last = Instant::now();
        }
        info!(path = %path.display(), records = snapshot.records.len(), "metadata store saved");
        Ok(true)
    }

    /// Replace the in-memory state with the store file, or its backup.
    ///
    /// Indexes are rebuilt and the cache cleared. If neither file can be
    /// read the store is emptied. A memory-only store is left untouched
    /// and reports [`LoadSource::Empty`].
    ///
    /// # Errors
    ///
    /// Returns an error only for a poisoned lock.
    pub fn load(&self) -> LensResult<LoadSource> {
        let Some(path) = self.config.path.as_deref() else {
            return Ok(LoadSource::Empty);
        };
        let _guard = self.persist_lock.lock().map_err(|_| lock_err("store.load"))?;
        let (snapshot, source) = persist::read_with_fallback(path);
        let records = snapshot.map(|s| s.records).unwrap_or_default();

        let mut state = self.state.write().map_err(|_| lock_err("store.load"))?;
        state.records.clear();
        state.index.clear();
        for record in records {
            for (field, value) in record.fields() {
                state.index.update(&field, None, &value, &record.key);
            }
            state.records.insert(record.key.clone(), record);
        }
        self.cache.clear();
        self.dirty.store(false, Ordering::SeqCst);
        info!(path = %path.display(), ?source, records = state.records.len(), "metadata store loaded");
        Ok(source)
    }
}

fn collect_fields<I, N, V>(fields: I) -> Vec<(Field, String)>
where
    I: IntoIterator<Item = (N, V)>,
    N: Into<Field>,
    V: AsRef<str>,
{
    fields
        .into_iter()
        .map(|(name, value)| (name.into(), value.as_ref().to_string()))
        .collect()
}

fn to_vec(set: &ResultSet) -> Vec<String> {
    set.iter().cloned().collect()
}
