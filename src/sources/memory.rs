//! In-process backends for every collaborator trait.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Result, SimtransError};
use crate::form::TranslationFormData;
use crate::keys::KeyPath;
use crate::translation::{TranslationFile, UserId};
use super::catalog::CatalogEntry;
use super::{
    ensure_writable, DraftStore, EnglishEntry, EnglishStrings, EnglishStringSource, FetchOutcome,
    SimulationCatalog, SimulationInfo, StoredTranslation, TranslatedStore, VersionMarker,
    WriteMode,
};

#[derive(Default)]
pub struct MemoryEnglishSource {
    repos: RwLock<HashMap<String, EnglishStrings>>,
    failing: RwLock<HashSet<String>>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryEnglishSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, repo: &str, key: &str, value: &str) {
        self.repos
            .write()
            .entry(repo.to_string())
            .or_default()
            .insert(KeyPath::from(key), EnglishEntry { value: value.to_string() });
    }

    /// Make every fetch of `repo` fail with a transport error
    pub fn fail_repo(&self, repo: &str) {
        self.failing.write().insert(repo.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnglishStringSource for MemoryEnglishSource {
    async fn get(&self, repo: &str, _git_ref: Option<&str>) -> Result<FetchOutcome<EnglishStrings>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.read().contains(repo) {
            return Err(SimtransError::fetch(repo, "connection reset"));
        }
        Ok(match self.repos.read().get(repo) {
            Some(strings) => FetchOutcome::Found(strings.clone()),
            None => FetchOutcome::NotFound,
        })
    }
}

#[derive(Default)]
pub struct MemoryTranslatedStore {
    files: RwLock<HashMap<(String, String), (TranslationFile, u64)>>,
    failing: RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryTranslatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a write
    pub fn insert_file(&self, repo: &str, language: &str, file: TranslationFile) {
        self.files
            .write()
            .insert((repo.to_string(), language.to_string()), (file, 1));
    }

    pub fn file(&self, repo: &str, language: &str) -> Option<TranslationFile> {
        self.files
            .read()
            .get(&(repo.to_string(), language.to_string()))
            .map(|(file, _)| file.clone())
    }

    /// Make every read of `repo` fail with a transport error
    pub fn fail_repo(&self, repo: &str) {
        self.failing.write().insert(repo.to_string());
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslatedStore for MemoryTranslatedStore {
    async fn get(&self, repo: &str, language: &str) -> Result<StoredTranslation> {
        if self.failing.read().contains(repo) {
            return Err(SimtransError::fetch(repo, "service unavailable"));
        }
        Ok(
            match self
                .files
                .read()
                .get(&(repo.to_string(), language.to_string()))
            {
                Some((file, version)) => StoredTranslation::Found {
                    file: file.clone(),
                    version: VersionMarker(version.to_string()),
                },
                None => StoredTranslation::NotFound,
            },
        )
    }

    async fn store(
        &self,
        repo: &str,
        language: &str,
        file: &TranslationFile,
        _mode: WriteMode,
    ) -> Result<VersionMarker> {
        ensure_writable(repo, language, file)?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut files = self.files.write();
        let slot = files
            .entry((repo.to_string(), language.to_string()))
            .or_insert_with(|| (TranslationFile::new(), 0));
        slot.0 = file.clone();
        slot.1 += 1;
        Ok(VersionMarker(slot.1.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<(UserId, String, String), TranslationFormData>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(
        &self,
        user_id: UserId,
        simulation_name: &str,
        language: &str,
    ) -> Result<Option<TranslationFormData>> {
        Ok(self
            .drafts
            .read()
            .get(&(user_id, simulation_name.to_string(), language.to_string()))
            .cloned())
    }

    async fn save(&self, user_id: UserId, form: &TranslationFormData) -> Result<()> {
        self.drafts.write().insert(
            (user_id, form.simulation_name.clone(), form.language.clone()),
            form.clone(),
        );
        Ok(())
    }

    async fn clear(&self, user_id: UserId, simulation_name: &str, language: &str) -> Result<()> {
        self.drafts
            .write()
            .remove(&(user_id, simulation_name.to_string(), language.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
    listings: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, info: SimulationInfo, string_keys: Vec<String>) {
        self.entries.write().push(CatalogEntry { info, string_keys });
    }

    /// Add a visible simulation with no translations yet
    pub fn add_simulation(&self, name: &str, title: &str, string_keys: &[&str]) {
        self.add(
            SimulationInfo {
                name: name.to_string(),
                title: title.to_string(),
                visible: true,
                translated_languages: Vec::new(),
                dependencies: Default::default(),
            },
            string_keys.iter().map(|k| k.to_string()).collect(),
        );
    }

    /// Number of `simulations()` calls so far
    pub fn simulations_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimulationCatalog for MemoryCatalog {
    async fn simulations(&self) -> Result<Vec<SimulationInfo>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.read().iter().map(|e| e.info.clone()).collect())
    }

    async fn string_keys(&self, simulation_name: &str) -> Result<Vec<String>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.info.name == simulation_name)
            .map(|e| e.string_keys.clone())
            .ok_or_else(|| SimtransError::UnknownSimulation(simulation_name.to_string()))
    }
}
