// External collaborators of the translation core
//
// Each collaborator is a trait so backends can be swapped:
// - EnglishStringSource: English string files (http, local checkout, memory)
// - TranslatedStore: durable translation files with edit history (fs, memory)
// - DraftStore: per-user unsubmitted form data (fs, memory)
// - SimulationCatalog: known simulations and the keys each one uses (json file, memory)

pub mod catalog;
pub mod fetch;
pub mod fs;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{EnglishSourceConfig, EnglishSourceMode, FetchConfig};
use crate::error::{Result, SimtransError};
use crate::form::TranslationFormData;
use crate::keys::KeyPath;
use crate::translation::{TranslationFile, UserId};

/// Result of a fetch where a missing resource is a normal outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Found(T),
    NotFound,
}

impl<T: Default> FetchOutcome<T> {
    pub fn unwrap_or_default(self) -> T {
        match self {
            Self::Found(value) => value,
            Self::NotFound => T::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishEntry {
    pub value: String,
}

/// English string file of one repository
pub type EnglishStrings = BTreeMap<KeyPath, EnglishEntry>;

/// English value of a key as seen by a simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceValue {
    Present(String),
    /// The simulation still references the key but the repository no longer defines it
    NoLongerUsed,
}

impl SourceValue {
    pub fn lookup(strings: &EnglishStrings, path: &KeyPath) -> Self {
        match strings.get(path) {
            Some(entry) => Self::Present(entry.value.clone()),
            None => Self::NoLongerUsed,
        }
    }

    pub fn is_used(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Opaque marker of the stored version of a translation file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionMarker(pub String);

/// A durable translation file as resolved before a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTranslation {
    Found {
        file: TranslationFile,
        version: VersionMarker,
    },
    NotFound,
}

impl StoredTranslation {
    pub fn file(&self) -> Option<&TranslationFile> {
        match self {
            Self::Found { file, .. } => Some(file),
            Self::NotFound => None,
        }
    }

    pub fn into_file(self) -> TranslationFile {
        match self {
            Self::Found { file, .. } => file,
            Self::NotFound => TranslationFile::new(),
        }
    }

    /// Write branch implied by the resolved state
    pub fn write_mode(&self) -> WriteMode {
        match self {
            Self::Found { version, .. } => WriteMode::Update(version.clone()),
            Self::NotFound => WriteMode::Create,
        }
    }
}

/// Branch of a durable write, decided from the resolved state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update(VersionMarker),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInfo {
    pub name: String,
    pub title: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Languages with at least one translated string
    #[serde(default)]
    pub translated_languages: Vec<String>,
    /// Repository -> ref the simulation was built from
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

fn default_visible() -> bool {
    true
}

impl SimulationInfo {
    pub fn has_translation(&self, language: &str) -> bool {
        self.translated_languages.iter().any(|l| l == language)
    }
}

/// Refuse to persist a translation file with no entries
pub fn ensure_writable(repo: &str, language: &str, file: &TranslationFile) -> Result<()> {
    if file.is_empty() {
        return Err(SimtransError::Storage(format!(
            "refusing to write empty translation file for {}/{}",
            repo, language
        )));
    }
    Ok(())
}

/// Source of English string files
#[async_trait]
pub trait EnglishStringSource: Send + Sync {
    /// Fetch the English strings of `repo`, at `git_ref` when given
    async fn get(&self, repo: &str, git_ref: Option<&str>) -> Result<FetchOutcome<EnglishStrings>>;
}

/// Durable store of translation files with edit history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranslatedStore: Send + Sync {
    /// Resolve the current file and its version marker
    async fn get(&self, repo: &str, language: &str) -> Result<StoredTranslation>;

    /// Write `file` using the branch resolved earlier; returns the new version
    async fn store(
        &self,
        repo: &str,
        language: &str,
        file: &TranslationFile,
        mode: WriteMode,
    ) -> Result<VersionMarker>;
}

/// Store of unsubmitted per-user translations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(
        &self,
        user_id: UserId,
        simulation_name: &str,
        language: &str,
    ) -> Result<Option<TranslationFormData>>;

    async fn save(&self, user_id: UserId, form: &TranslationFormData) -> Result<()>;

    async fn clear(&self, user_id: UserId, simulation_name: &str, language: &str) -> Result<()>;
}

/// Known simulations and the string keys they use
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimulationCatalog: Send + Sync {
    async fn simulations(&self) -> Result<Vec<SimulationInfo>>;

    /// Runtime keys referenced by `simulation_name`
    async fn string_keys(&self, simulation_name: &str) -> Result<Vec<String>>;
}

/// Factory for creating English string sources
pub struct EnglishSourceFactory;

impl EnglishSourceFactory {
    /// Create a source based on the configured mode
    pub fn create_source(
        config: &EnglishSourceConfig,
        fetch: &FetchConfig,
    ) -> Result<Arc<dyn EnglishStringSource>> {
        match config.mode {
            EnglishSourceMode::Http => Ok(Arc::new(http::HttpEnglishSource::new(
                &config.base_url,
                &config.default_ref,
                fetch.timeout(),
            )?)),
            EnglishSourceMode::Local => {
                Ok(Arc::new(fs::LocalEnglishSource::new(&config.local_root)))
            }
        }
    }
}
