use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SimtransError};
use crate::form::TranslationFormData;
use crate::translation::{TranslationFile, UserId};
use super::{
    DraftStore, EnglishStrings, EnglishStringSource, FetchOutcome, SimulationCatalog,
    SimulationInfo, StoredTranslation, TranslatedStore, VersionMarker, WriteMode,
};

/// Run `future`, failing with [`SimtransError::Timeout`] once `timeout` elapses
pub async fn with_timeout<T, F>(timeout: Duration, what: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(SimtransError::Timeout {
            what: what.to_string(),
            seconds: timeout.as_secs(),
        }),
    }
}

/// English and translated string access with a timeout on every call
#[derive(Clone)]
pub struct StringFetcher {
    english: Arc<dyn EnglishStringSource>,
    translated: Arc<dyn TranslatedStore>,
    timeout: Duration,
}

impl StringFetcher {
    pub fn new(
        english: Arc<dyn EnglishStringSource>,
        translated: Arc<dyn TranslatedStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            english,
            translated,
            timeout,
        }
    }

    /// English strings of `repo`; a missing file reads as empty
    pub async fn english(&self, repo: &str, git_ref: Option<&str>) -> Result<EnglishStrings> {
        let what = format!("English strings of {}", repo);
        match with_timeout(self.timeout, &what, self.english.get(repo, git_ref)).await? {
            FetchOutcome::Found(strings) => Ok(strings),
            FetchOutcome::NotFound => {
                debug!("No English string file for {} at {:?}", repo, git_ref);
                Ok(EnglishStrings::new())
            }
        }
    }

    /// Current translations of `repo`; a missing file reads as empty
    pub async fn translated(&self, repo: &str, language: &str) -> Result<TranslationFile> {
        Ok(self.resolve(repo, language).await?.into_file())
    }

    /// Current translation file together with its version marker
    pub async fn resolve(&self, repo: &str, language: &str) -> Result<StoredTranslation> {
        let what = format!("{} translations of {}", language, repo);
        with_timeout(self.timeout, &what, self.translated.get(repo, language)).await
    }

    pub async fn store(
        &self,
        repo: &str,
        language: &str,
        file: &TranslationFile,
        mode: WriteMode,
    ) -> Result<VersionMarker> {
        let what = format!("write of {} translations of {}", language, repo);
        with_timeout(self.timeout, &what, self.translated.store(repo, language, file, mode)).await
    }
}

/// Catalog whose every call gives up after `timeout`
pub struct TimeoutCatalog {
    inner: Arc<dyn SimulationCatalog>,
    timeout: Duration,
}

impl TimeoutCatalog {
    pub fn new(inner: Arc<dyn SimulationCatalog>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl SimulationCatalog for TimeoutCatalog {
    async fn simulations(&self) -> Result<Vec<SimulationInfo>> {
        with_timeout(self.timeout, "simulation catalog", self.inner.simulations()).await
    }

    async fn string_keys(&self, simulation_name: &str) -> Result<Vec<String>> {
        let what = format!("string keys of {}", simulation_name);
        with_timeout(self.timeout, &what, self.inner.string_keys(simulation_name)).await
    }
}

/// Draft store whose every call gives up after `timeout`
pub struct TimeoutDraftStore {
    inner: Arc<dyn DraftStore>,
    timeout: Duration,
}

impl TimeoutDraftStore {
    pub fn new(inner: Arc<dyn DraftStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl DraftStore for TimeoutDraftStore {
    async fn get(
        &self,
        user_id: UserId,
        simulation_name: &str,
        language: &str,
    ) -> Result<Option<TranslationFormData>> {
        let what = format!("draft of user {} for {}/{}", user_id, simulation_name, language);
        with_timeout(self.timeout, &what, self.inner.get(user_id, simulation_name, language)).await
    }

    async fn save(&self, user_id: UserId, form: &TranslationFormData) -> Result<()> {
        let what = format!("draft save of user {}", user_id);
        with_timeout(self.timeout, &what, self.inner.save(user_id, form)).await
    }

    async fn clear(&self, user_id: UserId, simulation_name: &str, language: &str) -> Result<()> {
        let what = format!("draft clear of user {}", user_id);
        with_timeout(self.timeout, &what, self.inner.clear(user_id, simulation_name, language)).await
    }
}
