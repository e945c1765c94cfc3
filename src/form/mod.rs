// Translation form assembly
//
// Builds the entries a translator edits for one (simulation, language) pair
// from English sources, the durable store and any unsubmitted draft:
// - mod: form data types and the assembler
// - transport: flattening form data for nested-object transports

pub mod transport;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::categorize::{categorize_keys, StringCategory};
use crate::error::{Result, SimtransError};
use crate::keys::StringKey;
use crate::sources::fetch::StringFetcher;
use crate::sources::{
    DraftStore, EnglishStrings, SimulationCatalog, SimulationInfo, SourceValue,
};
use crate::translation::{
    SubmissionFormData, SubmittedString, Timestamp, TranslationFile, TranslationSubmission, UserId,
};

/// One string as presented to a translator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatableEntry {
    pub key: StringKey,
    pub english_value: String,
    pub translated_value: String,
    /// Value in the durable store when the form was assembled
    pub prior_translated_value: String,
}

impl TranslatableEntry {
    pub fn owner_repo(&self) -> &str {
        &self.key.repo
    }
}

/// Everything a translator needs for one (simulation, language) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationFormData {
    pub simulation_name: String,
    pub language: String,
    pub sim_specific: Vec<TranslatableEntry>,
    pub shared: Vec<TranslatableEntry>,
    pub common: Vec<TranslatableEntry>,
}

impl TranslationFormData {
    pub fn empty(simulation_name: &str, language: &str) -> Self {
        Self {
            simulation_name: simulation_name.to_string(),
            language: language.to_string(),
            sim_specific: Vec::new(),
            shared: Vec::new(),
            common: Vec::new(),
        }
    }

    pub fn entries(&self, category: StringCategory) -> &[TranslatableEntry] {
        match category {
            StringCategory::Common => &self.common,
            StringCategory::SimSpecific => &self.sim_specific,
            StringCategory::Shared => &self.shared,
        }
    }

    fn entries_mut(&mut self, category: StringCategory) -> &mut Vec<TranslatableEntry> {
        match category {
            StringCategory::Common => &mut self.common,
            StringCategory::SimSpecific => &mut self.sim_specific,
            StringCategory::Shared => &mut self.shared,
        }
    }

    pub fn len(&self) -> usize {
        self.sim_specific.len() + self.shared.len() + self.common.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the translated value of `key`, returning false when the form has no such key
    pub fn set_translation(&mut self, key: &StringKey, value: &str) -> bool {
        for entry in self
            .sim_specific
            .iter_mut()
            .chain(self.shared.iter_mut())
            .chain(self.common.iter_mut())
        {
            if &entry.key == key {
                entry.translated_value = value.to_string();
                return true;
            }
        }
        false
    }

    /// Reverse the form into a submission
    pub fn to_submission(&self, user_id: UserId, timestamp: Timestamp) -> TranslationSubmission {
        let submitted = |entries: &[TranslatableEntry]| {
            entries
                .iter()
                .map(|entry| SubmittedString {
                    key: entry.key.clone(),
                    value: entry.translated_value.clone(),
                })
                .collect::<Vec<_>>()
        };

        TranslationSubmission {
            user_id,
            simulation_name: self.simulation_name.clone(),
            language: self.language.clone(),
            timestamp,
            form_data: SubmissionFormData {
                sim_specific: submitted(&self.sim_specific),
                shared: submitted(&self.shared),
                common: submitted(&self.common),
            },
        }
    }
}

/// Assembles translation forms, preferring a user's draft when one exists
#[derive(Clone)]
pub struct FormAssembler {
    fetcher: StringFetcher,
    drafts: Arc<dyn DraftStore>,
    catalog: Arc<dyn SimulationCatalog>,
}

impl FormAssembler {
    pub fn new(
        fetcher: StringFetcher,
        drafts: Arc<dyn DraftStore>,
        catalog: Arc<dyn SimulationCatalog>,
    ) -> Self {
        Self {
            fetcher,
            drafts,
            catalog,
        }
    }

    pub async fn get_translation_form_data(
        &self,
        simulation_name: &str,
        language: &str,
        user_id: UserId,
    ) -> Result<TranslationFormData> {
        match self.drafts.get(user_id, simulation_name, language).await {
            Ok(Some(draft)) => {
                info!("Using draft of user {} for {}/{}", user_id, simulation_name, language);
                return Ok(draft);
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Could not read draft of user {} for {}/{}: {}",
                user_id, simulation_name, language, e
            ),
        }

        self.assemble(simulation_name, language).await
    }

    /// Build the form from sources, ignoring drafts
    pub async fn assemble(&self, simulation_name: &str, language: &str) -> Result<TranslationFormData> {
        let sims = self.catalog.simulations().await?;
        let sim = sims
            .iter()
            .find(|s| s.name == simulation_name)
            .ok_or_else(|| SimtransError::UnknownSimulation(simulation_name.to_string()))?;
        let known: HashSet<String> = sims.iter().map(|s| s.name.clone()).collect();

        let raw_keys = self.catalog.string_keys(simulation_name).await?;
        let categorized = categorize_keys(&raw_keys, simulation_name, &known);

        let mut form = TranslationFormData::empty(simulation_name, language);
        for category in [
            StringCategory::SimSpecific,
            StringCategory::Shared,
            StringCategory::Common,
        ] {
            let keys = categorized.keys(category);
            *form.entries_mut(category) = self.assemble_entries(sim, language, keys).await;
        }

        info!(
            "Assembled {} translatable strings for {}/{} ({} sim-specific, {} shared, {} common)",
            form.len(),
            simulation_name,
            language,
            form.sim_specific.len(),
            form.shared.len(),
            form.common.len()
        );
        Ok(form)
    }

    async fn assemble_entries(
        &self,
        sim: &SimulationInfo,
        language: &str,
        keys: &[StringKey],
    ) -> Vec<TranslatableEntry> {
        let mut by_repo: BTreeMap<&str, Vec<&StringKey>> = BTreeMap::new();
        for key in keys {
            by_repo.entry(key.repo.as_str()).or_default().push(key);
        }

        let mut entries = Vec::with_capacity(keys.len());
        for (repo, repo_keys) in by_repo {
            let git_ref = sim.dependencies.get(repo).map(String::as_str);
            let english = match self.fetcher.english(repo, git_ref).await {
                Ok(strings) => strings,
                Err(e) => {
                    warn!("Skipping {} strings of {}: {}", repo, sim.name, e);
                    continue;
                }
            };
            let translated = match self.fetcher.translated(repo, language).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(
                        "Using empty {} translations of {} for {}: {}",
                        language, repo, sim.name, e
                    );
                    TranslationFile::new()
                }
            };
            entries.extend(build_entries(&repo_keys, &english, &translated));
        }
        entries
    }
}

/// Entries for keys of one repository; empty and no-longer-used English values are left out
fn build_entries(
    keys: &[&StringKey],
    english: &EnglishStrings,
    translated: &TranslationFile,
) -> Vec<TranslatableEntry> {
    keys.iter()
        .filter_map(|key| match SourceValue::lookup(english, &key.path) {
            SourceValue::NoLongerUsed => {
                debug!("{} is no longer used", key);
                None
            }
            SourceValue::Present(value) if value.is_empty() => None,
            SourceValue::Present(english_value) => {
                let translated_value = translated
                    .get(&key.path)
                    .map(|record| record.value.clone())
                    .unwrap_or_default();
                Some(TranslatableEntry {
                    key: (*key).clone(),
                    english_value,
                    prior_translated_value: translated_value.clone(),
                    translated_value,
                })
            }
        })
        .collect()
}
