use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, SimtransError};
use super::{SimulationCatalog, SimulationInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub info: SimulationInfo,
    /// Runtime keys extracted from the built simulation
    #[serde(default)]
    pub string_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub simulations: Vec<CatalogEntry>,
}

/// Catalog read from a JSON snapshot, with translated languages discovered from
/// the durable store directory
pub struct JsonSimulationCatalog {
    entries: BTreeMap<String, CatalogEntry>,
    translations_dir: Option<PathBuf>,
}

impl JsonSimulationCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P, translations_dir: Option<PathBuf>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SimtransError::Config(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let catalog: CatalogFile = serde_json::from_str(&content)?;
        info!("Loaded {} simulations from {}", catalog.simulations.len(), path.display());
        Ok(Self::new(catalog, translations_dir))
    }

    pub fn new(catalog: CatalogFile, translations_dir: Option<PathBuf>) -> Self {
        let entries = catalog
            .simulations
            .into_iter()
            .map(|entry| (entry.info.name.clone(), entry))
            .collect();
        Self {
            entries,
            translations_dir,
        }
    }
}

/// Languages per repository found under `{dir}/{repo}/{repo}-strings_{language}.json`
pub fn scan_translated_languages(dir: &Path) -> BTreeMap<String, BTreeSet<String>> {
    let mut languages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for entry in WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(repo) = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        else {
            continue;
        };
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        let language = file_name
            .strip_prefix(&format!("{}-strings_", repo))
            .and_then(|rest| rest.strip_suffix(".json"));

        if let Some(language) = language {
            if language != "en" {
                languages
                    .entry(repo.to_string())
                    .or_default()
                    .insert(language.to_string());
            }
        }
    }

    languages
}

#[async_trait]
impl SimulationCatalog for JsonSimulationCatalog {
    async fn simulations(&self) -> Result<Vec<SimulationInfo>> {
        let discovered = match &self.translations_dir {
            Some(dir) => {
                let dir = dir.clone();
                tokio::task::spawn_blocking(move || scan_translated_languages(&dir))
                    .await
                    .map_err(|e| SimtransError::Storage(format!("catalog scan failed: {}", e)))?
            }
            None => BTreeMap::new(),
        };

        Ok(self
            .entries
            .values()
            .map(|entry| {
                let mut info = entry.info.clone();
                if let Some(found) = discovered.get(&info.name) {
                    let mut merged: BTreeSet<String> =
                        info.translated_languages.drain(..).collect();
                    merged.extend(found.iter().cloned());
                    debug!("{} has translations in {:?}", info.name, merged);
                    info.translated_languages = merged.into_iter().collect();
                }
                info
            })
            .collect())
    }

    async fn string_keys(&self, simulation_name: &str) -> Result<Vec<String>> {
        self.entries
            .get(simulation_name)
            .map(|entry| entry.string_keys.clone())
            .ok_or_else(|| SimtransError::UnknownSimulation(simulation_name.to_string()))
    }
}
