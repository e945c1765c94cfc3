use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::categorize::{categorize_keys, CategorizedKeys};
use crate::error::{Result, SimtransError};
use crate::keys::StringKey;
use crate::sources::fetch::StringFetcher;
use crate::sources::{EnglishStrings, SimulationCatalog, SimulationInfo, SourceValue};
use crate::translation::TranslationFile;
use super::{CategoryStats, ReportMode, ReportObject};

/// Strings of every repository a simulation uses
#[derive(Debug, Default)]
struct RepoStrings {
    english: BTreeMap<String, EnglishStrings>,
    translated: BTreeMap<String, TranslationFile>,
}

/// Count used and translated strings among `keys`
fn category_stats(keys: &[StringKey], strings: &RepoStrings, mode: ReportMode) -> CategoryStats {
    let mut total = 0;
    let mut translated = 0;

    for key in keys {
        let english = match strings.english.get(&key.repo) {
            Some(english) => SourceValue::lookup(english, &key.path),
            None => SourceValue::NoLongerUsed,
        };
        if !english.is_used() {
            continue;
        }
        total += 1;

        if mode == ReportMode::Translated {
            let has_translation = strings
                .translated
                .get(&key.repo)
                .and_then(|file| file.get(&key.path))
                .is_some_and(|record| !record.value.is_empty());
            if has_translation {
                translated += 1;
            }
        }
    }

    CategoryStats::new(total, translated)
}

/// Computes report objects from the catalog and string sources
#[derive(Clone)]
pub struct ReportObjectComputer {
    fetcher: StringFetcher,
    catalog: Arc<dyn SimulationCatalog>,
}

impl ReportObjectComputer {
    pub fn new(fetcher: StringFetcher, catalog: Arc<dyn SimulationCatalog>) -> Self {
        Self { fetcher, catalog }
    }

    /// Compute statistics for `simulation_name` in `language`.
    ///
    /// Fetch failures fail the computation; a missing file counts as empty.
    pub async fn compute(
        &self,
        simulation_name: &str,
        language: &str,
        mode: ReportMode,
    ) -> Result<ReportObject> {
        let sims = self.catalog.simulations().await?;
        self.compute_with(&sims, simulation_name, language, mode).await
    }

    /// Same as [`compute`](Self::compute) with an already fetched simulation list
    pub async fn compute_with(
        &self,
        sims: &[SimulationInfo],
        simulation_name: &str,
        language: &str,
        mode: ReportMode,
    ) -> Result<ReportObject> {
        let sim = sims
            .iter()
            .find(|s| s.name == simulation_name)
            .ok_or_else(|| SimtransError::UnknownSimulation(simulation_name.to_string()))?;
        let known: HashSet<String> = sims.iter().map(|s| s.name.clone()).collect();

        let raw_keys = self.catalog.string_keys(simulation_name).await?;
        let categorized = categorize_keys(&raw_keys, simulation_name, &known);
        let strings = self.fetch_strings(sim, language, &categorized, mode).await?;

        let report = ReportObject::new(
            simulation_name,
            &sim.title,
            category_stats(&categorized.common, &strings, mode),
            category_stats(&categorized.sim_specific, &strings, mode),
            category_stats(&categorized.shared, &strings, mode),
            categorized.shared_sims.clone(),
            Utc::now(),
        );

        debug!(
            "Computed {:?} report for {}/{}: {}% of {} strings",
            mode, simulation_name, language, report.percent_total, report.total_strings
        );
        Ok(report)
    }

    /// Any fetch error fails the report instead of counting the repository as
    /// absent, so a report with wrong counts is never cached. A missing file
    /// still counts as empty.
    async fn fetch_strings(
        &self,
        sim: &SimulationInfo,
        language: &str,
        categorized: &CategorizedKeys,
        mode: ReportMode,
    ) -> Result<RepoStrings> {
        let mut strings = RepoStrings::default();

        for repo in categorized.repos() {
            let git_ref = sim.dependencies.get(repo).map(String::as_str);
            let english = self.fetcher.english(repo, git_ref).await?;
            strings.english.insert(repo.to_string(), english);

            if mode == ReportMode::Translated {
                let translated = self.fetcher.translated(repo, language).await?;
                strings.translated.insert(repo.to_string(), translated);
            }
        }

        Ok(strings)
    }
}
