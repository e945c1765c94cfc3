use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SimtransError};
use crate::form::{FormAssembler, TranslationFormData};
use crate::merge::{CommitStatus, RepoOutcome, TranslationFileMerger};
use crate::report::{
    ReportEvent, ReportMode, ReportObject, ReportObjectCache, ReportObjectComputer, ReportService,
};
use crate::sources::catalog::JsonSimulationCatalog;
use crate::sources::fetch::{StringFetcher, TimeoutCatalog, TimeoutDraftStore};
use crate::sources::fs::{FsDraftStore, FsTranslatedStore};
use crate::sources::{
    DraftStore, EnglishSourceFactory, EnglishStringSource, SimulationCatalog, SimulationInfo,
    TranslatedStore,
};
use crate::translation::{TranslationSubmission, UserId};

/// Per-repository outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub simulation_name: String,
    pub language: String,
    pub outcomes: Vec<RepoOutcome>,
    pub draft_cleared: bool,
}

impl SubmissionReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(RepoOutcome::is_success)
    }

    pub fn failed_repos(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.repo.as_str())
            .collect()
    }
}

/// The collaborators a workflow is built from
pub struct Collaborators {
    pub english: Arc<dyn EnglishStringSource>,
    pub translated: Arc<dyn TranslatedStore>,
    pub drafts: Arc<dyn DraftStore>,
    pub catalog: Arc<dyn SimulationCatalog>,
}

/// Entry point for translation forms, submissions and reports
#[derive(Clone)]
pub struct TranslationWorkflow {
    forms: FormAssembler,
    merger: TranslationFileMerger,
    reports: ReportService,
    drafts: Arc<dyn DraftStore>,
    catalog: Arc<dyn SimulationCatalog>,
}

impl TranslationWorkflow {
    /// Build a workflow backed by the configured filesystem stores
    pub fn from_config(config: &Config) -> Result<Self> {
        let english = EnglishSourceFactory::create_source(&config.english, &config.fetch)?;
        let catalog = JsonSimulationCatalog::from_file(
            &config.storage.catalog_path,
            Some(config.storage.translations_dir.clone()),
        )?;

        let collaborators = Collaborators {
            english,
            translated: Arc::new(FsTranslatedStore::new(&config.storage.translations_dir)),
            drafts: Arc::new(FsDraftStore::new(&config.storage.drafts_dir)),
            catalog: Arc::new(catalog),
        };
        let cache = Arc::new(ReportObjectCache::new(config.report.valid_window()));

        Ok(Self::new(collaborators, cache, config))
    }

    /// Build a workflow over explicit collaborators and a shared report cache.
    ///
    /// Every collaborator call is bounded by the configured fetch timeout.
    pub fn new(collaborators: Collaborators, cache: Arc<ReportObjectCache>, config: &Config) -> Self {
        let timeout = config.fetch.timeout();
        let fetcher = StringFetcher::new(collaborators.english, collaborators.translated, timeout);
        let drafts: Arc<dyn DraftStore> =
            Arc::new(TimeoutDraftStore::new(collaborators.drafts, timeout));
        let catalog: Arc<dyn SimulationCatalog> =
            Arc::new(TimeoutCatalog::new(collaborators.catalog, timeout));

        let forms = FormAssembler::new(fetcher.clone(), drafts.clone(), catalog.clone());
        let computer = ReportObjectComputer::new(fetcher.clone(), catalog.clone());
        let reports = ReportService::new(computer, catalog.clone(), cache, config.report.concurrency);

        Self {
            forms,
            merger: TranslationFileMerger::new(fetcher),
            reports,
            drafts,
            catalog,
        }
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    pub async fn simulations(&self) -> Result<Vec<SimulationInfo>> {
        self.catalog.simulations().await
    }

    pub async fn get_translation_form_data(
        &self,
        simulation_name: &str,
        language: &str,
        user_id: UserId,
    ) -> Result<TranslationFormData> {
        self.forms
            .get_translation_form_data(simulation_name, language, user_id)
            .await
    }

    pub async fn save_draft(&self, user_id: UserId, form: &TranslationFormData) -> Result<()> {
        self.drafts.save(user_id, form).await?;
        info!(
            "Saved draft of user {} for {}/{}",
            user_id, form.simulation_name, form.language
        );
        Ok(())
    }

    /// Merge `submission` into every owning repository.
    ///
    /// Repositories are committed independently; a failed repository can be
    /// retried by submitting again, already committed ones come back unchanged.
    /// Submissions for simulations missing from the catalog are rejected.
    pub async fn submit_translation(&self, submission: &TranslationSubmission) -> Result<SubmissionReport> {
        let known = self.catalog.simulations().await?;
        if !known.iter().any(|s| s.name == submission.simulation_name) {
            return Err(SimtransError::UnknownSimulation(submission.simulation_name.clone()));
        }

        let span = info_span!(
            "submission",
            id = %Uuid::new_v4(),
            sim = %submission.simulation_name,
            language = %submission.language,
            user = submission.user_id
        );

        async {
            let outcomes = self.merger.merge_submission(submission).await?;
            self.mark_affected_reports(submission, &outcomes, &known);

            let mut report = SubmissionReport {
                simulation_name: submission.simulation_name.clone(),
                language: submission.language.clone(),
                outcomes,
                draft_cleared: false,
            };

            if report.all_succeeded() {
                match self
                    .drafts
                    .clear(submission.user_id, &submission.simulation_name, &submission.language)
                    .await
                {
                    Ok(()) => report.draft_cleared = true,
                    Err(e) => warn!("Could not clear draft: {}", e),
                }
            } else {
                warn!("Submission failed for repositories {:?}", report.failed_repos());
            }

            Ok::<_, SimtransError>(report)
        }
        .instrument(span)
        .await
    }

    /// Mark the submitted simulation and every committed simulation repository dirty
    fn mark_affected_reports(
        &self,
        submission: &TranslationSubmission,
        outcomes: &[RepoOutcome],
        sims: &[SimulationInfo],
    ) {
        let committed: Vec<&str> = outcomes
            .iter()
            .filter(|o| matches!(o.status, CommitStatus::Committed { .. }))
            .map(|o| o.repo.as_str())
            .collect();
        if committed.is_empty() {
            return;
        }

        let known: HashSet<&str> = sims.iter().map(|s| s.name.as_str()).collect();

        let mut affected: Vec<&str> = vec![submission.simulation_name.as_str()];
        affected.extend(
            committed
                .into_iter()
                .filter(|repo| known.contains(*repo) && *repo != submission.simulation_name),
        );
        for sim in affected {
            self.reports.mark_dirty(&submission.language, sim);
        }
    }

    pub async fn get_report(
        &self,
        simulation_name: &str,
        language: &str,
        mode: ReportMode,
    ) -> Result<ReportObject> {
        self.reports.get_report(simulation_name, language, mode).await
    }

    pub async fn stream_language_report(
        &self,
        language: &str,
        mode: ReportMode,
    ) -> Result<mpsc::Receiver<ReportEvent>> {
        self.reports.stream_language_report(language, mode).await
    }

    pub fn flush_report(&self, language: &str, simulation_name: &str) -> bool {
        self.reports.flush_report(language, simulation_name)
    }
}
