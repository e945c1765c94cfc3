//! Next-state computation for durable translation files.
//!
//! Every change appends to a record's history; records the submission does not
//! change are carried forward untouched. Concurrent writers of the same
//! (repository, language) are not serialized: the last write wins.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keys::KeyPath;
use crate::sources::fetch::StringFetcher;
use crate::sources::{VersionMarker, WriteMode};
use crate::translation::{
    Timestamp, TranslationFile, TranslationRecord, TranslationSubmission, UserId,
};

/// Apply `submitted` to `existing`.
///
/// Returns `None` when the result would equal `existing`, in which case
/// nothing should be written.
pub fn merge_translation_file(
    existing: &TranslationFile,
    submitted: &[(KeyPath, String)],
    user_id: UserId,
    timestamp: Timestamp,
) -> Option<TranslationFile> {
    let mut next = existing.clone();

    for (path, value) in submitted {
        match next.get_mut(path) {
            Some(record) => {
                if &record.value != value {
                    record.update(value.clone(), user_id, timestamp);
                }
            }
            None if value.is_empty() => {}
            None => {
                next.insert(
                    path.clone(),
                    TranslationRecord::created(value.clone(), user_id, timestamp),
                );
            }
        }
    }

    if &next == existing {
        None
    } else {
        Some(next)
    }
}

/// A merged file ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub repo: String,
    pub language: String,
    pub file: TranslationFile,
    pub mode: WriteMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CommitStatus {
    Committed { version: VersionMarker },
    /// The submission changed nothing in this repository
    Unchanged,
    Failed { error: String },
}

/// Result of a submission for one owning repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoOutcome {
    pub repo: String,
    #[serde(flatten)]
    pub status: CommitStatus,
}

impl RepoOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, CommitStatus::Failed { .. })
    }
}

#[derive(Clone)]
pub struct TranslationFileMerger {
    fetcher: StringFetcher,
}

impl TranslationFileMerger {
    pub fn new(fetcher: StringFetcher) -> Self {
        Self { fetcher }
    }

    /// Resolve the stored file for `repo` and merge `submitted` into it.
    ///
    /// Any failure to resolve other than a missing file is returned as an
    /// error; it never reads as an empty file.
    pub async fn prepare(
        &self,
        repo: &str,
        language: &str,
        submitted: &[(KeyPath, String)],
        user_id: UserId,
        timestamp: Timestamp,
    ) -> Result<Option<MergePlan>> {
        let stored = self.fetcher.resolve(repo, language).await?;
        let mode = stored.write_mode();
        let existing = stored.into_file();

        Ok(
            merge_translation_file(&existing, submitted, user_id, timestamp).map(|file| {
                MergePlan {
                    repo: repo.to_string(),
                    language: language.to_string(),
                    file,
                    mode,
                }
            }),
        )
    }

    pub async fn commit(&self, plan: MergePlan) -> Result<VersionMarker> {
        self.fetcher
            .store(&plan.repo, &plan.language, &plan.file, plan.mode)
            .await
    }

    async fn merge_repo(
        &self,
        repo: &str,
        submission: &TranslationSubmission,
        submitted: &[(KeyPath, String)],
    ) -> Result<CommitStatus> {
        let plan = self
            .prepare(
                repo,
                &submission.language,
                submitted,
                submission.user_id,
                submission.timestamp,
            )
            .await?;

        match plan {
            Some(plan) => {
                let version = self.commit(plan).await?;
                Ok(CommitStatus::Committed { version })
            }
            None => {
                debug!("No changes to {}/{}", repo, submission.language);
                Ok(CommitStatus::Unchanged)
            }
        }
    }

    /// Merge and write every repository touched by `submission`.
    ///
    /// A malformed submission is rejected before any repository is touched.
    pub async fn merge_submission(&self, submission: &TranslationSubmission) -> Result<Vec<RepoOutcome>> {
        let mut outcomes = Vec::new();

        for (repo, submitted) in submission.partition_by_repo()? {
            let status = match self.merge_repo(&repo, submission, &submitted).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        "Merge of {}/{} for {} aborted: {}",
                        repo, submission.language, submission.simulation_name, e
                    );
                    CommitStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            if let CommitStatus::Committed { version } = &status {
                info!("Committed {}/{} as version {}", repo, submission.language, version.0);
            }
            outcomes.push(RepoOutcome { repo, status });
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimtransError;
    use crate::keys::StringKey;
    use crate::sources::memory::{MemoryEnglishSource, MemoryTranslatedStore};
    use crate::sources::{MockTranslatedStore, StoredTranslation};
    use crate::translation::{HistoryEntry, SubmissionFormData, SubmittedString};
    use std::sync::Arc;
    use std::time::Duration;

    fn path(p: &str) -> KeyPath {
        KeyPath::from(p)
    }

    fn existing_file() -> TranslationFile {
        let mut file = TranslationFile::new();
        let mut title = TranslationRecord::created("Soluciones".to_string(), 1, 100);
        title.update("Soluciones ácido-base".to_string(), 2, 200);
        file.insert(path("title"), title);
        file.insert(
            path("screen.intro"),
            TranslationRecord::created("Introducción".to_string(), 1, 100),
        );
        file.insert(
            path("screen.micro"),
            TranslationRecord::created("Micro".to_string(), 1, 100),
        );
        file
    }

    #[test]
    fn test_changed_key_appends_history() {
        let existing = existing_file();
        let submitted = vec![
            (path("screen.intro"), "Intro".to_string()),
            (path("title"), "Soluciones ácido-base".to_string()),
        ];

        let merged = merge_translation_file(&existing, &submitted, 9, 300).unwrap();

        let intro = &merged[&path("screen.intro")];
        assert_eq!(intro.value, "Intro");
        assert_eq!(intro.history.len(), existing[&path("screen.intro")].history.len() + 1);
        assert_eq!(
            intro.history.last().unwrap(),
            &HistoryEntry {
                user_id: 9,
                timestamp: 300,
                old_value: "Introducción".to_string(),
                new_value: "Intro".to_string(),
            }
        );
        assert_eq!(merged[&path("title")], existing[&path("title")]);
        assert_eq!(merged[&path("screen.micro")], existing[&path("screen.micro")]);
    }

    #[test]
    fn test_new_key_gets_single_history_entry() {
        let submitted = vec![(path("credits"), "Créditos".to_string())];
        let merged = merge_translation_file(&TranslationFile::new(), &submitted, 5, 50).unwrap();

        let record = &merged[&path("credits")];
        assert_eq!(record.value, "Créditos");
        assert_eq!(
            record.history,
            vec![HistoryEntry {
                user_id: 5,
                timestamp: 50,
                old_value: String::new(),
                new_value: "Créditos".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_value_for_new_key_is_ignored() {
        let submitted = vec![(path("credits"), String::new())];
        assert_eq!(merge_translation_file(&TranslationFile::new(), &submitted, 5, 50), None);
    }

    #[test]
    fn test_clearing_existing_value_is_recorded() {
        let submitted = vec![(path("screen.micro"), String::new())];
        let merged = merge_translation_file(&existing_file(), &submitted, 5, 50).unwrap();

        let micro = &merged[&path("screen.micro")];
        assert_eq!(micro.value, "");
        assert_eq!(micro.history.last().unwrap().old_value, "Micro");
    }

    #[test]
    fn test_unchanged_submission_is_nothing_to_persist() {
        let submitted = vec![
            (path("title"), "Soluciones ácido-base".to_string()),
            (path("screen.intro"), "Introducción".to_string()),
        ];
        assert_eq!(merge_translation_file(&existing_file(), &submitted, 9, 300), None);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = existing_file();
        let submitted = vec![
            (path("title"), "Ácido y base".to_string()),
            (path("credits"), "Créditos".to_string()),
        ];

        let first = merge_translation_file(&existing, &submitted, 3, 400).unwrap();
        let second = merge_translation_file(&existing, &submitted, 3, 400).unwrap();
        assert_eq!(first, second);

        assert_eq!(merge_translation_file(&first, &submitted, 3, 500), None);
    }

    #[test]
    fn test_invariant_value_matches_last_history_entry() {
        let submitted = vec![
            (path("title"), "A".to_string()),
            (path("title"), "B".to_string()),
            (path("new.key"), "C".to_string()),
        ];
        let merged = merge_translation_file(&existing_file(), &submitted, 1, 1).unwrap();

        let title = &merged[&path("title")];
        assert_eq!(title.history.len(), 4);
        assert_eq!(title.history[2].new_value, "A");
        assert_eq!(title.history[3].old_value, "A");
        for record in merged.values() {
            assert_eq!(record.value, record.history.last().unwrap().new_value);
        }
    }

    fn submission(sim_specific: Vec<(&str, &str)>, common: Vec<(&str, &str)>) -> TranslationSubmission {
        let to_submitted = |entries: Vec<(&str, &str)>| {
            entries
                .into_iter()
                .map(|(key, value)| SubmittedString {
                    key: StringKey::parse(key).unwrap(),
                    value: value.to_string(),
                })
                .collect()
        };
        TranslationSubmission {
            user_id: 42,
            simulation_name: "acid-base-solutions".to_string(),
            language: "es".to_string(),
            timestamp: 1_000,
            form_data: SubmissionFormData {
                sim_specific: to_submitted(sim_specific),
                shared: Vec::new(),
                common: to_submitted(common),
            },
        }
    }

    fn merger_over(store: Arc<dyn crate::sources::TranslatedStore>) -> TranslationFileMerger {
        TranslationFileMerger::new(StringFetcher::new(
            Arc::new(MemoryEnglishSource::new()),
            store,
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn test_submission_touches_only_changed_key() {
        let store = Arc::new(MemoryTranslatedStore::new());
        store.insert_file("acid-base-solutions", "es", existing_file());
        let merger = merger_over(store.clone());

        let outcomes = merger
            .merge_submission(&submission(
                vec![
                    ("ACID_BASE_SOLUTIONS/screen.intro", "Intro"),
                    ("ACID_BASE_SOLUTIONS/title", "Soluciones ácido-base"),
                ],
                vec![],
            ))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].status, CommitStatus::Committed { .. }));

        let before = existing_file();
        let after = store.file("acid-base-solutions", "es").unwrap();
        let grown: Vec<&KeyPath> = after
            .iter()
            .filter(|(key, record)| record.history.len() != before[*key].history.len())
            .map(|(key, _)| key)
            .collect();
        assert_eq!(grown, vec![&path("screen.intro")]);
    }

    #[tokio::test]
    async fn test_resubmission_is_unchanged_and_skips_write() {
        let store = Arc::new(MemoryTranslatedStore::new());
        let merger = merger_over(store.clone());
        let submission = submission(
            vec![("ACID_BASE_SOLUTIONS/title", "Soluciones")],
            vec![("JOIST/home", "Inicio")],
        );

        let first = merger.merge_submission(&submission).await.unwrap();
        assert!(first.iter().all(|o| matches!(o.status, CommitStatus::Committed { .. })));
        assert_eq!(store.write_count(), 2);

        let second = merger.merge_submission(&submission).await.unwrap();
        assert!(second.iter().all(|o| o.status == CommitStatus::Unchanged));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_only_that_repo() {
        let mut store = MockTranslatedStore::new();
        store.expect_get().returning(|repo, _| {
            if repo == "joist" {
                Err(SimtransError::fetch("joist", "502 bad gateway"))
            } else {
                Ok(StoredTranslation::NotFound)
            }
        });
        store
            .expect_store()
            .times(1)
            .withf(|repo, _, _, mode| repo == "acid-base-solutions" && *mode == WriteMode::Create)
            .returning(|_, _, _, _| Ok(VersionMarker("v1".to_string())));
        let merger = merger_over(Arc::new(store));

        let outcomes = merger
            .merge_submission(&submission(
                vec![("ACID_BASE_SOLUTIONS/title", "Soluciones")],
                vec![("JOIST/home", "Inicio")],
            ))
            .await
            .unwrap();

        assert_eq!(outcomes[0].repo, "acid-base-solutions");
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[1].repo, "joist");
        assert!(matches!(outcomes[1].status, CommitStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_misplaced_sim_specific_key_writes_nothing() {
        let store = Arc::new(MemoryTranslatedStore::new());
        let merger = merger_over(store.clone());

        let result = merger
            .merge_submission(&submission(
                vec![("PH_SCALE/water", "agua")],
                vec![("JOIST/home", "Inicio")],
            ))
            .await;

        assert!(matches!(result, Err(SimtransError::InvalidSubmission(_))));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_file_is_updated_with_its_version() {
        let mut store = MockTranslatedStore::new();
        store.expect_get().returning(|_, _| {
            Ok(StoredTranslation::Found {
                file: existing_file(),
                version: VersionMarker("abc123".to_string()),
            })
        });
        store
            .expect_store()
            .times(1)
            .withf(|_, _, file, mode| {
                *mode == WriteMode::Update(VersionMarker("abc123".to_string()))
                    && file[&KeyPath::from("title")].value == "Nuevo"
            })
            .returning(|_, _, _, _| Ok(VersionMarker("def456".to_string())));
        let merger = merger_over(Arc::new(store));

        let plan = merger
            .prepare("acid-base-solutions", "es", &[(path("title"), "Nuevo".to_string())], 1, 2)
            .await
            .unwrap()
            .unwrap();
        let version = merger.commit(plan).await.unwrap();
        assert_eq!(version, VersionMarker("def456".to_string()));
    }
}
