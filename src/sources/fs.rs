use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, SimtransError};
use crate::form::TranslationFormData;
use crate::translation::{TranslationFile, UserId};
use super::{
    ensure_writable, DraftStore, EnglishStrings, EnglishStringSource, FetchOutcome,
    StoredTranslation, TranslatedStore, VersionMarker, WriteMode,
};

/// Read a file, mapping a missing file to `None`
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SimtransError::Io(e)),
    }
}

/// Replace `path` with `contents` in one rename so readers never see a partial file
async fn write_atomic(path: PathBuf, contents: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| SimtransError::Storage(format!("no parent directory for {}", path.display())))?;
        std::fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&contents)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| SimtransError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| SimtransError::Storage(format!("write task failed: {}", e)))?
}

/// Version marker derived from file contents.
///
/// `DefaultHasher` output may differ between Rust releases, so a marker is only
/// comparable with markers produced by the same build. A mismatch across builds
/// only causes a spurious "changed since it was resolved" warning.
pub fn content_version(bytes: &[u8]) -> VersionMarker {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    VersionMarker(format!("{:016x}", hasher.finish()))
}

/// Single path component taken from caller input; separators and `..` are refused
fn path_component<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
    let invalid = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(SimtransError::Storage(format!("invalid {} '{}' in storage path", kind, value)));
    }
    Ok(value)
}

/// English strings from checked out repositories: `{root}/{repo}/{repo}-strings_en.json`
pub struct LocalEnglishSource {
    root: PathBuf,
}

impl LocalEnglishSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl EnglishStringSource for LocalEnglishSource {
    async fn get(&self, repo: &str, git_ref: Option<&str>) -> Result<FetchOutcome<EnglishStrings>> {
        let repo = path_component("repository", repo)?;
        let path = self.root.join(repo).join(format!("{}-strings_en.json", repo));
        if let Some(git_ref) = git_ref {
            debug!("Local checkout ignores ref {} for {}", git_ref, repo);
        }

        match read_optional(&path).await? {
            Some(bytes) => Ok(FetchOutcome::Found(serde_json::from_slice(&bytes)?)),
            None => Ok(FetchOutcome::NotFound),
        }
    }
}

/// Durable translation files laid out as `{dir}/{repo}/{repo}-strings_{language}.json`
pub struct FsTranslatedStore {
    dir: PathBuf,
}

impl FsTranslatedStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn file_path(&self, repo: &str, language: &str) -> Result<PathBuf> {
        let repo = path_component("repository", repo)?;
        let language = path_component("language", language)?;
        Ok(self
            .dir
            .join(repo)
            .join(format!("{}-strings_{}.json", repo, language)))
    }

    async fn current_version(&self, path: &Path) -> Result<Option<VersionMarker>> {
        Ok(read_optional(path).await?.map(|bytes| content_version(&bytes)))
    }
}

#[async_trait]
impl TranslatedStore for FsTranslatedStore {
    async fn get(&self, repo: &str, language: &str) -> Result<StoredTranslation> {
        let path = self.file_path(repo, language)?;
        match read_optional(&path).await? {
            Some(bytes) => {
                let file: TranslationFile = serde_json::from_slice(&bytes)?;
                Ok(StoredTranslation::Found {
                    file,
                    version: content_version(&bytes),
                })
            }
            None => Ok(StoredTranslation::NotFound),
        }
    }

    async fn store(
        &self,
        repo: &str,
        language: &str,
        file: &TranslationFile,
        mode: WriteMode,
    ) -> Result<VersionMarker> {
        ensure_writable(repo, language, file)?;

        let path = self.file_path(repo, language)?;
        let current = self.current_version(&path).await?;

        // Last writer wins; a moved version only gets logged.
        match (&mode, &current) {
            (WriteMode::Create, Some(found)) => warn!(
                "{} appeared since it was resolved (version {}), overwriting",
                path.display(),
                found.0
            ),
            (WriteMode::Update(expected), Some(found)) if expected != found => warn!(
                "{} changed since it was resolved ({} -> {}), overwriting",
                path.display(),
                expected.0,
                found.0
            ),
            (WriteMode::Update(expected), None) => warn!(
                "{} disappeared since it was resolved (version {}), recreating",
                path.display(),
                expected.0
            ),
            _ => {}
        }

        let contents = serde_json::to_vec_pretty(file)?;
        let version = content_version(&contents);
        write_atomic(path.clone(), contents).await?;

        info!(
            "{} {} ({} strings, version {})",
            match mode {
                WriteMode::Create => "Created",
                WriteMode::Update(_) => "Updated",
            },
            path.display(),
            file.len(),
            version.0
        );
        Ok(version)
    }
}

/// Drafts laid out as `{dir}/{user}/{simulation}/{language}.json`
pub struct FsDraftStore {
    dir: PathBuf,
}

impl FsDraftStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn draft_path(&self, user_id: UserId, simulation_name: &str, language: &str) -> Result<PathBuf> {
        Ok(self
            .dir
            .join(user_id.to_string())
            .join(path_component("simulation", simulation_name)?)
            .join(format!("{}.json", path_component("language", language)?)))
    }
}

#[async_trait]
impl DraftStore for FsDraftStore {
    async fn get(
        &self,
        user_id: UserId,
        simulation_name: &str,
        language: &str,
    ) -> Result<Option<TranslationFormData>> {
        let path = self.draft_path(user_id, simulation_name, language)?;
        match read_optional(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user_id: UserId, form: &TranslationFormData) -> Result<()> {
        let path = self.draft_path(user_id, &form.simulation_name, &form.language)?;
        let contents = serde_json::to_vec_pretty(form)?;
        write_atomic(path, contents).await
    }

    async fn clear(&self, user_id: UserId, simulation_name: &str, language: &str) -> Result<()> {
        let path = self.draft_path(user_id, simulation_name, language)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SimtransError::Io(e)),
        }
    }
}
