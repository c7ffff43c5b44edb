//! Flat-file stores.
//!
//! Every write goes straight to disk and every read goes back to disk; nothing
//! is cached. Whole files are rewritten through a temp file and a rename so a
//! crash mid-write leaves the previous version in place.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{CaseStore, VoteStore};
use crate::error::{StorageError, StoreResult};
use crate::types::*;

/// Read and parse a JSON file. A missing file is `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::json(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::json(path, e))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))
}

async fn ensure_dir(dir: &Path) -> StoreResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))
}

/// One `<id>.json` file per case
pub struct FileCaseStore {
    dir: PathBuf,
}

impl FileCaseStore {
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write seed cases that have no working copy yet. Existing files win, so
    /// admin changes survive a restart.
    pub async fn seed_missing(&self, seeds: Vec<Case>) -> StoreResult<usize> {
        let mut written = 0;
        for case in seeds {
            let path = self.path_for(&case.id);
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            if !exists {
                tracing::info!("Seeding case {} into {}", case.id, path.display());
                write_json(&path, &case).await?;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl CaseStore for FileCaseStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Case>> {
        if !is_valid_case_id(id) {
            return Ok(None);
        }
        let path = self.path_for(id);
        let case: Option<Case> = read_json(&path).await?;
        if let Some(ref c) = case {
            if c.id != id {
                return Err(StorageError::Invalid(format!(
                    "{} holds case '{}'",
                    path.display(),
                    c.id
                )));
            }
        }
        Ok(case)
    }

    async fn put(&self, case: Case) -> StoreResult<()> {
        if !is_valid_case_id(&case.id) {
            return Err(StorageError::Invalid(format!(
                "Invalid case id '{}'",
                case.id
            )));
        }
        write_json(&self.path_for(&case.id), &case).await
    }

    async fn ids(&self) -> StoreResult<Vec<CaseId>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_case_id(stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// JSON array of ballots at a fixed path, rewritten wholesale on each append
pub struct FileVoteStore {
    path: PathBuf,
    /// Appends from different cases still share one file
    write_lock: Mutex<()>,
}

impl FileVoteStore {
    /// Open the ballot file, creating it (and its directory) if needed
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        if !exists {
            write_json(&path, &Vec::<Ballot>::new()).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> StoreResult<Vec<Ballot>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl VoteStore for FileVoteStore {
    async fn append(&self, ballot: Ballot) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut ballots = self.read_all().await?;
        ballots.push(ballot);
        write_json(&self.path, &ballots).await
    }

    async fn all_for_case(&self, case_id: &str) -> StoreResult<Vec<Ballot>> {
        let mut ballots = self.read_all().await?;
        ballots.retain(|b| b.case_id == case_id);
        Ok(ballots)
    }
}
