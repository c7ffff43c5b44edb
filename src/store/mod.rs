//! Case and ballot storage.
//!
//! Two backends exist for each store: an in-memory one that lives and dies
//! with the process, and a flat-file one that writes through to disk on every
//! change and re-reads on every query.

pub mod file;
pub mod memory;
pub mod seed;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::types::*;

pub use file::{FileCaseStore, FileVoteStore};
pub use memory::{MemoryCaseStore, MemoryVoteStore};

/// Holds case content and mutable state
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Fetch a case by its exact id
    async fn get(&self, id: &str) -> StoreResult<Option<Case>>;

    /// Insert or replace a case
    async fn put(&self, case: Case) -> StoreResult<()>;

    /// All known case ids, sorted
    async fn ids(&self) -> StoreResult<Vec<CaseId>>;
}

/// Append-only record of ballots
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn append(&self, ballot: Ballot) -> StoreResult<()>;

    async fn all_for_case(&self, case_id: &str) -> StoreResult<Vec<Ballot>>;

    /// Whether any ballot for this case matches either half of the identity
    async fn exists(&self, case_id: &str, identity: &VoterIdentity) -> StoreResult<bool> {
        Ok(self
            .all_for_case(case_id)
            .await?
            .iter()
            .any(|b| b.matches(identity)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    File,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Backend::Memory),
            "file" | "json" => Some(Backend::File),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the static case seed files
    pub cases_dir: PathBuf,
    pub case_backend: Backend,
    /// Where the file case store keeps its working copies
    pub case_state_dir: PathBuf,
    pub vote_backend: Backend,
    pub votes_file: PathBuf,
    /// Case served when a request names none
    pub default_case_id: CaseId,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cases_dir: PathBuf::from("data/cases"),
            case_backend: Backend::Memory,
            case_state_dir: PathBuf::from("data/state/cases"),
            vote_backend: Backend::File,
            votes_file: PathBuf::from("data/votes.json"),
            default_case_id: "case_001".to_string(),
        }
    }
}

impl StorageConfig {
    /// Load storage config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backend = |var: &str, fallback: Backend| match std::env::var(var) {
            Ok(v) => Backend::parse(&v).unwrap_or_else(|| {
                tracing::warn!("Unknown {} value '{}', using {:?}", var, v, fallback);
                fallback
            }),
            Err(_) => fallback,
        };
        let path = |var: &str, fallback: PathBuf| {
            std::env::var(var)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(fallback)
        };

        let config = Self {
            cases_dir: path("CASES_DIR", defaults.cases_dir),
            case_backend: backend("CASE_STORE", defaults.case_backend),
            case_state_dir: path("CASE_STATE_DIR", defaults.case_state_dir),
            vote_backend: backend("VOTE_STORE", defaults.vote_backend),
            votes_file: path("VOTES_FILE", defaults.votes_file),
            default_case_id: std::env::var("DEFAULT_CASE_ID")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.default_case_id),
        };

        tracing::info!(
            cases_dir = %config.cases_dir.display(),
            case_backend = ?config.case_backend,
            vote_backend = ?config.vote_backend,
            votes_file = %config.votes_file.display(),
            default_case = %config.default_case_id,
            "Storage config loaded"
        );

        config
    }

    /// Build the case store, seeding it from the seed directory
    pub async fn build_case_store(&self) -> StoreResult<Arc<dyn CaseStore>> {
        let seeds = seed::load_seed_dir(&self.cases_dir).await?;
        tracing::info!(
            "Loaded {} case(s) from {}",
            seeds.len(),
            self.cases_dir.display()
        );

        match self.case_backend {
            Backend::Memory => Ok(Arc::new(MemoryCaseStore::with_cases(seeds))),
            Backend::File => {
                let store = FileCaseStore::open(&self.case_state_dir).await?;
                store.seed_missing(seeds).await?;
                Ok(Arc::new(store))
            }
        }
    }

    pub async fn build_vote_store(&self) -> StoreResult<Arc<dyn VoteStore>> {
        match self.vote_backend {
            Backend::Memory => Ok(Arc::new(MemoryVoteStore::new())),
            Backend::File => Ok(Arc::new(FileVoteStore::open(&self.votes_file).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "CASES_DIR",
            "CASE_STORE",
            "CASE_STATE_DIR",
            "VOTE_STORE",
            "VOTES_FILE",
            "DEFAULT_CASE_ID",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("memory"), Some(Backend::Memory));
        assert_eq!(Backend::parse(" FILE "), Some(Backend::File));
        assert_eq!(Backend::parse("json"), Some(Backend::File));
        assert_eq!(Backend::parse("postgres"), None);
    }

    #[test]
    #[serial]
    fn test_storage_config_defaults() {
        clear_env();
        let config = StorageConfig::from_env();
        assert_eq!(config.case_backend, Backend::Memory);
        assert_eq!(config.vote_backend, Backend::File);
        assert_eq!(config.votes_file, PathBuf::from("data/votes.json"));
        assert_eq!(config.default_case_id, "case_001");
    }

    #[test]
    #[serial]
    fn test_storage_config_from_env() {
        clear_env();
        std::env::set_var("CASE_STORE", "file");
        std::env::set_var("VOTE_STORE", "memory");
        std::env::set_var("VOTES_FILE", "/tmp/ballots.json");
        std::env::set_var("DEFAULT_CASE_ID", "case_007");
        std::env::set_var("CASE_STATE_DIR", "  ");

        let config = StorageConfig::from_env();
        assert_eq!(config.case_backend, Backend::File);
        assert_eq!(config.vote_backend, Backend::Memory);
        assert_eq!(config.votes_file, PathBuf::from("/tmp/ballots.json"));
        assert_eq!(config.default_case_id, "case_007");
        // Blank values fall back to the default
        assert_eq!(config.case_state_dir, PathBuf::from("data/state/cases"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unknown_backend_falls_back() {
        clear_env();
        std::env::set_var("VOTE_STORE", "redis");
        let config = StorageConfig::from_env();
        assert_eq!(config.vote_backend, Backend::File);
        clear_env();
    }

    #[tokio::test]
    async fn test_build_stores_from_seed_dir() {
        let dir = tempfile::tempdir().unwrap();
        let seed_dir = dir.path().join("cases");
        tokio::fs::create_dir_all(&seed_dir).await.unwrap();
        let case = crate::types::fixtures::sample_case("case_001");
        tokio::fs::write(
            seed_dir.join("case_001.json"),
            serde_json::to_vec(&case).unwrap(),
        )
        .await
        .unwrap();

        let config = StorageConfig {
            cases_dir: seed_dir,
            case_backend: Backend::File,
            case_state_dir: dir.path().join("state"),
            vote_backend: Backend::File,
            votes_file: dir.path().join("votes.json"),
            default_case_id: "case_001".to_string(),
        };

        let cases = config.build_case_store().await.unwrap();
        assert_eq!(cases.get("case_001").await.unwrap(), Some(case));

        let votes = config.build_vote_store().await.unwrap();
        assert!(votes.all_for_case("case_001").await.unwrap().is_empty());
        assert!(dir.path().join("votes.json").exists());
    }
}
