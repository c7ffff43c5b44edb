mod case;
pub mod hint;
pub mod machine;
pub mod vote;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::abuse::AbuseConfig;
use crate::auth::AuthConfig;
use crate::cookie::CookieConfig;
use crate::identity::IdentityConfig;
use crate::store::{CaseStore, MemoryCaseStore, MemoryVoteStore, VoteStore};
use crate::types::*;

/// Shared application state, owned by the process entry point and handed to
/// every handler
#[derive(Clone)]
pub struct AppState {
    pub cases: Arc<dyn CaseStore>,
    pub votes: Arc<dyn VoteStore>,
    /// One write lock per case; serializes read-modify-write sequences
    case_locks: Arc<Mutex<HashMap<CaseId, Arc<Mutex<()>>>>>,
    /// Case served when a request does not name one
    pub default_case_id: CaseId,
    pub auth: AuthConfig,
    pub cookies: CookieConfig,
    pub identity: IdentityConfig,
    pub abuse: AbuseConfig,
}

impl AppState {
    pub fn new(cases: Arc<dyn CaseStore>, votes: Arc<dyn VoteStore>) -> Self {
        Self {
            cases,
            votes,
            case_locks: Arc::new(Mutex::new(HashMap::new())),
            default_case_id: "case_001".to_string(),
            auth: AuthConfig::default(),
            cookies: CookieConfig::default(),
            identity: IdentityConfig::default(),
            abuse: AbuseConfig::default(),
        }
    }

    /// State backed by in-memory stores holding the given cases
    pub fn in_memory(cases: impl IntoIterator<Item = Case>) -> Self {
        Self::new(
            Arc::new(MemoryCaseStore::with_cases(cases)),
            Arc::new(MemoryVoteStore::new()),
        )
    }

    pub fn with_default_case(mut self, case_id: impl Into<CaseId>) -> Self {
        self.default_case_id = case_id.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_cookies(mut self, cookies: CookieConfig) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_abuse(mut self, abuse: AbuseConfig) -> Self {
        self.abuse = abuse;
        self
    }

    /// Acquire the write lock for a case. Hold it across any
    /// read-check-write sequence touching that case or its ballots.
    pub async fn lock_case(&self, case_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.case_locks.lock().await;
            locks
                .entry(case_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
