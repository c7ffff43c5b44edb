use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CaseStore, VoteStore};
use crate::error::StoreResult;
use crate::types::*;

/// Case store that keeps everything in a map; mutations are lost on restart
#[derive(Default)]
pub struct MemoryCaseStore {
    cases: RwLock<HashMap<CaseId, Case>>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cases(cases: impl IntoIterator<Item = Case>) -> Self {
        Self {
            cases: RwLock::new(cases.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Case>> {
        Ok(self.cases.read().await.get(id).cloned())
    }

    async fn put(&self, case: Case) -> StoreResult<()> {
        self.cases.write().await.insert(case.id.clone(), case);
        Ok(())
    }

    async fn ids(&self) -> StoreResult<Vec<CaseId>> {
        let mut ids: Vec<_> = self.cases.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Ballot list held in memory
#[derive(Default)]
pub struct MemoryVoteStore {
    ballots: RwLock<Vec<Ballot>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn append(&self, ballot: Ballot) -> StoreResult<()> {
        self.ballots.write().await.push(ballot);
        Ok(())
    }

    async fn all_for_case(&self, case_id: &str) -> StoreResult<Vec<Ballot>> {
        Ok(self
            .ballots
            .read()
            .await
            .iter()
            .filter(|b| b.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn exists(&self, case_id: &str, identity: &VoterIdentity) -> StoreResult<bool> {
        Ok(self
            .ballots
            .read()
            .await
            .iter()
            .any(|b| b.case_id == case_id && b.matches(identity)))
    }
}
