use super::AppState;
use crate::error::{AppError, AppResult};
use crate::types::*;

const CASE_ID_PREFIX: &str = "case_";

impl AppState {
    /// Turn a requested id into a stored case id.
    ///
    /// Missing ids fall back to the default case; short ids like `001` are
    /// accepted for `case_001`.
    pub async fn resolve_case_id(&self, requested: Option<&str>) -> AppResult<CaseId> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        let id = requested.unwrap_or(self.default_case_id.as_str());

        if !is_valid_case_id(id) {
            return Err(AppError::NotFound(format!("Case '{}'", id)));
        }
        if self.cases.get(id).await?.is_some() {
            return Ok(id.to_string());
        }
        if !id.starts_with(CASE_ID_PREFIX) {
            let prefixed = format!("{}{}", CASE_ID_PREFIX, id);
            if self.cases.get(&prefixed).await?.is_some() {
                return Ok(prefixed);
            }
        }
        Err(AppError::NotFound(format!("Case '{}'", id)))
    }

    /// Get a case for admin use, whatever its status
    pub async fn get_case(&self, requested: Option<&str>) -> AppResult<Case> {
        let id = self.resolve_case_id(requested).await?;
        self.cases
            .get(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case '{}'", id)))
    }

    /// Get a case for visitors. Draft cases do not exist publicly.
    pub async fn find_public_case(&self, requested: Option<&str>) -> AppResult<Case> {
        let case = self.get_case(requested).await?;
        if case.status == CaseStatus::Draft {
            tracing::debug!("Public request for draft case {}", case.id);
            return Err(AppError::NotFound(format!("Case '{}'", case.id)));
        }
        Ok(case)
    }

    /// Apply `change` to a stored case under its write lock, validate the
    /// result and persist it.
    pub(crate) async fn modify_case<F>(&self, case_id: &str, change: F) -> AppResult<Case>
    where
        F: FnOnce(&mut Case) -> AppResult<()>,
    {
        let _guard = self.lock_case(case_id).await;

        let mut case = self
            .cases
            .get(case_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Case '{}'", case_id)))?;
        let before_state = case.case_state;

        change(&mut case)?;
        case.validate().map_err(AppError::InvalidInput)?;

        self.cases.put(case.clone()).await?;

        if case.case_state != before_state {
            tracing::info!(
                "Case {} state {:?} -> {:?}",
                case.id,
                before_state,
                case.case_state
            );
        }
        Ok(case)
    }

    /// Shallow-merge a partial update into a case
    pub async fn update_case(&self, requested: Option<&str>, update: CaseUpdate) -> AppResult<Case> {
        let id = self.resolve_case_id(requested).await?;
        let case = self
            .modify_case(&id, |case| {
                update.apply(case);
                Ok(())
            })
            .await?;
        tracing::info!("Case {} updated", case.id);
        Ok(case)
    }
}
