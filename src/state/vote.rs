use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::types::*;

/// Outcome of a ballot submission
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Recorded(Ballot),
    /// Either half of the identity already voted on this case; nothing stored
    AlreadyVoted,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionResult {
    pub option: OptionKey,
    pub votes: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteResults {
    pub case_id: CaseId,
    pub total: u32,
    pub counts: BTreeMap<OptionKey, u32>,
    pub results: Vec<OptionResult>,
    /// Option with strictly the most votes
    pub leader: Option<OptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<OptionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_explanation: Option<String>,
}

/// Count ballots per option
pub fn tally_ballots(ballots: &[Ballot]) -> BTreeMap<OptionKey, u32> {
    let mut counts = BTreeMap::new();
    for ballot in ballots {
        *counts.entry(ballot.option.clone()).or_insert(0) += 1;
    }
    counts
}

/// Share of the total as a whole percentage, rounded half up
pub fn percentage(votes: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(votes) / f64::from(total) * 100.0).round() as u32
}

/// Build the result table for a case from its ballots.
///
/// Rows follow the case's option order, zero-vote options included. Ballots
/// for options the case no longer offers are listed after, by key.
pub fn compute_results(case: &Case, ballots: &[Ballot]) -> VoteResults {
    let counts = tally_ballots(ballots);
    let total = ballots.len() as u32;

    let mut order: Vec<&OptionKey> = case.options.iter().collect();
    let mut extra: Vec<&OptionKey> = counts
        .keys()
        .filter(|k| !case.options.contains(*k))
        .collect();
    extra.sort();
    order.extend(extra);

    let results: Vec<OptionResult> = order
        .into_iter()
        .map(|option| {
            let votes = counts.get(option).copied().unwrap_or(0);
            OptionResult {
                option: option.clone(),
                votes,
                percentage: percentage(votes, total),
            }
        })
        .collect();

    let top = results.iter().map(|r| r.votes).max().unwrap_or(0);
    let mut leaders = results.iter().filter(|r| r.votes == top && top > 0);
    let leader = match (leaders.next(), leaders.next()) {
        (Some(only), None) => Some(only.option.clone()),
        _ => None,
    };

    let closed = case.case_state == CaseState::Closed;
    VoteResults {
        case_id: case.id.clone(),
        total,
        counts,
        results,
        leader,
        correct_answer: closed.then(|| case.correct_answer.clone()),
        answer_explanation: closed.then(|| case.answer_explanation.clone()),
    }
}

impl AppState {
    /// Accept a ballot, enforcing one vote per identity per case.
    ///
    /// The duplicate check and the append happen under the case's write
    /// lock, so two concurrent submissions from one voter cannot both pass.
    pub async fn submit_vote(
        &self,
        case_id: &str,
        option: &str,
        identity: &VoterIdentity,
    ) -> AppResult<VoteOutcome> {
        let (case_id, option) = (case_id.trim(), option.trim());
        if case_id.is_empty() || option.is_empty() {
            return Err(AppError::InvalidInput(
                "Missing caseId or option".to_string(),
            ));
        }

        let case = self.find_public_case(Some(case_id)).await?;
        if !case.options.iter().any(|o| o == option) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not an option for case '{}'",
                option, case.id
            )));
        }

        let _guard = self.lock_case(&case.id).await;

        if self.votes.exists(&case.id, identity).await? {
            tracing::debug!(
                case = %case.id,
                address = %identity.address,
                "Duplicate vote rejected"
            );
            return Ok(VoteOutcome::AlreadyVoted);
        }

        let ballot = Ballot {
            id: ulid::Ulid::new().to_string(),
            case_id: case.id.clone(),
            option: option.to_string(),
            ip_address: identity.address.clone(),
            browser_token: identity.browser_token.clone(),
            created_at: Utc::now(),
        };
        self.votes.append(ballot.clone()).await?;

        tracing::info!(case = %case.id, option, ballot = %ballot.id, "Vote recorded");
        Ok(VoteOutcome::Recorded(ballot))
    }

    /// Vote counts per option for a case
    pub async fn tally(&self, case_id: &str) -> AppResult<BTreeMap<OptionKey, u32>> {
        let ballots = self.votes.all_for_case(case_id).await?;
        Ok(tally_ballots(&ballots))
    }

    /// Counts with percentages for a publicly visible case
    pub async fn results(&self, requested: Option<&str>) -> AppResult<VoteResults> {
        let case = self.find_public_case(requested).await?;
        let ballots = self.votes.all_for_case(&case.id).await?;
        Ok(compute_results(&case, &ballots))
    }
}
