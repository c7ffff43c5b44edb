//! Visitor-facing endpoints: case view, vote submission and results.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cookie::get_cookie;
use crate::error::{AppError, AppResult};
use crate::identity::{resolve_identity, ClientAddress, BROWSER_TOKEN_COOKIE, BROWSER_TOKEN_MAX_AGE};
use crate::state::machine::CaseView;
use crate::state::vote::{VoteOutcome, VoteResults};
use crate::state::AppState;
use crate::types::{Ballot, BallotId, CaseId, OptionKey};

pub const ALREADY_VOTED_MESSAGE: &str = "Your vote has already been recorded.";

#[derive(Debug, Deserialize)]
pub struct CaseQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub case_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub case_id: String,
    #[serde(default)]
    pub option: String,
}

/// What the voter gets back for a recorded ballot. Address and token stay
/// server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotReceipt {
    pub id: BallotId,
    pub case_id: CaseId,
    pub option: OptionKey,
    pub created_at: DateTime<Utc>,
}

impl From<Ballot> for BallotReceipt {
    fn from(ballot: Ballot) -> Self {
        Self {
            id: ballot.id,
            case_id: ballot.case_id,
            option: ballot.option,
            created_at: ballot.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballot: Option<BallotReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(outcome: VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Recorded(ballot) => Self {
                success: true,
                already_voted: false,
                ballot: Some(ballot.into()),
                message: None,
            },
            VoteOutcome::AlreadyVoted => Self {
                success: false,
                already_voted: true,
                ballot: None,
                message: Some(ALREADY_VOTED_MESSAGE.to_string()),
            },
        }
    }
}

/// GET /api/case?id=
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CaseQuery>,
) -> AppResult<Json<CaseView>> {
    let view = state.public_case_view(query.id.as_deref()).await?;
    Ok(Json(view))
}

/// POST /api/vote
///
/// Always (re)issues the browser token cookie once the ballot reaches the
/// duplicate check, so a voter keeps the same token across attempts.
pub async fn submit_vote(
    State(state): State<Arc<AppState>>,
    ClientAddress(address): ClientAddress,
    headers: HeaderMap,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body?;
    let (identity, minted) = resolve_identity(address, get_cookie(&headers, BROWSER_TOKEN_COOKIE));
    if minted {
        tracing::debug!(address = %identity.address, "Minted browser token");
    }

    let outcome = state
        .submit_vote(&request.case_id, &request.option, &identity)
        .await?;

    let mut response = Json(VoteResponse::from(outcome)).into_response();
    if let Some(cookie) =
        state
            .cookies
            .build(BROWSER_TOKEN_COOKIE, &identity.browser_token, BROWSER_TOKEN_MAX_AGE)
    {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

/// GET /api/vote/results?caseId=
pub async fn vote_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResultsQuery>,
) -> AppResult<Json<VoteResults>> {
    let case_id = query
        .case_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing caseId".to_string()))?;
    let results = state.results(Some(&case_id)).await?;
    Ok(Json(results))
}
