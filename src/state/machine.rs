//! Case stage progression and what visitors may see at each stage.
//!
//! Admins may set any stage at any time; nothing here enforces forward
//! movement. Visibility is recomputed from the current stage on every read.

use serde::Serialize;
use std::collections::BTreeMap;

use super::vote::VoteResults;
use super::AppState;
use crate::error::AppResult;
use crate::types::*;

/// Placeholder shown while a case is still in the intro stage
pub const PREPARING_NOTICE: &str = "The case is being prepared.";

/// Parts of a case that unlock as the stages progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Overview,
    Evidence,
    Suspects,
    /// Vote question and options
    Ballot,
    /// Correct answer, explanation and final tally
    Verdict,
}

impl CaseState {
    pub const ALL: [CaseState; 6] = [
        CaseState::Intro,
        CaseState::Overview,
        CaseState::Evidence,
        CaseState::Suspects,
        CaseState::Voting,
        CaseState::Closed,
    ];

    /// Whether a section is visible in this stage. Each section unlocks at
    /// its stage and stays visible in every later one.
    pub fn shows(self, section: Section) -> bool {
        let unlocked_at = match section {
            Section::Overview => CaseState::Overview,
            Section::Evidence => CaseState::Evidence,
            Section::Suspects => CaseState::Suspects,
            Section::Ballot => CaseState::Voting,
            Section::Verdict => CaseState::Closed,
        };
        self >= unlocked_at
    }

    /// Ballots are only offered while the case is in the voting stage
    pub fn voting_open(self) -> bool {
        self == CaseState::Voting
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HintView {
    pub id: HintId,
    pub index: u32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvidenceView {
    /// Revealed hints in display order
    pub hints: Vec<HintView>,
    pub revealed: usize,
    pub total: usize,
    /// e.g. "1 of 3 pieces revealed"
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BallotView {
    pub question: String,
    pub options: Vec<OptionKey>,
    pub open: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub correct_answer: OptionKey,
    pub answer_explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<VoteResults>,
}

/// What a visitor may see of a case right now
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseView {
    pub id: CaseId,
    pub title: String,
    pub case_state: CaseState,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CaseMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidenceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspects: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballot: Option<BallotView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

fn evidence_view(hints: &[Hint]) -> EvidenceView {
    let mut revealed: Vec<&Hint> = hints.iter().filter(|h| h.revealed).collect();
    revealed.sort_by_key(|h| h.index);

    let count = revealed.len();
    EvidenceView {
        hints: revealed
            .into_iter()
            .map(|h| HintView {
                id: h.id.clone(),
                index: h.index,
                content: h.content.clone(),
            })
            .collect(),
        revealed: count,
        total: hints.len(),
        summary: format!("{} of {} pieces revealed", count, hints.len()),
    }
}

/// Project a case onto the sections its current stage unlocks
pub fn case_view(case: &Case) -> CaseView {
    let state = case.case_state;

    CaseView {
        id: case.id.clone(),
        title: case.title.clone(),
        case_state: state,
        status: case.status,
        notice: (state == CaseState::Intro).then(|| PREPARING_NOTICE.to_string()),
        overview: state
            .shows(Section::Overview)
            .then(|| case.overview.clone()),
        metadata: state
            .shows(Section::Overview)
            .then(|| case.metadata.clone()),
        evidence: state
            .shows(Section::Evidence)
            .then(|| evidence_view(&case.hints)),
        suspects: state
            .shows(Section::Suspects)
            .then(|| case.suspects.clone()),
        ballot: state.shows(Section::Ballot).then(|| BallotView {
            question: case.vote_question.clone(),
            options: case.options.clone(),
            open: state.voting_open(),
        }),
        verdict: state.shows(Section::Verdict).then(|| Verdict {
            correct_answer: case.correct_answer.clone(),
            answer_explanation: case.answer_explanation.clone(),
            results: None,
        }),
    }
}

impl AppState {
    /// Overwrite the stage of a case. Any stage may follow any other.
    pub async fn set_case_state(&self, case_id: &str, new_state: CaseState) -> AppResult<Case> {
        self.modify_case(case_id, |case| {
            case.case_state = new_state;
            Ok(())
        })
        .await
    }

    /// Overwrite the publication status of a case
    pub async fn set_case_status(&self, case_id: &str, status: CaseStatus) -> AppResult<Case> {
        let case = self
            .modify_case(case_id, |case| {
                case.status = status;
                Ok(())
            })
            .await?;
        tracing::info!("Case {} status set to {:?}", case.id, status);
        Ok(case)
    }

    /// Public view of a case, with the final tally once it is closed
    pub async fn public_case_view(&self, requested: Option<&str>) -> AppResult<CaseView> {
        let case = self.find_public_case(requested).await?;
        let mut view = case_view(&case);

        if let Some(verdict) = view.verdict.as_mut() {
            let ballots = self.votes.all_for_case(&case.id).await?;
            verdict.results = Some(super::vote::compute_results(&case, &ballots));
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::types::fixtures::sample_case;

    fn case_in(state: CaseState) -> Case {
        let mut case = sample_case("case_001");
        case.case_state = state;
        case
    }

    #[test]
    fn test_sections_unlock_monotonically() {
        use Section::*;
        for section in [Overview, Evidence, Suspects, Ballot, Verdict] {
            let mut seen = false;
            for state in CaseState::ALL {
                let shown = state.shows(section);
                // Once visible, visible in every later stage
                assert!(!seen || shown, "{:?} hidden again in {:?}", section, state);
                seen |= shown;
            }
            assert!(seen);
        }
    }

    #[test]
    fn test_evidence_visible_from_evidence_stage() {
        assert!(!CaseState::Overview.shows(Section::Evidence));
        for state in [
            CaseState::Evidence,
            CaseState::Suspects,
            CaseState::Voting,
            CaseState::Closed,
        ] {
            assert!(state.shows(Section::Evidence));
        }
    }

    #[test]
    fn test_voting_open_only_in_voting() {
        for state in CaseState::ALL {
            assert_eq!(state.voting_open(), state == CaseState::Voting);
        }
    }

    #[test]
    fn test_intro_view_shows_only_title() {
        let view = case_view(&case_in(CaseState::Intro));
        assert_eq!(view.title, "The Lighthouse Keeper");
        assert_eq!(view.notice.as_deref(), Some(PREPARING_NOTICE));
        assert!(view.overview.is_none());
        assert!(view.metadata.is_none());
        assert!(view.evidence.is_none());
        assert!(view.suspects.is_none());
        assert!(view.ballot.is_none());
        assert!(view.verdict.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("overview").is_none());
        assert_eq!(json["caseState"], "intro");
    }

    #[test]
    fn test_overview_view() {
        let view = case_view(&case_in(CaseState::Overview));
        assert!(view.notice.is_none());
        assert!(view.overview.unwrap().contains("lamp went dark"));
        assert_eq!(view.metadata.unwrap().location, "Gull Rock");
        assert!(view.evidence.is_none());
    }

    #[test]
    fn test_evidence_view_shows_revealed_hints_only() {
        let mut case = case_in(CaseState::Evidence);
        case.hints[1].revealed = true;

        let evidence = case_view(&case).evidence.unwrap();
        assert_eq!(evidence.hints.len(), 1);
        assert_eq!(evidence.hints[0].id, "h2");
        assert_eq!(evidence.revealed, 1);
        assert_eq!(evidence.total, 3);
        assert_eq!(evidence.summary, "1 of 3 pieces revealed");
    }

    #[test]
    fn test_evidence_ordered_by_index_not_reveal_order() {
        let mut case = case_in(CaseState::Suspects);
        case.hints.reverse();
        for hint in &mut case.hints {
            hint.revealed = true;
        }

        let ids: Vec<_> = case_view(&case)
            .evidence
            .unwrap()
            .hints
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec!["h1", "h2", "h3"]);
    }

    #[test]
    fn test_voting_and_closed_views() {
        let voting = case_view(&case_in(CaseState::Voting));
        assert!(voting.suspects.is_some());
        assert!(voting.evidence.is_some());
        let ballot = voting.ballot.unwrap();
        assert!(ballot.open);
        assert_eq!(ballot.options, vec!["A", "B", "C"]);
        assert!(voting.verdict.is_none());

        let closed = case_view(&case_in(CaseState::Closed));
        assert!(!closed.ballot.unwrap().open);
        assert_eq!(closed.verdict.unwrap().correct_answer, "B");
    }

    #[tokio::test]
    async fn test_set_case_state_is_idempotent() {
        let state = AppState::in_memory(vec![sample_case("case_001")]);

        let first = state
            .set_case_state("case_001", CaseState::Evidence)
            .await
            .unwrap();
        let second = state
            .set_case_state("case_001", CaseState::Evidence)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(
            state.cases.get("case_001").await.unwrap().unwrap(),
            second
        );
    }

    #[tokio::test]
    async fn test_set_case_state_allows_any_jump() {
        let state = AppState::in_memory(vec![sample_case("case_001")]);

        let case = state
            .set_case_state("case_001", CaseState::Closed)
            .await
            .unwrap();
        assert_eq!(case.case_state, CaseState::Closed);

        let case = state
            .set_case_state("case_001", CaseState::Intro)
            .await
            .unwrap();
        assert_eq!(case.case_state, CaseState::Intro);
    }

    #[tokio::test]
    async fn test_set_case_state_unknown_case() {
        let state = AppState::in_memory(Vec::new());
        let err = state
            .set_case_state("case_001", CaseState::Voting)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_draft_status_hides_public_view() {
        let state = AppState::in_memory(vec![sample_case("case_001")]);
        state
            .set_case_status("case_001", CaseStatus::Draft)
            .await
            .unwrap();
        assert!(matches!(
            state.public_case_view(None).await.unwrap_err(),
            AppError::NotFound(_)
        ));

        state
            .set_case_status("case_001", CaseStatus::Active)
            .await
            .unwrap();
        assert!(state.public_case_view(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_view_includes_tally() {
        let state = AppState::in_memory(vec![case_in(CaseState::Closed)]);
        let view = state.public_case_view(Some("001")).await.unwrap();
        let results = view.verdict.unwrap().results.unwrap();
        assert_eq!(results.total, 0);
        assert_eq!(results.results.len(), 3);
    }
}
