use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for readability
pub type CaseId = String;
pub type HintId = String;
pub type BallotId = String;
pub type OptionKey = String;

/// Stage of the narrative. Declaration order is the unlock order.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum CaseState {
    #[default]
    Intro,
    Overview,
    Evidence,
    Suspects,
    Voting,
    Closed,
}

/// Publication flag, independent of the narrative stage
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Draft,
    #[default]
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CaseMetadata {
    pub location: String,
    pub time_window: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub id: HintId,
    pub index: u32,
    pub content: String,
    #[serde(default)]
    pub revealed: bool,
    #[serde(default)]
    pub reveal_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Case {
    pub id: CaseId,
    pub title: String,
    pub overview: String,
    #[serde(rename = "caseState", default)]
    pub case_state: CaseState,
    #[serde(default)]
    pub status: CaseStatus,
    pub metadata: CaseMetadata,
    pub suspects: BTreeMap<String, String>,
    pub hints: Vec<Hint>,
    pub vote_question: String,
    pub options: Vec<OptionKey>,
    pub correct_answer: OptionKey,
    pub answer_explanation: String,
}

impl Case {
    /// Check the content invariants of a case.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_case_id(&self.id) {
            return Err(format!("Invalid case id '{}'", self.id));
        }
        if !self.options.contains(&self.correct_answer) {
            return Err(format!(
                "Correct answer '{}' is not one of the options {:?}",
                self.correct_answer, self.options
            ));
        }
        for (i, hint) in self.hints.iter().enumerate() {
            if self.hints[..i].iter().any(|h| h.id == hint.id) {
                return Err(format!("Duplicate hint id '{}'", hint.id));
            }
        }
        Ok(())
    }

    pub fn hint(&self, hint_id: &str) -> Option<&Hint> {
        self.hints.iter().find(|h| h.id == hint_id)
    }
}

/// Case ids double as file names in the flat-file store, so keep them tame.
pub fn is_valid_case_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A recorded vote. Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub id: BallotId,
    pub case_id: CaseId,
    pub option: OptionKey,
    pub ip_address: String,
    pub browser_token: String,
    pub created_at: DateTime<Utc>,
}

impl Ballot {
    /// Whether this ballot was cast by either half of the given identity
    pub fn matches(&self, identity: &VoterIdentity) -> bool {
        self.ip_address == identity.address || self.browser_token == identity.browser_token
    }
}

/// Dedup key for a voter: network address plus opaque browser token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoterIdentity {
    pub address: String,
    pub browser_token: String,
}

/// Partial case used by admin updates. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseUpdate {
    pub id: Option<CaseId>,
    pub title: Option<String>,
    pub overview: Option<String>,
    #[serde(rename = "caseState")]
    pub case_state: Option<CaseState>,
    pub status: Option<CaseStatus>,
    pub metadata: Option<CaseMetadata>,
    pub suspects: Option<BTreeMap<String, String>>,
    pub hints: Option<Vec<Hint>>,
    pub vote_question: Option<String>,
    pub options: Option<Vec<OptionKey>>,
    pub correct_answer: Option<OptionKey>,
    pub answer_explanation: Option<String>,
}

impl CaseUpdate {
    /// Shallow merge into an existing case. The id is never changed.
    pub fn apply(self, case: &mut Case) {
        if let Some(title) = self.title {
            case.title = title;
        }
        if let Some(overview) = self.overview {
            case.overview = overview;
        }
        if let Some(state) = self.case_state {
            case.case_state = state;
        }
        if let Some(status) = self.status {
            case.status = status;
        }
        if let Some(metadata) = self.metadata {
            case.metadata = metadata;
        }
        if let Some(suspects) = self.suspects {
            case.suspects = suspects;
        }
        if let Some(hints) = self.hints {
            case.hints = hints;
        }
        if let Some(question) = self.vote_question {
            case.vote_question = question;
        }
        if let Some(options) = self.options {
            case.options = options;
        }
        if let Some(answer) = self.correct_answer {
            case.correct_answer = answer;
        }
        if let Some(explanation) = self.answer_explanation {
            case.answer_explanation = explanation;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_case;
    use super::*;

    #[test]
    fn test_case_state_ordering() {
        assert!(CaseState::Intro < CaseState::Overview);
        assert!(CaseState::Overview < CaseState::Evidence);
        assert!(CaseState::Evidence < CaseState::Suspects);
        assert!(CaseState::Suspects < CaseState::Voting);
        assert!(CaseState::Voting < CaseState::Closed);
    }

    #[test]
    fn test_case_json_field_names() {
        let json = serde_json::to_value(sample_case("case_001")).unwrap();
        assert_eq!(json["caseState"], "intro");
        assert_eq!(json["status"], "active");
        assert_eq!(json["metadata"]["time_window"], "23:30 - 06:00");
        assert_eq!(json["hints"][0]["revealAt"], serde_json::Value::Null);
        assert_eq!(json["correct_answer"], "B");
    }

    #[test]
    fn test_seed_defaults_for_state_and_status() {
        let json = r#"{
            "id": "case_009",
            "title": "t",
            "overview": "o",
            "metadata": {"location": "l", "time_window": "w"},
            "suspects": {"A": "a"},
            "hints": [{"id": "h1", "index": 0, "content": "c"}],
            "vote_question": "q",
            "options": ["A"],
            "correct_answer": "A",
            "answer_explanation": "e"
        }"#;
        let case: Case = serde_json::from_str(json).unwrap();
        assert_eq!(case.case_state, CaseState::Intro);
        assert_eq!(case.status, CaseStatus::Active);
        assert!(!case.hints[0].revealed);
        assert!(case.hints[0].reveal_at.is_none());
    }

    #[test]
    fn test_validate_rejects_answer_outside_options() {
        let mut case = sample_case("case_001");
        assert!(case.validate().is_ok());

        case.correct_answer = "Z".to_string();
        let err = case.validate().unwrap_err();
        assert!(err.contains("not one of the options"));
    }

    #[test]
    fn test_validate_rejects_duplicate_hint_ids() {
        let mut case = sample_case("case_001");
        case.hints[2].id = "h1".to_string();
        assert!(case.validate().unwrap_err().contains("Duplicate hint id"));
    }

    #[test]
    fn test_case_id_charset() {
        assert!(is_valid_case_id("case_001"));
        assert!(is_valid_case_id("A001"));
        assert!(is_valid_case_id("night-ferry"));
        assert!(!is_valid_case_id(""));
        assert!(!is_valid_case_id("../etc/passwd"));
        assert!(!is_valid_case_id("case 001"));
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let mut case = sample_case("case_001");
        let update = CaseUpdate {
            id: Some("other".to_string()),
            title: Some("Renamed".to_string()),
            case_state: Some(CaseState::Evidence),
            ..Default::default()
        };
        update.apply(&mut case);

        assert_eq!(case.id, "case_001");
        assert_eq!(case.title, "Renamed");
        assert_eq!(case.case_state, CaseState::Evidence);
        assert_eq!(case.overview, sample_case("case_001").overview);
        assert_eq!(case.hints.len(), 3);
    }

    #[test]
    fn test_ballot_matches_either_half() {
        let ballot = Ballot {
            id: "b1".to_string(),
            case_id: "case_001".to_string(),
            option: "A".to_string(),
            ip_address: "1.2.3.4".to_string(),
            browser_token: "tok".to_string(),
            created_at: Utc::now(),
        };
        let same_ip = VoterIdentity {
            address: "1.2.3.4".to_string(),
            browser_token: "other".to_string(),
        };
        let same_token = VoterIdentity {
            address: "5.6.7.8".to_string(),
            browser_token: "tok".to_string(),
        };
        let stranger = VoterIdentity {
            address: "5.6.7.8".to_string(),
            browser_token: "other".to_string(),
        };
        assert!(ballot.matches(&same_ip));
        assert!(ballot.matches(&same_token));
        assert!(!ballot.matches(&stranger));
    }
}
