use chrono::{DateTime, Utc};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::types::*;

/// An admin action on a single hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintAction {
    /// Reveal now, stamping `reveal_at` (or the current time)
    Reveal { reveal_at: Option<DateTime<Utc>> },
    /// Hide again and clear the timestamp
    Hide,
    /// Set the reveal time without touching visibility
    Schedule { reveal_at: DateTime<Utc> },
}

impl HintAction {
    /// Parse the wire form (`reveal` / `hide` / `schedule`)
    pub fn parse(action: &str, reveal_at: Option<DateTime<Utc>>) -> AppResult<Self> {
        match action.trim() {
            "reveal" => Ok(HintAction::Reveal { reveal_at }),
            "hide" => Ok(HintAction::Hide),
            "schedule" => reveal_at
                .map(|reveal_at| HintAction::Schedule { reveal_at })
                .ok_or_else(|| AppError::InvalidInput("schedule requires revealAt".to_string())),
            other => Err(AppError::InvalidInput(format!(
                "Unknown hint action '{}'",
                other
            ))),
        }
    }

    fn apply(self, hint: &Hint, now: DateTime<Utc>) -> Hint {
        match self {
            HintAction::Reveal { reveal_at } => Hint {
                revealed: true,
                reveal_at: Some(reveal_at.unwrap_or(now)),
                ..hint.clone()
            },
            HintAction::Hide => Hint {
                revealed: false,
                reveal_at: None,
                ..hint.clone()
            },
            HintAction::Schedule { reveal_at } => Hint {
                reveal_at: Some(reveal_at),
                ..hint.clone()
            },
        }
    }
}

impl AppState {
    /// Apply an action to exactly one hint of one case. The hint list is
    /// rebuilt with every other hint carried over unchanged.
    pub async fn apply_hint_action(
        &self,
        case_id: &str,
        hint_id: &str,
        action: HintAction,
    ) -> AppResult<Case> {
        let now = Utc::now();
        let case = self
            .modify_case(case_id, |case| {
                if case.hint(hint_id).is_none() {
                    return Err(AppError::NotFound(format!(
                        "Hint '{}' in case '{}'",
                        hint_id, case_id
                    )));
                }
                case.hints = case
                    .hints
                    .iter()
                    .map(|h| {
                        if h.id == hint_id {
                            action.apply(h, now)
                        } else {
                            h.clone()
                        }
                    })
                    .collect();
                Ok(())
            })
            .await?;

        tracing::info!("Hint {} of case {}: {:?}", hint_id, case_id, action);
        Ok(case)
    }

    pub async fn reveal_hint(
        &self,
        case_id: &str,
        hint_id: &str,
        reveal_at: Option<DateTime<Utc>>,
    ) -> AppResult<Case> {
        self.apply_hint_action(case_id, hint_id, HintAction::Reveal { reveal_at })
            .await
    }

    pub async fn hide_hint(&self, case_id: &str, hint_id: &str) -> AppResult<Case> {
        self.apply_hint_action(case_id, hint_id, HintAction::Hide)
            .await
    }

    pub async fn schedule_hint(
        &self,
        case_id: &str,
        hint_id: &str,
        reveal_at: DateTime<Utc>,
    ) -> AppResult<Case> {
        self.apply_hint_action(case_id, hint_id, HintAction::Schedule { reveal_at })
            .await
    }

    /// Reveal every hidden hint whose scheduled time has passed.
    /// Returns the (case id, hint id) pairs that were flipped.
    pub async fn reveal_due_hints(&self, now: DateTime<Utc>) -> AppResult<Vec<(CaseId, HintId)>> {
        let mut flipped = Vec::new();

        for case_id in self.cases.ids().await? {
            // Cheap unlocked check first; most cases have nothing due
            let Some(case) = self.cases.get(&case_id).await? else {
                continue;
            };
            if !case.hints.iter().any(|h| is_due(h, now)) {
                continue;
            }

            let mut due = Vec::new();
            self.modify_case(&case_id, |case| {
                for hint in case.hints.iter_mut().filter(|h| is_due(h, now)) {
                    hint.revealed = true;
                    due.push(hint.id.clone());
                }
                Ok(())
            })
            .await?;

            for hint_id in due {
                tracing::info!("Scheduled reveal of hint {} in case {}", hint_id, case_id);
                flipped.push((case_id.clone(), hint_id));
            }
        }

        Ok(flipped)
    }
}

fn is_due(hint: &Hint, now: DateTime<Utc>) -> bool {
    !hint.revealed && hint.reveal_at.is_some_and(|at| at <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_case;
    use chrono::Duration;

    fn state() -> AppState {
        AppState::in_memory(vec![sample_case("case_001")])
    }

    #[test]
    fn test_parse_actions() {
        let at = Utc::now();
        assert_eq!(
            HintAction::parse("reveal", None).unwrap(),
            HintAction::Reveal { reveal_at: None }
        );
        assert_eq!(HintAction::parse("hide", Some(at)).unwrap(), HintAction::Hide);
        assert_eq!(
            HintAction::parse("schedule", Some(at)).unwrap(),
            HintAction::Schedule { reveal_at: at }
        );
        assert!(matches!(
            HintAction::parse("schedule", None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            HintAction::parse("burn", None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_reveal_sets_flag_and_timestamp() {
        let state = state();
        let before = Utc::now();
        let case = state.reveal_hint("case_001", "h2", None).await.unwrap();

        let hint = case.hint("h2").unwrap();
        assert!(hint.revealed);
        assert!(hint.reveal_at.unwrap() >= before);

        // Other hints untouched
        assert_eq!(case.hints[0], sample_case("case_001").hints[0]);
        assert_eq!(case.hints[2], sample_case("case_001").hints[2]);
    }

    #[tokio::test]
    async fn test_reveal_with_explicit_time() {
        let state = state();
        let at = Utc::now() - Duration::hours(1);
        let case = state.reveal_hint("case_001", "h1", Some(at)).await.unwrap();
        assert_eq!(case.hint("h1").unwrap().reveal_at, Some(at));
    }

    #[tokio::test]
    async fn test_reveal_then_hide_restores_hint() {
        let state = state();
        let original = sample_case("case_001").hints[0].clone();

        for _ in 0..2 {
            state.reveal_hint("case_001", "h1", None).await.unwrap();
            let case = state.hide_hint("case_001", "h1").await.unwrap();
            let hint = case.hint("h1").unwrap();
            assert!(!hint.revealed);
            assert!(hint.reveal_at.is_none());
            assert_eq!(*hint, original);
        }

        // Hiding twice is the same as hiding once
        let once = state.hide_hint("case_001", "h1").await.unwrap();
        let twice = state.hide_hint("case_001", "h1").await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_schedule_keeps_visibility() {
        let state = state();
        let at = Utc::now() + Duration::minutes(10);

        let case = state.schedule_hint("case_001", "h3", at).await.unwrap();
        let hint = case.hint("h3").unwrap();
        assert!(!hint.revealed);
        assert_eq!(hint.reveal_at, Some(at));

        state.reveal_hint("case_001", "h1", None).await.unwrap();
        let case = state.schedule_hint("case_001", "h1", at).await.unwrap();
        assert!(case.hint("h1").unwrap().revealed);
    }

    #[tokio::test]
    async fn test_unknown_hint_or_case() {
        let state = state();
        assert!(matches!(
            state.hide_hint("case_001", "h9").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            state.hide_hint("case_404", "h1").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_reveal_due_hints() {
        let mut second = sample_case("case_002");
        second.hints[0].reveal_at = Some(Utc::now() - Duration::seconds(1));
        let state = AppState::in_memory(vec![sample_case("case_001"), second]);

        let now = Utc::now();
        state
            .schedule_hint("case_001", "h1", now - Duration::minutes(1))
            .await
            .unwrap();
        state
            .schedule_hint("case_001", "h2", now + Duration::minutes(5))
            .await
            .unwrap();

        let mut flipped = state.reveal_due_hints(now).await.unwrap();
        flipped.sort();
        assert_eq!(
            flipped,
            vec![
                ("case_001".to_string(), "h1".to_string()),
                ("case_002".to_string(), "h1".to_string()),
            ]
        );

        let case = state.cases.get("case_001").await.unwrap().unwrap();
        assert!(case.hint("h1").unwrap().revealed);
        assert!(!case.hint("h2").unwrap().revealed);

        // Nothing left to do on a second sweep
        assert!(state.reveal_due_hints(now).await.unwrap().is_empty());

        // Later sweep picks up the future one
        let later = now + Duration::minutes(10);
        assert_eq!(state.reveal_due_hints(later).await.unwrap().len(), 1);
    }
}
