use crate::state::AppState;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that reveals scheduled hints once their time has
/// come. A zero interval leaves `revealAt` as plain data.
pub fn spawn_hint_reveal_sweeper(state: Arc<AppState>, interval: Duration) {
    if interval.is_zero() {
        tracing::info!("Scheduled hint reveal disabled");
        return;
    }

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match state.reveal_due_hints(Utc::now()).await {
                Ok(flipped) if !flipped.is_empty() => {
                    tracing::debug!(count = flipped.len(), "Hint sweep revealed hints");
                }
                Ok(_) => {}
                // Keep sweeping; the next pass retries
                Err(e) => tracing::error!("Hint sweep failed: {}", e),
            }
        }
    });
}

/// Spawn a background task that forgets expired rate limit windows
pub fn spawn_rate_limit_cleanup(state: Arc<AppState>) {
    let Some(limiter) = state.abuse.rate_limiter.clone() else {
        return;
    };

    tokio::spawn(async move {
        let period = limiter.window() * 6;
        loop {
            tokio::time::sleep(period).await;
            limiter.cleanup().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::sample_case;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_sweeper_reveals_due_hints() {
        let mut case = sample_case("case_001");
        case.hints[0].reveal_at = Some(Utc::now() - ChronoDuration::seconds(1));
        case.hints[1].reveal_at = Some(Utc::now() + ChronoDuration::hours(1));
        let state = Arc::new(AppState::in_memory(vec![case]));

        spawn_hint_reveal_sweeper(state.clone(), Duration::from_millis(10));

        let mut revealed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let case = state.cases.get("case_001").await.unwrap().unwrap();
            if case.hint("h1").unwrap().revealed {
                assert!(!case.hint("h2").unwrap().revealed);
                revealed = true;
                break;
            }
        }
        assert!(revealed, "sweeper never revealed the due hint");
    }

    #[tokio::test]
    async fn test_zero_interval_disables_sweeper() {
        let mut case = sample_case("case_001");
        case.hints[0].reveal_at = Some(Utc::now() - ChronoDuration::seconds(1));
        let state = Arc::new(AppState::in_memory(vec![case]));

        spawn_hint_reveal_sweeper(state.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let case = state.cases.get("case_001").await.unwrap().unwrap();
        assert!(!case.hint("h1").unwrap().revealed);
    }
}
