//! History of analysis runs

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use crate::{
    errors::{StoreError, StoreResult},
    types::AnalysisRun,
};

pub const MAX_HISTORY_DAYS: i64 = 365;
pub const MAX_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct AnalysisHistory {
    runs: Arc<RwLock<Vec<AnalysisRun>>>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, run: AnalysisRun) {
        debug!(
            analysis_id = %run.analysis_id,
            tokens = run.tokens_analyzed.len(),
            found = run.total_opportunities_found,
            "Stored analysis run"
        );
        self.runs.write().await.push(run);
    }

    /// Runs started within the last `days` (clamped to 1..=365), newest first.
    pub async fn history(&self, now: DateTime<Utc>, days: i64, limit: usize) -> StoreResult<Vec<AnalysisRun>> {
        if limit < 1 || limit > MAX_HISTORY_LIMIT {
            return Err(StoreError::InvalidLimit {
                limit,
                max: MAX_HISTORY_LIMIT,
            });
        }
        let since = TimeDelta::try_days(days.clamp(1, MAX_HISTORY_DAYS))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut recent: Vec<AnalysisRun> = self
            .runs
            .read()
            .await
            .iter()
            .filter(|run| run.started_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        recent.truncate(limit);
        Ok(recent)
    }

    pub async fn latest(&self) -> Option<AnalysisRun> {
        self.runs.read().await.iter().max_by_key(|run| run.started_at).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }
}
