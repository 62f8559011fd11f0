//! Analytics report files under `<output_dir>/reports`

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use super::{
    exchange_pair_analytics, overview, summarize, token_performance, AnalyticsOverview,
    ExchangePairPerformance, OpportunitySummary, TokenPerformance,
};
use crate::{
    errors::StoreResult,
    storage::ExchangeHealthSummary,
    types::{AnalysisRun, MultiExchangeOpportunity, Opportunity},
};

pub const REPORTS_DIR: &str = "reports";
const REPORT_WINDOW_DAYS: i64 = 30;

/// Point-in-time snapshot of everything the service reports on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub summary: OpportunitySummary,
    pub overview: AnalyticsOverview,
    pub top_tokens: Vec<TokenPerformance>,
    pub top_exchange_pairs: Vec<ExchangePairPerformance>,
    pub exchange_health: ExchangeHealthSummary,
    pub recent_analyses: Vec<AnalysisRun>,
}

impl AnalyticsReport {
    pub fn build(
        opportunities: &[Opportunity],
        documents: &[MultiExchangeOpportunity],
        exchange_health: ExchangeHealthSummary,
        recent_analyses: Vec<AnalysisRun>,
        success_threshold: rust_decimal::Decimal,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            generated_at: now,
            summary: summarize(opportunities, now),
            overview: overview(opportunities, now, REPORT_WINDOW_DAYS),
            top_tokens: token_performance(opportunities, limit),
            top_exchange_pairs: exchange_pair_analytics(documents, success_threshold, limit),
            exchange_health,
            recent_analyses,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: output_dir.as_ref().join(REPORTS_DIR),
        }
    }

    pub fn report_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("analytics_{}.json", at.format("%Y%m%d_%H%M%S")))
    }

    /// Writes the report to a file named after its generation time.
    pub fn write(&self, report: &AnalyticsReport) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.report_path(report.generated_at);
        fs::write(&path, report.to_json()?)?;

        info!(
            path = %path.display(),
            opportunities = report.summary.total_opportunities,
            analyses = report.recent_analyses.len(),
            "Wrote analytics report"
        );
        Ok(path)
    }
}
