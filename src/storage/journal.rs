//! JSONL journal of valued opportunities and scan documents

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use crate::{
    errors::{StoreError, StoreResult, ValuationError},
    types::{AnalysisRun, MultiExchangeDocument, MultiExchangeOpportunity, Opportunity, OpportunityRecord},
};

pub const OPPORTUNITIES_DIR: &str = "opportunities";

/// A journal line that could not be loaded. `line` is 1-based.
#[derive(Debug)]
pub struct RejectedLine {
    pub line: usize,
    pub error: StoreError,
}

#[derive(Debug)]
pub struct JournalLoad<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedLine>,
}

impl<T> JournalLoad<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Appends one JSON document per line to a file per day under
/// `<output_dir>/opportunities`.
#[derive(Debug, Clone)]
pub struct OpportunityJournal {
    dir: PathBuf,
}

impl OpportunityJournal {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: output_dir.as_ref().join(OPPORTUNITIES_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn opportunity_path(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("opportunities_{}.jsonl", day.format("%Y-%m-%d")))
    }

    pub fn scan_path(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("multi_exchange_{}.jsonl", day.format("%Y-%m-%d")))
    }

    pub fn analysis_path(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("analysis_{}.jsonl", day.format("%Y-%m-%d")))
    }

    pub fn save_opportunity(&self, opp: &Opportunity, now: DateTime<Utc>) -> StoreResult<()> {
        append_line(&self.opportunity_path(now), opp)?;

        info!(
            opportunity_id = %opp.id(),
            symbol = %opp.token_symbol(),
            net_return = %opp.net_return_percent(),
            confidence = %opp.confidence_score(),
            "Saved opportunity"
        );
        Ok(())
    }

    pub fn save_scan(&self, scan: &MultiExchangeOpportunity, now: DateTime<Utc>) -> StoreResult<()> {
        append_line(&self.scan_path(now), scan)?;

        info!(
            symbol = %scan.symbol(),
            opportunities = scan.total_opportunities(),
            priority = %scan.priority(),
            "Saved multi-exchange scan"
        );
        Ok(())
    }

    pub fn save_analysis(&self, run: &AnalysisRun) -> StoreResult<()> {
        append_line(&self.analysis_path(run.started_at), run)?;

        info!(
            analysis_id = %run.analysis_id,
            tokens = run.tokens_analyzed.len(),
            found = run.total_opportunities_found,
            errors = run.errors_encountered,
            duration_ms = run.duration_ms(),
            "Saved analysis run"
        );
        Ok(())
    }

    /// Reads a journal file back. A malformed line, or one whose derived
    /// values no longer match its inputs, is rejected on its own; only a file
    /// that cannot be read fails the whole load.
    pub fn load_opportunities(path: impl AsRef<Path>) -> StoreResult<JournalLoad<Opportunity>> {
        read_lines::<OpportunityRecord, _>(path.as_ref())
    }

    pub fn load_scans(path: impl AsRef<Path>) -> StoreResult<JournalLoad<MultiExchangeOpportunity>> {
        read_lines::<MultiExchangeDocument, _>(path.as_ref())
    }
}

fn append_line<T: Serialize>(path: &Path, record: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn read_lines<R, T>(path: &Path) -> StoreResult<JournalLoad<T>>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = ValuationError>,
{
    let file = fs::File::open(path)?;
    let mut load = JournalLoad {
        records: Vec::new(),
        rejected: Vec::new(),
    };

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<R>(&line)
            .map_err(StoreError::from)
            .and_then(|record| T::try_from(record).map_err(StoreError::from));
        match parsed {
            Ok(record) => load.records.push(record),
            Err(error) => {
                warn!(path = %path.display(), line = index + 1, error = %error, "Rejected journal line");
                load.rejected.push(RejectedLine { line: index + 1, error });
            }
        }
    }

    debug!(
        path = %path.display(),
        loaded = load.records.len(),
        rejected = load.rejected.len(),
        "Loaded journal"
    );
    Ok(load)
}
