//! Priority classification and scan scheduling hints

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use crate::{config::ValuationConfig, types::Priority};

/// high: best >= minimum * multiplier and confidence >= high_min_confidence
/// medium: best >= minimum
/// low: anything else, including no opportunity at all
pub fn classify_priority(
    best_overall_return: Option<Decimal>,
    confidence_score: Decimal,
    config: &ValuationConfig,
) -> Priority {
    let Some(best) = best_overall_return else {
        return Priority::Low;
    };

    let minimum = config.minimum_return_percent;
    // A bar too large for a Decimal is one no return can reach.
    let reaches_high_bar = minimum
        .checked_mul(config.priority.high_return_multiplier)
        .is_some_and(|high_bar| best >= high_bar);

    if reaches_high_bar && confidence_score >= config.priority.high_min_confidence {
        Priority::High
    } else if best >= minimum {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanHint {
    pub priority: Priority,
    pub scan_frequency_secs: u64,
    pub next_scan_at: DateTime<Utc>,
}

pub fn scan_hint(priority: Priority, analysed_at: DateTime<Utc>, config: &ValuationConfig) -> ScanHint {
    let scan_frequency_secs = config.schedule.frequency_secs(priority);
    ScanHint {
        priority,
        scan_frequency_secs,
        next_scan_at: next_scan_after(analysed_at, scan_frequency_secs),
    }
}

/// A frequency that runs past the last representable time schedules the next
/// scan at `DateTime::<Utc>::MAX_UTC`, which is never due.
pub fn next_scan_after(analysed_at: DateTime<Utc>, scan_frequency_secs: u64) -> DateTime<Utc> {
    i64::try_from(scan_frequency_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|offset| analysed_at.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
