//! Ranking and best-pair selection
//!
//! Order: net return, then confidence, then observation time (latest wins),
//! then the smaller ranking label so the order is total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;

pub trait Ranked {
    fn net_return_percent(&self) -> Decimal;
    fn confidence_score(&self) -> Decimal;
    fn observed_at(&self) -> DateTime<Utc>;
    /// Final tie-break only; the smaller label ranks higher.
    fn ranking_label(&self) -> (&str, &str);
}

/// `Ordering::Greater` when `a` ranks above `b`.
pub fn compare<T: Ranked + ?Sized>(a: &T, b: &T) -> Ordering {
    a.net_return_percent()
        .cmp(&b.net_return_percent())
        .then_with(|| a.confidence_score().cmp(&b.confidence_score()))
        .then_with(|| a.observed_at().cmp(&b.observed_at()))
        .then_with(|| b.ranking_label().cmp(&a.ranking_label()))
}

pub fn select_best<'a, T, I>(items: I) -> Option<&'a T>
where
    T: Ranked + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items.into_iter().max_by(|a, b| compare(*a, *b))
}

/// Best first.
pub fn rank_descending<'a, T, I>(items: I) -> Vec<&'a T>
where
    T: Ranked + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut ranked: Vec<&T> = items.into_iter().collect();
    ranked.sort_by(|a, b| compare(*b, *a));
    ranked
}
