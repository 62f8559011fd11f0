//! Symbol scan: raw observations to a ranked multi-exchange opportunity

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use super::{CostModel, RejectedRecord};
use crate::{
    config::ValuationConfig,
    errors::{ValuationError, ValuationResult},
    types::{MarketObservation, MultiExchangeOpportunity, PairLeg, PairOpportunity},
    validation::{distinct_exchanges, validate_confidence, validate_price, validate_volume},
};

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub opportunity: MultiExchangeOpportunity,
    pub rejected: Vec<RejectedRecord>,
}

/// Observations are paired per timestamp. For each pair of exchanges quoting
/// at the same time, the cheap-to-dear direction is kept when its gross spread
/// reaches `min_gross_spread_percent`. If one exchange quotes twice at the same
/// timestamp, the later entry in `observations` wins.
///
/// A pair that cannot be valued is rejected under the index of its later
/// observation; the rest of the scan goes on.
pub fn scan_symbol(
    symbol: &str,
    name: &str,
    observations: &[MarketObservation],
    costs: &CostModel,
    config: &ValuationConfig,
    now: DateTime<Utc>,
) -> ValuationResult<ScanOutcome> {
    let symbol = symbol.trim().to_uppercase();
    let mut rejected = Vec::new();
    let mut accepted: Vec<(usize, &MarketObservation)> = Vec::with_capacity(observations.len());

    for (index, observation) in observations.iter().enumerate() {
        match check_observation(&symbol, observation) {
            Ok(()) => accepted.push((index, observation)),
            Err(error) => {
                warn!(
                    symbol = %symbol,
                    exchange = %observation.exchange,
                    index,
                    error = %error,
                    "Rejected market observation"
                );
                rejected.push(RejectedRecord { index, error });
            }
        }
    }

    let exchanges = distinct_exchanges(&symbol, accepted.iter().map(|(_, o)| o.exchange.as_str()))?;

    let mut snapshots: BTreeMap<DateTime<Utc>, BTreeMap<&str, (usize, &MarketObservation)>> = BTreeMap::new();
    for &(index, observation) in &accepted {
        snapshots
            .entry(observation.observed_at)
            .or_default()
            .insert(observation.exchange.trim(), (index, observation));
    }

    let mut pairs = Vec::new();
    for snapshot in snapshots.values() {
        let quotes: Vec<(usize, &MarketObservation)> = snapshot.values().copied().collect();
        for (i, &(a_index, a)) in quotes.iter().enumerate() {
            for &(b_index, b) in &quotes[i + 1..] {
                match directional_opportunity(a, b, costs, config) {
                    Ok(Some(pair)) => pairs.push(pair),
                    Ok(None) => {}
                    Err(error) => {
                        let index = a_index.max(b_index);
                        warn!(
                            symbol = %symbol,
                            pair = %format!("{}/{}", a.exchange.trim(), b.exchange.trim()),
                            index,
                            error = %error,
                            "Rejected exchange pair"
                        );
                        rejected.push(RejectedRecord { index, error });
                    }
                }
            }
        }
    }

    debug!(
        symbol = %symbol,
        exchanges = exchanges.len(),
        snapshots = snapshots.len(),
        opportunities = pairs.len(),
        "Scanned market observations"
    );

    let opportunity = MultiExchangeOpportunity::from_pairs(&symbol, name, &exchanges, pairs, now, config)?;
    Ok(ScanOutcome { opportunity, rejected })
}

fn check_observation(symbol: &str, observation: &MarketObservation) -> ValuationResult<()> {
    if !observation.symbol.trim().eq_ignore_ascii_case(symbol) {
        return Err(ValuationError::SymbolMismatch {
            expected: symbol.to_string(),
            found: observation.symbol.clone(),
        });
    }
    if observation.exchange.trim().is_empty() {
        return Err(ValuationError::MissingExchange { symbol: symbol.to_string() });
    }
    validate_price(observation.price, &observation.exchange)?;
    validate_volume(observation.volume_24h, &observation.exchange)?;
    if let Some(confidence) = observation.confidence {
        validate_confidence(confidence)?;
    }
    Ok(())
}

fn directional_opportunity(
    a: &MarketObservation,
    b: &MarketObservation,
    costs: &CostModel,
    config: &ValuationConfig,
) -> ValuationResult<Option<PairOpportunity>> {
    let (buy, sell) = match a.price.cmp(&b.price) {
        Ordering::Less => (a, b),
        Ordering::Greater => (b, a),
        Ordering::Equal => return Ok(None),
    };

    let confidence = buy
        .confidence
        .unwrap_or(config.default_confidence_score)
        .min(sell.confidence.unwrap_or(config.default_confidence_score));

    let opportunity = PairOpportunity::new(
        PairLeg::from(buy),
        PairLeg::from(sell),
        confidence,
        buy.observed_at,
        costs.clone(),
    )?;

    if opportunity.gross_return_percent() < config.min_gross_spread_percent {
        return Ok(None);
    }
    Ok(Some(opportunity))
}
