//! Batch valuation: one bad record never aborts the rest

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use crate::{
    config::ValuationConfig,
    errors::ValuationError,
    types::{MultiExchangeOpportunity, Opportunity, OpportunityClass, OpportunityDraft},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    #[serde(serialize_with = "serialize_error")]
    pub error: ValuationError,
}

fn serialize_error<S: serde::Serializer>(error: &ValuationError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

pub fn value_batch(
    drafts: Vec<OpportunityDraft>,
    config: &ValuationConfig,
    now: DateTime<Utc>,
) -> BatchOutcome<Opportunity> {
    let mut outcome = BatchOutcome::default();

    for (index, draft) in drafts.into_iter().enumerate() {
        let symbol = draft.token_symbol.clone();
        match Opportunity::create(draft, config, now) {
            Ok(opportunity) => outcome.accepted.push(opportunity),
            Err(error) => {
                warn!(index, symbol = %symbol, error = %error, "Rejected opportunity record");
                outcome.rejected.push(RejectedRecord { index, error });
            }
        }
    }

    debug!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "Valued opportunity batch"
    );
    outcome
}

/// Turns every per-pair best that clears `minimum_return_percent` into a
/// standalone opportunity record.
pub fn promote_best_pairs(
    scan: &MultiExchangeOpportunity,
    config: &ValuationConfig,
    now: DateTime<Utc>,
) -> BatchOutcome<Opportunity> {
    let drafts: Vec<OpportunityDraft> = scan
        .best_spreads_per_pair()
        .iter()
        .filter(|(_, best)| best.net_return_percent() >= config.minimum_return_percent)
        .map(|(key, best)| {
            let mut draft = OpportunityDraft::new(
                scan.symbol(),
                vec![best.buy().exchange.clone(), best.sell().exchange.clone()],
                best.gross_return_percent(),
                best.costs().capital_required_usd(),
            );
            draft.opportunity_class = OpportunityClass::CrossExchange;
            draft.token_name = Some(scan.name().to_string());
            draft.gas_cost_usd = Some(best.costs().gas_cost_usd());
            draft.trading_fees_percent = Some(best.costs().trading_fees_percent());
            draft.confidence_score = Some(best.confidence_score());
            draft.data_timestamp = Some(best.observed_at());
            draft.notes = format!(
                "Buy on {} at {}, sell on {} at {}",
                best.buy().exchange,
                best.buy().price,
                best.sell().exchange,
                best.sell().price
            );
            draft.tags = vec![key.to_string()];
            draft
        })
        .collect();

    value_batch(drafts, config, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use crate::{
        types::{FeeApplication, PairLeg, PairOpportunity},
        valuation::CostModel,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn draft(symbol: &str, capital: rust_decimal::Decimal) -> OpportunityDraft {
        OpportunityDraft::new(symbol, vec!["binance".into(), "kraken".into()], dec!(8), capital)
    }

    #[test]
    fn bad_records_are_reported_and_the_rest_survive() {
        let config = ValuationConfig::default();
        let drafts = vec![
            draft("ETH", dec!(5000)),
            draft("BTC", dec!(0)),
            draft("SOL", dec!(2500)),
        ];

        let outcome = value_batch(drafts, &config, now());

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.accepted[1].token_symbol(), "SOL");
        assert_eq!(
            outcome.rejected,
            vec![RejectedRecord {
                index: 1,
                error: ValuationError::InvalidCapital { capital_usd: dec!(0) },
            }]
        );
        assert!(!outcome.is_clean());
    }

    #[test]
    fn only_pairs_clearing_the_minimum_are_promoted() {
        let config = ValuationConfig::default();
        let costs = CostModel::new(dec!(5000), dec!(35), dec!(0.6), FeeApplication::Combined).unwrap();
        let pair = |buy: &str, sell: &str, sell_price| {
            PairOpportunity::new(
                PairLeg::new(buy, dec!(100), dec!(0)),
                PairLeg::new(sell, sell_price, dec!(0)),
                dec!(0.8),
                now(),
                costs.clone(),
            )
            .unwrap()
        };
        let scan = MultiExchangeOpportunity::from_pairs(
            "ETH",
            "Ethereum",
            &["binance".to_string(), "kraken".to_string(), "uniswap".to_string()],
            vec![pair("binance", "uniswap", dec!(108)), pair("binance", "kraken", dec!(103))],
            now(),
            &config,
        )
        .unwrap();

        let outcome = promote_best_pairs(&scan, &config, now());

        assert!(outcome.is_clean());
        assert_eq!(outcome.accepted.len(), 1);
        let promoted = &outcome.accepted[0];
        assert_eq!(promoted.token_symbol(), "ETH");
        assert_eq!(promoted.source_exchanges(), &["binance".to_string(), "uniswap".to_string()]);
        assert_eq!(promoted.net_return_percent(), dec!(6.7));
        assert_eq!(promoted.confidence_score(), dec!(0.8));
        assert_eq!(promoted.tags(), &["binance/uniswap".to_string()]);
    }
}
