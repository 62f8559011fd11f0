//! Directional opportunity between two exchanges

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use super::{ExchangePairKey, MarketObservation};
use crate::{
    errors::{ValuationError, ValuationResult},
    valuation::{CostModel, Ranked},
    validation::{validate_confidence, validate_price, validate_volume},
};

/// A pair opportunity always has two legs: buy and sell.
pub const PAIR_LEGS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairLeg {
    pub exchange: String,
    pub price: Decimal,
    #[serde(default)]
    pub volume_24h: Decimal,
}

impl PairLeg {
    pub fn new(exchange: impl Into<String>, price: Decimal, volume_24h: Decimal) -> Self {
        Self { exchange: exchange.into(), price, volume_24h }
    }
}

impl From<&MarketObservation> for PairLeg {
    fn from(observation: &MarketObservation) -> Self {
        Self::new(observation.exchange.trim(), observation.price, observation.volume_24h)
    }
}

/// Buy on `buy.exchange`, sell on `sell.exchange`. The pair is immutable, so
/// gross and net returns are derived once from the prices and costs when it
/// is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PairOpportunityRecord", into = "PairOpportunityRecord")]
pub struct PairOpportunity {
    buy: PairLeg,
    sell: PairLeg,
    confidence_score: Decimal,
    observed_at: DateTime<Utc>,
    costs: CostModel,
    gross_return_percent: Decimal,
    net_return_percent: Decimal,
}

impl PairOpportunity {
    pub fn new(
        buy: PairLeg,
        sell: PairLeg,
        confidence_score: Decimal,
        observed_at: DateTime<Utc>,
        costs: CostModel,
    ) -> ValuationResult<Self> {
        if buy.exchange == sell.exchange {
            return Err(ValuationError::InsufficientExchanges {
                symbol: ExchangePairKey::new(buy.exchange.clone(), sell.exchange.clone()).to_string(),
                found: 1,
            });
        }
        validate_price(buy.price, &buy.exchange)?;
        validate_price(sell.price, &sell.exchange)?;
        validate_volume(buy.volume_24h, &buy.exchange)?;
        validate_volume(sell.volume_24h, &sell.exchange)?;
        validate_confidence(confidence_score)?;

        let gross_return_percent = gross_return_percent(buy.price, sell.price)?;
        let net_return_percent = costs.net_return_percent(gross_return_percent, PAIR_LEGS)?;

        Ok(Self {
            buy,
            sell,
            confidence_score,
            observed_at,
            costs,
            gross_return_percent,
            net_return_percent,
        })
    }

    pub fn key(&self) -> ExchangePairKey {
        ExchangePairKey::new(self.buy.exchange.clone(), self.sell.exchange.clone())
    }

    pub fn buy(&self) -> &PairLeg {
        &self.buy
    }

    pub fn sell(&self) -> &PairLeg {
        &self.sell
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    pub fn price_difference(&self) -> Decimal {
        // Both prices are positive, so the difference cannot overflow.
        (self.sell.price - self.buy.price).abs()
    }

    pub fn gross_return_percent(&self) -> Decimal {
        self.gross_return_percent
    }

    pub fn net_return_percent(&self) -> Decimal {
        self.net_return_percent
    }

    pub fn confidence_score(&self) -> Decimal {
        self.confidence_score
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

impl Ranked for PairOpportunity {
    fn net_return_percent(&self) -> Decimal {
        PairOpportunity::net_return_percent(self)
    }

    fn confidence_score(&self) -> Decimal {
        self.confidence_score
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    fn ranking_label(&self) -> (&str, &str) {
        (&self.buy.exchange, &self.sell.exchange)
    }
}

/// Persisted form. Derived returns are written for readers and checked on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairOpportunityRecord {
    pub date: DateTime<Utc>,
    pub exchange_from: String,
    pub exchange_to: String,
    pub price_from: Decimal,
    pub price_to: Decimal,
    #[serde(default)]
    pub volume_from: Decimal,
    #[serde(default)]
    pub volume_to: Decimal,
    pub confidence_score: Decimal,
    pub costs: CostModel,
    #[serde(default)]
    pub return_percent: Option<Decimal>,
    #[serde(default)]
    pub price_difference: Option<Decimal>,
    #[serde(default)]
    pub net_return_percent: Option<Decimal>,
}

impl From<PairOpportunity> for PairOpportunityRecord {
    fn from(opp: PairOpportunity) -> Self {
        Self {
            return_percent: Some(opp.gross_return_percent()),
            price_difference: Some(opp.price_difference()),
            net_return_percent: Some(opp.net_return_percent()),
            date: opp.observed_at,
            exchange_from: opp.buy.exchange,
            exchange_to: opp.sell.exchange,
            price_from: opp.buy.price,
            price_to: opp.sell.price,
            volume_from: opp.buy.volume_24h,
            volume_to: opp.sell.volume_24h,
            confidence_score: opp.confidence_score,
            costs: opp.costs,
        }
    }
}

impl TryFrom<PairOpportunityRecord> for PairOpportunity {
    type Error = ValuationError;

    fn try_from(record: PairOpportunityRecord) -> Result<Self, Self::Error> {
        let opp = PairOpportunity::new(
            PairLeg::new(record.exchange_from, record.price_from, record.volume_from),
            PairLeg::new(record.exchange_to, record.price_to, record.volume_to),
            record.confidence_score,
            record.date,
            record.costs,
        )?;

        check_stored("return_percent", record.return_percent, opp.gross_return_percent())?;
        check_stored("net_return_percent", record.net_return_percent, opp.net_return_percent())?;
        Ok(opp)
    }
}

/// (sell - buy) / buy * 100, rejecting spreads a `Decimal` cannot hold.
fn gross_return_percent(buy_price: Decimal, sell_price: Decimal) -> ValuationResult<Decimal> {
    sell_price
        .checked_sub(buy_price)
        .and_then(|spread| spread.checked_div(buy_price))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .ok_or(ValuationError::OutOfRange { operation: "(sell - buy) / buy" })
}

pub(crate) fn check_stored(field: &str, stored: Option<Decimal>, recomputed: Decimal) -> ValuationResult<()> {
    match stored {
        Some(value) if value != recomputed => Err(ValuationError::StaleDerivedValue {
            field: field.to_string(),
            details: format!("stored {} but inputs give {}", value, recomputed),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::types::FeeApplication;

    fn costs() -> CostModel {
        CostModel::new(dec!(5000), dec!(35), dec!(0.6), FeeApplication::Combined).unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn returns_are_derived_from_prices_and_costs() {
        let opp = PairOpportunity::new(
            PairLeg::new("binance", dec!(100), dec!(1_000_000)),
            PairLeg::new("uniswap", dec!(108), dec!(250_000)),
            dec!(0.8),
            at(),
            costs(),
        )
        .unwrap();

        assert_eq!(opp.gross_return_percent(), dec!(8));
        assert_eq!(opp.price_difference(), dec!(8));
        assert_eq!(opp.net_return_percent(), dec!(6.7));
        assert_eq!(opp.key(), ExchangePairKey::new("uniswap", "binance"));
    }

    #[test]
    fn same_exchange_on_both_legs_is_rejected() {
        let err = PairOpportunity::new(
            PairLeg::new("binance", dec!(100), dec!(0)),
            PairLeg::new("binance", dec!(101), dec!(0)),
            dec!(0.5),
            at(),
            costs(),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::InsufficientExchanges { found: 1, .. }));
    }

    #[test]
    fn invalid_legs_are_rejected() {
        let bad_price = PairOpportunity::new(
            PairLeg::new("binance", dec!(0), dec!(0)),
            PairLeg::new("kraken", dec!(101), dec!(0)),
            dec!(0.5),
            at(),
            costs(),
        );
        assert!(matches!(bad_price, Err(ValuationError::InvalidPrice { .. })));

        let bad_confidence = PairOpportunity::new(
            PairLeg::new("binance", dec!(100), dec!(0)),
            PairLeg::new("kraken", dec!(101), dec!(0)),
            dec!(1.5),
            at(),
            costs(),
        );
        assert!(matches!(bad_confidence, Err(ValuationError::InvalidConfidence { .. })));
    }

    #[test]
    fn extreme_price_spread_is_out_of_range() {
        let err = PairOpportunity::new(
            PairLeg::new("binance", Decimal::new(1, 28), dec!(0)),
            PairLeg::new("kraken", Decimal::MAX, dec!(0)),
            dec!(0.5),
            at(),
            costs(),
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::OutOfRange { .. }));
    }

    #[test]
    fn stored_net_return_that_disagrees_is_stale() {
        let opp = PairOpportunity::new(
            PairLeg::new("binance", dec!(100), dec!(0)),
            PairLeg::new("kraken", dec!(108), dec!(0)),
            dec!(0.5),
            at(),
            costs(),
        )
        .unwrap();

        let mut value = serde_json::to_value(&opp).unwrap();
        assert_eq!(serde_json::from_value::<PairOpportunity>(value.clone()).unwrap(), opp);

        value["net_return_percent"] = serde_json::json!("9.9");
        let err = serde_json::from_value::<PairOpportunity>(value).unwrap_err();
        assert!(err.to_string().contains("Stale derived value"));
    }
}
