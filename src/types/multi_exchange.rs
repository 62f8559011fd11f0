//! Multi-exchange opportunity aggregate for one token

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::{pair::check_stored, ExchangePairKey, PairOpportunity, Priority};
use crate::{
    config::ValuationConfig,
    errors::{ValuationError, ValuationResult},
    valuation::{classify_priority, next_scan_after, scan_hint, select_best},
    validation::distinct_exchanges,
};

/// Every directional opportunity found for a token, grouped by exchange pair.
///
/// `best_spreads_per_pair` is a cache over `exchange_pair_opportunities`. Both
/// are private and every `&mut self` method rebuilds the cache before
/// returning, so the two are never observed out of sync.
///
/// `priority` and `scan_frequency_secs` are scheduling hints derived under
/// the config in force when the token was analysed. A reloaded document keeps
/// them as stored; `reschedule` re-derives them under the current config.
/// `next_scan_at` always equals `analysis_timestamp + scan_frequency_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MultiExchangeDocument", into = "MultiExchangeDocument")]
pub struct MultiExchangeOpportunity {
    id: String,
    symbol: String,
    name: String,
    supported_exchanges: Vec<String>,
    exchange_pair_opportunities: BTreeMap<ExchangePairKey, Vec<PairOpportunity>>,
    best_spreads_per_pair: BTreeMap<ExchangePairKey, PairOpportunity>,
    priority: Priority,
    scan_frequency_secs: u64,
    analysis_timestamp: DateTime<Utc>,
    next_scan_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MultiExchangeOpportunity {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        supported_exchanges: &[String],
        analysed_at: DateTime<Utc>,
        config: &ValuationConfig,
    ) -> ValuationResult<Self> {
        Self::from_pairs(symbol, name, supported_exchanges, Vec::new(), analysed_at, config)
    }

    pub fn from_pairs(
        symbol: impl Into<String>,
        name: impl Into<String>,
        supported_exchanges: &[String],
        pairs: Vec<PairOpportunity>,
        analysed_at: DateTime<Utc>,
        config: &ValuationConfig,
    ) -> ValuationResult<Self> {
        let symbol = symbol.into().trim().to_uppercase();
        let supported_exchanges = distinct_exchanges(&symbol, supported_exchanges)?;
        let hint = scan_hint(Priority::Low, analysed_at, config);

        let mut opportunity = Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            name: name.into(),
            supported_exchanges,
            exchange_pair_opportunities: BTreeMap::new(),
            best_spreads_per_pair: BTreeMap::new(),
            priority: hint.priority,
            scan_frequency_secs: hint.scan_frequency_secs,
            analysis_timestamp: analysed_at,
            next_scan_at: hint.next_scan_at,
            created_at: analysed_at,
            updated_at: analysed_at,
        };

        for pair in pairs {
            opportunity.insert_pair(pair);
        }
        opportunity.rebuild_best();
        opportunity.refresh_schedule(config);
        Ok(opportunity)
    }

    /// Appends a directional opportunity; best-per-pair, priority and schedule
    /// hints reflect it when this returns.
    pub fn push_opportunity(&mut self, opportunity: PairOpportunity, config: &ValuationConfig, now: DateTime<Utc>) {
        self.insert_pair(opportunity);
        self.rebuild_best();
        self.refresh_schedule(config);
        self.updated_at = now;
    }

    pub fn remove_pair(
        &mut self,
        key: &ExchangePairKey,
        config: &ValuationConfig,
        now: DateTime<Utc>,
    ) -> Option<Vec<PairOpportunity>> {
        let removed = self.exchange_pair_opportunities.remove(key);
        self.rebuild_best();
        self.refresh_schedule(config);
        self.updated_at = now;
        removed
    }

    fn insert_pair(&mut self, opportunity: PairOpportunity) {
        for exchange in [&opportunity.buy().exchange, &opportunity.sell().exchange] {
            if !self.supported_exchanges.contains(exchange) {
                self.supported_exchanges.push(exchange.clone());
            }
        }
        self.exchange_pair_opportunities
            .entry(opportunity.key())
            .or_default()
            .push(opportunity);
    }

    fn rebuild_best(&mut self) {
        self.best_spreads_per_pair = compute_best(&self.exchange_pair_opportunities);
    }

    /// Re-derives priority and schedule under `config`, keeping the
    /// analysis time.
    pub fn reschedule(&mut self, config: &ValuationConfig) {
        self.refresh_schedule(config);
    }

    fn refresh_schedule(&mut self, config: &ValuationConfig) {
        let (best_return, confidence) = match self.best_overall() {
            Some((_, best)) => (Some(best.net_return_percent()), best.confidence_score()),
            None => (None, Decimal::ZERO),
        };
        let priority = classify_priority(best_return, confidence, config);
        let hint = scan_hint(priority, self.analysis_timestamp, config);
        self.priority = hint.priority;
        self.scan_frequency_secs = hint.scan_frequency_secs;
        self.next_scan_at = hint.next_scan_at;
    }

    /// Checks the cached best-per-pair map against the opportunity lists.
    pub fn verify(&self) -> ValuationResult<()> {
        let expected = compute_best(&self.exchange_pair_opportunities);
        if expected == self.best_spreads_per_pair {
            return Ok(());
        }

        let key = expected
            .keys()
            .chain(self.best_spreads_per_pair.keys())
            .find(|k| expected.get(*k) != self.best_spreads_per_pair.get(*k))
            .map(|k| k.to_string())
            .unwrap_or_default();

        Err(ValuationError::StaleDerivedValue {
            field: "best_spreads_per_pair".to_string(),
            details: format!("{}: entry for pair {} does not match its opportunity list", self.symbol, key),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supported_exchanges(&self) -> &[String] {
        &self.supported_exchanges
    }

    pub fn exchange_pair_opportunities(&self) -> &BTreeMap<ExchangePairKey, Vec<PairOpportunity>> {
        &self.exchange_pair_opportunities
    }

    pub fn best_spreads_per_pair(&self) -> &BTreeMap<ExchangePairKey, PairOpportunity> {
        &self.best_spreads_per_pair
    }

    pub fn best_for_pair(&self, key: &ExchangePairKey) -> Option<&PairOpportunity> {
        self.best_spreads_per_pair.get(key)
    }

    pub fn total_opportunities(&self) -> usize {
        self.exchange_pair_opportunities.values().map(Vec::len).sum()
    }

    pub fn best_overall(&self) -> Option<(&ExchangePairKey, &PairOpportunity)> {
        let best = select_best(self.best_spreads_per_pair.values())?;
        self.best_spreads_per_pair.get_key_value(&best.key())
    }

    pub fn best_overall_return(&self) -> Option<Decimal> {
        self.best_overall().map(|(_, best)| best.net_return_percent())
    }

    pub fn most_profitable_pair(&self) -> Option<&ExchangePairKey> {
        self.best_overall().map(|(key, _)| key)
    }

    pub fn last_opportunity_date(&self) -> Option<DateTime<Utc>> {
        self.exchange_pair_opportunities
            .values()
            .flatten()
            .map(PairOpportunity::observed_at)
            .max()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn scan_frequency_secs(&self) -> u64 {
        self.scan_frequency_secs
    }

    pub fn analysis_timestamp(&self) -> DateTime<Utc> {
        self.analysis_timestamp
    }

    pub fn next_scan_at(&self) -> DateTime<Utc> {
        self.next_scan_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_scan_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Carries identity over from the document this scan supersedes.
    pub fn supersede(mut self, previous: &MultiExchangeOpportunity) -> Self {
        self.id = previous.id.clone();
        self.created_at = previous.created_at;
        self
    }
}

fn compute_best(
    pairs: &BTreeMap<ExchangePairKey, Vec<PairOpportunity>>,
) -> BTreeMap<ExchangePairKey, PairOpportunity> {
    pairs
        .iter()
        .filter_map(|(key, list)| select_best(list).map(|best| (key.clone(), best.clone())))
        .collect()
}

/// Persisted form with the derived fields materialized for readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiExchangeDocument {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub supported_exchanges: Vec<String>,
    pub exchange_pair_opportunities: BTreeMap<ExchangePairKey, Vec<PairOpportunity>>,
    pub best_spreads_per_pair: BTreeMap<ExchangePairKey, PairOpportunity>,
    #[serde(default)]
    pub total_opportunities: Option<usize>,
    #[serde(default)]
    pub best_overall_return: Option<Decimal>,
    #[serde(default)]
    pub most_profitable_pair: Option<ExchangePairKey>,
    #[serde(default)]
    pub last_opportunity_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub scan_frequency_secs: u64,
    pub analysis_timestamp: DateTime<Utc>,
    pub next_scan_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MultiExchangeOpportunity> for MultiExchangeDocument {
    fn from(opp: MultiExchangeOpportunity) -> Self {
        Self {
            total_opportunities: Some(opp.total_opportunities()),
            best_overall_return: opp.best_overall_return(),
            most_profitable_pair: opp.most_profitable_pair().cloned(),
            last_opportunity_date: opp.last_opportunity_date(),
            id: opp.id,
            symbol: opp.symbol,
            name: opp.name,
            supported_exchanges: opp.supported_exchanges,
            exchange_pair_opportunities: opp.exchange_pair_opportunities,
            best_spreads_per_pair: opp.best_spreads_per_pair,
            priority: opp.priority,
            scan_frequency_secs: opp.scan_frequency_secs,
            analysis_timestamp: opp.analysis_timestamp,
            next_scan_at: opp.next_scan_at,
            created_at: opp.created_at,
            updated_at: opp.updated_at,
        }
    }
}

impl TryFrom<MultiExchangeDocument> for MultiExchangeOpportunity {
    type Error = ValuationError;

    fn try_from(doc: MultiExchangeDocument) -> Result<Self, Self::Error> {
        let supported_exchanges = distinct_exchanges(&doc.symbol, &doc.supported_exchanges)?;

        for (key, list) in &doc.exchange_pair_opportunities {
            if let Some(misplaced) = list.iter().find(|opp| &opp.key() != key) {
                return Err(ValuationError::StaleDerivedValue {
                    field: "exchange_pair_opportunities".to_string(),
                    details: format!("{} opportunity filed under {}", misplaced.key(), key),
                });
            }
        }

        let opp = MultiExchangeOpportunity {
            id: doc.id,
            symbol: doc.symbol,
            name: doc.name,
            supported_exchanges,
            exchange_pair_opportunities: doc.exchange_pair_opportunities,
            best_spreads_per_pair: doc.best_spreads_per_pair,
            priority: doc.priority,
            scan_frequency_secs: doc.scan_frequency_secs,
            analysis_timestamp: doc.analysis_timestamp,
            next_scan_at: doc.next_scan_at,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        };

        opp.verify()?;
        if let Some(total) = doc.total_opportunities {
            if total != opp.total_opportunities() {
                return Err(ValuationError::StaleDerivedValue {
                    field: "total_opportunities".to_string(),
                    details: format!("stored {} but lists hold {}", total, opp.total_opportunities()),
                });
            }
        }
        if let Some(recomputed) = opp.best_overall_return() {
            check_stored("best_overall_return", doc.best_overall_return, recomputed)?;
        }
        let expected_next = next_scan_after(opp.analysis_timestamp, opp.scan_frequency_secs);
        if opp.next_scan_at != expected_next {
            return Err(ValuationError::StaleDerivedValue {
                field: "next_scan_at".to_string(),
                details: format!(
                    "{}: stored {} but analysis at {} every {}s gives {}",
                    opp.symbol, opp.next_scan_at, opp.analysis_timestamp, opp.scan_frequency_secs, expected_next
                ),
            });
        }
        Ok(opp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use crate::{
        types::{FeeApplication, PairLeg},
        valuation::CostModel,
    };

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn pair(buy: &str, sell: &str, buy_price: Decimal, sell_price: Decimal, confidence: Decimal, hour: u32) -> PairOpportunity {
        PairOpportunity::new(
            PairLeg::new(buy, buy_price, dec!(0)),
            PairLeg::new(sell, sell_price, dec!(0)),
            confidence,
            at(hour),
            CostModel::new(dec!(5000), dec!(35), dec!(0.6), FeeApplication::Combined).unwrap(),
        )
        .unwrap()
    }

    fn exchanges() -> Vec<String> {
        vec!["binance".into(), "kraken".into(), "uniswap".into()]
    }

    #[test]
    fn requires_two_distinct_exchanges() {
        let config = ValuationConfig::default();
        let err = MultiExchangeOpportunity::new("ETH", "Ethereum", &["binance".to_string()], at(0), &config)
            .unwrap_err();
        assert_eq!(err, ValuationError::InsufficientExchanges { symbol: "ETH".into(), found: 1 });
    }

    #[test]
    fn empty_aggregate_is_low_priority() {
        let config = ValuationConfig::default();
        let opp = MultiExchangeOpportunity::new("ETH", "Ethereum", &exchanges(), at(0), &config).unwrap();
        assert_eq!(opp.total_opportunities(), 0);
        assert_eq!(opp.best_overall_return(), None);
        assert_eq!(opp.priority(), Priority::Low);
        assert_eq!(opp.next_scan_at(), at(4));
    }

    #[test]
    fn best_per_pair_tracks_each_list() {
        let config = ValuationConfig::default();
        let opp = MultiExchangeOpportunity::from_pairs(
            "ETH",
            "Ethereum",
            &exchanges(),
            vec![
                pair("binance", "uniswap", dec!(100), dec!(105), dec!(0.9), 1),
                pair("uniswap", "binance", dec!(100), dec!(108), dec!(0.9), 2),
                pair("binance", "kraken", dec!(100), dec!(103), dec!(0.9), 1),
            ],
            at(3),
            &config,
        )
        .unwrap();

        let key = ExchangePairKey::new("binance", "uniswap");
        assert_eq!(opp.exchange_pair_opportunities()[&key].len(), 2);
        assert_eq!(opp.best_for_pair(&key).unwrap().net_return_percent(), dec!(6.7));
        assert_eq!(opp.total_opportunities(), 3);
        assert_eq!(opp.best_overall_return(), Some(dec!(6.7)));
        assert_eq!(opp.most_profitable_pair(), Some(&key));
        assert_eq!(opp.last_opportunity_date(), Some(at(2)));
        assert_eq!(opp.priority(), Priority::Medium);
        assert_eq!(opp.scan_frequency_secs(), 3_600);
        assert!(opp.verify().is_ok());
    }

    #[test]
    fn appended_better_opportunity_is_visible_on_next_read() {
        let config = ValuationConfig::default();
        let mut opp = MultiExchangeOpportunity::from_pairs(
            "ETH",
            "Ethereum",
            &exchanges(),
            vec![pair("binance", "kraken", dec!(100), dec!(103), dec!(0.9), 1)],
            at(3),
            &config,
        )
        .unwrap();
        let key = ExchangePairKey::new("binance", "kraken");
        assert_eq!(opp.priority(), Priority::Low);

        opp.push_opportunity(pair("kraken", "binance", dec!(100), dec!(114), dec!(0.9), 2), &config, at(3));

        assert_eq!(opp.best_for_pair(&key).unwrap().net_return_percent(), dec!(12.7));
        assert_eq!(opp.best_overall_return(), Some(dec!(12.7)));
        assert_eq!(opp.priority(), Priority::High);
        assert_eq!(opp.next_scan_at(), at(3) + Duration::seconds(900));
        assert!(opp.verify().is_ok());
    }

    #[test]
    fn pushing_a_new_exchange_extends_supported_set() {
        let config = ValuationConfig::default();
        let mut opp = MultiExchangeOpportunity::new("ETH", "Ethereum", &exchanges(), at(0), &config).unwrap();
        opp.push_opportunity(pair("coinbase", "kraken", dec!(100), dec!(102), dec!(0.5), 0), &config, at(0));
        assert!(opp.supported_exchanges().contains(&"coinbase".to_string()));
    }

    #[test]
    fn removing_a_pair_drops_its_best() {
        let config = ValuationConfig::default();
        let mut opp = MultiExchangeOpportunity::from_pairs(
            "ETH",
            "Ethereum",
            &exchanges(),
            vec![pair("binance", "uniswap", dec!(100), dec!(108), dec!(0.9), 1)],
            at(3),
            &config,
        )
        .unwrap();
        let key = ExchangePairKey::new("binance", "uniswap");

        let removed = opp.remove_pair(&key, &config, at(4)).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(opp.best_for_pair(&key).is_none());
        assert_eq!(opp.priority(), Priority::Low);
    }

    #[test]
    fn document_round_trip_and_stale_best_detection() {
        let config = ValuationConfig::default();
        let opp = MultiExchangeOpportunity::from_pairs(
            "ETH",
            "Ethereum",
            &exchanges(),
            vec![
                pair("binance", "uniswap", dec!(100), dec!(105), dec!(0.9), 1),
                pair("uniswap", "binance", dec!(100), dec!(108), dec!(0.9), 2),
            ],
            at(3),
            &config,
        )
        .unwrap();

        let json = serde_json::to_string(&opp).unwrap();
        let reloaded: MultiExchangeOpportunity = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, opp);

        let mut doc = MultiExchangeDocument::from(opp);
        let key = ExchangePairKey::new("binance", "uniswap");
        let weaker = doc.exchange_pair_opportunities[&key][0].clone();
        doc.best_spreads_per_pair.insert(key, weaker);
        doc.best_overall_return = None;

        let err = MultiExchangeOpportunity::try_from(doc).unwrap_err();
        assert!(matches!(err, ValuationError::StaleDerivedValue { ref field, .. } if field == "best_spreads_per_pair"));
    }

    #[test]
    fn stored_schedule_must_match_its_frequency() {
        let config = ValuationConfig::default();
        let opp = MultiExchangeOpportunity::new("ETH", "Ethereum", &exchanges(), at(0), &config).unwrap();

        let mut doc = MultiExchangeDocument::from(opp.clone());
        doc.next_scan_at = at(0);
        let err = MultiExchangeOpportunity::try_from(doc).unwrap_err();
        assert!(matches!(err, ValuationError::StaleDerivedValue { ref field, .. } if field == "next_scan_at"));

        let mut doc = MultiExchangeDocument::from(opp);
        doc.scan_frequency_secs = u64::MAX;
        doc.next_scan_at = DateTime::<Utc>::MAX_UTC;
        let reloaded = MultiExchangeOpportunity::try_from(doc).unwrap();
        assert!(!reloaded.is_due(at(23)));
    }

    #[test]
    fn reschedule_applies_the_current_config() {
        let config = ValuationConfig::default();
        let mut opp = MultiExchangeOpportunity::new("ETH", "Ethereum", &exchanges(), at(0), &config).unwrap();
        assert_eq!(opp.next_scan_at(), at(4));

        let mut faster = ValuationConfig::default();
        faster.schedule.low_secs = 600;
        opp.reschedule(&faster);

        assert_eq!(opp.priority(), Priority::Low);
        assert_eq!(opp.scan_frequency_secs(), 600);
        assert_eq!(opp.next_scan_at(), at(0) + Duration::seconds(600));
        assert_eq!(opp.analysis_timestamp(), at(0));
    }
}
