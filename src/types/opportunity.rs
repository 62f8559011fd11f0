//! Arbitrage opportunity types

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use super::pair::check_stored;
use crate::{
    config::ValuationConfig,
    errors::{ValuationError, ValuationResult},
    valuation::{CostModel, Ranked},
    validation::{distinct_exchanges, validate_confidence, validate_duration},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityClass {
    #[default]
    CrossExchange,
    Historical,
    Triangular,
    FundingRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub realized_return_percent: Option<Decimal>,
    pub tx_reference: Option<String>,
    pub error_message: Option<String>,
}

fn default_duration_hours() -> Decimal {
    dec!(24)
}

/// Caller-supplied fields for a new opportunity. Missing costs and confidence
/// come from the valuation config.
#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityDraft {
    #[serde(default)]
    pub opportunity_class: OpportunityClass,
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: Option<String>,
    pub source_exchanges: Vec<String>,
    pub estimated_return_percent: Decimal,
    pub capital_required_usd: Decimal,
    #[serde(default)]
    pub gas_cost_usd: Option<Decimal>,
    #[serde(default)]
    pub trading_fees_percent: Option<Decimal>,
    #[serde(default)]
    pub confidence_score: Option<Decimal>,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: Decimal,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub data_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl OpportunityDraft {
    pub fn new(
        token_symbol: impl Into<String>,
        source_exchanges: Vec<String>,
        estimated_return_percent: Decimal,
        capital_required_usd: Decimal,
    ) -> Self {
        Self {
            opportunity_class: OpportunityClass::default(),
            token_symbol: token_symbol.into(),
            token_name: None,
            source_exchanges,
            estimated_return_percent,
            capital_required_usd,
            gas_cost_usd: None,
            trading_fees_percent: None,
            confidence_score: None,
            duration_hours: default_duration_hours(),
            risk_level: RiskLevel::default(),
            data_timestamp: None,
            notes: String::new(),
            tags: Vec::new(),
        }
    }
}

/// A detected price discrepancy for one token across two or more exchanges.
///
/// Inputs are private so every change goes through a validating setter. Each
/// setter re-derives the net return and cost impact before it commits, so
/// the derived values always match the current inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OpportunityRecord", into = "OpportunityRecord")]
pub struct Opportunity {
    id: String,
    opportunity_class: OpportunityClass,
    token_symbol: String,
    token_name: Option<String>,
    source_exchanges: Vec<String>,
    estimated_return_percent: Decimal,
    costs: CostModel,
    confidence_score: Decimal,
    duration_hours: Decimal,
    risk_level: RiskLevel,
    data_timestamp: DateTime<Utc>,
    is_executed: bool,
    execution_timestamp: Option<DateTime<Utc>>,
    execution_result: Option<ExecutionResult>,
    notes: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    valuation: Valuation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Valuation {
    net_return_percent: Decimal,
    cost_impact_percent: Decimal,
}

impl Valuation {
    fn derive(costs: &CostModel, estimated_return_percent: Decimal, legs: usize) -> ValuationResult<Self> {
        Ok(Self {
            net_return_percent: costs.net_return_percent(estimated_return_percent, legs)?,
            cost_impact_percent: costs.cost_impact_percent(legs)?,
        })
    }
}

impl Opportunity {
    pub fn create(draft: OpportunityDraft, config: &ValuationConfig, now: DateTime<Utc>) -> ValuationResult<Self> {
        let symbol = draft.token_symbol.trim().to_uppercase();
        let source_exchanges = distinct_exchanges(&symbol, &draft.source_exchanges)?;
        let costs = CostModel::from_config(
            Some(draft.capital_required_usd),
            draft.gas_cost_usd,
            draft.trading_fees_percent,
            config,
        )?;
        let confidence_score = draft.confidence_score.unwrap_or(config.default_confidence_score);
        validate_confidence(confidence_score)?;
        validate_duration(draft.duration_hours)?;
        let valuation = Valuation::derive(&costs, draft.estimated_return_percent, source_exchanges.len())?;
        let expires_at = TimeDelta::try_hours(config.opportunity_ttl_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(ValuationError::OutOfRange { operation: "now + opportunity_ttl_hours" })?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            opportunity_class: draft.opportunity_class,
            token_symbol: symbol,
            token_name: draft.token_name,
            source_exchanges,
            estimated_return_percent: draft.estimated_return_percent,
            costs,
            confidence_score,
            duration_hours: draft.duration_hours,
            risk_level: draft.risk_level,
            data_timestamp: draft.data_timestamp.unwrap_or(now),
            is_executed: false,
            execution_timestamp: None,
            execution_result: None,
            notes: draft.notes,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
            expires_at,
            valuation,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn opportunity_class(&self) -> OpportunityClass {
        self.opportunity_class
    }

    pub fn token_symbol(&self) -> &str {
        &self.token_symbol
    }

    pub fn token_name(&self) -> Option<&str> {
        self.token_name.as_deref()
    }

    pub fn source_exchanges(&self) -> &[String] {
        &self.source_exchanges
    }

    pub fn estimated_return_percent(&self) -> Decimal {
        self.estimated_return_percent
    }

    pub fn capital_required_usd(&self) -> Decimal {
        self.costs.capital_required_usd()
    }

    pub fn gas_cost_usd(&self) -> Decimal {
        self.costs.gas_cost_usd()
    }

    pub fn trading_fees_percent(&self) -> Decimal {
        self.costs.trading_fees_percent()
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    pub fn legs(&self) -> usize {
        self.source_exchanges.len()
    }

    pub fn cost_impact_percent(&self) -> Decimal {
        self.valuation.cost_impact_percent
    }

    pub fn net_return_percent(&self) -> Decimal {
        self.valuation.net_return_percent
    }

    pub fn confidence_score(&self) -> Decimal {
        self.confidence_score
    }

    pub fn duration_hours(&self) -> Decimal {
        self.duration_hours
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    pub fn data_timestamp(&self) -> DateTime<Utc> {
        self.data_timestamp
    }

    pub fn is_executed(&self) -> bool {
        self.is_executed
    }

    pub fn execution_timestamp(&self) -> Option<DateTime<Utc>> {
        self.execution_timestamp
    }

    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        self.execution_result.as_ref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Same token, class and exchange set priced from the same market data.
    /// Rescanning unchanged observations yields records that match this way.
    pub fn same_market_as(&self, other: &Opportunity) -> bool {
        if self.token_symbol != other.token_symbol
            || self.opportunity_class != other.opportunity_class
            || self.data_timestamp != other.data_timestamp
            || self.source_exchanges.len() != other.source_exchanges.len()
        {
            return false;
        }
        self.source_exchanges
            .iter()
            .all(|exchange| other.source_exchanges.contains(exchange))
    }

    pub fn set_estimated_return(&mut self, gross_return_percent: Decimal, now: DateTime<Utc>) -> ValuationResult<()> {
        self.valuation = Valuation::derive(&self.costs, gross_return_percent, self.legs())?;
        self.estimated_return_percent = gross_return_percent;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_capital_required(&mut self, capital_usd: Decimal, now: DateTime<Utc>) -> ValuationResult<()> {
        self.replace_costs(self.costs.with_capital(capital_usd)?, now)
    }

    pub fn set_gas_cost(&mut self, gas_cost_usd: Decimal, now: DateTime<Utc>) -> ValuationResult<()> {
        self.replace_costs(self.costs.with_gas_cost(gas_cost_usd)?, now)
    }

    pub fn set_trading_fees(&mut self, trading_fees_percent: Decimal, now: DateTime<Utc>) -> ValuationResult<()> {
        self.replace_costs(self.costs.with_trading_fees(trading_fees_percent)?, now)
    }

    fn replace_costs(&mut self, costs: CostModel, now: DateTime<Utc>) -> ValuationResult<()> {
        self.valuation = Valuation::derive(&costs, self.estimated_return_percent, self.legs())?;
        self.costs = costs;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_confidence(&mut self, confidence_score: Decimal, now: DateTime<Utc>) -> ValuationResult<()> {
        validate_confidence(confidence_score)?;
        self.confidence_score = confidence_score;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_executed(&mut self, result: Option<ExecutionResult>, now: DateTime<Utc>) {
        self.is_executed = true;
        self.execution_timestamp = Some(now);
        self.execution_result = result;
        self.updated_at = now;
    }
}

impl Ranked for Opportunity {
    fn net_return_percent(&self) -> Decimal {
        Opportunity::net_return_percent(self)
    }

    fn confidence_score(&self) -> Decimal {
        self.confidence_score
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.data_timestamp
    }

    fn ranking_label(&self) -> (&str, &str) {
        (&self.token_symbol, &self.id)
    }
}

/// Serialized view of an opportunity, including the derived net return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: String,
    pub opportunity_class: OpportunityClass,
    pub token_symbol: String,
    pub token_name: Option<String>,
    pub source_exchanges: Vec<String>,
    pub estimated_return_percent: Decimal,
    pub capital_required_usd: Decimal,
    pub gas_cost_usd: Decimal,
    pub trading_fees_percent: Decimal,
    #[serde(default)]
    pub fee_application: crate::types::FeeApplication,
    #[serde(default)]
    pub net_return_percent: Option<Decimal>,
    pub confidence_score: Decimal,
    pub duration_hours: Decimal,
    pub risk_level: RiskLevel,
    pub data_timestamp: DateTime<Utc>,
    pub is_executed: bool,
    pub execution_timestamp: Option<DateTime<Utc>>,
    pub execution_result: Option<ExecutionResult>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Opportunity> for OpportunityRecord {
    fn from(opp: Opportunity) -> Self {
        Self {
            net_return_percent: Some(opp.net_return_percent()),
            capital_required_usd: opp.costs.capital_required_usd(),
            gas_cost_usd: opp.costs.gas_cost_usd(),
            trading_fees_percent: opp.costs.trading_fees_percent(),
            fee_application: opp.costs.fee_application(),
            id: opp.id,
            opportunity_class: opp.opportunity_class,
            token_symbol: opp.token_symbol,
            token_name: opp.token_name,
            source_exchanges: opp.source_exchanges,
            estimated_return_percent: opp.estimated_return_percent,
            confidence_score: opp.confidence_score,
            duration_hours: opp.duration_hours,
            risk_level: opp.risk_level,
            data_timestamp: opp.data_timestamp,
            is_executed: opp.is_executed,
            execution_timestamp: opp.execution_timestamp,
            execution_result: opp.execution_result,
            notes: opp.notes,
            tags: opp.tags,
            created_at: opp.created_at,
            updated_at: opp.updated_at,
            expires_at: opp.expires_at,
        }
    }
}

impl TryFrom<OpportunityRecord> for Opportunity {
    type Error = ValuationError;

    fn try_from(record: OpportunityRecord) -> Result<Self, Self::Error> {
        let source_exchanges = distinct_exchanges(&record.token_symbol, &record.source_exchanges)?;
        let costs = CostModel::new(
            record.capital_required_usd,
            record.gas_cost_usd,
            record.trading_fees_percent,
            record.fee_application,
        )?;
        validate_confidence(record.confidence_score)?;
        validate_duration(record.duration_hours)?;
        let valuation = Valuation::derive(&costs, record.estimated_return_percent, source_exchanges.len())?;

        let opp = Opportunity {
            id: record.id,
            opportunity_class: record.opportunity_class,
            token_symbol: record.token_symbol,
            token_name: record.token_name,
            source_exchanges,
            estimated_return_percent: record.estimated_return_percent,
            costs,
            confidence_score: record.confidence_score,
            duration_hours: record.duration_hours,
            risk_level: record.risk_level,
            data_timestamp: record.data_timestamp,
            is_executed: record.is_executed,
            execution_timestamp: record.execution_timestamp,
            execution_result: record.execution_result,
            notes: record.notes,
            tags: record.tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
            expires_at: record.expires_at,
            valuation,
        };

        check_stored("net_return_percent", record.net_return_percent, opp.net_return_percent())?;
        Ok(opp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crate::types::FeeApplication;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn draft() -> OpportunityDraft {
        OpportunityDraft::new(
            "eth",
            vec!["binance".into(), "uniswap".into()],
            dec!(8.0),
            dec!(5000),
        )
    }

    #[test]
    fn create_applies_config_defaults() {
        let config = ValuationConfig::default();
        let opp = Opportunity::create(draft(), &config, now()).unwrap();

        assert_eq!(opp.token_symbol(), "ETH");
        assert_eq!(opp.gas_cost_usd(), dec!(35.0));
        assert_eq!(opp.trading_fees_percent(), dec!(0.6));
        assert_eq!(opp.confidence_score(), dec!(0.5));
        assert_eq!(opp.net_return_percent(), dec!(6.7));
        assert_eq!(opp.cost_impact_percent(), dec!(1.3));
        assert_eq!(opp.expires_at(), now() + Duration::hours(24));
        assert!(!opp.is_executed());
    }

    #[test]
    fn net_return_follows_every_input_change() {
        let config = ValuationConfig::default();
        let mut opp = Opportunity::create(draft(), &config, now()).unwrap();

        opp.set_capital_required(dec!(3500), now()).unwrap();
        assert_eq!(opp.net_return_percent(), dec!(6.4));

        opp.set_gas_cost(dec!(0), now()).unwrap();
        assert_eq!(opp.net_return_percent(), dec!(7.4));

        opp.set_trading_fees(dec!(1.4), now()).unwrap();
        opp.set_estimated_return(dec!(10), now()).unwrap();
        assert_eq!(opp.net_return_percent(), dec!(8.6));
        assert_eq!(opp.cost_impact_percent(), dec!(1.4));
    }

    #[test]
    fn overflowing_update_is_rejected_and_leaves_record_unchanged() {
        let config = ValuationConfig::default();
        let mut one_dollar = draft();
        one_dollar.capital_required_usd = dec!(1);
        let mut opp = Opportunity::create(one_dollar, &config, now()).unwrap();
        assert_eq!(opp.net_return_percent(), dec!(-3492.6));

        let err = opp.set_estimated_return(Decimal::MIN, now()).unwrap_err();
        assert!(matches!(err, ValuationError::OutOfRange { .. }));
        assert!(matches!(
            opp.set_capital_required(Decimal::new(1, 28), now()),
            Err(ValuationError::OutOfRange { .. })
        ));
        assert_eq!(opp.estimated_return_percent(), dec!(8.0));
        assert_eq!(opp.capital_required_usd(), dec!(1));
        assert_eq!(opp.net_return_percent(), dec!(-3492.6));
    }

    #[test]
    fn rejected_setter_leaves_record_unchanged() {
        let config = ValuationConfig::default();
        let mut opp = Opportunity::create(draft(), &config, now()).unwrap();

        let err = opp.set_capital_required(dec!(0), now()).unwrap_err();
        assert_eq!(err, ValuationError::InvalidCapital { capital_usd: dec!(0) });
        assert_eq!(opp.capital_required_usd(), dec!(5000));
        assert!(opp.set_confidence(dec!(1.2), now()).is_err());
        assert_eq!(opp.confidence_score(), dec!(0.5));
    }

    #[test]
    fn create_rejects_invalid_drafts() {
        let config = ValuationConfig::default();

        let mut single = draft();
        single.source_exchanges = vec!["binance".into(), "binance".into()];
        assert!(matches!(
            Opportunity::create(single, &config, now()),
            Err(ValuationError::InsufficientExchanges { found: 1, .. })
        ));

        let mut zero_capital = draft();
        zero_capital.capital_required_usd = dec!(0);
        assert!(matches!(
            Opportunity::create(zero_capital, &config, now()),
            Err(ValuationError::InvalidCapital { .. })
        ));

        let mut bad_confidence = draft();
        bad_confidence.confidence_score = Some(dec!(95));
        assert!(matches!(
            Opportunity::create(bad_confidence, &config, now()),
            Err(ValuationError::InvalidConfidence { .. })
        ));
    }

    #[test]
    fn unrepresentable_expiry_is_rejected() {
        let config = ValuationConfig {
            opportunity_ttl_hours: i64::MAX,
            ..ValuationConfig::default()
        };
        assert!(matches!(
            Opportunity::create(draft(), &config, now()),
            Err(ValuationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn per_leg_fees_count_each_source_exchange() {
        let config = ValuationConfig {
            fee_application: FeeApplication::PerLeg,
            ..ValuationConfig::default()
        };
        let mut three_legs = draft();
        three_legs.source_exchanges.push("kraken".into());
        three_legs.trading_fees_percent = Some(dec!(0.2));

        let opp = Opportunity::create(three_legs, &config, now()).unwrap();
        assert_eq!(opp.net_return_percent(), dec!(6.7));
    }

    #[test]
    fn same_market_ignores_exchange_order_and_identity() {
        let config = ValuationConfig::default();
        let first = Opportunity::create(draft(), &config, now()).unwrap();

        let mut reversed = draft();
        reversed.source_exchanges.reverse();
        let second = Opportunity::create(reversed, &config, now()).unwrap();
        assert_ne!(first.id(), second.id());
        assert!(first.same_market_as(&second));

        let mut later = draft();
        later.data_timestamp = Some(now() + Duration::minutes(1));
        let third = Opportunity::create(later, &config, now()).unwrap();
        assert!(!first.same_market_as(&third));
    }

    #[test]
    fn execution_is_recorded() {
        let config = ValuationConfig::default();
        let mut opp = Opportunity::create(draft(), &config, now()).unwrap();
        let later = now() + Duration::minutes(5);

        opp.mark_executed(
            Some(ExecutionResult {
                success: true,
                realized_return_percent: Some(dec!(6.1)),
                tx_reference: None,
                error_message: None,
            }),
            later,
        );

        assert!(opp.is_executed());
        assert_eq!(opp.execution_timestamp(), Some(later));
        assert_eq!(opp.updated_at(), later);
        assert!(opp.execution_result().unwrap().success);
    }

    #[test]
    fn serialized_record_carries_net_and_reloads() {
        let config = ValuationConfig::default();
        let opp = Opportunity::create(draft(), &config, now()).unwrap();

        let mut value = serde_json::to_value(&opp).unwrap();
        let stored: Decimal = value["net_return_percent"].as_str().unwrap().parse().unwrap();
        assert_eq!(stored, dec!(6.7));
        assert_eq!(serde_json::from_value::<Opportunity>(value.clone()).unwrap(), opp);

        value["gas_cost_usd"] = serde_json::json!("70");
        let err = serde_json::from_value::<Opportunity>(value).unwrap_err();
        assert!(err.to_string().contains("Stale derived value"));
    }
}
