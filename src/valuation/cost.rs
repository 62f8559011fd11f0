//! Cost-aware valuation: gross spread to net return
//!
//! net = gross - (gas_cost_usd / capital_required_usd * 100) - trading_fees_percent
//!
//! No rounding happens here; presentation rounding belongs to the reports.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use crate::{
    config::ValuationConfig,
    errors::{ValuationError, ValuationResult},
    types::FeeApplication,
    validation::{validate_capital, validate_cost},
};

/// Net return percent for a single combined fee.
pub fn net_return_percent(
    gross_return_percent: Decimal,
    capital_required_usd: Decimal,
    gas_cost_usd: Decimal,
    trading_fees_percent: Decimal,
) -> ValuationResult<Decimal> {
    let model = CostModel::new(
        capital_required_usd,
        gas_cost_usd,
        trading_fees_percent,
        FeeApplication::Combined,
    )?;
    model.net_return_percent(gross_return_percent, 1)
}

/// Percentage points lost to gas and fees.
pub fn cost_impact_percent(
    capital_required_usd: Decimal,
    gas_cost_usd: Decimal,
    trading_fees_percent: Decimal,
) -> ValuationResult<Decimal> {
    let model = CostModel::new(
        capital_required_usd,
        gas_cost_usd,
        trading_fees_percent,
        FeeApplication::Combined,
    )?;
    model.cost_impact_percent(1)
}

/// Validated cost inputs. Capital is always > 0 and the gas impact is known
/// to fit in a `Decimal`; only the fee and gross terms can still overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCostModel")]
pub struct CostModel {
    capital_required_usd: Decimal,
    gas_cost_usd: Decimal,
    trading_fees_percent: Decimal,
    fee_application: FeeApplication,
    #[serde(skip_serializing)]
    gas_impact_percent: Decimal,
}

#[derive(Deserialize)]
struct RawCostModel {
    capital_required_usd: Decimal,
    gas_cost_usd: Decimal,
    trading_fees_percent: Decimal,
    #[serde(default)]
    fee_application: FeeApplication,
}

impl TryFrom<RawCostModel> for CostModel {
    type Error = ValuationError;

    fn try_from(raw: RawCostModel) -> Result<Self, Self::Error> {
        CostModel::new(
            raw.capital_required_usd,
            raw.gas_cost_usd,
            raw.trading_fees_percent,
            raw.fee_application,
        )
    }
}

impl CostModel {
    pub fn new(
        capital_required_usd: Decimal,
        gas_cost_usd: Decimal,
        trading_fees_percent: Decimal,
        fee_application: FeeApplication,
    ) -> ValuationResult<Self> {
        validate_capital(capital_required_usd)?;
        validate_cost("gas_cost_usd", gas_cost_usd)?;
        validate_cost("trading_fees_percent", trading_fees_percent)?;

        let gas_impact_percent = gas_cost_usd
            .checked_div(capital_required_usd)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .ok_or(ValuationError::OutOfRange { operation: "gas_cost_usd / capital_required_usd" })?;

        Ok(Self {
            capital_required_usd,
            gas_cost_usd,
            trading_fees_percent,
            fee_application,
            gas_impact_percent,
        })
    }

    /// Fills any missing input from the configured defaults.
    pub fn from_config(
        capital_required_usd: Option<Decimal>,
        gas_cost_usd: Option<Decimal>,
        trading_fees_percent: Option<Decimal>,
        config: &ValuationConfig,
    ) -> ValuationResult<Self> {
        Self::new(
            capital_required_usd.unwrap_or(config.default_capital_usd),
            gas_cost_usd.unwrap_or(config.default_gas_cost_usd),
            trading_fees_percent.unwrap_or(config.default_trading_fee_percent),
            config.fee_application,
        )
    }

    pub fn capital_required_usd(&self) -> Decimal {
        self.capital_required_usd
    }

    pub fn gas_cost_usd(&self) -> Decimal {
        self.gas_cost_usd
    }

    pub fn trading_fees_percent(&self) -> Decimal {
        self.trading_fees_percent
    }

    pub fn fee_application(&self) -> FeeApplication {
        self.fee_application
    }

    pub fn with_capital(&self, capital_required_usd: Decimal) -> ValuationResult<Self> {
        Self::new(capital_required_usd, self.gas_cost_usd, self.trading_fees_percent, self.fee_application)
    }

    pub fn with_gas_cost(&self, gas_cost_usd: Decimal) -> ValuationResult<Self> {
        Self::new(self.capital_required_usd, gas_cost_usd, self.trading_fees_percent, self.fee_application)
    }

    pub fn with_trading_fees(&self, trading_fees_percent: Decimal) -> ValuationResult<Self> {
        Self::new(self.capital_required_usd, self.gas_cost_usd, trading_fees_percent, self.fee_application)
    }

    /// Fee percent actually charged for a trade touching `legs` exchanges.
    pub fn effective_fee_percent(&self, legs: usize) -> ValuationResult<Decimal> {
        match self.fee_application {
            FeeApplication::Combined => Ok(self.trading_fees_percent),
            FeeApplication::PerLeg => self
                .trading_fees_percent
                .checked_mul(Decimal::from(legs.max(1)))
                .ok_or(ValuationError::OutOfRange { operation: "trading_fees_percent * legs" }),
        }
    }

    pub fn gas_impact_percent(&self) -> Decimal {
        self.gas_impact_percent
    }

    pub fn cost_impact_percent(&self, legs: usize) -> ValuationResult<Decimal> {
        self.gas_impact_percent
            .checked_add(self.effective_fee_percent(legs)?)
            .ok_or(ValuationError::OutOfRange { operation: "gas impact + fees" })
    }

    pub fn net_return_percent(&self, gross_return_percent: Decimal, legs: usize) -> ValuationResult<Decimal> {
        let fees = self.effective_fee_percent(legs)?;
        gross_return_percent
            .checked_sub(self.gas_impact_percent)
            .and_then(|net| net.checked_sub(fees))
            .ok_or(ValuationError::OutOfRange { operation: "gross - costs" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn eight_percent_gross_nets_six_point_seven() {
        let impact = cost_impact_percent(dec!(5000), dec!(35), dec!(0.6)).unwrap();
        assert_eq!(impact, dec!(1.3));

        let net = net_return_percent(dec!(8.0), dec!(5000), dec!(35), dec!(0.6)).unwrap();
        assert_eq!(net, dec!(6.7));
    }

    #[test]
    fn zero_or_negative_capital_is_rejected() {
        assert_eq!(
            net_return_percent(dec!(8), dec!(0), dec!(35), dec!(0.6)),
            Err(ValuationError::InvalidCapital { capital_usd: dec!(0) })
        );
        assert!(matches!(
            net_return_percent(dec!(8), dec!(-1), dec!(35), dec!(0.6)),
            Err(ValuationError::InvalidCapital { .. })
        ));
    }

    #[test]
    fn negative_costs_are_rejected() {
        assert_eq!(
            net_return_percent(dec!(8), dec!(1000), dec!(-1), dec!(0.6)),
            Err(ValuationError::InvalidCost { field: "gas_cost_usd", value: dec!(-1) })
        );
        assert!(matches!(
            net_return_percent(dec!(8), dec!(1000), dec!(1), dec!(-0.1)),
            Err(ValuationError::InvalidCost { field: "trading_fees_percent", .. })
        ));
    }

    #[test]
    fn negative_gross_spreads_are_representable() {
        let net = net_return_percent(dec!(-2), dec!(1000), dec!(10), dec!(0.5)).unwrap();
        assert_eq!(net, dec!(-3.5));
    }

    #[test]
    fn per_leg_fees_scale_with_leg_count() {
        let model = CostModel::new(dec!(5000), dec!(35), dec!(0.3), FeeApplication::PerLeg).unwrap();
        assert_eq!(model.effective_fee_percent(2), Ok(dec!(0.6)));
        assert_eq!(model.net_return_percent(dec!(8), 2), Ok(dec!(6.7)));
        assert_eq!(model.net_return_percent(dec!(8), 3), Ok(dec!(6.4)));

        let combined = CostModel::new(dec!(5000), dec!(35), dec!(0.3), FeeApplication::Combined).unwrap();
        assert_eq!(combined.net_return_percent(dec!(8), 3), Ok(dec!(7.0)));
    }

    #[test]
    fn updating_an_input_revalidates() {
        let model = CostModel::new(dec!(5000), dec!(35), dec!(0.6), FeeApplication::Combined).unwrap();
        assert!(model.with_capital(dec!(0)).is_err());

        let cheaper = model.with_gas_cost(dec!(0)).unwrap();
        assert_eq!(cheaper.net_return_percent(dec!(8), 2), Ok(dec!(7.4)));
    }

    #[test]
    fn tiny_capital_overflow_is_an_error() {
        let tiny = Decimal::new(1, 28);
        assert!(matches!(
            net_return_percent(dec!(0), tiny, dec!(1), dec!(0)),
            Err(ValuationError::OutOfRange { .. })
        ));
        assert!(matches!(
            cost_impact_percent(tiny, dec!(1), dec!(0)),
            Err(ValuationError::OutOfRange { .. })
        ));
        assert!(matches!(
            CostModel::new(tiny, Decimal::MAX, dec!(0), FeeApplication::Combined),
            Err(ValuationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn extreme_fee_and_gross_terms_are_errors() {
        let per_leg = CostModel::new(dec!(5000), dec!(0), Decimal::MAX, FeeApplication::PerLeg).unwrap();
        assert!(matches!(per_leg.effective_fee_percent(2), Err(ValuationError::OutOfRange { .. })));
        assert!(per_leg.net_return_percent(dec!(8), 2).is_err());

        let model = CostModel::new(dec!(1), dec!(35), dec!(0.6), FeeApplication::Combined).unwrap();
        assert_eq!(model.gas_impact_percent(), dec!(3500));
        assert!(matches!(
            model.net_return_percent(Decimal::MIN, 2),
            Err(ValuationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn deserializing_invalid_capital_fails() {
        let json = r#"{"capital_required_usd":"0","gas_cost_usd":"35","trading_fees_percent":"0.6"}"#;
        assert!(serde_json::from_str::<CostModel>(json).is_err());

        let json = r#"{"capital_required_usd":"5000","gas_cost_usd":"35","trading_fees_percent":"0.6"}"#;
        let model: CostModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.fee_application(), FeeApplication::Combined);
    }

    fn cents(range: std::ops::Range<i64>) -> impl Strategy<Value = Decimal> {
        range.prop_map(|v| Decimal::new(v, 2))
    }

    proptest! {
        #[test]
        fn net_matches_formula_exactly(
            gross in cents(-50_000..50_000),
            capital in cents(1..100_000_000),
            gas in cents(0..1_000_000),
            fee in cents(0..1_000),
        ) {
            let net = net_return_percent(gross, capital, gas, fee).unwrap();
            prop_assert_eq!(net, gross - (gas / capital) * dec!(100) - fee);
        }

        #[test]
        fn non_positive_capital_never_values(
            capital in cents(-100_000_000..1),
            gross in cents(-50_000..50_000),
        ) {
            let result = net_return_percent(gross, capital, dec!(35), dec!(0.6));
            prop_assert!(
                matches!(result, Err(ValuationError::InvalidCapital { .. })),
                "expected InvalidCapital, got {:?}",
                result
            );
        }

        #[test]
        fn costs_never_increase_return(
            gross in cents(-50_000..50_000),
            capital in cents(1..100_000_000),
            gas in cents(0..1_000_000),
            fee in cents(0..1_000),
        ) {
            let net = net_return_percent(gross, capital, gas, fee).unwrap();
            prop_assert!(net <= gross);
        }
    }
}
