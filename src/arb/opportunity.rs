use bigdecimal::{BigDecimal, One, Zero};
use serde::Serialize;

use super::order_config::OrderConfig;
use super::types::{Decision, VenueSide};

/// Proportional fee rates of the two venues, e.g. `0.003` for 0.3%.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueFees {
    /// Fee rate of venue A
    pub a: BigDecimal,
    /// Fee rate of venue B
    pub b: BigDecimal,
}

impl VenueFees {
    /// Fee rate of one side.
    #[must_use]
    pub const fn of(&self, side: VenueSide) -> &BigDecimal {
        match side {
            VenueSide::A => &self.a,
            VenueSide::B => &self.b,
        }
    }
}

/// Minimum spread ratio worth simulating: both fees plus the slippage buffer.
#[must_use]
pub fn fee_ceiling(fees: &VenueFees, slippage_buffer: &BigDecimal) -> BigDecimal {
    &fees.a + &fees.b + slippage_buffer
}

/// `(max - min) / min` of two prices, or `None` if the lower price is not positive.
#[must_use]
pub fn spread_ratio(price_a: &BigDecimal, price_b: &BigDecimal) -> Option<BigDecimal> {
    let (buy, sell) = if price_a <= price_b {
        (price_a, price_b)
    } else {
        (price_b, price_a)
    };
    if *buy <= BigDecimal::zero() {
        return None;
    }
    Some((sell - buy) / buy)
}

/// Stage 1. The spread must be strictly above the fee ceiling.
#[must_use]
pub fn is_spread_profitable(
    price_a: &BigDecimal,
    price_b: &BigDecimal,
    fees: &VenueFees,
    slippage_buffer: &BigDecimal,
) -> bool {
    spread_ratio(price_a, price_b).is_some_and(|spread| spread > fee_ceiling(fees, slippage_buffer))
}

/// Venue with the lower price; venue A wins ties.
#[must_use]
pub fn cheaper_side(price_a: &BigDecimal, price_b: &BigDecimal) -> VenueSide {
    if price_a <= price_b {
        VenueSide::A
    } else {
        VenueSide::B
    }
}

/// Every number that went into one net-profit simulation.
///
/// This is logged for each stage 2 evaluation so a decision can be
/// reconstructed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitReport {
    /// Venue the base token is bought on
    pub buy_on: String,
    /// Venue the base token is sold on
    pub sell_on: String,
    /// Price on the buy venue
    pub buy_price: BigDecimal,
    /// Price on the sell venue
    pub sell_price: BigDecimal,
    /// Quote currency spent
    pub notional_amount: BigDecimal,
    /// Fee rate of the buy venue
    pub buy_fee: BigDecimal,
    /// Fee rate of the sell venue
    pub sell_fee: BigDecimal,
    /// Quote currency left after the buy fee
    pub net_quote_spent: BigDecimal,
    /// Base token received from the buy leg
    pub base_acquired: BigDecimal,
    /// Base token left after the sell fee
    pub net_base_sold: BigDecimal,
    /// Quote currency received from the sell leg
    pub quote_returned: BigDecimal,
    /// Gas and other per-trade costs
    pub fixed_execution_cost: BigDecimal,
    /// `quote_returned - notional_amount - fixed_execution_cost`
    pub profit: BigDecimal,
    /// Configured minimum profit
    pub profit_threshold: BigDecimal,
}

impl ProfitReport {
    /// Stage 2. Profit equal to the threshold passes.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.profit >= self.profit_threshold
    }
}

/// Simulates buying with `config.notional_amount` at `buy_price` and selling
/// everything at `sell_price`, with each venue fee taken from the input asset.
///
/// `buy_price` must be positive; [`spread_ratio`] guarantees it for callers
/// that ran stage 1.
#[must_use]
pub fn simulate_profit(
    buy: (VenueSide, &BigDecimal, &BigDecimal),
    sell: (VenueSide, &BigDecimal, &BigDecimal),
    config: &OrderConfig,
) -> ProfitReport {
    let (buy_side, buy_price, buy_fee) = buy;
    let (sell_side, sell_price, sell_fee) = sell;
    let one = BigDecimal::one();

    let net_quote_spent = &config.notional_amount * (&one - buy_fee);
    let base_acquired = &net_quote_spent / buy_price;
    let net_base_sold = &base_acquired * (&one - sell_fee);
    let quote_returned = &net_base_sold * sell_price;
    let profit = &quote_returned - &config.notional_amount - &config.fixed_execution_cost;

    ProfitReport {
        buy_on: buy_side.to_string(),
        sell_on: sell_side.to_string(),
        buy_price: buy_price.clone(),
        sell_price: sell_price.clone(),
        notional_amount: config.notional_amount.clone(),
        buy_fee: buy_fee.clone(),
        sell_fee: sell_fee.clone(),
        net_quote_spent,
        base_acquired,
        net_base_sold,
        quote_returned,
        fixed_execution_cost: config.fixed_execution_cost.clone(),
        profit,
        profit_threshold: config.profit_threshold.clone(),
    }
}

/// Result of running both stages on one pair of prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// What to do
    pub decision: Decision,
    /// The stage 2 simulation, present only when stage 1 passed
    pub report: Option<ProfitReport>,
}

/// Runs the spread test and, if it passes, the net-profit simulation.
///
/// Stage 1 compares the relative spread against both venue fees plus the
/// slippage buffer. Stage 2 simulates the round trip with the configured
/// notional.
#[must_use]
pub fn evaluate(
    price_a: &BigDecimal,
    price_b: &BigDecimal,
    fees: &VenueFees,
    config: &OrderConfig,
) -> Evaluation {
    if !is_spread_profitable(price_a, price_b, fees, &config.slippage_buffer) {
        return Evaluation {
            decision: Decision::Hold,
            report: None,
        };
    }

    let buy_side = cheaper_side(price_a, price_b);
    let sell_side = buy_side.other();
    let price_of = |side: VenueSide| match side {
        VenueSide::A => price_a,
        VenueSide::B => price_b,
    };

    let report = simulate_profit(
        (buy_side, price_of(buy_side), fees.of(buy_side)),
        (sell_side, price_of(sell_side), fees.of(sell_side)),
        config,
    );
    let decision = if report.is_profitable() {
        Decision::buy_on(buy_side)
    } else {
        Decision::Hold
    };

    Evaluation {
        decision,
        report: Some(report),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::{decimal, order_config, venue_fees};

    #[test]
    fn test_fee_ceiling() {
        let fees = venue_fees("0.003", "0.0025");
        assert_eq!(fee_ceiling(&fees, &decimal("0.001")), decimal("0.0065"));
    }

    #[test]
    fn test_spread_ratio_is_order_independent() {
        for (a, b) in [("100", "105"), ("0.0016", "0.00171"), ("3000", "2999.5")] {
            let forward = spread_ratio(&decimal(a), &decimal(b));
            let backward = spread_ratio(&decimal(b), &decimal(a));
            assert!(forward.is_some());
            assert_eq!(forward, backward);
        }
        assert_eq!(
            spread_ratio(&decimal("100"), &decimal("105")),
            Some(decimal("0.05"))
        );
    }

    #[test]
    fn test_spread_ratio_rejects_non_positive() {
        assert_eq!(spread_ratio(&decimal("0"), &decimal("105")), None);
        assert_eq!(spread_ratio(&decimal("105"), &decimal("-1")), None);
    }

    #[test]
    fn test_spread_stage() {
        let fees = venue_fees("0.003", "0.0025");
        let slippage = decimal("0.001");

        for (price_a, price_b, expected) in [
            // price_a, price_b, passes
            ("100", "105", true),      // spread 0.05
            ("100", "100.3", false),   // spread 0.003
            ("100", "100.65", false),  // spread exactly 0.0065
            ("100.65", "100", false),  // same, reversed
            ("100", "100.651", true),  // just above
            ("100", "99.3", true),     // spread ~0.00705
            ("100", "99.5", false),    // spread ~0.00503
        ] {
            assert_eq!(
                is_spread_profitable(&decimal(price_a), &decimal(price_b), &fees, &slippage),
                expected,
                "{price_a} vs {price_b}"
            );
        }
    }

    #[test]
    fn test_profit_simulation_amounts() {
        let config = order_config("100", "4.0", "0.0001");
        let report = simulate_profit(
            (VenueSide::A, &decimal("100"), &decimal("0.003")),
            (VenueSide::B, &decimal("105"), &decimal("0.0025")),
            &config,
        );

        assert_eq!(report.net_quote_spent, decimal("99.7"));
        assert_eq!(report.base_acquired, decimal("0.997"));
        assert_eq!(report.net_base_sold, decimal("0.9945075"));
        assert_eq!(report.quote_returned, decimal("104.4232875"));
        assert_eq!(report.profit, decimal("4.4231875"));
        assert!(report.is_profitable());
    }

    #[test]
    fn test_profit_threshold_boundary_is_inclusive() {
        let fees = venue_fees("0.003", "0.0025");
        let config = order_config("100", "4.4231875", "0.0001");

        let evaluation = evaluate(&decimal("100"), &decimal("105"), &fees, &config);
        assert_eq!(evaluation.decision, Decision::buy_on(VenueSide::A));

        let config = order_config("100", "4.4231876", "0.0001");
        let evaluation = evaluate(&decimal("100"), &decimal("105"), &fees, &config);
        assert_eq!(evaluation.decision, Decision::Hold);
        assert!(evaluation.report.is_some());
    }

    #[test]
    fn test_evaluate_thresholds() {
        let fees = venue_fees("0.003", "0.0025");

        let evaluation = evaluate(
            &decimal("100"),
            &decimal("105"),
            &fees,
            &order_config("100", "4.0", "0.0001"),
        );
        assert_eq!(
            evaluation.decision,
            Decision::Arbitrage {
                buy_on: VenueSide::A,
                sell_on: VenueSide::B
            }
        );

        let evaluation = evaluate(
            &decimal("100"),
            &decimal("105"),
            &fees,
            &order_config("100", "5.0", "0.0001"),
        );
        assert_eq!(evaluation.decision, Decision::Hold);
    }

    #[test]
    fn test_evaluate_skips_stage_two_on_narrow_spread() {
        let fees = venue_fees("0.003", "0.0025");
        let evaluation = evaluate(
            &decimal("100"),
            &decimal("100.3"),
            &fees,
            &order_config("100", "0.0000001", "0"),
        );
        assert_eq!(evaluation.decision, Decision::Hold);
        assert_eq!(evaluation.report, None);
    }

    #[test]
    fn test_evaluate_buys_on_cheaper_venue_b() {
        let fees = venue_fees("0.003", "0.0025");
        let evaluation = evaluate(
            &decimal("105"),
            &decimal("100"),
            &fees,
            &order_config("100", "4.0", "0.0001"),
        );
        assert_eq!(evaluation.decision, Decision::buy_on(VenueSide::B));

        // Buying on B pays B's fee first
        let report = evaluation.report.unwrap();
        assert_eq!(report.buy_fee, decimal("0.0025"));
        assert_eq!(report.sell_fee, decimal("0.003"));
        assert_eq!(report.buy_on, "B");
    }

    #[test]
    fn test_small_notional_in_base_units() {
        // WBNB/ETH style pair where every amount is tiny
        let fees = venue_fees("0.003", "0.0025");

        let config = order_config("0.03", "0.0001", "0.000000016");
        let evaluation = evaluate(&decimal("0.00130734"), &decimal("0.00136"), &fees, &config);
        assert!(evaluation.decision.is_trade());

        let config = order_config("0.03", "0.0001", "0.0001");
        let evaluation = evaluate(&decimal("0.00130734"), &decimal("0.00131"), &fees, &config);
        assert_eq!(evaluation.decision, Decision::Hold);
    }

    #[test]
    fn test_profit_report_serializes() {
        let config = order_config("100", "4.0", "0.0001");
        let report = simulate_profit(
            (VenueSide::A, &decimal("100"), &decimal("0.003")),
            (VenueSide::B, &decimal("105"), &decimal("0.0025")),
            &config,
        );
        let json = serde_json::to_value(&report).unwrap();
        for field in [
            "buy_price",
            "sell_price",
            "notional_amount",
            "buy_fee",
            "sell_fee",
            "fixed_execution_cost",
            "profit",
            "profit_threshold",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
