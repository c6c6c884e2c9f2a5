//! Three-strategy simulation over a merged daily history.
//!
//! - **A** timing: all-in below the first buy bucket, all-out at the top
//!   sell threshold.
//! - **B** fixed daily contribution.
//! - **C** fixed daily contribution plus gradient extra buys, with partial
//!   sales of the extra position only.
//!
//! A buy-and-hold position bought with the initial capital on the first
//! row is tracked as the reference.

use board_common::config::AdvisorConfig;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use super::gradient::GradientRules;

// ============================================================================
// Inputs
// ============================================================================

/// Capital settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub initial_capital: f64,
    pub daily_base_invest: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            daily_base_invest: 50.0,
        }
    }
}

impl From<&AdvisorConfig> for SimulationParams {
    fn from(config: &AdvisorConfig) -> Self {
        Self {
            initial_capital: config.initial_capital,
            daily_base_invest: config.daily_base_invest,
        }
    }
}

/// One session: the ETF close and the differential (if defined).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyInput {
    pub date: NaiveDate,
    pub close: f64,
    pub diff: Option<f64>,
}

// ============================================================================
// Outputs
// ============================================================================

/// Per-session simulation columns. Returns are percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRow {
    pub date: NaiveDate,
    /// Valuation price; the last valid close when the input close was invalid
    pub close: f64,
    pub diff: Option<f64>,
    pub a_asset: f64,
    pub a_return: f64,
    pub b_asset: f64,
    pub b_invested: f64,
    pub b_return: f64,
    pub c_asset: f64,
    pub c_invested: f64,
    pub c_return: f64,
    pub buy_hold_asset: f64,
    pub buy_hold_return: f64,
    /// Extra amount strategy C bought this session
    pub c_extra_buy: f64,
    /// Share of the extra position strategy C sold this session
    pub c_sell_ratio: f64,
}

/// A trade taken during the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeEvent {
    /// Strategy A bought with all its cash
    TimingBuy { date: NaiveDate, diff: f64, price: f64 },
    /// Strategy A sold everything
    TimingSell {
        date: NaiveDate,
        diff: f64,
        price: f64,
        /// Cumulative return on the initial capital, percent
        total_return: f64,
    },
    /// Strategy C bought extra shares
    GradientBuy {
        date: NaiveDate,
        diff: f64,
        /// Upper edge (`lower` bound) of the matched bucket
        threshold: f64,
        amount: f64,
        shares: f64,
        extra_shares: f64,
        extra_invested: f64,
    },
    /// Strategy C sold part of its extra shares
    GradientSell {
        date: NaiveDate,
        diff: f64,
        threshold: f64,
        sale: SaleOutcome,
    },
}

/// Result of selling part of the extra position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaleOutcome {
    pub ratio: f64,
    pub shares: f64,
    pub proceeds: f64,
    /// Extra-position cost basis retired by the sale
    pub recovered: f64,
    /// (proceeds - recovered) / recovered, percent
    pub realized_return: f64,
    pub extra_shares_left: f64,
    pub extra_invested_left: f64,
}

/// End-of-run figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationSummary {
    pub a_asset: f64,
    pub a_return: f64,
    pub b_asset: f64,
    pub b_invested: f64,
    pub b_return: f64,
    pub c_asset: f64,
    pub c_invested: f64,
    pub c_return: f64,
    pub c_base_shares: f64,
    pub c_extra_shares: f64,
    pub c_cash: f64,
    pub buy_hold_asset: f64,
    pub buy_hold_return: f64,
}

/// Full simulation output.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Simulation {
    pub rows: Vec<SimulationRow>,
    pub events: Vec<TradeEvent>,
    pub summary: SimulationSummary,
}

// ============================================================================
// Portfolios
// ============================================================================

/// Strategy A state.
#[derive(Debug, Clone, Copy)]
struct TimingPortfolio {
    cash: f64,
    shares: f64,
}

impl TimingPortfolio {
    fn holding(&self) -> bool {
        self.shares > 0.0
    }

    fn asset(&self, close: f64) -> f64 {
        self.cash + self.shares * close
    }
}

/// Strategy B state.
#[derive(Debug, Clone, Copy, Default)]
struct DcaPortfolio {
    shares: f64,
    invested: f64,
}

impl DcaPortfolio {
    fn contribute(&mut self, amount: f64, close: f64) {
        self.shares += amount / close;
        self.invested += amount;
    }
}

/// Strategy C state: a base position that only grows and an extra position
/// that is bought on weakness and partially sold on strength.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientPortfolio {
    pub base_shares: f64,
    pub base_invested: f64,
    pub extra_shares: f64,
    /// Cost basis of the remaining extra shares
    pub extra_invested: f64,
    /// Proceeds of extra-position sales
    pub cash: f64,
}

impl GradientPortfolio {
    pub fn contribute_base(&mut self, amount: f64, close: f64) {
        self.base_shares += amount / close;
        self.base_invested += amount;
    }

    /// Buy extra shares; returns the shares bought.
    pub fn buy_extra(&mut self, amount: f64, close: f64) -> f64 {
        let shares = amount / close;
        self.extra_shares += shares;
        self.extra_invested += amount;
        shares
    }

    /// Sell `ratio` of the extra shares, retiring the same share of their
    /// cost basis. `None` when there is nothing to sell.
    pub fn sell_extra(&mut self, ratio: f64, close: f64) -> Option<SaleOutcome> {
        if self.extra_shares <= 0.0 || ratio <= 0.0 {
            return None;
        }
        let ratio = ratio.min(1.0);
        let shares = self.extra_shares * ratio;
        let proceeds = shares * close;
        let recovered = self.extra_invested * ratio;

        self.cash += proceeds;
        self.extra_shares -= shares;
        self.extra_invested = (self.extra_invested - recovered).max(0.0);

        let realized_return = if recovered > 0.0 {
            (proceeds - recovered) / recovered * 100.0
        } else {
            0.0
        };

        Some(SaleOutcome {
            ratio,
            shares,
            proceeds,
            recovered,
            realized_return,
            extra_shares_left: self.extra_shares,
            extra_invested_left: self.extra_invested,
        })
    }

    /// Base contributions plus the cost of the extra shares still held.
    pub fn invested(&self) -> f64 {
        self.base_invested + self.extra_invested
    }

    pub fn asset(&self, close: f64) -> f64 {
        self.cash + (self.base_shares + self.extra_shares) * close
    }
}

fn pct_return(asset: f64, invested: f64) -> f64 {
    if invested > 0.0 {
        (asset - invested) / invested * 100.0
    } else {
        0.0
    }
}

fn valid_close(close: f64) -> bool {
    close.is_finite() && close > 0.0
}

/// Value every portfolio at `close` without trading.
#[allow(clippy::too_many_arguments)]
fn snapshot_row(
    date: NaiveDate,
    close: f64,
    diff: Option<f64>,
    timing: &TimingPortfolio,
    dca: &DcaPortfolio,
    gradient: &GradientPortfolio,
    buy_hold_shares: f64,
    params: &SimulationParams,
) -> SimulationRow {
    let a_asset = timing.asset(close);
    let b_asset = dca.shares * close;
    let c_asset = gradient.asset(close);
    let buy_hold_asset = buy_hold_shares * close;

    SimulationRow {
        date,
        close,
        diff,
        a_asset,
        a_return: pct_return(a_asset, params.initial_capital),
        b_asset,
        b_invested: dca.invested,
        b_return: pct_return(b_asset, dca.invested),
        c_asset,
        c_invested: gradient.invested(),
        c_return: pct_return(c_asset, gradient.invested()),
        buy_hold_asset,
        buy_hold_return: pct_return(buy_hold_asset, params.initial_capital),
        c_extra_buy: 0.0,
        c_sell_ratio: 0.0,
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Walk the history once and track all strategies side by side.
///
/// Every input yields exactly one row unless no close is valid at all, in
/// which case the simulation is empty. Rows with a missing differential
/// still receive the daily base contribution but take no signal-driven
/// trade. A row whose close is not a positive number trades nothing and is
/// valued at the last valid close, so its assets and returns repeat the
/// previous row.
pub fn simulate(
    inputs: &[DailyInput],
    rules: &GradientRules,
    params: &SimulationParams,
) -> Simulation {
    let Some(first_close) = inputs.iter().map(|i| i.close).find(|c| valid_close(*c)) else {
        return Simulation::default();
    };

    let mut timing = TimingPortfolio {
        cash: params.initial_capital,
        shares: 0.0,
    };
    let mut dca = DcaPortfolio::default();
    let mut gradient = GradientPortfolio::default();
    let buy_hold_shares = params.initial_capital / first_close;

    let mut rows = Vec::with_capacity(inputs.len());
    let mut events = Vec::new();

    let mut last_close = first_close;

    for input in inputs {
        let DailyInput { date, close, diff } = *input;
        let mut c_extra_buy = 0.0;
        let mut c_sell_ratio = 0.0;

        if !valid_close(close) {
            warn!(%date, close, "Invalid close, carrying the previous row forward");
            rows.push(snapshot_row(
                date,
                last_close,
                diff,
                &timing,
                &dca,
                &gradient,
                buy_hold_shares,
                params,
            ));
            continue;
        }
        last_close = close;

        // Strategy A
        if let Some(d) = diff {
            if !timing.holding() && d <= -0.01 {
                timing.shares = timing.cash / close;
                timing.cash = 0.0;
                events.push(TradeEvent::TimingBuy { date, diff: d, price: close });
            } else if timing.holding() && d >= rules.max_sell_threshold() {
                timing.cash = timing.shares * close;
                timing.shares = 0.0;
                events.push(TradeEvent::TimingSell {
                    date,
                    diff: d,
                    price: close,
                    total_return: pct_return(timing.cash, params.initial_capital),
                });
            }
        }

        // Strategy B
        dca.contribute(params.daily_base_invest, close);

        // Strategy C
        gradient.contribute_base(params.daily_base_invest, close);
        if let Some(d) = diff {
            if let Some(tier) = rules.buy_tier(d) {
                let shares = gradient.buy_extra(tier.amount, close);
                c_extra_buy = tier.amount;
                events.push(TradeEvent::GradientBuy {
                    date,
                    diff: d,
                    threshold: tier.lower,
                    amount: tier.amount,
                    shares,
                    extra_shares: gradient.extra_shares,
                    extra_invested: gradient.extra_invested,
                });
            }
            if let Some(tier) = rules.sell_tier(d) {
                if let Some(sale) = gradient.sell_extra(tier.ratio, close) {
                    c_sell_ratio = sale.ratio;
                    events.push(TradeEvent::GradientSell {
                        date,
                        diff: d,
                        threshold: tier.threshold,
                        sale,
                    });
                }
            }
        }

        let mut row = snapshot_row(
            date,
            close,
            diff,
            &timing,
            &dca,
            &gradient,
            buy_hold_shares,
            params,
        );
        row.c_extra_buy = c_extra_buy;
        row.c_sell_ratio = c_sell_ratio;
        rows.push(row);
    }

    let summary = rows
        .last()
        .map(|last| SimulationSummary {
            a_asset: last.a_asset,
            a_return: last.a_return,
            b_asset: last.b_asset,
            b_invested: last.b_invested,
            b_return: last.b_return,
            c_asset: last.c_asset,
            c_invested: last.c_invested,
            c_return: last.c_return,
            c_base_shares: gradient.base_shares,
            c_extra_shares: gradient.extra_shares,
            c_cash: gradient.cash,
            buy_hold_asset: last.buy_hold_asset,
            buy_hold_return: last.buy_hold_return,
        })
        .unwrap_or_default();

    Simulation {
        rows,
        events,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i64::from(n))
    }

    fn input(n: u32, close: f64, diff: Option<f64>) -> DailyInput {
        DailyInput { date: day(n), close, diff }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_history() {
        let sim = simulate(&[], &GradientRules::standard(), &SimulationParams::default());
        assert!(sim.rows.is_empty());
        assert_eq!(sim.summary, SimulationSummary::default());
    }

    #[test]
    fn test_missing_diff_still_contributes_base() {
        let inputs = [input(0, 1.0, None), input(1, 2.0, None)];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        assert!(sim.events.is_empty());
        let last = &sim.rows[1];
        assert!(approx(last.b_invested, 100.0));
        assert!(approx(last.b_asset, 150.0)); // 50 + 25 shares at 2.0
        assert!(approx(last.c_asset, last.b_asset));
        assert!(approx(last.a_asset, 10_000.0));
        assert!(approx(last.buy_hold_return, 100.0));
    }

    #[test]
    fn test_gradient_buy_then_sell() {
        let inputs = [
            input(0, 1.0, Some(-0.05)), // bucket (-0.06, -0.05] → 90
            input(1, 1.5, Some(0.10)),  // sell 40%
        ];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        assert_eq!(sim.rows[0].c_extra_buy, 90.0);
        assert_eq!(sim.rows[1].c_sell_ratio, 0.40);

        let sale = sim
            .events
            .iter()
            .find_map(|e| match e {
                TradeEvent::GradientSell { sale, .. } => Some(*sale),
                _ => None,
            })
            .unwrap();
        assert!(approx(sale.shares, 36.0));
        assert!(approx(sale.proceeds, 54.0));
        assert!(approx(sale.recovered, 36.0));
        assert!(approx(sale.realized_return, 50.0));
        assert!(approx(sale.extra_invested_left, 54.0));

        // base 50 + 50/1.5 shares, extra 54 shares left, 54 cash
        let last = &sim.rows[1];
        let held = 50.0 + 50.0 / 1.5 + 54.0;
        assert!(approx(last.c_asset, 54.0 + held * 1.5));
        assert!(approx(last.c_invested, 100.0 + 54.0));
    }

    #[test]
    fn test_timing_strategy_round_trip() {
        let inputs = [
            input(0, 1.0, Some(0.0)),
            input(1, 1.0, Some(-0.01)),
            input(2, 1.2, Some(0.05)),
            input(3, 1.3, Some(0.10)),
        ];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        let timing: Vec<_> = sim
            .events
            .iter()
            .filter(|e| matches!(e, TradeEvent::TimingBuy { .. } | TradeEvent::TimingSell { .. }))
            .collect();
        assert_eq!(timing.len(), 2);
        assert!(approx(sim.summary.a_asset, 13_000.0));
        assert!(approx(sim.summary.a_return, 30.0));
    }

    #[test]
    fn test_invalid_close_keeps_row_alignment() {
        let inputs = [
            input(0, 1.0, Some(-0.05)),
            input(1, 0.0, Some(-0.05)),
            input(2, f64::NAN, Some(0.10)),
            input(3, 2.0, None),
        ];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        assert_eq!(sim.rows.len(), inputs.len());
        for (row, input) in sim.rows.iter().zip(&inputs) {
            assert_eq!(row.date, input.date);
        }

        // invalid rows trade nothing and repeat the previous valuation
        for row in &sim.rows[1..3] {
            assert_eq!(row.close, 1.0);
            assert_eq!(row.c_extra_buy, 0.0);
            assert_eq!(row.c_sell_ratio, 0.0);
            assert!(approx(row.a_asset, sim.rows[0].a_asset));
            assert!(approx(row.b_invested, sim.rows[0].b_invested));
            assert!(approx(row.c_asset, sim.rows[0].c_asset));
            assert!(approx(row.c_return, sim.rows[0].c_return));
        }
        assert!(!sim
            .events
            .iter()
            .any(|e| matches!(e, TradeEvent::GradientSell { .. })));
        assert!(approx(sim.rows[3].b_invested, 100.0));
    }

    #[test]
    fn test_leading_invalid_close_uses_first_valid_price() {
        let inputs = [input(0, -1.0, Some(-0.05)), input(1, 2.0, None)];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        assert_eq!(sim.rows.len(), 2);
        assert_eq!(sim.rows[0].close, 2.0);
        assert!(approx(sim.rows[0].a_asset, 10_000.0));
        assert!(approx(sim.rows[0].b_asset, 0.0));
        assert!(approx(sim.rows[0].buy_hold_asset, 10_000.0));
    }

    #[test]
    fn test_timing_sells_at_exact_top_threshold() {
        let inputs = [input(0, 1.0, Some(-0.01)), input(1, 1.1, Some(0.10))];
        let sim = simulate(&inputs, &GradientRules::standard(), &SimulationParams::default());

        assert!(sim
            .events
            .iter()
            .any(|e| matches!(e, TradeEvent::TimingSell { diff, .. } if *diff == 0.10)));
        assert!(approx(sim.summary.a_asset, 11_000.0));
    }

    #[test]
    fn test_sell_without_extra_position_is_noop() {
        let mut p = GradientPortfolio::default();
        assert_eq!(p.sell_extra(0.4, 2.0), None);
        p.contribute_base(50.0, 1.0);
        assert_eq!(p.sell_extra(0.4, 2.0), None);
        assert_eq!(p.base_shares, 50.0);
    }
}
