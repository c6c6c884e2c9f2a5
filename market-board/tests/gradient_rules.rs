//! Behavior of the gradient strategy tables and the portfolio they drive.

use test_case::test_case;

use market_board::analysis::return_differential;
use market_board::strategy::{classify, GradientPortfolio, GradientRules, SignalLevel};

#[test_case(-0.01, 50.0 ; "first bucket upper edge")]
#[test_case(-0.015, 50.0 ; "inside first bucket")]
#[test_case(-0.02, 60.0 ; "second bucket upper edge")]
#[test_case(-0.05, 90.0 ; "five points under")]
#[test_case(-0.295, 330.0 ; "second to last bucket")]
#[test_case(-0.30, 340.0 ; "last bucket edge")]
#[test_case(-0.45, 340.0 ; "last bucket is open ended")]
fn test_buy_amount(diff: f64, expected: f64) {
    assert_eq!(GradientRules::standard().buy_amount(diff), expected);
}

#[test_case(0.0 ; "flat")]
#[test_case(-0.005 ; "less than a point under")]
#[test_case(0.03 ; "outperforming")]
#[test_case(f64::NAN ; "nan")]
fn test_no_buy(diff: f64) {
    let rules = GradientRules::standard();
    assert_eq!(rules.buy_amount(diff), 0.0);
    assert!(rules.buy_tier(diff).is_none());
}

#[test_case(0.0, 0.0 ; "flat")]
#[test_case(0.069, 0.0 ; "below first threshold")]
#[test_case(0.07, 0.10 ; "first threshold is inclusive")]
#[test_case(0.075, 0.10 ; "between first and second")]
#[test_case(0.085, 0.20 ; "between second and third")]
#[test_case(0.09, 0.30 ; "third threshold")]
#[test_case(0.10, 0.40 ; "top threshold")]
#[test_case(0.25, 0.40 ; "far above the top")]
fn test_sell_ratio(diff: f64, expected: f64) {
    assert_eq!(GradientRules::standard().sell_ratio(diff), expected);
}

#[test]
fn test_buy_amount_grows_as_diff_falls() {
    let rules = GradientRules::standard();
    let amounts: Vec<f64> = (1..=35)
        .map(|pct| rules.buy_amount(-f64::from(pct) / 100.0 - 0.001))
        .collect();
    assert!(amounts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(amounts.first(), Some(&50.0));
    assert_eq!(amounts.last(), Some(&340.0));
}

#[test]
fn test_sale_never_touches_base_position() {
    let mut portfolio = GradientPortfolio::default();
    portfolio.contribute_base(50.0, 1.0);
    portfolio.buy_extra(200.0, 1.0);

    for _ in 0..20 {
        portfolio.sell_extra(0.40, 1.2);
    }

    assert_eq!(portfolio.base_shares, 50.0);
    assert_eq!(portfolio.base_invested, 50.0);
    assert!(portfolio.extra_shares > 0.0);
    assert!(portfolio.extra_invested >= 0.0);
    assert!(portfolio.extra_shares < 200.0 * 0.6f64.powi(19));
}

#[test]
fn test_recovered_cost_follows_ratio() {
    let mut portfolio = GradientPortfolio::default();
    portfolio.buy_extra(100.0, 2.0);

    let sale = portfolio.sell_extra(0.10, 3.0).unwrap();
    assert!((sale.recovered - 10.0).abs() < 1e-9);
    assert!((sale.proceeds - 15.0).abs() < 1e-9);
    assert!((sale.realized_return - 50.0).abs() < 1e-9);
    assert!((portfolio.extra_invested - 90.0).abs() < 1e-9);
    assert!((portfolio.cash - 15.0).abs() < 1e-9);
}

#[test]
fn test_signal_follows_differential() {
    let etf: Vec<f64> = (0..=40).map(|i| 1.0 + f64::from(i) * 0.001).collect();
    let flat = vec![1.0; etf.len()];
    let diff = return_differential(&etf, &flat, 40);

    assert!(diff[..40].iter().all(Option::is_none));
    let latest = diff[40].unwrap();
    assert!((latest - 0.04).abs() < 1e-9);

    let signal = classify(Some(latest), &GradientRules::standard(), 50.0, 40);
    assert_eq!(signal.level, SignalLevel::Yellow);

    let signal = classify(Some(-0.045), &GradientRules::standard(), 50.0, 40);
    assert_eq!(signal.level, SignalLevel::Green);
    assert!(signal.operation.contains("额外多投80元"));
}
