//! Gradient buy table and sell thresholds.

use serde::Serialize;

/// Contributions step by 10 per percentage point of underperformance.
const BUY_STEP: f64 = 10.0;
const BUY_BASE_AMOUNT: f64 = 50.0;
/// Number of one-point buckets between -1% and -30%.
const BUY_TIERS: u32 = 30;

/// Buy `amount` when `upper < diff <= lower`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuyTier {
    pub lower: f64,
    pub upper: f64,
    pub amount: f64,
}

impl BuyTier {
    pub fn matches(&self, diff: f64) -> bool {
        self.upper < diff && diff <= self.lower
    }
}

/// Sell `ratio` of the extra position once `diff >= threshold`.
///
/// The comparison is inclusive, unlike a strict `diff > threshold`: a
/// differential of exactly 0.07 sells 10%, and exactly 0.10 sells 40%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SellTier {
    pub threshold: f64,
    pub ratio: f64,
}

/// The buy table and sell map.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientRules {
    /// Checked in order; the first match wins.
    buy: Vec<BuyTier>,
    /// Sorted by threshold, highest first.
    sell: Vec<SellTier>,
}

impl Default for GradientRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl GradientRules {
    /// Buckets `(-(k+2)%, -(k+1)%]` buy `50 + 10k` for k = 0..29; below -30%
    /// the last bucket stays open at 340. Sales take 10/20/30/40% of the
    /// extra position from +7/+8/+9/+10%.
    pub fn standard() -> Self {
        let buy = (0..BUY_TIERS)
            .rev()
            .map(|k| {
                let lower = -f64::from(k + 1) / 100.0;
                let upper = if k + 1 == BUY_TIERS {
                    f64::NEG_INFINITY
                } else {
                    -f64::from(k + 2) / 100.0
                };
                BuyTier {
                    lower,
                    upper,
                    amount: BUY_BASE_AMOUNT + BUY_STEP * f64::from(k),
                }
            })
            .collect();

        let sell = vec![
            SellTier { threshold: 0.07, ratio: 0.10 },
            SellTier { threshold: 0.08, ratio: 0.20 },
            SellTier { threshold: 0.09, ratio: 0.30 },
            SellTier { threshold: 0.10, ratio: 0.40 },
        ];

        Self::new(buy, sell)
    }

    /// Custom tables; the sell tiers may be given in any order.
    pub fn new(buy: Vec<BuyTier>, mut sell: Vec<SellTier>) -> Self {
        sell.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Self { buy, sell }
    }

    pub fn buy_tiers(&self) -> &[BuyTier] {
        &self.buy
    }

    pub fn sell_tiers(&self) -> &[SellTier] {
        &self.sell
    }

    /// The bucket a differential falls into. NaN never matches.
    pub fn buy_tier(&self, diff: f64) -> Option<&BuyTier> {
        self.buy.iter().find(|t| t.matches(diff))
    }

    /// Extra contribution for a differential, 0 outside the table.
    pub fn buy_amount(&self, diff: f64) -> f64 {
        self.buy_tier(diff).map_or(0.0, |t| t.amount)
    }

    /// The highest threshold the differential has reached, inclusive.
    pub fn sell_tier(&self, diff: f64) -> Option<&SellTier> {
        self.sell.iter().find(|t| diff >= t.threshold)
    }

    /// Share of the extra position to sell, 0 below every threshold.
    pub fn sell_ratio(&self, diff: f64) -> f64 {
        self.sell_tier(diff).map_or(0.0, |t| t.ratio)
    }

    /// Lowest sell threshold; the start of the overvalued zone.
    pub fn min_sell_threshold(&self) -> f64 {
        self.sell.last().map_or(f64::INFINITY, |t| t.threshold)
    }

    /// Highest sell threshold; the timing strategy sells out once the
    /// differential reaches it, inclusive.
    pub fn max_sell_threshold(&self) -> f64 {
        self.sell.first().map_or(f64::INFINITY, |t| t.threshold)
    }
}
