//! Today's traffic-light signal.

use serde::Serialize;

use super::gradient::GradientRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    InsufficientData,
    /// Underperforming; extra buy
    Green,
    /// Neutral band
    Yellow,
    /// Outperforming past the first sell threshold
    Red,
}

impl SignalLevel {
    /// Badge class used by the strategy fragment.
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Green => "status-green",
            Self::Red => "status-red",
            Self::Yellow | Self::InsufficientData => "status-yellow",
        }
    }
}

/// Status line plus the suggested operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub level: SignalLevel,
    pub status: String,
    pub operation: String,
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

fn format_ratio(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Classify the latest differential.
pub fn classify(
    diff: Option<f64>,
    rules: &GradientRules,
    daily_base_invest: f64,
    return_window: usize,
) -> Signal {
    let base = format_amount(daily_base_invest);
    let Some(d) = diff.filter(|d| d.is_finite()) else {
        return Signal {
            level: SignalLevel::InsufficientData,
            status: "数据不足".to_string(),
            operation: format!("无法判断（需至少{return_window}天数据）"),
        };
    };

    let buy = rules.buy_amount(d);
    let sell = rules.sell_ratio(d);
    let sell_suggest = if sell > 0.0 {
        format!(" + 卖出多买份额的{}", format_ratio(sell))
    } else {
        String::new()
    };

    if buy > 0.0 {
        Signal {
            level: SignalLevel::Green,
            status: format!("绿灯（低估{:.1}%）", d.abs() * 100.0),
            operation: format!(
                "基础定投{base}元 + 额外多投{}元{sell_suggest}",
                format_amount(buy)
            ),
        }
    } else if d >= rules.min_sell_threshold() {
        Signal {
            level: SignalLevel::Red,
            status: format!("红灯（高估{:.1}%）", d * 100.0),
            operation: format!("仅基础定投{base}元{sell_suggest}"),
        }
    } else {
        Signal {
            level: SignalLevel::Yellow,
            status: "黄灯（适中）".to_string(),
            operation: format!("仅基础定投{base}元，不操作多买份额"),
        }
    }
}
