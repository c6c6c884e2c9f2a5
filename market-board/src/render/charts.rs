//! Static SVG charts for the advisor.
//!
//! The x axis is the session index; tick labels map back to dates so
//! non-trading days leave no gaps.

use std::ops::Range;
use std::path::Path;

use board_common::config::AdvisorConfig;
use board_common::{Error, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::rolling_mean;
use crate::data::{Candle, Instrument};
use crate::strategy::{GradientRules, SimulationRow};

const STRATEGY_CHART_SIZE: (u32, u32) = (1600, 1000);
const KLINE_CHART_SIZE: (u32, u32) = (1000, 500);

const FONT: &str = "sans-serif";
const GRID: RGBColor = RGBColor(235, 235, 235);
/// A-share convention: red up, green down.
const CANDLE_UP: RGBColor = RGBColor(0xe7, 0x4c, 0x3c);
const CANDLE_DOWN: RGBColor = RGBColor(0x27, 0xae, 0x60);
const MA_COLORS: [(usize, RGBColor); 4] = [
    (5, RGBColor(0x1f, 0x77, 0xb4)),
    (10, RGBColor(0xff, 0x7f, 0x0e)),
    (20, RGBColor(0x2c, 0xa0, 0x2c)),
    (60, RGBColor(0xd6, 0x27, 0x28)),
];
const SELL_COLORS: [RGBColor; 4] = [
    RGBColor(255, 165, 0),
    RGBColor(255, 140, 0),
    RGBColor(255, 0, 0),
    RGBColor(139, 0, 0),
];

fn chart_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Chart(e.to_string())
}

struct Line {
    label: String,
    color: RGBColor,
    width: u32,
    points: Vec<(f64, f64)>,
}

impl Line {
    fn new(label: impl Into<String>, color: RGBColor, width: u32, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            color,
            width,
            points,
        }
    }
}

/// Min/max of the values padded by 5%; `0..1` when there is nothing finite.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad)..(hi + pad)
}

fn x_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

fn x_label(labels: &[String], x: f64) -> String {
    let i = x.round();
    if i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

/// One panel: line series, horizontal reference lines and a legend.
fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    caption: Option<&str>,
    y_desc: &str,
    labels: &[String],
    lines: &[Line],
    hlines: &[(f64, RGBColor)],
    legend: SeriesLabelPosition,
) -> Result<()> {
    let n = labels.len();
    let y_range = padded_range(
        lines
            .iter()
            .flat_map(|l| l.points.iter().map(|p| p.1))
            .chain(hlines.iter().map(|h| h.0)),
    );

    let mut builder = ChartBuilder::on(area);
    builder.margin(12).x_label_area_size(30).y_label_area_size(70);
    if let Some(caption) = caption {
        builder.caption(caption, (FONT, 24));
    }
    let mut chart = builder
        .build_cartesian_2d(x_range(n), y_range)
        .map_err(chart_err)?;

    let fmt = |x: &f64| x_label(labels, *x);
    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&fmt)
        .y_desc(y_desc)
        .light_line_style(GRID.stroke_width(1))
        .draw()
        .map_err(chart_err)?;

    let x_end = n.saturating_sub(1) as f64;
    for (y, color) in hlines {
        chart
            .draw_series(LineSeries::new(vec![(0.0, *y), (x_end, *y)], color.stroke_width(1)))
            .map_err(chart_err)?;
    }

    for line in lines {
        let style = line.color.stroke_width(line.width);
        chart
            .draw_series(LineSeries::new(line.points.iter().copied(), style))
            .map_err(chart_err)?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .position(legend)
        .label_font((FONT, 13))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)?;
    Ok(())
}

/// Color of the k-th buy threshold line, orange at -1% fading to black at -30%.
fn buy_line_color(k: usize, total: usize) -> RGBColor {
    let t = if total > 1 { k as f64 / (total - 1) as f64 } else { 0.0 };
    let fade = |c: u8| (f64::from(c) * (1.0 - t)).round() as u8;
    RGBColor(fade(255), fade(165), fade(0))
}

// ============================================================================
// Strategy chart
// ============================================================================

/// Price, strategy returns and the differential with its moving average and
/// gradient thresholds, stacked in three panels.
///
/// Only sessions where the moving average is defined are drawn.
pub fn render_strategy_chart(
    path: &Path,
    rows: &[SimulationRow],
    diff_ma: &[Option<f64>],
    rules: &GradientRules,
    config: &AdvisorConfig,
) -> Result<()> {
    let plotted: Vec<(&SimulationRow, f64, f64)> = rows
        .iter()
        .zip(diff_ma)
        .filter_map(|(row, ma)| Some((row, row.diff?, (*ma)?)))
        .collect();
    if plotted.is_empty() {
        return Err(Error::NoData(format!(
            "no session has a {}-day differential average",
            config.ma_window
        )));
    }

    let labels: Vec<String> = plotted
        .iter()
        .map(|(row, _, _)| row.date.format("%Y-%m-%d").to_string())
        .collect();
    let series = |f: &dyn Fn(&SimulationRow, f64, f64) -> f64| -> Vec<(f64, f64)> {
        plotted
            .iter()
            .enumerate()
            .map(|(i, (row, diff, ma))| (i as f64, f(row, *diff, *ma)))
            .collect()
    };

    let root = SVGBackend::new(path, STRATEGY_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    let (price_area, rest) = root.split_vertically(330);
    let (return_area, diff_area) = rest.split_vertically(335);

    let etf = &config.etf;
    let title = format!(
        "{}收盘价 + 三种定投策略收益对比（{}日收益差 | {}日均线 | 梯度买卖）",
        etf.name, config.return_window, config.ma_window
    );
    draw_panel(
        &price_area,
        Some(&title),
        "收盘价",
        &labels,
        &[Line::new(
            format!("{}（{}）收盘价", etf.name, etf.code),
            RGBColor(0x2c, 0xa0, 0x2c),
            2,
            series(&|row, _, _| row.close),
        )],
        &[],
        SeriesLabelPosition::UpperLeft,
    )?;

    let base = config.daily_base_invest;
    draw_panel(
        &return_area,
        None,
        "累计收益率（%）",
        &labels,
        &[
            Line::new("方法A：择时买卖收益（%）", RGBColor(0xff, 0x7f, 0x0e), 2, series(&|r, _, _| r.a_return)),
            Line::new(format!("方法B：每日定投{base}元收益（%）"), RGBColor(0x1f, 0x77, 0xb4), 2, series(&|r, _, _| r.b_return)),
            Line::new("方法C：梯度买卖收益（%）", RGBColor(0xd6, 0x27, 0x28), 2, series(&|r, _, _| r.c_return)),
            Line::new("参考：买入持有收益（%）", RGBColor(0x94, 0x67, 0xbd), 1, series(&|r, _, _| r.buy_hold_return)),
        ],
        &[(0.0, BLACK)],
        SeriesLabelPosition::UpperLeft,
    )?;

    let diffs = series(&|_, diff, _| diff * 100.0);
    let mas = series(&|_, _, ma| ma * 100.0);
    let visible = padded_range(diffs.iter().chain(&mas).map(|p| p.1));

    // deeper buy thresholds are drawn only once the data reaches them
    let buy_tiers = rules.buy_tiers();
    let mut hlines: Vec<(f64, RGBColor)> = buy_tiers
        .iter()
        .rev()
        .enumerate()
        .filter(|(k, tier)| *k == 0 || tier.lower * 100.0 >= visible.start)
        .map(|(k, tier)| (tier.lower * 100.0, buy_line_color(k, buy_tiers.len())))
        .collect();
    let mut sells: Vec<_> = rules.sell_tiers().to_vec();
    sells.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
    hlines.extend(
        sells
            .iter()
            .zip(SELL_COLORS.iter().cycle())
            .map(|(tier, color)| (tier.threshold * 100.0, *color)),
    );

    draw_panel(
        &diff_area,
        None,
        &format!("{}日收益差（%）", config.return_window),
        &labels,
        &[
            Line::new(
                format!("{}日收益差（{}-{}）", config.return_window, etf.name, config.benchmark.name),
                RGBColor(0x1f, 0x77, 0xb4),
                2,
                diffs,
            ),
            Line::new(
                format!("{}日收益差{}日均线", config.return_window, config.ma_window),
                RGBColor(0x94, 0x67, 0xbd),
                2,
                mas,
            ),
        ],
        &hlines,
        SeriesLabelPosition::UpperRight,
    )?;

    root.present().map_err(chart_err)?;
    Ok(())
}

// ============================================================================
// Index kline chart
// ============================================================================

/// Candlesticks for the last `days` sessions with MA5/10/20/60 computed over
/// the full history.
pub fn render_index_kline(
    path: &Path,
    instrument: &Instrument,
    candles: &[Candle],
    days: usize,
) -> Result<()> {
    if candles.is_empty() {
        return Err(Error::NoData(format!("{} has no daily bars", instrument.code)));
    }
    let closes: Vec<Option<f64>> = candles.iter().map(|c| Some(c.close)).collect();
    let start = candles.len().saturating_sub(days);
    let shown = &candles[start..];

    let averages: Vec<(usize, RGBColor, Vec<(f64, f64)>)> = MA_COLORS
        .iter()
        .map(|(window, color)| {
            let ma = rolling_mean(&closes, *window);
            let points = ma[start..]
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
                .collect();
            (*window, *color, points)
        })
        .collect();

    let labels: Vec<String> = shown.iter().map(|c| c.date.format("%m-%d").to_string()).collect();
    let y_range = padded_range(
        shown
            .iter()
            .flat_map(|c| [c.low, c.high])
            .chain(averages.iter().flat_map(|(_, _, pts)| pts.iter().map(|p| p.1))),
    );

    let root = SVGBackend::new(path, KLINE_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let caption = format!("{} ({}) 最近{}日K线", instrument.name, instrument.code, shown.len());
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (FONT, 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range(shown.len()), y_range)
        .map_err(chart_err)?;

    let fmt = |x: &f64| x_label(&labels, *x);
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&fmt)
        .light_line_style(GRID.stroke_width(1))
        .draw()
        .map_err(chart_err)?;

    let body_width = ((KLINE_CHART_SIZE.0 as usize / shown.len().max(1)) as u32 * 3 / 5).max(1);
    chart
        .draw_series(shown.iter().enumerate().map(|(i, c)| {
            CandleStick::new(
                i as f64,
                c.open,
                c.high,
                c.low,
                c.close,
                CANDLE_UP.filled(),
                CANDLE_DOWN.filled(),
                body_width,
            )
        }))
        .map_err(chart_err)?;

    for (window, color, points) in averages {
        let style = color.stroke_width(1);
        chart
            .draw_series(LineSeries::new(points, style))
            .map_err(chart_err)?
            .label(format!("MA{window}"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font((FONT, 11))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}
