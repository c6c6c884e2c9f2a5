//! Interactive chart fragments for the dashboard.
//!
//! A [`Figure`] is plain plotly.js JSON; [`Figure::to_embed_html`] wraps it in
//! a `<div>` that loads plotly from the CDN, so the fragment can be pasted
//! into any page.

use board_common::Result;
use serde_json::{json, Value};

use crate::analysis::{breakout_segments, BasisRow, Breakout};
use crate::data::{Candle, Instrument};

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const UP_COLOR: &str = "#27ae60";
const DOWN_COLOR: &str = "#e74c3c";
const BREAKOUT_UP_COLORS: [&str; 5] = ["#33FF57", "#3357FF", "#4ECDC4", "#45B7D1", "#96CEB4"];
const BREAKOUT_DOWN_COLORS: [&str; 5] = ["#FF5733", "#FFC300", "#FF6B6B", "#FF8E53", "#FFB74D"];

/// Traces plus layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    traces: Vec<Value>,
    layout: Value,
}

impl Figure {
    pub fn new(layout: Value) -> Self {
        Self {
            traces: Vec::new(),
            layout,
        }
    }

    pub fn add_trace(&mut self, trace: Value) {
        self.traces.push(trace);
    }

    pub fn traces(&self) -> &[Value] {
        &self.traces
    }

    pub fn layout(&self) -> &Value {
        &self.layout
    }

    /// Embeddable `<div>` fragment.
    pub fn to_embed_html(&self, div_id: &str) -> Result<String> {
        let data = script_json(&Value::Array(self.traces.clone()))?;
        let layout = script_json(&self.layout)?;
        Ok(format!(
            r#"<div>
    <script charset="utf-8" src="{cdn}"></script>
    <div id="{id}" class="plotly-graph-div" style="height:100%; width:100%;"></div>
    <script type="text/javascript">
        window.PLOTLYENV = window.PLOTLYENV || {{}};
        if (document.getElementById("{id}")) {{
            Plotly.newPlot("{id}", {data}, {layout}, {{"responsive": true}});
        }};
    </script>
</div>"#,
            cdn = PLOTLY_CDN,
            id = div_id,
            data = data,
            layout = layout,
        ))
    }
}

/// JSON safe to inline inside a `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn line(color: &str, width: f64) -> Value {
    json!({ "color": color, "width": width })
}

fn dashed(color: &str) -> Value {
    json!({ "color": color, "width": 1, "dash": "dash" })
}

// ============================================================================
// Basis chart
// ============================================================================

/// Basis, its moving average and Bollinger bands, with highlighted breakouts.
pub fn basis_figure(name: &str, rows: &[BasisRow], ma_window: usize, width: u32, height: u32) -> Figure {
    let x: Vec<String> = rows.iter().map(|r| r.date.format("%Y-%m-%d").to_string()).collect();
    let column = |f: fn(&BasisRow) -> Option<f64>| rows.iter().map(f).collect::<Vec<_>>();

    let mut fig = Figure::new(json!({
        "title": { "text": format!("{name}股指期货基差分析 (含MA{ma_window}及布林带)") },
        "xaxis": {
            "title": { "text": "时间" },
            "rangeslider": { "visible": true },
            "rangeselector": {
                "buttons": [
                    { "count": 1, "label": "1月", "step": "month", "stepmode": "backward" },
                    { "count": 3, "label": "3月", "step": "month", "stepmode": "backward" },
                    { "count": 6, "label": "6月", "step": "month", "stepmode": "backward" },
                    { "count": 1, "label": "1年", "step": "year", "stepmode": "backward" },
                    { "step": "all" }
                ]
            }
        },
        "yaxis": { "title": { "text": "基差" } },
        "width": width,
        "height": height,
        "template": "plotly_white",
        "hovermode": "x unified",
        "shapes": [{
            "type": "line",
            "xref": "paper", "x0": 0, "x1": 1,
            "yref": "y", "y0": 0, "y1": 0,
            "line": { "color": "black", "width": 1 }
        }]
    }));

    fig.add_trace(json!({
        "type": "scatter", "mode": "lines", "name": format!("{name}基差"),
        "x": x, "y": column(|r| Some(r.basis)),
        "line": line("#5386E4", 1.5), "opacity": 0.9
    }));
    fig.add_trace(json!({
        "type": "scatter", "mode": "lines", "name": format!("基差 {ma_window}日均线"),
        "x": x, "y": column(|r| r.ma),
        "line": line("#F49E4C", 2.0), "opacity": 0.8
    }));
    fig.add_trace(json!({
        "type": "scatter", "mode": "lines", "name": "布林带中轨",
        "x": x, "y": column(|r| r.mid),
        "line": dashed("#7FB069"), "opacity": 0.6
    }));
    fig.add_trace(json!({
        "type": "scatter", "mode": "lines", "name": "布林带上轨",
        "x": x, "y": column(|r| r.upper),
        "line": dashed("#7FB069"), "opacity": 0.6
    }));
    fig.add_trace(json!({
        "type": "scatter", "mode": "lines", "name": "布林带下轨",
        "x": x, "y": column(|r| r.lower),
        "line": dashed("#d0001f"), "opacity": 0.6,
        "fill": "tonexty", "fillcolor": "rgba(127, 176, 105, 0.1)"
    }));

    for (side, label, palette) in [
        (Breakout::Upper, "突破上轨", BREAKOUT_UP_COLORS),
        (Breakout::Lower, "突破下轨", BREAKOUT_DOWN_COLORS),
    ] {
        for (i, segment) in breakout_segments(rows, side).into_iter().enumerate() {
            // single-session breakouts are not drawn
            if segment.len() < 2 {
                continue;
            }
            let visible: Value = if i == 0 { json!(true) } else { json!("legendonly") };
            fig.add_trace(json!({
                "type": "scatter", "mode": "lines",
                "name": format!("{label} #{}", i + 1),
                "x": &x[segment.clone()],
                "y": rows[segment].iter().map(|r| r.basis).collect::<Vec<_>>(),
                "line": line(palette[i % palette.len()], 3.0),
                "opacity": 0.9,
                "visible": visible
            }));
        }
    }

    fig
}

// ============================================================================
// Daily candlestick chart
// ============================================================================

/// Candlesticks with colored volume bars on a secondary axis.
pub fn candlestick_figure(instrument: &Instrument, candles: &[Candle], width: u32, height: u32) -> Figure {
    let x: Vec<String> = candles.iter().map(|c| c.date.format("%Y-%m-%d").to_string()).collect();
    let bar_colors: Vec<&str> = candles
        .iter()
        .map(|c| if c.close >= c.open { UP_COLOR } else { DOWN_COLOR })
        .collect();

    let mut fig = Figure::new(json!({
        "title": { "text": format!("{}({}) 日K线图", instrument.name, instrument.code) },
        "xaxis": {
            "title": { "text": "日期" },
            "rangeslider": { "visible": false },
            "rangeselector": {
                "buttons": [
                    { "count": 30, "label": "30天", "step": "day", "stepmode": "backward" },
                    { "count": 60, "label": "60天", "step": "day", "stepmode": "backward" },
                    { "count": 90, "label": "90天", "step": "day", "stepmode": "backward" },
                    { "count": 180, "label": "180天", "step": "day", "stepmode": "backward" },
                    { "step": "all" }
                ]
            }
        },
        "yaxis": { "title": { "text": "价格" } },
        "yaxis2": { "title": { "text": "成交量" }, "overlaying": "y", "side": "right", "showgrid": false },
        "width": width,
        "height": height,
        "template": "plotly_white",
        "hovermode": "x unified"
    }));

    fig.add_trace(json!({
        "type": "candlestick",
        "name": instrument.name,
        "x": x,
        "open": candles.iter().map(|c| c.open).collect::<Vec<_>>(),
        "high": candles.iter().map(|c| c.high).collect::<Vec<_>>(),
        "low": candles.iter().map(|c| c.low).collect::<Vec<_>>(),
        "close": candles.iter().map(|c| c.close).collect::<Vec<_>>(),
        "increasing": { "line": { "color": UP_COLOR } },
        "decreasing": { "line": { "color": DOWN_COLOR } }
    }));
    fig.add_trace(json!({
        "type": "bar",
        "name": "成交量",
        "x": x,
        "y": candles.iter().map(|c| c.volume).collect::<Vec<_>>(),
        "yaxis": "y2",
        "marker": { "color": bar_colors },
        "opacity": 0.6
    }));

    fig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InstrumentKind;
    use chrono::{Duration, NaiveDate};

    fn basis_rows(values: &[(f64, Option<f64>, Option<f64>)]) -> Vec<BasisRow> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, (basis, upper, lower))| BasisRow {
                date: start + Duration::days(i as i64),
                spot: 3000.0,
                future: 3000.0 + basis,
                basis: *basis,
                ma: None,
                mid: Some(0.0),
                upper: *upper,
                lower: *lower,
            })
            .collect()
    }

    #[test]
    fn test_basis_figure_core_traces() {
        let rows = basis_rows(&[(1.0, Some(5.0), Some(-5.0)); 3]);
        let fig = basis_figure("沪深300", &rows, 60, 1000, 600);

        assert_eq!(fig.traces().len(), 5);
        assert_eq!(fig.traces()[0]["name"], "沪深300基差");
        assert_eq!(fig.traces()[1]["name"], "基差 60日均线");
        assert_eq!(fig.traces()[4]["fill"], "tonexty");
        assert_eq!(
            fig.layout()["title"]["text"],
            "沪深300股指期货基差分析 (含MA60及布林带)"
        );
        // missing moving average serializes as null
        assert!(fig.traces()[1]["y"][0].is_null());
    }

    #[test]
    fn test_basis_figure_breakout_segments() {
        let rows = basis_rows(&[
            (6.0, Some(5.0), Some(-5.0)),
            (7.0, Some(5.0), Some(-5.0)),
            (0.0, Some(5.0), Some(-5.0)),
            (6.0, Some(5.0), Some(-5.0)),
            (0.0, Some(5.0), Some(-5.0)),
            (6.0, Some(5.0), Some(-5.0)),
            (6.0, Some(5.0), Some(-5.0)),
        ]);
        let fig = basis_figure("沪深300", &rows, 60, 1000, 600);

        let breakouts: Vec<_> = fig.traces()[5..].to_vec();
        assert_eq!(breakouts.len(), 2);
        assert_eq!(breakouts[0]["name"], "突破上轨 #1");
        assert_eq!(breakouts[0]["visible"], true);
        assert_eq!(breakouts[1]["name"], "突破上轨 #3");
        assert_eq!(breakouts[1]["visible"], "legendonly");
    }

    #[test]
    fn test_candlestick_volume_colors() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let candles = vec![
            Candle { date: day, open: 1.0, high: 1.2, low: 0.9, close: 1.1, volume: 100.0, amount: 0.0 },
            Candle { date: day + Duration::days(1), open: 1.1, high: 1.1, low: 0.9, close: 1.0, volume: 80.0, amount: 0.0 },
        ];
        let inst = Instrument::new("600900", "长江电力", InstrumentKind::Stock);
        let fig = candlestick_figure(&inst, &candles, 1000, 600);

        assert_eq!(fig.traces()[1]["marker"]["color"][0], UP_COLOR);
        assert_eq!(fig.traces()[1]["marker"]["color"][1], DOWN_COLOR);
        assert_eq!(fig.layout()["title"]["text"], "长江电力(600900) 日K线图");
    }

    #[test]
    fn test_embed_html_escapes_script_close() {
        let mut fig = Figure::new(json!({}));
        fig.add_trace(json!({ "name": "</script>" }));
        let html = fig.to_embed_html("chart-1").unwrap();
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("Plotly.newPlot(\"chart-1\""));
        assert!(!html.contains("\"</script>\""));
    }
}
