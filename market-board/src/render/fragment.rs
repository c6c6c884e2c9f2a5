//! Advisor HTML: the dashboard fragment and the email body.

use chrono::NaiveDate;
use html_escape::encode_text;
use serde::Serialize;

use crate::strategy::Signal;

/// One major index with its chart file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub name: String,
    pub code: String,
    pub close: f64,
    /// Daily change as a ratio
    pub change: f64,
    /// Chart file name relative to the output directory
    pub chart: Option<String>,
}

/// A session of the recent-data table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecentRow {
    pub date: NaiveDate,
    pub etf_close: f64,
    pub benchmark_close: f64,
    pub diff: Option<f64>,
}

/// Everything the advisor shows for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisorReport {
    pub date: NaiveDate,
    pub etf_name: String,
    pub benchmark_name: String,
    pub return_window: usize,
    pub diff: Option<f64>,
    pub etf_close: f64,
    pub benchmark_close: f64,
    pub signal: Signal,
    /// Strategy chart file name relative to the output directory
    pub chart_file: Option<String>,
    pub recent: Vec<RecentRow>,
    pub indices: Vec<IndexSummary>,
}

/// `text-red` for gains, `text-green` for losses.
fn change_class(value: Option<f64>) -> &'static str {
    match value {
        Some(v) if v > 0.0 => "text-red",
        Some(v) if v < 0.0 => "text-green",
        _ => "",
    }
}

fn pct_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}%"))
}

struct RecentCells {
    date: String,
    etf_close: String,
    etf_change: Option<f64>,
    benchmark_close: String,
    benchmark_change: Option<f64>,
    diff_pct: Option<f64>,
}

/// Percent change vs the previous row of the table; the first row has none.
fn recent_cells(rows: &[RecentRow]) -> Vec<RecentCells> {
    let pct = |cur: f64, prev: Option<f64>| {
        prev.filter(|p| *p != 0.0).map(|p| (cur / p - 1.0) * 100.0)
    };
    let mut prev: Option<&RecentRow> = None;
    rows.iter()
        .map(|row| {
            let cells = RecentCells {
                date: row.date.format("%Y-%m-%d").to_string(),
                etf_close: format!("{:.3}", row.etf_close),
                etf_change: pct(row.etf_close, prev.map(|p| p.etf_close)),
                benchmark_close: format!("{:.3}", row.benchmark_close),
                benchmark_change: pct(row.benchmark_close, prev.map(|p| p.benchmark_close)),
                diff_pct: row.diff.map(|d| d * 100.0),
            };
            prev = Some(row);
            cells
        })
        .collect()
}

fn diff_text(diff: Option<f64>) -> String {
    diff.map_or_else(|| "-".to_string(), |d| format!("{:.2}%", d * 100.0))
}

// ============================================================================
// Dashboard fragment
// ============================================================================

fn indices_section(indices: &[IndexSummary]) -> String {
    if indices.is_empty() {
        return String::new();
    }
    let mut html = String::from(
        r#"
        <div class="sub-card">
            <div class="sub-header">🌍 今日三大指数行情</div>
            <div class="summary-grid">"#,
    );
    for item in indices {
        let class = if item.change > 0.0 { "text-red" } else { "text-green" };
        html.push_str(&format!(
            r#"
                <div class="summary-item">
                    <div class="label">{}</div>
                    <div class="value">{:.2}</div>
                    <div class="label {}">{:+.2}%</div>
                </div>"#,
            encode_text(&item.name),
            item.close,
            class,
            item.change * 100.0
        ));
    }
    html.push_str(
        r#"
            </div>
            <div style="display: grid; grid-template-columns: repeat(auto-fit, minmax(300px, 1fr)); gap: 15px;">"#,
    );
    for chart in indices.iter().filter_map(|i| i.chart.as_deref()) {
        html.push_str(&format!(
            r#"
                <div style="text-align: center;"><img src="{}" style="width: 100%; border-radius: 8px;"></div>"#,
            encode_text(chart)
        ));
    }
    html.push_str("\n            </div>\n        </div>");
    html
}

fn recent_table(rows: &[RecentRow], report: &AdvisorReport) -> String {
    let mut html = format!(
        r#"
            <div class="table-container">
                <table class="data-table">
                    <thead>
                        <tr>
                            <th>日期</th>
                            <th>{etf}收盘价</th>
                            <th>涨跌幅(%)</th>
                            <th>{bench}收盘价</th>
                            <th>涨跌幅(%)</th>
                            <th>收益差(%)</th>
                        </tr>
                    </thead>
                    <tbody>"#,
        etf = encode_text(&report.etf_name),
        bench = encode_text(&report.benchmark_name),
    );
    for cells in recent_cells(rows) {
        html.push_str(&format!(
            r#"
                        <tr>
                            <td>{}</td>
                            <td>{}</td>
                            <td class="{}">{}</td>
                            <td>{}</td>
                            <td class="{}">{}</td>
                            <td class="{}">{}</td>
                        </tr>"#,
            cells.date,
            cells.etf_close,
            change_class(cells.etf_change),
            pct_cell(cells.etf_change),
            cells.benchmark_close,
            change_class(cells.benchmark_change),
            pct_cell(cells.benchmark_change),
            change_class(cells.diff_pct),
            pct_cell(cells.diff_pct),
        ));
    }
    html.push_str("\n                    </tbody>\n                </table>\n            </div>");
    html
}

/// The `strategy_fragment.html` card embedded by the dashboard.
pub fn strategy_fragment(report: &AdvisorReport) -> String {
    let window = report.return_window;
    let chart = report.chart_file.as_deref().map_or_else(String::new, |file| {
        format!(
            r#"
        <div class="sub-card">
            <div class="sub-header">📈 {window}日收益差趋势图</div>
            <img src="{}" class="strategy-img" />
        </div>"#,
            encode_text(file)
        )
    });

    format!(
        r#"
    <div class="strategy-card">
        <div class="card-header">
            <span class="icon">📊</span> {etf} 每日策略建议 ({date})
        </div>
        {indices}
        <div class="table-container" style="margin-top: 25px;">
            <table class="data-table" style="margin-bottom: 25px;">
                <thead>
                    <tr style="background: #f8f9fa;">
                        <th style="width: 50%;">策略指标</th>
                        <th>数值</th>
                    </tr>
                </thead>
                <tbody>
                    <tr>
                        <td>{window}日收益差（{etf_short}-{bench}）</td>
                        <td class="{diff_class}" style="font-weight: bold;">{diff}</td>
                    </tr>
                    <tr>
                        <td>{etf}最新收盘价</td>
                        <td>{etf_close:.3}</td>
                    </tr>
                    <tr>
                        <td>{bench}最新收盘价</td>
                        <td>{bench_close:.3}</td>
                    </tr>
                    <tr>
                        <td>信号灯状态</td>
                        <td><span class="badge {status_class}">{status}</span></td>
                    </tr>
                    <tr>
                        <td>操作建议</td>
                        <td><span class="badge status-blue" style="white-space: normal;">{operation}</span></td>
                    </tr>
                </tbody>
            </table>
        </div>
        {chart}
        <div class="sub-card">
            <div class="sub-header">📋 最新核心数据波动 (最近{rows}个交易日)</div>
            {table}
        </div>

        <div class="footer-tip" style="margin-top: 30px; border-top: 1px solid #eee; padding-top: 15px;">
            ⚠️ 本建议仅为数据分析参考，不构成投资建议
        </div>
    </div>
"#,
        etf = encode_text(&report.etf_name),
        etf_short = encode_text(report.etf_name.trim_end_matches("ETF")),
        bench = encode_text(&report.benchmark_name),
        date = report.date.format("%Y-%m-%d"),
        indices = indices_section(&report.indices),
        diff_class = if report.diff.unwrap_or(0.0) > 0.0 { "text-red" } else { "text-green" },
        diff = diff_text(report.diff),
        etf_close = report.etf_close,
        bench_close = report.benchmark_close,
        status_class = report.signal.level.css_class(),
        status = encode_text(&report.signal.status),
        operation = encode_text(&report.signal.operation),
        chart = chart,
        rows = report.recent.len(),
        table = recent_table(&report.recent, report),
    )
}

// ============================================================================
// Email body
// ============================================================================

fn inline_color(value: Option<f64>) -> &'static str {
    match value {
        Some(v) if v > 0.0 => "red",
        Some(v) if v < 0.0 => "green",
        _ => "black",
    }
}

/// HTML body of the advice email; the chart is referenced as `cid:{chart_cid}`.
pub fn email_body(report: &AdvisorReport, chart_cid: &str) -> String {
    let etf = encode_text(&report.etf_name);
    let bench = encode_text(&report.benchmark_name);
    let window = report.return_window;

    let mut table = format!(
        r#"<table border="1" cellpadding="8" cellspacing="0" style="border-collapse: collapse;">
    <tr style="background-color: #f0f0f0;">
        <th>日期</th>
        <th>{etf}收盘价</th>
        <th>{etf}涨跌幅(%)</th>
        <th>{bench}收盘价</th>
        <th>{bench}涨跌幅(%)</th>
        <th>{window}日收益差(%)</th>
    </tr>"#
    );
    for cells in recent_cells(&report.recent) {
        table.push_str(&format!(
            r#"
    <tr>
        <td>{}</td>
        <td>{}</td>
        <td style="color: {};">{}</td>
        <td>{}</td>
        <td style="color: {};">{}</td>
        <td style="color: {};">{}</td>
    </tr>"#,
            cells.date,
            cells.etf_close,
            inline_color(cells.etf_change),
            pct_cell(cells.etf_change),
            cells.benchmark_close,
            inline_color(cells.benchmark_change),
            pct_cell(cells.benchmark_change),
            inline_color(cells.diff_pct),
            pct_cell(cells.diff_pct),
        ));
    }
    table.push_str("\n</table>");

    let chart = if report.chart_file.is_some() {
        format!(
            r#"<h4>📈 {window}日收益差趋势图：</h4>
    <img src="cid:{chart_cid}" style="border: none; max-width: 100%; display: block;" />
    <br>"#
        )
    } else {
        String::new()
    };

    format!(
        r#"<html>
  <body>
    <h2>📊 {etf}每日策略建议（{date}）</h2>
    <table border="1" cellpadding="8" cellspacing="0" style="border-collapse: collapse;">
      <tr style="background-color: #f0f0f0;"><th>指标</th><th>数值</th></tr>
      <tr><td>{window}日收益差（{etf}-{bench}）</td><td><b style="color: {diff_color};">{diff}</b></td></tr>
      <tr><td>{etf}最新收盘价</td><td>{etf_close:.3}</td></tr>
      <tr><td>{bench}最新收盘价</td><td>{bench_close:.3}</td></tr>
      <tr><td>信号灯状态</td><td><b>{status}</b></td></tr>
      <tr><td>操作建议</td><td><b style="color: blue;">{operation}</b></td></tr>
    </table>
    <br>
    {chart}
    <h4>📋 最新核心数据波动：</h4>
    {table}
    <br><br>
    <p>⚠️ 本建议仅为数据分析参考，不构成投资建议</p>
  </body>
</html>
"#,
        date = report.date.format("%Y-%m-%d"),
        diff_color = if report.diff.unwrap_or(0.0) > 0.0 { "red" } else { "green" },
        diff = diff_text(report.diff),
        etf_close = report.etf_close,
        bench_close = report.benchmark_close,
        status = encode_text(&report.signal.status),
        operation = encode_text(&report.signal.operation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{classify, GradientRules};
    use chrono::Duration;

    fn report() -> AdvisorReport {
        let start = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        AdvisorReport {
            date: start + Duration::days(2),
            etf_name: "红利ETF".into(),
            benchmark_name: "中证全指".into(),
            return_window: 40,
            diff: Some(-0.035),
            etf_close: 1.234,
            benchmark_close: 5432.1,
            signal: classify(Some(-0.035), &GradientRules::standard(), 50.0, 40),
            chart_file: Some("chart.svg".into()),
            recent: vec![
                RecentRow { date: start, etf_close: 1.0, benchmark_close: 100.0, diff: None },
                RecentRow { date: start + Duration::days(1), etf_close: 1.1, benchmark_close: 99.0, diff: Some(0.012) },
            ],
            indices: vec![IndexSummary {
                name: "上证指数".into(),
                code: "000001".into(),
                close: 3100.456,
                change: -0.0123,
                chart: Some("kline_000001.svg".into()),
            }],
        }
    }

    #[test]
    fn test_recent_cells_first_row_has_no_change() {
        let cells = recent_cells(&report().recent);
        assert_eq!(cells[0].etf_change, None);
        assert!((cells[1].etf_change.unwrap() - 10.0).abs() < 1e-9);
        assert!((cells[1].benchmark_change.unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(pct_cell(cells[0].diff_pct), "-");
        assert_eq!(pct_cell(cells[1].diff_pct), "1.20%");
    }

    #[test]
    fn test_fragment_content() {
        let html = strategy_fragment(&report());
        assert!(html.contains("红利ETF 每日策略建议 (2024-05-08)"));
        assert!(html.contains("40日收益差（红利-中证全指）"));
        assert!(html.contains("-3.50%"));
        assert!(html.contains("badge status-green"));
        assert!(html.contains("基础定投50元 + 额外多投70元"));
        assert!(html.contains(r#"<img src="chart.svg""#));
        assert!(html.contains(r#"<div class="label text-green">-1.23%</div>"#));
        assert!(html.contains("kline_000001.svg"));
        assert!(html.contains("最近2个交易日"));
        assert!(html.contains("不构成投资建议"));
    }

    #[test]
    fn test_fragment_without_chart_or_indices() {
        let mut r = report();
        r.chart_file = None;
        r.indices.clear();
        let html = strategy_fragment(&r);
        assert!(!html.contains("strategy-img"));
        assert!(!html.contains("今日三大指数行情"));
    }

    #[test]
    fn test_email_body_references_cid() {
        let html = email_body(&report(), "chart_img");
        assert!(html.contains("cid:chart_img"));
        assert!(html.contains("红利ETF每日策略建议（2024-05-08）"));
        assert!(html.contains(r#"<td style="color: red;">10.00%</td>"#));
    }
}
