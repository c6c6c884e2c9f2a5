//! Hot-list HTML snippets.

use board_common::util::{format_wan, signed_pct, truncate_with_ellipsis};
use html_escape::encode_text;
use serde_json::Value;

use crate::analysis::ConceptReport;
use crate::data::ths::HotStock;

const CONCEPT_CHARS: usize = 20;
const REASON_CHARS: usize = 20;

/// Numbers may arrive as JSON numbers or numeric strings.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Placeholder left in a snippet file when its input could not be loaded.
pub fn error_comment(what: &str, error: &dyn std::fmt::Display) -> String {
    // "--" would end the comment early
    let message = error.to_string().replace("--", "- -");
    format!("<!-- Error loading {what}: {message} -->")
}

/// Table rows for the top concepts.
pub fn concepts_snippet(report: &ConceptReport, limit: usize) -> String {
    report
        .hot_concepts
        .iter()
        .take(limit)
        .map(|c| {
            format!(
                r#"
                                <tr>
                                    <td>{}</td>
                                    <td>{}</td>
                                    <td>{}</td>
                                    <td>{}%</td>
                                </tr>"#,
                c.rank,
                encode_text(&c.concept),
                c.count,
                c.percentage
            )
        })
        .collect()
}

/// Short explanation: the analysis title, else the topic, else the start of the analysis.
fn reason(stock: &HotStock) -> String {
    if !stock.analyse_title.is_empty() {
        stock.analyse_title.clone()
    } else if !stock.topic.is_empty() {
        stock.topic.clone()
    } else if !stock.analyse.is_empty() {
        let head: String = stock.analyse.chars().take(REASON_CHARS).collect();
        format!("{head}...")
    } else {
        String::new()
    }
}

/// Card with the top rows of the hourly ranking.
pub fn stocks_snippet(stocks: &[HotStock], limit: usize) -> String {
    let mut html = format!(
        r#"
        <div class="card">
            <h2>同花顺热榜 Top {limit} (实时)</h2>
            <div class="table-container">
                <table class="data-table">
                    <thead>
                        <tr>
                            <th>排名</th>
                            <th>股票名称</th>
                            <th>代码</th>
                            <th>涨跌幅</th>
                            <th>热度</th>
                            <th>核心概念</th>
                            <th>热点解析</th>
                        </tr>
                    </thead>
                    <tbody>"#
    );

    for stock in stocks.iter().take(limit) {
        let (change_class, change) = match numeric(&stock.change) {
            Some(v) if v > 0.0 => ("text-red", signed_pct(v)),
            Some(v) if v < 0.0 => ("text-green", signed_pct(v)),
            Some(_) => ("", signed_pct(0.0)),
            None => ("", raw_text(&stock.change)),
        };
        let hot = numeric(&stock.hot).map_or_else(|| raw_text(&stock.hot), format_wan);

        html.push_str(&format!(
            r#"
                        <tr>
                            <td>{}</td>
                            <td>{}</td>
                            <td>{}</td>
                            <td class="{}">{}</td>
                            <td>{}</td>
                            <td>{}</td>
                            <td style="font-size: 12px; color: #666;">{}</td>
                        </tr>"#,
            stock.rank,
            encode_text(&stock.name),
            encode_text(&stock.code),
            change_class,
            encode_text(&change),
            encode_text(&hot),
            encode_text(&truncate_with_ellipsis(&stock.concept, CONCEPT_CHARS)),
            encode_text(&reason(stock)),
        ));
    }

    html.push_str(
        r#"
                    </tbody>
                </table>
            </div>
        </div>"#,
    );
    html
}
