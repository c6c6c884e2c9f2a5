//! 同花顺 (10jqka) hot-stock rankings.
//!
//! Five JSON rankings share one endpoint and differ by `type` / `list_type`;
//! the new-stock ranking is a plain-text file with one `|`-separated row per
//! line.

use board_common::config::HttpConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::http::{build_client, get_json, get_text};
use super::source::SourceError;

/// The JSON rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotList {
    HourlyNormal,
    HourlySkyrocket,
    DailyTech,
    DailyValue,
    DailyTrend,
}

impl HotList {
    pub const ALL: [HotList; 5] = [
        HotList::HourlyNormal,
        HotList::HourlySkyrocket,
        HotList::DailyTech,
        HotList::DailyValue,
        HotList::DailyTrend,
    ];

    /// File-name key, e.g. `hourly_normal`.
    pub fn key(self) -> &'static str {
        match self {
            Self::HourlyNormal => "hourly_normal",
            Self::HourlySkyrocket => "hourly_skyrocket",
            Self::DailyTech => "daily_tech",
            Self::DailyValue => "daily_value",
            Self::DailyTrend => "daily_trend",
        }
    }

    fn query(self) -> (&'static str, &'static str) {
        match self {
            Self::HourlyNormal => ("hour", "normal"),
            Self::HourlySkyrocket => ("hour", "skyrocket"),
            Self::DailyTech => ("day", "tech"),
            Self::DailyValue => ("day", "value"),
            Self::DailyTrend => ("day", "trend"),
        }
    }
}

/// One flattened ranking row.
///
/// `change` and `hot` keep whatever JSON type the ranking used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotStock {
    pub rank: u32,
    pub name: String,
    pub code: String,
    pub change: Value,
    pub hot: Value,
    /// Concept tags joined by a space
    pub concept: String,
    pub analyse: String,
    pub analyse_title: String,
    pub topic: String,
}

impl HotStock {
    /// Concept tags, blanks dropped.
    pub fn concepts(&self) -> impl Iterator<Item = &str> {
        self.concept.split_whitespace()
    }
}

/// One row of the new-stock ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStock {
    pub rank: u32,
    pub name: String,
    pub code: String,
    pub pe: String,
    pub hot: String,
    pub market: String,
}

/// Endpoint URLs, overridable for tests.
#[derive(Debug, Clone)]
pub struct ThsEndpoints {
    pub hot_list: String,
    pub new_stock: String,
}

impl Default for ThsEndpoints {
    fn default() -> Self {
        Self {
            hot_list: "https://dq.10jqka.com.cn/fuyao/hot_list_data/out/hot_list/v1/stock".into(),
            new_stock: "https://eq.10jqka.com.cn/open/api/hot_list/rank/v1/new_stock.txt".into(),
        }
    }
}

/// 10jqka ranking client.
pub struct ThsClient {
    client: reqwest::Client,
    endpoints: ThsEndpoints,
}

impl ThsClient {
    pub fn new(http: &HttpConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(http)?,
            endpoints: ThsEndpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: ThsEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Fetch one JSON ranking; returns the raw body and its parsed rows.
    pub async fn hot_list(&self, list: HotList) -> Result<(Value, Vec<HotStock>), SourceError> {
        let (period, list_type) = list.query();
        debug!(list = list.key(), "Fetching ths hot list");

        let request = self
            .client
            .get(&self.endpoints.hot_list)
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
            .query(&[("stock_type", "a"), ("type", period), ("list_type", list_type)]);
        let body: Value = get_json(request).await?;
        let rows = parse_stock_list(&body)?;
        Ok((body, rows))
    }

    /// Fetch the new-stock ranking; returns the raw text and its parsed rows.
    pub async fn new_stocks(&self) -> Result<(String, Vec<NewStock>), SourceError> {
        let request = self
            .client
            .get(&self.endpoints.new_stock)
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8");
        let text = get_text(request).await?;
        let rows = parse_new_stocks(&text);
        Ok((text, rows))
    }
}

/// Flatten `data.stock_list` into rows.
pub fn parse_stock_list(body: &Value) -> Result<Vec<HotStock>, SourceError> {
    let list = body
        .get("data")
        .ok_or_else(|| SourceError::Parse("ths response has no 'data'".into()))?
        .get("stock_list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let rows = list
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let concept = item
                .pointer("/tag/concept_tag")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            let topic = item
                .pointer("/topic/title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            HotStock {
                rank: item
                    .get("order")
                    .and_then(Value::as_u64)
                    .map_or(i as u32 + 1, |o| o as u32),
                name: text(item, "name"),
                code: text(item, "code"),
                change: item.get("rise_and_fall").cloned().unwrap_or(Value::Null),
                hot: item.get("rate").cloned().unwrap_or(Value::Null),
                concept,
                analyse: text(item, "analyse"),
                analyse_title: text(item, "analyse_title"),
                topic,
            }
        })
        .collect();
    Ok(rows)
}

/// Parse `name|code|pe|hot|market` lines; the rank is the line number.
pub fn parse_new_stocks(text: &str) -> Vec<NewStock> {
    text.trim()
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 5 {
                return None;
            }
            Some(NewStock {
                rank: i as u32 + 1,
                name: parts[0].to_string(),
                code: parts[1].to_string(),
                pe: parts[2].to_string(),
                hot: parts[3].to_string(),
                market: parts[4].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> Value {
        json!({
            "status_code": 0,
            "data": {"stock_list": [
                {
                    "order": 1, "name": "航天电子", "code": "600879",
                    "rise_and_fall": 9.98, "rate": "8472839",
                    "tag": {"concept_tag": ["商业航天", "卫星导航"]},
                    "analyse": "公司是航天电子龙头", "analyse_title": "商业航天",
                    "topic": {"title": "卫星互联网"}
                },
                {
                    "name": "中科曙光", "code": "603019",
                    "rise_and_fall": -1.2, "rate": 5000000.0,
                    "topic": null
                }
            ]}
        })
    }

    #[test]
    fn test_parse_stock_list() {
        let rows = parse_stock_list(&sample_body()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].concept, "商业航天 卫星导航");
        assert_eq!(rows[0].topic, "卫星互联网");
        assert_eq!(rows[0].concepts().count(), 2);
        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[1].concept, "");
        assert_eq!(rows[1].topic, "");
    }

    #[test]
    fn test_parse_stock_list_requires_data() {
        assert!(parse_stock_list(&json!({"status_code": 1})).is_err());
        assert!(parse_stock_list(&json!({"data": {}})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_new_stocks() {
        let text = "\n新股甲|301001|35.2|12000|创业板\nbroken line\n新股乙|688001|60.1|9000|科创板\n";
        let rows = parse_new_stocks(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].rank, 3);
        assert_eq!(rows[1].market, "科创板");
    }

    #[tokio::test]
    async fn test_hot_list_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hot"))
            .and(query_param("type", "day"))
            .and(query_param("list_type", "value"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = ThsClient::new(&HttpConfig::default())
            .unwrap()
            .with_endpoints(ThsEndpoints {
                hot_list: format!("{}/hot", server.uri()),
                new_stock: format!("{}/new_stock.txt", server.uri()),
            });
        let (raw, rows) = client.hot_list(HotList::DailyValue).await.unwrap();
        assert_eq!(raw["status_code"], 0);
        assert_eq!(rows[0].code, "600879");
    }
}
