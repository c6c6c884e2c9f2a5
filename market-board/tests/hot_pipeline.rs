//! End-to-end hot-list run against a mock 10jqka server.

use std::collections::BTreeMap;

use board_common::Config;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use market_board::data::ths::ThsEndpoints;
use market_board::data::ThsClient;
use market_board::pipeline::hot;

fn ranking() -> Value {
    json!({
        "status_code": 0,
        "data": {"stock_list": [
            {
                "order": 1, "name": "航天电子", "code": "600879",
                "rise_and_fall": 9.98, "rate": 8472839.0,
                "tag": {"concept_tag": ["商业航天", "卫星导航"]},
                "analyse_title": "商业航天订单落地"
            },
            {
                "order": 2, "name": "中科曙光", "code": "603019",
                "rise_and_fall": -1.2, "rate": "5000000",
                "tag": {"concept_tag": ["算力"]},
                "topic": {"title": "国产算力"}
            }
        ]}
    })
}

async fn mock_ths() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hot"))
        .and(query_param("list_type", "tech"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ranking()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new_stock.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("新股甲|301001|35.2|12000|创业板\n"),
        )
        .mount(&server)
        .await;

    server
}

fn client(server: &MockServer) -> ThsClient {
    ThsClient::new(&Default::default())
        .unwrap()
        .with_endpoints(ThsEndpoints {
            hot_list: format!("{}/hot", server.uri()),
            new_stock: format!("{}/new_stock.txt", server.uri()),
        })
}

#[tokio::test]
async fn test_scrape_analyze_and_write_snippets() {
    let server = mock_ths().await;
    let dir = TempDir::new().unwrap();
    let ths = client(&server);

    let results = hot::scrape(&ths, dir.path()).await.unwrap();

    // the failing ranking is left out, everything else is saved
    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["daily_trend", "daily_value", "hourly_normal", "hourly_skyrocket", "new_stock"]
    );
    assert!(dir.path().join("hourly_normal_response.json").exists());
    assert!(dir.path().join("new_stock_response.txt").exists());
    assert!(!dir.path().join("daily_tech_parsed.json").exists());

    let saved: BTreeMap<String, Value> = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(hot::ALL_STOCKS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(saved.len(), 5);

    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let report = hot::analyze(dir.path(), 30, date).unwrap();
    assert_eq!(report.total_stocks, 8);
    assert_eq!(report.total_concepts, 12);
    assert_eq!(report.unique_concepts, 3);
    assert!(report.hot_concepts.iter().all(|c| c.count == 4 && c.percentage == 50.0));

    let markdown = std::fs::read_to_string(dir.path().join(hot::ANALYSIS_MD)).unwrap();
    assert!(markdown.contains("2024年6月3日"));

    let all = hot::load_all_stocks(dir.path()).unwrap();
    assert_eq!(all.len(), 9);

    hot::write_snippets(dir.path(), &Config::default()).unwrap();
    let concepts = std::fs::read_to_string(dir.path().join(hot::CONCEPTS_SNIPPET)).unwrap();
    let stocks = std::fs::read_to_string(dir.path().join(hot::STOCKS_SNIPPET)).unwrap();
    assert!(concepts.contains("商业航天"));
    assert!(concepts.contains("50%"));
    assert!(stocks.contains("航天电子"));
    assert!(stocks.contains("text-red"));
    assert!(stocks.contains("商业航天订单落地"));
}

#[tokio::test]
async fn test_unreachable_server_still_writes_combined_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let ths = client(&server);

    let results = hot::scrape(&ths, dir.path()).await.unwrap();
    assert!(results.is_empty());

    let content = std::fs::read_to_string(dir.path().join(hot::ALL_STOCKS_FILE)).unwrap();
    assert_eq!(content.trim(), "{}");
}
