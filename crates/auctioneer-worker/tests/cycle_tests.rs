//! Get-calculate-set cycle against a mock ad platform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use auctioneer_gateway::{DirectGateway, GatewayConfig};
use auctioneer_models::{BidRule, BidRuleRecord, TaskId};
use auctioneer_worker::{obtain_token, run_rule, TokenSource, WorkerError};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_config(server: &MockServer) -> GatewayConfig {
    let mut config = GatewayConfig::default().with_base_url(&server.uri());
    config.soft_retry.backoff_factor = Duration::from_millis(1);
    config.transport.retry.backoff_factor = Duration::from_millis(1);
    config
}

fn rule() -> BidRule {
    let record: BidRuleRecord = serde_json::from_value(json!({
        "id": 5,
        "title": "Top of search",
        "account": 1,
        "target_type": "campaign",
        "target_values": [1],
        "target_bid_diff": 10,
        "bid_increase_percentage": 10,
        "max_bid": 10
    }))
    .unwrap();
    record.into_rule().unwrap()
}

fn keyword_bid(keyword_id: i64, first: i64, second: i64) -> Value {
    json!({
        "CampaignId": 1,
        "AdGroupId": 2,
        "KeywordId": keyword_id,
        "ServingStatus": "ELIGIBLE",
        "Search": {
            "Bid": 300,
            "AuctionBids": {"AuctionBidItems": [
                {"TrafficVolume": 100, "Bid": first, "Price": first},
                {"TrafficVolume": 85, "Bid": second, "Price": second}
            ]}
        },
        "Network": {"Bid": 300}
    })
}

/// Mock `keywordbids` service: `get` returns `bids`, `set` acknowledges
/// every item and attaches a warning to `warn_on`.
async fn mount_keyword_bids(server: &MockServer, bids: Vec<Value>, warn_on: Option<i64>) {
    Mock::given(method("POST"))
        .and(path("/json/v5/keywordbids"))
        .respond_with(move |req: &Request| {
            let body: Value = req.body_json().unwrap();
            match body["method"].as_str() {
                Some("get") => ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"KeywordBids": bids.clone()}})),
                Some("set") => {
                    let acks: Vec<Value> = body["params"]["KeywordBids"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .map(|bid| {
                            let id = bid["KeywordId"].as_i64().unwrap();
                            if Some(id) == warn_on {
                                json!({"KeywordId": id, "Warnings": [{"Code": 10160, "Message": "Bid is too high"}]})
                            } else {
                                json!({"KeywordId": id})
                            }
                        })
                        .collect();
                    ResponseTemplate::new(200).set_body_json(json!({"result": {"SetResults": acks}}))
                }
                _ => ResponseTemplate::new(400),
            }
        })
        .mount(server)
        .await;
}

async fn requests_with_method(server: &MockServer, name: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .filter(|body| body["method"] == json!(name))
        .collect()
}

#[tokio::test]
async fn test_full_cycle_writes_recalculated_bids() {
    let server = MockServer::start().await;
    mount_keyword_bids(
        &server,
        vec![keyword_bid(11, 1000, 900), keyword_bid(12, 1000, 950)],
        None,
    )
    .await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let task_id = TaskId::from_string("task-1");
    let outcome = run_rule(&gateway, &rule(), task_id.clone()).await.unwrap();

    assert_eq!(outcome.task_id, task_id);
    assert_eq!(outcome.rule_id, 5);
    assert_eq!(outcome.records_total, 2);
    assert_eq!(outcome.acknowledged, 2);
    assert_eq!(outcome.successes, 2);
    assert!(outcome.is_ok);

    let reads = requests_with_method(&server, "get").await;
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0]["params"]["SelectionCriteria"], json!({"CampaignIds": [1]}));

    let writes = requests_with_method(&server, "set").await;
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0]["params"]["KeywordBids"],
        json!([
            {"KeywordId": 11, "SearchBid": 990},
            {"KeywordId": 12, "SearchBid": 1100}
        ])
    );
}

#[tokio::test]
async fn test_bids_without_search_bid_are_not_written() {
    let server = MockServer::start().await;
    let network_only = json!({
        "CampaignId": 1,
        "AdGroupId": 2,
        "KeywordId": 13,
        "Network": {"Bid": 300}
    });
    mount_keyword_bids(
        &server,
        vec![keyword_bid(11, 1000, 900), network_only, keyword_bid(12, 1000, 950)],
        None,
    )
    .await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let outcome = run_rule(&gateway, &rule(), TaskId::new()).await.unwrap();

    // Three bids read, two written.
    assert_eq!(outcome.records_total, 2);
    assert_eq!(outcome.acknowledged, 2);
    assert!(outcome.is_ok);

    let writes = requests_with_method(&server, "set").await;
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0]["params"]["KeywordBids"],
        json!([
            {"KeywordId": 11, "SearchBid": 990},
            {"KeywordId": 12, "SearchBid": 1100}
        ])
    );
}

#[tokio::test]
async fn test_warnings_mark_outcome_not_ok() {
    let server = MockServer::start().await;
    mount_keyword_bids(
        &server,
        vec![keyword_bid(11, 1000, 900), keyword_bid(12, 1000, 950)],
        Some(12),
    )
    .await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let outcome = run_rule(&gateway, &rule(), TaskId::new()).await.unwrap();

    assert_eq!(outcome.acknowledged, 2);
    assert_eq!(outcome.warnings, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.successes, 1);
    assert!(!outcome.is_ok);
}

#[tokio::test]
async fn test_no_bids_is_no_response() {
    let server = MockServer::start().await;
    mount_keyword_bids(&server, Vec::new(), None).await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let result = run_rule(&gateway, &rule(), TaskId::new()).await;

    assert!(matches!(result, Err(WorkerError::NoResponse(_))));
    assert!(requests_with_method(&server, "set").await.is_empty());
}

#[tokio::test]
async fn test_soft_error_during_read_is_retried() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let bids = vec![keyword_bid(11, 1000, 900)];

    Mock::given(method("POST"))
        .and(path("/json/v5/keywordbids"))
        .respond_with(move |req: &Request| {
            let body: Value = req.body_json().unwrap();
            if body["method"] == json!("set") {
                return ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"SetResults": [{"KeywordId": 11}]}}));
            }
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(200).set_body_json(json!({"error": {"error_code": 52}}))
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"KeywordBids": bids.clone()}}))
            }
        })
        .mount(&server)
        .await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let outcome = run_rule(&gateway, &rule(), TaskId::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.records_total, 1);
    assert!(outcome.is_ok);
}

#[tokio::test]
async fn test_read_failure_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json/v5/keywordbids"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"KeywordBids": [{"Bid": 1}]}})),
        )
        .mount(&server)
        .await;

    let gateway = DirectGateway::new(&test_config(&server), "token").unwrap();
    let result = run_rule(&gateway, &rule(), TaskId::new()).await;

    assert!(matches!(result, Err(WorkerError::Model(_))));
}

#[tokio::test]
async fn test_obtain_token_from_authorization_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4821"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "issued"})))
        .expect(1)
        .mount(&server)
        .await;

    let source = TokenSource::AuthorizationCode {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        code: "4821".to_string(),
    };
    let token = obtain_token(source, &test_config(&server)).await.unwrap();
    assert_eq!(token, "issued");

    let token = obtain_token(TokenSource::Token("ready".to_string()), &test_config(&server))
        .await
        .unwrap();
    assert_eq!(token, "ready");
}
