mod common;

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use common::{
    client, refused_addr, start_gateway, start_mock_backend, start_programmable_backend,
    start_slow_backend, test_config,
};

fn fetch_params(target: SocketAddr, path: &str) -> [(&'static str, String); 2] {
    [
        ("method", "getURLContents".to_string()),
        ("url", format!("http://{}{}", target, path)),
    ]
}

async fn json(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn fetches_reachable_url() {
    let backend = start_mock_backend("hello from backend").await;
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(backend, "/page"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    assert_eq!(json(response).await, serde_json::json!({"contents": "hello from backend"}));

    gateway.stop().await;
}

#[tokio::test]
async fn remote_status_is_not_interpreted() {
    let backend =
        start_programmable_backend(|| async { (404, "nothing here".to_string()) }).await;
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(backend, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["contents"], "nothing here");

    gateway.stop().await;
}

#[tokio::test]
async fn post_form_body_is_accepted() {
    let backend = start_mock_backend("posted").await;
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .post(gateway.url())
        .form(&fetch_params(backend, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["contents"], "posted");

    gateway.stop().await;
}

#[tokio::test]
async fn refused_connection_is_an_application_failure() {
    let target = refused_addr().await;
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(target, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert_eq!(body["contents"], "");
    assert!(!body["error"].as_str().unwrap().is_empty());

    gateway.stop().await;
}

#[tokio::test]
async fn unknown_method_is_501_code_2() {
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .get(format!("{}?method=unknownOp", gateway.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    let body = json(response).await;
    assert_eq!(body["errorCode"], 2);
    assert_eq!(body["errorMessage"], "The method was not found or no method was provided.");

    gateway.stop().await;
}

#[tokio::test]
async fn undecodable_body_is_501_code_1() {
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .post(gateway.url())
        .header("content-type", "application/x-www-form-urlencoded")
        .body("method=getURLContents&url=%zz")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json(response).await["errorCode"], 1);

    gateway.stop().await;
}

#[tokio::test]
async fn missing_url_is_501_code_3() {
    let gateway = start_gateway(test_config()).await;

    let response = client()
        .get(format!("{}?method=getURLContents", gateway.url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json(response).await["errorCode"], 3);

    gateway.stop().await;
}

#[tokio::test]
async fn slow_target_times_out() {
    let backend = start_slow_backend(Duration::from_secs(3)).await;
    let mut config = test_config();
    config.fetch.timeout_secs = 1;
    let gateway = start_gateway(config).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(backend, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert!(body["error"].as_str().unwrap().contains("timed out"));

    gateway.stop().await;
}

#[tokio::test]
async fn oversized_body_is_cut_off() {
    let backend = start_programmable_backend(|| async { (200, "x".repeat(4096)) }).await;
    let mut config = test_config();
    config.fetch.max_body_bytes = 1024;
    let gateway = start_gateway(config).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(backend, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert!(body["error"].as_str().unwrap().contains("1024 byte limit"));

    gateway.stop().await;
}

#[tokio::test]
async fn private_targets_can_be_blocked() {
    let backend = start_mock_backend("secret").await;
    let mut config = test_config();
    config.fetch.block_private_networks = true;
    let gateway = start_gateway(config).await;

    let response = client()
        .get(gateway.url())
        .query(&fetch_params(backend, "/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert!(body["error"].as_str().unwrap().contains("internal network"));

    gateway.stop().await;
}

#[tokio::test]
async fn flooding_source_is_banned_silently() {
    let mut config = test_config();
    config.bans.requests_per_source_per_second = 2;
    config.bans.propagation_interval_ms = 50;
    let gateway = start_gateway(config).await;
    let client = client();
    let url = format!("{}?method=unknownOp", gateway.url());

    for _ in 0..5 {
        let _ = client.get(&url).send().await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(client.get(&url).send().await.is_err());
    assert_eq!(gateway.status.borrow().banned_sources, 1);

    gateway.stop().await;
}

#[tokio::test]
async fn pool_grows_under_load_and_shrinks_back() {
    let mut config = test_config();
    config.pool.min_workers = Some(1);
    config.pool.max_workers = 3;
    config.bans.requests_per_source_per_second = 1_000_000;
    let mut gateway = start_gateway(config).await;

    let url = format!("{}?method=unknownOp", gateway.url());
    let load = tokio::spawn(async move {
        let client = client();
        let until = tokio::time::Instant::now() + Duration::from_millis(1500);
        while tokio::time::Instant::now() < until {
            let _ = client.get(&url).send().await;
        }
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        gateway.status.wait_for(|s| s.live_workers == 3),
    )
    .await
    .unwrap()
    .unwrap();
    load.await.unwrap();

    tokio::time::timeout(
        Duration::from_secs(10),
        gateway.status.wait_for(|s| s.live_workers == 1),
    )
    .await
    .unwrap()
    .unwrap();

    gateway.stop().await;
}

#[tokio::test]
async fn in_flight_call_completes_during_shutdown() {
    let backend = start_slow_backend(Duration::from_millis(500)).await;
    let gateway = start_gateway(test_config()).await;

    let url = gateway.url();
    let call = tokio::spawn(async move {
        client()
            .get(url)
            .query(&fetch_params(backend, "/"))
            .send()
            .await
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    gateway.stop().await;

    let response = call.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["contents"], "late");
}
