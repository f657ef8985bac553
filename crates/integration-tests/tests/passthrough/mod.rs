use integration_tests::{ECHO_STATUS_HEADER, TestGateway, UpstreamMock};
use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn models_are_reshaped() {
    let upstream = UpstreamMock::new()
        .with_models(json!([{"id": "m1", "name": "Model 1", "status": "active"}]))
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway.client.get("/v1/models").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(
        body,
        json!({
            "object": "list",
            "data": [{"id": "m1", "object": "model", "owned_by": "open-webui"}]
        })
    );

    assert_eq!(upstream.requests_to("/models").len(), 1);
}

#[tokio::test]
async fn models_are_reshaped_for_clients_accepting_gzip() {
    let upstream = UpstreamMock::new()
        .with_models(json!([{"id": "m1"}]))
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway
        .client
        .request(Method::GET, "/v1/models")
        .header("accept-encoding", "gzip, deflate")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"][0]["id"], "m1");

    let forwarded = upstream.requests_to("/models");
    assert!(forwarded[0].headers.get("accept-encoding").is_none());
}

#[tokio::test]
async fn compressed_replies_are_relayed_untouched() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway
        .client
        .request(Method::GET, "/v1/files")
        .header("accept-encoding", "gzip")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("content-encoding").unwrap(), "gzip");

    let forwarded = upstream.requests_to("/files");
    assert_eq!(forwarded[0].headers.get("accept-encoding").unwrap(), "gzip");
}

#[tokio::test]
async fn model_order_is_kept() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let body: serde_json::Value = gateway.client.get("/v1/models").await.json().await.unwrap();

    let ids: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|model| model["id"].as_str().unwrap())
        .collect();

    assert_eq!(ids, ["llama3", "mistral"]);
}

#[tokio::test]
async fn malformed_model_list_is_internal_error() {
    let upstream = UpstreamMock::new()
        .with_models(json!({"models": "not an array"}))
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway.client.get("/v1/models").await;
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn unmatched_path_is_forwarded() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway.client.get("/invalid/path").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "mock");

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["target"], "/invalid/path");
}

#[tokio::test]
async fn version_prefix_and_query_are_forwarded() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway
        .client
        .request(Method::POST, "/v1/files/upload?purpose=test")
        .header("x-custom", "kept")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(
        body,
        json!({"method": "POST", "target": "/files/upload?purpose=test", "body": "payload"})
    );

    let forwarded = upstream.requests_to("/files/upload?purpose=test");
    assert_eq!(forwarded[0].headers.get("x-custom").unwrap(), "kept");
    assert_eq!(forwarded[0].headers.get("content-length").unwrap(), "7");
}

#[tokio::test]
async fn upstream_error_status_is_relayed_verbatim() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway
        .client
        .request(Method::GET, "/v1/files")
        .header(ECHO_STATUS_HEADER, "404")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "mock");

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["target"], "/files");
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let gateway = TestGateway::start(&format!("[upstream]\nurl = \"http://{address}\"\n")).await;

    let response = gateway.client.get("/v1/models").await;
    assert_eq!(response.status(), 502);

    let error: serde_json::Value = response.json().await.unwrap();
    insta::assert_snapshot!(
        error["error"]["message"].as_str().unwrap(),
        @"Connection error: Failed to contact upstream service"
    );
}
