use axum::http::StatusCode;
use integration_tests::{TestGateway, UpstreamMock};
use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn completion_is_translated() {
    let upstream = UpstreamMock::new().with_reply("hello").spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({
        "model": "m",
        "messages": [{"role": "user", "content": "hi"}]
    });

    let response = gateway.client.post("/v1/chat/completions", &request).await;
    assert_eq!(response.status(), 200);

    let mut body: serde_json::Value = response.json().await.unwrap();

    let id = body["id"].as_str().unwrap();
    assert!(id.starts_with("chatcmpl-"), "{id}");
    assert!(body["created"].as_i64().unwrap() > 1_700_000_000);

    body["id"] = json!("[id]");
    body["created"] = json!("[created]");

    assert_eq!(
        body,
        json!({
            "id": "[id]",
            "object": "chat.completion",
            "created": "[created]",
            "model": "m",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}
        })
    );

    let forwarded = upstream.requests_to("/chat");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].json(), request);
}

#[tokio::test]
async fn model_is_echoed_for_any_name() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    for model in ["m", "llama3:8b", "", "gpt-4o / ünïcode"] {
        let request = json!({"model": model, "messages": []});
        let response = gateway.client.post("/v1/chat/completions", &request).await;

        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["model"], model);
    }
}

#[tokio::test]
async fn completion_ids_are_unique() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "m", "messages": []});
    let mut ids = Vec::new();

    for _ in 0..5 {
        let body: serde_json::Value = gateway
            .client
            .post("/v1/chat/completions", &request)
            .await
            .json()
            .await
            .unwrap();

        ids.push(body["id"].as_str().unwrap().to_string());
    }

    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn every_call_uses_its_own_upstream_connection() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "m", "messages": []});

    for _ in 0..3 {
        let response = gateway.client.post("/v1/chat/completions", &request).await;
        assert_eq!(response.status(), 200);
    }

    let mut peers: Vec<_> = upstream.requests_to("/chat").iter().map(|request| request.peer).collect();
    peers.sort();
    peers.dedup();

    assert_eq!(peers.len(), 3);
}

#[tokio::test]
async fn authorization_is_forwarded() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let response = gateway
        .client
        .request(Method::POST, "/v1/chat/completions")
        .header("authorization", "Bearer sk-user")
        .json(&json!({"model": "m", "messages": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let forwarded = upstream.requests_to("/chat");
    assert_eq!(forwarded[0].headers.get("authorization").unwrap(), "Bearer sk-user");
}

#[tokio::test]
async fn malformed_json_is_rejected_before_upstream() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    for body in ["{invalid json", "", "null", r#"{"model": 42}"#, r#"{"messages": []}"#] {
        let response = gateway.client.post_raw("/v1/chat/completions", body).await;
        assert_eq!(response.status(), 400, "for {body:?}");

        let error: serde_json::Value = response.json().await.unwrap();
        assert_eq!(error["error"]["type"], "invalid_request_error");
    }

    assert!(upstream.requests_to("/chat").is_empty());
}

#[tokio::test]
async fn upstream_rejection_is_bad_gateway() {
    let upstream = UpstreamMock::new()
        .with_chat_error(StatusCode::INTERNAL_SERVER_ERROR, "boom")
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]});
    let response = gateway.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 502);

    let body = response.text().await.unwrap();
    assert!(body.contains("boom"), "{body}");

    let error: serde_json::Value = serde_json::from_str(&body).unwrap();
    insta::assert_snapshot!(error["error"]["message"].as_str().unwrap(), @"Upstream error (500): boom");
}

#[tokio::test]
async fn unknown_model_rejection_is_bad_gateway() {
    let upstream = UpstreamMock::new()
        .with_chat_error(StatusCode::BAD_REQUEST, r#"{"detail":"Model not found"}"#)
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "nope", "messages": []});
    let response = gateway.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 502);

    let body = response.text().await.unwrap();
    assert!(body.contains("Model not found"), "{body}");
}

#[tokio::test]
async fn null_and_missing_content_are_accepted() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({
        "model": "m",
        "messages": [
            {"role": "user", "content": "what time is it?"},
            {"role": "assistant", "content": null, "tool_calls": [{"id": "call_1", "type": "function"}]},
            {"role": "user"}
        ]
    });

    let response = gateway.client.post("/v1/chat/completions", &request).await;
    assert_eq!(response.status(), 200);

    let forwarded = upstream.requests_to("/chat");

    assert_eq!(
        forwarded[0].json(),
        json!({
            "model": "m",
            "messages": [
                {"role": "user", "content": "what time is it?"},
                {"role": "assistant", "content": ""},
                {"role": "user", "content": ""}
            ]
        })
    );
}

#[tokio::test]
async fn upstream_reply_without_message_is_empty_completion() {
    let upstream = UpstreamMock::new()
        .with_raw_chat_body(r#"{"status":"ok"}"#)
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "m", "messages": []});
    let response = gateway.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"], json!({"role": "", "content": ""}));
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn malformed_upstream_reply_is_internal_error() {
    let upstream = UpstreamMock::new()
        .with_raw_chat_body("<html>Bad Gateway</html>")
        .spawn()
        .await;

    let gateway = TestGateway::with_upstream(&upstream).await;

    let request = json!({"model": "m", "messages": []});
    let response = gateway.client.post("/v1/chat/completions", &request).await;

    assert_eq!(response.status(), 500);

    let error: serde_json::Value = response.json().await.unwrap();
    assert_eq!(error["error"]["type"], "internal_error");
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let response = gateway
            .client
            .request(method.clone(), "/v1/chat/completions")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 405, "for {method}");
    }

    assert!(upstream.requests().is_empty());
}
