use std::time::{Duration, Instant};

use indoc::formatdoc;
use integration_tests::{TestGateway, UpstreamMock};
use reqwest::Method;
use serde_json::json;
use server::{DrainOutcome, LifecycleState, ShutdownTrigger};

fn config(upstream_url: &str, shutdown_timeout: &str) -> String {
    formatdoc! {r#"
        [server]
        shutdown_timeout = "{shutdown_timeout}"

        [upstream]
        url = "{upstream_url}"
    "#}
}

#[tokio::test]
async fn quit_stops_the_gateway() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let public = gateway.client.base_url().to_string();
    let control = gateway.control.base_url().to_string();
    let lifecycle = gateway.lifecycle();

    assert_eq!(*lifecycle.borrow(), LifecycleState::Running);

    let response = gateway.quit().await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Initiating shutdown...");

    let report = gateway.stopped(Duration::from_secs(15)).await;

    assert_eq!(report.trigger, ShutdownTrigger::ControlRequest);
    assert_eq!(report.public, DrainOutcome::Clean);
    assert_eq!(*lifecycle.borrow(), LifecycleState::Stopped);

    // fresh client, no pooled connections from before the shutdown
    let client = reqwest::Client::new();

    assert!(client.get(format!("{public}/healthz")).send().await.is_err());
    assert!(client.post(format!("{control}/quitquitquit")).send().await.is_err());
}

#[tokio::test]
async fn concurrent_quits_shut_down_once() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    let quit = || {
        gateway
            .control
            .request(Method::POST, server::QUIT_PATH)
            .send()
    };

    let (first, second) = tokio::join!(quit(), quit());

    // a request racing the listener closing may not get an answer, but every
    // answer that does arrive is the same
    let answered: Vec<_> = [first, second].into_iter().filter_map(Result::ok).collect();
    assert!(!answered.is_empty());

    for response in answered {
        assert_eq!(response.status(), 200);
    }

    let signal = gateway.shutdown_signal().clone();
    assert!(!signal.fire(ShutdownTrigger::OsSignal("SIGTERM")));

    let report = gateway.stopped(Duration::from_secs(15)).await;
    assert_eq!(report.trigger, ShutdownTrigger::ControlRequest);
}

#[tokio::test]
async fn first_trigger_is_reported() {
    let upstream = UpstreamMock::new().spawn().await;
    let gateway = TestGateway::with_upstream(&upstream).await;

    assert!(gateway.shutdown_signal().fire(ShutdownTrigger::OsSignal("SIGTERM")));

    let report = gateway.stopped(Duration::from_secs(15)).await;

    assert_eq!(report.trigger, ShutdownTrigger::OsSignal("SIGTERM"));
    assert!(report.is_clean());
}

#[tokio::test]
async fn in_flight_request_finishes_during_drain() {
    let upstream = UpstreamMock::new()
        .with_reply("late but complete")
        .with_chat_delay(Duration::from_millis(500))
        .spawn()
        .await;

    let gateway = TestGateway::start(&config(&upstream.url(), "10s")).await;

    let chat = {
        let url = format!("{}/v1/chat/completions", gateway.client.base_url());

        tokio::spawn(async move {
            reqwest::Client::new()
                .post(url)
                .json(&json!({"model": "m", "messages": []}))
                .send()
                .await
        })
    };

    // wait until the upstream holds the request
    while upstream.requests_to("/chat").is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(gateway.quit().await.status(), 200);

    let report = gateway.stopped(Duration::from_secs(15)).await;
    assert_eq!(report.public, DrainOutcome::Clean);

    let response = chat.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["choices"][0]["message"]["content"], "late but complete");
}

#[tokio::test]
async fn hung_request_is_cut_off_at_the_deadline() {
    let upstream = UpstreamMock::new()
        .with_chat_delay(Duration::from_secs(60))
        .spawn()
        .await;

    let gateway = TestGateway::start(&config(&upstream.url(), "500ms")).await;
    let lifecycle = gateway.lifecycle();

    let chat = {
        let url = format!("{}/v1/chat/completions", gateway.client.base_url());

        tokio::spawn(async move {
            reqwest::Client::new()
                .post(url)
                .json(&json!({"model": "m", "messages": []}))
                .send()
                .await
        })
    };

    while upstream.requests_to("/chat").is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    assert_eq!(gateway.quit().await.status(), 200);

    let report = gateway.stopped(Duration::from_secs(10)).await;

    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    assert_eq!(report.public, DrainOutcome::Forced);
    assert_eq!(*lifecycle.borrow(), LifecycleState::Stopped);

    if let Ok(response) = chat.await.unwrap() {
        assert_eq!(response.status(), 503);
    }
}
