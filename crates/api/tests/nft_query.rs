// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the query surfaces

use axum::http::StatusCode;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

mod fixtures;
use fixtures::{ALICE, start_server};

#[tokio::test]
async fn http_query_returns_final_snapshot() {
    let (addr, _token) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/v1/nfts/{ALICE}"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot: Value = response.json().await.expect("Failed to decode snapshot");
    assert_eq!(snapshot["address"], ALICE);
    assert_eq!(snapshot["count"], 3);
    assert_eq!(snapshot["isFetching"], false);
    assert!(snapshot.get("error").is_none());
    assert_eq!(snapshot["items"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn http_query_reports_rejection_in_body() {
    let (addr, _token) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/v1/nfts/not-an-address"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot: Value = response.json().await.expect("Failed to decode snapshot");
    assert_eq!(
        snapshot["error"],
        "Address is not a valid Substrate or Ethereum Address"
    );
    assert_eq!(snapshot["count"], 0);
    assert_eq!(snapshot["isFetching"], false);
}

#[tokio::test]
async fn websocket_streams_progress_then_closes() {
    let (addr, _token) = start_server().await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to open websocket");
    socket
        .send(Message::Text(ALICE.into()))
        .await
        .expect("Failed to send address");

    let mut snapshots = Vec::new();
    let mut closed = false;
    while let Some(message) = socket.next().await {
        match message.expect("websocket error") {
            Message::Text(text) => {
                let snapshot: Value =
                    serde_json::from_str(text.as_str()).expect("snapshot is not JSON");
                snapshots.push(snapshot);
            }
            Message::Close(_) => {
                closed = true;
                break;
            }
            _ => {}
        }
    }

    assert!(closed);
    // acceptance, one per source, final
    assert_eq!(snapshots.len(), 5);
    let (last, rest) = snapshots.split_last().unwrap();
    assert_eq!(last["isFetching"], false);
    assert_eq!(last["count"], 3);
    assert!(rest.iter().all(|s| s["isFetching"] == true));
    assert_eq!(snapshots[0]["count"], 0);

    let counts: Vec<u64> = snapshots
        .iter()
        .map(|s| s["count"].as_u64().unwrap())
        .collect();
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn websocket_empty_address_is_rejected() {
    let (addr, _token) = start_server().await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to open websocket");
    socket
        .send(Message::Text("".into()))
        .await
        .expect("Failed to send address");

    let mut last = None;
    while let Some(Ok(message)) = socket.next().await {
        match message {
            Message::Text(text) => {
                last = Some(serde_json::from_str::<Value>(text.as_str()).unwrap());
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    let last = last.expect("no snapshot received");
    assert_eq!(last["error"], "No Address Provided");
    assert_eq!(last["isFetching"], false);
}

#[tokio::test]
async fn health_lists_sources() {
    let (addr, _token) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let health: Value = response.json().await.unwrap();
    assert_eq!(health["status"], "Up");
    assert_eq!(
        health["sources"],
        serde_json::json!(["RMRK1", "RMRK2", "Statemine"])
    );
}

#[tokio::test]
async fn metrics_and_docs_are_served() {
    let (addr, _token) = start_server().await;

    reqwest::get(format!("http://{addr}/v1/nfts/{ALICE}"))
        .await
        .expect("Failed to send request");

    let metrics = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("nft_api_queries_total"));
    assert!(metrics.contains("nft_api_source_duration_seconds"));

    let doc: Value = reqwest::get(format!("http://{addr}/api-doc/openapi.json"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"].get("/v1/nfts/{address}").is_some());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (addr, _token) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
