#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::handlers::{batch, counting_router, seen};
use switchyard::client::{CallContext, MemoryQueue, QueueTransport};
use switchyard::wire::{self, Request, Response};
use switchyard::{
    ClientConfig, CorrelationClient, Engine, EngineConfig, QueueServer, RunMode, ServerConfig,
    ServerHandle,
};
use tokio::time::Instant;

const REQUESTS: &str = "requests";
const REPLIES: &str = "replies";

fn queue() -> Arc<MemoryQueue> {
    Arc::new(MemoryQueue::with_channels(&[REQUESTS, REPLIES, "fallback"]))
}

fn started_engine(fail_at: &[usize], mode: RunMode) -> (Arc<Engine>, Arc<std::sync::atomic::AtomicUsize>) {
    let (router, counter) = counting_router(fail_at);
    let engine = Engine::new(router, &EngineConfig::builder().run_mode(mode).build());
    engine.start();
    (Arc::new(engine), counter)
}

fn serve(engine: &Arc<Engine>, queue: &Arc<MemoryQueue>, config: ServerConfig) -> ServerHandle {
    QueueServer::new(
        Arc::clone(engine),
        Arc::clone(queue) as Arc<dyn QueueTransport>,
        config,
    )
    .start()
}

fn server_config() -> ServerConfig {
    ServerConfig::builder(REQUESTS)
        .poll_wait(Duration::from_millis(50))
        .retry_backoff(Duration::from_millis(10))
        .build()
}

/// Enqueue a batch of `/item` requests that ask for replies on `REPLIES`.
fn enqueue(queue: &MemoryQueue, count: usize) {
    for mut request in batch(count) {
        request.source_channel_id = REPLIES.to_string();
        queue.push(REQUESTS, wire::encode_body(&request)).unwrap();
    }
}

async fn drain_replies(queue: &MemoryQueue) -> Vec<Response> {
    let messages = queue.receive(REPLIES, 100, Duration::ZERO).await.unwrap();
    messages
        .iter()
        .map(|m| wire::decode_body::<Response>(&m.body).unwrap())
        .collect()
}

async fn eventually<F: Fn() -> bool>(check: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_and_server_round_trip() {
    let queue = queue();
    let (engine, _) = started_engine(&[2], RunMode::Partial);
    let server = serve(&engine, &queue, server_config());

    let client = CorrelationClient::new(
        ClientConfig::builder(REQUESTS)
            .inbound_channel(REPLIES)
            .poll_wait(Duration::from_millis(50))
            .default_timeout(Duration::from_secs(5))
            .build(),
        Arc::clone(&queue) as Arc<dyn QueueTransport>,
    );
    let ctx = CallContext::background();

    let response = client.call(&ctx, "/item", "3").await.unwrap();
    assert_eq!(response.into_result(), Ok("ok 3".to_string()));

    let response = client.call(&ctx, "/item", "2").await.unwrap();
    assert_eq!(response.into_result(), Err("item 2 failed".to_string()));

    let response = client.call(&ctx, "/nowhere", "").await.unwrap();
    assert_eq!(response.error, "no route for path: /nowhere");

    client.close().await;
    server.shutdown().await;
    assert_eq!(queue.in_flight(REQUESTS), 0);
}

#[tokio::test]
async fn test_strict_halt_leaves_rest_unacknowledged() {
    let queue = queue();
    let (engine, counter) = started_engine(&[2], RunMode::Strict);
    enqueue(&queue, 5);

    let server = serve(&engine, &queue, server_config());
    eventually(|| server.metrics().unprocessed() == 2).await;

    assert_eq!(seen(&counter), 3);
    assert_eq!(server.metrics().received(), 5);
    assert_eq!(server.metrics().replied(), 3);
    assert_eq!(queue.in_flight(REQUESTS), 2);

    let replies = drain_replies(&queue).await;
    let payloads: Vec<&str> = replies.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(payloads, vec!["ok 0", "ok 1", ""]);
    assert_eq!(replies[2].error, "item 2 failed");

    server.shutdown().await;
}

#[tokio::test]
async fn test_partial_replies_to_every_item() {
    let queue = queue();
    let (engine, counter) = started_engine(&[1, 3], RunMode::Partial);
    enqueue(&queue, 5);

    let server = serve(&engine, &queue, server_config());
    eventually(|| server.metrics().replied() == 5).await;
    eventually(|| queue.in_flight(REQUESTS) == 0).await;

    assert_eq!(seen(&counter), 5);
    assert_eq!(server.metrics().unprocessed(), 0);
    let failed = drain_replies(&queue)
        .await
        .into_iter()
        .filter(Response::is_error)
        .count();
    assert_eq!(failed, 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_reply_channel_fallback() {
    let queue = queue();
    let (engine, _) = started_engine(&[], RunMode::Strict);
    let config = ServerConfig::builder(REQUESTS)
        .reply_channel("fallback")
        .poll_wait(Duration::from_millis(50))
        .build();

    // No source channel on the request
    queue
        .push(REQUESTS, wire::encode_body(&Request::new("/item", "9")))
        .unwrap();

    let server = serve(&engine, &queue, config);
    eventually(|| queue.depth("fallback") == 1).await;
    assert_eq!(queue.depth(REPLIES), 0);
    server.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_requests_are_dropped() {
    let queue = queue();
    let (engine, counter) = started_engine(&[], RunMode::Strict);
    queue.push(REQUESTS, "garbage!".to_string()).unwrap();

    let server = serve(&engine, &queue, server_config());
    eventually(|| server.metrics().decode_failures() == 1).await;
    eventually(|| queue.in_flight(REQUESTS) == 0).await;
    assert_eq!(seen(&counter), 0);
    assert_eq!(queue.depth(REPLIES), 0);
    server.shutdown().await;
}

#[tokio::test]
async fn test_stopped_engine_leaves_requests_queued() {
    let queue = queue();
    let (engine, counter) = started_engine(&[], RunMode::Partial);
    engine.stop();
    enqueue(&queue, 3);

    let server = serve(&engine, &queue, server_config());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.metrics().received(), 0);
    assert_eq!(queue.depth(REQUESTS), 3);
    assert_eq!(queue.in_flight(REQUESTS), 0);
    assert_eq!(seen(&counter), 0);

    engine.start();
    eventually(|| server.metrics().replied() == 3).await;
    eventually(|| queue.in_flight(REQUESTS) == 0).await;
    assert_eq!(seen(&counter), 3);
    assert_eq!(server.metrics().unprocessed(), 0);
    server.shutdown().await;
}

#[tokio::test]
async fn test_halted_requests_are_redelivered() {
    let queue = Arc::new(
        MemoryQueue::with_channels(&[REQUESTS, REPLIES])
            .with_visibility_timeout(Duration::from_millis(100)),
    );
    let (engine, counter) = started_engine(&[2], RunMode::Strict);
    enqueue(&queue, 5);

    let server = serve(&engine, &queue, server_config());
    eventually(|| server.metrics().replied() == 5).await;
    eventually(|| queue.in_flight(REQUESTS) == 0).await;

    // Items 3 and 4 come back as a fresh batch without the failing item
    assert_eq!(server.metrics().unprocessed(), 2);
    assert_eq!(server.metrics().received(), 7);
    assert_eq!(seen(&counter), 5);
    let payloads: Vec<String> = drain_replies(&queue)
        .await
        .into_iter()
        .map(|r| r.payload)
        .collect();
    assert_eq!(payloads, vec!["ok 0", "ok 1", "", "ok 3", "ok 4"]);
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_interrupts_long_poll() {
    let queue = queue();
    let (engine, _) = started_engine(&[], RunMode::Strict);
    let config = ServerConfig::builder(REQUESTS)
        .poll_wait(Duration::from_secs(60))
        .build();
    let server = serve(&engine, &queue, config);
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(2), server.shutdown())
        .await
        .expect("shutdown should not wait for the poll to elapse");
}
