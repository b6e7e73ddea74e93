//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::{self, Body};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response};
use std::net::SocketAddr;
use std::time::Duration;

use service_host::config::{RateLimitPolicyConfig, RateLimitRouteConfig, ServiceConfig};
use service_host::http::HttpServer;
use service_host::lifecycle::Shutdown;

pub const NODE_ID: &str = "test-node";

/// Defaults plus one `default` policy on `/api/v1/limit`.
pub fn test_config(permit_limit: u32, queue_limit: u32, window: u64) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.node_id = Some(NODE_ID.to_string());
    config.observability.metrics_enabled = false;
    config.rate_limit.policies.push(RateLimitPolicyConfig {
        name: "default".into(),
        window,
        permit_limit,
        queue_limit,
    });
    config.rate_limit.routes.push(RateLimitRouteConfig {
        path_prefix: "/api/v1/limit".into(),
        policy: "default".into(),
    });
    config
}

/// Build a request as if it arrived from `peer` over TCP.
pub fn request(method: Method, uri: &str, peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut req = builder.body(Body::empty()).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    req
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Serve `config` on an ephemeral port. Returns the bound address and the shutdown handle.
pub async fn start_server(config: ServiceConfig) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Listener is already bound; give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
