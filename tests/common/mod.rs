//! Shared integration-test infrastructure.

#![allow(dead_code)]

pub mod agent;
pub mod fixtures;
pub mod http;

use std::time::Duration;

use async_devmon::config::{CacheKind, Config};
use async_devmon::request::Processor;
use async_devmon::{Reply, Request, RequestKind, Response};
use tokio_util::sync::CancellationToken;

pub use agent::TestAgent;
pub use http::HttpResponder;

pub const LOCALHOST: &str = "127.0.0.1";

/// Defaults pointing SNMP at `port`, with short timeouts and HTTP off.
pub fn config(port: u16) -> Config {
    let mut config = Config::default();
    config.connection.snmp.ports = vec![port];
    config.connection.snmp.discover_timeout = 1;
    config.connection.snmp.timeout = 1;
    config.connection.snmp.retries = 0;
    config.connection.http.http_ports = Vec::new();
    config.connection.http.https_ports = Vec::new();
    config.cache.kind = CacheKind::Memory;
    config.request.timeout = 10;
    config
}

pub async fn processor(config: Config) -> Processor {
    Processor::from_config(config)
        .await
        .expect("processor from config")
}

pub async fn run(processor: &Processor, kind: RequestKind) -> Reply {
    processor
        .handle(Request::new(kind, LOCALHOST), CancellationToken::new())
        .await
}

/// The payload of a successful reply.
pub fn success(reply: Reply) -> Response {
    match reply {
        Reply::Success(response) => response,
        Reply::Failure(failure) => panic!("request failed: {failure:?}"),
    }
}

pub async fn elapsed<F: std::future::Future>(fut: F) -> (F::Output, Duration) {
    let start = std::time::Instant::now();
    let out = fut.await;
    (out, start.elapsed())
}
