//! Identification against in-process agents: class tree descent, cache
//! re-validation and the HTTP probe path.

mod common;

use std::net::IpAddr;

use async_devmon::cache::CachedDevice;
use async_devmon::config::Config;
use async_devmon::device::IdentifyProperties;
use async_devmon::request::{CheckStatus, Identification};
use async_devmon::{Reply, Request, RequestKind, Response, oid};
use common::{HttpResponder, LOCALHOST, TestAgent, fixtures};
use tokio_util::sync::CancellationToken;

fn localhost() -> IpAddr {
    LOCALHOST.parse().unwrap()
}

fn identification(reply: Reply) -> Identification {
    match common::success(reply) {
        Response::Identify(id) => id,
        other => panic!("expected identify, got {other:?}"),
    }
}

#[tokio::test]
async fn ceragon_ip10_by_object_id_then_description() {
    let agent = TestAgent::builder()
        .community("ceragon-ip10")
        .data(fixtures::ceragon_ip10("6.5.0.0.1"))
        .start()
        .await;
    let mut config = common::config(agent.port());
    config.connection.snmp.communities = vec!["public".into(), "ceragon-ip10".into()];
    let processor = common::processor(config).await;

    let id = identification(common::run(&processor, RequestKind::Identify).await);
    assert_eq!(id.class, "ceragon/ip10");
    assert_eq!(id.properties.vendor.as_deref(), Some("Ceragon"));
    assert_eq!(id.properties.model.as_deref(), Some("IP-10"));
    assert_eq!(id.properties.serial_number.as_deref(), Some("CRG0042"));
    assert_eq!(id.properties.os_version.as_deref(), Some("6.5.0.0.1"));

    let data = processor
        .cache()
        .get_connection_data(localhost())
        .await
        .unwrap()
        .expect("connection data cached");
    let snmp = data.snmp.expect("snmp connection data");
    assert_eq!(snmp.version, "2c");
    assert_eq!(snmp.community.as_deref(), Some("ceragon-ip10"));
    assert_eq!(snmp.port, agent.port());

    let cached = processor.cache().get(localhost()).await.unwrap().unwrap();
    assert_eq!(cached.class, "ceragon/ip10");
}

#[tokio::test]
async fn stale_cached_class_is_replaced() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let processor = common::processor(common::config(agent.port())).await;
    processor
        .cache()
        .set(
            localhost(),
            &CachedDevice {
                class: "ios".into(),
                properties: IdentifyProperties::default(),
            },
        )
        .await
        .unwrap();

    let id = identification(common::run(&processor, RequestKind::Identify).await);
    assert_eq!(id.class, "ironware");
    assert_eq!(id.properties.vendor.as_deref(), Some("Brocade"));
    assert_eq!(id.properties.os_version.as_deref(), Some("08.0.30T211"));
    let cached = processor.cache().get(localhost()).await.unwrap().unwrap();
    assert_eq!(cached.class, "ironware");
}

#[tokio::test]
async fn cached_class_that_still_matches_is_reused() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let processor = common::processor(common::config(agent.port())).await;

    common::run(&processor, RequestKind::Identify).await;
    let id = identification(common::run(&processor, RequestKind::Identify).await);
    assert_eq!(id.class, "ironware");
    assert_eq!(id.properties.model.as_deref(), Some("ICX7450-48"));
}

#[tokio::test]
async fn unknown_devices_fall_back_to_generic() {
    let agent = TestAgent::with_data(fixtures::system(
        "Acme Widget 3000",
        oid!(1, 3, 6, 1, 4, 1, 99999, 1),
    ))
    .await;
    let processor = common::processor(common::config(agent.port())).await;

    let id = identification(common::run(&processor, RequestKind::Identify).await);
    assert_eq!(id.class, "generic");
    assert_eq!(id.properties.model.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn check_identify_reports_mismatches() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let processor = common::processor(common::config(agent.port())).await;

    let mut request = Request::new(RequestKind::CheckIdentify, LOCALHOST);
    request.expected.vendor = Some("Brocade".into());
    request.expected.os_version = Some("09.0.10".into());
    let reply = processor.handle(request, CancellationToken::new()).await;
    let Response::Check(check) = common::success(reply.clone()) else {
        panic!("expected a check result");
    };
    assert_eq!(check.status, CheckStatus::Critical);
    assert!(check.long_output.unwrap_or_default().contains("os_version"));
    assert_eq!(reply.exit_code(), 2);
}

#[tokio::test]
async fn check_snmp_needs_no_class() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let processor = common::processor(common::config(agent.port())).await;

    let reply = common::run(&processor, RequestKind::CheckSnmp).await;
    assert_eq!(reply.exit_code(), 0);
    assert!(processor.cache().get(localhost()).await.unwrap().is_none());
}

const WEB_CLASS: &str = r#"
match:
  type: http
  path: /status
  match_mode: contains
  values: ["product=XR"]
properties:
  identify:
    vendor: {constant: Example Networks}
    model:
      http: {path: /status, parser: {regex: "product=(\\S+)"}}
    os_version:
      http: {path: /version.json, parser: {json_pointer: /firmware}}
"#;

#[tokio::test]
async fn http_only_devices_identify_through_http_recipes() {
    let dir = tempfile::tempdir().unwrap();
    let classes = dir.path().join("device-classes");
    std::fs::create_dir_all(&classes).unwrap();
    std::fs::create_dir_all(dir.path().join("mappings")).unwrap();
    std::fs::write(classes.join("generic.yaml"), "components: [identify]\n").unwrap();
    std::fs::write(classes.join("xr.yaml"), WEB_CLASS).unwrap();

    let web = HttpResponder::start(&[
        ("/", "ok"),
        ("/status", "product=XR-9 uptime=12"),
        ("/version.json", r#"{"firmware": "2.4.1"}"#),
    ])
    .await;
    // Nothing answers SNMP on this port.
    let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut config: Config = common::config(silent.local_addr().unwrap().port());
    config.connection.http.http_ports = vec![web.port()];
    config.assets = Some(dir.path().to_path_buf());
    let processor = common::processor(config).await;

    let id = identification(common::run(&processor, RequestKind::Identify).await);
    assert_eq!(id.class, "xr");
    assert_eq!(id.properties.vendor.as_deref(), Some("Example Networks"));
    assert_eq!(id.properties.model.as_deref(), Some("XR-9"));
    assert_eq!(id.properties.os_version.as_deref(), Some("2.4.1"));
}
