//! Cache backings behind a processor.

mod common;

use std::net::IpAddr;

use async_devmon::RequestKind;
use async_devmon::config::CacheKind;
use common::{LOCALHOST, TestAgent, fixtures};

fn localhost() -> IpAddr {
    LOCALHOST.parse().unwrap()
}

#[cfg(feature = "disk-cache")]
#[tokio::test]
async fn disk_cache_outlives_the_processor() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::config(agent.port());
    config.cache.kind = CacheKind::Disk;
    config.cache.directory = dir.path().to_owned();

    {
        let processor = common::processor(config.clone()).await;
        let reply = common::run(&processor, RequestKind::Identify).await;
        assert_eq!(reply.exit_code(), 0);
    }

    let processor = common::processor(config.clone()).await;
    let cached = processor.cache().get(localhost()).await.unwrap().unwrap();
    assert_eq!(cached.class, "ironware");
    assert_eq!(cached.properties.vendor.as_deref(), Some("Brocade"));
    let data = processor
        .cache()
        .get_connection_data(localhost())
        .await
        .unwrap()
        .expect("connection data survives");
    assert_eq!(data.snmp.unwrap().port, agent.port());
    drop(processor);

    config.cache.rebuild = true;
    let processor = common::processor(config).await;
    assert_eq!(processor.cache().get(localhost()).await.unwrap(), None);
}

#[tokio::test]
async fn disabled_cache_still_answers() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let mut config = common::config(agent.port());
    config.cache.kind = CacheKind::None;
    let processor = common::processor(config).await;

    for _ in 0..2 {
        let reply = common::run(&processor, RequestKind::Identify).await;
        assert_eq!(reply.exit_code(), 0);
    }
    assert_eq!(processor.cache().get(localhost()).await.unwrap(), None);
    assert_eq!(
        processor.cache().get_connection_data(localhost()).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn check_snmp_caches_connection_data_only() {
    let agent = TestAgent::with_data(fixtures::ironware()).await;
    let processor = common::processor(common::config(agent.port())).await;

    let reply = common::run(&processor, RequestKind::CheckSnmp).await;
    assert_eq!(reply.exit_code(), 0);
    assert_eq!(processor.cache().get(localhost()).await.unwrap(), None);
    assert!(
        processor
            .cache()
            .get_connection_data(localhost())
            .await
            .unwrap()
            .is_some()
    );
}
