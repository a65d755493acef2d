//! Interface reads end to end: counter selection, vendor rewrites, filters
//! and per-target serialisation.

mod common;

use std::time::Duration;

use async_devmon::device::{Interface, Status};
use async_devmon::group::PropertyFilter;
use async_devmon::request::{CheckStatus, PerfValue};
use async_devmon::{Reply, Request, RequestKind, Response, oid};
use common::{LOCALHOST, TestAgent, fixtures};
use fixtures::Row;
use tokio_util::sync::CancellationToken;

fn interfaces(reply: Reply) -> Vec<Interface> {
    match common::success(reply) {
        Response::Interfaces(list) => list,
        other => panic!("expected interfaces, got {other:?}"),
    }
}

fn by_descr<'a>(list: &'a [Interface], descr: &str) -> Option<&'a Interface> {
    list.iter().find(|i| i.if_descr.as_deref() == Some(descr))
}

fn generic_device(rows: &[Row]) -> std::collections::BTreeMap<async_devmon::Oid, async_devmon::Value> {
    let mut data = fixtures::system("Acme Switch 9000", oid!(1, 3, 6, 1, 4, 1, 99999, 1));
    data.extend(fixtures::interfaces(rows));
    data
}

#[tokio::test]
async fn zero_hc_counter_falls_back_to_the_low_counter() {
    let mut zero = Row::new(1, "port1");
    zero.in_octets = 1_000;
    zero.hc_in_octets = Some(0);
    let mut wide = Row::new(2, "port2");
    wide.in_octets = 1_000;
    wide.hc_in_octets = Some(5_000_000_000);
    let agent = TestAgent::with_data(generic_device(&[zero, wide])).await;
    let processor = common::processor(common::config(agent.port())).await;

    let list = interfaces(common::run(&processor, RequestKind::ReadInterfaces).await);
    assert_eq!(list.len(), 2);
    assert_eq!(by_descr(&list, "port1").unwrap().traffic_counter_in(), Some(1_000));
    assert_eq!(
        by_descr(&list, "port2").unwrap().traffic_counter_in(),
        Some(5_000_000_000)
    );

    let reply = common::run(&processor, RequestKind::CheckInterfaceMetrics).await;
    assert_eq!(reply.exit_code(), 0);
    let Response::Check(check) = common::success(reply) else {
        panic!("expected a check result");
    };
    let traffic = |label: &str| {
        check
            .perf_data
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.value)
    };
    assert_eq!(traffic("port1_traffic_in"), Some(PerfValue::Counter(1_000)));
    assert_eq!(
        traffic("port2_traffic_in"),
        Some(PerfValue::Counter(5_000_000_000))
    );
}

#[tokio::test]
async fn ceragon_ip10_radio_takes_over_ethernet_8() {
    let agent = TestAgent::with_data(fixtures::ceragon_ip10("6.5.0.0.1")).await;
    let processor = common::processor(common::config(agent.port())).await;

    let list = interfaces(common::run(&processor, RequestKind::ReadInterfaces).await);
    assert!(by_descr(&list, "Ethernet #8").is_none());
    assert!(by_descr(&list, "Ethernet #1").is_some());
    let radio = by_descr(&list, "Radio Interface #1").expect("radio interface");
    assert_eq!(radio.if_oper_status, Some(Status::Up));
    assert_eq!(radio.if_in_octets, Some(7_000));
    assert_eq!(radio.if_out_octets, Some(9_000));
    assert_eq!(radio.if_in_errors, Some(3));
    assert_eq!(radio.if_speed, Some(400_000_000));
}

#[tokio::test]
async fn ceragon_ip10_release_7_keeps_the_reported_speed() {
    let agent = TestAgent::with_data(fixtures::ceragon_ip10("7.2.1")).await;
    let processor = common::processor(common::config(agent.port())).await;

    let list = interfaces(common::run(&processor, RequestKind::ReadInterfaces).await);
    let radio = by_descr(&list, "Radio Interface #1").expect("radio interface");
    assert_eq!(radio.if_speed, Some(400_000));
    assert_eq!(radio.if_in_octets, Some(7_000));
}

#[tokio::test]
async fn concurrent_requests_to_one_target_are_serialised() {
    let agent = TestAgent::builder()
        .data(fixtures::ironware())
        .delay("1.3.6.1.2.1.2.2.1.2", Duration::from_millis(200))
        .start()
        .await;
    let processor = common::processor(common::config(agent.port())).await;

    let ((first, second), took) = common::elapsed(async {
        tokio::join!(
            common::run(&processor, RequestKind::ReadInterfaces),
            common::run(&processor, RequestKind::ReadInterfaces),
        )
    })
    .await;
    assert_eq!(interfaces(first).len(), 1);
    assert_eq!(interfaces(second).len(), 1);
    assert!(took >= Duration::from_millis(400), "took {took:?}");
}

#[tokio::test]
async fn lock_can_be_skipped_per_request() {
    let agent = TestAgent::builder()
        .data(fixtures::ironware())
        .delay("1.3.6.1.2.1.2.2.1.2", Duration::from_millis(300))
        .start()
        .await;
    let processor = common::processor(common::config(agent.port())).await;
    // Warm the cache so neither request walks the class tree.
    common::run(&processor, RequestKind::Identify).await;

    let unlocked = || {
        let mut request = Request::new(RequestKind::ReadInterfaces, LOCALHOST);
        request.no_ip_lock = true;
        processor.handle(request, CancellationToken::new())
    };
    let ((first, second), _) = common::elapsed(async { tokio::join!(unlocked(), unlocked()) }).await;
    assert_eq!(interfaces(first).len(), 1);
    assert_eq!(interfaces(second).len(), 1);
    assert!(!processor.locks().is_locked(LOCALHOST.parse().unwrap()));
}

#[tokio::test]
async fn count_reads_if_number() {
    let rows = [Row::new(1, "a"), Row::new(2, "b"), Row::new(3, "c")];
    let agent = TestAgent::with_data(generic_device(&rows)).await;
    let processor = common::processor(common::config(agent.port())).await;

    let reply = common::run(&processor, RequestKind::ReadCountInterfaces).await;
    assert_eq!(common::success(reply), Response::Count(3));
}

#[tokio::test]
async fn group_filter_keeps_matching_rows() {
    let rows = [
        Row::new(1, "GigabitEthernet0/1"),
        Row::new(2, "GigabitEthernet0/2"),
        Row::new(3, "Loopback0"),
    ];
    let agent = TestAgent::with_data(generic_device(&rows)).await;
    let processor = common::processor(common::config(agent.port())).await;

    let mut request = Request::new(RequestKind::ReadInterfaces, LOCALHOST);
    request.filters = vec![
        PropertyFilter::Group {
            path: "ifDescr".into(),
            regex: "^Gigabit".into(),
        },
        PropertyFilter::Value {
            path: "ifSpeed".into(),
        },
    ];
    let list = interfaces(processor.handle(request, CancellationToken::new()).await);
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|i| i.if_speed.is_none()));
    assert!(by_descr(&list, "Loopback0").is_none());
}

#[tokio::test]
async fn descriptions_are_rewritten_on_request() {
    let rows = [Row::new(1, "GigabitEthernet0/1")];
    let agent = TestAgent::with_data(generic_device(&rows)).await;
    let processor = common::processor(common::config(agent.port())).await;

    let mut request = Request::new(RequestKind::ReadInterfaces, LOCALHOST);
    request.ifdescr_regex = Some("^GigabitEthernet".into());
    request.ifdescr_replace = Some("Gi".into());
    let list = interfaces(processor.handle(request, CancellationToken::new()).await);
    assert_eq!(list[0].if_descr.as_deref(), Some("Gi0/1"));
}

#[tokio::test]
async fn metrics_check_can_attach_csv() {
    let mut row = Row::new(1, "uplink, north");
    row.in_octets = 42;
    let agent = TestAgent::with_data(generic_device(&[row])).await;
    let processor = common::processor(common::config(agent.port())).await;

    let mut request = Request::new(RequestKind::CheckInterfaceMetrics, LOCALHOST);
    request.print_csv = true;
    let Response::Check(check) = common::success(processor.handle(request, CancellationToken::new()).await)
    else {
        panic!("expected a check result");
    };
    assert_eq!(check.status, CheckStatus::Ok);
    let csv = check.long_output.expect("csv output");
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("ifIndex,ifDescr"));
    assert!(lines.next().unwrap().starts_with("1,\"uplink, north\",up,"));
}

#[tokio::test]
async fn rewritten_descriptions_stay_unique() {
    let rows = [Row::new(1, "eth0/1"), Row::new(2, "eth0/2")];
    let agent = TestAgent::with_data(generic_device(&rows)).await;
    let processor = common::processor(common::config(agent.port())).await;

    let mut request = Request::new(RequestKind::ReadInterfaces, LOCALHOST);
    request.ifdescr_regex = Some(r"/\d+$".into());
    request.ifdescr_replace = Some(String::new());
    let list = interfaces(processor.handle(request, CancellationToken::new()).await);
    let mut names: Vec<_> = list.iter().filter_map(|i| i.if_descr.as_deref()).collect();
    names.sort_unstable();
    assert_eq!(names, ["eth0 1", "eth0 2"]);
}

#[tokio::test]
async fn metrics_report_packet_counters() {
    let mut zero = Row::new(1, "port1");
    zero.in_ucast_pkts = Some(500);
    zero.hc_in_ucast_pkts = Some(0);
    let mut wide = Row::new(2, "port2");
    wide.in_ucast_pkts = Some(500);
    wide.hc_in_ucast_pkts = Some(9_007_199_254_740_993);
    let agent = TestAgent::with_data(generic_device(&[zero, wide])).await;
    let processor = common::processor(common::config(agent.port())).await;

    let Response::Check(check) =
        common::success(common::run(&processor, RequestKind::CheckInterfaceMetrics).await)
    else {
        panic!("expected a check result");
    };
    let perf = |label: &str| check.perf_data.iter().find(|p| p.label == label);
    assert_eq!(
        perf("port1_packet_counter_unicast_in").map(|p| p.value),
        Some(PerfValue::Counter(500))
    );
    // Above 2^53, so a float would have rounded it.
    let wide = perf("port2_packet_counter_unicast_in").expect("unicast counter");
    assert!(wide.to_string().starts_with("'port2_packet_counter_unicast_in'=9007199254740993c;"));
    assert_eq!(
        perf("port1_oper_status").map(|p| p.value),
        Some(PerfValue::Gauge(1.0))
    );
    assert!(perf("port1_discards_in").is_none());
}
