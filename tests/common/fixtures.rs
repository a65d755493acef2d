//! MIB fixtures for the device classes exercised by the integration tests.

use std::collections::BTreeMap;

use async_devmon::{Oid, Value, oid};

pub const SYS_DESCR: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYS_OBJECT_ID: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 2, 0];

fn text(s: &str) -> Value {
    Value::OctetString(s.to_owned().into())
}

/// sysDescr and sysObjectID.
pub fn system(descr: &str, object_id: Oid) -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();
    data.insert(Oid::from(SYS_DESCR), text(descr));
    data.insert(Oid::from(SYS_OBJECT_ID), Value::ObjectIdentifier(object_id));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123_456));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), text("test-device"));
    data
}

/// One row of the interface tables.
#[derive(Clone)]
pub struct Row {
    pub index: u32,
    pub descr: &'static str,
    pub oper_status: i32,
    pub speed: u32,
    pub in_octets: u32,
    pub out_octets: u32,
    pub in_errors: u32,
    pub hc_in_octets: Option<u64>,
    pub in_ucast_pkts: Option<u32>,
    pub hc_in_ucast_pkts: Option<u64>,
}

impl Row {
    pub fn new(index: u32, descr: &'static str) -> Self {
        Self {
            index,
            descr,
            oper_status: 1,
            speed: 100_000_000,
            in_octets: 0,
            out_octets: 0,
            in_errors: 0,
            hc_in_octets: None,
            in_ucast_pkts: None,
            hc_in_ucast_pkts: None,
        }
    }
}

/// ifNumber, ifTable and, where a row has them, ifInUcastPkts and the
/// ifXTable HC counters.
pub fn interfaces(rows: &[Row]) -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();
    data.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(rows.len() as i32));
    for row in rows {
        let column = |c: u32| oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, c, row.index);
        data.insert(column(1), Value::Integer(row.index as i32));
        data.insert(column(2), text(row.descr));
        data.insert(column(3), Value::Integer(6));
        data.insert(column(5), Value::Gauge32(row.speed));
        data.insert(column(7), Value::Integer(1));
        data.insert(column(8), Value::Integer(row.oper_status));
        data.insert(column(10), Value::Counter32(row.in_octets));
        data.insert(column(14), Value::Counter32(row.in_errors));
        data.insert(column(16), Value::Counter32(row.out_octets));
        data.insert(column(20), Value::Counter32(0));
        if let Some(hc) = row.hc_in_octets {
            data.insert(oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6, row.index), Value::Counter64(hc));
        }
        if let Some(pkts) = row.in_ucast_pkts {
            data.insert(column(11), Value::Counter32(pkts));
        }
        if let Some(hc) = row.hc_in_ucast_pkts {
            data.insert(oid!(1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 7, row.index), Value::Counter64(hc));
        }
    }
    data
}

/// A Ceragon IP-10 running `os_version`, with the radio traffic on
/// `Ethernet #8`.
pub fn ceragon_ip10(os_version: &str) -> BTreeMap<Oid, Value> {
    let mut data = system(
        "Ceragon FibeAir IP-10 G-Series",
        oid!(1, 3, 6, 1, 4, 1, 2281, 1, 10),
    );
    data.insert(
        oid!(1, 3, 6, 1, 4, 1, 2281, 10, 4, 1, 13, 1, 1, 3, 1),
        text(os_version),
    );
    data.insert(
        oid!(1, 3, 6, 1, 4, 1, 2281, 10, 4, 1, 13, 1, 1, 5, 1),
        text("CRG0042 "),
    );
    let mut ethernet = Row::new(8, "Ethernet #8");
    ethernet.oper_status = 1;
    ethernet.in_octets = 7_000;
    ethernet.out_octets = 9_000;
    ethernet.in_errors = 3;
    let mut radio = Row::new(10, "Radio Interface #1");
    radio.oper_status = 2;
    radio.speed = 400_000;
    data.extend(interfaces(&[Row::new(1, "Ethernet #1"), ethernet, radio]));
    data
}

pub fn ironware() -> BTreeMap<Oid, Value> {
    let mut data = system(
        "Brocade Communications Systems, Inc. ICX7450-48, IronWare Version 08.0.30T211",
        oid!(1, 3, 6, 1, 4, 1, 1991, 1, 3, 62, 2, 1),
    );
    data.extend(interfaces(&[Row::new(1, "GigabitEthernet1/1/1")]));
    data
}
