//! Nokia (Alcatel-Lucent) TiMOS service routers and the SAS access
//! family.
//!
//! Service access points are reported as extra interfaces named after
//! their port and encapsulation, each carrying a `sap` sub-record.

use std::collections::HashMap;

use futures::future::BoxFuture;

use super::{Parent, column, column_map};
use crate::communicator::Communicator;
use crate::device::{Interface, Sap, Status};
use crate::env::RequestEnv;
use crate::error::Result;
use crate::group::CompiledFilters;

/// TIMETRA-SAP-MIB sapBaseInfoTable, indexed `<svcId>.<portId>.<encap>`.
const SAP_DESCRIPTION: &str = ".1.3.6.1.4.1.6527.3.1.2.4.3.2.1.5";
const SAP_OPER_STATUS: &str = ".1.3.6.1.4.1.6527.3.1.2.4.3.2.1.7";
/// sapBaseStatsTable forwarded octets, same index.
const SAP_INGRESS_OCTETS: &str = ".1.3.6.1.4.1.6527.3.1.2.4.3.3.1.6";
const SAP_EGRESS_OCTETS: &str = ".1.3.6.1.4.1.6527.3.1.2.4.3.3.1.22";

/// ifSpeed saturates at this value on fast ports.
const SPEED_SATURATED: u64 = u32::MAX as u64;

pub(super) fn timos(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Timos { parent })
}

pub(super) fn sas(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Sas { parent })
}

struct Timos {
    parent: Parent,
}

impl Communicator for Timos {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            let descriptions = column(env, SAP_DESCRIPTION).await?;
            if descriptions.is_empty() {
                return Ok(list);
            }
            let status = column_map(env, SAP_OPER_STATUS).await?;
            let ingress = column_map(env, SAP_INGRESS_OCTETS).await?;
            let egress = column_map(env, SAP_EGRESS_OCTETS).await?;

            let ports: HashMap<u64, String> = list
                .iter()
                .filter_map(|i| Some((i.if_index?, i.if_descr.clone()?)))
                .collect();
            for (index, description) in descriptions {
                let Some(key) = SapIndex::parse(&index) else {
                    continue;
                };
                let port = ports
                    .get(&key.port)
                    .cloned()
                    .unwrap_or_else(|| key.port.to_string());
                let description = description.as_string();
                list.push(Interface {
                    if_descr: Some(key.name(&port)),
                    if_alias: (!description.is_empty()).then(|| description.clone()),
                    if_oper_status: status
                        .get(&index)
                        .and_then(|s| s.as_int().ok())
                        .and_then(Status::from_code),
                    if_hc_in_octets: ingress.get(&index).and_then(|v| v.as_uint().ok()),
                    if_hc_out_octets: egress.get(&index).and_then(|v| v.as_uint().ok()),
                    sub_type: Some("sap".into()),
                    sap: Some(Sap {
                        service_id: Some(key.service),
                        outer_vlan: key.outer,
                        inner_vlan: key.inner,
                        description: Some(description),
                    }),
                    ..Interface::default()
                });
            }
            Ok(list)
        })
    }
}

/// Decoded sapBaseInfoTable index.
#[derive(Debug, PartialEq, Eq)]
struct SapIndex {
    service: u64,
    port: u64,
    outer: Option<u64>,
    inner: Option<u64>,
}

impl SapIndex {
    /// The encapsulation value packs the inner tag in the high 16 bits and
    /// the outer tag in the low 16; null encapsulation is 0.
    fn parse(index: &str) -> Option<Self> {
        let mut parts = index.split('.').map(str::parse::<u64>);
        let service = parts.next()?.ok()?;
        let port = parts.next()?.ok()?;
        let encap = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        let outer = encap & 0xffff;
        let inner = encap >> 16;
        Some(Self {
            service,
            port,
            outer: (encap != 0).then_some(outer),
            inner: (inner != 0).then_some(inner),
        })
    }

    fn name(&self, port: &str) -> String {
        match (self.outer, self.inner) {
            (Some(outer), Some(inner)) => format!("{port}:{outer}.{inner}"),
            (Some(outer), None) => format!("{port}:{outer}"),
            _ => format!("{port}:{}", self.service),
        }
    }
}

struct Sas {
    parent: Parent,
}

impl Communicator for Sas {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            list.iter_mut().for_each(fix_speed);
            Ok(list)
        })
    }
}

/// SAS ports report 0 or a saturated ifSpeed; ifHighSpeed is in Mbit/s.
fn fix_speed(iface: &mut Interface) {
    if !matches!(iface.if_speed, Some(0) | Some(SPEED_SATURATED)) {
        return;
    }
    if let Some(high) = iface.if_high_speed {
        iface.if_speed = Some(high.saturating_mul(1_000_000));
    }
}
