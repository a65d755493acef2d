//! Aviat microwave radios.

use futures::future::BoxFuture;

use super::{Parent, column_map, scaled};
use crate::communicator::Communicator;
use crate::device::{Interface, Radio};
use crate::env::RequestEnv;
use crate::error::Result;
use crate::group::CompiledFilters;

/// Radio link table indexed by ifIndex; levels in tenths of dBm.
const RX_LEVEL: &str = ".1.3.6.1.4.1.2509.9.15.2.2.1.4";
const TX_LEVEL: &str = ".1.3.6.1.4.1.2509.9.15.2.2.1.5";
/// Capacity, kbit/s.
const CAPACITY: &str = ".1.3.6.1.4.1.2509.9.3.2.1.1.11";

pub(super) fn aviat(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Aviat { parent })
}

struct Aviat {
    parent: Parent,
}

impl Communicator for Aviat {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            let rx = column_map(env, RX_LEVEL).await?;
            let tx = column_map(env, TX_LEVEL).await?;
            let capacity = column_map(env, CAPACITY).await?;
            for iface in &mut list {
                let Some(index) = iface.if_index.map(|i| i.to_string()) else {
                    continue;
                };
                if !rx.contains_key(&index) && !tx.contains_key(&index) {
                    continue;
                }
                let bitrate = capacity
                    .get(&index)
                    .and_then(|c| c.as_uint().ok())
                    .map(|k| k.saturating_mul(1000));
                iface.radio = Some(Radio {
                    level_in: rx.get(&index).and_then(|v| scaled(v, 10.0)),
                    level_out: tx.get(&index).and_then(|v| scaled(v, 10.0)),
                    max_bitrate_in: bitrate,
                    max_bitrate_out: bitrate,
                });
                if iface.sub_type.is_none() {
                    iface.sub_type = Some("radio".into());
                }
            }
            Ok(list)
        })
    }
}
