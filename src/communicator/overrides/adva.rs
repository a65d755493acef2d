//! ADVA FSP 3000 R7.

use std::collections::HashMap;

use futures::future::BoxFuture;

use super::{Parent, column, column_map, scaled};
use crate::codec::RawValue;
use crate::communicator::Communicator;
use crate::device::{Dwdm, Interface, Rate};
use crate::env::RequestEnv;
use crate::error::Result;
use crate::group::CompiledFilters;

/// Current optical power by ifIndex, tenths of dBm.
const POWER_TX: &str = ".1.3.6.1.4.1.2544.1.11.7.7.2.3.1.1";
const POWER_RX: &str = ".1.3.6.1.4.1.2544.1.11.7.7.2.3.1.2";
/// FEC counters indexed `<ifIndex>.<interval>`.
const FEC_CORRECTED: &str = ".1.3.6.1.4.1.2544.1.11.7.7.2.5.1.1";
const FEC_UNCORRECTED: &str = ".1.3.6.1.4.1.2544.1.11.7.7.2.5.1.2";

/// Interval codes of the FEC tables.
const INTERVALS: [(&str, &str); 2] = [("1", "15m"), ("2", "1d")];

pub(super) fn fsp3kr7(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Fsp3kR7 { parent })
}

struct Fsp3kR7 {
    parent: Parent,
}

impl Communicator for Fsp3kR7 {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            let tx = column_map(env, POWER_TX).await?;
            let rx = column_map(env, POWER_RX).await?;
            let corrected = column(env, FEC_CORRECTED).await?;
            let uncorrected = column(env, FEC_UNCORRECTED).await?;
            for iface in &mut list {
                let Some(index) = iface.if_index.map(|i| i.to_string()) else {
                    continue;
                };
                let dwdm = Dwdm {
                    rx_power: rx.get(&index).and_then(|v| scaled(v, 10.0)),
                    tx_power: tx.get(&index).and_then(|v| scaled(v, 10.0)),
                    corrected_fec: rates(&corrected, &index),
                    uncorrected_fec: rates(&uncorrected, &index),
                    channels: Vec::new(),
                };
                if has_data(&dwdm) {
                    iface.dwdm = Some(dwdm);
                    iface.sub_type.get_or_insert_with(|| "dwdm".into());
                }
            }
            Ok(list)
        })
    }
}

fn has_data(dwdm: &Dwdm) -> bool {
    dwdm.rx_power.is_some()
        || dwdm.tx_power.is_some()
        || !dwdm.corrected_fec.is_empty()
        || !dwdm.uncorrected_fec.is_empty()
}

fn rates(rows: &[(String, RawValue)], if_index: &str) -> Vec<Rate> {
    let by_interval: HashMap<&str, &RawValue> = rows
        .iter()
        .filter_map(|(index, value)| {
            let (i, interval) = index.split_once('.')?;
            (i == if_index).then_some((interval, value))
        })
        .collect();
    INTERVALS
        .iter()
        .filter_map(|(code, time)| {
            let value = by_interval.get(code)?.as_float().ok()?;
            Some(Rate { time: (*time).into(), value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fec_rates_by_interval() {
        let rows = vec![
            ("5.1".to_owned(), RawValue::Int(12)),
            ("5.2".to_owned(), RawValue::Int(4000)),
            ("6.1".to_owned(), RawValue::Int(1)),
            ("5.9".to_owned(), RawValue::Int(7)),
        ];
        let r = rates(&rows, "5");
        assert_eq!(r.len(), 2);
        assert_eq!((r[0].time.as_str(), r[0].value), ("15m", 12.0));
        assert_eq!((r[1].time.as_str(), r[1].value), ("1d", 4000.0));
        assert!(rates(&rows, "7").is_empty());
    }
}
