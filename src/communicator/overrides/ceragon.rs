use futures::future::BoxFuture;

use super::{Parent, column_map, scaled};
use crate::communicator::{Communicator, optional};
use crate::device::{Interface, Radio};
use crate::env::RequestEnv;
use crate::error::Result;
use crate::group::CompiledFilters;

const ETHERNET_8: &str = "Ethernet #8";
const RADIO_1: &str = "Radio Interface #1";

/// IP-20 radio status table, indexed by ifIndex.
const IP20_RX_LEVEL: &str = ".1.3.6.1.4.1.2281.10.7.1.1.2";
const IP20_TX_LEVEL: &str = ".1.3.6.1.4.1.2281.10.7.1.1.3";
/// Kbit/s.
const IP20_RX_BITRATE: &str = ".1.3.6.1.4.1.2281.10.7.1.1.8";
const IP20_TX_BITRATE: &str = ".1.3.6.1.4.1.2281.10.7.1.1.9";

pub(super) fn ip10(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Ip10 { parent })
}

pub(super) fn ip20(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Ip20 { parent })
}

struct Ip10 {
    parent: Parent,
}

impl Communicator for Ip10 {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            let os = optional(self.parent.os_version(env).await)?;
            let major = os.as_deref().and_then(major_version);
            tracing::debug!(target: "async_devmon::communicator", { os_version = ?os, major }, "ip10 radio fixup");
            fold_ethernet_into_radio(&mut list, major);
            Ok(list)
        })
    }
}

/// Leading number of a version string such as `6.5.0.0.1` or `V7.2`.
pub(crate) fn major_version(version: &str) -> Option<u32> {
    let digits: String = version
        .trim()
        .trim_start_matches(['V', 'v'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// IP-10 reports the radio link's traffic on the internal `Ethernet #8`
/// port. Its counters and status move onto `Radio Interface #1`, and
/// releases before 7 report the radio speed in kbit/s.
pub(crate) fn fold_ethernet_into_radio(list: &mut Vec<Interface>, os_major: Option<u32>) {
    let ethernet = list
        .iter()
        .position(|i| i.if_descr.as_deref().map(str::trim) == Some(ETHERNET_8))
        .map(|pos| list.remove(pos));
    let Some(radio) = list
        .iter_mut()
        .find(|i| i.if_descr.as_deref().map(str::trim) == Some(RADIO_1))
    else {
        return;
    };
    if let Some(eth) = ethernet {
        macro_rules! copy {
            ($($field:ident),*) => {
                $(if eth.$field.is_some() {
                    radio.$field = eth.$field.clone();
                })*
            };
        }
        copy!(
            if_oper_status,
            if_in_octets,
            if_out_octets,
            if_hc_in_octets,
            if_hc_out_octets,
            if_in_errors,
            if_out_errors
        );
    }
    if os_major.is_some_and(|m| m < 7) {
        radio.if_speed = radio.if_speed.map(|s| s.saturating_mul(1000));
    }
}

struct Ip20 {
    parent: Parent,
}

impl Communicator for Ip20 {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            let rx = column_map(env, IP20_RX_LEVEL).await?;
            if rx.is_empty() {
                return Ok(list);
            }
            let tx = column_map(env, IP20_TX_LEVEL).await?;
            let rx_rate = column_map(env, IP20_RX_BITRATE).await?;
            let tx_rate = column_map(env, IP20_TX_BITRATE).await?;
            for iface in &mut list {
                let Some(index) = iface.if_index.map(|i| i.to_string()) else {
                    continue;
                };
                let Some(level_in) = rx.get(&index) else {
                    continue;
                };
                let kbps = |v: Option<&crate::codec::RawValue>| {
                    v.and_then(|v| v.as_uint().ok()).map(|k| k.saturating_mul(1000))
                };
                iface.radio = Some(Radio {
                    level_in: scaled(level_in, 1.0),
                    level_out: tx.get(&index).and_then(|v| scaled(v, 1.0)),
                    max_bitrate_in: kbps(rx_rate.get(&index)),
                    max_bitrate_out: kbps(tx_rate.get(&index)),
                });
            }
            Ok(list)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Status;

    fn iface(index: u64, descr: &str) -> Interface {
        Interface {
            if_index: Some(index),
            if_descr: Some(descr.into()),
            ..Default::default()
        }
    }

    #[test]
    fn major_version_parsing() {
        assert_eq!(major_version("6.5"), Some(6));
        assert_eq!(major_version("V7.2.1"), Some(7));
        assert_eq!(major_version("unknown"), None);
    }

    #[test]
    fn ethernet_8_folds_into_the_radio_interface() {
        let mut eth8 = iface(8, "Ethernet #8");
        eth8.if_oper_status = Some(Status::Down);
        eth8.if_in_octets = Some(111);
        eth8.if_out_octets = Some(222);
        eth8.if_in_errors = Some(3);
        eth8.if_out_errors = Some(4);
        let mut radio = iface(20, "Radio Interface #1");
        radio.if_oper_status = Some(Status::Up);
        radio.if_speed = Some(155_000);
        let mut list = vec![iface(1, "Ethernet #1"), eth8, radio];

        fold_ethernet_into_radio(&mut list, Some(6));

        assert_eq!(list.len(), 2);
        let radio = &list[1];
        assert_eq!(radio.if_oper_status, Some(Status::Down));
        assert_eq!(radio.if_in_octets, Some(111));
        assert_eq!(radio.if_out_octets, Some(222));
        assert_eq!(radio.if_in_errors, Some(3));
        assert_eq!(radio.if_out_errors, Some(4));
        assert_eq!(radio.if_speed, Some(155_000_000));
    }

    #[test]
    fn newer_releases_keep_the_radio_speed() {
        let mut radio = iface(20, "Radio Interface #1");
        radio.if_speed = Some(155_000_000);
        let mut list = vec![radio];
        fold_ethernet_into_radio(&mut list, Some(7));
        assert_eq!(list[0].if_speed, Some(155_000_000));
        fold_ethernet_into_radio(&mut list, None);
        assert_eq!(list[0].if_speed, Some(155_000_000));
    }
}
