use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{FromRecord, Record, Status};

/// One network interface: IF-MIB columns plus vendor sub-records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(rename = "ifIndex", default, skip_serializing_if = "Option::is_none")]
    pub if_index: Option<u64>,
    #[serde(rename = "ifDescr", default, skip_serializing_if = "Option::is_none")]
    pub if_descr: Option<String>,
    #[serde(rename = "ifType", default, skip_serializing_if = "Option::is_none")]
    pub if_type: Option<String>,
    #[serde(rename = "ifMtu", default, skip_serializing_if = "Option::is_none")]
    pub if_mtu: Option<u64>,
    #[serde(rename = "ifSpeed", default, skip_serializing_if = "Option::is_none")]
    pub if_speed: Option<u64>,
    #[serde(rename = "ifPhysAddress", default, skip_serializing_if = "Option::is_none")]
    pub if_phys_address: Option<String>,
    #[serde(rename = "ifAdminStatus", default, skip_serializing_if = "Option::is_none")]
    pub if_admin_status: Option<Status>,
    #[serde(rename = "ifOperStatus", default, skip_serializing_if = "Option::is_none")]
    pub if_oper_status: Option<Status>,
    #[serde(rename = "ifLastChange", default, skip_serializing_if = "Option::is_none")]
    pub if_last_change: Option<u64>,
    #[serde(rename = "ifInOctets", default, skip_serializing_if = "Option::is_none")]
    pub if_in_octets: Option<u64>,
    #[serde(rename = "ifInUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_in_ucast_pkts: Option<u64>,
    #[serde(rename = "ifInNUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_in_nucast_pkts: Option<u64>,
    #[serde(rename = "ifInDiscards", default, skip_serializing_if = "Option::is_none")]
    pub if_in_discards: Option<u64>,
    #[serde(rename = "ifInErrors", default, skip_serializing_if = "Option::is_none")]
    pub if_in_errors: Option<u64>,
    #[serde(rename = "ifInUnknownProtos", default, skip_serializing_if = "Option::is_none")]
    pub if_in_unknown_protos: Option<u64>,
    #[serde(rename = "ifOutOctets", default, skip_serializing_if = "Option::is_none")]
    pub if_out_octets: Option<u64>,
    #[serde(rename = "ifOutUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_out_ucast_pkts: Option<u64>,
    #[serde(rename = "ifOutNUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_out_nucast_pkts: Option<u64>,
    #[serde(rename = "ifOutDiscards", default, skip_serializing_if = "Option::is_none")]
    pub if_out_discards: Option<u64>,
    #[serde(rename = "ifOutErrors", default, skip_serializing_if = "Option::is_none")]
    pub if_out_errors: Option<u64>,
    #[serde(rename = "ifName", default, skip_serializing_if = "Option::is_none")]
    pub if_name: Option<String>,
    #[serde(rename = "ifInMulticastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_in_multicast_pkts: Option<u64>,
    #[serde(rename = "ifInBroadcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_in_broadcast_pkts: Option<u64>,
    #[serde(rename = "ifOutMulticastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_out_multicast_pkts: Option<u64>,
    #[serde(rename = "ifOutBroadcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_out_broadcast_pkts: Option<u64>,
    #[serde(rename = "ifHCInOctets", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_in_octets: Option<u64>,
    #[serde(rename = "ifHCInUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_in_ucast_pkts: Option<u64>,
    #[serde(rename = "ifHCInMulticastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_in_multicast_pkts: Option<u64>,
    #[serde(rename = "ifHCInBroadcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_in_broadcast_pkts: Option<u64>,
    #[serde(rename = "ifHCOutOctets", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_out_octets: Option<u64>,
    #[serde(rename = "ifHCOutUcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_out_ucast_pkts: Option<u64>,
    #[serde(rename = "ifHCOutMulticastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_out_multicast_pkts: Option<u64>,
    #[serde(rename = "ifHCOutBroadcastPkts", default, skip_serializing_if = "Option::is_none")]
    pub if_hc_out_broadcast_pkts: Option<u64>,
    #[serde(rename = "ifHighSpeed", default, skip_serializing_if = "Option::is_none")]
    pub if_high_speed: Option<u64>,
    #[serde(rename = "ifAlias", default, skip_serializing_if = "Option::is_none")]
    pub if_alias: Option<String>,
    #[serde(rename = "maxSpeedIn", default, skip_serializing_if = "Option::is_none")]
    pub max_speed_in: Option<u64>,
    #[serde(rename = "maxSpeedOut", default, skip_serializing_if = "Option::is_none")]
    pub max_speed_out: Option<u64>,
    #[serde(rename = "subType", default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet_like: Option<EthernetLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio: Option<Radio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dwdm: Option<Dwdm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optical_transponder: Option<OpticalTransponder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optical_amplifier: Option<OpticalAmplifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optical_opm: Option<OpticalOpm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sap: Option<Sap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Vlan>,
}

/// EtherLike-MIB dot3StatsTable counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EthernetLike {
    #[serde(rename = "dot3StatsAlignmentErrors", default, skip_serializing_if = "Option::is_none")]
    pub alignment_errors: Option<u64>,
    #[serde(rename = "dot3StatsFCSErrors", default, skip_serializing_if = "Option::is_none")]
    pub fcs_errors: Option<u64>,
    #[serde(rename = "dot3StatsSingleCollisionFrames", default, skip_serializing_if = "Option::is_none")]
    pub single_collision_frames: Option<u64>,
    #[serde(rename = "dot3StatsMultipleCollisionFrames", default, skip_serializing_if = "Option::is_none")]
    pub multiple_collision_frames: Option<u64>,
    #[serde(rename = "dot3StatsSQETestErrors", default, skip_serializing_if = "Option::is_none")]
    pub sqe_test_errors: Option<u64>,
    #[serde(rename = "dot3StatsDeferredTransmissions", default, skip_serializing_if = "Option::is_none")]
    pub deferred_transmissions: Option<u64>,
    #[serde(rename = "dot3StatsLateCollisions", default, skip_serializing_if = "Option::is_none")]
    pub late_collisions: Option<u64>,
    #[serde(rename = "dot3StatsExcessiveCollisions", default, skip_serializing_if = "Option::is_none")]
    pub excessive_collisions: Option<u64>,
    #[serde(rename = "dot3StatsInternalMacTransmitErrors", default, skip_serializing_if = "Option::is_none")]
    pub internal_mac_transmit_errors: Option<u64>,
    #[serde(rename = "dot3StatsCarrierSenseErrors", default, skip_serializing_if = "Option::is_none")]
    pub carrier_sense_errors: Option<u64>,
    #[serde(rename = "dot3StatsFrameTooLongs", default, skip_serializing_if = "Option::is_none")]
    pub frame_too_longs: Option<u64>,
    #[serde(rename = "dot3StatsInternalMacReceiveErrors", default, skip_serializing_if = "Option::is_none")]
    pub internal_mac_receive_errors: Option<u64>,
}

/// Microwave radio link levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Radio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_out: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate_out: Option<u64>,
}

/// A sampled rate tagged with its interval (`15m` or `1d`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub time: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalChannel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<f64>,
}

/// DWDM line data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dwdm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrected_fec: Vec<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncorrected_fec: Vec<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<OpticalChannel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalTransponder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrected_fec: Vec<Rate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncorrected_fec: Vec<Rate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalAmplifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
}

/// Optical power monitor with per-channel readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpticalOpm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<OpticalChannel>,
}

/// Service access point bound to a port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_vlan: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_vlan: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlanEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vlan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<VlanEntry>,
}

impl FromRecord for Interface {
    fn from_record(r: &Record) -> Self {
        let mut iface = Self {
            if_index: r.uint("ifIndex"),
            if_descr: r.string("ifDescr"),
            if_type: r.string("ifType"),
            if_mtu: r.uint("ifMtu"),
            if_speed: r.uint("ifSpeed"),
            if_phys_address: r.string("ifPhysAddress"),
            if_admin_status: r.status("ifAdminStatus"),
            if_oper_status: r.status("ifOperStatus"),
            if_last_change: r.uint("ifLastChange"),
            if_in_octets: r.uint("ifInOctets"),
            if_in_ucast_pkts: r.uint("ifInUcastPkts"),
            if_in_nucast_pkts: r.uint("ifInNUcastPkts"),
            if_in_discards: r.uint("ifInDiscards"),
            if_in_errors: r.uint("ifInErrors"),
            if_in_unknown_protos: r.uint("ifInUnknownProtos"),
            if_out_octets: r.uint("ifOutOctets"),
            if_out_ucast_pkts: r.uint("ifOutUcastPkts"),
            if_out_nucast_pkts: r.uint("ifOutNUcastPkts"),
            if_out_discards: r.uint("ifOutDiscards"),
            if_out_errors: r.uint("ifOutErrors"),
            if_name: r.string("ifName"),
            if_in_multicast_pkts: r.uint("ifInMulticastPkts"),
            if_in_broadcast_pkts: r.uint("ifInBroadcastPkts"),
            if_out_multicast_pkts: r.uint("ifOutMulticastPkts"),
            if_out_broadcast_pkts: r.uint("ifOutBroadcastPkts"),
            if_hc_in_octets: r.uint("ifHCInOctets"),
            if_hc_in_ucast_pkts: r.uint("ifHCInUcastPkts"),
            if_hc_in_multicast_pkts: r.uint("ifHCInMulticastPkts"),
            if_hc_in_broadcast_pkts: r.uint("ifHCInBroadcastPkts"),
            if_hc_out_octets: r.uint("ifHCOutOctets"),
            if_hc_out_ucast_pkts: r.uint("ifHCOutUcastPkts"),
            if_hc_out_multicast_pkts: r.uint("ifHCOutMulticastPkts"),
            if_hc_out_broadcast_pkts: r.uint("ifHCOutBroadcastPkts"),
            if_high_speed: r.uint("ifHighSpeed"),
            if_alias: r.string("ifAlias"),
            max_speed_in: r.uint("maxSpeedIn"),
            max_speed_out: r.uint("maxSpeedOut"),
            sub_type: r.string("subType"),
            ..Self::default()
        };

        if r.has_section("ethernet_like") {
            let f = |name: &str| r.uint(&format!("ethernet_like.{name}"));
            iface.ethernet_like = Some(EthernetLike {
                alignment_errors: f("dot3StatsAlignmentErrors"),
                fcs_errors: f("dot3StatsFCSErrors"),
                single_collision_frames: f("dot3StatsSingleCollisionFrames"),
                multiple_collision_frames: f("dot3StatsMultipleCollisionFrames"),
                sqe_test_errors: f("dot3StatsSQETestErrors"),
                deferred_transmissions: f("dot3StatsDeferredTransmissions"),
                late_collisions: f("dot3StatsLateCollisions"),
                excessive_collisions: f("dot3StatsExcessiveCollisions"),
                internal_mac_transmit_errors: f("dot3StatsInternalMacTransmitErrors"),
                carrier_sense_errors: f("dot3StatsCarrierSenseErrors"),
                frame_too_longs: f("dot3StatsFrameTooLongs"),
                internal_mac_receive_errors: f("dot3StatsInternalMacReceiveErrors"),
            });
        }
        if r.has_section("radio") {
            iface.radio = Some(Radio {
                level_in: r.float("radio.level_in"),
                level_out: r.float("radio.level_out"),
                max_bitrate_in: r.uint("radio.max_bitrate_in"),
                max_bitrate_out: r.uint("radio.max_bitrate_out"),
            });
        }
        if r.has_section("dwdm") {
            iface.dwdm = Some(Dwdm {
                rx_power: r.float("dwdm.rx_power"),
                tx_power: r.float("dwdm.tx_power"),
                ..Dwdm::default()
            });
        }
        if r.has_section("sap") {
            iface.sap = Some(Sap {
                service_id: r.uint("sap.service_id"),
                outer_vlan: r.uint("sap.outer_vlan"),
                inner_vlan: r.uint("sap.inner_vlan"),
                description: r.string("sap.description"),
            });
        }
        iface
    }
}

impl Interface {
    /// Inbound octets, preferring the 64-bit counter.
    pub fn traffic_counter_in(&self) -> Option<u64> {
        select_counter(self.if_hc_in_octets, self.if_in_octets)
    }

    pub fn traffic_counter_out(&self) -> Option<u64> {
        select_counter(self.if_hc_out_octets, self.if_out_octets)
    }

    pub fn packet_counter_unicast_in(&self) -> Option<u64> {
        select_counter(self.if_hc_in_ucast_pkts, self.if_in_ucast_pkts)
    }

    pub fn packet_counter_unicast_out(&self) -> Option<u64> {
        select_counter(self.if_hc_out_ucast_pkts, self.if_out_ucast_pkts)
    }

    pub fn packet_counter_multicast_in(&self) -> Option<u64> {
        select_counter(self.if_hc_in_multicast_pkts, self.if_in_multicast_pkts)
    }

    pub fn packet_counter_multicast_out(&self) -> Option<u64> {
        select_counter(self.if_hc_out_multicast_pkts, self.if_out_multicast_pkts)
    }

    pub fn packet_counter_broadcast_in(&self) -> Option<u64> {
        select_counter(self.if_hc_in_broadcast_pkts, self.if_in_broadcast_pkts)
    }

    pub fn packet_counter_broadcast_out(&self) -> Option<u64> {
        select_counter(self.if_hc_out_broadcast_pkts, self.if_out_broadcast_pkts)
    }
}

/// The HC counter wins when it is non-zero or the 32-bit counter is absent.
pub(crate) fn select_counter(hc: Option<u64>, low: Option<u64>) -> Option<u64> {
    match (hc, low) {
        (Some(h), _) if h != 0 => Some(h),
        (h, None) => h,
        (_, low) => low,
    }
}

/// Make every `ifDescr` unique by appending the ifIndex to duplicates.
pub fn dedupe_descriptions(interfaces: &mut [Interface]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for iface in interfaces.iter() {
        if let Some(descr) = &iface.if_descr {
            *seen.entry(descr.trim().to_owned()).or_default() += 1;
        }
    }
    for iface in interfaces.iter_mut() {
        let Some(descr) = iface.if_descr.as_ref().map(|d| d.trim().to_owned()) else {
            continue;
        };
        if seen.get(&descr).copied().unwrap_or(0) > 1 {
            if let Some(index) = iface.if_index {
                iface.if_descr = Some(format!("{descr} {index}"));
                continue;
            }
        }
        iface.if_descr = Some(descr);
    }
}
