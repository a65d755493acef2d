//! Ekinops 360 optical chassis.
//!
//! The management board lists the pluggable modules by slot. Each module
//! exposes its own MIB behind the community `<community>@<slot>`, so every
//! module is read through a sibling client. Optical powers are reported in
//! hundredths of dBm.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::{Parent, column, column_on, scaled};
use crate::codec::RawValue;
use crate::communicator::Communicator;
use crate::device::{
    Interface, OpticalAmplifier, OpticalChannel, OpticalOpm, OpticalTransponder, Rate,
};
use crate::env::RequestEnv;
use crate::error::{Error, Result};
use crate::group::CompiledFilters;
use crate::network::SnmpClient;

/// Board table on the management module, indexed by slot.
const BOARD_NAME: &str = ".1.3.6.1.4.1.20044.7.8.1.1.3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleKind {
    Amplifier,
    Transponder,
    Opm,
    RoadmFlex,
}

/// Port table of one module family: column 2 label, 3 rx, 4 tx, then two
/// family-specific columns.
struct Layout {
    kind: ModuleKind,
    prefixes: &'static [&'static str],
    ports: &'static str,
    /// Per-channel power, indexed `<port>.<channel>`.
    channels: Option<&'static str>,
}

static LAYOUTS: &[Layout] = &[
    Layout {
        kind: ModuleKind::Amplifier,
        prefixes: &["PM_OAIL", "PM_OABP", "PM_OAB"],
        ports: ".1.3.6.1.4.1.20044.23.3.2.1",
        channels: None,
    },
    Layout {
        kind: ModuleKind::Transponder,
        prefixes: &["PM_1001", "PM_C1008", "PM_10010", "PM_200"],
        ports: ".1.3.6.1.4.1.20044.30.3.3.1",
        channels: None,
    },
    Layout {
        kind: ModuleKind::Opm,
        prefixes: &["PM_OPM"],
        ports: ".1.3.6.1.4.1.20044.64.3.2.1",
        channels: Some(".1.3.6.1.4.1.20044.64.3.3.1"),
    },
    Layout {
        kind: ModuleKind::RoadmFlex,
        prefixes: &["PM_ROADM-FLEX", "PM_ROADM"],
        ports: ".1.3.6.1.4.1.20044.94.3.2.1",
        channels: Some(".1.3.6.1.4.1.20044.94.3.3.1"),
    },
];

fn layout_for(board: &str) -> Option<&'static Layout> {
    LAYOUTS
        .iter()
        .find(|l| l.prefixes.iter().any(|p| board.starts_with(p)))
}

pub(super) fn ekinops(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Ekinops { parent })
}

struct Ekinops {
    parent: Parent,
}

impl Communicator for Ekinops {
    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let snmp = env.connection.snmp()?;
            let Some(community) = snmp.community() else {
                return Err(Error::not_implemented("ekinops modules over SNMPv3"));
            };
            let boards = column(env, BOARD_NAME).await?;
            let mut list = self.parent.interfaces(env, &CompiledFilters::default()).await?;
            for (slot, board) in boards {
                let board = board.as_string();
                let Some(layout) = layout_for(&board) else {
                    debug!(target: "async_devmon::communicator", slot = %slot, board = %board, "unsupported module");
                    continue;
                };
                let sibling = snmp.with_community(&format!("{community}@{slot}")).await?;
                match read_module(env, &sibling, &slot, &board, layout).await {
                    Ok(ports) => list.extend(ports),
                    Err(e) if crate::recipe::is_absent(&e) => {
                        warn!(target: "async_devmon::communicator", slot = %slot, board = %board, error = %e, "module unreadable");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(list)
        })
    }
}

/// One port row with its raw columns.
#[derive(Debug, Default)]
struct PortRow {
    label: Option<String>,
    rx: Option<f64>,
    tx: Option<f64>,
    fifth: Option<f64>,
    sixth: Option<f64>,
}

async fn read_module(
    env: &RequestEnv,
    snmp: &SnmpClient,
    slot: &str,
    board: &str,
    layout: &Layout,
) -> Result<Vec<Interface>> {
    let mut columns: Vec<HashMap<String, RawValue>> = Vec::with_capacity(5);
    for col in 2..=6 {
        let base = format!("{}.{col}", layout.ports);
        columns.push(column_on(env, snmp, &base).await?.into_iter().collect());
    }
    let channels = match layout.channels {
        Some(base) => column_on(env, snmp, &format!("{base}.3")).await?,
        None => Vec::new(),
    };

    let mut ports: Vec<&String> = columns[0].keys().collect();
    ports.sort_by_key(|p| p.parse::<u64>().unwrap_or(u64::MAX));
    Ok(ports
        .into_iter()
        .map(|port| {
            let at = |i: usize| columns[i].get(port);
            let row = PortRow {
                label: at(0).map(RawValue::as_string),
                rx: at(1).and_then(|v| scaled(v, 100.0)),
                tx: at(2).and_then(|v| scaled(v, 100.0)),
                fifth: at(3).and_then(|v| v.as_float().ok()),
                sixth: at(4).and_then(|v| v.as_float().ok()),
            };
            port_interface(slot, port, board, layout.kind, row, channels_of(&channels, port))
        })
        .collect())
}

/// Channel powers of `port` from a `<port>.<channel>` indexed column.
fn channels_of(rows: &[(String, RawValue)], port: &str) -> Vec<OpticalChannel> {
    rows.iter()
        .filter_map(|(index, value)| {
            let (p, channel) = index.split_once('.')?;
            (p == port).then(|| OpticalChannel {
                channel: Some(channel.to_owned()),
                rx_power: scaled(value, 100.0),
                tx_power: None,
            })
        })
        .collect()
}

fn port_interface(
    slot: &str,
    port: &str,
    board: &str,
    kind: ModuleKind,
    row: PortRow,
    channels: Vec<OpticalChannel>,
) -> Interface {
    let identifier = Some(format!("{slot}/{port}"));
    let descr = match &row.label {
        Some(label) => format!("{board} {slot}/{port} {label}"),
        None => format!("{board} {slot}/{port}"),
    };
    let mut iface = Interface {
        if_descr: Some(descr),
        ..Interface::default()
    };
    match kind {
        ModuleKind::Amplifier => {
            iface.sub_type = Some("optical_amplifier".into());
            iface.optical_amplifier = Some(OpticalAmplifier {
                identifier,
                label: row.label,
                rx_power: row.rx,
                tx_power: row.tx,
                gain: row.fifth.map(|g| g / 100.0),
            });
        }
        ModuleKind::Transponder => {
            let rate = |v: Option<f64>| -> Vec<Rate> {
                v.map(|value| Rate { time: "15m".into(), value })
                    .into_iter()
                    .collect()
            };
            iface.sub_type = Some("optical_transponder".into());
            iface.optical_transponder = Some(OpticalTransponder {
                identifier,
                label: row.label,
                rx_power: row.rx,
                tx_power: row.tx,
                corrected_fec: rate(row.fifth),
                uncorrected_fec: rate(row.sixth),
            });
        }
        ModuleKind::Opm | ModuleKind::RoadmFlex => {
            iface.sub_type = Some("optical_opm".into());
            iface.optical_opm = Some(OpticalOpm {
                identifier,
                label: row.label,
                rx_power: row.rx,
                channels,
            });
        }
    }
    iface
}
