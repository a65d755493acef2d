//! Fortinet FortiGate.

use futures::future::BoxFuture;

use super::{Parent, column, get};
use crate::communicator::{Communicator, optional};
use crate::device::HighAvailabilityComponent;
use crate::env::RequestEnv;
use crate::error::Result;

/// FORTINET-FORTIGATE-MIB fgHaSystemMode.
const HA_SYSTEM_MODE: &str = ".1.3.6.1.4.1.12356.101.13.1.1.0";
/// fgHaStatsTable.
const HA_STATS_SERIAL: &str = ".1.3.6.1.4.1.12356.101.13.2.1.1.2";
const HA_STATS_MASTER_SERIAL: &str = ".1.3.6.1.4.1.12356.101.13.2.1.1.16";

const MODE_MAPPING: &str = "fortigateHaMode";
const STANDALONE: &str = "standalone";

pub(super) fn fortigate(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Fortigate { parent })
}

struct Fortigate {
    parent: Parent,
}

impl Communicator for Fortigate {
    fn high_availability<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HighAvailabilityComponent>> {
        Box::pin(async move {
            let code = get(env, HA_SYSTEM_MODE).await?.as_string();
            let mode = env.mappings.get(MODE_MAPPING, code.trim())?;
            if mode == STANDALONE {
                return Ok(HighAvailabilityComponent {
                    state: Some(mode),
                    role: Some(STANDALONE.into()),
                    nodes: Some(1),
                });
            }

            let members = column(env, HA_STATS_SERIAL).await?;
            let master = column(env, HA_STATS_MASTER_SERIAL)
                .await?
                .into_iter()
                .next()
                .map(|(_, v)| v.as_string());
            let own = optional(self.parent.serial_number(env).await)?;
            Ok(HighAvailabilityComponent {
                state: Some(mode),
                role: role(own.as_deref(), master.as_deref()).map(str::to_owned),
                nodes: Some(members.len() as u64),
            })
        })
    }
}

fn role(own: Option<&str>, master: Option<&str>) -> Option<&'static str> {
    match (own, master) {
        (Some(own), Some(master)) if own.trim() == master.trim() => Some("master"),
        (Some(_), Some(_)) => Some("slave"),
        _ => None,
    }
}
