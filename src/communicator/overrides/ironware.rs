//! Brocade/Foundry IronWare.

use futures::future::BoxFuture;

use super::{Parent, column, column_map, get};
use crate::codec::RawValue;
use crate::communicator::{Communicator, optional};
use crate::device::{Cpu, MemoryPool};
use crate::env::RequestEnv;
use crate::error::Result;

/// snAgentCpuUtilTable: slot.cpu.interval index.
const CPU_UTIL_INTERVAL: &str = ".1.3.6.1.4.1.1991.1.1.2.11.1.1.4";
/// Hundredths of a percent.
const CPU_UTIL_100TH: &str = ".1.3.6.1.4.1.1991.1.1.2.11.1.1.6";
const CPU_UTIL_LEGACY: &str = ".1.3.6.1.4.1.1991.1.1.2.1.52.0";
const DYN_MEM_UTIL: &str = ".1.3.6.1.4.1.1991.1.1.2.1.53.0";

/// Averaging interval reported, in seconds.
const INTERVAL: u64 = 300;

pub(super) fn ironware(parent: Parent) -> Box<dyn Communicator> {
    Box::new(IronWare { parent })
}

struct IronWare {
    parent: Parent,
}

impl Communicator for IronWare {
    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(async move {
            let intervals = column(env, CPU_UTIL_INTERVAL).await?;
            if intervals.is_empty() {
                // Older releases only have the chassis-wide average.
                let load = get(env, CPU_UTIL_LEGACY).await?.as_float()?;
                return Ok(vec![Cpu {
                    label: None,
                    load: Some(load),
                }]);
            }
            let values = column_map(env, CPU_UTIL_100TH).await?;
            Ok(select_cpus(&intervals, &values))
        })
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            match optional(get(env, DYN_MEM_UTIL).await)? {
                Some(usage) => Ok(vec![MemoryPool {
                    label: None,
                    usage: Some(usage.as_float()?),
                }]),
                None => self.parent.memory_usage(env).await,
            }
        })
    }
}

fn select_cpus(
    intervals: &[(String, RawValue)],
    values: &std::collections::HashMap<String, RawValue>,
) -> Vec<Cpu> {
    intervals
        .iter()
        .filter(|(_, interval)| interval.as_uint().ok() == Some(INTERVAL))
        .filter_map(|(index, _)| {
            let load = values.get(index)?.as_float().ok()? / 100.0;
            let mut parts = index.split('.');
            let label = match (parts.next(), parts.next()) {
                (Some(slot), Some(cpu)) => format!("slot {slot} cpu {cpu}"),
                _ => index.clone(),
            };
            Some(Cpu {
                label: Some(label),
                load: Some(load),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_five_minute_average_is_reported() {
        let intervals = vec![
            ("1.1.1".to_owned(), RawValue::UInt(1)),
            ("1.1.60".to_owned(), RawValue::UInt(60)),
            ("1.1.300".to_owned(), RawValue::UInt(300)),
            ("2.1.300".to_owned(), RawValue::UInt(300)),
        ];
        let values = [
            ("1.1.300".to_owned(), RawValue::UInt(1250)),
            ("2.1.300".to_owned(), RawValue::UInt(300)),
            ("1.1.60".to_owned(), RawValue::UInt(9999)),
        ]
        .into_iter()
        .collect();
        let cpus = select_cpus(&intervals, &values);
        assert_eq!(cpus.len(), 2);
        assert_eq!(cpus[0].label.as_deref(), Some("slot 1 cpu 1"));
        assert_eq!(cpus[0].load, Some(12.5));
        assert_eq!(cpus[1].load, Some(3.0));
    }
}
