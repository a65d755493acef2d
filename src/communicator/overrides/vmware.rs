//! VMware ESXi hosts.

use futures::future::BoxFuture;

use super::{Parent, column, column_map};
use crate::communicator::Communicator;
use crate::device::{Cpu, MemoryPool};
use crate::env::RequestEnv;
use crate::error::Result;

/// HOST-RESOURCES-MIB hrProcessorLoad.
const PROCESSOR_LOAD: &str = ".1.3.6.1.2.1.25.3.3.1.2";
/// hrStorageTable.
const STORAGE_TYPE: &str = ".1.3.6.1.2.1.25.2.3.1.2";
const STORAGE_DESCR: &str = ".1.3.6.1.2.1.25.2.3.1.3";
const STORAGE_SIZE: &str = ".1.3.6.1.2.1.25.2.3.1.5";
const STORAGE_USED: &str = ".1.3.6.1.2.1.25.2.3.1.6";
/// hrStorageRam.
const TYPE_RAM: &str = ".1.3.6.1.2.1.25.2.1.2";

pub(super) fn esxi(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Esxi { parent })
}

struct Esxi {
    parent: Parent,
}

impl Communicator for Esxi {
    /// ESXi lists one processor per logical core; report the host average.
    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(async move {
            let loads: Vec<f64> = column(env, PROCESSOR_LOAD)
                .await?
                .iter()
                .filter_map(|(_, v)| v.as_float().ok())
                .collect();
            match average(&loads) {
                Some(load) => Ok(vec![Cpu {
                    label: Some(format!("{} cores", loads.len())),
                    load: Some(load),
                }]),
                None => self.parent.cpu_load(env).await,
            }
        })
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            let types = column(env, STORAGE_TYPE).await?;
            let ram: Vec<String> = types
                .into_iter()
                .filter(|(_, t)| t.as_string() == TYPE_RAM)
                .map(|(index, _)| index)
                .collect();
            if ram.is_empty() {
                return self.parent.memory_usage(env).await;
            }
            let descr = column_map(env, STORAGE_DESCR).await?;
            let size = column_map(env, STORAGE_SIZE).await?;
            let used = column_map(env, STORAGE_USED).await?;
            Ok(ram
                .into_iter()
                .map(|index| {
                    let usage = match (size.get(&index), used.get(&index)) {
                        (Some(s), Some(u)) => match (s.as_float(), u.as_float()) {
                            (Ok(s), Ok(u)) if s > 0.0 => Some(u / s * 100.0),
                            _ => None,
                        },
                        _ => None,
                    };
                    MemoryPool {
                        label: descr.get(&index).map(|d| d.as_string()),
                        usage,
                    }
                })
                .collect())
        })
    }
}

fn average(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_cores() {
        assert_eq!(average(&[10.0, 20.0, 30.0]), Some(20.0));
        assert_eq!(average(&[]), None);
    }
}
