//! Cisco IOS.

use std::collections::HashMap;

use futures::future::BoxFuture;

use super::{Parent, column, column_map};
use crate::codec::RawValue;
use crate::communicator::Communicator;
use crate::device::{Cpu, MemoryPool};
use crate::env::RequestEnv;
use crate::error::Result;

/// CISCO-PROCESS-MIB cpmCPUTotalTable.
const CPU_PHYSICAL_INDEX: &str = ".1.3.6.1.4.1.9.9.109.1.1.1.1.2";
const CPU_TOTAL_5MIN: &str = ".1.3.6.1.4.1.9.9.109.1.1.1.1.8";
const ENT_PHYSICAL_NAME: &str = ".1.3.6.1.2.1.47.1.1.1.1.7";

/// CISCO-MEMORY-POOL-MIB ciscoMemoryPoolTable.
const POOL_NAME: &str = ".1.3.6.1.4.1.9.9.48.1.1.1.2";
const POOL_USED: &str = ".1.3.6.1.4.1.9.9.48.1.1.1.5";
const POOL_FREE: &str = ".1.3.6.1.4.1.9.9.48.1.1.1.6";

pub(super) fn ios(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Ios { parent })
}

struct Ios {
    parent: Parent,
}

impl Communicator for Ios {
    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(async move {
            let loads = column(env, CPU_TOTAL_5MIN).await?;
            if loads.is_empty() {
                return self.parent.cpu_load(env).await;
            }
            let physical = column_map(env, CPU_PHYSICAL_INDEX).await?;
            let names = if physical.is_empty() {
                HashMap::new()
            } else {
                column_map(env, ENT_PHYSICAL_NAME).await?
            };
            Ok(loads
                .into_iter()
                .map(|(index, load)| Cpu {
                    label: cpu_label(&index, &physical, &names),
                    load: load.as_float().ok(),
                })
                .collect())
        })
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            let used = column(env, POOL_USED).await?;
            if used.is_empty() {
                return self.parent.memory_usage(env).await;
            }
            let free = column_map(env, POOL_FREE).await?;
            let names = column_map(env, POOL_NAME).await?;
            Ok(used
                .into_iter()
                .map(|(index, used)| MemoryPool {
                    label: names.get(&index).map(RawValue::as_string),
                    usage: pool_usage(&used, free.get(&index)),
                })
                .collect())
        })
    }
}

/// Entity name of the CPU's physical entity, else none.
fn cpu_label(
    index: &str,
    physical: &HashMap<String, RawValue>,
    names: &HashMap<String, RawValue>,
) -> Option<String> {
    let entity = physical.get(index)?.as_uint().ok().filter(|e| *e != 0)?;
    names
        .get(&entity.to_string())
        .map(RawValue::as_string)
        .filter(|n| !n.is_empty())
}

fn pool_usage(used: &RawValue, free: Option<&RawValue>) -> Option<f64> {
    let used = used.as_float().ok()?;
    let free = free?.as_float().ok()?;
    let total = used + free;
    (total > 0.0).then(|| used / total * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_usage_is_a_percentage() {
        assert_eq!(
            pool_usage(&RawValue::UInt(25), Some(&RawValue::UInt(75))),
            Some(25.0)
        );
        assert_eq!(pool_usage(&RawValue::UInt(0), Some(&RawValue::UInt(0))), None);
        assert_eq!(pool_usage(&RawValue::UInt(5), None), None);
    }

    #[test]
    fn cpu_labels_come_from_the_entity_table() {
        let physical = [("1".to_owned(), RawValue::UInt(22)), ("2".to_owned(), RawValue::UInt(0))]
            .into_iter()
            .collect();
        let names = [("22".to_owned(), RawValue::from("CPU of Routing Processor 0"))]
            .into_iter()
            .collect();
        assert_eq!(
            cpu_label("1", &physical, &names).as_deref(),
            Some("CPU of Routing Processor 0")
        );
        assert_eq!(cpu_label("2", &physical, &names), None);
    }
}
