//! Aruba mobility controllers.

use futures::future::BoxFuture;

use super::{Parent, column, column_map};
use crate::communicator::Communicator;
use crate::device::{Cpu, MemoryPool};
use crate::env::RequestEnv;
use crate::error::Result;

/// WLSX-SYSTEMEXT-MIB wlsxSysXProcessorTable.
const PROCESSOR_DESCR: &str = ".1.3.6.1.4.1.14823.2.2.1.1.1.9.1.2";
const PROCESSOR_LOAD: &str = ".1.3.6.1.4.1.14823.2.2.1.1.1.9.1.3";
/// wlsxSysXMemoryTable, kilobytes.
const MEMORY_SIZE: &str = ".1.3.6.1.4.1.14823.2.2.1.1.1.11.1.2";
const MEMORY_USED: &str = ".1.3.6.1.4.1.14823.2.2.1.1.1.11.1.3";

pub(super) fn aruba(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Aruba { parent })
}

struct Aruba {
    parent: Parent,
}

impl Communicator for Aruba {
    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(async move {
            let loads = column(env, PROCESSOR_LOAD).await?;
            if loads.is_empty() {
                return self.parent.cpu_load(env).await;
            }
            let descr = column_map(env, PROCESSOR_DESCR).await?;
            Ok(loads
                .into_iter()
                .map(|(index, load)| Cpu {
                    label: descr.get(&index).map(|d| d.as_string()),
                    load: load.as_float().ok(),
                })
                .collect())
        })
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            let sizes = column(env, MEMORY_SIZE).await?;
            if sizes.is_empty() {
                return self.parent.memory_usage(env).await;
            }
            let used = column_map(env, MEMORY_USED).await?;
            Ok(sizes
                .into_iter()
                .map(|(index, size)| {
                    let usage = match (size.as_float(), used.get(&index).map(|u| u.as_float())) {
                        (Ok(size), Some(Ok(used))) if size > 0.0 => Some(used / size * 100.0),
                        _ => None,
                    };
                    MemoryPool {
                        label: Some(format!("memory {index}")),
                        usage,
                    }
                })
                .collect())
        })
    }
}
