//! Juniper JunOS.

use futures::future::BoxFuture;

use super::{Parent, column, column_map};
use crate::codec::RawValue;
use crate::communicator::Communicator;
use crate::device::{Cpu, MemoryPool};
use crate::env::RequestEnv;
use crate::error::Result;

/// JUNIPER-MIB jnxOperatingTable.
const OPERATING_DESCR: &str = ".1.3.6.1.4.1.2636.3.1.13.1.5";
const OPERATING_CPU: &str = ".1.3.6.1.4.1.2636.3.1.13.1.8";
const OPERATING_BUFFER: &str = ".1.3.6.1.4.1.2636.3.1.13.1.11";

pub(super) fn junos(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Junos { parent })
}

struct Junos {
    parent: Parent,
}

impl Junos {
    /// `(label, value)` of the routing-engine rows of one column.
    async fn routing_engines(&self, env: &RequestEnv, base: &str) -> Result<Vec<(String, f64)>> {
        let descr = column(env, OPERATING_DESCR).await?;
        if descr.is_empty() {
            return Ok(Vec::new());
        }
        let values = column_map(env, base).await?;
        Ok(routing_engine_rows(&descr, &values))
    }
}

fn routing_engine_rows(
    descr: &[(String, RawValue)],
    values: &std::collections::HashMap<String, RawValue>,
) -> Vec<(String, f64)> {
    descr
        .iter()
        .filter_map(|(index, d)| {
            let label = d.as_string();
            if !label.contains("Routing Engine") {
                return None;
            }
            let value = values.get(index)?.as_float().ok()?;
            Some((label, value))
        })
        .collect()
}

impl Communicator for Junos {
    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(async move {
            let rows = self.routing_engines(env, OPERATING_CPU).await?;
            if rows.is_empty() {
                return self.parent.cpu_load(env).await;
            }
            Ok(rows
                .into_iter()
                .map(|(label, load)| Cpu {
                    label: Some(label),
                    load: Some(load),
                })
                .collect())
        })
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            let rows = self.routing_engines(env, OPERATING_BUFFER).await?;
            if rows.is_empty() {
                return self.parent.memory_usage(env).await;
            }
            Ok(rows
                .into_iter()
                .map(|(label, usage)| MemoryPool {
                    label: Some(label),
                    usage: Some(usage),
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_routing_engines_are_reported() {
        let descr = vec![
            ("9.1.0.0".to_owned(), RawValue::from("Routing Engine 0")),
            ("7.1.0.0".to_owned(), RawValue::from("FPC: MPC7E 3D @ 0/*/*")),
            ("9.2.0.0".to_owned(), RawValue::from("Routing Engine 1")),
        ];
        let values = [
            ("9.1.0.0".to_owned(), RawValue::UInt(7)),
            ("7.1.0.0".to_owned(), RawValue::UInt(50)),
        ]
        .into_iter()
        .collect();
        let rows = routing_engine_rows(&descr, &values);
        assert_eq!(rows, [("Routing Engine 0".to_owned(), 7.0)]);
    }
}
