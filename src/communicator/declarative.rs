//! Communicator driven purely by class recipes.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::Communicator;
use crate::class::ClassRegistry;
use crate::codec::RawValue;
use crate::device::{
    Cpu, FromRecord, HardwareHealthComponent, HighAvailabilityComponent, Interface, MemoryPool,
    Record, SbcComponent, ServerComponent, SiemComponent, Storage, UpsComponent, ZfsPool,
    dedupe_descriptions,
};
use crate::env::RequestEnv;
use crate::error::{Error, Result};
use crate::group::{self, CompiledFilters};
use crate::recipe::{BulkRecipe, EvalContext, Recipe, eval, is_absent};

const SIEM_FIELDS: [&str; 5] = [
    "last_recorded_messages_per_second",
    "average_recorded_messages_per_second",
    "last_processed_messages_per_second",
    "average_processed_messages_per_second",
    "system_version",
];

/// Evaluates the recipes of one class, falling back along its ancestors.
#[derive(Debug, Clone)]
pub struct DeclarativeCommunicator {
    registry: Arc<ClassRegistry>,
    class: String,
}

impl DeclarativeCommunicator {
    pub fn new(registry: Arc<ClassRegistry>, class: impl Into<String>) -> Self {
        Self {
            registry,
            class: class.into(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    fn recipe(&self, path: &str) -> Result<Recipe> {
        self.registry
            .resolve_property(&self.class, path)?
            .ok_or_else(|| Error::not_implemented(format!("{}: no recipe for '{path}'", self.class)))
    }

    fn bulk(&self, path: &str) -> Result<BulkRecipe> {
        match self.recipe(path)? {
            Recipe::Bulk(bulk) => Ok(bulk),
            _ => Err(Error::config(format!(
                "{}: property '{path}' is not a list",
                self.class
            ))),
        }
    }

    async fn value(&self, env: &RequestEnv, path: &str) -> Result<RawValue> {
        let recipe = self.recipe(path)?;
        eval(&recipe, EvalContext::new(env)).await
    }

    async fn text(&self, env: &RequestEnv, path: &str) -> Result<String> {
        let value = self.value(env, path).await?.as_string();
        if value.trim().is_empty() {
            return Err(Error::not_found(format!("'{path}' is empty")));
        }
        Ok(value)
    }

    async fn list<T: FromRecord>(&self, env: &RequestEnv, path: &str) -> Result<Vec<T>> {
        let bulk = self.bulk(path)?;
        group::read_typed(&bulk, env, &CompiledFilters::default()).await
    }

    /// List below a record component; absent when no recipe exists.
    async fn optional_list<T: FromRecord>(&self, env: &RequestEnv, path: &str) -> Result<Vec<T>> {
        match self.list(env, path).await {
            Err(e) if is_absent(&e) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Scalar fields `prefix.<field>` gathered into one record.
    /// `NotImplemented` when none of the fields, nor any of `lists`, has a
    /// recipe.
    async fn record(
        &self,
        env: &RequestEnv,
        prefix: &str,
        fields: &[&str],
        lists: &[&str],
    ) -> Result<Record> {
        let mut record = Record::new();
        let mut any_recipe = false;
        for field in fields {
            let path = format!("{prefix}.{field}");
            let Some(recipe) = self.registry.resolve_property(&self.class, &path)? else {
                continue;
            };
            any_recipe = true;
            match eval(&recipe, EvalContext::new(env)).await {
                Ok(v) => record.insert(*field, v),
                Err(e) if is_absent(&e) => {}
                Err(e) => return Err(e),
            }
        }
        for list in lists {
            let path = format!("{prefix}.{list}");
            any_recipe |= self.registry.resolve_property(&self.class, &path)?.is_some();
        }
        if !any_recipe {
            return Err(Error::not_implemented(format!(
                "{}: no recipes for '{prefix}'",
                self.class
            )));
        }
        Ok(record)
    }
}

impl Communicator for DeclarativeCommunicator {
    fn vendor<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.text(env, "identify.vendor"))
    }

    fn model<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.text(env, "identify.model"))
    }

    fn model_series<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.text(env, "identify.model_series"))
    }

    fn serial_number<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.text(env, "identify.serial_number"))
    }

    fn os_version<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.text(env, "identify.os_version"))
    }

    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            let bulk = self.bulk("interfaces")?;
            let mut list: Vec<Interface> = group::read_typed(&bulk, env, filters).await?;
            dedupe_descriptions(&mut list);
            Ok(list)
        })
    }

    fn count_interfaces<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            match self.value(env, "interfaces.count").await {
                Err(e) if e.is_not_implemented() => {
                    let bulk = self.bulk("interfaces")?;
                    Ok(group::read_indices(env, &bulk.index).await?.len() as u64)
                }
                other => other?.as_uint(),
            }
        })
    }

    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        Box::pin(self.list(env, "cpu"))
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(self.list(env, "memory"))
    }

    fn ups<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<UpsComponent>> {
        Box::pin(async move {
            let record = self.record(env, "ups", &UpsComponent::FIELDS, &[]).await?;
            Ok(UpsComponent::from_record(&record))
        })
    }

    fn disk<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Storage>>> {
        Box::pin(self.list(env, "disk"))
    }

    fn server<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<ServerComponent>> {
        Box::pin(async move {
            let record = self
                .record(env, "server", &ServerComponent::FIELDS, &[])
                .await?;
            Ok(ServerComponent::from_record(&record))
        })
    }

    fn sbc<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<SbcComponent>> {
        Box::pin(async move {
            let record = self
                .record(env, "sbc", &SbcComponent::FIELDS, &["agents", "realms"])
                .await?;
            let mut sbc = SbcComponent::from_record(&record);
            sbc.agents = self.optional_list(env, "sbc.agents").await?;
            sbc.realms = self.optional_list(env, "sbc.realms").await?;
            Ok(sbc)
        })
    }

    fn hardware_health<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HardwareHealthComponent>> {
        Box::pin(async move {
            let lists = ["fans", "power_supply", "temperature", "voltage"];
            let record = self
                .record(env, "hardware_health", &["environment_monitor_state"], &lists)
                .await?;
            Ok(HardwareHealthComponent {
                environment_monitor_state: record.health("environment_monitor_state"),
                fans: self.optional_list(env, "hardware_health.fans").await?,
                power_supply: self.optional_list(env, "hardware_health.power_supply").await?,
                temperature: self.optional_list(env, "hardware_health.temperature").await?,
                voltage: self.optional_list(env, "hardware_health.voltage").await?,
            })
        })
    }

    fn high_availability<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HighAvailabilityComponent>> {
        Box::pin(async move {
            let record = self
                .record(env, "high_availability", &HighAvailabilityComponent::FIELDS, &[])
                .await?;
            Ok(HighAvailabilityComponent::from_record(&record))
        })
    }

    fn siem<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<SiemComponent>> {
        Box::pin(async move {
            let record = self
                .record(env, "siem", &SIEM_FIELDS, &["zfs_pools"])
                .await?;
            Ok(SiemComponent {
                last_recorded_messages_per_second: record.int("last_recorded_messages_per_second"),
                average_recorded_messages_per_second: record
                    .int("average_recorded_messages_per_second"),
                last_processed_messages_per_second: record
                    .int("last_processed_messages_per_second"),
                average_processed_messages_per_second: record
                    .int("average_processed_messages_per_second"),
                system_version: record.string("system_version"),
                zfs_pools: self.optional_list::<ZfsPool>(env, "siem.zfs_pools").await?,
            })
        })
    }
}
