//! Override bundle first, class recipes second.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::{Communicator, DeclarativeCommunicator, overrides};
use crate::class::{ClassRegistry, Component, DeviceClass};
use crate::device::{
    Cpu, HardwareHealthComponent, HighAvailabilityComponent, Interface, MemoryPool, SbcComponent,
    ServerComponent, SiemComponent, Storage, UpsComponent, dedupe_descriptions,
};
use crate::env::RequestEnv;
use crate::error::{Error, ErrorKind, Result};
use crate::group::CompiledFilters;

/// The communicator handed to request dispatch.
pub struct CompositeCommunicator {
    class: Arc<DeviceClass>,
    registry: Arc<ClassRegistry>,
    declarative: DeclarativeCommunicator,
    code: Option<Box<dyn Communicator>>,
}

impl std::fmt::Debug for CompositeCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCommunicator")
            .field("class", &self.class.id)
            .field("override", &self.code.is_some())
            .finish()
    }
}

impl CompositeCommunicator {
    /// Build the communicator for `class`. An override bundle registered
    /// for the class receives the communicator of the direct parent.
    pub fn build(registry: Arc<ClassRegistry>, class: &str) -> Result<Arc<Self>> {
        let node = registry.get(class)?;
        let code = match overrides::lookup(class) {
            Some(constructor) => {
                let parent_id = node.parent.clone().ok_or_else(|| {
                    Error::config(format!("override for '{class}' needs a parent class"))
                })?;
                let parent = Self::build(registry.clone(), &parent_id)?;
                Some(constructor(parent))
            }
            None => None,
        };
        Ok(Arc::new(Self {
            declarative: DeclarativeCommunicator::new(registry.clone(), class),
            class: node,
            registry,
            code,
        }))
    }

    pub fn class(&self) -> &DeviceClass {
        &self.class
    }

    pub fn has_override(&self) -> bool {
        self.code.is_some()
    }

    pub fn has_component(&self, component: Component) -> Result<bool> {
        self.registry.has_component(&self.class.id, component)
    }

    /// Every component of the class, inherited ones included.
    pub fn components(&self) -> Result<Vec<Component>> {
        Ok(self.registry.components(&self.class.id)?.into_iter().collect())
    }

    fn require(&self, component: Component) -> Result<()> {
        if self.has_component(component)? {
            return Ok(());
        }
        Err(Error::ComponentNotFound {
            class: self.class.id.clone().into_boxed_str(),
            component: component.as_str().into(),
        }
        .boxed())
    }
}

/// An override answering `NotImplemented`, or asking a parent that lacks
/// the component, defers to the class recipes.
fn falls_back(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::NotImplemented | ErrorKind::ComponentNotFound
    )
}

/// Run the override, falling back to the declarative layer when it has
/// nothing to say.
macro_rules! dispatch {
    ($self:ident, $component:expr, $method:ident($($arg:expr),*)) => {
        Box::pin(async move {
            $self.require($component)?;
            if let Some(code) = &$self.code {
                match code.$method($($arg),*).await {
                    Err(e) if falls_back(&e) => {
                        tracing::trace!(target: "async_devmon::communicator", { device.class = %$self.class.id, method = stringify!($method) }, "override fell back");
                    }
                    other => return other,
                }
            }
            $self.declarative.$method($($arg),*).await
        })
    };
}

impl Communicator for CompositeCommunicator {
    fn vendor<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        dispatch!(self, Component::Identify, vendor(env))
    }

    fn model<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        dispatch!(self, Component::Identify, model(env))
    }

    fn model_series<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        dispatch!(self, Component::Identify, model_series(env))
    }

    fn serial_number<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        dispatch!(self, Component::Identify, serial_number(env))
    }

    fn os_version<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        dispatch!(self, Component::Identify, os_version(env))
    }

    fn interfaces<'a>(
        &'a self,
        env: &'a RequestEnv,
        filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        Box::pin(async move {
            self.require(Component::Interfaces)?;
            if let Some(code) = &self.code {
                match code.interfaces(env, filters).await {
                    Ok(list) => {
                        let mut list = filters.apply(list)?;
                        dedupe_descriptions(&mut list);
                        return Ok(list);
                    }
                    Err(e) if falls_back(&e) => {}
                    Err(e) => return Err(e),
                }
            }
            self.declarative.interfaces(env, filters).await
        })
    }

    fn count_interfaces<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<u64>> {
        dispatch!(self, Component::Interfaces, count_interfaces(env))
    }

    fn cpu_load<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        dispatch!(self, Component::Cpu, cpu_load(env))
    }

    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        dispatch!(self, Component::Memory, memory_usage(env))
    }

    fn ups<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<UpsComponent>> {
        dispatch!(self, Component::Ups, ups(env))
    }

    fn disk<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Storage>>> {
        dispatch!(self, Component::Disk, disk(env))
    }

    fn server<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<ServerComponent>> {
        dispatch!(self, Component::Server, server(env))
    }

    fn sbc<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<SbcComponent>> {
        dispatch!(self, Component::Sbc, sbc(env))
    }

    fn hardware_health<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HardwareHealthComponent>> {
        dispatch!(self, Component::HardwareHealth, hardware_health(env))
    }

    fn high_availability<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HighAvailabilityComponent>> {
        dispatch!(self, Component::HighAvailability, high_availability(env))
    }

    fn siem<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<SiemComponent>> {
        dispatch!(self, Component::Siem, siem(env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<ClassRegistry> {
        Arc::new(
            ClassRegistry::from_files([
                ("generic.yaml", "components: [identify]\n"),
                (
                    "ceragon.yaml",
                    "components: [interfaces]\nproperties:\n  identify:\n    vendor: {constant: Ceragon}\n",
                ),
                ("ceragon/ip10.yaml", ""),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn overrides_are_wired_to_their_parent() {
        let reg = registry();
        let ip10 = CompositeCommunicator::build(reg.clone(), "ceragon/ip10").unwrap();
        assert!(ip10.has_override());
        let ceragon = CompositeCommunicator::build(reg, "ceragon").unwrap();
        assert!(!ceragon.has_override());
        assert_eq!(
            ip10.components().unwrap(),
            [Component::Identify, Component::Interfaces]
        );
    }

    #[tokio::test]
    async fn missing_component_short_circuits() {
        let reg = registry();
        let comm = CompositeCommunicator::build(reg, "ceragon/ip10").unwrap();
        let env = crate::env::RequestEnv::new(
            crate::network::Connection::from_parts("127.0.0.1".parse().unwrap(), None, None),
            Arc::new(crate::mapping::MappingRegistry::new(Arc::new(
                crate::assets::EmbeddedAssets,
            ))),
            tokio_util::sync::CancellationToken::new(),
        );
        let err = comm.ups(&env).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ComponentNotFound);
        assert_eq!(comm.vendor(&env).await.unwrap(), "Ceragon");
    }
}
