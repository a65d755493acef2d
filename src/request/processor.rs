use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use super::check::{self, Thresholds};
use super::{Identification, IpLocks, Reply, Request, RequestKind, Response};
use crate::assets::{AssetSource, DirAssets, EmbeddedAssets};
use crate::cache::{CachedDevice, DeviceCache};
use crate::class::{ClassRegistry, DeviceClass};
use crate::communicator::{Communicator, CompositeCommunicator, read_identity};
use crate::config::Config;
use crate::device::{IdentifyProperties, Interface, dedupe_descriptions};
use crate::env::RequestEnv;
use crate::error::{Error, Result, ResultExt};
use crate::group::CompiledFilters;
use crate::identify;
use crate::mapping::MappingRegistry;
use crate::network::{Connection, ConnectionHints, resolve_target};

/// Process-wide services shared by every request.
pub struct Processor {
    config: Config,
    registry: Arc<ClassRegistry>,
    mappings: Arc<MappingRegistry>,
    cache: DeviceCache,
    locks: IpLocks,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("classes", &self.registry.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Request parts checked before any network activity.
struct Prepared {
    filters: CompiledFilters,
    ifdescr: Option<(Regex, String)>,
    timeout: Duration,
}

impl Processor {
    pub fn new(
        config: Config,
        registry: Arc<ClassRegistry>,
        mappings: Arc<MappingRegistry>,
        cache: DeviceCache,
    ) -> Self {
        Self {
            config,
            registry,
            mappings,
            cache,
            locks: IpLocks::new(),
        }
    }

    /// Load assets and open the cache named by `config`.
    pub async fn from_config(config: Config) -> Result<Self> {
        let source: Arc<dyn AssetSource> = match &config.assets {
            Some(dir) => Arc::new(DirAssets::new(dir)),
            None => Arc::new(EmbeddedAssets),
        };
        let registry = Arc::new(ClassRegistry::load(source.as_ref())?);
        let mappings = Arc::new(MappingRegistry::new(source));
        let cache = DeviceCache::open(&config.cache).await?;
        Ok(Self::new(config, registry, mappings, cache))
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &DeviceCache {
        &self.cache
    }

    pub fn locks(&self) -> &IpLocks {
        &self.locks
    }

    /// Run `request` to completion. Never fails: errors are part of the
    /// reply.
    pub async fn handle(&self, request: Request, cancel: CancellationToken) -> Reply {
        let kind = request.kind;
        let span = info_span!(target: "async_devmon::request", "request", kind = %kind, device.target = %request.target);
        let result = self.process(&request, cancel).instrument(span).await;
        if let Err(e) = &result {
            debug!(target: "async_devmon::request", { kind = %kind, error = %e }, "request failed");
        }
        Reply::new(kind, result)
    }

    async fn process(&self, request: &Request, parent: CancellationToken) -> Result<Response> {
        let prepared = self.prepare(request)?;
        let cancel = parent.child_token();
        // Stops discovery workers and in-flight reads however the request ends.
        let _stop = cancel.clone().drop_guard();

        let work = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled.boxed()),
                out = self.run(request, &prepared, &cancel) => out,
            }
        };
        match tokio::time::timeout(prepared.timeout, work).await {
            Ok(out) => out,
            Err(_) => Err(Error::DeadlineExceeded.boxed()),
        }
    }

    fn prepare(&self, request: &Request) -> Result<Prepared> {
        if request.target.trim().is_empty() {
            return Err(Error::pre_condition("no target given"));
        }
        ConnectionHints::merge(&[&request.connection, &self.config.connection.hints()])
            .resolve()?;
        let filters = CompiledFilters::new(&request.filters)?;
        let ifdescr = match &request.ifdescr_regex {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::pre_condition(format!("invalid ifDescr regex '{pattern}': {e}"))
                })?;
                let replacement = request.ifdescr_replace.clone().unwrap_or_default();
                Some((regex, replacement))
            }
            None => None,
        };
        let timeout = request
            .timeout
            .filter(|t| *t > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.request.timeout());
        Ok(Prepared {
            filters,
            ifdescr,
            timeout,
        })
    }

    async fn run(
        &self,
        request: &Request,
        prepared: &Prepared,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let ip = resolve_target(request.target.trim()).await?;
        let _guard = if request.no_ip_lock || !self.config.request.ip_lock {
            None
        } else {
            Some(self.locks.lock(ip).await)
        };

        let cached_connection = self
            .cache
            .get_connection_data(ip)
            .await
            .unwrap_or_else(|e| {
                warn!(target: "async_devmon::request", { device.ip = %ip, error = %e }, "reading cached connection data failed");
                None
            })
            .map(|data| data.into_hints())
            .unwrap_or_default();
        let hints = ConnectionHints::merge(&[
            &request.connection,
            &cached_connection,
            &self.config.connection.hints(),
        ])
        .resolve()?;

        let connection =
            Connection::establish(ip, &hints, self.config.connection.http_timeout(), cancel)
                .await?;
        let mut env = RequestEnv::new(connection.clone(), self.mappings.clone(), cancel.clone());
        env.snmp_gets_instead_of_walk = request.snmp_gets_instead_of_walk;

        let outcome = self.respond(request, prepared, &env).await;
        drop(env);

        let outcome = match outcome {
            Ok((response, device)) => {
                if let Some(device) = device {
                    self.remember(ip, &device, &connection).await;
                } else {
                    self.remember_connection(ip, &connection).await;
                }
                Ok(response)
            }
            Err(e) => Err(e),
        };
        connection.close();
        outcome
    }

    /// Identify when needed, then dispatch. Returns the device record to
    /// cache next to the response.
    async fn respond(
        &self,
        request: &Request,
        prepared: &Prepared,
        env: &RequestEnv,
    ) -> Result<(Response, Option<CachedDevice>)> {
        if !request.kind.needs_class() {
            let data = env.connection.ideal_connection_data();
            return Ok((Response::Check(check::snmp(&data)), None));
        }

        let (class, known) = self.classify(env).await?;
        let comm = CompositeCommunicator::build(self.registry.clone(), &class.id)?;
        tracing::debug!(target: "async_devmon::request", { device.ip = %env.connection.ip(), device.class = %class.id }, "dispatching");

        let dispatched = AssertUnwindSafe(self.dispatch(request, prepared, &comm, env))
            .catch_unwind()
            .await
            .map_err(|panic| Error::Panicked(panic_message(panic.as_ref()).into()).boxed())?;
        let (response, read) = dispatched?;

        let device = CachedDevice {
            class: class.id.clone(),
            properties: read.or(known).unwrap_or_default(),
        };
        Ok((response, Some(device)))
    }

    /// The device class: the cached one if its match condition still
    /// holds, otherwise a fresh identification. Also returns the identity
    /// properties cached for a class that was reused.
    async fn classify(
        &self,
        env: &RequestEnv,
    ) -> Result<(Arc<DeviceClass>, Option<IdentifyProperties>)> {
        let ip = env.connection.ip();
        let cached = self.cache.get(ip).await.unwrap_or_else(|e| {
            warn!(target: "async_devmon::request", { device.ip = %ip, error = %e }, "reading cached device failed");
            None
        });
        if let Some(cached) = cached {
            match identify::revalidate(&self.registry, &cached.class, env).await {
                Ok(true) => {
                    if let Ok(class) = self.registry.get(&cached.class) {
                        debug!(target: "async_devmon::request", { device.ip = %ip, device.class = %class.id }, "cached class still matches");
                        return Ok((class, Some(cached.properties)));
                    }
                }
                Ok(false) => {
                    debug!(target: "async_devmon::request", { device.ip = %ip, device.class = %cached.class }, "cached class no longer matches");
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    debug!(target: "async_devmon::request", { device.ip = %ip, device.class = %cached.class, error = %e }, "re-validating cached class failed");
                }
            }
        }
        let class = identify::identify_or_generic(&self.registry, env).await?;
        Ok((class, None))
    }

    async fn dispatch(
        &self,
        request: &Request,
        prepared: &Prepared,
        comm: &CompositeCommunicator,
        env: &RequestEnv,
    ) -> Result<(Response, Option<IdentifyProperties>)> {
        use RequestKind::*;

        let thresholds: &Thresholds = &request.thresholds;
        let kind = request.kind;
        let context = format!("{kind} on class '{}'", comm.class().id);
        let response = match kind {
            Identify | CheckIdentify => {
                let properties = read_identity(comm, env).await.context(context)?;
                let response = if kind == Identify {
                    Response::Identify(Identification {
                        class: comm.class().id.clone(),
                        properties: properties.clone(),
                    })
                } else {
                    Response::Check(check::identify(&properties, &request.expected))
                };
                return Ok((response, Some(properties)));
            }
            ReadInterfaces => {
                let interfaces = self.interfaces(prepared, comm, env).await.context(context)?;
                Response::Interfaces(interfaces)
            }
            CheckInterfaceMetrics => {
                let interfaces = self.interfaces(prepared, comm, env).await.context(context)?;
                Response::Check(check::interface_metrics(&interfaces, request.print_csv))
            }
            ReadCountInterfaces => Response::Count(comm.count_interfaces(env).await.context(context)?),
            ReadCpuLoad => Response::CpuLoad(comm.cpu_load(env).await.context(context)?),
            CheckCpuLoad => Response::Check(check::cpu_load(
                &comm.cpu_load(env).await.context(context)?,
                thresholds,
            )?),
            ReadMemoryUsage => Response::MemoryUsage(comm.memory_usage(env).await.context(context)?),
            CheckMemoryUsage => Response::Check(check::memory_usage(
                &comm.memory_usage(env).await.context(context)?,
                thresholds,
            )?),
            ReadUps => Response::Ups(comm.ups(env).await.context(context)?),
            CheckUps => Response::Check(check::ups(&comm.ups(env).await.context(context)?, thresholds)?),
            ReadDisk => Response::Disk(comm.disk(env).await.context(context)?),
            CheckDisk => Response::Check(check::disk(&comm.disk(env).await.context(context)?, thresholds)?),
            ReadSbc => Response::Sbc(comm.sbc(env).await.context(context)?),
            CheckSbc => Response::Check(check::sbc(&comm.sbc(env).await.context(context)?, thresholds)?),
            ReadServer => Response::Server(comm.server(env).await.context(context)?),
            CheckServer => Response::Check(check::server(
                &comm.server(env).await.context(context)?,
                thresholds,
            )?),
            ReadHardwareHealth => {
                Response::HardwareHealth(comm.hardware_health(env).await.context(context)?)
            }
            CheckHardwareHealth => Response::Check(check::hardware_health(
                &comm.hardware_health(env).await.context(context)?,
            )),
            ReadHighAvailability => {
                Response::HighAvailability(comm.high_availability(env).await.context(context)?)
            }
            CheckHighAvailability => Response::Check(check::high_availability(
                &comm.high_availability(env).await.context(context)?,
                thresholds,
            )?),
            ReadSiem => Response::Siem(comm.siem(env).await.context(context)?),
            CheckSiem => Response::Check(check::siem(&comm.siem(env).await.context(context)?, thresholds)?),
            ReadAvailableComponents => Response::Components(
                comm.components()?
                    .into_iter()
                    .map(|c| c.as_str().to_owned())
                    .collect(),
            ),
            CheckSnmp => {
                let data = env.connection.ideal_connection_data();
                Response::Check(check::snmp(&data))
            }
        };
        Ok((response, None))
    }

    async fn interfaces(
        &self,
        prepared: &Prepared,
        comm: &CompositeCommunicator,
        env: &RequestEnv,
    ) -> Result<Vec<Interface>> {
        let mut interfaces = comm.interfaces(env, &prepared.filters).await?;
        if let Some((regex, replacement)) = &prepared.ifdescr {
            for iface in &mut interfaces {
                if let Some(descr) = iface.if_descr.as_mut() {
                    let rewritten = regex.replace_all(descr, replacement.as_str()).into_owned();
                    *descr = rewritten;
                }
            }
            dedupe_descriptions(&mut interfaces);
        }
        Ok(interfaces)
    }

    async fn remember(&self, ip: IpAddr, device: &CachedDevice, connection: &Connection) {
        if let Err(e) = self.cache.set(ip, device).await {
            warn!(target: "async_devmon::request", { device.ip = %ip, error = %e }, "caching device failed");
        }
        self.remember_connection(ip, connection).await;
    }

    async fn remember_connection(&self, ip: IpAddr, connection: &Connection) {
        let data = connection.ideal_connection_data();
        if let Err(e) = self.cache.set_connection_data(ip, &data).await {
            warn!(target: "async_devmon::request", { device.ip = %ip, error = %e }, "caching connection data failed");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
