//! # async-devmon
//!
//! Async identification and metric extraction for network devices over
//! SNMP and HTTP.
//!
//! ## Features
//!
//! - SNMPv1, v2c and v3 with credential discovery
//! - Device classes as YAML data: match conditions plus property recipes
//! - Vendor code overrides layered over the declarative classes
//! - Per-target request serialisation, deadlines and cancellation
//! - Identification cache in memory, SQLite or Redis
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_devmon::config::Config;
//! use async_devmon::request::{OutputFormat, Processor, Request, RequestKind, render};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> async_devmon::Result<()> {
//!     let processor = Processor::from_config(Config::default()).await?;
//!     let request = Request::new(RequestKind::Identify, "192.0.2.10");
//!     let reply = processor.handle(request, CancellationToken::new()).await;
//!     println!("{}", render(&reply, OutputFormat::Text)?);
//!     std::process::exit(reply.exit_code());
//! }
//! ```

pub mod assets;
pub mod cache;
pub mod class;
pub mod codec;
pub mod communicator;
pub mod config;
pub mod device;
pub mod env;
pub mod error;
pub mod group;
pub mod identify;
pub mod logging;
pub mod mapping;
pub mod network;
pub mod recipe;
pub mod request;

pub mod ber;
pub mod client;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod transport;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, ErrorKind, ErrorStatus, Result, ResultExt};
pub use oid::Oid;
pub use request::{Processor, Reply, Request, RequestKind, Response};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
