//! Subscriber installation for binaries and tests.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Level override from `-d`/`-D` style verbosity flags.
pub fn level_for(debug: bool, trace: bool) -> Option<&'static str> {
    if trace {
        Some("async_devmon=trace")
    } else if debug {
        Some("async_devmon=debug")
    } else {
        None
    }
}
