//! devmon: identify a network device and read its metrics.

use std::process::ExitCode;

use async_devmon::cli::args::Cli;
use async_devmon::config::Config;
use async_devmon::logging;
use async_devmon::request::{Processor, render};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let mut config = match &args.output.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    if let Some(level) = logging::level_for(args.output.debug, args.output.trace) {
        config.logging.level = level.to_owned();
    }
    logging::init(&config.logging);

    let processor = match Processor::from_config(config).await {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let reply = processor.handle(args.request(), cancel).await;
    match render(&reply, args.output.format) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::from(u8::try_from(reply.exit_code()).unwrap_or(1))
}
