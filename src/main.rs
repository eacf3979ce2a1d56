// Graxil Solo Miner - Free and Open Source Software Statement
//
// This project, graxil-solo, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/main.rs
// Version: 2.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the entry point of the graxil solo miner. It parses the command
// line, sets up log4rs, attaches one CPU worker per thread to the dispatcher
// and runs getblocktemplate sources until Ctrl-C or until no server is left.
//
// Tree Location:
// - src/main.rs (binary entry point)
// - Depends on: graxil_solo, clap, log4rs, tokio, anyhow

use anyhow::Context;
use clap::Parser;
use graxil_solo::core::types::Args;
use graxil_solo::miner::{CpuWorker, Dispatcher};
use graxil_solo::source::{GbtSource, WorkSource};
use log::{info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::sync::Arc;

const LOG_TARGET: &str = "graxil::main";
const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}";

fn init_logging(args: &Args) -> anyhow::Result<()> {
    if let Some(path) = &args.log_config {
        return log4rs::init_file(path, Default::default())
            .with_context(|| format!("cannot load log configuration {}", path.display()));
    }

    let level = if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Validate arguments
    if let Err(err) = args.validate() {
        eprintln!("❌ Error: {}", err);
        std::process::exit(1);
    }

    init_logging(&args)?;
    let config = args.to_config().map_err(anyhow::Error::msg)?;

    info!(target: LOG_TARGET, "🚀 Graxil Solo {} starting", env!("CARGO_PKG_VERSION"));
    info!(target: LOG_TARGET, "├─ Servers: {}", config.servers.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "));
    info!(target: LOG_TARGET, "├─ Payout: {}", config.options.address.as_deref().unwrap_or("provider coinbase"));
    info!(target: LOG_TARGET, "├─ Threads: {}", config.threads);
    info!(target: LOG_TARGET,
        "└─ Failover: {} errors, failback after {}s{}",
        config.policy.tolerance,
        config.policy.failback.as_secs(),
        if config.policy.wrap { "" } else { ", no wrap" }
    );

    let dispatcher = Dispatcher::new(config.servers, config.policy, config.options)?;
    for index in 0..config.threads {
        dispatcher.add_worker(Box::new(CpuWorker::new(index)))?;
    }

    let ctrl_c = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: LOG_TARGET, "🛑 Shutting down");
                dispatcher.shutdown();
            }
        })
    };

    let factory = config.connection;
    let source_dispatcher = Arc::clone(&dispatcher);
    let outcome = dispatcher
        .run(move |server| -> Arc<dyn WorkSource> {
            Arc::new(GbtSource::new(server, Arc::clone(&source_dispatcher), factory.clone()))
        })
        .await;
    ctrl_c.abort();

    let stopping = Arc::clone(&dispatcher);
    tokio::task::spawn_blocking(move || stopping.stop_workers()).await?;
    dispatcher.stats().display_summary(&dispatcher.current_server().name());

    outcome?;
    Ok(())
}

// Changelog:
// - v2.0.0 (2025-07-02): Solo mining entry point.
//   - Single binary; CPU workers driven by the dispatcher.
//   - log4rs console logging, or a log4rs YAML file via --log-config.
//   - Benchmark, SV2 test, GPU and hybrid modes removed.
// - v1.2.0 (2025-06-25): Added hybrid mode.
// - v1.0.0 (2025-06-14): Extracted from monolithic main.rs.
