use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use autorun::{
    cli::Cli, quote_command_line, CommandTemplate, Debouncer, Dispatcher, EventFilter, FileWatcher,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let config = cli.load_config()?;
    let template = CommandTemplate::new(cli.command.clone(), config.marker)?;

    tracing::info!(
        path = %cli.path.display(),
        command = %quote_command_line(template.args()),
        quiet_secs = config.quiet_secs,
        "Starting autorun"
    );

    let mut debouncer = Debouncer::new(config.quiet_duration(), Dispatcher::new(template));
    debouncer.start().context("Failed to start settle loop")?;

    let mut watcher = FileWatcher::new(
        &cli.path,
        config.recursive,
        EventFilter::new(&config.filter_config()),
        debouncer.pusher(),
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    tracing::info!("Shutting down");
    watcher.shutdown();
    debouncer.stop();
    debouncer.join();

    Ok(())
}
