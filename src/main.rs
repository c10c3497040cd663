use anyhow::Result;
use clap::Parser;
use send_mail::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cli.transport_config()?;

    // Set log level based on debug flag
    let log_level = if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level)
        .init();

    if config.debug {
        tracing::debug!("Debug mode enabled - SMTP protocol tracing active");
    }

    let report = cli::run(&cli, &config)?;

    println!(
        "Sent {} to {} recipient(s)",
        report.message_id,
        report.recipients.len()
    );

    Ok(())
}
