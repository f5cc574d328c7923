use clap::Parser;
use keyshift::cli::Args;
use keyshift::{migrate, BarReporter, LogReporter, ProgressReporter};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins when set
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keyshift={}", log_level)));

    // Logs share stderr with the progress bar, so they are drawn above it
    let (reporter, writer): (Box<dyn ProgressReporter>, BoxMakeWriter) =
        if atty::is(atty::Stream::Stderr) {
            let bar = BarReporter::new();
            let log_writer = bar.log_writer();
            (
                Box::new(bar),
                BoxMakeWriter::new(move || log_writer.clone()),
            )
        } else {
            (Box::new(LogReporter), BoxMakeWriter::new(std::io::stderr))
        };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    match run(args, reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, mut reporter: Box<dyn ProgressReporter>) -> anyhow::Result<()> {
    let config = args.into_config()?;

    info!("🚚 keyshift - Redis key migration");
    if let Some(path) = &config.snapshot_path {
        info!("Snapshot file: {:?}", path);
    }

    let report = migrate(&config, reporter.as_mut()).await?;
    info!(
        "✅ Migration completed: {} of {} keys copied in {}",
        report.copied,
        report.total_keys,
        humantime::format_duration(std::time::Duration::from_millis(report.elapsed_ms))
    );
    Ok(())
}
