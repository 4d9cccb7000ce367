use chrono::Local;
use eyre::Result;
use fern::Dispatch;
use log::LevelFilter;

/// Sets up the application logger with console output.
///
/// # Returns
/// * `Result<()>` - Success or failure of logger setup
///
/// # Errors
/// * If a global logger is already installed
pub fn setup_logger() -> Result<()> {
    Dispatch::new()
        // Set logging level from RUST_LOG env var or default to Info
        .level(
            std::env::var("RUST_LOG")
                .map(|level| level.parse().unwrap_or(LevelFilter::Info))
                .unwrap_or(LevelFilter::Info),
        )
        // Transport crates are noisy at debug
        .level_for("hyper", LevelFilter::Warn)
        .level_for("alloy_transport_ws", LevelFilter::Warn)
        .level_for("alloy_pubsub", LevelFilter::Warn)
        .chain(std::io::stdout())
        // Format log messages with time, level and origin
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ));
        })
        .apply()?;
    Ok(())
}
