mod bus;
mod config;
mod database;
mod models;
mod scanner;
mod sensors;
mod utils;

use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use bus::I2cBus;
use config::ScannerConfig;
use database::operations::store_snapshot;
use models::Snapshot;
use scanner::WeatherScanner;
use utils::{duration_to_seconds, format_datetime};

fn log_summary(snapshot: &Snapshot) {
    info!(
        "Snapshot captured at: {}",
        format_datetime(&snapshot.captured_at)
    );
    info!("  Temperature: {} C", snapshot.temperature.display_or("n/a"));
    info!("  Humidity: {} %RH", snapshot.humidity.display_or("n/a"));
    info!("  Pressure: {} kPa", snapshot.pressure.display_or("n/a"));
    info!("  Rain counter: {}", snapshot.rain_count.display_or("n/a"));
    info!(
        "  Wind heading: {} deg",
        snapshot.wind_heading.display_or("n/a")
    );
    info!(
        "  Average wind speed: {} kph",
        snapshot.wind_avg_kph.display_or("n/a")
    );
    info!(
        "  Maximum wind speed: {} kph",
        snapshot.wind_max_kph.display_or("n/a")
    );
    info!(
        "  Ambient light: {}",
        snapshot.ambient_light.display_or("n/a")
    );
    info!(
        "  System temperature: {} C",
        snapshot.system_temp.display_or("n/a")
    );
}

async fn main_loop(config: ScannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting weather station scanning service");

    let bus = I2cBus::open(&config.i2c_bus)?;
    let mut scanner = WeatherScanner::new(bus, &config)?;

    loop {
        let cycle_start = OffsetDateTime::now_utc();
        info!("Starting poll cycle at: {}", format_datetime(&cycle_start));

        // Bus transactions are blocking I/O; keep them off the async
        // workers. A new cycle never begins until the previous snapshot
        // is fully assembled and stored.
        let snapshot = tokio::task::block_in_place(|| scanner.scan_cycle());

        log_summary(&snapshot);
        if snapshot.is_empty() {
            warn!("No sensor produced data this cycle!");
        }

        if let Err(e) = store_snapshot(&snapshot, &config.database_url).await {
            error!("Failed to store snapshot: {}", e);
        } else {
            info!("Successfully stored snapshot");
        }

        // Wait out the remainder of the poll period.
        let elapsed = duration_to_seconds(OffsetDateTime::now_utc() - cycle_start);
        let wait_time = config.poll_interval_secs.saturating_sub(elapsed);
        if wait_time > 0 {
            sleep(Duration::from_secs(wait_time)).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ScannerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
