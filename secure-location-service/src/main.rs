use std::time::Duration;

use secure_location_service::config;
use secure_location_service::location::SecureLocationService;
use secure_location_service::sim::SimulatedDevice;
use secure_location_service::status::spawn_status_reporter;

use anyhow::Result;

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::read_config(&path)?;

    // Initialize logging
    let _logging_guard = secure_location_service::logging::init_logging(
        &config.log_dir,
        "secure-location",
        &config.log_level,
    )?;

    tracing::info!("Secure location demo starting...");
    tracing::info!(
        "Simulated device: {} providers, {} route points, mock location {}",
        config.device.providers.len(),
        config.device.route.len(),
        if config.device.mock_location { "on" } else { "off" }
    );

    let device = SimulatedDevice::from_config(&config.device);
    let service = SecureLocationService::start(
        device.platform.clone(),
        device.settings.clone(),
        device.geocoder.clone(),
        config.location.clone(),
    );

    let reporter = spawn_status_reporter(service.clone(), STATUS_INTERVAL);
    let route = device.spawn_route(config.device.route.clone(), config.device.fix_interval());
    if route.is_none() {
        tracing::warn!("No route configured, the simulated providers will never report a fix");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    if let Some(route) = route {
        route.abort();
    }
    service.stop().await?;
    reporter.abort();

    Ok(())
}
