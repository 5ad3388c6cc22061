//! Measurement over a serial-to-ethernet bridge

use std::time::Duration;

use spectro::{CalibrationStep, DriverConfig, DriverManager, Endpoint};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("SPECTRO_HOST").unwrap_or_else(|_| "192.168.1.50".to_string());
    let driver_id = std::env::var("SPECTRO_DRIVER").unwrap_or_else(|_| "xrite-ci7".to_string());

    let manager = DriverManager::new();
    println!("Available drivers: {:?}", manager.available_drivers());

    let config = DriverConfig::new(Endpoint::tcp(host)).with_timeout(Duration::from_secs(10));
    let driver = manager.register_driver(&driver_id, config).await?;
    println!("{}", driver.info());

    let spectro = driver.create_spectrophotometer()?;
    spectro.initialize().await?;

    let identity = spectro.identify().await?;
    println!("Instrument: {}", identity.spectro_status());

    if driver.calibration_steps().contains(&CalibrationStep::White) {
        println!("Place the white tile and press enter");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
    }
    for event in spectro.calibrate_all().await? {
        println!("Calibration: {}", event.spectro_status());
    }

    let event = spectro.measure().await?;
    match event.reading_payload() {
        Some(reading) => println!("{}", reading),
        None => println!("Measurement failed: {}", event.spectro_status()),
    }

    spectro.dispose().await?;
    manager.unregister_driver(&driver_id).await;

    Ok(())
}
