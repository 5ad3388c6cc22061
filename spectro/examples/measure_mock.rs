//! Scripted measurement example
//!
//! Runs a full calibrate-and-measure cycle against a scripted Minolta
//! instrument, so it needs no hardware.

use std::sync::Arc;

use spectro::{DriverConfig, DriverManager, SpectroEvent, SpectroListener};
use spectro_transport::MockTransport;
use tracing_subscriber::EnvFilter;

struct PrintListener;

impl SpectroListener for PrintListener {
    fn measured(&self, event: &SpectroEvent) {
        println!("measured: {}", event.spectro_status());
    }

    fn calibrated(&self, event: &SpectroEvent) {
        println!("calibrated: {}", event.spectro_status());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let script = MockTransport::new();
    script.push_reply(b"OK00\r\n");
    script.push_reply(b"OK00\r\n");

    let mut spectrum = String::from("OK00");
    for n in 0..31 {
        spectrum.push_str(&format!(",{}.00", 40 + n));
    }
    spectrum.push_str("\r\n");
    script.push_reply(spectrum.as_bytes());

    let manager = DriverManager::new();
    let driver = manager
        .register_driver("minolta-cm2600d", DriverConfig::mock(script))
        .await?;

    let spectro = driver.create_spectrophotometer()?;
    spectro.add_listener(Arc::new(PrintListener));
    spectro.initialize().await?;

    for event in spectro.calibrate_all().await? {
        anyhow::ensure!(event.is_success(), "calibration failed: {}", event);
    }

    let event = spectro.measure().await?;
    if let Some(reading) = event.reading_payload() {
        println!("{}", reading);
    }

    spectro.dispose().await?;
    manager.unregister_driver(driver.name()).await;

    Ok(())
}
