mod app;

use crate::app::App;
use furnish_runtime::{AppConfig, DEFAULT_CONFIG_PATH, Startup};
use std::path::PathBuf;
use winit::event_loop::{DeviceEvents, EventLoop};

const CONFIG_ENV: &str = "FURNISH_CONFIG";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn run_app(event_loop: EventLoop<Startup>, mut app: App) -> anyhow::Result<()> {
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = AppConfig::load_or_default(&path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.filter.as_str()),
    )
    .init();
    if path.exists() {
        log::info!("using config {}", path.display());
    } else {
        log::info!("{} not found, using built-in defaults", path.display());
    }

    let event_loop = EventLoop::<Startup>::with_user_event().build()?;
    event_loop.listen_device_events(DeviceEvents::Always);

    let app = App::new(&event_loop, config);
    run_app(event_loop, app)
}
