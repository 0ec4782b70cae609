pub mod actions;
pub mod controller;
pub mod device;
pub mod engine;
pub mod persistence;
pub mod status;

use crate::actions::{ActionSink, LogSink, NoWindows, ScreenExtent};
use crate::controller::pose_filter::ControlRegion;
use crate::engine::{EngineHandle, EngineSettings, SessionState};
use crate::persistence::{Settings, SettingsStore, TomlSettingsStore};
use crate::status::{ConsoleStatus, StatusSurface};
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    // Screen geometry. A platform port would query the desktop here; the
    // reference driver assumes a single 1080p display.
    let screen = ScreenExtent::default();

    let store = TomlSettingsStore::at_default_location();
    let settings = load_settings(&store, screen);

    let status = ConsoleStatus::new();

    let session = SessionState::new(
        settings,
        screen,
        Box::new(store),
        Box::new(NoWindows),
        Box::new(status.clone()),
    );

    let (event_sender, event_receiver) = mpsc::channel(1000);
    let (action_sender, mut action_receiver) = mpsc::channel(100);

    let engine = EngineHandle::spawn(
        event_receiver,
        session,
        Some(EngineSettings::default()),
        action_sender,
    )
    .map_err(|e| eyre!("Failed to spawn translation engine: {}", e))?;

    // Driver task: forward engine actions to the platform sink. LogSink is
    // the reference sink; a platform port swaps in a real one.
    let driver = tokio::spawn(async move {
        let mut sink = LogSink;
        while let Some(action) = action_receiver.recv().await {
            sink.dispatch(action);
        }
        info!("Action channel closed, driver stopping");
    });

    status.line("movepoint running. Press PS to toggle control, Ctrl-C to quit.");
    status.show_for(std::time::Duration::from_secs(5));

    // `event_sender` is where a device backend plugs in; see
    // crate::device for the feed contract.
    let _feed = event_sender;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    engine.shutdown();
    if let Err(e) = driver.await {
        warn!("Driver task did not stop cleanly: {}", e);
    }

    Ok(())
}

fn load_settings(store: &TomlSettingsStore, screen: ScreenExtent) -> Settings {
    match store.load() {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings {
            region: ControlRegion::default_for_ratio(screen.wh_ratio()),
            ..Settings::default()
        },
        Err(e) => {
            warn!("Failed to load settings ({}), using defaults", e);
            Settings {
                region: ControlRegion::default_for_ratio(screen.wh_ratio()),
                ..Settings::default()
            }
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
