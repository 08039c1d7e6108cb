use pyiam_engine::{resolve_app_paths, LoopConfig, MapError, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{
    load_map_catalog, AssetError, GameFrames, OverworldError, OverworldScene, Settings,
    SettingsError, SETTINGS_FILE,
};

const MAPS_DIR: &str = "maps";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Scene(#[from] OverworldError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Pyiam Startup ===");

    let paths = resolve_app_paths()?;
    let settings_path = paths.root.join(SETTINGS_FILE);
    let settings = Settings::load(&settings_path)?;
    info!(
        root = %paths.root.display(),
        settings = %settings_path.display(),
        start_map = %settings.start_map,
        start_pos = %settings.start_pos,
        "settings_loaded"
    );

    let frames = GameFrames::load(&paths.graphics_dir)?;
    let maps = load_map_catalog(&paths.data_dir.join(MAPS_DIR), &settings)?;
    let snapshot_path = paths.save_dir.join(&settings.snapshot_file);
    let config = loop_config(&settings);
    let scene = OverworldScene::new(settings, frames, maps, snapshot_path)?;

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
    })
}

fn loop_config(settings: &Settings) -> LoopConfig {
    LoopConfig {
        window_width: settings.window_width,
        window_height: settings.window_height,
        ..LoopConfig::default()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
