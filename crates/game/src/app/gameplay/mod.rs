pub(crate) mod actors;
pub(crate) mod assets;
pub(crate) mod dialog;
pub(crate) mod encounter;
pub(crate) mod group;
pub(crate) mod save;
pub(crate) mod scene;
pub(crate) mod settings;
pub(crate) mod sprites;
pub(crate) mod transition;
pub(crate) mod world_loader;

pub(crate) use assets::{AssetError, GameFrames};
pub(crate) use scene::{OverworldError, OverworldScene};
pub(crate) use settings::{Settings, SettingsError, SETTINGS_FILE};
pub(crate) use world_loader::load_map_catalog;

#[cfg(test)]
mod tests;
