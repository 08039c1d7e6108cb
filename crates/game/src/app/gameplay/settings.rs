use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pyiam_engine::{validate_asset_key, AssetKeyError};
use serde::Deserialize;
use thiserror::Error;

pub(crate) const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting '{field}': {message}")]
    Invalid { field: &'static str, message: String },
    #[error("map id '{map_id}' in settings is not a valid asset key: {source}")]
    MapId {
        map_id: String,
        #[source]
        source: AssetKeyError,
    },
}

/// Draw depth of each world layer; lower draws first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WorldDepths {
    pub(crate) water: u8,
    pub(crate) background: u8,
    pub(crate) main: u8,
    pub(crate) top: u8,
}

impl Default for WorldDepths {
    fn default() -> Self {
        Self {
            water: 0,
            background: 1,
            main: 2,
            top: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ActorSettings {
    pub(crate) speed: f32,
    /// Fraction of the frame width removed from the hitbox.
    pub(crate) hitbox_width_shrink: f32,
    pub(crate) hitbox_height_shrink: f32,
    pub(crate) interaction_radius: f32,
    pub(crate) facing_tolerance: f32,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            speed: 250.0,
            hitbox_width_shrink: 0.5,
            hitbox_height_shrink: 60.0,
            interaction_radius: 100.0,
            facing_tolerance: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct EncounterSettings {
    pub(crate) cooldown_seconds: f32,
    pub(crate) threshold_seconds: f32,
    pub(crate) base_chance: f32,
    pub(crate) chance_growth_per_second: f32,
    pub(crate) max_chance: f32,
    /// Fixed RNG seed; entropy when absent.
    pub(crate) seed: Option<u64>,
}

impl Default for EncounterSettings {
    fn default() -> Self {
        Self {
            cooldown_seconds: 0.5,
            threshold_seconds: 2.5,
            base_chance: 0.1,
            chance_growth_per_second: 0.1,
            max_chance: 0.5,
            seed: None,
        }
    }
}

/// Immutable game configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) tile_size: u32,
    pub(crate) animation_speed: f32,
    pub(crate) depths: WorldDepths,
    pub(crate) collidable_hitbox_shrink: f32,
    pub(crate) monster_patch_y_sort_offset: f32,
    pub(crate) actor: ActorSettings,
    pub(crate) tint_speed: f32,
    pub(crate) encounter: EncounterSettings,
    /// Map id -> file name under `data/maps`.
    pub(crate) maps: BTreeMap<String, String>,
    pub(crate) start_map: String,
    pub(crate) start_pos: String,
    pub(crate) snapshot_file: String,
    pub(crate) encounter_banner_seconds: f32,
}

impl Default for Settings {
    fn default() -> Self {
        let maps = [("world", "world.tmx"), ("hospital", "hospital.tmx")]
            .into_iter()
            .map(|(id, file)| (id.to_string(), file.to_string()))
            .collect();
        Self {
            window_width: 1280,
            window_height: 720,
            tile_size: 64,
            animation_speed: 6.0,
            depths: WorldDepths::default(),
            collidable_hitbox_shrink: 0.6,
            monster_patch_y_sort_offset: 40.0,
            actor: ActorSettings::default(),
            tint_speed: 600.0,
            encounter: EncounterSettings::default(),
            maps,
            start_map: "world".to_string(),
            start_pos: "house".to_string(),
            snapshot_file: "gamesave.json".to_string(),
            encounter_banner_seconds: 2.0,
        }
    }
}

impl Settings {
    /// Reads `path` if it exists; a missing file yields the defaults.
    pub(crate) fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_json_str(&raw, path)
    }

    pub(crate) fn from_json_str(raw: &str, path: &Path) -> Result<Self, SettingsError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let settings: Settings = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| {
                let json_path = error.path().to_string();
                SettingsError::Parse {
                    path: path.to_path_buf(),
                    json_path,
                    source: error.into_inner(),
                }
            },
        )?;
        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field: &'static str, message: &str| SettingsError::Invalid {
            field,
            message: message.to_string(),
        };
        if self.window_width == 0 || self.window_height == 0 {
            return Err(invalid("window_width", "window size must be non-zero"));
        }
        if self.tile_size == 0 {
            return Err(invalid("tile_size", "must be positive"));
        }
        if !(self.animation_speed.is_finite() && self.animation_speed >= 0.0) {
            return Err(invalid("animation_speed", "must be a non-negative number"));
        }
        if !(0.0..1.0).contains(&self.collidable_hitbox_shrink) {
            return Err(invalid("collidable_hitbox_shrink", "must be in [0, 1)"));
        }
        if !(self.tint_speed.is_finite() && self.tint_speed > 0.0) {
            return Err(invalid("tint_speed", "must be positive"));
        }
        let encounter = &self.encounter;
        if encounter.cooldown_seconds <= 0.0 || encounter.threshold_seconds < 0.0 {
            return Err(invalid(
                "encounter",
                "cooldown must be positive and threshold non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&encounter.max_chance) {
            return Err(invalid("encounter.max_chance", "must be in [0, 1]"));
        }
        for map_id in self.maps.keys() {
            validate_asset_key(map_id).map_err(|source| SettingsError::MapId {
                map_id: map_id.clone(),
                source,
            })?;
        }
        if !self.maps.contains_key(&self.start_map) {
            return Err(SettingsError::Invalid {
                field: "start_map",
                message: format!("'{}' is not listed in maps", self.start_map),
            });
        }
        if self.snapshot_file.trim().is_empty() {
            return Err(invalid("snapshot_file", "must not be empty"));
        }
        Ok(())
    }
}
