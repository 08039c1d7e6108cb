use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pyiam_engine::{import_folder, is_png, validate_asset_key, ImageError, Surface};
use thiserror::Error;
use tracing::{info, warn};

use super::actors::CharacterFrames;

const COAST_COLUMNS: u32 = 24;
const COAST_ROWS: u32 = 12;
const COAST_TERRAINS: [&str; 8] = [
    "grass", "grass_i", "sand_i", "sand", "rock", "rock_i", "ice", "ice_i",
];
const COAST_SIDES: [(&str, u32, u32); 8] = [
    ("topleft", 0, 0),
    ("top", 1, 0),
    ("topright", 2, 0),
    ("left", 0, 1),
    ("right", 2, 1),
    ("bottomleft", 0, 2),
    ("bottom", 1, 2),
    ("bottomright", 2, 2),
];
/// Each terrain block is 3 columns wide; animation frames are stacked in 3-row bands.
const COAST_BAND_ROWS: [u32; 4] = [0, 3, 6, 9];

#[derive(Debug, Error)]
pub(crate) enum AssetError {
    #[error("failed to load frames from {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Animation frames shared by every world: water, coast edges and character sheets.
#[derive(Debug, Clone, Default)]
pub(crate) struct GameFrames {
    pub(crate) water: Vec<Surface>,
    /// terrain -> side -> frames.
    pub(crate) coast: HashMap<String, HashMap<String, Vec<Surface>>>,
    pub(crate) characters: HashMap<String, CharacterFrames>,
}

impl GameFrames {
    pub(crate) fn load(graphics_dir: &Path) -> Result<Self, AssetError> {
        let water_dir = graphics_dir.join("tilesets").join("water");
        let water = import_folder(&water_dir).map_err(|source| AssetError::Image {
            path: water_dir.clone(),
            source,
        })?;

        let coast_path = graphics_dir.join("tilesets").join("coast.png");
        let coast_sheet = Surface::load(&coast_path).map_err(|source| AssetError::Image {
            path: coast_path.clone(),
            source,
        })?;
        let coast = import_coast(&coast_sheet, &coast_path)?;

        let characters = import_characters(&graphics_dir.join("characters"))?;

        info!(
            water_frames = water.len(),
            coast_terrains = coast.len(),
            characters = characters.len(),
            "frames_loaded"
        );
        Ok(Self {
            water,
            coast,
            characters,
        })
    }

    pub(crate) fn coast_frames(&self, terrain: &str, side: &str) -> Option<&[Surface]> {
        self.coast
            .get(terrain)
            .and_then(|sides| sides.get(side))
            .map(Vec::as_slice)
    }
}

pub(crate) fn import_coast(
    sheet: &Surface,
    path: &Path,
) -> Result<HashMap<String, HashMap<String, Vec<Surface>>>, AssetError> {
    let cells = sheet
        .slice_grid(COAST_COLUMNS, COAST_ROWS)
        .map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    let columns = COAST_COLUMNS as usize;
    let mut coast = HashMap::new();
    for (index, terrain) in COAST_TERRAINS.iter().enumerate() {
        let mut sides = HashMap::new();
        for (side, column, row) in COAST_SIDES {
            let frames = COAST_BAND_ROWS
                .iter()
                .map(|band| {
                    let cell_row = (band + row) as usize;
                    let cell_column = column as usize + index * 3;
                    cells[cell_row * columns + cell_column].clone()
                })
                .collect::<Vec<_>>();
            sides.insert(side.to_string(), frames);
        }
        coast.insert(terrain.to_string(), sides);
    }
    Ok(coast)
}

/// Loads every PNG sheet in `dir`, keyed by file stem.
pub(crate) fn import_characters(
    dir: &Path,
) -> Result<HashMap<String, CharacterFrames>, AssetError> {
    let entries = fs::read_dir(dir).map_err(|source| AssetError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut characters = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| AssetError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !is_png(&path) {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if let Err(error) = validate_asset_key(key) {
            warn!(path = %path.display(), error = %error, "character_sheet_skipped");
            continue;
        }
        let frames = Surface::load(&path)
            .and_then(|sheet| CharacterFrames::from_sheet(&sheet))
            .map_err(|source| AssetError::Image {
                path: path.clone(),
                source,
            })?;
        characters.insert(key.to_string(), frames);
    }
    Ok(characters)
}
