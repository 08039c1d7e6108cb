use std::io;
use std::path::{Path, PathBuf};

use pyiam_engine::{write_text_atomic, Vec2};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub(crate) enum SaveError {
    #[error("failed to encode position snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write position snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Player anchor written on quit. Nothing reads it back yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct PositionSnapshot {
    pub(crate) pos_x: f32,
    pub(crate) pos_y: f32,
}

impl From<Vec2> for PositionSnapshot {
    fn from(anchor: Vec2) -> Self {
        Self {
            pos_x: anchor.x,
            pos_y: anchor.y,
        }
    }
}

pub(crate) fn write_snapshot(path: &Path, snapshot: PositionSnapshot) -> Result<(), SaveError> {
    let json = serde_json::to_string(&snapshot)?;
    write_text_atomic(path, &json).map_err(|source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        pos_x = snapshot.pos_x,
        pos_y = snapshot.pos_y,
        "snapshot_written"
    );
    Ok(())
}
